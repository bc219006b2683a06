//! Layout configuration.
//!
//! Every knob the pipeline consults lives on [`LayoutOptions`]; nothing reads
//! environment state. The struct deserializes from JSON with per-field
//! defaults, so hosts can override a single option without restating the rest.

use serde::Deserialize;

/// Which line-breaking strategy the paragraph formatter runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum LineBreaking {
    /// First-fit: O(n), breaks as late as each line allows.
    #[default]
    Greedy,
    /// Knuth-Plass total-fit: minimizes demerits over the whole paragraph.
    Optimal,
}

/// All configuration consumed by the layout core.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutOptions {
    /// When true, degradations that change pagination (impossible keeps,
    /// missing hyphenation tables) become fatal instead of diagnostics.
    pub strict_layout: bool,
    /// Bound on convergence loops in space collapsing.
    pub max_iterations: u32,
    pub line_breaking: LineBreaking,

    // Resource guards. Breaching any of these is fatal.
    pub max_pages: u32,
    pub max_image_size_bytes: u64,
    pub max_table_cells: u32,
    pub max_nesting_depth: u32,

    // Hyphenation.
    pub enable_hyphenation: bool,
    pub hyphenation_language: String,
    pub hyphenation_min_word_length: usize,
    pub hyphenation_min_left_chars: usize,
    pub hyphenation_min_right_chars: usize,

    pub default_image_dpi: f64,

    // Knuth-Plass tuning.
    pub knuth_plass_space_stretch_ratio: f64,
    pub knuth_plass_space_shrink_ratio: f64,
    pub knuth_plass_tolerance: f64,
    pub knuth_plass_line_penalty: f64,
    pub knuth_plass_flagged_demerit: f64,
    pub knuth_plass_fitness_demerit: f64,
    pub knuth_plass_hyphen_penalty: f64,

    /// Page size in points used when a page master omits dimensions.
    pub default_page_size: (f64, f64),
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            strict_layout: true,
            max_iterations: 10,
            line_breaking: LineBreaking::Greedy,
            max_pages: 10_000,
            max_image_size_bytes: 50 * 1024 * 1024,
            max_table_cells: 100_000,
            max_nesting_depth: 100,
            enable_hyphenation: false,
            hyphenation_language: "en-US".to_string(),
            hyphenation_min_word_length: 5,
            hyphenation_min_left_chars: 2,
            hyphenation_min_right_chars: 3,
            default_image_dpi: 72.0,
            knuth_plass_space_stretch_ratio: 0.5,
            knuth_plass_space_shrink_ratio: 0.333,
            knuth_plass_tolerance: 1.0,
            knuth_plass_line_penalty: 10.0,
            knuth_plass_flagged_demerit: 100.0,
            knuth_plass_fitness_demerit: 100.0,
            knuth_plass_hyphen_penalty: 50.0,
            default_page_size: (595.0, 842.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = LayoutOptions::default();
        assert!(opts.strict_layout);
        assert_eq!(opts.max_pages, 10_000);
        assert_eq!(opts.line_breaking, LineBreaking::Greedy);
        assert!((opts.knuth_plass_space_shrink_ratio - 0.333).abs() < 1e-9);
        assert_eq!(opts.default_page_size, (595.0, 842.0));
    }

    #[test]
    fn partial_json_overrides_single_field() {
        let opts: LayoutOptions =
            serde_json::from_str(r#"{"lineBreaking":"Optimal","enableHyphenation":true}"#).unwrap();
        assert_eq!(opts.line_breaking, LineBreaking::Optimal);
        assert!(opts.enable_hyphenation);
        assert_eq!(opts.max_pages, 10_000);
    }
}
