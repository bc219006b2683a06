//! External collaborators, consumed through traits.
//!
//! The core never parses font files, decodes image pixels, or runs pattern
//! matching itself; it asks these services. Built-in implementations cover
//! the common cases (standard PDF font metrics, `ttf-parser`-backed custom
//! fonts, `hypher` hyphenation, `unicode-bidi` runs, `image`-crate intrinsic
//! sizes) so the crate works end to end out of the box, but a host may swap
//! any of them.
//!
//! All services are read-only after construction and may be shared by
//! reference across documents.

use std::collections::HashMap;
use std::ops::Range;

use serde::Serialize;

use crate::area::Rect;

/// Identifies a face: family name plus weight/slant axes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FontSpec {
    pub family: String,
    /// CSS-style weight, 100..=900.
    pub weight: u32,
    pub italic: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self { family: "Helvetica".to_string(), weight: 400, italic: false }
    }
}

/// Metrics for one glyph at a given size, in points.
#[derive(Debug, Clone, Copy)]
pub struct GlyphMetrics {
    pub advance: f64,
    pub ascent: f64,
    pub descent: f64,
}

/// Glyph measurement service. Font file parsing lives behind this trait.
pub trait FontMetrics {
    fn measure_glyph(&self, font: &FontSpec, size: f64, codepoint: char) -> GlyphMetrics;

    /// Width of a whole run. The default sums glyph advances.
    fn measure_run(&self, font: &FontSpec, size: f64, text: &str) -> f64 {
        text.chars().map(|c| self.measure_glyph(font, size, c).advance).sum()
    }

    /// Ascent/descent of the face itself at `size`, used for line boxes
    /// independent of which glyphs appear.
    fn face_extent(&self, font: &FontSpec, size: f64) -> (f64, f64);
}

/// Hyphenation service: valid break offsets (in chars) inside a word.
pub trait HyphenationEngine {
    /// Sorted char offsets at which `word` may be broken, already filtered by
    /// the engine's minimum word-length and left/right character counts.
    /// Empty when the language is unsupported or the word is too short.
    fn find_breaks(&self, word: &str, lang: &str) -> Vec<usize>;

    /// Whether patterns for `lang` exist at all.
    fn supports(&self, lang: &str) -> bool;
}

/// Base paragraph direction for bidi resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseDirection {
    LeftToRight,
    RightToLeft,
}

/// One directional run after reordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidiRun {
    /// Byte range into the paragraph text.
    pub range: Range<usize>,
    /// Embedding level; odd levels are right-to-left.
    pub level: u8,
}

/// Bidirectional reordering service.
pub trait BidiResolver {
    fn resolve_paragraph(&self, text: &str, base: BaseDirection) -> Vec<BidiRun>;
}

/// Color space reported for a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Rgba,
}

/// Intrinsic properties of an image, enough to size its viewport.
#[derive(Debug, Clone, Copy)]
pub struct ImageInfo {
    pub intrinsic_width_px: u32,
    pub intrinsic_height_px: u32,
    pub dpi: f64,
    pub color_space: ColorSpace,
}

/// Image header probing service. Pixel decoding stays with the emitter.
pub trait ImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<ImageInfo, String>;
}

/// SVG conversion service; invoked per `instream-foreign-object`. The default
/// bundle ships none, in which case such objects lay out as placeholder boxes
/// with a diagnostic.
pub trait SvgConverter {
    fn render_to_areas(&self, svg: &str, target: Rect) -> Result<Vec<crate::area::Area>, String>;
}

/// The bundle of services handed to the pipeline.
pub struct Services {
    pub fonts: Box<dyn FontMetrics>,
    pub hyphenator: Box<dyn HyphenationEngine>,
    pub bidi: Box<dyn BidiResolver>,
    pub images: Box<dyn ImageDecoder>,
    pub svg: Option<Box<dyn SvgConverter>>,
}

impl Services {
    /// Built-in bundle: standard font catalog, hypher hyphenation with the
    /// given minimum counts, unicode-bidi, image-crate probing, no SVG.
    pub fn builtin(min_word: usize, min_left: usize, min_right: usize) -> Self {
        Self {
            fonts: Box::new(FontCatalog::new()),
            hyphenator: Box::new(PatternHyphenator::new(min_word, min_left, min_right)),
            bidi: Box::new(UnicodeBidiResolver),
            images: Box::new(HeaderImageDecoder),
            svg: None,
        }
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::builtin(5, 2, 3)
    }
}

// ─── Font catalog ───────────────────────────────────────────────

/// Per-mille advance widths for ASCII 32..=126 of one standard face.
struct StandardWidths {
    widths: [u16; 95],
    ascender: f64,
    descender: f64,
}

// Helvetica AFM advance widths.
const HELVETICA: StandardWidths = StandardWidths {
    widths: [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556,
        556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722,
        722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722,
        667, 944, 667, 667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556,
        556, 222, 222, 500, 222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500,
        500, 334, 260, 334, 584,
    ],
    ascender: 0.718,
    descender: 0.207,
};

const HELVETICA_BOLD: StandardWidths = StandardWidths {
    widths: [
        278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556,
        556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, 975, 722, 722, 722,
        722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, 667, 778, 722, 667, 611, 722,
        667, 944, 667, 667, 611, 333, 278, 333, 584, 556, 333, 556, 611, 556, 611, 556, 333, 611,
        611, 278, 278, 556, 278, 889, 611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556,
        500, 389, 280, 389, 584,
    ],
    ascender: 0.718,
    descender: 0.207,
};

const TIMES_ROMAN: StandardWidths = StandardWidths {
    widths: [
        250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, 500, 500,
        500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, 921, 722, 667, 667,
        722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, 556, 722, 667, 556, 611, 722,
        722, 944, 722, 722, 611, 333, 278, 333, 469, 500, 333, 444, 500, 444, 500, 444, 333, 500,
        500, 278, 278, 500, 278, 778, 500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500,
        444, 480, 200, 480, 541,
    ],
    ascender: 0.683,
    descender: 0.217,
};

const TIMES_BOLD: StandardWidths = StandardWidths {
    widths: [
        250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278, 500, 500,
        500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500, 930, 722, 667, 722,
        722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778, 611, 778, 722, 556, 667, 722,
        722, 1000, 722, 722, 667, 333, 278, 333, 581, 500, 333, 500, 556, 444, 556, 444, 333, 500,
        556, 278, 333, 556, 278, 833, 556, 500, 556, 556, 444, 389, 333, 556, 500, 722, 500, 500,
        444, 394, 220, 394, 520,
    ],
    ascender: 0.683,
    descender: 0.217,
};

const COURIER: StandardWidths = StandardWidths {
    widths: [600; 95],
    ascender: 0.629,
    descender: 0.157,
};

impl StandardWidths {
    fn advance(&self, ch: char, size: f64) -> f64 {
        let code = ch as u32;
        let per_mille = if (32..=126).contains(&code) {
            self.widths[(code - 32) as usize]
        } else {
            // Non-ASCII falls back to the em/2 convention.
            500
        };
        per_mille as f64 / 1000.0 * size
    }
}

/// Metrics parsed from a registered TrueType/OpenType face.
struct ParsedFace {
    units_per_em: f64,
    ascender: f64,
    descender: f64,
    advances: HashMap<char, u16>,
    default_advance: u16,
}

impl ParsedFace {
    fn from_bytes(data: &[u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let units_per_em = face.units_per_em() as f64;
        let mut advances = HashMap::new();
        let mut default_advance = 0u16;
        for code in 32u32..=0x2FFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph) = face.glyph_index(ch) {
                    let adv = face.glyph_hor_advance(glyph).unwrap_or(0);
                    advances.insert(ch, adv);
                    if ch == ' ' {
                        default_advance = adv;
                    }
                }
            }
        }
        if default_advance == 0 {
            default_advance = (units_per_em / 2.0) as u16;
        }
        Some(Self {
            units_per_em,
            ascender: face.ascender() as f64 / units_per_em,
            descender: face.descender().abs() as f64 / units_per_em,
            advances,
            default_advance,
        })
    }

    fn advance(&self, ch: char, size: f64) -> f64 {
        let units = self.advances.get(&ch).copied().unwrap_or(self.default_advance);
        units as f64 / self.units_per_em * size
    }
}

enum FaceData {
    Standard(&'static StandardWidths),
    Custom(ParsedFace),
}

/// The built-in [`FontMetrics`] implementation: the standard PDF faces plus
/// any registered custom fonts, with weight snapping and Helvetica fallback.
pub struct FontCatalog {
    faces: HashMap<(String, u32, bool), FaceData>,
}

impl FontCatalog {
    pub fn new() -> Self {
        let mut faces: HashMap<(String, u32, bool), FaceData> = HashMap::new();
        let standard: [(&str, u32, bool, &'static StandardWidths); 12] = [
            ("Helvetica", 400, false, &HELVETICA),
            ("Helvetica", 700, false, &HELVETICA_BOLD),
            ("Helvetica", 400, true, &HELVETICA),
            ("Helvetica", 700, true, &HELVETICA_BOLD),
            ("Times", 400, false, &TIMES_ROMAN),
            ("Times", 700, false, &TIMES_BOLD),
            ("Times", 400, true, &TIMES_ROMAN),
            ("Times", 700, true, &TIMES_BOLD),
            ("Courier", 400, false, &COURIER),
            ("Courier", 700, false, &COURIER),
            ("Courier", 400, true, &COURIER),
            ("Courier", 700, true, &COURIER),
        ];
        for (family, weight, italic, widths) in standard {
            faces.insert((family.to_string(), weight, italic), FaceData::Standard(widths));
        }
        Self { faces }
    }

    /// Register a custom face from raw font bytes. Returns false when the
    /// bytes do not parse as a font.
    pub fn register(&mut self, family: &str, weight: u32, italic: bool, data: &[u8]) -> bool {
        match ParsedFace::from_bytes(data) {
            Some(face) => {
                self.faces.insert((family.to_string(), weight, italic), FaceData::Custom(face));
                true
            }
            None => false,
        }
    }

    fn resolve(&self, font: &FontSpec) -> &FaceData {
        let snapped = if font.weight >= 600 { 700 } else { 400 };
        let tries = [
            (font.family.clone(), font.weight, font.italic),
            (font.family.clone(), snapped, font.italic),
            (font.family.clone(), snapped, false),
            ("Helvetica".to_string(), snapped, false),
        ];
        for key in &tries {
            if let Some(face) = self.faces.get(key) {
                return face;
            }
        }
        self.faces
            .get(&("Helvetica".to_string(), 400, false))
            .expect("Helvetica is always registered")
    }
}

impl Default for FontCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl FontMetrics for FontCatalog {
    fn measure_glyph(&self, font: &FontSpec, size: f64, codepoint: char) -> GlyphMetrics {
        match self.resolve(font) {
            FaceData::Standard(w) => GlyphMetrics {
                advance: w.advance(codepoint, size),
                ascent: w.ascender * size,
                descent: w.descender * size,
            },
            FaceData::Custom(f) => GlyphMetrics {
                advance: f.advance(codepoint, size),
                ascent: f.ascender * size,
                descent: f.descender * size,
            },
        }
    }

    fn face_extent(&self, font: &FontSpec, size: f64) -> (f64, f64) {
        match self.resolve(font) {
            FaceData::Standard(w) => (w.ascender * size, w.descender * size),
            FaceData::Custom(f) => (f.ascender * size, f.descender * size),
        }
    }
}

// ─── Hyphenation ────────────────────────────────────────────────

/// Liang-pattern hyphenation backed by `hypher`'s compiled tables, with the
/// minimum word-length and boundary-character filters applied here so that
/// `find_breaks` is a pure function of `(word, lang)` and the constructor
/// arguments.
pub struct PatternHyphenator {
    min_word_length: usize,
    min_left: usize,
    min_right: usize,
}

impl PatternHyphenator {
    pub fn new(min_word_length: usize, min_left: usize, min_right: usize) -> Self {
        Self { min_word_length, min_left, min_right }
    }

    fn language(tag: &str) -> Option<hypher::Lang> {
        let primary = tag.split('-').next().unwrap_or(tag).to_ascii_lowercase();
        match primary.as_str() {
            "cs" => Some(hypher::Lang::Czech),
            "da" => Some(hypher::Lang::Danish),
            "de" => Some(hypher::Lang::German),
            "en" => Some(hypher::Lang::English),
            "es" => Some(hypher::Lang::Spanish),
            "fi" => Some(hypher::Lang::Finnish),
            "fr" => Some(hypher::Lang::French),
            "it" => Some(hypher::Lang::Italian),
            "nl" => Some(hypher::Lang::Dutch),
            "nb" | "nn" | "no" => Some(hypher::Lang::Norwegian),
            "pl" => Some(hypher::Lang::Polish),
            "pt" => Some(hypher::Lang::Portuguese),
            "ru" => Some(hypher::Lang::Russian),
            "sv" => Some(hypher::Lang::Swedish),
            "tr" => Some(hypher::Lang::Turkish),
            _ => None,
        }
    }
}

impl HyphenationEngine for PatternHyphenator {
    fn find_breaks(&self, word: &str, lang: &str) -> Vec<usize> {
        let total = word.chars().count();
        if total < self.min_word_length || !word.chars().all(char::is_alphabetic) {
            return Vec::new();
        }
        let Some(language) = Self::language(lang) else {
            return Vec::new();
        };
        let mut offsets = Vec::new();
        let mut at = 0usize;
        let syllables: Vec<&str> = hypher::hyphenate(word, language).collect();
        for syllable in &syllables[..syllables.len().saturating_sub(1)] {
            at += syllable.chars().count();
            if at >= self.min_left && total - at >= self.min_right {
                offsets.push(at);
            }
        }
        offsets
    }

    fn supports(&self, lang: &str) -> bool {
        Self::language(lang).is_some()
    }
}

// ─── Bidi ───────────────────────────────────────────────────────

/// UAX#9 resolution via `unicode-bidi`.
pub struct UnicodeBidiResolver;

impl BidiResolver for UnicodeBidiResolver {
    fn resolve_paragraph(&self, text: &str, base: BaseDirection) -> Vec<BidiRun> {
        use unicode_bidi::{BidiInfo, Level};
        let level = match base {
            BaseDirection::LeftToRight => Level::ltr(),
            BaseDirection::RightToLeft => Level::rtl(),
        };
        let info = BidiInfo::new(text, Some(level));
        let mut runs = Vec::new();
        for para in &info.paragraphs {
            let (levels, ranges) = info.visual_runs(para, para.range.clone());
            for range in ranges {
                let run_level = levels[range.start];
                runs.push(BidiRun { range, level: run_level.number() });
            }
        }
        runs
    }
}

// ─── Images ─────────────────────────────────────────────────────

/// Probes intrinsic dimensions with the `image` crate. Full pixel decode is
/// the emitter's job; layout only needs the header.
pub struct HeaderImageDecoder;

impl ImageDecoder for HeaderImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<ImageInfo, String> {
        let reader = image::io::Reader::new(std::io::Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| format!("unreadable image bytes: {e}"))?;
        let format = reader.format();
        let (w, h) = reader.into_dimensions().map_err(|e| format!("bad image header: {e}"))?;
        let color_space = match format {
            Some(image::ImageFormat::Png) => ColorSpace::Rgba,
            Some(image::ImageFormat::Jpeg) => ColorSpace::Rgb,
            _ => ColorSpace::Rgb,
        };
        Ok(ImageInfo {
            intrinsic_width_px: w,
            intrinsic_height_px: h,
            dpi: 72.0,
            color_space,
        })
    }
}

/// Resolve an `external-graphic` source string to raw bytes.
///
/// Supported forms, in order: `url(...)` wrapper, `data:` URIs with base64
/// payloads, filesystem paths, raw base64.
pub fn read_graphic_bytes(src: &str) -> Result<Vec<u8>, String> {
    use base64::Engine as _;
    let b64 = base64::engine::general_purpose::STANDARD;

    let src = src
        .strip_prefix("url(")
        .and_then(|s| s.strip_suffix(')'))
        .map(|s| s.trim_matches(|c| c == '\'' || c == '"'))
        .unwrap_or(src);

    if let Some(rest) = src.strip_prefix("data:") {
        let comma = rest.find(',').ok_or_else(|| "invalid data URI: missing comma".to_string())?;
        return b64
            .decode(&rest[comma + 1..])
            .map_err(|e| format!("invalid base64 in data URI: {e}"));
    }
    if src.starts_with('/') || src.starts_with("./") || src.starts_with("../") {
        return std::fs::read(src).map_err(|e| format!("failed to read image '{src}': {e}"));
    }
    b64.decode(src).map_err(|e| format!("image source is neither a path nor base64: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_space_width() {
        let catalog = FontCatalog::new();
        let w = catalog
            .measure_glyph(&FontSpec::default(), 12.0, ' ')
            .advance;
        assert!((w - 3.336).abs() < 1e-3);
    }

    #[test]
    fn bold_is_wider() {
        let catalog = FontCatalog::new();
        let regular = FontSpec::default();
        let bold = FontSpec { weight: 700, ..FontSpec::default() };
        let a = catalog.measure_glyph(&regular, 12.0, 'a').advance;
        let a_bold = catalog.measure_glyph(&bold, 12.0, 'a').advance;
        assert!(a_bold >= a);
    }

    #[test]
    fn unknown_family_falls_back_to_helvetica() {
        let catalog = FontCatalog::new();
        let unknown = FontSpec { family: "NoSuchFace".into(), weight: 400, italic: false };
        let w1 = catalog.measure_run(&unknown, 12.0, "Hello");
        let w2 = catalog.measure_run(&FontSpec::default(), 12.0, "Hello");
        assert!((w1 - w2).abs() < 1e-9);
    }

    #[test]
    fn weight_snapping() {
        let catalog = FontCatalog::new();
        let w650 = FontSpec { weight: 650, ..FontSpec::default() };
        let w700 = FontSpec { weight: 700, ..FontSpec::default() };
        let a = catalog.measure_glyph(&w650, 12.0, 'A').advance;
        let b = catalog.measure_glyph(&w700, 12.0, 'A').advance;
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn hyphenator_respects_boundary_minimums() {
        let hyph = PatternHyphenator::new(5, 2, 3);
        let breaks = hyph.find_breaks("extraordinary", "en-US");
        assert!(!breaks.is_empty());
        let total = "extraordinary".chars().count();
        for b in &breaks {
            assert!(*b >= 2, "break {b} violates min-left");
            assert!(total - *b >= 3, "break {b} violates min-right");
        }
        // Sorted ascending.
        let mut sorted = breaks.clone();
        sorted.sort_unstable();
        assert_eq!(breaks, sorted);
    }

    #[test]
    fn hyphenator_is_pure() {
        let hyph = PatternHyphenator::new(5, 2, 3);
        let a = hyph.find_breaks("hyphenation", "en-US");
        let b = hyph.find_breaks("hyphenation", "en-US");
        assert_eq!(a, b);
    }

    #[test]
    fn hyphenator_skips_short_and_nonalpha() {
        let hyph = PatternHyphenator::new(5, 2, 3);
        assert!(hyph.find_breaks("tiny", "en-US").is_empty());
        assert!(hyph.find_breaks("ab3cdef", "en-US").is_empty());
    }

    #[test]
    fn unsupported_language_yields_nothing() {
        let hyph = PatternHyphenator::new(5, 2, 3);
        assert!(!hyph.supports("zz"));
        assert!(hyph.find_breaks("extraordinary", "zz").is_empty());
    }

    #[test]
    fn data_uri_roundtrip() {
        use base64::Engine as _;
        let payload = b"not an image";
        let encoded = base64::engine::general_purpose::STANDARD.encode(payload);
        let uri = format!("data:image/png;base64,{encoded}");
        assert_eq!(read_graphic_bytes(&uri).unwrap(), payload);
        let wrapped = format!("url('{uri}')");
        assert_eq!(read_graphic_bytes(&wrapped).unwrap(), payload);
    }

    #[test]
    fn bidi_ltr_paragraph_is_single_run() {
        let runs = UnicodeBidiResolver.resolve_paragraph("plain text", BaseDirection::LeftToRight);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].level % 2, 0);
    }
}
