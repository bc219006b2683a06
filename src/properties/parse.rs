//! Property value grammar.
//!
//! Small hand-rolled parsers for the XSL-FO datatypes the cascade consumes:
//! lengths with units, percentages, colors, keep strengths, break keywords,
//! column widths. Each returns `None` on garbage; the cascade substitutes the
//! initial value and reports a diagnostic.

use crate::area::{BorderStyle, Color};

/// A length as written, before relative units are resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedLength {
    /// Absolute, already in points.
    Pt(f64),
    /// Percentage, kept symbolic (0..=100 scale).
    Percent(f64),
    /// Multiples of the current font-size.
    Em(f64),
    /// Multiples of the x-height (0.5 × font-size absent metrics).
    Ex(f64),
    Auto,
}

impl ParsedLength {
    /// Resolve against a font size; percentages stay unresolved (`None`).
    pub fn to_points(self, font_size: f64) -> Option<f64> {
        match self {
            ParsedLength::Pt(v) => Some(v),
            ParsedLength::Em(v) => Some(v * font_size),
            ParsedLength::Ex(v) => Some(v * 0.5 * font_size),
            ParsedLength::Percent(_) | ParsedLength::Auto => None,
        }
    }
}

/// Parse a length token: `12pt`, `10mm`, `1.5cm`, `1in`, `16px`, `2em`,
/// `1ex`, `50%`, `auto`. A bare number is taken as points.
pub fn parse_length(s: &str) -> Option<ParsedLength> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("auto") {
        return Some(ParsedLength::Auto);
    }
    if let Some(num) = s.strip_suffix('%') {
        return num.trim().parse::<f64>().ok().map(ParsedLength::Percent);
    }
    let (number, unit) = split_unit(s)?;
    let v: f64 = number.parse().ok()?;
    Some(match unit {
        "" | "pt" => ParsedLength::Pt(v),
        "mm" => ParsedLength::Pt(v * 72.0 / 25.4),
        "cm" => ParsedLength::Pt(v * 28.3465),
        "in" => ParsedLength::Pt(v * 72.0),
        "px" => ParsedLength::Pt(v * 0.75),
        "pc" => ParsedLength::Pt(v * 12.0),
        "em" => ParsedLength::Em(v),
        "ex" => ParsedLength::Ex(v),
        _ => return None,
    })
}

fn split_unit(s: &str) -> Option<(&str, &str)> {
    let idx = s
        .char_indices()
        .find(|(_, c)| c.is_ascii_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(idx);
    if num.is_empty() {
        return None;
    }
    Some((num.trim(), unit.trim()))
}

/// Parse a color: `#rgb`, `#rrggbb`, `rgb(r,g,b)` with 0–255 channels, or a
/// named color from the small CSS/XSL set below.
pub fn parse_color(s: &str) -> Option<Color> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(body) = s.strip_prefix("rgb(").and_then(|t| t.strip_suffix(')')) {
        let mut channels = body.split(',').map(|c| c.trim().parse::<f64>());
        let r = channels.next()?.ok()?;
        let g = channels.next()?.ok()?;
        let b = channels.next()?.ok()?;
        return Some(Color::rgb(r / 255.0, g / 255.0, b / 255.0));
    }
    named_color(s)
}

fn parse_hex(hex: &str) -> Option<Color> {
    let expand = |nib: &str| u8::from_str_radix(&nib.repeat(2), 16).ok();
    let pair = |p: &str| u8::from_str_radix(p, 16).ok();
    let (r, g, b) = match hex.len() {
        3 => (expand(&hex[0..1])?, expand(&hex[1..2])?, expand(&hex[2..3])?),
        6 => (pair(&hex[0..2])?, pair(&hex[2..4])?, pair(&hex[4..6])?),
        _ => return None,
    };
    Some(Color::rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0))
}

fn named_color(name: &str) -> Option<Color> {
    let c = |r: u8, g: u8, b: u8| Color::rgb(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
    Some(match name.to_ascii_lowercase().as_str() {
        "black" => c(0, 0, 0),
        "white" => c(255, 255, 255),
        "red" => c(255, 0, 0),
        "green" => c(0, 128, 0),
        "blue" => c(0, 0, 255),
        "yellow" => c(255, 255, 0),
        "orange" => c(255, 165, 0),
        "purple" => c(128, 0, 128),
        "gray" | "grey" => c(128, 128, 128),
        "silver" => c(192, 192, 192),
        "maroon" => c(128, 0, 0),
        "navy" => c(0, 0, 128),
        "teal" => c(0, 128, 128),
        "olive" => c(128, 128, 0),
        "aqua" | "cyan" => c(0, 255, 255),
        "fuchsia" | "magenta" => c(255, 0, 255),
        "lime" => c(0, 255, 0),
        "transparent" => Color { r: 0.0, g: 0.0, b: 0.0, a: 0.0 },
        _ => return None,
    })
}

pub fn parse_border_style(s: &str) -> Option<BorderStyle> {
    Some(match s.trim() {
        "none" => BorderStyle::None,
        "hidden" => BorderStyle::Hidden,
        "dotted" => BorderStyle::Dotted,
        "dashed" => BorderStyle::Dashed,
        "solid" => BorderStyle::Solid,
        "double" => BorderStyle::Double,
        "groove" => BorderStyle::Groove,
        "ridge" => BorderStyle::Ridge,
        "inset" => BorderStyle::Inset,
        "outset" => BorderStyle::Outset,
        _ => return None,
    })
}

/// Named border widths per the XSL recommendation.
pub fn border_width_keyword(s: &str) -> Option<f64> {
    Some(match s.trim() {
        "thin" => 0.5,
        "medium" => 1.0,
        "thick" => 2.0,
        _ => return None,
    })
}

/// A `border` / `border-top` style shorthand: any order of width, style,
/// color tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct BorderShorthand {
    pub width: Option<f64>,
    pub style: Option<BorderStyle>,
    pub color: Option<Color>,
}

pub fn parse_border_shorthand(s: &str, font_size: f64) -> BorderShorthand {
    let mut out = BorderShorthand::default();
    for token in s.split_whitespace() {
        if let Some(style) = parse_border_style(token) {
            out.style = Some(style);
        } else if let Some(w) = border_width_keyword(token) {
            out.width = Some(w);
        } else if let Some(len) = parse_length(token).and_then(|l| l.to_points(font_size)) {
            out.width = Some(len);
        } else if let Some(color) = parse_color(token) {
            out.color = Some(color);
        }
    }
    out
}

/// Split a 1–4 token box shorthand (`margin`, `padding`) into
/// top/right/bottom/left values per CSS expansion order.
pub fn expand_box_shorthand(s: &str) -> Option<[&str; 4]> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    Some(match tokens.as_slice() {
        [a] => [a, a, a, a],
        [v, h] => [v, h, v, h],
        [t, h, b] => [t, h, b, h],
        [t, r, b, l] => [t, r, b, l],
        _ => return None,
    })
}

/// A keep strength: `auto`, `always`, or a positive integer priority.
/// `Auto` never forbids a break; `Always` forbids unconditionally; integers
/// forbid with rising force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum KeepStrength {
    #[default]
    Auto,
    Strength(i32),
    Always,
}

pub fn parse_keep(s: &str) -> Option<KeepStrength> {
    let s = s.trim();
    Some(match s {
        "auto" => KeepStrength::Auto,
        "always" => KeepStrength::Always,
        _ => KeepStrength::Strength(s.parse::<i32>().ok().filter(|v| *v > 0)?),
    })
}

/// A forced break condition on `break-before` / `break-after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakWhen {
    #[default]
    Auto,
    Column,
    Page,
    EvenPage,
    OddPage,
}

impl BreakWhen {
    pub fn forces_page_break(self) -> bool {
        !matches!(self, BreakWhen::Auto)
    }
}

pub fn parse_break(s: &str) -> Option<BreakWhen> {
    Some(match s.trim() {
        "auto" => BreakWhen::Auto,
        "column" => BreakWhen::Column,
        "page" => BreakWhen::Page,
        "even-page" => BreakWhen::EvenPage,
        "odd-page" => BreakWhen::OddPage,
        _ => return None,
    })
}

/// A table column width specifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnWidthSpec {
    /// Absolute points.
    Length(f64),
    /// Percent of the table's available width.
    Percent(f64),
    /// `<k>*` or `proportional-column-width(k)`.
    Proportional(f64),
    Auto,
}

pub fn parse_column_width(s: &str, font_size: f64) -> Option<ColumnWidthSpec> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("auto") {
        return Some(ColumnWidthSpec::Auto);
    }
    if let Some(k) = s.strip_suffix('*') {
        let coeff = if k.is_empty() { 1.0 } else { k.trim().parse::<f64>().ok()? };
        return Some(ColumnWidthSpec::Proportional(coeff));
    }
    if let Some(body) = s
        .strip_prefix("proportional-column-width(")
        .and_then(|t| t.strip_suffix(')'))
    {
        return Some(ColumnWidthSpec::Proportional(body.trim().parse().ok()?));
    }
    match parse_length(s)? {
        ParsedLength::Percent(p) => Some(ColumnWidthSpec::Percent(p)),
        other => other.to_points(font_size).map(ColumnWidthSpec::Length),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_units() {
        assert_eq!(parse_length("12pt"), Some(ParsedLength::Pt(12.0)));
        assert_eq!(parse_length("1in"), Some(ParsedLength::Pt(72.0)));
        assert_eq!(parse_length("16px"), Some(ParsedLength::Pt(12.0)));
        assert_eq!(parse_length("2em"), Some(ParsedLength::Em(2.0)));
        assert_eq!(parse_length("50%"), Some(ParsedLength::Percent(50.0)));
        assert_eq!(parse_length("auto"), Some(ParsedLength::Auto));
        assert!(parse_length("12zz").is_none());
        let mm = parse_length("25.4mm").unwrap();
        assert!(matches!(mm, ParsedLength::Pt(v) if (v - 72.0).abs() < 1e-9));
        let cm = parse_length("1cm").unwrap();
        assert!(matches!(cm, ParsedLength::Pt(v) if (v - 28.3465).abs() < 1e-6));
    }

    #[test]
    fn em_resolution() {
        assert_eq!(parse_length("2em").unwrap().to_points(12.0), Some(24.0));
        assert_eq!(parse_length("1ex").unwrap().to_points(12.0), Some(6.0));
        assert_eq!(parse_length("50%").unwrap().to_points(12.0), None);
    }

    #[test]
    fn colors() {
        assert_eq!(parse_color("#ff0000"), Some(Color::rgb(1.0, 0.0, 0.0)));
        assert_eq!(parse_color("#f00"), Some(Color::rgb(1.0, 0.0, 0.0)));
        assert_eq!(parse_color("rgb(0, 128, 255)"), Some(Color::rgb(0.0, 128.0 / 255.0, 1.0)));
        assert_eq!(parse_color("black"), Some(Color::rgb(0.0, 0.0, 0.0)));
        assert!(parse_color("mauve-ish").is_none());
    }

    #[test]
    fn border_shorthand_any_order() {
        let b = parse_border_shorthand("solid 2pt red", 12.0);
        assert_eq!(b.width, Some(2.0));
        assert_eq!(b.style, Some(BorderStyle::Solid));
        assert_eq!(b.color, Some(Color::rgb(1.0, 0.0, 0.0)));
        let b = parse_border_shorthand("thin dotted", 12.0);
        assert_eq!(b.width, Some(0.5));
        assert_eq!(b.style, Some(BorderStyle::Dotted));
        assert!(b.color.is_none());
    }

    #[test]
    fn box_shorthand_expansion() {
        assert_eq!(expand_box_shorthand("4pt"), Some(["4pt"; 4]));
        assert_eq!(expand_box_shorthand("1pt 2pt"), Some(["1pt", "2pt", "1pt", "2pt"]));
        assert_eq!(expand_box_shorthand("1pt 2pt 3pt"), Some(["1pt", "2pt", "3pt", "2pt"]));
        assert_eq!(
            expand_box_shorthand("1pt 2pt 3pt 4pt"),
            Some(["1pt", "2pt", "3pt", "4pt"])
        );
        assert!(expand_box_shorthand("1 2 3 4 5").is_none());
    }

    #[test]
    fn keeps_and_breaks() {
        assert_eq!(parse_keep("auto"), Some(KeepStrength::Auto));
        assert_eq!(parse_keep("always"), Some(KeepStrength::Always));
        assert_eq!(parse_keep("5"), Some(KeepStrength::Strength(5)));
        assert!(parse_keep("-3").is_none());
        assert!(KeepStrength::Auto < KeepStrength::Strength(1));
        assert!(KeepStrength::Strength(9) < KeepStrength::Always);

        assert_eq!(parse_break("page"), Some(BreakWhen::Page));
        assert_eq!(parse_break("even-page"), Some(BreakWhen::EvenPage));
        assert!(!BreakWhen::Auto.forces_page_break());
        assert!(BreakWhen::OddPage.forces_page_break());
    }

    #[test]
    fn column_widths() {
        assert_eq!(parse_column_width("100pt", 12.0), Some(ColumnWidthSpec::Length(100.0)));
        assert_eq!(parse_column_width("25%", 12.0), Some(ColumnWidthSpec::Percent(25.0)));
        assert_eq!(parse_column_width("2*", 12.0), Some(ColumnWidthSpec::Proportional(2.0)));
        assert_eq!(parse_column_width("*", 12.0), Some(ColumnWidthSpec::Proportional(1.0)));
        assert_eq!(
            parse_column_width("proportional-column-width(3)", 12.0),
            Some(ColumnWidthSpec::Proportional(3.0))
        );
        assert_eq!(parse_column_width("auto", 12.0), Some(ColumnWidthSpec::Auto));
    }
}
