//! Named color resolution for `%Cred`/`%Cgreen`/`%C(<name>)` directives and
//! rating-adaptive color (`spec.md` §4.G).

use colored::Color;

use crate::internal::codec::Rating;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Lines,
    Functions,
    Branches,
}

/// A resolved color directive: either a fixed ANSI color, a reset, or a
/// rating-adaptive color resolved at render time against the subject's
/// rating for the given stat kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpec {
    Named(NamedColor),
    Reset,
    Rating(StatKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedColor {
    Red,
    Green,
    Blue,
    Yellow,
    Cyan,
    Magenta,
    White,
    Black,
}

impl NamedColor {
    pub fn to_colored(self) -> Color {
        match self {
            NamedColor::Red => Color::Red,
            NamedColor::Green => Color::Green,
            NamedColor::Blue => Color::Blue,
            NamedColor::Yellow => Color::Yellow,
            NamedColor::Cyan => Color::Cyan,
            NamedColor::Magenta => Color::Magenta,
            NamedColor::White => Color::White,
            NamedColor::Black => Color::Black,
        }
    }
}

/// Parse the body of a `%C(<name>)` directive (or a bare `%Cred`-style
/// suffix) into a `ColorSpec`.
pub fn parse_color_name(name: &str) -> Option<ColorSpec> {
    let name = name.trim();
    if name.eq_ignore_ascii_case("reset") {
        return Some(ColorSpec::Reset);
    }
    if let Some(rest) = name.strip_prefix("rating") {
        return Some(ColorSpec::Rating(match rest.trim_start_matches(':') {
            "" | "L" => StatKind::Lines,
            "F" => StatKind::Functions,
            "B" => StatKind::Branches,
            _ => return None,
        }));
    }
    let named = match name.to_ascii_lowercase().as_str() {
        "red" => NamedColor::Red,
        "green" => NamedColor::Green,
        "blue" => NamedColor::Blue,
        "yellow" => NamedColor::Yellow,
        "cyan" => NamedColor::Cyan,
        "magenta" => NamedColor::Magenta,
        "white" => NamedColor::White,
        "black" => NamedColor::Black,
        _ => return None,
    };
    Some(ColorSpec::Named(named))
}

/// Resolve a rating to the color it paints text: green (passing), yellow
/// (incomplete), red (failing).
pub fn color_for_rating(rating: Rating) -> NamedColor {
    match rating {
        Rating::Passing => NamedColor::Green,
        Rating::Incomplete => NamedColor::Yellow,
        Rating::Failing => NamedColor::Red,
    }
}

/// Wrap `text` in ANSI color codes if `enabled`, else return it unchanged
/// (`spec.md` §4.G "Output includes ANSI escape sequences only when a
/// colorizer is installed").
pub fn paint(enabled: bool, color: NamedColor, text: &str) -> String {
    if !enabled {
        return text.to_string();
    }
    use colored::Colorize;
    text.color(color.to_colored()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_colors() {
        assert_eq!(parse_color_name("red"), Some(ColorSpec::Named(NamedColor::Red)));
        assert_eq!(parse_color_name("Green"), Some(ColorSpec::Named(NamedColor::Green)));
    }

    #[test]
    fn parses_reset() {
        assert_eq!(parse_color_name("reset"), Some(ColorSpec::Reset));
    }

    #[test]
    fn parses_rating_with_default_and_explicit_kind() {
        assert_eq!(parse_color_name("rating"), Some(ColorSpec::Rating(StatKind::Lines)));
        assert_eq!(
            parse_color_name("rating:F"),
            Some(ColorSpec::Rating(StatKind::Functions))
        );
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(parse_color_name("chartreuse"), None);
    }

    #[test]
    fn disabled_color_passes_text_through_unchanged() {
        assert_eq!(paint(false, NamedColor::Red, "hi"), "hi");
    }

    #[test]
    fn rating_color_mapping() {
        assert_eq!(color_for_rating(Rating::Passing), NamedColor::Green);
        assert_eq!(color_for_rating(Rating::Incomplete), NamedColor::Yellow);
        assert_eq!(color_for_rating(Rating::Failing), NamedColor::Red);
    }
}
