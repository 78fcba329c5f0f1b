//! Render configuration types
//!
//! A [`RenderConfig`] is produced once by [`crate::resolve`] and never
//! mutated afterwards. Every field is read through an accessor.

use std::time::Duration;

use crate::color::{Rgba, parse_color};

pub const DEFAULT_BACKGROUND: &str = "00000080";
pub const DEFAULT_TEXT_COLOR: &str = "ffffff";

/// Font family selection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FontFamily {
    #[default]
    SansSerif,
    Monospace,
    System,
    /// A named font that must exist in the system font database
    Custom(String),
}

impl FontFamily {
    /// Resolve a `--font-family` value. Generic names match case-insensitively,
    /// anything else is kept verbatim as a custom family name.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "sans-serif" => Self::SansSerif,
            "monospace" => Self::Monospace,
            "system" => Self::System,
            _ => Self::Custom(name.to_string()),
        }
    }
}

/// The nine discrete font weights, lightest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum FontWeight {
    UltraLight,
    Thin,
    Light,
    #[default]
    Regular,
    Medium,
    Semibold,
    Bold,
    Heavy,
    Black,
}

impl FontWeight {
    /// Map a weight keyword case-insensitively. Unknown keywords are `Regular`.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "ultralight" => Self::UltraLight,
            "thin" => Self::Thin,
            "light" => Self::Light,
            "regular" => Self::Regular,
            "medium" => Self::Medium,
            "semibold" => Self::Semibold,
            "bold" => Self::Bold,
            "heavy" => Self::Heavy,
            "black" => Self::Black,
            other => {
                tracing::debug!(weight = other, "Unknown font weight, using regular");
                Self::Regular
            }
        }
    }

    /// OpenType weight class (100..=900)
    pub fn numeric(self) -> u16 {
        match self {
            Self::UltraLight => 100,
            Self::Thin => 200,
            Self::Light => 300,
            Self::Regular => 400,
            Self::Medium => 500,
            Self::Semibold => 600,
            Self::Bold => 700,
            Self::Heavy => 800,
            Self::Black => 900,
        }
    }
}

/// Horizontal placement of each line inside the centered text block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl TextAlign {
    /// Unknown keywords are `Center`
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "left" => Self::Left,
            "right" => Self::Right,
            _ => Self::Center,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingUnit {
    Px,
    Percent,
}

/// Horizontal inset applied on both sides of the text area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Padding {
    pub value: f32,
    pub unit: PaddingUnit,
}

impl Default for Padding {
    fn default() -> Self {
        Self {
            value: 5.0,
            unit: PaddingUnit::Percent,
        }
    }
}

impl Padding {
    /// Parse `<num>px`, `<num>%` or a bare `<num>` (pixels).
    ///
    /// Returns `None` for anything else, including negative or non-finite
    /// numbers.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let (number, unit) = if let Some(n) = input.strip_suffix("px") {
            (n, PaddingUnit::Px)
        } else if let Some(n) = input.strip_suffix('%') {
            (n, PaddingUnit::Percent)
        } else {
            (input, PaddingUnit::Px)
        };

        let value: f32 = number.parse().ok()?;
        (value.is_finite() && value >= 0.0).then_some(Self { value, unit })
    }

    /// Inset on one side, in pixels, for a window of the given width
    pub fn inset(&self, window_width: f32) -> f32 {
        match self.unit {
            PaddingUnit::Px => self.value,
            PaddingUnit::Percent => window_width * self.value / 100.0,
        }
    }
}

/// Everything the overlay needs to draw one label
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    text: String,
    font_family: FontFamily,
    font_weight: FontWeight,
    requested_font_size: Option<f32>,
    background_color: Rgba,
    text_color: Rgba,
    text_align: TextAlign,
    padding: Padding,
    hide_after_secs: Option<f64>,
}

impl RenderConfig {
    pub(crate) fn new(
        text: String,
        font_family: FontFamily,
        font_weight: FontWeight,
        requested_font_size: Option<f32>,
        background_color: Rgba,
        text_color: Rgba,
        text_align: TextAlign,
        padding: Padding,
        hide_after_secs: Option<f64>,
    ) -> Self {
        Self {
            text,
            font_family,
            font_weight,
            requested_font_size,
            background_color,
            text_color,
            text_align,
            padding,
            hide_after_secs,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn font_family(&self) -> &FontFamily {
        &self.font_family
    }

    pub fn font_weight(&self) -> FontWeight {
        self.font_weight
    }

    /// Upper bound on the fitted font size (fixed-size mode), if requested
    pub fn requested_font_size(&self) -> Option<f32> {
        self.requested_font_size
    }

    pub fn background_color(&self) -> Rgba {
        self.background_color
    }

    pub fn text_color(&self) -> Rgba {
        self.text_color
    }

    pub fn text_align(&self) -> TextAlign {
        self.text_align
    }

    pub fn padding(&self) -> Padding {
        self.padding
    }

    /// Raw `--hide-after` value in seconds
    pub fn hide_after_secs(&self) -> Option<f64> {
        self.hide_after_secs
    }

    /// Auto-dismiss delay. `None` unless a positive, representable duration
    /// was configured.
    pub fn hide_after(&self) -> Option<Duration> {
        self.hide_after_secs
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_family: FontFamily::default(),
            font_weight: FontWeight::default(),
            requested_font_size: None,
            background_color: parse_color(DEFAULT_BACKGROUND),
            text_color: parse_color(DEFAULT_TEXT_COLOR),
            text_align: TextAlign::default(),
            padding: Padding::default(),
            hide_after_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_units() {
        assert_eq!(
            Padding::parse("10px"),
            Some(Padding {
                value: 10.0,
                unit: PaddingUnit::Px
            })
        );
        assert_eq!(
            Padding::parse("10%"),
            Some(Padding {
                value: 10.0,
                unit: PaddingUnit::Percent
            })
        );
        assert_eq!(
            Padding::parse("10"),
            Some(Padding {
                value: 10.0,
                unit: PaddingUnit::Px
            })
        );
        assert_eq!(
            Padding::parse(" 2.5% "),
            Some(Padding {
                value: 2.5,
                unit: PaddingUnit::Percent
            })
        );
    }

    #[test]
    fn malformed_padding_is_rejected() {
        assert_eq!(Padding::parse("abc"), None);
        assert_eq!(Padding::parse("px"), None);
        assert_eq!(Padding::parse("10em"), None);
        assert_eq!(Padding::parse("-4px"), None);
        assert_eq!(Padding::parse("inf%"), None);
        assert_eq!(Padding::parse("NaN"), None);
    }

    #[test]
    fn padding_inset() {
        let px = Padding {
            value: 40.0,
            unit: PaddingUnit::Px,
        };
        assert_eq!(px.inset(1000.0), 40.0);
        assert_eq!(Padding::default().inset(1000.0), 50.0);
    }

    #[test]
    fn weight_keywords() {
        assert_eq!(FontWeight::parse("BOLD"), FontWeight::Bold);
        assert_eq!(FontWeight::parse("ultralight"), FontWeight::UltraLight);
        assert_eq!(FontWeight::parse("extra-bold"), FontWeight::Regular);
        assert!(FontWeight::UltraLight < FontWeight::Black);
        assert_eq!(FontWeight::Semibold.numeric(), 600);
    }

    #[test]
    fn family_names() {
        assert_eq!(FontFamily::parse("Monospace"), FontFamily::Monospace);
        assert_eq!(FontFamily::parse("system"), FontFamily::System);
        assert_eq!(
            FontFamily::parse("Fira Code"),
            FontFamily::Custom("Fira Code".into())
        );
    }

    #[test]
    fn alignment_keywords() {
        assert_eq!(TextAlign::parse("LEFT"), TextAlign::Left);
        assert_eq!(TextAlign::parse("right"), TextAlign::Right);
        assert_eq!(TextAlign::parse("justify"), TextAlign::Center);
    }

    #[test]
    fn hide_after_requires_positive_seconds() {
        let mut config = RenderConfig::default();
        assert_eq!(config.hide_after(), None);

        config.hide_after_secs = Some(0.0);
        assert_eq!(config.hide_after(), None);

        config.hide_after_secs = Some(-3.0);
        assert_eq!(config.hide_after(), None);

        config.hide_after_secs = Some(0.5);
        assert_eq!(config.hide_after(), Some(Duration::from_millis(500)));
    }
}
