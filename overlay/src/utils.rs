//! Common utility functions for overlay rendering

use largetype_core::Rgba;
use tiny_skia::Color;

/// Convert a parsed color to tiny_skia Color.
/// Components outside 0..=1 cannot come out of the parser; they map to transparent.
#[inline]
pub fn color_from_rgba(rgba: Rgba) -> Color {
    Color::from_rgba(rgba.r, rgba.g, rgba.b, rgba.a).unwrap_or(Color::TRANSPARENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use largetype_core::parse_color;

    #[test]
    fn test_color_from_rgba() {
        let c = color_from_rgba(parse_color("ff000080"));
        assert_eq!(c.red(), 1.0);
        assert_eq!(c.green(), 0.0);
        assert!((c.alpha() - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_is_transparent() {
        let c = color_from_rgba(Rgba::new(2.0, 0.0, 0.0, 1.0));
        assert_eq!(c, Color::TRANSPARENT);
    }
}
