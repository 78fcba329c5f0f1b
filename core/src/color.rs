//! Hex color parsing
//!
//! Colors arrive as `rrggbb` or `rrggbbaa` hex strings (optionally prefixed
//! with `#`) and are normalized to floating point channels in `[0, 1]`.

/// An RGBA color with each channel in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Build a color from 8-bit channels
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: channel(r),
            g: channel(g),
            b: channel(b),
            a: channel(a),
        }
    }

    /// Color used when a hex string cannot be interpreted: black at 50% alpha
    pub const fn fallback() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.5)
    }
}

#[inline]
fn channel(byte: u8) -> f32 {
    byte as f32 / 255.0
}

/// Parse a 6- or 8-digit hex color.
///
/// Six digits are `rrggbb` with full opacity, eight digits are `rrggbbaa`.
/// Any other length, or any non-hex digit, yields [`Rgba::fallback`].
pub fn parse_color(hex: &str) -> Rgba {
    let hex = hex.strip_prefix('#').unwrap_or(hex);

    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Rgba::fallback();
    }

    match hex.len() {
        6 => match u32::from_str_radix(hex, 16) {
            Ok(rgb) => {
                let [_, r, g, b] = rgb.to_be_bytes();
                Rgba::from_rgba8(r, g, b, 255)
            }
            Err(_) => Rgba::fallback(),
        },
        8 => match u32::from_str_radix(hex, 16) {
            Ok(rgba) => {
                let [r, g, b, a] = rgba.to_be_bytes();
                Rgba::from_rgba8(r, g, b, a)
            }
            Err(_) => Rgba::fallback(),
        },
        _ => Rgba::fallback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_digits_are_opaque() {
        let c = parse_color("ff8000");
        assert_eq!(c.r, 1.0);
        assert_eq!(c.g, 128.0 / 255.0);
        assert_eq!(c.b, 0.0);
        assert_eq!(c.a, 1.0);
    }

    #[test]
    fn eight_digits_take_trailing_alpha() {
        let c = parse_color("00000080");
        assert_eq!((c.r, c.g, c.b), (0.0, 0.0, 0.0));
        assert_eq!(c.a, 128.0 / 255.0);

        let c = parse_color("10203040");
        assert_eq!(c.r, 16.0 / 255.0);
        assert_eq!(c.g, 32.0 / 255.0);
        assert_eq!(c.b, 48.0 / 255.0);
        assert_eq!(c.a, 64.0 / 255.0);
    }

    #[test]
    fn leading_hash_is_stripped() {
        assert_eq!(parse_color("#00ff00"), parse_color("00ff00"));
        assert_eq!(parse_color("#00ff0080"), parse_color("00ff0080"));
    }

    #[test]
    fn wrong_length_falls_back() {
        for input in ["", "#", "fff", "fffff", "fffffff", "fffffffff", "#12345"] {
            assert_eq!(parse_color(input), Rgba::fallback(), "input {input:?}");
        }
    }

    #[test]
    fn non_hex_digits_fall_back() {
        assert_eq!(parse_color("zzzzzz"), Rgba::fallback());
        assert_eq!(parse_color("+12345"), Rgba::fallback());
    }

    #[test]
    fn uppercase_digits_are_accepted() {
        assert_eq!(parse_color("FFFFFF"), Rgba::new(1.0, 1.0, 1.0, 1.0));
    }
}
