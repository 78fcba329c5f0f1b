//! Help and version text

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const USAGE: &str = "\
LargeType - Display text in large font fullscreen overlay

Usage:
  largetype <text> [options]

Options:
  --font-family <sans-serif|monospace|system|CustomFontName>   Font type (default: sans-serif)
  --font-size <number>                Maximum font size in points (default: fit to screen)
  --font-weight <ultralight|thin|light|regular|medium|semibold|bold|heavy|black>   Font weight (default: regular)
  --background-color <rrggbb[aa]>     Background color in hex (default: 00000080)
  --color <rrggbb[aa]>                Text color in hex (default: ffffff)
  --text-align <left|center|right>    Text alignment (default: center)
  --padding <number[px|%]>            Horizontal padding around text (default: 5%)
  --hide-after <seconds>              Hide overlay after N seconds
  --help                              Show this help message
  --version                           Show version

Dismiss the overlay with a click or the Escape key.

Examples:
  largetype \"Hello World\"
  largetype \"Code\" --font-family monospace --color 00ff00 --background-color 000000ff
  largetype \"Big\" --font-size 120 --font-weight bold --text-align left --padding 10%
  largetype \"Timed\" --hide-after 3
";

/// Line printed for `--version`
pub fn version_line() -> String {
    format!("largetype version: {VERSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_mentions_every_flag() {
        for flag in [
            "--font-family",
            "--font-size",
            "--font-weight",
            "--background-color",
            "--color",
            "--text-align",
            "--padding",
            "--hide-after",
            "--help",
            "--version",
        ] {
            assert!(USAGE.contains(flag), "usage is missing {flag}");
        }
    }

    #[test]
    fn version_line_format() {
        assert!(version_line().starts_with("largetype version: "));
    }
}
