//! Argument reducer
//!
//! Walks the raw argument list once, left to right. Value flags consume the
//! following token whatever it looks like, repeated flags overwrite earlier
//! ones, unknown `--` flags are skipped and everything else is display text.
//! The accumulated state only becomes a [`RenderConfig`] at the very end.

use crate::color::parse_color;
use crate::config::{
    DEFAULT_BACKGROUND, DEFAULT_TEXT_COLOR, FontFamily, FontWeight, Padding, RenderConfig,
    TextAlign,
};
use crate::error::ConfigError;

const FLAG_PREFIX: &str = "--";

/// What the process was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Help,
    Version,
    Render(RenderConfig),
}

/// Flags that take exactly one value token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueFlag {
    FontFamily,
    FontSize,
    FontWeight,
    BackgroundColor,
    Color,
    TextAlign,
    Padding,
    HideAfter,
}

impl ValueFlag {
    fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "--font-family" => Self::FontFamily,
            "--font-size" => Self::FontSize,
            "--font-weight" => Self::FontWeight,
            "--background-color" => Self::BackgroundColor,
            "--color" => Self::Color,
            "--text-align" => Self::TextAlign,
            "--padding" => Self::Padding,
            "--hide-after" => Self::HideAfter,
            _ => return None,
        })
    }
}

/// Mutable accumulator, private to [`resolve`]
struct ArgState {
    text: Vec<String>,
    font_family: String,
    font_size: Option<f32>,
    font_weight: FontWeight,
    background_color: String,
    text_color: String,
    text_align: TextAlign,
    padding: Padding,
    hide_after: Option<f64>,
    help: bool,
    version: bool,
}

impl Default for ArgState {
    fn default() -> Self {
        Self {
            text: Vec::new(),
            font_family: "sans-serif".to_string(),
            font_size: None,
            font_weight: FontWeight::default(),
            background_color: DEFAULT_BACKGROUND.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            text_align: TextAlign::default(),
            padding: Padding::default(),
            hide_after: None,
            help: false,
            version: false,
        }
    }
}

impl ArgState {
    fn apply(&mut self, flag: ValueFlag, value: &str) {
        match flag {
            ValueFlag::FontFamily => self.font_family = value.to_string(),
            ValueFlag::FontSize => match parse_number(value).map(|n| n as f32) {
                Some(size) if size.is_finite() && size > 0.0 => self.font_size = Some(size),
                _ => tracing::debug!(value, "Ignoring invalid --font-size"),
            },
            ValueFlag::FontWeight => self.font_weight = FontWeight::parse(value),
            ValueFlag::BackgroundColor => self.background_color = value.to_string(),
            ValueFlag::Color => self.text_color = value.to_string(),
            ValueFlag::TextAlign => self.text_align = TextAlign::parse(value),
            ValueFlag::Padding => match Padding::parse(value) {
                Some(padding) => self.padding = padding,
                None => tracing::debug!(value, "Ignoring invalid --padding"),
            },
            ValueFlag::HideAfter => match parse_number(value) {
                Some(secs) => self.hide_after = Some(secs),
                None => tracing::debug!(value, "Ignoring invalid --hide-after"),
            },
        }
    }

    fn finish(self) -> Result<Invocation, ConfigError> {
        if self.help {
            return Ok(Invocation::Help);
        }
        if self.version {
            return Ok(Invocation::Version);
        }

        let text = self.text.join(" ").trim().to_string();
        if text.is_empty() {
            return Err(ConfigError::EmptyText);
        }

        Ok(Invocation::Render(RenderConfig::new(
            text,
            FontFamily::parse(&self.font_family),
            self.font_weight,
            self.font_size,
            parse_color(&self.background_color),
            parse_color(&self.text_color),
            self.text_align,
            self.padding,
            self.hide_after,
        )))
    }
}

/// A finite decimal number, or `None`
fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Resolve the argument list (program name excluded) into an [`Invocation`].
///
/// `--help` and `--version` anywhere in the list win over rendering and skip
/// the empty-text check.
pub fn resolve<I, S>(args: I) -> Result<Invocation, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut state = ArgState::default();
    let mut tokens = args.into_iter();

    while let Some(token) = tokens.next() {
        let token = token.as_ref();
        match token {
            "--help" => state.help = true,
            "--version" => state.version = true,
            _ => {
                if let Some(flag) = ValueFlag::from_token(token) {
                    match tokens.next() {
                        Some(value) => state.apply(flag, value.as_ref()),
                        None => tracing::debug!(flag = token, "Flag without value skipped"),
                    }
                } else if !token.starts_with(FLAG_PREFIX) {
                    state.text.push(token.to_string());
                } else {
                    tracing::debug!(flag = token, "Skipping unknown flag");
                }
            }
        }
    }

    state.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;
    use crate::config::PaddingUnit;

    fn render(args: &[&str]) -> RenderConfig {
        match resolve(args) {
            Ok(Invocation::Render(config)) => config,
            other => panic!("expected render config, got {other:?}"),
        }
    }

    #[test]
    fn positional_tokens_are_joined_in_order() {
        let config = render(&["foo", "--color", "ff0000", "bar", "baz"]);
        assert_eq!(config.text(), "foo bar baz");
        assert_eq!(config.text_color(), Rgba::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn text_is_trimmed() {
        let config = render(&["  hello ", " world\n"]);
        assert_eq!(config.text(), "hello   world");
    }

    #[test]
    fn defaults_without_flags() {
        let config = render(&["hi"]);
        assert_eq!(config.font_family(), &FontFamily::SansSerif);
        assert_eq!(config.font_weight(), FontWeight::Regular);
        assert_eq!(config.requested_font_size(), None);
        assert_eq!(config.background_color(), Rgba::from_rgba8(0, 0, 0, 0x80));
        assert_eq!(config.text_color(), Rgba::new(1.0, 1.0, 1.0, 1.0));
        assert_eq!(config.text_align(), TextAlign::Center);
        assert_eq!(config.padding(), Padding::default());
        assert_eq!(config.hide_after(), None);
    }

    #[test]
    fn empty_text_is_fatal() {
        assert_eq!(resolve(Vec::<String>::new()), Err(ConfigError::EmptyText));
        assert_eq!(resolve(["   "]), Err(ConfigError::EmptyText));
        assert_eq!(resolve(["--color", "ff0000"]), Err(ConfigError::EmptyText));
    }

    #[test]
    fn help_and_version_bypass_text_check() {
        assert_eq!(resolve(["--help"]), Ok(Invocation::Help));
        assert_eq!(resolve(["--version"]), Ok(Invocation::Version));
        assert_eq!(resolve(["text", "--help"]), Ok(Invocation::Help));
        assert_eq!(resolve(["--version", "--help"]), Ok(Invocation::Help));
    }

    #[test]
    fn last_writer_wins() {
        let config = render(&["x", "--font-weight", "bold", "--font-weight", "light"]);
        assert_eq!(config.font_weight(), FontWeight::Light);

        let config = render(&["x", "--text-align", "left", "--text-align", "right"]);
        assert_eq!(config.text_align(), TextAlign::Right);
    }

    #[test]
    fn value_flags_consume_next_token() {
        let config = render(&["x", "--font-family", "--help"]);
        assert_eq!(
            config.font_family(),
            &FontFamily::Custom("--help".to_string())
        );
    }

    #[test]
    fn trailing_value_flag_is_skipped() {
        let config = render(&["x", "--padding"]);
        assert_eq!(config.padding(), Padding::default());
    }

    #[test]
    fn unknown_flags_are_skipped_alone() {
        let config = render(&["--shout", "quiet", "-v"]);
        assert_eq!(config.text(), "quiet -v");
    }

    #[test]
    fn font_size_sets_upper_bound() {
        assert_eq!(
            render(&["x", "--font-size", "120"]).requested_font_size(),
            Some(120.0)
        );
        assert_eq!(
            render(&["x", "--font-size", "big"]).requested_font_size(),
            None
        );
        assert_eq!(
            render(&["x", "--font-size", "0"]).requested_font_size(),
            None
        );
        assert_eq!(
            render(&["x", "--font-size", "80", "--font-size", "nope"]).requested_font_size(),
            Some(80.0)
        );
    }

    #[test]
    fn padding_flag() {
        let config = render(&["x", "--padding", "10px"]);
        assert_eq!(config.padding().unit, PaddingUnit::Px);
        assert_eq!(config.padding().value, 10.0);

        let config = render(&["x", "--padding", "abc"]);
        assert_eq!(config.padding(), Padding::default());

        let config = render(&["x", "--padding", "-5"]);
        assert_eq!(config.padding(), Padding::default());
    }

    #[test]
    fn hide_after_flag() {
        let config = render(&["x", "--hide-after", "0.5"]);
        assert_eq!(config.hide_after_secs(), Some(0.5));

        let config = render(&["x", "--hide-after", "soon"]);
        assert_eq!(config.hide_after_secs(), None);
        assert_eq!(config.hide_after(), None);
    }

    #[test]
    fn malformed_colors_fall_back() {
        let config = render(&["x", "--background-color", "12345", "--color", "#abc"]);
        assert_eq!(config.background_color(), Rgba::fallback());
        assert_eq!(config.text_color(), Rgba::fallback());
    }
}
