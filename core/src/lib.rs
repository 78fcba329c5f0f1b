//! Configuration resolver for largetype.
//!
//! Turns the raw argument list into an [`Invocation`]: either a request for
//! help/version output, or an immutable [`RenderConfig`] describing what the
//! overlay should draw.

pub mod args;
pub mod color;
pub mod config;
pub mod error;
pub mod usage;

pub use args::{Invocation, resolve};
pub use color::{Rgba, parse_color};
pub use config::{FontFamily, FontWeight, Padding, PaddingUnit, RenderConfig, TextAlign};
pub use error::ConfigError;
pub use usage::{USAGE, version_line};
