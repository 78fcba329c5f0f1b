//! Error types for configuration resolution

use thiserror::Error;

/// Fatal errors raised while resolving the argument list
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No text provided.")]
    EmptyText,
}
