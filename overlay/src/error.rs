use thiserror::Error;

use crate::platform::PlatformError;
use crate::renderer::RenderError;

/// Anything that stops the overlay from being shown
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}
