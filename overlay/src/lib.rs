//! LargeType Overlay Library
//!
//! Cross-platform fullscreen text overlay.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    overlays/                        │
//! │                 LargeTypeOverlay                    │
//! │     (event loop, lifecycle, dismiss handling)       │
//! ├─────────────────────────────────────────────────────┤
//! │                 fit / lifecycle                     │
//! │     font auto-fit search, one-shot termination      │
//! ├─────────────────────────────────────────────────────┤
//! │                    manager                          │
//! │                  OverlayWindow                      │
//! │          (window + renderer wrapper)                │
//! ├─────────────────────────────────────────────────────┤
//! │                    renderer                         │
//! │            tiny-skia + cosmic-text                  │
//! │              (drawing primitives)                   │
//! ├─────────────────────────────────────────────────────┤
//! │                    platform/                        │
//! │         wayland, x11, windows, macos                │
//! │     (OS window management, global Escape hook)      │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod fit;
pub mod lifecycle;
pub mod manager;
pub mod overlays;
pub mod platform;
pub mod renderer;
pub mod utils;

// Re-export commonly used types
pub use error::OverlayError;
pub use lifecycle::{DismissSignal, OverlayState};
pub use manager::OverlayWindow;
pub use overlays::LargeTypeOverlay;
pub use platform::{NativeOverlay, OverlayConfig, OverlayPlatform, PlatformError};
pub use renderer::{RenderError, Renderer};

// Re-export tiny_skia Color for external use
pub use tiny_skia::Color;
