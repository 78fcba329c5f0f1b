//! Platform abstraction for overlay windows
//!
//! This module defines the traits that all platform backends must implement,
//! allowing the label rendering code to be platform-agnostic.

use thiserror::Error;

#[cfg(all(unix, not(target_os = "macos")))]
pub mod wayland;

#[cfg(all(unix, not(target_os = "macos")))]
pub mod x11;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "macos")]
pub mod macos;

/// Information about a connected monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    /// Human-readable name/description
    pub name: String,
    /// X position of the monitor in virtual screen space
    pub x: i32,
    /// Y position of the monitor in virtual screen space
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Whether this is the primary monitor
    pub is_primary: bool,
}

/// The monitor the overlay covers: the primary one, else the first reported
pub fn find_primary(monitors: &[MonitorInfo]) -> Option<&MonitorInfo> {
    monitors
        .iter()
        .find(|m| m.is_primary)
        .or_else(|| monitors.first())
}

/// Configuration for creating an overlay window
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Identifier for the window (WM class, layer namespace, window class)
    pub namespace: String,
    /// Window title where the platform shows one
    pub title: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            namespace: "largetype".to_string(),
            title: "LargeType".to_string(),
        }
    }
}

/// Errors that can occur in platform operations
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Failed to connect to display server
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// No display server or monitor to show the window on
    #[error("No display available")]
    NoDisplay,
    /// Required protocol/feature not available
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),
    /// Buffer/memory allocation failed
    #[error("Buffer error: {0}")]
    BufferError(String),
    /// Generic platform error
    #[error("Platform error: {0}")]
    Other(String),
}

/// Input on the overlay window that dismisses it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissInput {
    /// Primary mouse button pressed anywhere on the window
    PrimaryClick,
    /// Escape pressed while the window has keyboard focus
    EscapeKey,
}

/// Trait that all platform backends must implement
pub trait OverlayPlatform: Sized {
    /// Create a fullscreen, borderless, always-on-top window covering the
    /// primary monitor and make it visible
    fn new(config: OverlayConfig) -> Result<Self, PlatformError>;

    /// Get the current width of the overlay
    fn width(&self) -> u32;

    /// Get the current height of the overlay
    fn height(&self) -> u32;

    /// Buffer pixels per logical unit. Layout is done in logical units.
    fn scale_factor(&self) -> f32 {
        1.0
    }

    /// Get mutable access to the pixel buffer (RGBA format)
    /// Returns None if buffer is not ready
    fn pixel_buffer(&mut self) -> Option<&mut [u8]>;

    /// Commit the current pixel buffer to the screen
    fn commit(&mut self);

    /// Process pending platform events (non-blocking)
    /// Returns false if the window was closed externally
    fn poll_events(&mut self) -> bool;

    /// Take the first dismissing input seen since the last call
    fn take_dismiss(&mut self) -> Option<DismissInput>;

    /// Check if the window needs repainting (clears the flag)
    fn take_redraw_requested(&mut self) -> bool;
}

/// Process-wide Escape detection that works while another application
/// holds keyboard focus
pub trait GlobalEscapeListener: Sized {
    /// Register the system-wide hook
    fn install() -> Result<Self, PlatformError>;

    /// Check if Escape was pressed since the last call (clears the flag)
    fn take_pressed(&mut self) -> bool;
}

/// Re-export the appropriate platform for the current target
#[cfg(all(unix, not(target_os = "macos")))]
pub use linux::{LinuxEscapeListener as NativeEscapeListener, LinuxOverlay as NativeOverlay};

#[cfg(target_os = "windows")]
pub use windows::{WindowsEscapeListener as NativeEscapeListener, WindowsOverlay as NativeOverlay};

#[cfg(target_os = "macos")]
pub use macos::{MacOSEscapeListener as NativeEscapeListener, MacOSOverlay as NativeOverlay};

// ─────────────────────────────────────────────────────────────────────────────
// Linux Runtime Detection (Wayland vs X11)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(all(unix, not(target_os = "macos")))]
mod linux {
    use super::*;

    /// Detect whether to use Wayland or X11 at runtime
    fn use_wayland() -> bool {
        std::env::var("WAYLAND_DISPLAY").is_ok()
    }

    fn use_x11() -> bool {
        std::env::var("DISPLAY").is_ok()
    }

    /// Linux overlay that wraps either Wayland or X11 backend
    pub enum LinuxOverlay {
        Wayland(wayland::WaylandOverlay),
        X11(x11::X11Overlay),
    }

    impl OverlayPlatform for LinuxOverlay {
        fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
            if use_wayland() {
                wayland::WaylandOverlay::new(config).map(LinuxOverlay::Wayland)
            } else if use_x11() {
                x11::X11Overlay::new(config).map(LinuxOverlay::X11)
            } else {
                Err(PlatformError::NoDisplay)
            }
        }

        fn width(&self) -> u32 {
            match self {
                Self::Wayland(w) => w.width(),
                Self::X11(x) => x.width(),
            }
        }

        fn height(&self) -> u32 {
            match self {
                Self::Wayland(w) => w.height(),
                Self::X11(x) => x.height(),
            }
        }

        fn pixel_buffer(&mut self) -> Option<&mut [u8]> {
            match self {
                Self::Wayland(w) => w.pixel_buffer(),
                Self::X11(x) => x.pixel_buffer(),
            }
        }

        fn commit(&mut self) {
            match self {
                Self::Wayland(w) => w.commit(),
                Self::X11(x) => x.commit(),
            }
        }

        fn poll_events(&mut self) -> bool {
            match self {
                Self::Wayland(w) => w.poll_events(),
                Self::X11(x) => x.poll_events(),
            }
        }

        fn take_dismiss(&mut self) -> Option<DismissInput> {
            match self {
                Self::Wayland(w) => w.take_dismiss(),
                Self::X11(x) => x.take_dismiss(),
            }
        }

        fn take_redraw_requested(&mut self) -> bool {
            match self {
                Self::Wayland(w) => w.take_redraw_requested(),
                Self::X11(x) => x.take_redraw_requested(),
            }
        }
    }

    /// Escape listener matching the session type.
    ///
    /// Wayland offers no global key hook to ordinary clients; the layer
    /// surface's exclusive keyboard focus delivers Escape locally instead.
    pub enum LinuxEscapeListener {
        X11(x11::X11EscapeListener),
        Inert,
    }

    impl GlobalEscapeListener for LinuxEscapeListener {
        fn install() -> Result<Self, PlatformError> {
            if use_wayland() || !use_x11() {
                Ok(Self::Inert)
            } else {
                x11::X11EscapeListener::install().map(Self::X11)
            }
        }

        fn take_pressed(&mut self) -> bool {
            match self {
                Self::X11(x) => x.take_pressed(),
                Self::Inert => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(name: &str, x: i32, is_primary: bool) -> MonitorInfo {
        MonitorInfo {
            name: name.to_string(),
            x,
            y: 0,
            width: 1920,
            height: 1080,
            is_primary,
        }
    }

    #[test]
    fn primary_monitor_wins() {
        let monitors = vec![monitor("left", 0, false), monitor("right", 1920, true)];
        assert_eq!(find_primary(&monitors).map(|m| m.name.as_str()), Some("right"));
    }

    #[test]
    fn first_monitor_without_primary() {
        let monitors = vec![monitor("a", 0, false), monitor("b", 1920, false)];
        assert_eq!(find_primary(&monitors).map(|m| m.name.as_str()), Some("a"));
        assert!(find_primary(&[]).is_none());
    }

    #[test]
    fn error_messages() {
        let err = PlatformError::ConnectionFailed("no display".into());
        assert_eq!(err.to_string(), "Connection failed: no display");
    }
}
