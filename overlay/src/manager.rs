//! Overlay window: a platform surface paired with its renderer
//!
//! Drawing calls borrow the platform's pixel buffer and hand it to the
//! renderer; nothing reaches the screen until [`OverlayWindow::commit`].

use largetype_core::{FontFamily, FontWeight, TextAlign};
use tiny_skia::Color;

use crate::error::OverlayError;
use crate::platform::{DismissInput, NativeOverlay, OverlayConfig, OverlayPlatform};
use crate::renderer::Renderer;

/// A window with its own renderer
pub struct OverlayWindow<P: OverlayPlatform = NativeOverlay> {
    platform: P,
    renderer: Renderer,
}

impl OverlayWindow<NativeOverlay> {
    /// Create the native window.
    ///
    /// The font is resolved first so an unknown family fails before any
    /// window appears.
    pub fn new(
        config: OverlayConfig,
        family: &FontFamily,
        weight: FontWeight,
    ) -> Result<Self, OverlayError> {
        let renderer = Renderer::new(family, weight)?;
        let platform = NativeOverlay::new(config)?;
        Ok(Self { platform, renderer })
    }
}

impl<P: OverlayPlatform> OverlayWindow<P> {
    /// Pair an existing platform surface with a renderer
    pub fn from_parts(platform: P, renderer: Renderer) -> Self {
        Self { platform, renderer }
    }

    /// Get the window width
    pub fn width(&self) -> u32 {
        self.platform.width()
    }

    /// Get the window height
    pub fn height(&self) -> u32 {
        self.platform.height()
    }

    /// Buffer pixels per logical unit
    pub fn scale_factor(&self) -> f32 {
        self.platform.scale_factor()
    }

    /// Clear the overlay with a color
    pub fn clear(&mut self, color: Color) {
        let width = self.platform.width();
        let height = self.platform.height();
        if let Some(buffer) = self.platform.pixel_buffer() {
            self.renderer.clear(buffer, width, height, color);
        }
    }

    /// Draw a text block with its top-left corner at (x, y)
    pub fn draw_text(
        &mut self,
        text: &str,
        x: f32,
        y: f32,
        font_size: f32,
        color: Color,
        align: TextAlign,
    ) {
        let width = self.platform.width();
        let height = self.platform.height();
        if let Some(buffer) = self.platform.pixel_buffer() {
            self.renderer
                .draw_text(buffer, width, height, text, x, y, font_size, color, align);
        }
    }

    /// Get mutable access to the renderer, e.g. to measure text
    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Commit the current frame to the screen
    pub fn commit(&mut self) {
        self.platform.commit();
    }

    /// Poll for events (non-blocking)
    /// Returns false if the window was closed
    pub fn poll_events(&mut self) -> bool {
        self.platform.poll_events()
    }

    /// Take the first dismissing input since the last call
    pub fn take_dismiss(&mut self) -> Option<DismissInput> {
        self.platform.take_dismiss()
    }

    /// Check whether the platform asked for a repaint (clears the flag)
    pub fn take_redraw_requested(&mut self) -> bool {
        self.platform.take_redraw_requested()
    }

    /// Get the underlying platform
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Get mutable access to the underlying platform
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}
