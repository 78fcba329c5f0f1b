//! Large Type Overlay
//!
//! Shows one line (or block) of text as large as fits the screen, centered
//! on a translucent backdrop, until dismissed.

use std::thread;
use std::time::{Duration, Instant};

use largetype_core::RenderConfig;

use crate::error::OverlayError;
use crate::fit::{Scaled, final_font_size};
use crate::lifecycle::{DismissSignal, HideTimer, Lifecycle};
use crate::manager::OverlayWindow;
use crate::platform::{
    GlobalEscapeListener, NativeEscapeListener, NativeOverlay, OverlayConfig, OverlayPlatform,
};
use crate::utils::color_from_rgba;

/// How long the event loop sleeps between polls
const POLL_INTERVAL: Duration = Duration::from_millis(16);

pub struct LargeTypeOverlay<P: OverlayPlatform = NativeOverlay, L = NativeEscapeListener> {
    window: OverlayWindow<P>,
    listener: Option<L>,
    config: RenderConfig,
    lifecycle: Lifecycle,
}

impl LargeTypeOverlay {
    /// Resolve the font, open the native window and install the global
    /// Escape listener.
    ///
    /// A listener that cannot be installed is logged and skipped; the
    /// overlay still dismisses on local input and timeout.
    pub fn new(config: RenderConfig) -> Result<Self, OverlayError> {
        let window = OverlayWindow::new(
            OverlayConfig::default(),
            config.font_family(),
            config.font_weight(),
        )?;

        let listener = match NativeEscapeListener::install() {
            Ok(listener) => Some(listener),
            Err(e) => {
                tracing::warn!(error = %e, "Global Escape listener unavailable");
                None
            }
        };

        Ok(Self::with_parts(window, listener, config))
    }
}

impl<P: OverlayPlatform, L: GlobalEscapeListener> LargeTypeOverlay<P, L> {
    pub fn with_parts(window: OverlayWindow<P>, listener: Option<L>, config: RenderConfig) -> Self {
        Self {
            window,
            listener,
            config,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Font size in buffer pixels, fitted afresh for the current window.
    ///
    /// Padding, the vertical inset, the size floor and a requested size are
    /// all in logical units; only the result is scaled to pixels.
    fn font_size(&mut self) -> f32 {
        let scale = self.window.scale_factor();
        let width = self.window.width();
        let height = self.window.height();

        let mut measurer = Scaled::new(self.window.renderer_mut(), scale);
        let scale = measurer.scale();
        let logical = final_font_size(
            &mut measurer,
            self.config.text(),
            width as f32 / scale,
            height as f32 / scale,
            self.config.padding(),
            self.config.requested_font_size(),
        );
        logical * scale
    }

    /// Paint the backdrop and the centered text block
    pub fn render(&mut self) {
        let width = self.window.width() as f32;
        let height = self.window.height() as f32;

        self.window
            .clear(color_from_rgba(self.config.background_color()));

        let font_size = self.font_size();
        let (text_width, text_height) = self
            .window
            .renderer_mut()
            .measure_text(self.config.text(), font_size);

        let x = (width - text_width) / 2.0;
        let y = (height - text_height) / 2.0;

        self.window.draw_text(
            self.config.text(),
            x,
            y,
            font_size,
            color_from_rgba(self.config.text_color()),
            self.config.text_align(),
        );
        self.window.commit();
    }

    /// Next pending dismiss signal, checked in priority order
    fn poll_signal(&mut self, timer: &mut HideTimer) -> Option<DismissSignal> {
        if !self.window.poll_events() {
            return Some(DismissSignal::WindowClosed);
        }
        if let Some(input) = self.window.take_dismiss() {
            return Some(input.into());
        }
        if self
            .listener
            .as_mut()
            .is_some_and(|listener| listener.take_pressed())
        {
            return Some(DismissSignal::GlobalEscape);
        }
        if timer.fire(Instant::now()) {
            return Some(DismissSignal::Timeout);
        }
        None
    }

    /// Display the overlay and block until it is dismissed
    pub fn run(mut self) -> DismissSignal {
        // The first render covers any initial expose/configure
        let _ = self.window.take_redraw_requested();
        self.render();
        self.lifecycle.mark_displayed();

        let mut timer = HideTimer::new(self.config.hide_after(), Instant::now());
        tracing::debug!(hide_after = ?self.config.hide_after(), "Overlay displayed");

        loop {
            if let Some(signal) = self.poll_signal(&mut timer)
                && self.lifecycle.request_termination(signal)
            {
                return signal;
            }

            if self.window.take_redraw_requested() {
                self.render();
            }

            let nap = timer
                .remaining(Instant::now())
                .map_or(POLL_INTERVAL, |left| left.min(POLL_INTERVAL));
            thread::sleep(nap);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use largetype_core::{FontFamily, FontWeight, Invocation, resolve};

    use super::*;
    use crate::platform::{DismissInput, PlatformError};
    use crate::renderer::Renderer;

    struct FakePlatform {
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        commits: usize,
        polls: usize,
        /// (poll number, input) pairs delivered once that many polls have run
        inputs: VecDeque<(usize, DismissInput)>,
        close_after: Option<usize>,
        scale: f32,
    }

    impl FakePlatform {
        fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height * 4) as usize],
                commits: 0,
                polls: 0,
                inputs: VecDeque::new(),
                close_after: None,
                scale: 1.0,
            }
        }
    }

    impl OverlayPlatform for FakePlatform {
        fn new(_config: OverlayConfig) -> Result<Self, PlatformError> {
            Ok(Self::new(64, 48))
        }

        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }

        fn scale_factor(&self) -> f32 {
            self.scale
        }

        fn pixel_buffer(&mut self) -> Option<&mut [u8]> {
            Some(&mut self.pixels)
        }

        fn commit(&mut self) {
            self.commits += 1;
        }

        fn poll_events(&mut self) -> bool {
            self.polls += 1;
            self.close_after.is_none_or(|n| self.polls < n)
        }

        fn take_dismiss(&mut self) -> Option<DismissInput> {
            match self.inputs.front() {
                Some((at, _)) if *at <= self.polls => self.inputs.pop_front().map(|(_, i)| i),
                _ => None,
            }
        }

        fn take_redraw_requested(&mut self) -> bool {
            false
        }
    }

    struct FakeListener {
        press_at: Option<usize>,
        calls: usize,
    }

    impl GlobalEscapeListener for FakeListener {
        fn install() -> Result<Self, PlatformError> {
            Ok(Self {
                press_at: None,
                calls: 0,
            })
        }

        fn take_pressed(&mut self) -> bool {
            self.calls += 1;
            self.press_at == Some(self.calls)
        }
    }

    fn config(args: &[&str]) -> RenderConfig {
        match resolve(args) {
            Ok(Invocation::Render(config)) => config,
            other => panic!("unexpected invocation: {other:?}"),
        }
    }

    fn overlay(
        platform: FakePlatform,
        listener: Option<FakeListener>,
        args: &[&str],
    ) -> LargeTypeOverlay<FakePlatform, FakeListener> {
        let renderer = Renderer::new(&FontFamily::SansSerif, FontWeight::Regular)
            .expect("generic family resolves");
        LargeTypeOverlay::with_parts(
            OverlayWindow::from_parts(platform, renderer),
            listener,
            config(args),
        )
    }

    #[test]
    fn primary_click_dismisses() {
        let mut platform = FakePlatform::new(64, 48);
        platform.inputs.push_back((2, DismissInput::PrimaryClick));
        let overlay = overlay(platform, None, &["hello"]);
        assert_eq!(overlay.run(), DismissSignal::PrimaryClick);
    }

    #[test]
    fn escape_key_dismisses() {
        let mut platform = FakePlatform::new(64, 48);
        platform.inputs.push_back((1, DismissInput::EscapeKey));
        let overlay = overlay(platform, None, &["hello"]);
        assert_eq!(overlay.run(), DismissSignal::EscapeKey);
    }

    #[test]
    fn global_escape_dismisses() {
        let listener = FakeListener {
            press_at: Some(3),
            calls: 0,
        };
        let overlay = overlay(FakePlatform::new(64, 48), Some(listener), &["hello"]);
        assert_eq!(overlay.run(), DismissSignal::GlobalEscape);
    }

    #[test]
    fn closed_window_ends_run() {
        let mut platform = FakePlatform::new(64, 48);
        platform.close_after = Some(2);
        let overlay = overlay(platform, None, &["hello"]);
        assert_eq!(overlay.run(), DismissSignal::WindowClosed);
    }

    #[test]
    fn hide_after_times_out() {
        let overlay = overlay(
            FakePlatform::new(64, 48),
            None,
            &["hello", "--hide-after", "0.05"],
        );
        let started = Instant::now();
        assert_eq!(overlay.run(), DismissSignal::Timeout);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn render_fills_background() {
        let mut overlay = overlay(
            FakePlatform::new(64, 48),
            None,
            &["hi", "--background-color", "ff000080"],
        );
        overlay.render();

        let platform = overlay.window.platform();
        assert_eq!(platform.commits, 1);
        // Top-left corner is outside the text; premultiplied red at ~50%
        let corner = &platform.pixels[0..4];
        assert!((127..=128).contains(&corner[0]), "{corner:?}");
        assert_eq!(corner[1], 0);
        assert!((127..=128).contains(&corner[3]), "{corner:?}");
    }

    #[test]
    fn font_size_respects_request() {
        let mut overlay = overlay(
            FakePlatform::new(800, 600),
            None,
            &["hi", "--font-size", "20"],
        );
        assert_eq!(overlay.font_size(), 20.0);
    }

    #[test]
    fn font_size_follows_window_size() {
        let mut overlay = overlay(FakePlatform::new(800, 600), None, &["hello"]);
        let wide = overlay.font_size();

        overlay.window.platform_mut().width = 400;
        overlay.window.platform_mut().pixels = vec![0; 400 * 600 * 4];
        let narrow = overlay.font_size();
        assert!(narrow < wide, "{narrow} >= {wide}");
    }

    #[test]
    fn requested_size_is_in_logical_units() {
        let mut platform = FakePlatform::new(1600, 1200);
        platform.scale = 2.0;
        let mut overlay = overlay(platform, None, &["hi", "--font-size", "20"]);
        assert_eq!(overlay.font_size(), 40.0);
    }
}
