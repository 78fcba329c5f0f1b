//! macOS platform implementation for overlay windows
//!
//! Uses objc2-app-kit for a transparent, borderless window at screen-saver
//! level covering the primary display. Pixels are handed to Core Graphics
//! from a custom NSView.

use std::cell::Cell;
use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use block2::RcBlock;
use objc2::rc::Retained;
use objc2::runtime::AnyObject;
use objc2::{DefinedClass, MainThreadMarker, MainThreadOnly, define_class, msg_send};
use objc2_app_kit::{
    NSApplication, NSApplicationActivationPolicy, NSBackingStoreType, NSColor, NSEvent,
    NSEventMask, NSEventType, NSGraphicsContext, NSScreen, NSView, NSWindow,
    NSWindowCollectionBehavior, NSWindowStyleMask,
};
use objc2_foundation::{NSDefaultRunLoopMode, NSPoint, NSRect, NSString};

use core_graphics::base::kCGImageAlphaPremultipliedFirst;
use core_graphics::color_space::CGColorSpace;
use core_graphics::context::CGContext;

use super::{DismissInput, GlobalEscapeListener, OverlayConfig, OverlayPlatform, PlatformError};

/// kVK_Escape
const ESCAPE_KEY_CODE: u16 = 53;

/// NSScreenSaverWindowLevel; above menus and the Dock
const OVERLAY_WINDOW_LEVEL: isize = 1000;

// ─────────────────────────────────────────────────────────────────────────────
// Custom NSWindow / NSView
// ─────────────────────────────────────────────────────────────────────────────

define_class!(
    // SAFETY: NSWindow permits subclassing. Borderless windows refuse key
    // status by default; we override the two predicates so Escape arrives.
    #[unsafe(super(NSWindow))]
    #[thread_kind = MainThreadOnly]
    #[name = "LargeTypeWindow"]
    pub struct LargeTypeWindow;

    impl LargeTypeWindow {
        #[unsafe(method(canBecomeKeyWindow))]
        fn can_become_key_window(&self) -> bool {
            true
        }

        #[unsafe(method(canBecomeMainWindow))]
        fn can_become_main_window(&self) -> bool {
            true
        }
    }
);

impl LargeTypeWindow {
    fn new(mtm: MainThreadMarker, rect: NSRect) -> Retained<Self> {
        let this = Self::alloc(mtm).set_ivars(());
        // SAFETY: NSWindow's designated initializer
        unsafe {
            msg_send![
                super(this),
                initWithContentRect: rect,
                styleMask: NSWindowStyleMask::Borderless,
                backing: NSBackingStoreType::Buffered,
                defer: false
            ]
        }
    }
}

/// Instance variables for LargeTypeView.
/// Uses Cell<T> for interior mutability since objc2 methods take &self.
#[derive(Default)]
struct LargeTypeViewIvars {
    pixel_data: Cell<*mut c_void>,
    buffer_width: Cell<u32>,
    buffer_height: Cell<u32>,
}

define_class!(
    // SAFETY: NSView permits subclassing for custom drawing.
    // We override drawRect: and isOpaque, both designed to be overridden.
    #[unsafe(super(NSView))]
    #[thread_kind = MainThreadOnly]
    #[name = "LargeTypeView"]
    #[ivars = LargeTypeViewIvars]
    pub struct LargeTypeView;

    impl LargeTypeView {
        /// Draw the overlay content from the BGRA pixel buffer
        #[unsafe(method(drawRect:))]
        fn draw_rect(&self, _dirty_rect: NSRect) {
            let ivars = self.ivars();
            let pixel_ptr = ivars.pixel_data.get();
            let width = ivars.buffer_width.get();
            let height = ivars.buffer_height.get();

            if pixel_ptr.is_null() || width == 0 || height == 0 {
                return;
            }

            // SAFETY: pixel_ptr points at MacOSOverlay's bgra_buffer, which is
            // never reallocated and outlives the view
            unsafe {
                let bounds: NSRect = msg_send![self, bounds];
                let color_space = CGColorSpace::create_device_rgb();

                let ctx = CGContext::create_bitmap_context(
                    Some(pixel_ptr),
                    width as usize,
                    height as usize,
                    8,
                    (width * 4) as usize,
                    &color_space,
                    kCGImageAlphaPremultipliedFirst,
                );

                let Some(image) = ctx.create_image() else {
                    return;
                };
                let Some(ns_ctx) = NSGraphicsContext::currentContext() else {
                    return;
                };

                // Bridge NSGraphicsContext.CGContext to core-graphics
                let cg_ctx_ptr: *mut c_void = msg_send![&*ns_ctx, CGContext];
                if cg_ctx_ptr.is_null() {
                    return;
                }
                let cg_ctx = CGContext::from_existing_context_ptr(
                    cg_ctx_ptr as *mut core_graphics::sys::CGContext,
                );

                // The image is in backing pixels; drawing into point bounds scales it
                cg_ctx.draw_image(
                    core_graphics::geometry::CGRect::new(
                        &core_graphics::geometry::CGPoint::new(0.0, 0.0),
                        &core_graphics::geometry::CGSize::new(
                            bounds.size.width,
                            bounds.size.height,
                        ),
                    ),
                    &image,
                );
            }
        }

        /// Report that the view is not opaque to enable transparency
        #[unsafe(method(isOpaque))]
        fn is_opaque(&self) -> bool {
            false
        }
    }
);

impl LargeTypeView {
    fn new(mtm: MainThreadMarker, frame: NSRect) -> Retained<Self> {
        let this = Self::alloc(mtm).set_ivars(LargeTypeViewIvars::default());
        // SAFETY: NSView's designated initializer
        unsafe { msg_send![super(this), initWithFrame: frame] }
    }

    fn set_pixel_data(&self, data: *mut c_void, width: u32, height: u32) {
        let ivars = self.ivars();
        ivars.pixel_data.set(data);
        ivars.buffer_width.set(width);
        ivars.buffer_height.set(height);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// macOS Overlay Implementation
// ─────────────────────────────────────────────────────────────────────────────

pub struct MacOSOverlay {
    app: Retained<NSApplication>,
    window: Retained<LargeTypeWindow>,
    view: Retained<LargeTypeView>,
    /// Backing size in pixels
    width: u32,
    height: u32,
    /// Backing pixels per point
    scale: f32,
    pixel_data: Vec<u8>,  // RGBA from renderer
    bgra_buffer: Vec<u8>, // BGRA for Core Graphics
    pending_dismiss: Option<DismissInput>,
    redraw_requested: bool,
    running: bool,
}

impl MacOSOverlay {
    fn queue_dismiss(&mut self, input: DismissInput) {
        self.pending_dismiss.get_or_insert(input);
    }
}

impl OverlayPlatform for MacOSOverlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        let mtm = MainThreadMarker::new()
            .ok_or_else(|| PlatformError::Other("overlay must run on the main thread".into()))?;

        let app = NSApplication::sharedApplication(mtm);
        app.setActivationPolicy(NSApplicationActivationPolicy::Accessory);

        // The first screen carries the menu bar and sits at the origin
        let screen = NSScreen::screens(mtm)
            .firstObject()
            .ok_or(PlatformError::NoDisplay)?;
        let frame = screen.frame();
        let scale = screen.backingScaleFactor();
        let width = (frame.size.width * scale).round() as u32;
        let height = (frame.size.height * scale).round() as u32;
        tracing::debug!(width, height, scale, "macOS overlay geometry");

        let window = LargeTypeWindow::new(mtm, frame);
        let view_rect = NSRect::new(NSPoint::new(0.0, 0.0), frame.size);
        let view = LargeTypeView::new(mtm, view_rect);

        // SAFETY: plain property setters on a window we own, on the main thread
        unsafe {
            window.setReleasedWhenClosed(false);
            window.setLevel(OVERLAY_WINDOW_LEVEL);
            window.setBackgroundColor(Some(&NSColor::clearColor()));
            window.setOpaque(false);
            window.setHasShadow(false);
            window.setIgnoresMouseEvents(false);
            window.setTitle(&NSString::from_str(&config.title));
            window.setCollectionBehavior(
                NSWindowCollectionBehavior::CanJoinAllSpaces
                    | NSWindowCollectionBehavior::FullScreenAuxiliary
                    | NSWindowCollectionBehavior::Stationary
                    | NSWindowCollectionBehavior::IgnoresCycle,
            );
            window.setContentView(Some(&view));
            window.makeKeyAndOrderFront(None);

            #[allow(deprecated)]
            app.activateIgnoringOtherApps(true);
        }

        let size = (width * height * 4) as usize;
        let mut overlay = MacOSOverlay {
            app,
            window,
            view,
            width,
            height,
            scale: scale as f32,
            pixel_data: vec![0u8; size],
            bgra_buffer: vec![0u8; size],
            pending_dismiss: None,
            redraw_requested: true,
            running: true,
        };

        let ptr = overlay.bgra_buffer.as_mut_ptr() as *mut c_void;
        overlay.view.set_pixel_data(ptr, width, height);

        Ok(overlay)
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
        Some(&mut self.pixel_data)
    }

    fn commit(&mut self) {
        // Renderer output is already premultiplied; only swap to BGRA
        for (src, dst) in self
            .pixel_data
            .chunks_exact(4)
            .zip(self.bgra_buffer.chunks_exact_mut(4))
        {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
            dst[3] = src[3];
        }

        self.view.setNeedsDisplay(true);
    }

    fn poll_events(&mut self) -> bool {
        let our_window = self.window.windowNumber();

        loop {
            // SAFETY: NSDefaultRunLoopMode is an immutable framework constant
            let event = unsafe {
                self.app.nextEventMatchingMask_untilDate_inMode_dequeue(
                    NSEventMask::Any,
                    None,
                    NSDefaultRunLoopMode,
                    true,
                )
            };
            let Some(event) = event else {
                break;
            };

            // SAFETY: read-only accessors on a live event
            let (window_number, event_type, key_code) =
                unsafe { (event.windowNumber(), event.r#type(), event.keyCode()) };

            if window_number == our_window {
                match event_type {
                    NSEventType::LeftMouseDown => {
                        self.queue_dismiss(DismissInput::PrimaryClick);
                    }
                    NSEventType::KeyDown => {
                        // Swallow keys so AppKit does not beep
                        if key_code == ESCAPE_KEY_CODE {
                            self.queue_dismiss(DismissInput::EscapeKey);
                        }
                        continue;
                    }
                    _ => {}
                }
            }

            self.app.sendEvent(&event);
        }

        if !self.window.isVisible() {
            self.running = false;
        }
        self.running
    }

    fn take_dismiss(&mut self) -> Option<DismissInput> {
        self.pending_dismiss.take()
    }

    fn take_redraw_requested(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }
}

impl Drop for MacOSOverlay {
    fn drop(&mut self) {
        self.view.set_pixel_data(std::ptr::null_mut(), 0, 0);
        self.window.close();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Global Escape Listener
// ─────────────────────────────────────────────────────────────────────────────

/// Global NSEvent monitor for key-down events in other applications.
///
/// Key events only reach global monitors once the process has been granted
/// Accessibility access; without it the monitor installs but stays silent.
pub struct MacOSEscapeListener {
    monitor: Retained<AnyObject>,
    pressed: Arc<AtomicBool>,
}

impl GlobalEscapeListener for MacOSEscapeListener {
    fn install() -> Result<Self, PlatformError> {
        let pressed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&pressed);

        let handler = RcBlock::new(move |event: NonNull<NSEvent>| {
            // SAFETY: AppKit passes a valid event for the duration of the call
            let key_code = unsafe { event.as_ref().keyCode() };
            if key_code == ESCAPE_KEY_CODE {
                flag.store(true, Ordering::SeqCst);
            }
        });

        // SAFETY: the block is retained by AppKit until removeMonitor:
        let monitor = unsafe {
            NSEvent::addGlobalMonitorForEventsMatchingMask_handler(NSEventMask::KeyDown, &handler)
        }
        .ok_or_else(|| PlatformError::Other("global event monitor refused".into()))?;

        tracing::debug!("Installed global key monitor");
        Ok(Self { monitor, pressed })
    }

    fn take_pressed(&mut self) -> bool {
        self.pressed.swap(false, Ordering::SeqCst)
    }
}

impl Drop for MacOSEscapeListener {
    fn drop(&mut self) {
        // SAFETY: the monitor was returned by addGlobalMonitorForEventsMatchingMask
        unsafe { NSEvent::removeMonitor(&self.monitor) };
    }
}
