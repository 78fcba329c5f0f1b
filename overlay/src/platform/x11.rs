//! X11 platform implementation for overlay windows
//!
//! Uses XCB via x11rb for a transparent, override-redirect window covering
//! the primary monitor. Requires a compositor for transparency.

use std::fs::File;
use std::os::fd::AsFd;

use rustix::fs::{MemfdFlags, memfd_create};
use rustix::mm::{MapFlags, ProtFlags, mmap};
use x11rb::atom_manager;
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::shm::{self, ConnectionExt as _};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use super::{
    DismissInput, GlobalEscapeListener, MonitorInfo, OverlayConfig, OverlayPlatform,
    PlatformError, find_primary,
};

/// XK_Escape
const ESCAPE_KEYSYM: u32 = 0xff1b;

/// Escape on a standard evdev keymap, used when the mapping lookup fails
const FALLBACK_ESCAPE_KEYCODE: Keycode = 9;

/// Lock modifier combinations that must not stop a grab from matching
fn lock_masks() -> [ModMask; 4] {
    [
        ModMask::from(0u16),         // No lock keys
        ModMask::M2,                 // NumLock
        ModMask::LOCK,               // CapsLock
        ModMask::M2 | ModMask::LOCK, // Both
    ]
}

// Atoms needed for EWMH hints
atom_manager! {
    pub AtomCollection: AtomCollectionCookie {
        _NET_WM_NAME,
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_SPLASH,
        _NET_WM_STATE,
        _NET_WM_STATE_ABOVE,
        _NET_WM_STATE_FULLSCREEN,
        _NET_WM_STATE_SKIP_TASKBAR,
        _NET_WM_STATE_SKIP_PAGER,
        UTF8_STRING,
        ATOM,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Monitor Enumeration
// ─────────────────────────────────────────────────────────────────────────────

fn get_monitors(conn: &RustConnection, root: Window) -> Vec<MonitorInfo> {
    let Ok(monitors) = conn.randr_get_monitors(root, true) else {
        return Vec::new();
    };
    let Ok(monitors) = monitors.reply() else {
        return Vec::new();
    };

    monitors
        .monitors
        .iter()
        .enumerate()
        .map(|(idx, mon)| {
            let name = conn
                .get_atom_name(mon.name)
                .ok()
                .and_then(|r| r.reply().ok())
                .map(|r| String::from_utf8_lossy(&r.name).to_string())
                .unwrap_or_else(|| format!("Monitor {}", idx + 1));

            MonitorInfo {
                name,
                x: mon.x as i32,
                y: mon.y as i32,
                width: mon.width as u32,
                height: mon.height as u32,
                is_primary: mon.primary,
            }
        })
        .collect()
}

/// Find the keycode currently mapped to Escape
fn escape_keycode(conn: &RustConnection) -> Keycode {
    let setup = conn.setup();
    let min = setup.min_keycode;
    let count = setup.max_keycode.saturating_sub(min).saturating_add(1);

    let Ok(reply) = conn
        .get_keyboard_mapping(min, count)
        .map_err(|e| e.to_string())
        .and_then(|c| c.reply().map_err(|e| e.to_string()))
    else {
        return FALLBACK_ESCAPE_KEYCODE;
    };

    let per = reply.keysyms_per_keycode as usize;
    if per == 0 {
        return FALLBACK_ESCAPE_KEYCODE;
    }

    reply
        .keysyms
        .chunks(per)
        .position(|syms| syms.contains(&ESCAPE_KEYSYM))
        .map(|idx| min.saturating_add(idx as u8))
        .unwrap_or(FALLBACK_ESCAPE_KEYCODE)
}

// ─────────────────────────────────────────────────────────────────────────────
// X11 Overlay Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// SHM buffer for efficient pixel transfer
struct ShmBuffer {
    seg_id: shm::Seg,
    ptr: *mut u8,
    size: usize,
}

pub struct X11Overlay {
    conn: RustConnection,
    window: Window,
    gc: Gcontext,
    width: u32,
    height: u32,
    depth: u8,
    escape_keycode: Keycode,

    // Pixel buffers
    pixel_data: Vec<u8>, // RGBA from renderer
    shm_buffer: ShmBuffer,

    pending_dismiss: Option<DismissInput>,
    redraw_requested: bool,
    running: bool,
}

impl X11Overlay {
    /// Find a 32-bit ARGB visual for transparency
    fn find_argb_visual(screen: &Screen) -> Option<(Visualid, u8)> {
        for depth in &screen.allowed_depths {
            if depth.depth == 32 {
                for visual in &depth.visuals {
                    if visual.class == VisualClass::TRUE_COLOR {
                        return Some((visual.visual_id, depth.depth));
                    }
                }
            }
        }
        None
    }

    /// Create a shared memory buffer for efficient pixel transfer
    fn create_shm_buffer(
        conn: &RustConnection,
        width: u32,
        height: u32,
    ) -> Result<ShmBuffer, PlatformError> {
        let size = (width * height * 4) as usize;

        let fd = memfd_create(c"largetype-x11-buffer", MemfdFlags::CLOEXEC)
            .map_err(|e| PlatformError::BufferError(format!("memfd_create failed: {}", e)))?;

        rustix::fs::ftruncate(&fd, size as u64)
            .map_err(|e| PlatformError::BufferError(format!("ftruncate failed: {}", e)))?;

        // SAFETY: fresh shared mapping of a memfd we just sized
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                fd.as_fd(),
                0,
            )
            .map_err(|e| PlatformError::BufferError(format!("mmap failed: {}", e)))?
        };

        let seg_id = conn
            .generate_id()
            .map_err(|e| PlatformError::BufferError(e.to_string()))?;

        // x11rb shm_attach_fd takes ownership of the fd
        let file = File::from(fd);
        conn.shm_attach_fd(seg_id, file, false)
            .map_err(|e| PlatformError::BufferError(format!("shm_attach_fd failed: {}", e)))?;

        Ok(ShmBuffer {
            seg_id,
            ptr: ptr as *mut u8,
            size,
        })
    }

    /// Set EWMH hints so compositors treat the window as a topmost fullscreen splash
    fn setup_window_hints(
        &self,
        atoms: &AtomCollection,
        config: &OverlayConfig,
    ) -> Result<(), PlatformError> {
        let err = |e: x11rb::errors::ConnectionError| PlatformError::Other(e.to_string());

        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.window,
                atoms._NET_WM_WINDOW_TYPE,
                atoms.ATOM,
                &[atoms._NET_WM_WINDOW_TYPE_SPLASH],
            )
            .map_err(err)?;

        self.conn
            .change_property32(
                PropMode::REPLACE,
                self.window,
                atoms._NET_WM_STATE,
                atoms.ATOM,
                &[
                    atoms._NET_WM_STATE_ABOVE,
                    atoms._NET_WM_STATE_FULLSCREEN,
                    atoms._NET_WM_STATE_SKIP_TASKBAR,
                    atoms._NET_WM_STATE_SKIP_PAGER,
                ],
            )
            .map_err(err)?;

        self.conn
            .change_property8(
                PropMode::REPLACE,
                self.window,
                atoms._NET_WM_NAME,
                atoms.UTF8_STRING,
                config.title.as_bytes(),
            )
            .map_err(err)?;

        // WM_CLASS is instance\0class\0
        let class = format!("{0}\0{0}\0", config.namespace);
        self.conn
            .change_property8(
                PropMode::REPLACE,
                self.window,
                AtomEnum::WM_CLASS,
                AtomEnum::STRING,
                class.as_bytes(),
            )
            .map_err(err)?;

        Ok(())
    }

    fn queue_dismiss(&mut self, input: DismissInput) {
        self.pending_dismiss.get_or_insert(input);
    }
}

impl OverlayPlatform for X11Overlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        let (conn, screen_num) =
            x11rb::connect(None).map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;

        let atoms = AtomCollection::new(&conn)
            .map_err(|e| PlatformError::Other(e.to_string()))?
            .reply()
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        let setup = conn.setup();
        let screen = &setup.roots[screen_num];
        let root = screen.root;

        conn.shm_query_version()
            .map_err(|_| PlatformError::UnsupportedFeature("SHM extension".into()))?
            .reply()
            .map_err(|_| PlatformError::UnsupportedFeature("SHM extension".into()))?;

        let (visual, depth) = Self::find_argb_visual(screen)
            .ok_or_else(|| PlatformError::UnsupportedFeature("32-bit ARGB visual".into()))?;

        let colormap = conn
            .generate_id()
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        conn.create_colormap(ColormapAlloc::NONE, colormap, root, visual)
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        // Cover the primary monitor, or the whole root window without RandR
        let monitors = get_monitors(&conn, root);
        let (x, y, width, height) = match find_primary(&monitors) {
            Some(m) => (m.x, m.y, m.width, m.height),
            None => (
                0,
                0,
                screen.width_in_pixels as u32,
                screen.height_in_pixels as u32,
            ),
        };
        tracing::debug!(x, y, width, height, "X11 overlay geometry");

        let window = conn
            .generate_id()
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        let win_aux = CreateWindowAux::new()
            .background_pixel(0)
            .border_pixel(0)
            .colormap(colormap)
            .event_mask(
                EventMask::EXPOSURE
                    | EventMask::BUTTON_PRESS
                    | EventMask::KEY_PRESS
                    | EventMask::STRUCTURE_NOTIFY,
            )
            .override_redirect(1);

        conn.create_window(
            depth,
            window,
            root,
            x as i16,
            y as i16,
            width as u16,
            height as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            visual,
            &win_aux,
        )
        .map_err(|e| PlatformError::Other(e.to_string()))?;

        let gc = conn
            .generate_id()
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        conn.create_gc(gc, window, &CreateGCAux::new())
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        let shm_buffer = Self::create_shm_buffer(&conn, width, height)?;
        let escape_keycode = escape_keycode(&conn);

        let overlay = Self {
            conn,
            window,
            gc,
            width,
            height,
            depth,
            escape_keycode,
            pixel_data: vec![0u8; (width * height * 4) as usize],
            shm_buffer,
            pending_dismiss: None,
            redraw_requested: true,
            running: true,
        };

        overlay.setup_window_hints(&atoms, &config)?;

        overlay
            .conn
            .map_window(window)
            .map_err(|e| PlatformError::Other(e.to_string()))?;
        overlay
            .conn
            .configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        // Override-redirect windows never get focus from the window manager
        let _ = overlay
            .conn
            .set_input_focus(InputFocus::PARENT, window, x11rb::CURRENT_TIME);

        overlay
            .conn
            .flush()
            .map_err(|e| PlatformError::Other(e.to_string()))?;

        Ok(overlay)
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_buffer(&mut self) -> Option<&mut [u8]> {
        Some(&mut self.pixel_data)
    }

    fn commit(&mut self) {
        // SAFETY: ptr/size describe the live mapping created in create_shm_buffer
        let shm_slice =
            unsafe { std::slice::from_raw_parts_mut(self.shm_buffer.ptr, self.shm_buffer.size) };

        // Convert RGBA to BGRA directly into SHM buffer
        for (src, dst) in self.pixel_data.chunks_exact(4).zip(shm_slice.chunks_exact_mut(4)) {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
            dst[3] = src[3];
        }

        let _ = self.conn.shm_put_image(
            self.window,
            self.gc,
            self.width as u16,
            self.height as u16,
            0,
            0,
            self.width as u16,
            self.height as u16,
            0,
            0,
            self.depth,
            ImageFormat::Z_PIXMAP.into(),
            false,
            self.shm_buffer.seg_id,
            0,
        );
        let _ = self.conn.flush();
    }

    fn poll_events(&mut self) -> bool {
        while let Ok(Some(event)) = self.conn.poll_for_event() {
            match event {
                Event::ButtonPress(e) if e.detail == 1 => {
                    self.queue_dismiss(DismissInput::PrimaryClick);
                }
                Event::KeyPress(e) if e.detail == self.escape_keycode => {
                    self.queue_dismiss(DismissInput::EscapeKey);
                }
                Event::Expose(e) if e.count == 0 => {
                    self.redraw_requested = true;
                }
                Event::DestroyNotify(e) if e.window == self.window => {
                    self.running = false;
                    return false;
                }
                _ => {}
            }
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

impl Drop for X11Overlay {
    fn drop(&mut self) {
        let _ = self.conn.shm_detach(self.shm_buffer.seg_id);
        // SAFETY: the mapping is not used after this point
        unsafe {
            rustix::mm::munmap(self.shm_buffer.ptr as *mut _, self.shm_buffer.size).ok();
        }

        let _ = self.conn.destroy_window(self.window);
        let _ = self.conn.free_gc(self.gc);
        let _ = self.conn.flush();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Global Escape Listener
// ─────────────────────────────────────────────────────────────────────────────

/// Passive grab of Escape on the root window over a dedicated connection.
///
/// The grab fires no matter which client holds focus. Lock modifiers are
/// grabbed in every combination since X11 treats them as distinct bindings.
pub struct X11EscapeListener {
    conn: RustConnection,
    root: Window,
    keycode: Keycode,
}

impl GlobalEscapeListener for X11EscapeListener {
    fn install() -> Result<Self, PlatformError> {
        let (conn, screen_num) =
            x11rb::connect(None).map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;
        let root = conn.setup().roots[screen_num].root;
        let keycode = escape_keycode(&conn);

        for mask in lock_masks() {
            conn.grab_key(
                false,
                root,
                mask,
                keycode,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )
            .map_err(|e| PlatformError::Other(e.to_string()))?
            .check()
            .map_err(|e| PlatformError::Other(format!("Escape grab refused: {}", e)))?;
        }

        tracing::debug!(keycode, "Installed X11 Escape grab");
        Ok(Self {
            conn,
            root,
            keycode,
        })
    }

    fn take_pressed(&mut self) -> bool {
        let mut pressed = false;
        while let Ok(Some(event)) = self.conn.poll_for_event() {
            if matches!(event, Event::KeyPress(e) if e.detail == self.keycode) {
                pressed = true;
            }
        }
        pressed
    }
}

impl Drop for X11EscapeListener {
    fn drop(&mut self) {
        for mask in lock_masks() {
            let _ = self.conn.ungrab_key(self.keycode, self.root, mask);
        }
        let _ = self.conn.flush();
    }
}
