//! Wayland platform implementation using layer-shell protocol
//!
//! This provides the overlay on Wayland compositors that support the
//! wlr-layer-shell protocol (wlroots-based compositors like Hyprland, Sway, etc.)
//! The surface lives on the Overlay layer, stretched across one output, and
//! takes exclusive keyboard focus while mapped.

use std::os::fd::AsFd;

use rustix::fs::{MemfdFlags, memfd_create};
use rustix::mm::{MapFlags, ProtFlags, mmap};
use wayland_client::globals::GlobalListContents;
use wayland_client::protocol::wl_buffer::WlBuffer;
use wayland_client::protocol::wl_compositor::WlCompositor;
use wayland_client::protocol::wl_keyboard::{self, WlKeyboard};
use wayland_client::protocol::wl_output::{self, WlOutput};
use wayland_client::protocol::wl_pointer::{self, WlPointer};
use wayland_client::protocol::wl_registry;
use wayland_client::protocol::wl_seat::{self, WlSeat};
use wayland_client::protocol::wl_shm::{Format, WlShm};
use wayland_client::protocol::wl_shm_pool::WlShmPool;
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{Connection, Dispatch, EventQueue, QueueHandle, WEnum};
use wayland_protocols::xdg::xdg_output::zv1::client::{
    zxdg_output_manager_v1::ZxdgOutputManagerV1,
    zxdg_output_v1::{self, ZxdgOutputV1},
};
use wayland_protocols_wlr::layer_shell::v1::client::{
    zwlr_layer_shell_v1::{Layer, ZwlrLayerShellV1},
    zwlr_layer_surface_v1::{self, Anchor, KeyboardInteractivity, ZwlrLayerSurfaceV1},
};

use super::{DismissInput, MonitorInfo, OverlayConfig, OverlayPlatform, PlatformError, find_primary};

/// Linux input event code for the left mouse button
const BTN_LEFT: u32 = 272;

/// Linux input event code for Escape
const KEY_ESC: u32 = 1;

/// Partial output info (built up from events before done)
#[derive(Debug, Clone, Default)]
struct OutputInfo {
    /// Global name from the registry
    name: u32,
    /// Connector name (e.g., "HDMI-A-1", "eDP-2")
    connector_name: String,
    /// Position in global coordinate space (from xdg-output if available, else wl_output)
    x: i32,
    y: i32,
    physical_width: i32,
    physical_height: i32,
    /// Logical dimensions from xdg-output (more accurate than physical/scale)
    xdg_logical_width: i32,
    xdg_logical_height: i32,
    scale: i32,
    done: bool,
}

impl OutputInfo {
    fn logical_width(&self) -> i32 {
        if self.xdg_logical_width > 0 {
            self.xdg_logical_width
        } else {
            self.physical_width / self.scale.max(1)
        }
    }

    fn logical_height(&self) -> i32 {
        if self.xdg_logical_height > 0 {
            self.xdg_logical_height
        } else {
            self.physical_height / self.scale.max(1)
        }
    }

    fn to_monitor(&self) -> MonitorInfo {
        MonitorInfo {
            name: if self.connector_name.is_empty() {
                format!("output-{}", self.name)
            } else {
                self.connector_name.clone()
            },
            x: self.x,
            y: self.y,
            width: self.logical_width().max(0) as u32,
            height: self.logical_height().max(0) as u32,
            // Wayland has no primary output; the one at the origin stands in
            is_primary: self.x == 0 && self.y == 0,
        }
    }
}

struct ShmBuffer {
    ptr: *mut u8,
    size: usize,
}

/// Internal state for Wayland event handling
struct WaylandState {
    running: bool,
    configured: bool,
    width: u32,
    height: u32,
    /// Size from the latest configure that the buffer does not match yet
    pending_size: Option<(u32, u32)>,

    shm: Option<WlShm>,
    surface: Option<WlSurface>,
    layer_surface: Option<ZwlrLayerSurfaceV1>,
    buffer: Option<WlBuffer>,
    keyboard: Option<WlKeyboard>,
    pointer: Option<WlPointer>,

    outputs: Vec<(WlOutput, OutputInfo)>,
    xdg_outputs: Vec<ZxdgOutputV1>,

    // Pixel buffer (RGBA format for rendering, converted to ARGB for Wayland)
    pixel_data: Vec<u8>,
    shm_data: Option<ShmBuffer>,

    pending_dismiss: Option<DismissInput>,
    redraw_requested: bool,
}

impl WaylandState {
    fn new() -> Self {
        Self {
            running: true,
            configured: false,
            width: 0,
            height: 0,
            pending_size: None,
            shm: None,
            surface: None,
            layer_surface: None,
            buffer: None,
            keyboard: None,
            pointer: None,
            outputs: Vec::new(),
            xdg_outputs: Vec::new(),
            pixel_data: Vec::new(),
            shm_data: None,
            pending_dismiss: None,
            redraw_requested: false,
        }
    }

    fn queue_dismiss(&mut self, input: DismissInput) {
        self.pending_dismiss.get_or_insert(input);
    }

    fn release_buffer(&mut self) {
        if let Some(old_buffer) = self.buffer.take() {
            old_buffer.destroy();
        }
        if let Some(old_shm) = self.shm_data.take() {
            // SAFETY: the mapping is not referenced after this point
            unsafe {
                rustix::mm::munmap(old_shm.ptr as *mut _, old_shm.size).ok();
            }
        }
    }

    fn create_shm_buffer(
        &mut self,
        qh: &QueueHandle<WaylandState>,
        width: u32,
        height: u32,
    ) -> Result<(), PlatformError> {
        let Some(shm) = self.shm.clone() else {
            return Err(PlatformError::UnsupportedFeature("wl_shm".to_string()));
        };

        self.release_buffer();

        let stride = width * 4;
        let size = (stride * height) as usize;

        let fd = memfd_create(c"largetype-overlay-buffer", MemfdFlags::CLOEXEC)
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

        self.shm_data = Some(ShmBuffer {
            ptr: ptr as *mut u8,
            size,
        });

        let pool = shm.create_pool(fd.as_fd(), size as i32, qh, ());
        self.buffer = Some(pool.create_buffer(
            0,
            width as i32,
            height as i32,
            stride as i32,
            Format::Argb8888,
            qh,
            (),
        ));
        pool.destroy();

        self.width = width;
        self.height = height;
        self.pixel_data = vec![0u8; size];
        self.redraw_requested = true;
        Ok(())
    }

    fn copy_pixels_to_shm(&mut self) {
        let Some(shm) = &self.shm_data else {
            return;
        };

        // SAFETY: ptr/size describe the live mapping created in create_shm_buffer
        let shm_slice = unsafe { std::slice::from_raw_parts_mut(shm.ptr, shm.size) };

        // Convert RGBA to BGRA (Wayland ARGB8888 is BGRA in little-endian)
        for (src, dst) in self.pixel_data.chunks_exact(4).zip(shm_slice.chunks_exact_mut(4)) {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
            dst[3] = src[3];
        }
    }

    fn commit_frame(&self) {
        if let (Some(surface), Some(buffer)) = (&self.surface, &self.buffer) {
            surface.attach(Some(buffer), 0, 0);
            surface.damage_buffer(0, 0, self.width as i32, self.height as i32);
            surface.commit();
        }
    }
}

/// Wayland overlay implementation
pub struct WaylandOverlay {
    connection: Connection,
    event_queue: EventQueue<WaylandState>,
    state: WaylandState,
    qh: QueueHandle<WaylandState>,
}

impl WaylandOverlay {
    /// Resize the buffer to the latest configured size
    fn apply_pending_size(&mut self) -> Result<(), PlatformError> {
        if let Some((width, height)) = self.state.pending_size.take() {
            tracing::debug!(width, height, "Wayland surface configured");
            self.state.create_shm_buffer(&self.qh, width, height)?;
        }
        Ok(())
    }
}

impl OverlayPlatform for WaylandOverlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        let connection = Connection::connect_to_env()
            .map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;

        let (globals, mut event_queue) =
            wayland_client::globals::registry_queue_init::<WaylandState>(&connection)
                .map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;

        let qh = event_queue.handle();
        let mut state = WaylandState::new();

        let compositor: WlCompositor = globals
            .bind(&qh, 4..=6, ())
            .map_err(|_| PlatformError::UnsupportedFeature("wl_compositor".to_string()))?;

        let layer_shell: ZwlrLayerShellV1 = globals
            .bind(&qh, 1..=4, ())
            .map_err(|_| PlatformError::UnsupportedFeature("zwlr_layer_shell_v1".to_string()))?;

        let shm: WlShm = globals
            .bind(&qh, 1..=1, ())
            .map_err(|_| PlatformError::UnsupportedFeature("wl_shm".to_string()))?;
        state.shm = Some(shm);

        // Input devices are requested once the seat reports its capabilities
        if globals.bind::<WlSeat, _, _>(&qh, 1..=7, ()).is_err() {
            tracing::warn!("No wl_seat; the overlay can only be dismissed by timeout");
        }

        let xdg_output_manager = globals
            .bind::<ZxdgOutputManagerV1, _, _>(&qh, 1..=3, ())
            .ok();

        for global in globals.contents().clone_list() {
            if global.interface == "wl_output" {
                let output: WlOutput =
                    globals
                        .registry()
                        .bind(global.name, global.version.min(4), &qh, global.name);
                let info = OutputInfo {
                    name: global.name,
                    ..Default::default()
                };
                state.outputs.push((output, info));
            }
        }

        if let Some(manager) = &xdg_output_manager {
            for (output, info) in &state.outputs {
                let xdg_output = manager.get_xdg_output(output, &qh, info.name);
                state.xdg_outputs.push(xdg_output);
            }
        }

        // wl_output events, then xdg_output events and done
        for _ in 0..2 {
            event_queue
                .roundtrip(&mut state)
                .map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;
        }

        let monitors: Vec<MonitorInfo> = state
            .outputs
            .iter()
            .filter(|(_, info)| info.done)
            .map(|(_, info)| info.to_monitor())
            .collect();
        let target_output = find_primary(&monitors).and_then(|primary| {
            state
                .outputs
                .iter()
                .find(|(_, info)| info.to_monitor() == *primary)
                .map(|(output, _)| output.clone())
        });
        if target_output.is_none() {
            tracing::debug!("No output at the origin, letting compositor choose");
        }

        let surface = compositor.create_surface(&qh, ());
        let layer_surface = layer_shell.get_layer_surface(
            &surface,
            target_output.as_ref(),
            Layer::Overlay,
            config.namespace.clone(),
            &qh,
            (),
        );

        // Size 0 on an axis anchored to both edges means "fill the output"
        layer_surface.set_anchor(Anchor::Top | Anchor::Bottom | Anchor::Left | Anchor::Right);
        layer_surface.set_size(0, 0);
        layer_surface.set_exclusive_zone(-1);
        layer_surface.set_keyboard_interactivity(KeyboardInteractivity::Exclusive);
        surface.commit();

        state.surface = Some(surface);
        state.layer_surface = Some(layer_surface);

        let mut overlay = Self {
            connection,
            event_queue,
            state,
            qh,
        };

        // The layer-shell protocol requires the initial configure before attaching a buffer
        while !overlay.state.configured {
            overlay
                .event_queue
                .blocking_dispatch(&mut overlay.state)
                .map_err(|e| PlatformError::ConnectionFailed(e.to_string()))?;
            if !overlay.state.running {
                return Err(PlatformError::Other(
                    "layer surface closed before configure".to_string(),
                ));
            }
        }
        overlay.apply_pending_size()?;

        Ok(overlay)
    }

    fn width(&self) -> u32 {
        self.state.width
    }

    fn height(&self) -> u32 {
        self.state.height
    }

    fn pixel_buffer(&mut self) -> Option<&mut [u8]> {
        if self.state.shm_data.is_none() {
            return None;
        }
        Some(&mut self.state.pixel_data)
    }

    fn commit(&mut self) {
        self.state.copy_pixels_to_shm();
        self.state.commit_frame();
        let _ = self.connection.flush();
    }

    fn poll_events(&mut self) -> bool {
        if self.connection.flush().is_err() {
            return false;
        }

        loop {
            if let Some(guard) = self.event_queue.prepare_read() {
                match guard.read() {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(_) => break, // Would block
                }
            }

            match self.event_queue.dispatch_pending(&mut self.state) {
                Ok(0) => break,
                Ok(_) => {}
                Err(_) => return false,
            }
        }

        if let Err(e) = self.apply_pending_size() {
            tracing::error!(error = %e, "Failed to resize Wayland buffer");
            return false;
        }

        self.state.running
    }

    fn take_dismiss(&mut self) -> Option<DismissInput> {
        self.state.pending_dismiss.take()
    }

    fn take_redraw_requested(&mut self) -> bool {
        std::mem::take(&mut self.state.redraw_requested)
    }
}

impl Drop for WaylandOverlay {
    fn drop(&mut self) {
        if let Some(layer_surface) = self.state.layer_surface.take() {
            layer_surface.destroy();
        }
        if let Some(surface) = self.state.surface.take() {
            surface.destroy();
        }
        self.state.release_buffer();
        let _ = self.connection.flush();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event Dispatch
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! impl_empty_dispatch {
    ($proxy:ty, $data:ty, $state:ty) => {
        impl Dispatch<$proxy, $data> for $state {
            fn event(
                _: &mut Self,
                _: &$proxy,
                _: <$proxy as wayland_client::Proxy>::Event,
                _: &$data,
                _: &Connection,
                _: &QueueHandle<Self>,
            ) {
            }
        }
    };
}

impl_empty_dispatch!(wl_registry::WlRegistry, GlobalListContents, WaylandState);
impl_empty_dispatch!(WlCompositor, (), WaylandState);
impl_empty_dispatch!(WlSurface, (), WaylandState);
impl_empty_dispatch!(WlShm, (), WaylandState);
impl_empty_dispatch!(WlShmPool, (), WaylandState);
impl_empty_dispatch!(WlBuffer, (), WaylandState);
impl_empty_dispatch!(ZwlrLayerShellV1, (), WaylandState);
impl_empty_dispatch!(ZxdgOutputManagerV1, (), WaylandState);

impl Dispatch<WlOutput, u32> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &WlOutput,
        event: wl_output::Event,
        name: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some((_, info)) = state.outputs.iter_mut().find(|(_, o)| o.name == *name) else {
            return;
        };

        match event {
            wl_output::Event::Geometry { x, y, .. } => {
                // xdg-output positions are logical and take precedence
                if info.xdg_logical_width == 0 {
                    info.x = x;
                    info.y = y;
                }
            }
            wl_output::Event::Mode {
                flags,
                width,
                height,
                ..
            } => {
                if let WEnum::Value(mode_flags) = flags
                    && mode_flags.contains(wl_output::Mode::Current)
                {
                    info.physical_width = width;
                    info.physical_height = height;
                }
            }
            wl_output::Event::Scale { factor } => {
                info.scale = factor;
            }
            wl_output::Event::Name { name } => {
                info.connector_name = name;
            }
            wl_output::Event::Done => {
                info.done = true;
                tracing::trace!(
                    output = %info.connector_name,
                    x = info.x,
                    y = info.y,
                    width = info.logical_width(),
                    height = info.logical_height(),
                    "Output ready"
                );
            }
            _ => {}
        }
    }
}

/// xdg_output events - data contains the global name of the associated wl_output
impl Dispatch<ZxdgOutputV1, u32> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &ZxdgOutputV1,
        event: zxdg_output_v1::Event,
        name: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        let Some((_, info)) = state.outputs.iter_mut().find(|(_, o)| o.name == *name) else {
            return;
        };

        match event {
            zxdg_output_v1::Event::LogicalPosition { x, y } => {
                info.x = x;
                info.y = y;
            }
            zxdg_output_v1::Event::LogicalSize { width, height } => {
                info.xdg_logical_width = width;
                info.xdg_logical_height = height;
            }
            zxdg_output_v1::Event::Name { name } if !name.is_empty() => {
                info.connector_name = name;
            }
            _ => {}
        }
    }
}

impl Dispatch<ZwlrLayerSurfaceV1, ()> for WaylandState {
    fn event(
        state: &mut Self,
        proxy: &ZwlrLayerSurfaceV1,
        event: zwlr_layer_surface_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            zwlr_layer_surface_v1::Event::Configure {
                serial,
                width,
                height,
            } => {
                proxy.ack_configure(serial);

                if width > 0 && height > 0 && (width, height) != (state.width, state.height) {
                    state.pending_size = Some((width, height));
                }
                state.redraw_requested = true;
                state.configured = true;
            }
            zwlr_layer_surface_v1::Event::Closed => {
                state.running = false;
            }
            _ => {}
        }
    }
}

impl Dispatch<WlSeat, ()> for WaylandState {
    fn event(
        state: &mut Self,
        seat: &WlSeat,
        event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_seat::Event::Capabilities {
            capabilities: WEnum::Value(caps),
        } = event
        {
            if caps.contains(wl_seat::Capability::Keyboard) && state.keyboard.is_none() {
                state.keyboard = Some(seat.get_keyboard(qh, ()));
            }
            if caps.contains(wl_seat::Capability::Pointer) && state.pointer.is_none() {
                state.pointer = Some(seat.get_pointer(qh, ()));
            }
        }
    }
}

impl Dispatch<WlKeyboard, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &WlKeyboard,
        event: wl_keyboard::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_keyboard::Event::Key {
            key,
            state: WEnum::Value(wl_keyboard::KeyState::Pressed),
            ..
        } = event
            && key == KEY_ESC
        {
            state.queue_dismiss(DismissInput::EscapeKey);
        }
    }
}

impl Dispatch<WlPointer, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _proxy: &WlPointer,
        event: wl_pointer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_pointer::Event::Button {
            button,
            state: WEnum::Value(wl_pointer::ButtonState::Pressed),
            ..
        } = event
            && button == BTN_LEFT
        {
            state.queue_dismiss(DismissInput::PrimaryClick);
        }
    }
}
