//! Windows platform implementation for overlay windows
//!
//! Uses the Win32 API to create a layered, topmost popup covering the
//! primary monitor, plus a low-level keyboard hook for global Escape.

use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

use windows::Win32::Foundation::{
    BOOL, COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, POINT, RECT, SIZE, WPARAM,
};
use windows::Win32::Graphics::Gdi::{
    AC_SRC_ALPHA, AC_SRC_OVER, BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BLENDFUNCTION,
    CreateCompatibleDC, CreateDIBSection, DIB_RGB_COLORS, DeleteDC, DeleteObject,
    EnumDisplayMonitors, GetDC, GetMonitorInfoW, HBITMAP, HDC, HMONITOR, MONITORINFOEXW,
    ReleaseDC, SelectObject, SetDIBits,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::VK_ESCAPE;
use windows::Win32::UI::WindowsAndMessaging::{
    CS_HREDRAW, CS_VREDRAW, CallNextHookEx, CreateWindowExW, DefWindowProcW, DestroyWindow,
    DispatchMessageW, HC_ACTION, HHOOK, IDC_ARROW, KBDLLHOOKSTRUCT, LoadCursorW, MSG, PM_REMOVE,
    PeekMessageW, PostQuitMessage, RegisterClassExW, SW_SHOW, SetForegroundWindow,
    SetWindowsHookExW, ShowWindow, TranslateMessage, ULW_ALPHA, UnhookWindowsHookEx,
    UpdateLayeredWindow, WH_KEYBOARD_LL, WM_CLOSE, WM_ERASEBKGND, WM_KEYDOWN, WM_LBUTTONDOWN,
    WM_QUIT, WM_SYSKEYDOWN, WNDCLASSEXW, WS_EX_LAYERED, WS_EX_TOOLWINDOW, WS_EX_TOPMOST,
    WS_POPUP,
};
use windows::core::PCWSTR;

use super::{
    DismissInput, GlobalEscapeListener, MonitorInfo, OverlayConfig, OverlayPlatform,
    PlatformError, find_primary,
};

const CLASS_NAME: &str = "LargeTypeOverlayClass";

/// MONITORINFOF_PRIMARY
const MONITOR_PRIMARY_FLAG: u32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Monitor Enumeration
// ─────────────────────────────────────────────────────────────────────────────

/// Callback for EnumDisplayMonitors - collects monitor info into a Vec<MonitorInfo>
unsafe extern "system" fn enum_monitors_callback(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _rect: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    unsafe {
        let monitors = &mut *(lparam.0 as *mut Vec<MonitorInfo>);

        let mut info = MONITORINFOEXW::default();
        info.monitorInfo.cbSize = mem::size_of::<MONITORINFOEXW>() as u32;

        if GetMonitorInfoW(hmonitor, &mut info.monitorInfo).as_bool() {
            let rc = info.monitorInfo.rcMonitor;

            let name_len = info
                .szDevice
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(info.szDevice.len());

            monitors.push(MonitorInfo {
                name: String::from_utf16_lossy(&info.szDevice[..name_len]),
                x: rc.left,
                y: rc.top,
                width: (rc.right - rc.left) as u32,
                height: (rc.bottom - rc.top) as u32,
                is_primary: info.monitorInfo.dwFlags & MONITOR_PRIMARY_FLAG != 0,
            });
        }

        BOOL::from(true)
    }
}

fn get_monitors() -> Vec<MonitorInfo> {
    let mut monitors: Vec<MonitorInfo> = Vec::new();
    // SAFETY: the callback only runs during this call while `monitors` is alive
    unsafe {
        let _ = EnumDisplayMonitors(
            None,
            None,
            Some(enum_monitors_callback),
            LPARAM(&mut monitors as *mut Vec<MonitorInfo> as isize),
        );
    }
    monitors
}

// ─────────────────────────────────────────────────────────────────────────────
// Windows Overlay Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Windows overlay implementation.
///
/// Not `Send`: the HWND and its message queue belong to the creating thread.
pub struct WindowsOverlay {
    hwnd: HWND,
    hdc_mem: HDC,
    hbitmap: HBITMAP,
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    pixel_data: Vec<u8>,
    bgra_buffer: Vec<u8>, // Pre-allocated buffer for RGBA->BGRA conversion
    pending_dismiss: Option<DismissInput>,
    redraw_requested: bool,
    running: bool,
}

impl WindowsOverlay {
    fn register_class(hinstance: HINSTANCE) -> Result<(), PlatformError> {
        let class_name = wide_string(CLASS_NAME);
        // SAFETY: class_name outlives the call; window_proc has the required signature
        unsafe {
            let wc = WNDCLASSEXW {
                cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(window_proc),
                hInstance: hinstance,
                hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                ..Default::default()
            };

            if RegisterClassExW(&wc) == 0 {
                let err = std::io::Error::last_os_error();
                // ERROR_CLASS_ALREADY_EXISTS
                if err.raw_os_error() != Some(1410) {
                    return Err(PlatformError::Other(format!(
                        "RegisterClassExW failed: {}",
                        err
                    )));
                }
            }
        }
        Ok(())
    }

    fn bitmap_info(&self) -> BITMAPINFO {
        BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: self.width as i32,
                biHeight: -(self.height as i32), // Top-down DIB
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn create_dib_section(&mut self) -> Result<(), PlatformError> {
        let bmi = self.bitmap_info();
        // SAFETY: all handles are created and released within this block or owned by self
        unsafe {
            let hdc_screen = GetDC(HWND::default());

            self.hdc_mem = CreateCompatibleDC(hdc_screen);
            if self.hdc_mem.is_invalid() {
                ReleaseDC(HWND::default(), hdc_screen);
                return Err(PlatformError::BufferError(
                    "CreateCompatibleDC failed".to_string(),
                ));
            }

            let mut bits: *mut std::ffi::c_void = ptr::null_mut();
            let result = CreateDIBSection(hdc_screen, &bmi, DIB_RGB_COLORS, &mut bits, None, 0);
            ReleaseDC(HWND::default(), hdc_screen);

            self.hbitmap = result.map_err(|e| {
                PlatformError::BufferError(format!("CreateDIBSection failed: {}", e))
            })?;
            SelectObject(self.hdc_mem, self.hbitmap);
        }

        let size = (self.width * self.height * 4) as usize;
        self.pixel_data = vec![0u8; size];
        self.bgra_buffer = vec![0u8; size];
        Ok(())
    }

    fn update_layered_window(&mut self) {
        // Convert RGBA to BGRA using pre-allocated buffer
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

        let bmi = self.bitmap_info();
        // SAFETY: hdc_mem and hbitmap are live for the lifetime of self
        unsafe {
            let hdc_screen = GetDC(HWND::default());

            SetDIBits(
                self.hdc_mem,
                self.hbitmap,
                0,
                self.height,
                self.bgra_buffer.as_ptr() as *const _,
                &bmi,
                DIB_RGB_COLORS,
            );

            // UpdateLayeredWindow for per-pixel alpha
            let pt_src = POINT { x: 0, y: 0 };
            let pt_dst = POINT {
                x: self.x,
                y: self.y,
            };
            let size = SIZE {
                cx: self.width as i32,
                cy: self.height as i32,
            };
            let blend = BLENDFUNCTION {
                BlendOp: AC_SRC_OVER as u8,
                BlendFlags: 0,
                SourceConstantAlpha: 255,
                AlphaFormat: AC_SRC_ALPHA as u8,
            };

            let _ = UpdateLayeredWindow(
                self.hwnd,
                hdc_screen,
                Some(&pt_dst),
                Some(&size),
                self.hdc_mem,
                Some(&pt_src),
                COLORREF(0),
                Some(&blend),
                ULW_ALPHA,
            );

            ReleaseDC(HWND::default(), hdc_screen);
        }
    }

    fn queue_dismiss(&mut self, input: DismissInput) {
        self.pending_dismiss.get_or_insert(input);
    }
}

impl OverlayPlatform for WindowsOverlay {
    fn new(config: OverlayConfig) -> Result<Self, PlatformError> {
        // SAFETY: querying the handle of the running executable
        let hinstance: HINSTANCE = unsafe { GetModuleHandleW(None) }
            .map_err(|e| PlatformError::Other(format!("GetModuleHandleW failed: {}", e)))?
            .into();

        Self::register_class(hinstance)?;

        let monitors = get_monitors();
        let monitor = find_primary(&monitors)
            .cloned()
            .ok_or(PlatformError::NoDisplay)?;
        tracing::debug!(
            monitor = %monitor.name,
            x = monitor.x,
            y = monitor.y,
            width = monitor.width,
            height = monitor.height,
            "Windows overlay geometry"
        );

        let class_name = wide_string(CLASS_NAME);
        let window_name = wide_string(&config.title);
        // SAFETY: the class is registered and both strings outlive the call
        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_TOOLWINDOW,
                PCWSTR(class_name.as_ptr()),
                PCWSTR(window_name.as_ptr()),
                WS_POPUP,
                monitor.x,
                monitor.y,
                monitor.width as i32,
                monitor.height as i32,
                None,
                None,
                hinstance,
                None,
            )
        }
        .map_err(|e| PlatformError::Other(format!("CreateWindowExW failed: {}", e)))?;

        let mut overlay = Self {
            hwnd,
            hdc_mem: HDC::default(),
            hbitmap: HBITMAP::default(),
            width: monitor.width,
            height: monitor.height,
            x: monitor.x,
            y: monitor.y,
            pixel_data: Vec::new(),
            bgra_buffer: Vec::new(),
            pending_dismiss: None,
            redraw_requested: true,
            running: true,
        };

        overlay.create_dib_section()?;

        // Take focus so Escape reaches the window directly
        // SAFETY: hwnd was just created on this thread
        unsafe {
            let _ = ShowWindow(hwnd, SW_SHOW);
            let _ = SetForegroundWindow(hwnd);
        }

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
        self.update_layered_window();
    }

    fn poll_events(&mut self) -> bool {
        // SAFETY: standard message pump on the window's own thread
        unsafe {
            let mut msg = MSG::default();
            // Null HWND also pumps thread messages, which the keyboard hook needs
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
                match msg.message {
                    WM_QUIT => {
                        self.running = false;
                        return false;
                    }
                    WM_LBUTTONDOWN if msg.hwnd == self.hwnd => {
                        self.queue_dismiss(DismissInput::PrimaryClick);
                    }
                    WM_KEYDOWN if msg.wParam.0 == VK_ESCAPE.0 as usize => {
                        self.queue_dismiss(DismissInput::EscapeKey);
                    }
                    _ => {
                        let _ = TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                }
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

impl Drop for WindowsOverlay {
    fn drop(&mut self) {
        // SAFETY: handles are owned by self and not used after drop
        unsafe {
            if !self.hdc_mem.is_invalid() {
                let _ = DeleteDC(self.hdc_mem);
            }
            if !self.hbitmap.is_invalid() {
                let _ = DeleteObject(self.hbitmap);
            }
            if !self.hwnd.is_invalid() {
                let _ = DestroyWindow(self.hwnd);
            }
        }
    }
}

/// Window procedure for overlay windows
unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        // Alt+F4 and friends: surface as WM_QUIT to the polling loop
        WM_CLOSE => {
            unsafe { PostQuitMessage(0) };
            LRESULT(0)
        }
        WM_ERASEBKGND => LRESULT(1), // Don't erase background
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

/// Convert a &str to a null-terminated wide string
fn wide_string(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Global Escape Listener
// ─────────────────────────────────────────────────────────────────────────────

/// Set by the low-level hook; hook procedures cannot carry user data
static ESCAPE_PRESSED: AtomicBool = AtomicBool::new(false);

unsafe extern "system" fn keyboard_hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code == HC_ACTION as i32 {
        let message = wparam.0 as u32;
        if message == WM_KEYDOWN || message == WM_SYSKEYDOWN {
            // SAFETY: for HC_ACTION, lparam points to a KBDLLHOOKSTRUCT
            let event = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };
            if event.vkCode == VK_ESCAPE.0 as u32 {
                ESCAPE_PRESSED.store(true, Ordering::SeqCst);
            }
        }
    }
    unsafe { CallNextHookEx(HHOOK::default(), code, wparam, lparam) }
}

/// `WH_KEYBOARD_LL` hook; events are delivered while the installing thread
/// pumps messages, which the overlay's poll loop does.
pub struct WindowsEscapeListener {
    hook: HHOOK,
}

impl GlobalEscapeListener for WindowsEscapeListener {
    fn install() -> Result<Self, PlatformError> {
        ESCAPE_PRESSED.store(false, Ordering::SeqCst);

        // SAFETY: keyboard_hook_proc matches HOOKPROC and lives for the program
        let hook = unsafe {
            let hinstance: HINSTANCE = GetModuleHandleW(None)
                .map_err(|e| PlatformError::Other(format!("GetModuleHandleW failed: {}", e)))?
                .into();
            SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), hinstance, 0)
        }
        .map_err(|e| PlatformError::Other(format!("SetWindowsHookExW failed: {}", e)))?;

        tracing::debug!("Installed low-level keyboard hook");
        Ok(Self { hook })
    }

    fn take_pressed(&mut self) -> bool {
        ESCAPE_PRESSED.swap(false, Ordering::SeqCst)
    }
}

impl Drop for WindowsEscapeListener {
    fn drop(&mut self) {
        // SAFETY: the hook was installed by this listener
        unsafe {
            let _ = UnhookWindowsHookEx(self.hook);
        }
    }
}
