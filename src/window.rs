//! The overlay window and its message/render loop.

use std::mem;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error};
use windows::core::PCSTR;
use windows::Win32::Foundation::{BOOL, HMODULE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Direct3D::{
    D3D_DRIVER_TYPE, D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_WARP, D3D_FEATURE_LEVEL,
    D3D_FEATURE_LEVEL_10_0, D3D_FEATURE_LEVEL_11_0,
};
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDeviceAndSwapChain, ID3D11Device, ID3D11DeviceContext, ID3D11RenderTargetView,
    ID3D11Texture2D, D3D11_CREATE_DEVICE_FLAG, D3D11_SDK_VERSION,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_MODE_DESC, DXGI_RATIONAL, DXGI_SAMPLE_DESC,
};
use windows::Win32::Graphics::Dxgi::{
    IDXGISwapChain, DXGI_ERROR_UNSUPPORTED, DXGI_SWAP_CHAIN_DESC,
    DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH, DXGI_SWAP_EFFECT_DISCARD,
    DXGI_USAGE_RENDER_TARGET_OUTPUT,
};
use windows::Win32::Graphics::Gdi::{CreateRoundRectRgn, SetWindowRgn, UpdateWindow, HBRUSH};
use windows::Win32::System::LibraryLoader::GetModuleHandleA;
use windows::Win32::UI::HiDpi::{
    SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExA, DefWindowProcA, DestroyWindow, DispatchMessageA, GetSystemMetrics, LoadCursorW,
    LoadIconW, PeekMessageA, PostQuitMessage, RegisterClassExA, ShowWindow,
    TranslateMessage, UnregisterClassA, CS_CLASSDC, HCURSOR, HICON, HMENU, IDC_ARROW,
    IDI_APPLICATION, MSG, PM_REMOVE, SC_KEYMENU, SM_CXSCREEN, SM_CYSCREEN, SW_SHOWDEFAULT,
    WINDOW_EX_STYLE, WM_DESTROY, WM_QUIT, WM_SYSCOMMAND, WNDCLASSEXA, WS_POPUP,
};

use crate::interaction::InteractionState;
use crate::renderer::{input, D3D11RenderEngine};
use crate::resources::ResourceCache;
use crate::{util, RenderContext};

const WINDOW_CLASS_NAME: PCSTR = PCSTR("vitrine\0".as_ptr());
const CORNER_RADIUS: i32 = 20;
const FEATURE_LEVELS: [D3D_FEATURE_LEVEL; 2] = [D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_10_0];
const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// Fatal failures of window construction and the render loop.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Window class registration failed.
    #[error("failed to register the window class")]
    ClassRegistration,
    /// The popup window could not be created.
    #[error("failed to create the overlay window")]
    WindowCreation,
    /// Neither the hardware device nor the WARP fallback could be created.
    #[error("failed to create the D3D11 device and swap chain: {0}")]
    DeviceCreation(#[source] windows::core::Error),
    /// The swap chain refused to hand out its back buffer.
    #[error("failed to acquire the swap chain back buffer: {0}")]
    BackBuffer(#[source] windows::core::Error),
    /// The render target view over the back buffer could not be created.
    #[error("failed to create the render target view: {0}")]
    RenderTarget(#[source] windows::core::Error),
    /// The imgui render engine could not be initialized or failed a frame.
    #[error("render engine failure: {0}")]
    Renderer(#[source] windows::core::Error),
    /// [`OverlayWindow::run`] was called after [`OverlayWindow::detach`].
    #[error("the graphics context has already been released")]
    Released,
}

/// Everything the one-time style callback may touch.
pub struct StyleContext<'a> {
    /// The imgui context, for io settings, fonts and theming.
    pub imgui: &'a mut imgui::Context,
    /// The render backend, for preloading textures.
    pub renderer: &'a mut dyn RenderContext,
    /// The window's resource cache.
    pub resources: &'a mut ResourceCache,
    /// The D3D11 device the overlay renders with.
    pub device: &'a ID3D11Device,
}

/// Everything the per-frame paint callback may touch.
pub struct PaintContext<'a> {
    /// The current imgui frame.
    pub ui: &'a imgui::Ui,
    /// The overlay's window handle.
    pub hwnd: HWND,
    /// The window size the overlay was constructed with.
    pub size: [f32; 2],
    /// The D3D11 device the overlay renders with.
    pub device: &'a ID3D11Device,
    /// The window's resource cache.
    pub resources: &'a ResourceCache,
    /// Frame state persisting across paint invocations.
    pub interaction: &'a mut InteractionState,
}

/// The D3D11 handles bound to the overlay window.
///
/// The handles are created together and released together: outside of
/// [`GraphicsContext::release`] they are either all present or all absent.
#[derive(Default)]
struct GraphicsContext {
    device: Option<ID3D11Device>,
    device_context: Option<ID3D11DeviceContext>,
    swap_chain: Option<IDXGISwapChain>,
    render_target: Option<ID3D11RenderTargetView>,
}

impl GraphicsContext {
    fn new(hwnd: HWND) -> Result<Self, OverlayError> {
        let (device, device_context, swap_chain) =
            match Self::create_device(hwnd, D3D_DRIVER_TYPE_HARDWARE) {
                Err(e) if e.code() == DXGI_ERROR_UNSUPPORTED => {
                    debug!("hardware device unsupported, retrying with the WARP rasterizer");
                    Self::create_device(hwnd, D3D_DRIVER_TYPE_WARP)
                        .map_err(OverlayError::DeviceCreation)?
                },
                other => other.map_err(OverlayError::DeviceCreation)?,
            };

        let back_buffer: ID3D11Texture2D =
            unsafe { swap_chain.GetBuffer(0) }.map_err(OverlayError::BackBuffer)?;
        let render_target = util::try_out_ptr(|v| unsafe {
            device.CreateRenderTargetView(&back_buffer, None, Some(v))
        })
        .map_err(OverlayError::RenderTarget)?;

        Ok(Self {
            device: Some(device),
            device_context: Some(device_context),
            swap_chain: Some(swap_chain),
            render_target: Some(render_target),
        })
    }

    fn create_device(
        hwnd: HWND,
        driver_type: D3D_DRIVER_TYPE,
    ) -> windows::core::Result<(ID3D11Device, ID3D11DeviceContext, IDXGISwapChain)> {
        let mut p_device: Option<ID3D11Device> = None;
        let mut p_context: Option<ID3D11DeviceContext> = None;
        let mut p_swap_chain: Option<IDXGISwapChain> = None;

        unsafe {
            D3D11CreateDeviceAndSwapChain(
                None,
                driver_type,
                None,
                D3D11_CREATE_DEVICE_FLAG(0),
                Some(&FEATURE_LEVELS),
                D3D11_SDK_VERSION,
                Some(&DXGI_SWAP_CHAIN_DESC {
                    BufferDesc: DXGI_MODE_DESC {
                        Width: 0,
                        Height: 0,
                        RefreshRate: DXGI_RATIONAL { Numerator: 60, Denominator: 1 },
                        Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                        ..Default::default()
                    },
                    SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
                    BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
                    BufferCount: 2,
                    OutputWindow: hwnd,
                    Windowed: BOOL::from(true),
                    SwapEffect: DXGI_SWAP_EFFECT_DISCARD,
                    Flags: DXGI_SWAP_CHAIN_FLAG_ALLOW_MODE_SWITCH.0 as u32,
                }),
                Some(&mut p_swap_chain),
                Some(&mut p_device),
                None,
                Some(&mut p_context),
            )?;
        }

        Ok((p_device.unwrap(), p_context.unwrap(), p_swap_chain.unwrap()))
    }

    /// Clones of all four handles, or `None` once released.
    fn handles(
        &self,
    ) -> Option<(ID3D11Device, ID3D11DeviceContext, IDXGISwapChain, ID3D11RenderTargetView)> {
        Some((
            self.device.clone()?,
            self.device_context.clone()?,
            self.swap_chain.clone()?,
            self.render_target.clone()?,
        ))
    }

    /// Release the handles in a fixed order. Each `take` is a no-op once the
    /// slot is empty, so repeated calls never release a handle twice.
    fn release(&mut self) {
        drop(self.render_target.take());
        drop(self.device.take());
        drop(self.device_context.take());
        drop(self.swap_chain.take());
    }

    fn is_released(&self) -> bool {
        self.device.is_none()
            && self.device_context.is_none()
            && self.swap_chain.is_none()
            && self.render_target.is_none()
    }
}

/// A borderless, rounded-corner popup window bound to a D3D11 swap chain,
/// driving an imgui render loop through caller-provided callbacks.
pub struct OverlayWindow {
    wnd_class: WNDCLASSEXA,
    size: (i32, i32),
    hwnd: HWND,
    graphics: GraphicsContext,
    resources: ResourceCache,
    interaction: InteractionState,
}

impl OverlayWindow {
    /// Create the overlay window: `size` pixels, centered on the primary
    /// monitor, clipped to rounded corners, with the D3D11 graphics context
    /// bound to it. The window becomes visible before this returns.
    pub fn new(size: (i32, i32)) -> Result<Self, OverlayError> {
        unsafe {
            let _ = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
        }

        let hinstance: HMODULE =
            unsafe { GetModuleHandleA(None) }.map_err(|_| OverlayError::ClassRegistration)?;

        let wnd_class = WNDCLASSEXA {
            cbSize: mem::size_of::<WNDCLASSEXA>() as u32,
            style: CS_CLASSDC,
            lpfnWndProc: Some(wnd_proc),
            cbClsExtra: 0,
            cbWndExtra: 0,
            hInstance: hinstance.into(),
            hIcon: unsafe { LoadIconW(None, IDI_APPLICATION) }.unwrap_or(HICON(0)),
            hCursor: unsafe { LoadCursorW(None, IDC_ARROW) }.unwrap_or(HCURSOR(0)),
            hbrBackground: HBRUSH(0),
            lpszMenuName: PCSTR::null(),
            lpszClassName: WINDOW_CLASS_NAME,
            hIconSm: HICON(0),
        };

        if unsafe { RegisterClassExA(&wnd_class) } == 0 {
            return Err(OverlayError::ClassRegistration);
        }

        let x = unsafe { GetSystemMetrics(SM_CXSCREEN) } / 2 - size.0 / 2;
        let y = unsafe { GetSystemMetrics(SM_CYSCREEN) } / 2 - size.1 / 2;

        let hwnd = unsafe {
            CreateWindowExA(
                WINDOW_EX_STYLE(0),
                WINDOW_CLASS_NAME,
                PCSTR::null(),
                WS_POPUP,
                x,
                y,
                size.0,
                size.1,
                HWND(0),
                HMENU(0),
                wnd_class.hInstance,
                None,
            )
        };

        // From here on the window and class are torn down by Drop, even when
        // graphics creation fails below.
        let mut window = Self {
            wnd_class,
            size,
            hwnd,
            graphics: GraphicsContext::default(),
            resources: ResourceCache::new(),
            interaction: InteractionState::default(),
        };

        if hwnd.0 == 0 {
            return Err(OverlayError::WindowCreation);
        }

        unsafe {
            // The system owns the region handle once it is attached.
            let region =
                CreateRoundRectRgn(0, 0, size.0, size.1, CORNER_RADIUS, CORNER_RADIUS);
            SetWindowRgn(hwnd, region, BOOL::from(true));
        }

        window.graphics = GraphicsContext::new(hwnd)?;

        unsafe {
            ShowWindow(hwnd, SW_SHOWDEFAULT);
            UpdateWindow(hwnd);
        }

        Ok(window)
    }

    /// Run the message pump and render loop.
    ///
    /// `style` runs exactly once before the first frame; `paint` runs every
    /// frame and terminates the loop by returning `false`. The loop also ends
    /// when the window is destroyed or presentation fails. Returns
    /// `Ok(false)` on normal exit; the value carries no further meaning.
    pub fn run<S, P>(&mut self, style: S, mut paint: P) -> Result<bool, OverlayError>
    where
        S: FnOnce(&mut StyleContext),
        P: FnMut(&mut PaintContext) -> bool,
    {
        let (device, device_context, swap_chain, render_target) =
            self.graphics.handles().ok_or(OverlayError::Released)?;

        let mut ctx = imgui::Context::create();
        ctx.io_mut().display_size = [self.size.0 as f32, self.size.1 as f32];

        let mut engine =
            D3D11RenderEngine::new(&device, &mut ctx).map_err(OverlayError::Renderer)?;

        style(&mut StyleContext {
            imgui: &mut ctx,
            renderer: &mut engine,
            resources: &mut self.resources,
            device: &device,
        });

        // Fonts registered by the style callback become a texture here.
        engine.setup_fonts(&mut ctx).map_err(OverlayError::Renderer)?;

        let mut last_frame = Instant::now();
        let mut msg = MSG::default();

        while msg.message != WM_QUIT {
            // Drain the queue without blocking; a processed message skips the
            // frame so the quit condition is re-checked first.
            if unsafe { PeekMessageA(&mut msg, HWND(0), 0, 0, PM_REMOVE) }.as_bool() {
                unsafe {
                    TranslateMessage(&msg);
                    DispatchMessageA(&msg);
                }
                input::handle_message(ctx.io_mut(), &msg);
                continue;
            }

            let now = Instant::now();
            let io = ctx.io_mut();
            io.update_delta_time(now - last_frame);
            last_frame = now;

            let (width, height) = util::win_size(self.hwnd);
            io.display_size = [width as f32, height as f32];

            let ui = ctx.frame();
            let keep_open = paint(&mut PaintContext {
                ui,
                hwnd: self.hwnd,
                size: [self.size.0 as f32, self.size.1 as f32],
                device: &device,
                resources: &self.resources,
                interaction: &mut self.interaction,
            });
            let draw_data = ctx.render();

            unsafe {
                device_context.OMSetRenderTargets(Some(&[Some(render_target.clone())]), None);
                device_context.ClearRenderTargetView(&render_target, &CLEAR_COLOR);
            }
            engine.render(draw_data).map_err(OverlayError::Renderer)?;

            if unsafe { swap_chain.Present(1, 0) }.is_err() {
                error!("presentation failed, leaving the render loop");
                break;
            }

            if !keep_open {
                break;
            }
        }

        Ok(false)
    }

    /// Release the graphics context bundle. Idempotent, and safe to call no
    /// matter how the render loop exited.
    pub fn detach(&mut self) {
        self.graphics.release();
    }

    /// Whether [`detach`](Self::detach) has released the graphics context.
    pub fn is_detached(&self) -> bool {
        self.graphics.is_released()
    }

    /// The underlying window handle.
    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }

    /// The size the window was constructed with.
    pub fn size(&self) -> (i32, i32) {
        self.size
    }

    /// The window's resource cache.
    pub fn resources(&self) -> &ResourceCache {
        &self.resources
    }

    /// Mutable access to the window's resource cache.
    pub fn resources_mut(&mut self) -> &mut ResourceCache {
        &mut self.resources
    }
}

impl Drop for OverlayWindow {
    fn drop(&mut self) {
        unsafe {
            if self.hwnd.0 != 0 {
                let _ = DestroyWindow(self.hwnd);
            }
            let _ = UnregisterClassA(self.wnd_class.lpszClassName, self.wnd_class.hInstance);
        }
    }
}

unsafe extern "system" fn wnd_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match msg {
        // Swallow the ALT application menu so it cannot steal the loop.
        WM_SYSCOMMAND if (wparam.0 & 0xfff0) as u32 == SC_KEYMENU => LRESULT(0),
        WM_DESTROY => {
            PostQuitMessage(0);
            LRESULT(0)
        },
        _ => DefWindowProcA(hwnd, msg, wparam, lparam),
    }
}
