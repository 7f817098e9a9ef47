//! Helpers for the out-param calling conventions of the [`windows`] APIs.

use std::fmt::Display;

use tracing::error;
use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::Graphics::Direct3D::ID3DBlob;
use windows::Win32::UI::WindowsAndMessaging::GetClientRect;

/// Helper for fallible [`windows`] APIs that have an out-param with a default
/// value.
///
/// # Example
///
/// ```ignore
/// let desc = try_out_param(|sd| unsafe { swap_chain.GetDesc(sd) })?;
/// ```
pub fn try_out_param<T, F, E, O>(mut f: F) -> Result<T, E>
where
    T: Default,
    F: FnMut(&mut T) -> Result<O, E>,
{
    let mut t: T = Default::default();
    match f(&mut t) {
        Ok(_) => Ok(t),
        Err(e) => Err(e),
    }
}

/// Helper for fallible [`windows`] APIs that have an optional pointer
/// out-param.
///
/// # Example
///
/// ```ignore
/// let rtv: ID3D11RenderTargetView =
///     try_out_ptr(|v| unsafe { device.CreateRenderTargetView(&buf, None, Some(v)) })?;
/// ```
pub fn try_out_ptr<T, F, E, O>(mut f: F) -> Result<T, E>
where
    F: FnMut(&mut Option<T>) -> Result<O, E>,
{
    let mut t: Option<T> = None;
    match f(&mut t) {
        Ok(_) => Ok(t.unwrap()),
        Err(e) => Err(e),
    }
}

/// Helper for the shader-compilation APIs which report failures through a
/// secondary error-blob out-param alongside the returned `HRESULT`.
pub fn try_out_err_blob<T1, T2, F, E, O>(mut f: F) -> Result<T1, (E, Option<T2>)>
where
    F: FnMut(&mut Option<T1>, &mut Option<T2>) -> Result<O, E>,
{
    let mut t1: Option<T1> = None;
    let mut t2: Option<T2> = None;
    match f(&mut t1, &mut t2) {
        Ok(_) => Ok(t1.unwrap()),
        Err(e) => Err((e, t2)),
    }
}

/// Log the contents of a D3D error blob, passing the original error through.
pub(crate) fn print_error_blob<D: Display, E>(msg: D) -> impl Fn((E, Option<ID3DBlob>)) -> E {
    move |(e, err_blob)| {
        if let Some(err_blob) = err_blob {
            let buf = unsafe {
                std::slice::from_raw_parts(
                    err_blob.GetBufferPointer() as *const u8,
                    err_blob.GetBufferSize(),
                )
            };
            error!("{msg}: {}", String::from_utf8_lossy(buf));
        }
        e
    }
}

/// Returns width and height of the client area of a given
/// [`windows::Win32::Foundation::HWND`].
pub fn win_size(hwnd: HWND) -> (i32, i32) {
    let mut rect = RECT::default();
    unsafe { GetClientRect(hwnd, &mut rect).ok() };
    (rect.right - rect.left, rect.bottom - rect.top)
}
