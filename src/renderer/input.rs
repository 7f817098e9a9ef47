//! Translation of drained window messages into imgui input state.
//!
//! The render loop pulls every pending message off the queue before it starts
//! a frame; each one passes through [`handle_message`] so imgui sees mouse
//! state without a subclassed window procedure. Keyboard translation is
//! intentionally absent: the template's only input concern is the left-button
//! window drag.

use imgui::Io;
use windows::Win32::UI::Input::KeyboardAndMouse::{ReleaseCapture, SetCapture};
use windows::Win32::UI::WindowsAndMessaging::{
    MSG, WHEEL_DELTA, WM_LBUTTONDBLCLK, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDBLCLK,
    WM_MBUTTONDOWN, WM_MBUTTONUP, WM_MOUSEHWHEEL, WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_RBUTTONDBLCLK,
    WM_RBUTTONDOWN, WM_RBUTTONUP,
};

// Replications of the Win32 LOWORD/HIWORD macros.
#[inline]
fn loword(l: u32) -> u16 {
    (l & 0xffff) as u16
}

#[inline]
fn hiword(l: u32) -> u16 {
    ((l >> 16) & 0xffff) as u16
}

/// Feed a drained queue message into the imgui io state.
pub(crate) fn handle_message(io: &mut Io, msg: &MSG) {
    let wparam = msg.wParam.0;
    let lparam = msg.lParam.0;

    match msg.message {
        WM_MOUSEMOVE => {
            // Client coordinates, signed for multi-monitor setups.
            let x = loword(lparam as u32) as i16 as f32;
            let y = hiword(lparam as u32) as i16 as f32;
            io.mouse_pos = [x, y];
        },
        WM_LBUTTONDOWN | WM_LBUTTONDBLCLK => {
            // Capture so a title-band drag keeps tracking outside the window.
            unsafe { SetCapture(msg.hwnd) };
            io.mouse_down[0] = true;
        },
        WM_LBUTTONUP => {
            let _ = unsafe { ReleaseCapture() };
            io.mouse_down[0] = false;
        },
        WM_RBUTTONDOWN | WM_RBUTTONDBLCLK => {
            io.mouse_down[1] = true;
        },
        WM_RBUTTONUP => {
            io.mouse_down[1] = false;
        },
        WM_MBUTTONDOWN | WM_MBUTTONDBLCLK => {
            io.mouse_down[2] = true;
        },
        WM_MBUTTONUP => {
            io.mouse_down[2] = false;
        },
        WM_MOUSEWHEEL => {
            // Equivalent to GET_WHEEL_DELTA_WPARAM.
            let delta = hiword(wparam as u32) as i16 as f32;
            io.mouse_wheel += delta / WHEEL_DELTA as f32;
        },
        WM_MOUSEHWHEEL => {
            let delta = hiword(wparam as u32) as i16 as f32;
            io.mouse_wheel_h += delta / WHEEL_DELTA as f32;
        },
        _ => {},
    }
}
