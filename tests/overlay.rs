//! Integration tests against a real overlay window. These need a desktop
//! session and a D3D11-capable adapter (WARP suffices).

use std::sync::Mutex;

use vitrine::window::{PaintContext, StyleContext};
use vitrine::windows::Win32::Foundation::RECT;
use vitrine::windows::Win32::Graphics::Gdi::{CreateRectRgn, DeleteObject, GetRgnBox};
use vitrine::windows::Win32::UI::WindowsAndMessaging::{GetWindowRect, GetWindowRgn};
use vitrine::{OverlayError, OverlayWindow};

// Each window registers the same class; run the tests one at a time.
static WINDOW_GUARD: Mutex<()> = Mutex::new(());

#[test]
fn window_matches_the_requested_geometry() {
    let _guard = WINDOW_GUARD.lock().unwrap();
    let overlay = OverlayWindow::new((300, 200)).unwrap();

    let mut rect = RECT::default();
    unsafe { GetWindowRect(overlay.hwnd(), &mut rect) }.unwrap();
    assert_eq!(rect.right - rect.left, 300);
    assert_eq!(rect.bottom - rect.top, 200);

    // The rounded-corner clipping region spans the whole window.
    unsafe {
        let region = CreateRectRgn(0, 0, 0, 0);
        GetWindowRgn(overlay.hwnd(), region);

        let mut bounds = RECT::default();
        GetRgnBox(region, &mut bounds);
        DeleteObject(region);

        assert_eq!((bounds.left, bounds.top), (0, 0));
        assert_eq!((bounds.right, bounds.bottom), (300, 200));
    }
}

#[test]
fn loop_runs_until_paint_returns_false() {
    let _guard = WINDOW_GUARD.lock().unwrap();
    let mut overlay = OverlayWindow::new((300, 200)).unwrap();

    let mut frames = 0u32;
    let ran = overlay
        .run(
            |_: &mut StyleContext| {},
            |_: &mut PaintContext| {
                frames += 1;
                frames < 60
            },
        )
        .unwrap();

    assert!(!ran);
    assert_eq!(frames, 60);
}

#[test]
fn detach_is_idempotent_and_blocks_further_runs() {
    let _guard = WINDOW_GUARD.lock().unwrap();
    let mut overlay = OverlayWindow::new((300, 200)).unwrap();
    assert!(!overlay.is_detached());

    overlay.detach();
    assert!(overlay.is_detached());

    // A second detach finds every slot already empty.
    overlay.detach();
    assert!(overlay.is_detached());

    match overlay.run(|_: &mut StyleContext| {}, |_: &mut PaintContext| true) {
        Err(OverlayError::Released) => {},
        other => panic!("expected the released error, got {other:?}"),
    }
}
