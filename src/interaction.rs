//! Per-window interaction state for the paint callback.
//!
//! The drag flags live in an [`InteractionState`] owned by the window and
//! lent mutably to the paint callback each frame, so no frame state persists
//! behind the caller's back.

use windows::Win32::Foundation::{HWND, POINT, RECT};
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetWindowRect, SetWindowPos, SWP_NOZORDER,
};

use crate::util;

/// Frame state carried across paint invocations.
#[derive(Debug)]
pub struct InteractionState {
    /// Whether the panel should stay open. Handed to the panel's close
    /// affordance and returned from the paint callback.
    pub open: bool,
    /// Manual title-band drag state.
    pub drag: DragState,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self { open: true, drag: DragState::default() }
    }
}

/// Tracks a manual window drag started from the panel's title band.
#[derive(Debug, Default)]
pub struct DragState {
    active: bool,
    offset: (i32, i32),
}

impl DragState {
    /// Record a button-down at `cursor` against a window whose top-left
    /// corner is at `origin`. Dragging activates when the press falls within
    /// the top band of `grab_height` pixels. Returns whether it did.
    pub fn begin(&mut self, cursor: (i32, i32), origin: (i32, i32), grab_height: f32) -> bool {
        self.offset = (cursor.0 - origin.0, cursor.1 - origin.1);
        self.active = self.offset.1 >= 0 && self.offset.1 as f32 <= grab_height;
        self.active
    }

    /// The window origin that keeps the grab point under `cursor`, or `None`
    /// when no drag is active.
    pub fn target(&self, cursor: (i32, i32)) -> Option<(i32, i32)> {
        self.active.then(|| (cursor.0 - self.offset.0, cursor.1 - self.offset.1))
    }

    /// Whether a drag is in progress.
    pub fn active(&self) -> bool {
        self.active
    }
}

/// Current cursor position in screen coordinates.
pub fn cursor_pos() -> Option<(i32, i32)> {
    let point = util::try_out_param(|p: &mut POINT| unsafe { GetCursorPos(p) }).ok()?;
    Some((point.x, point.y))
}

/// Top-left corner of `hwnd` in screen coordinates.
pub fn window_origin(hwnd: HWND) -> Option<(i32, i32)> {
    let rect = util::try_out_param(|r: &mut RECT| unsafe { GetWindowRect(hwnd, r) }).ok()?;
    Some((rect.left, rect.top))
}

/// Move `hwnd` to `pos`, preserving `size` and the z-order.
pub fn move_window(hwnd: HWND, pos: (i32, i32), size: (i32, i32)) {
    let _ = unsafe { SetWindowPos(hwnd, HWND(0), pos.0, pos.1, size.0, size.1, SWP_NOZORDER) };
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAB_HEIGHT: f32 = 25.0;

    #[test]
    fn press_inside_the_title_band_activates_dragging() {
        let mut drag = DragState::default();
        assert!(drag.begin((110, 220), (100, 200), GRAB_HEIGHT));
        assert!(drag.active());
    }

    #[test]
    fn press_on_the_band_edges_activates_dragging() {
        let mut drag = DragState::default();
        assert!(drag.begin((100, 200), (100, 200), GRAB_HEIGHT));
        assert!(drag.begin((100, 225), (100, 200), GRAB_HEIGHT));
    }

    #[test]
    fn press_below_the_title_band_does_not_activate() {
        let mut drag = DragState::default();
        assert!(!drag.begin((150, 260), (100, 200), GRAB_HEIGHT));
        assert!(!drag.active());
        assert_eq!(drag.target((0, 0)), None);
    }

    #[test]
    fn press_above_the_window_does_not_activate() {
        let mut drag = DragState::default();
        assert!(!drag.begin((150, 190), (100, 200), GRAB_HEIGHT));
    }

    #[test]
    fn target_keeps_the_grab_point_under_the_cursor() {
        let mut drag = DragState::default();
        // Grab at (X+30, Y+10) of a window at (400, 300).
        assert!(drag.begin((430, 310), (400, 300), GRAB_HEIGHT));
        // Cursor moves; the window should follow with the same offset.
        assert_eq!(drag.target((500, 450)), Some((470, 440)));
        assert_eq!(drag.target((430, 310)), Some((400, 300)));
    }

    #[test]
    fn a_new_press_replaces_the_recorded_offset() {
        let mut drag = DragState::default();
        assert!(drag.begin((110, 210), (100, 200), GRAB_HEIGHT));
        assert!(drag.begin((105, 203), (100, 200), GRAB_HEIGHT));
        assert_eq!(drag.target((205, 303)), Some((200, 300)));
    }
}
