//! # vitrine
//!
//! This library implements a minimal borderless overlay window for Windows
//! with a [`dear imgui`](https://docs.rs/imgui/0.11.0/imgui/) rendering
//! surface on top of DirectX 11.
//!
//! An [`OverlayWindow`] owns the Win32 window, the D3D11 device and swap
//! chain, a [`resources::ResourceCache`] for images and fonts, and the
//! per-window [`interaction::InteractionState`]. All visual and interactive
//! behavior is injected through two callbacks handed to
//! [`OverlayWindow::run`]: a *style* callback invoked exactly once before the
//! first frame, and a *paint* callback invoked every frame until it returns
//! `false`, the window is destroyed, or presentation fails.
//!
//! ## Example
//!
//! ```no_run
//! use vitrine::OverlayWindow;
//!
//! fn main() -> Result<(), vitrine::OverlayError> {
//!     let mut overlay = OverlayWindow::new((300, 200))?;
//!
//!     let ran = overlay.run(
//!         |style| {
//!             style.imgui.set_ini_filename(None);
//!         },
//!         |paint| {
//!             paint.ui.window("###panel").build(|| {
//!                 paint.ui.text("Hello from vitrine!");
//!             });
//!             paint.interaction.open
//!         },
//!     )?;
//!
//!     if !ran {
//!         overlay.detach();
//!     }
//!
//!     Ok(())
//! }
//! ```
#![deny(missing_docs)]

use imgui::TextureId;
use windows::core::Result;
pub use {imgui, tracing, windows};

pub mod fetch;
pub mod interaction;
pub(crate) mod renderer;
pub mod resources;
pub mod util;
pub mod window;

pub use renderer::D3D11RenderEngine;
pub use window::{OverlayError, OverlayWindow, PaintContext, StyleContext};

/// Texture registration seam between the resource cache and the renderer.
///
/// The [`resources::ResourceCache`] image loaders decode pixel data and hand
/// it to this trait; [`D3D11RenderEngine`] implements it by creating a
/// shader-resource-view-backed texture. Style callbacks receive it as a
/// `&mut dyn RenderContext` so they can preload images without depending on
/// the concrete backend.
pub trait RenderContext {
    /// Upload a tightly packed RGBA8 image and return the [`TextureId`] to
    /// draw it with.
    fn load_texture(&mut self, data: &[u8], width: u32, height: u32) -> Result<TextureId>;
}
