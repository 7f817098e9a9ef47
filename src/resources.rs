//! Name-addressed cache for images and fonts.
//!
//! The cache owns nothing but the name→handle mappings: decoded images live
//! in the render backend's texture heap, fonts in the imgui font atlas. Both
//! maps are insertion-only, with no eviction and no update path.

use std::collections::HashMap;
use std::path::Path;

use imgui::{FontAtlas, FontConfig, FontId, FontSource, TextureId};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fetch::{self, FetchError};
use crate::RenderContext;

/// Failure modes of the cache's `load_*` operations.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The asset could not be downloaded.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The asset could not be read from local storage.
    #[error("could not read asset: {0}")]
    Io(#[from] std::io::Error),
    /// The downloaded or on-disk bytes are not a decodable image.
    #[error("could not decode image data: {0}")]
    Decode(#[from] image::ImageError),
    /// The render backend rejected the decoded texture.
    #[error("graphics backend rejected texture: {0}")]
    Backend(#[from] windows::core::Error),
}

/// Image and font handles addressed by caller-chosen names.
#[derive(Debug, Default)]
pub struct ResourceCache {
    images: HashMap<String, TextureId>,
    fonts: HashMap<String, FontId>,
}

impl ResourceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an image handle. Never fails; absent names return `None`.
    pub fn image(&self, name: &str) -> Option<TextureId> {
        self.images.get(name).copied()
    }

    /// Look up a font handle. Never fails; absent names return `None`.
    pub fn font(&self, name: &str) -> Option<FontId> {
        self.fonts.get(name).copied()
    }

    /// Download an image, decode it, register it with the render backend and
    /// store its handle under `name`.
    pub fn load_image_from_web(
        &mut self,
        renderer: &mut dyn RenderContext,
        name: &str,
        url: &str,
    ) -> Result<TextureId, ResourceError> {
        let data = fetch::download(url)?;
        self.register_image(renderer, name, &data)
    }

    /// Read an image from local storage, decode it, register it with the
    /// render backend and store its handle under `name`.
    pub fn load_image_from_file(
        &mut self,
        renderer: &mut dyn RenderContext,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<TextureId, ResourceError> {
        let data = std::fs::read(path)?;
        self.register_image(renderer, name, &data)
    }

    /// Download a TTF font and register it with the atlas at `size_pixels`,
    /// storing its handle under `name`.
    ///
    /// Glyph ranges and merge behavior travel inside `config`. Download
    /// failures are surfaced here; malformed font data only fails later, when
    /// the atlas is built.
    pub fn load_font_from_web(
        &mut self,
        atlas: &mut FontAtlas,
        name: &str,
        url: &str,
        size_pixels: f32,
        config: Option<FontConfig>,
    ) -> Result<FontId, ResourceError> {
        let data = fetch::download(url)?;
        Ok(self.register_font(atlas, name, &data, size_pixels, config))
    }

    /// Read a TTF font from local storage and register it with the atlas at
    /// `size_pixels`, storing its handle under `name`.
    pub fn load_font_from_file(
        &mut self,
        atlas: &mut FontAtlas,
        name: &str,
        path: impl AsRef<Path>,
        size_pixels: f32,
        config: Option<FontConfig>,
    ) -> Result<FontId, ResourceError> {
        let data = std::fs::read(path)?;
        Ok(self.register_font(atlas, name, &data, size_pixels, config))
    }

    fn register_image(
        &mut self,
        renderer: &mut dyn RenderContext,
        name: &str,
        data: &[u8],
    ) -> Result<TextureId, ResourceError> {
        let image = image::load_from_memory(data)?.into_rgba8();
        let (width, height) = image.dimensions();
        let id = renderer.load_texture(image.as_raw(), width, height)?;

        debug!(name, width, height, "image cached");
        if self.images.insert(name.to_string(), id).is_some() {
            // The superseded texture stays alive in the backend heap.
            warn!(name, "replacing an already cached image");
        }

        Ok(id)
    }

    fn register_font(
        &mut self,
        atlas: &mut FontAtlas,
        name: &str,
        data: &[u8],
        size_pixels: f32,
        config: Option<FontConfig>,
    ) -> FontId {
        let id = atlas.add_font(&[FontSource::TtfData { data, size_pixels, config }]);

        debug!(name, size_pixels, "font registered");
        if self.fonts.insert(name.to_string(), id).is_some() {
            warn!(name, "replacing an already cached font");
        }

        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{refused_url, serve_once};

    #[derive(Default)]
    struct RecordingRenderer {
        uploads: Vec<(u32, u32)>,
    }

    impl RenderContext for RecordingRenderer {
        fn load_texture(
            &mut self,
            _data: &[u8],
            width: u32,
            height: u32,
        ) -> windows::core::Result<TextureId> {
            self.uploads.push((width, height));
            Ok(TextureId::from(self.uploads.len()))
        }
    }

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([210, 60, 60, 255]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn tiny_png_on_disk(tag: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("vitrine-{tag}-{}.png", std::process::id()));
        std::fs::write(&path, tiny_png()).unwrap();
        path
    }

    #[test]
    fn unknown_names_are_not_found() {
        let cache = ResourceCache::new();
        assert_eq!(cache.image("nope"), None);
        assert_eq!(cache.font("nope"), None);
    }

    #[test]
    fn loaded_image_is_returned_on_every_lookup() {
        let mut cache = ResourceCache::new();
        let mut renderer = RecordingRenderer::default();
        let path = tiny_png_on_disk("lookup");

        let id = cache.load_image_from_file(&mut renderer, "logo", &path).unwrap();
        std::fs::remove_file(path).unwrap();

        assert_eq!(cache.image("logo"), Some(id));
        assert_eq!(cache.image("logo"), Some(id));
        assert_eq!(renderer.uploads, vec![(2, 2)]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let mut cache = ResourceCache::new();
        let mut renderer = RecordingRenderer::default();

        match cache.load_image_from_file(&mut renderer, "gone", "does/not/exist.png") {
            Err(ResourceError::Io(_)) => {},
            other => panic!("expected an io error, got {other:?}"),
        }
        assert_eq!(cache.image("gone"), None);
    }

    #[test]
    fn web_status_failure_caches_nothing() {
        let mut cache = ResourceCache::new();
        let mut renderer = RecordingRenderer::default();
        let url =
            serve_once(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");

        match cache.load_image_from_web(&mut renderer, "remote", &url) {
            Err(ResourceError::Fetch(FetchError::Status { status, .. })) => {
                assert_eq!(status.as_u16(), 404)
            },
            other => panic!("expected a status error, got {other:?}"),
        }
        assert_eq!(cache.image("remote"), None);
        assert!(renderer.uploads.is_empty());
    }

    #[test]
    fn undecodable_payload_is_a_decode_error() {
        let mut cache = ResourceCache::new();
        let mut renderer = RecordingRenderer::default();
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 12\r\nConnection: close\r\n\r\nnot an image",
        );

        match cache.load_image_from_web(&mut renderer, "junk", &url) {
            Err(ResourceError::Decode(_)) => {},
            other => panic!("expected a decode error, got {other:?}"),
        }
        assert_eq!(cache.image("junk"), None);
    }

    #[test]
    fn duplicate_names_keep_the_latest_handle() {
        let mut cache = ResourceCache::new();
        let mut renderer = RecordingRenderer::default();
        let path = tiny_png_on_disk("dup");

        let first = cache.load_image_from_file(&mut renderer, "icon", &path).unwrap();
        let second = cache.load_image_from_file(&mut renderer, "icon", &path).unwrap();
        std::fs::remove_file(path).unwrap();

        assert_ne!(first, second);
        assert_eq!(cache.image("icon"), Some(second));
    }

    #[test]
    fn font_fetch_failure_stays_inside_the_cache_boundary() {
        let mut ctx = imgui::Context::create();
        let mut cache = ResourceCache::new();

        match cache.load_font_from_web(ctx.fonts(), "body", &refused_url(), 17.0, None) {
            Err(ResourceError::Fetch(FetchError::Transport { .. })) => {},
            other => panic!("expected a transport error, got {other:?}"),
        }
        assert_eq!(cache.font("body"), None);
    }
}
