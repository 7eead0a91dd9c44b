//! Decoded map images and their release-on-drop resource handles.
//!
//! DESIGN
//! ======
//! Every successfully decoded map image owns an [`ImageHandle`] registered
//! in a shared [`HandleRegistry`]. Dropping the image drops the handle, and
//! the handle's `Drop` removes it from the registry, so superseded images,
//! stale fetch results and torn-down sessions all release on every path.
//! The placeholder is a process-wide constant raster and holds no handle.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use image::{Rgba, RgbaImage};
use tracing::debug;
use uuid::Uuid;

use crate::consts::{
    PLACEHOLDER_BACKGROUND_RGBA, PLACEHOLDER_BORDER_PX, PLACEHOLDER_HEIGHT, PLACEHOLDER_INK_RGBA, PLACEHOLDER_WIDTH,
};
use crate::types::MapError;

/// Built-in fallback raster shown when the real map cannot be obtained.
pub static PLACEHOLDER: LazyLock<Arc<RgbaImage>> = LazyLock::new(|| Arc::new(build_placeholder()));

/// Grey card with a border and a diagonal cross.
fn build_placeholder() -> RgbaImage {
    let (w, h) = (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT);
    let slope = f64::from(h) / f64::from(w);
    RgbaImage::from_fn(w, h, |x, y| {
        let border = x < PLACEHOLDER_BORDER_PX
            || y < PLACEHOLDER_BORDER_PX
            || x >= w - PLACEHOLDER_BORDER_PX
            || y >= h - PLACEHOLDER_BORDER_PX;
        let cx = f64::from(x) + 0.5;
        let cy = f64::from(y) + 0.5;
        let on_diagonal = (cx * slope - cy).abs() < 1.5 || ((f64::from(w) - cx) * slope - cy).abs() < 1.5;
        if border || on_diagonal { Rgba(PLACEHOLDER_INK_RGBA) } else { Rgba(PLACEHOLDER_BACKGROUND_RGBA) }
    })
}

// =============================================================================
// HANDLES
// =============================================================================

/// Tracks which image handles are currently live.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    live: Mutex<HashSet<Uuid>>,
}

impl HandleRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new handle. It is released when the returned value drops.
    #[must_use]
    pub fn acquire(self: &Arc<Self>) -> ImageHandle {
        let id = Uuid::new_v4();
        self.lock().insert(id);
        debug!(handle = %id, "image handle acquired");
        ImageHandle { id, registry: Arc::clone(self) }
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_live(&self, id: Uuid) -> bool {
        self.lock().contains(&id)
    }

    fn release(&self, id: Uuid) -> bool {
        self.lock().remove(&id)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Transient resource handle for one decoded image.
#[derive(Debug)]
pub struct ImageHandle {
    id: Uuid,
    registry: Arc<HandleRegistry>,
}

impl ImageHandle {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for ImageHandle {
    fn drop(&mut self) {
        if self.registry.release(self.id) {
            debug!(handle = %self.id, "image handle released");
        }
    }
}

// =============================================================================
// LOADED IMAGE
// =============================================================================

#[derive(Debug)]
pub enum ImageSource {
    Map { map_name: String, handle: ImageHandle },
    Placeholder,
}

/// A decoded raster plus where it came from.
#[derive(Debug)]
pub struct LoadedImage {
    raster: Arc<RgbaImage>,
    source: ImageSource,
}

impl LoadedImage {
    #[must_use]
    pub fn new(raster: RgbaImage, map_name: impl Into<String>, handle: ImageHandle) -> Self {
        Self { raster: Arc::new(raster), source: ImageSource::Map { map_name: map_name.into(), handle } }
    }

    #[must_use]
    pub fn placeholder() -> Self {
        Self { raster: Arc::clone(&PLACEHOLDER), source: ImageSource::Placeholder }
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        matches!(self.source, ImageSource::Placeholder)
    }

    #[must_use]
    pub fn raster(&self) -> &Arc<RgbaImage> {
        &self.raster
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    #[must_use]
    pub fn handle_id(&self) -> Option<Uuid> {
        match &self.source {
            ImageSource::Map { handle, .. } => Some(handle.id()),
            ImageSource::Placeholder => None,
        }
    }

    #[must_use]
    pub fn map_name(&self) -> Option<&str> {
        match &self.source {
            ImageSource::Map { map_name, .. } => Some(map_name),
            ImageSource::Placeholder => None,
        }
    }
}

/// Decode raster bytes and acquire a handle for the result.
///
/// # Errors
///
/// Returns [`MapError::ImageUnavailable`] when the bytes are not a supported
/// raster encoding or decode to an empty image.
pub fn decode_image(
    bytes: &[u8],
    site_id: &str,
    map_name: &str,
    registry: &Arc<HandleRegistry>,
) -> Result<LoadedImage, MapError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| MapError::image(site_id, map_name, format!("undecodable payload: {e}")))?;
    let raster = decoded.to_rgba8();
    if raster.width() == 0 || raster.height() == 0 {
        return Err(MapError::image(site_id, map_name, "decoded image is empty"));
    }
    Ok(LoadedImage::new(raster, map_name, registry.acquire()))
}

// =============================================================================
// LOADER TRAIT
// =============================================================================

/// Fetches and decodes a deck's floor-plan raster. Enables mocking in tests.
#[async_trait::async_trait]
pub trait MapImageLoader: Send + Sync {
    /// Fetch the map image `map_name` for `site_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::ImageUnavailable`] on transport failure or an
    /// undecodable payload.
    async fn fetch_image(&self, site_id: &str, map_name: &str) -> Result<LoadedImage, MapError>;
}

#[cfg(test)]
#[path = "map_image_test.rs"]
mod tests;
