//! Map metadata: the alignment between a deck's world frame and its image.
//!
//! DESIGN
//! ======
//! Metadata is fetched once per deck selection and never mutated afterwards;
//! the one exception is filling in image dimensions the source left out,
//! which produces a new value ([`MapMetadata::with_image_size`]). The JSON
//! accepts both explicit field names and the planner's transformation-matrix
//! names (`c1`, `c2`, `d1`, `d2`).

use serde::{Deserialize, Serialize};

use crate::projection::world_to_pixel;
use crate::types::{MapError, Position};

// =============================================================================
// TRANSFORM
// =============================================================================

/// Per-axis affine map from world units to raw pixel units:
/// `raw = scale * world + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    #[serde(alias = "c1")]
    pub scale_x: f64,
    #[serde(alias = "c2")]
    pub scale_y: f64,
    #[serde(alias = "d1")]
    pub offset_x: f64,
    #[serde(alias = "d2")]
    pub offset_y: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    #[must_use]
    pub fn identity() -> Self {
        Self { scale_x: 1.0, scale_y: 1.0, offset_x: 0.0, offset_y: 0.0 }
    }

    /// Uniform `scale` (pixels per world unit) with world `origin` landing on raw pixel (0, 0).
    #[must_use]
    pub fn from_origin(scale: f64, origin: (f64, f64)) -> Self {
        Self { scale_x: scale, scale_y: scale, offset_x: -scale * origin.0, offset_y: -scale * origin.1 }
    }

    fn validate(&self) -> Result<(), String> {
        for (name, scale) in [("scale_x", self.scale_x), ("scale_y", self.scale_y)] {
            if !scale.is_finite() || scale == 0.0 {
                return Err(format!("{name} must be finite and non-zero, got {scale}"));
            }
        }
        if !self.offset_x.is_finite() || !self.offset_y.is_finite() {
            return Err("offsets must be finite".into());
        }
        Ok(())
    }
}

// =============================================================================
// BOUNDARY
// =============================================================================

/// Axis-aligned world-frame box covered by the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(default)]
    pub z1: f64,
    #[serde(default)]
    pub z2: f64,
}

impl Boundary {
    /// Whether the planar part of `position` falls inside the box (inclusive).
    #[must_use]
    pub fn contains(&self, position: &Position) -> bool {
        let (min_x, max_x) = ordered(self.x1, self.x2);
        let (min_y, max_y) = ordered(self.y1, self.y2);
        (min_x..=max_x).contains(&position.x) && (min_y..=max_y).contains(&position.y)
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

// =============================================================================
// METADATA
// =============================================================================

/// Everything needed to place world coordinates on a deck's map image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMetadata {
    /// Name of the map image, used for the image lookup.
    pub map_name: String,
    /// Native image width in pixels; zero until known.
    #[serde(default)]
    pub image_width: u32,
    /// Native image height in pixels; zero until known.
    #[serde(default)]
    pub image_height: u32,
    #[serde(alias = "transformationMatrices")]
    pub transform: Transform,
    /// Flip world +Y to point up on the Y-down raster.
    #[serde(default)]
    pub invert_y: bool,
    #[serde(default)]
    pub boundary: Option<Boundary>,
}

impl MapMetadata {
    #[must_use]
    pub fn new(map_name: impl Into<String>, transform: Transform) -> Self {
        Self {
            map_name: map_name.into(),
            image_width: 0,
            image_height: 0,
            transform,
            invert_y: false,
            boundary: None,
        }
    }

    #[must_use]
    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    #[must_use]
    pub fn with_invert_y(mut self, invert_y: bool) -> Self {
        self.invert_y = invert_y;
        self
    }

    #[must_use]
    pub fn has_image_size(&self) -> bool {
        self.image_width > 0 && self.image_height > 0
    }

    /// Closed world-frame hull of the image, if the image size is known.
    ///
    /// The edges that map to pixel column `image_width` or row `image_height`
    /// lie outside the image; use [`MapMetadata::covers`] for the exact test.
    #[must_use]
    pub fn world_bounds(&self) -> Option<Boundary> {
        if !self.has_image_size() {
            return None;
        }
        let t = &self.transform;
        let (x1, x2) = ordered(-t.offset_x / t.scale_x, (f64::from(self.image_width) - t.offset_x) / t.scale_x);
        let (y1, y2) = ordered(-t.offset_y / t.scale_y, (f64::from(self.image_height) - t.offset_y) / t.scale_y);
        Some(Boundary { x1, y1, x2, y2, z1: 0.0, z2: 0.0 })
    }

    /// Whether `position` projects into `[0, image_width) × [0, image_height)`.
    ///
    /// Always `false` while the image size is unknown.
    #[must_use]
    pub fn covers(&self, position: &Position) -> bool {
        if !self.has_image_size() {
            return false;
        }
        let pixel = world_to_pixel(self, position);
        (0.0..f64::from(self.image_width)).contains(&pixel.x) && (0.0..f64::from(self.image_height)).contains(&pixel.y)
    }

    /// Reject metadata that cannot produce a usable projection.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the map name is empty or the
    /// transform has zero or non-finite terms.
    pub fn validate(&self) -> Result<(), String> {
        if self.map_name.trim().is_empty() {
            return Err("map name is empty".into());
        }
        self.transform.validate()
    }
}

/// Parse and validate a metadata response body for `deck_id`.
///
/// # Errors
///
/// Returns [`MapError::MetadataUnavailable`] for unparseable JSON or invalid
/// transform parameters.
pub fn parse_metadata(deck_id: &str, body: &str) -> Result<MapMetadata, MapError> {
    let metadata: MapMetadata =
        serde_json::from_str(body).map_err(|e| MapError::metadata(deck_id, format!("malformed payload: {e}")))?;
    metadata
        .validate()
        .map_err(|reason| MapError::metadata(deck_id, reason))?;
    Ok(metadata)
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Resolves alignment metadata for a deck. Enables mocking in tests.
#[async_trait::async_trait]
pub trait MapMetadataStore: Send + Sync {
    /// Fetch the metadata for `deck_id`. No retries.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::MetadataUnavailable`] when the source errors or
    /// the payload is malformed.
    async fn fetch_metadata(&self, deck_id: &str) -> Result<MapMetadata, MapError>;
}

#[cfg(test)]
#[path = "metadata_test.rs"]
mod tests;
