//! World pose to native image pixel transform, and its inverse.

#[cfg(test)]
#[path = "projection_test.rs"]
mod projection_test;

use crate::metadata::MapMetadata;
use crate::types::{Pose, Position};

/// A point in either world or native image pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Marker placement in native image pixels.
///
/// `rotation` is in radians, measured from +X towards +Y on the Y-down raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPose {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

/// Project a world pose onto the map image described by `metadata`.
///
/// `raw = scale * world + offset` per axis; with `invert_y` the pixel row is
/// `image_height - raw_y` and the heading's Y component flips with it.
#[must_use]
pub fn project(metadata: &MapMetadata, pose: &Pose) -> PixelPose {
    let pixel = world_to_pixel(metadata, &pose.position);
    let yaw = pose.yaw();
    let t = &metadata.transform;
    let dx = yaw.cos() * t.scale_x;
    let mut dy = yaw.sin() * t.scale_y;
    if metadata.invert_y {
        dy = -dy;
    }
    PixelPose { x: pixel.x, y: pixel.y, rotation: dy.atan2(dx) }
}

/// Convert a world-space position to native image pixels.
#[must_use]
pub fn world_to_pixel(metadata: &MapMetadata, position: &Position) -> Point {
    let t = &metadata.transform;
    let raw_y = t.scale_y * position.y + t.offset_y;
    Point {
        x: t.scale_x * position.x + t.offset_x,
        y: if metadata.invert_y { f64::from(metadata.image_height) - raw_y } else { raw_y },
    }
}

/// Convert native image pixels back to world-space (planar) coordinates.
#[must_use]
pub fn pixel_to_world(metadata: &MapMetadata, pixel: Point) -> Point {
    let t = &metadata.transform;
    let raw_y = if metadata.invert_y { f64::from(metadata.image_height) - pixel.y } else { pixel.y };
    Point { x: (pixel.x - t.offset_x) / t.scale_x, y: (raw_y - t.offset_y) / t.scale_y }
}
