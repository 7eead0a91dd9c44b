//! Rendering: composites the map image and the robot marker onto a surface.
//!
//! This module is the only place that writes pixels. It receives a read-only
//! view of the loaded image and an optional marker pose and produces a frame.
//! It does not touch session state. Every call starts from a cleared
//! surface, so identical inputs always yield identical pixels.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tracing::debug;

use crate::consts::{
    CLEAR_RGBA, MARKER_NOSE_BASE_RATIO, MARKER_NOSE_PX, MARKER_OUTLINE_PX, MARKER_OUTLINE_RGBA, MARKER_RADIUS_PX,
    MARKER_RGBA,
};
use crate::map_image::LoadedImage;
use crate::projection::{PixelPose, Point};

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

/// Largest size (and its scale factor) that fits `width × height` inside the
/// maximum bounds without distorting or upscaling.
#[must_use]
pub fn fit_size(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32, f64) {
    if width == 0 || height == 0 {
        return (0, 0, 1.0);
    }
    let scale = (f64::from(max_width) / f64::from(width))
        .min(f64::from(max_height) / f64::from(height))
        .min(1.0);
    if scale >= 1.0 {
        return (width, height, 1.0);
    }
    let w = ((f64::from(width) * scale).round() as u32).max(1);
    let h = ((f64::from(height) * scale).round() as u32).max(1);
    (w, h, scale)
}

/// Base image prepared for one surface size.
struct Layout {
    source: Arc<RgbaImage>,
    scale: f64,
    base: RgbaImage,
}

/// The drawing surface a view renders into.
pub struct Surface {
    max_width: u32,
    max_height: u32,
    pixels: RgbaImage,
    layout: Option<Layout>,
}

impl Surface {
    #[must_use]
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self { max_width, max_height, pixels: RgbaImage::new(0, 0), layout: None }
    }

    /// Size the surface for `image`. No-op when already fitted to it.
    pub fn fit_to(&mut self, image: &LoadedImage) {
        if self
            .layout
            .as_ref()
            .is_some_and(|layout| Arc::ptr_eq(&layout.source, image.raster()))
        {
            return;
        }
        let source = Arc::clone(image.raster());
        let (w, h, scale) = fit_size(source.width(), source.height(), self.max_width, self.max_height);
        let base = if scale >= 1.0 {
            (*source).clone()
        } else {
            imageops::resize(&*source, w, h, FilterType::Triangle)
        };
        debug!(
            native_width = source.width(),
            native_height = source.height(),
            width = w,
            height = h,
            scale,
            "surface fitted"
        );
        self.pixels = RgbaImage::new(w, h);
        self.layout = Some(Layout { source, scale, base });
    }

    /// Drop the fitted image and blank the surface.
    pub fn reset(&mut self) {
        self.layout = None;
        self.pixels = RgbaImage::new(0, 0);
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Surface pixels per native image pixel (1.0 when nothing is fitted).
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.layout.as_ref().map_or(1.0, |layout| layout.scale)
    }

    #[must_use]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Draw one frame: clear, base image, then the marker if one is supplied.
///
/// `marker` is in native image pixels; it is scaled with the image.
pub fn draw_frame(surface: &mut Surface, image: &LoadedImage, marker: Option<PixelPose>) {
    surface.fit_to(image);
    let Surface { pixels, layout, .. } = surface;
    let Some(layout) = layout.as_ref() else {
        return;
    };

    // Layer 1: clear.
    for px in pixels.pixels_mut() {
        *px = Rgba(CLEAR_RGBA);
    }

    // Layer 2: base image.
    imageops::replace(pixels, &layout.base, 0, 0);

    // Layer 3: robot marker.
    if let Some(marker) = marker {
        draw_marker(pixels, marker, layout.scale);
    }
}

// =============================================================
// Marker
// =============================================================

fn draw_marker(pixels: &mut RgbaImage, marker: PixelPose, scale: f64) {
    if !(marker.x.is_finite() && marker.y.is_finite() && marker.rotation.is_finite()) {
        debug!(?marker, "non-finite marker skipped");
        return;
    }
    let center = Point::new(marker.x * scale, marker.y * scale);
    let (sin, cos) = marker.rotation.sin_cos();
    let half_base = MARKER_RADIUS_PX * MARKER_NOSE_BASE_RATIO;

    let tip = Point::new(center.x + cos * MARKER_NOSE_PX, center.y + sin * MARKER_NOSE_PX);
    let left = Point::new(center.x - sin * half_base, center.y + cos * half_base);
    let right = Point::new(center.x + sin * half_base, center.y - cos * half_base);

    fill_disc(pixels, center, MARKER_RADIUS_PX + MARKER_OUTLINE_PX, Rgba(MARKER_OUTLINE_RGBA));
    fill_triangle(pixels, [tip, left, right], Rgba(MARKER_RGBA));
    fill_disc(pixels, center, MARKER_RADIUS_PX, Rgba(MARKER_RGBA));
}

/// Pixel index range `[lo, hi]` covering `min..max`, clipped to `0..limit`.
fn clip_span(min: f64, max: f64, limit: u32) -> Option<(u32, u32)> {
    if limit == 0 || max < 0.0 || min >= f64::from(limit) {
        return None;
    }
    let lo = min.floor().max(0.0) as u32;
    let hi = (max.ceil() as u32).min(limit - 1);
    (lo <= hi).then_some((lo, hi))
}

fn fill_disc(pixels: &mut RgbaImage, center: Point, radius: f64, color: Rgba<u8>) {
    let Some((x0, x1)) = clip_span(center.x - radius, center.x + radius, pixels.width()) else {
        return;
    };
    let Some((y0, y1)) = clip_span(center.y - radius, center.y + radius, pixels.height()) else {
        return;
    };
    let r2 = radius * radius;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = f64::from(x) + 0.5 - center.x;
            let dy = f64::from(y) + 0.5 - center.y;
            if dx * dx + dy * dy <= r2 {
                pixels.put_pixel(x, y, color);
            }
        }
    }
}

fn fill_triangle(pixels: &mut RgbaImage, [a, b, c]: [Point; 3], color: Rgba<u8>) {
    let min_x = a.x.min(b.x).min(c.x);
    let max_x = a.x.max(b.x).max(c.x);
    let min_y = a.y.min(b.y).min(c.y);
    let max_y = a.y.max(b.y).max(c.y);
    let Some((x0, x1)) = clip_span(min_x, max_x, pixels.width()) else {
        return;
    };
    let Some((y0, y1)) = clip_span(min_y, max_y, pixels.height()) else {
        return;
    };
    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            let e0 = edge(a, b, p);
            let e1 = edge(b, c, p);
            let e2 = edge(c, a, p);
            let inside = (e0 >= 0.0 && e1 >= 0.0 && e2 >= 0.0) || (e0 <= 0.0 && e1 <= 0.0 && e2 <= 0.0);
            if inside {
                pixels.put_pixel(x, y, color);
            }
        }
    }
}

fn edge(a: Point, b: Point, p: Point) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}
