//! Shared numeric constants for the map viewer.

// ── Surface ─────────────────────────────────────────────────────

/// Default maximum surface width and height in pixels.
pub const DEFAULT_MAX_SURFACE_PX: u32 = 600;

/// Default frame tick interval (~60 Hz).
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// Fill used when the surface is cleared.
pub const CLEAR_RGBA: [u8; 4] = [0, 0, 0, 0];

// ── Marker ──────────────────────────────────────────────────────

/// Radius of the marker body in surface pixels.
pub const MARKER_RADIUS_PX: f64 = 6.0;

/// Width of the light ring drawn around the marker body.
pub const MARKER_OUTLINE_PX: f64 = 1.5;

/// Distance from the marker center to the tip of the heading nose.
pub const MARKER_NOSE_PX: f64 = 13.0;

/// Half-width of the nose at its base, as a fraction of the body radius.
pub const MARKER_NOSE_BASE_RATIO: f64 = 0.8;

pub const MARKER_RGBA: [u8; 4] = [220, 38, 38, 255];
pub const MARKER_OUTLINE_RGBA: [u8; 4] = [255, 255, 255, 255];

// ── Placeholder ─────────────────────────────────────────────────

pub const PLACEHOLDER_WIDTH: u32 = 320;
pub const PLACEHOLDER_HEIGHT: u32 = 240;
pub const PLACEHOLDER_BACKGROUND_RGBA: [u8; 4] = [230, 230, 230, 255];
pub const PLACEHOLDER_INK_RGBA: [u8; 4] = [150, 150, 150, 255];

/// Border thickness of the placeholder frame, in pixels.
pub const PLACEHOLDER_BORDER_PX: u32 = 4;
