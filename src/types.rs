//! Shared types: deck descriptors, robot poses and the crate error.

use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced while loading or hosting a map view.
///
/// The two fetch variants never escape a mounted view: the controller
/// recovers from both by falling back to the placeholder image.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    /// The metadata source failed or returned malformed data.
    #[error("map metadata unavailable for deck {deck_id}: {reason}")]
    MetadataUnavailable { deck_id: String, reason: String },

    /// The image could not be fetched or decoded.
    #[error("map image unavailable for {site_id}/{map_name}: {reason}")]
    ImageUnavailable { site_id: String, map_name: String, reason: String },

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The view task has already shut down.
    #[error("map view is no longer mounted")]
    ViewClosed,
}

impl MapError {
    /// Stable machine-readable code for logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MetadataUnavailable { .. } => "E_METADATA_UNAVAILABLE",
            Self::ImageUnavailable { .. } => "E_IMAGE_UNAVAILABLE",
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::ViewClosed => "E_VIEW_CLOSED",
        }
    }

    pub(crate) fn metadata(deck_id: &str, reason: impl Into<String>) -> Self {
        Self::MetadataUnavailable { deck_id: deck_id.to_owned(), reason: reason.into() }
    }

    pub(crate) fn image(site_id: &str, map_name: &str, reason: impl Into<String>) -> Self {
        Self::ImageUnavailable { site_id: site_id.to_owned(), map_name: map_name.to_owned(), reason: reason.into() }
    }
}

// =============================================================================
// POSE
// =============================================================================

/// Position in the deck's real-world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Unit quaternion orientation as published by the robot-state feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Orientation {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 }
    }
}

impl Orientation {
    /// Rotation of `yaw` radians about the vertical axis.
    #[must_use]
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw * 0.5;
        Self { x: 0.0, y: 0.0, z: half.sin(), w: half.cos() }
    }

    /// Heading about the vertical axis, counter-clockwise from +X, in radians.
    #[must_use]
    pub fn yaw(&self) -> f64 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }
}

/// A robot's position and heading in a deck's world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Position,
    #[serde(default)]
    pub orientation: Orientation,
}

impl Pose {
    /// Build a pose from planar coordinates and a yaw angle (radians).
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64, yaw: f64) -> Self {
        Self { position: Position { x, y, z }, orientation: Orientation::from_yaw(yaw) }
    }

    #[must_use]
    pub fn yaw(&self) -> f64 {
        self.orientation.yaw()
    }
}

// =============================================================================
// DECK
// =============================================================================

/// The single input a map view is mounted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    /// Deck identifier used for the metadata lookup.
    pub id: String,
    /// Site (asset) code used for the image lookup.
    #[serde(alias = "assetCode")]
    pub site_id: String,
    #[serde(default, alias = "deckName")]
    pub name: String,
    /// Pose drawn while the live feed has not reported anything.
    #[serde(default, alias = "defaultLocalizationPose")]
    pub default_pose: Option<Pose>,
}

impl Deck {
    #[must_use]
    pub fn new(id: impl Into<String>, site_id: impl Into<String>) -> Self {
        Self { id: id.into(), site_id: site_id.into(), name: String::new(), default_pose: None }
    }

    #[must_use]
    pub fn with_default_pose(mut self, pose: Pose) -> Self {
        self.default_pose = Some(pose);
        self
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
