//! View session state machine: the runtime-free core of a mounted map view.
//!
//! DESIGN
//! ======
//! `Idle → Loading → Ready → Rendering`, with `Error` entered when either
//! fetch fails. Every deck selection (and teardown) bumps the
//! [`Generation`]; fetch results carry the generation they were started
//! under and are dropped on mismatch, which also drops any image handle
//! they hold. `Error` keeps producing placeholder frames until the next
//! selection. The async host in [`crate::view`] feeds results and ticks in.

use std::fmt;

use tracing::{debug, info, warn};

use crate::config::ViewOptions;
use crate::map_image::LoadedImage;
use crate::metadata::MapMetadata;
use crate::projection::{PixelPose, project};
use crate::render::{Surface, draw_frame};
use crate::types::{Deck, MapError, Pose};

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;

/// Deck-selection epoch. Every async continuation carries the generation it
/// was started under; results from an older generation are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Loading,
    Ready,
    Rendering,
    /// A fetch failed; the placeholder is drawn and the overlay is off.
    Error,
}

/// Why a frame was drawn without a marker. Expected, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionSkipped {
    NoMetadata,
    PlaceholderImage,
    NoPose,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Overlay {
    Marker(PixelPose),
    Skipped(ProjectionSkipped),
}

impl Overlay {
    #[must_use]
    pub fn marker(&self) -> Option<PixelPose> {
        match self {
            Self::Marker(pose) => Some(*pose),
            Self::Skipped(_) => None,
        }
    }
}

/// Summary of one drawn frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub generation: Generation,
    /// 1-based frame number within the session.
    pub frame: u64,
    pub overlay: Overlay,
    pub placeholder: bool,
    pub width: u32,
    pub height: u32,
}

/// What the host should do after a metadata result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataStep {
    /// Result belonged to a superseded selection and was dropped.
    Stale,
    /// Start the image fetch for this deck.
    FetchImage { site_id: String, map_name: String },
    /// Metadata failed; the placeholder is installed and frames can start.
    Placeholder,
}

/// Core view session state: all logic that doesn't depend on a runtime.
///
/// Separated from [`crate::view::MapView`] so the state machine can be
/// driven step by step in tests.
pub struct ViewCore {
    state: ViewState,
    generation: Generation,
    deck: Option<Deck>,
    metadata: Option<MapMetadata>,
    image: Option<LoadedImage>,
    surface: Surface,
    frames_drawn: u64,
    last_frame: Option<FrameReport>,
    last_error: Option<MapError>,
}

impl ViewCore {
    #[must_use]
    pub fn new(options: &ViewOptions) -> Self {
        Self {
            state: ViewState::Idle,
            generation: Generation::default(),
            deck: None,
            metadata: None,
            image: None,
            surface: Surface::new(options.max_surface_width, options.max_surface_height),
            frames_drawn: 0,
            last_frame: None,
            last_error: None,
        }
    }

    // --- Lifecycle ---

    /// Start a new session for `deck`. Releases the previous session's image.
    pub fn select_deck(&mut self, deck: Deck) -> Generation {
        self.generation = self.generation.next();
        self.release_session();
        info!(deck_id = %deck.id, site_id = %deck.site_id, generation = %self.generation, "deck selected");
        self.deck = Some(deck);
        self.state = ViewState::Loading;
        self.generation
    }

    /// Apply a metadata result.
    pub fn on_metadata(&mut self, generation: Generation, result: Result<MapMetadata, MapError>) -> MetadataStep {
        if !self.awaiting(generation) || self.metadata.is_some() {
            debug!(%generation, current = %self.generation, "stale metadata result discarded");
            return MetadataStep::Stale;
        }
        let Some(deck) = self.deck.as_ref() else {
            return MetadataStep::Stale;
        };
        match result {
            Ok(metadata) => {
                info!(deck_id = %deck.id, map_name = %metadata.map_name, %generation, "map metadata resolved");
                let step = MetadataStep::FetchImage { site_id: deck.site_id.clone(), map_name: metadata.map_name.clone() };
                self.metadata = Some(metadata);
                step
            }
            Err(err) => {
                warn!(error = %err, code = err.error_code(), %generation, "map metadata unavailable; showing placeholder");
                self.metadata = None;
                self.fall_back(err);
                MetadataStep::Placeholder
            }
        }
    }

    /// Apply an image result. Returns `false` when the result was stale.
    ///
    /// A stale image is dropped here, which releases its handle.
    pub fn on_image(&mut self, generation: Generation, result: Result<LoadedImage, MapError>) -> bool {
        if !self.awaiting(generation) || self.metadata.is_none() {
            debug!(%generation, current = %self.generation, "stale image result discarded");
            return false;
        }
        match result {
            Ok(image) => {
                self.metadata = self.metadata.take().map(|metadata| align_to_image(metadata, &image));
                self.surface.fit_to(&image);
                info!(
                    %generation,
                    width = image.width(),
                    height = image.height(),
                    surface_width = self.surface.width(),
                    surface_height = self.surface.height(),
                    "map image decoded"
                );
                self.image = Some(image);
                self.state = ViewState::Ready;
            }
            Err(err) => {
                warn!(error = %err, code = err.error_code(), %generation, "map image unavailable; showing placeholder");
                self.fall_back(err);
            }
        }
        true
    }

    /// `Ready → Rendering`. Returns whether frames should be scheduled.
    pub fn start_rendering(&mut self) -> bool {
        match self.state {
            ViewState::Ready => {
                self.state = ViewState::Rendering;
                true
            }
            ViewState::Error => true,
            ViewState::Idle | ViewState::Loading | ViewState::Rendering => false,
        }
    }

    /// Draw one frame with the most recent live pose, if drawing.
    pub fn tick(&mut self, live_pose: Option<&Pose>) -> Option<FrameReport> {
        if !self.is_drawing() {
            return None;
        }
        let image = self.image.as_ref()?;
        let overlay = self.overlay(image, live_pose);
        draw_frame(&mut self.surface, image, overlay.marker());
        self.frames_drawn += 1;

        let report = FrameReport {
            generation: self.generation,
            frame: self.frames_drawn,
            overlay,
            placeholder: image.is_placeholder(),
            width: self.surface.width(),
            height: self.surface.height(),
        };
        self.last_frame = Some(report);
        Some(report)
    }

    /// Destroy the session. In-flight results become stale.
    pub fn teardown(&mut self) {
        self.generation = self.generation.next();
        self.release_session();
        self.deck = None;
        self.state = ViewState::Idle;
        info!(generation = %self.generation, "view session torn down");
    }

    // --- Queries ---

    #[must_use]
    pub fn state(&self) -> ViewState {
        self.state
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub fn deck(&self) -> Option<&Deck> {
        self.deck.as_ref()
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&MapMetadata> {
        self.metadata.as_ref()
    }

    #[must_use]
    pub fn image(&self) -> Option<&LoadedImage> {
        self.image.as_ref()
    }

    #[must_use]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    #[must_use]
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    #[must_use]
    pub fn last_frame(&self) -> Option<FrameReport> {
        self.last_frame
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&MapError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn is_drawing(&self) -> bool {
        matches!(self.state, ViewState::Rendering | ViewState::Error)
    }

    // --- Internals ---

    fn awaiting(&self, generation: Generation) -> bool {
        generation == self.generation && self.state == ViewState::Loading
    }

    fn fall_back(&mut self, err: MapError) {
        let placeholder = LoadedImage::placeholder();
        self.surface.fit_to(&placeholder);
        self.image = Some(placeholder);
        self.last_error = Some(err);
        self.state = ViewState::Error;
    }

    fn overlay(&self, image: &LoadedImage, live_pose: Option<&Pose>) -> Overlay {
        let Some(metadata) = self.metadata.as_ref() else {
            return Overlay::Skipped(ProjectionSkipped::NoMetadata);
        };
        if image.is_placeholder() {
            return Overlay::Skipped(ProjectionSkipped::PlaceholderImage);
        }
        let fallback = self.deck.as_ref().and_then(|deck| deck.default_pose.as_ref());
        match live_pose.or(fallback) {
            Some(pose) => Overlay::Marker(project(metadata, pose)),
            None => Overlay::Skipped(ProjectionSkipped::NoPose),
        }
    }

    fn release_session(&mut self) {
        if let Some(handle) = self.image.as_ref().and_then(LoadedImage::handle_id) {
            debug!(%handle, "releasing superseded map image");
        }
        self.image = None;
        self.metadata = None;
        self.surface.reset();
        self.frames_drawn = 0;
        self.last_frame = None;
        self.last_error = None;
    }
}

/// Fill in image dimensions the metadata source left out.
fn align_to_image(metadata: MapMetadata, image: &LoadedImage) -> MapMetadata {
    if !metadata.has_image_size() {
        return metadata.with_image_size(image.width(), image.height());
    }
    if (metadata.image_width, metadata.image_height) != (image.width(), image.height()) {
        warn!(
            map_name = %metadata.map_name,
            metadata_width = metadata.image_width,
            metadata_height = metadata.image_height,
            image_width = image.width(),
            image_height = image.height(),
            "metadata image size differs from decoded image"
        );
    }
    metadata
}
