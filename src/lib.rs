//! Deck map viewer: overlays a robot's live pose on a static floor-plan image.
//!
//! The crate owns the full map pipeline for one mounted view: resolving the
//! deck's alignment metadata, fetching and decoding the floor-plan raster
//! (with a built-in placeholder on failure), projecting world poses into
//! pixel space, and drawing the base image plus a directional robot marker on
//! every frame tick. Hosts mount a [`view::MapView`] for a deck and feed it
//! poses; everything else happens inside the view's task.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`view`] | Mountable async host and its render loop |
//! | [`controller`] | Testable session state machine ([`controller::ViewCore`]) |
//! | [`metadata`] | Map metadata types and the metadata store trait |
//! | [`map_image`] | Decoded images, release-on-drop handles, placeholder |
//! | [`projection`] | World pose to pixel pose transform |
//! | [`render`] | Drawing surface and frame compositing |
//! | [`backend`] | HTTP implementation of both fetch traits |
//! | [`types`] | Deck, pose and error types shared by every module |
//! | [`config`] | Environment-driven configuration |
//! | [`consts`] | Shared numeric constants (surface limits, marker geometry) |

pub mod backend;
pub mod config;
pub mod consts;
pub mod controller;
pub mod map_image;
pub mod metadata;
pub mod projection;
pub mod render;
pub mod types;
pub mod view;
