//! Equirectangular panorama viewer: GPano crop handling, sphere camera
//! control and autorotation, rendered with wgpu.

pub mod autorotate;
pub mod buffer;
pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod i18n;
pub mod loader;
pub mod mesh;
pub mod metadata;
pub mod navbar;
pub mod panorama;
pub mod renderer;
pub mod timer;
pub mod viewer;

pub use config::{PanoramaSource, ViewerConfiguration};
pub use error::{Result, ViewerError};
pub use events::{EventKind, ViewerEvent};
pub use metadata::PanoramaMetadata;
pub use renderer::{Renderer, SceneHandle};
pub use viewer::Viewer;
