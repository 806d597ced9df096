//! Image sources.
//!
//! This module is the picker side of the app:
//! - Library: decode a photo file chosen by the user
//! - Camera: capture a single frame (synthetic `stub://` camera for now)
//!
//! Every source hands back an upright `Picture`. If the camera is requested
//! but not available, the request falls back to the library.

pub mod camera;
pub mod library;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::picture::Picture;

pub use camera::{CameraConfig, CameraSource};
pub use library::load_picture;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickSource {
    Camera,
    Library,
}

/// What the user asked the picker for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickRequest {
    pub source: PickSource,
    /// Library selection. `None` means the user dismissed the library picker.
    pub path: Option<PathBuf>,
}

impl PickRequest {
    pub fn camera() -> Self {
        Self {
            source: PickSource::Camera,
            path: None,
        }
    }

    pub fn library(path: impl Into<PathBuf>) -> Self {
        Self {
            source: PickSource::Library,
            path: Some(path.into()),
        }
    }

    pub fn dismissed() -> Self {
        Self {
            source: PickSource::Library,
            path: None,
        }
    }

    /// Camera request that falls back to `path` if no camera is present.
    pub fn camera_or(path: Option<PathBuf>) -> Self {
        Self {
            source: PickSource::Camera,
            path,
        }
    }
}

#[derive(Debug)]
pub enum PickOutcome {
    Picked(Picture),
    Cancelled,
}

/// Where pictures come from.
pub trait ImageSource: Send {
    fn camera_available(&self) -> bool;

    /// Present the requested picker. Decode failures are errors; a dismissed
    /// picker is `Cancelled`.
    fn pick(&mut self, request: &PickRequest) -> Result<PickOutcome>;
}

/// Library files on disk plus an optional camera.
pub struct LocalImageSource {
    camera: Option<CameraSource>,
}

impl LocalImageSource {
    pub fn new(camera: Option<CameraSource>) -> Self {
        Self { camera }
    }

    fn pick_library(&self, path: Option<&Path>) -> Result<PickOutcome> {
        match path {
            Some(path) => Ok(PickOutcome::Picked(load_picture(path)?)),
            None => {
                log::info!("library picker dismissed");
                Ok(PickOutcome::Cancelled)
            }
        }
    }
}

impl ImageSource for LocalImageSource {
    fn camera_available(&self) -> bool {
        self.camera.is_some()
    }

    fn pick(&mut self, request: &PickRequest) -> Result<PickOutcome> {
        match request.source {
            PickSource::Camera => match self.camera.as_mut() {
                Some(camera) => Ok(PickOutcome::Picked(camera.capture()?)),
                None => {
                    log::info!("camera not available; using library");
                    self.pick_library(request.path.as_deref())
                }
            },
            PickSource::Library => self.pick_library(request.path.as_deref()),
        }
    }
}
