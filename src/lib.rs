//! footscan
//!
//! Pick or capture a photo, run it through an image classifier or an object
//! detector, and show the results on top of the photo.
//!
//! # Architecture
//!
//! - `ingest`: image sources (photo library files, camera)
//! - `infer`: the inference backend trait, backend registry and dispatcher
//! - `format`: inference records to results text
//! - `overlay`: detection boxes composited onto a copy of the picture
//! - `controller`: the screen state machine and stale-result discard
//! - `session`: the event loop that owns the screen
//!
//! Model execution is injected through `InferenceBackend`; the rest of the
//! crate only ever sees typed records or an error.

pub mod config;
pub mod controller;
pub mod format;
pub mod infer;
pub mod ingest;
pub mod overlay;
pub mod picture;
pub mod session;
pub mod ui;

use anyhow::{Context, Result};

pub use config::{AppConfig, ModelSettings, StubResults};
pub use controller::{Alert, InferenceTicket, Mode, Phase, Screen};
pub use format::{format_classifications, format_detections, DetectionSummary};
pub use infer::{
    BackendRegistry, Classification, Completion, Detection, Dispatcher, InferenceBackend,
    InferenceCapability, InferenceOutcome, NormalizedRect, StubBackend,
};
pub use ingest::{ImageSource, LocalImageSource, PickOutcome, PickRequest, PickSource};
pub use overlay::{render_overlay, OverlayOptions, OVERLAY_COLOR};
pub use picture::Picture;
pub use session::{Session, SessionHandle, UiEvent, View};

/// Build the backend registry for a configuration.
///
/// Model construction failures are returned as errors; the binary treats them
/// as fatal since nothing works without the models.
pub fn build_registry(cfg: &AppConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    match cfg.backend.as_str() {
        "tract" => register_tract(&mut registry, cfg)?,
        _ => registry.register(
            StubBackend::new()
                .with_classifications(cfg.stub.classifications.clone())
                .with_detections(cfg.stub.detections.clone()),
        ),
    }
    registry.set_default(&cfg.backend)?;
    registry
        .warm_up_all()
        .context("inference backend warm-up failed")?;
    log::info!("inference backends: {}", registry.list().join(", "));
    Ok(registry)
}

#[cfg(feature = "backend-tract")]
fn register_tract(registry: &mut BackendRegistry, cfg: &AppConfig) -> Result<()> {
    let backend = infer::TractBackend::new(Some(&cfg.classifier), Some(&cfg.detector))
        .context("failed to load inference models")?;
    registry.register(backend);
    Ok(())
}

#[cfg(not(feature = "backend-tract"))]
fn register_tract(_registry: &mut BackendRegistry, _cfg: &AppConfig) -> Result<()> {
    Err(anyhow::anyhow!(
        "tract backend requires the backend-tract feature"
    ))
}
