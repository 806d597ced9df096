use anyhow::Result;

use crate::infer::result::{Classification, Detection};
use crate::picture::Picture;

/// Inference capabilities a backend can offer.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InferenceCapability {
    Classification,
    ObjectDetection,
}

/// Inference backend trait.
///
/// This is the seam between the crate and whatever runtime actually executes
/// the models. Everything above it (formatting, overlay, the controller) only
/// ever sees typed records or an error, delivered once per call.
///
/// Implementations receive an upright picture and must treat it as read-only.
pub trait InferenceBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend supports a capability.
    fn supports(&self, capability: InferenceCapability) -> bool;

    /// Rank labels for the whole picture, highest confidence first.
    fn classify(&mut self, picture: &Picture) -> Result<Vec<Classification>>;

    /// Locate objects in the picture. Boxes use a lower-left origin.
    fn detect(&mut self, picture: &Picture) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once at startup.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
