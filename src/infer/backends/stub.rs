use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::infer::backend::{InferenceBackend, InferenceCapability};
use crate::infer::result::{Classification, Detection};
use crate::picture::Picture;

/// Stub backend for testing. Returns canned results regardless of the picture.
#[derive(Clone, Debug)]
pub struct StubBackend {
    name: &'static str,
    classifications: Vec<Classification>,
    detections: Vec<Detection>,
    classify: bool,
    detect: bool,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::named("stub")
    }

    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            classifications: Vec::new(),
            detections: Vec::new(),
            classify: true,
            detect: true,
            failure: None,
            delay: None,
            calls: 0,
        }
    }

    pub fn with_classifications(mut self, classifications: Vec<Classification>) -> Self {
        self.classifications = classifications;
        self
    }

    pub fn with_detections(mut self, detections: Vec<Detection>) -> Self {
        self.detections = detections;
        self
    }

    /// Every call fails with `reason` before producing results.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Block the calling worker for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn classify_only(mut self) -> Self {
        self.detect = false;
        self
    }

    pub fn detect_only(mut self) -> Self {
        self.classify = false;
        self
    }

    /// Number of classify/detect calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn serve(&mut self) -> Result<()> {
        self.calls += 1;
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        match &self.failure {
            Some(reason) => Err(anyhow!("{}", reason)),
            None => Ok(()),
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, capability: InferenceCapability) -> bool {
        match capability {
            InferenceCapability::Classification => self.classify,
            InferenceCapability::ObjectDetection => self.detect,
        }
    }

    fn classify(&mut self, _picture: &Picture) -> Result<Vec<Classification>> {
        self.serve()?;
        Ok(self.classifications.clone())
    }

    fn detect(&mut self, _picture: &Picture) -> Result<Vec<Detection>> {
        self.serve()?;
        Ok(self.detections.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::result::NormalizedRect;
    use image::RgbaImage;

    #[test]
    fn stub_backend_returns_canned_results() {
        let picture = Picture::new(RgbaImage::new(2, 2));
        let mut backend = StubBackend::new()
            .with_classifications(vec![Classification::new("callus", 0.7)])
            .with_detections(vec![Detection::new("blister", 0.6, NormalizedRect::full())]);

        let c = backend.classify(&picture).unwrap();
        assert_eq!(c, vec![Classification::new("callus", 0.7)]);

        let d = backend.detect(&picture).unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(backend.calls(), 2);
    }

    #[test]
    fn failing_stub_surfaces_reason() {
        let picture = Picture::new(RgbaImage::new(2, 2));
        let mut backend = StubBackend::new().failing("model not ready");
        let err = backend.classify(&picture).unwrap_err();
        assert_eq!(err.to_string(), "model not ready");
    }

    #[test]
    fn capability_flags() {
        let backend = StubBackend::new().classify_only();
        assert!(backend.supports(InferenceCapability::Classification));
        assert!(!backend.supports(InferenceCapability::ObjectDetection));
    }
}
