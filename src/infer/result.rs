use std::fmt;

use serde::Deserialize;

/// One ranked label produced by the classifier.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Classification {
    pub label: String,
    /// Expected in `0.0..=1.0`. Out-of-range values are rejected by the formatter.
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Normalized rectangle with its origin at the image's lower-left corner.
///
/// All fields are fractions of the image dimensions, nominally in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle covering the whole image.
    pub fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }
}

/// One object found by the detector.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bounding_box: NormalizedRect,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bounding_box: NormalizedRect) -> Self {
        Self {
            label: label.into(),
            confidence,
            bounding_box,
        }
    }
}

/// Output of a single inference call, tagged by the kind of model that ran.
#[derive(Clone, Debug, PartialEq)]
pub enum InferenceOutcome {
    Classified(Vec<Classification>),
    Detected(Vec<Detection>),
}

impl InferenceOutcome {
    pub fn len(&self) -> usize {
        match self {
            InferenceOutcome::Classified(items) => items.len(),
            InferenceOutcome::Detected(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for InferenceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceOutcome::Classified(items) => write!(f, "{} classification(s)", items.len()),
            InferenceOutcome::Detected(items) => write!(f, "{} detection(s)", items.len()),
        }
    }
}
