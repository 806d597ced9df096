//! Turns inference records into the text shown in the results panel.
//!
//! Classifications arrive already ranked; only the first two are shown and the
//! order is never changed here. Detections produce a count line and are passed
//! through untouched (same order, no merging) for the overlay renderer.

use anyhow::{anyhow, Result};

use crate::infer::{Classification, Detection};

pub const NOTHING_RECOGNIZED: &str = "Nothing recognized.";
pub const NOTHING_DETECTED: &str = "Nothing detected.";
pub const CLASSIFYING: &str = "Classifying...";
pub const DETECTING: &str = "Detecting...";

const CLASSIFICATION_HEADER: &str = "Classification:";
const TOP_CLASSIFICATIONS: usize = 2;

/// Display text plus the boxes to draw for a detection pass.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionSummary {
    pub text: String,
    pub overlay: Vec<Detection>,
}

pub fn format_classifications(classifications: &[Classification]) -> Result<String> {
    if classifications.is_empty() {
        return Ok(NOTHING_RECOGNIZED.to_string());
    }
    let top = &classifications[..classifications.len().min(TOP_CLASSIFICATIONS)];
    let mut lines = Vec::with_capacity(top.len());
    for classification in top {
        check_confidence(&classification.label, classification.confidence)?;
        lines.push(format!(
            "Confidence of {}: {:.2} ",
            classification.label, classification.confidence
        ));
    }
    Ok(format!("{}\n{}", CLASSIFICATION_HEADER, lines.join("\n")))
}

pub fn format_detections(detections: &[Detection]) -> Result<DetectionSummary> {
    if detections.is_empty() {
        return Ok(DetectionSummary {
            text: NOTHING_DETECTED.to_string(),
            overlay: Vec::new(),
        });
    }
    for detection in detections {
        check_confidence(&detection.label, detection.confidence)?;
    }
    let area = if detections.len() == 1 { "area" } else { "areas" };
    Ok(DetectionSummary {
        text: format!("Total {} abnormal {} detected.", detections.len(), area),
        overlay: detections.to_vec(),
    })
}

fn check_confidence(label: &str, confidence: f32) -> Result<()> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(anyhow!(
            "confidence {} for '{}' is outside [0, 1]",
            confidence,
            label
        ))
    }
}
