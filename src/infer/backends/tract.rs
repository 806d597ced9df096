#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::config::ModelSettings;
use crate::infer::backend::{InferenceBackend, InferenceCapability};
use crate::infer::preprocess::{prepare, CropAndScale, Letterbox};
use crate::infer::result::{Classification, Detection};
use crate::picture::Picture;

type Plan = TypedRunnableModel<TypedModel>;

/// Values per detector output row: cx, cy, w, h, score, class.
const DETECTION_ROW_LEN: usize = 6;

struct LoadedModel {
    plan: Plan,
    input_size: u32,
    labels: Vec<String>,
    confidence_threshold: f32,
}

impl LoadedModel {
    fn load(settings: &ModelSettings) -> Result<Self> {
        let model_path = settings
            .model_path
            .as_deref()
            .ok_or_else(|| anyhow!("model path is not configured"))?;
        let size = settings.input_size as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        let labels = match settings.labels_path.as_deref() {
            Some(path) => read_labels(path)?,
            None => Vec::new(),
        };

        Ok(Self {
            plan,
            input_size: settings.input_size,
            labels,
            confidence_threshold: settings.confidence_threshold,
        })
    }

    fn label(&self, index: usize) -> String {
        self.labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", index))
    }

    fn run(&self, rgb: &RgbImage) -> Result<Tensor> {
        let size = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        let mut outputs = self
            .plan
            .run(tvec!(input.into_tensor().into()))
            .context("ONNX inference failed")?;
        if outputs.is_empty() {
            return Err(anyhow!("model produced no outputs"));
        }
        Ok(outputs.remove(0).into_tensor())
    }
}

/// Tract-based backend for ONNX inference.
///
/// Loads a classifier and/or a detector from local model files. Either model
/// failing to load is an error from `new`; callers treat that as fatal.
pub struct TractBackend {
    classifier: Option<LoadedModel>,
    detector: Option<LoadedModel>,
}

impl TractBackend {
    pub fn new(classifier: Option<&ModelSettings>, detector: Option<&ModelSettings>) -> Result<Self> {
        let classifier = classifier
            .map(|settings| LoadedModel::load(settings).context("classifier model"))
            .transpose()?;
        let detector = detector
            .map(|settings| LoadedModel::load(settings).context("detector model"))
            .transpose()?;
        if classifier.is_none() && detector.is_none() {
            return Err(anyhow!("tract backend needs at least one model"));
        }
        Ok(Self {
            classifier,
            detector,
        })
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn supports(&self, capability: InferenceCapability) -> bool {
        match capability {
            InferenceCapability::Classification => self.classifier.is_some(),
            InferenceCapability::ObjectDetection => self.detector.is_some(),
        }
    }

    fn classify(&mut self, picture: &Picture) -> Result<Vec<Classification>> {
        let model = self
            .classifier
            .as_ref()
            .ok_or_else(|| anyhow!("no classifier model loaded"))?;
        let input = prepare(picture, model.input_size, CropAndScale::CenterCrop)?;
        let output = model.run(&input.rgb)?;
        let scores = output
            .to_array_view::<f32>()
            .context("classifier output tensor was not f32")?;
        let probabilities = softmax(scores.iter().copied());

        let mut ranked: Vec<Classification> = probabilities
            .into_iter()
            .enumerate()
            .map(|(i, p)| Classification::new(model.label(i), p))
            .collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(ranked)
    }

    fn detect(&mut self, picture: &Picture) -> Result<Vec<Detection>> {
        let model = self
            .detector
            .as_ref()
            .ok_or_else(|| anyhow!("no detector model loaded"))?;
        let input = prepare(picture, model.input_size, CropAndScale::ScaleFit)?;
        let letterbox = input
            .letterbox
            .ok_or_else(|| anyhow!("scale-fit input is missing its letterbox"))?;
        let output = model.run(&input.rgb)?;
        let values = output
            .as_slice::<f32>()
            .context("detector output tensor was not f32")?;
        decode_rows(values, &letterbox, model.confidence_threshold, |i| model.label(i))
    }
}

fn decode_rows(
    values: &[f32],
    letterbox: &Letterbox,
    threshold: f32,
    label: impl Fn(usize) -> String,
) -> Result<Vec<Detection>> {
    if values.len() % DETECTION_ROW_LEN != 0 {
        return Err(anyhow!(
            "detector output length {} is not a multiple of {}",
            values.len(),
            DETECTION_ROW_LEN
        ));
    }
    let mut detections = Vec::new();
    for row in values.chunks_exact(DETECTION_ROW_LEN) {
        let score = row[4];
        if score.is_nan() || score < threshold {
            continue;
        }
        if let Some(rect) = letterbox.to_normalized(row[0], row[1], row[2], row[3]) {
            let class = row[5].max(0.0) as usize;
            detections.push(Detection::new(label(class), score.min(1.0), rect));
        }
    }
    Ok(detections)
}

fn softmax(scores: impl Iterator<Item = f32>) -> Vec<f32> {
    let scores: Vec<f32> = scores.collect();
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; scores.len()];
    }
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn read_labels(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read labels file {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one() {
        let p = softmax([1.0, 2.0, 3.0].into_iter());
        let total: f32 = p.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn rows_below_threshold_are_skipped() -> Result<()> {
        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            source_width: 10,
            source_height: 10,
        };
        let values = [
            5.0, 5.0, 10.0, 10.0, 0.9, 1.0, //
            5.0, 5.0, 2.0, 2.0, 0.1, 0.0,
        ];
        let detections = decode_rows(&values, &letterbox, 0.5, |i| format!("c{}", i))?;
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "c1");
        Ok(())
    }

    #[test]
    fn ragged_output_is_an_error() {
        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            source_width: 10,
            source_height: 10,
        };
        assert!(decode_rows(&[1.0; 7], &letterbox, 0.5, |_| String::new()).is_err());
    }
}
