use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::controller::Mode;
use crate::infer::{Classification, Detection};
use crate::ingest::CameraConfig;

const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_OVERLAY_PATH: &str = "overlay.png";
const DEFAULT_CLASSIFIER_INPUT: u32 = 224;
const DEFAULT_DETECTOR_INPUT: u32 = 416;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;

pub const BACKENDS: &[&str] = &["stub", "tract"];

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    backend: Option<String>,
    default_mode: Option<Mode>,
    classifier: Option<ModelConfigFile>,
    detector: Option<ModelConfigFile>,
    camera: Option<CameraConfigFile>,
    overlay: Option<OverlayConfigFile>,
    stub: Option<StubResults>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    path: Option<PathBuf>,
    scale: Option<f32>,
}

/// Canned results served by the `stub` backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StubResults {
    #[serde(default)]
    pub classifications: Vec<Classification>,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: String,
    pub default_mode: Mode,
    pub classifier: ModelSettings,
    pub detector: ModelSettings,
    /// `None` means no camera is available.
    pub camera: Option<CameraConfig>,
    pub overlay_path: PathBuf,
    pub overlay_scale: Option<f32>,
    pub stub: StubResults,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub input_size: u32,
    pub confidence_threshold: f32,
}

impl ModelSettings {
    fn from_file(file: Option<ModelConfigFile>, default_input: u32) -> Self {
        let file = file.unwrap_or_default();
        Self {
            model_path: file.model_path,
            labels_path: file.labels_path,
            input_size: file.input_size.unwrap_or(default_input),
            confidence_threshold: file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.input_size == 0 {
            return Err(anyhow!("{} input_size must be greater than zero", name));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!(
                "{} confidence_threshold must be within [0, 1]",
                name
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FOOTSCAN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        let camera = file.camera.and_then(|camera| {
            camera.url.map(|url| CameraConfig {
                url,
                width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            })
        });
        Self {
            backend: file.backend.unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            default_mode: file.default_mode.unwrap_or_default(),
            classifier: ModelSettings::from_file(file.classifier, DEFAULT_CLASSIFIER_INPUT),
            detector: ModelSettings::from_file(file.detector, DEFAULT_DETECTOR_INPUT),
            camera,
            overlay_path: file
                .overlay
                .as_ref()
                .and_then(|overlay| overlay.path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OVERLAY_PATH)),
            overlay_scale: file.overlay.and_then(|overlay| overlay.scale),
            stub: file.stub.unwrap_or_default(),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(backend) = env_value("FOOTSCAN_BACKEND") {
            self.backend = backend;
        }
        if let Some(mode) = env_value("FOOTSCAN_MODE") {
            self.default_mode = mode.parse()?;
        }
        if let Some(path) = env_value("FOOTSCAN_CLASSIFIER_MODEL") {
            self.classifier.model_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_value("FOOTSCAN_CLASSIFIER_LABELS") {
            self.classifier.labels_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_value("FOOTSCAN_DETECTOR_MODEL") {
            self.detector.model_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_value("FOOTSCAN_DETECTOR_LABELS") {
            self.detector.labels_path = Some(PathBuf::from(path));
        }
        if let Some(threshold) = env_value("FOOTSCAN_DETECTOR_THRESHOLD") {
            self.detector.confidence_threshold = threshold.parse().map_err(|_| {
                anyhow!("FOOTSCAN_DETECTOR_THRESHOLD must be a number between 0 and 1")
            })?;
        }
        if let Some(url) = env_value("FOOTSCAN_CAMERA_URL") {
            match self.camera.as_mut() {
                Some(camera) => camera.url = url,
                None => {
                    self.camera = Some(CameraConfig {
                        url,
                        width: DEFAULT_CAMERA_WIDTH,
                        height: DEFAULT_CAMERA_HEIGHT,
                    })
                }
            }
        }
        if let Some(path) = env_value("FOOTSCAN_OVERLAY_PATH") {
            self.overlay_path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Normalize and check the settings. `load` calls this; call it again
    /// after changing fields by hand.
    pub fn validate(&mut self) -> Result<()> {
        self.backend = self.backend.trim().to_lowercase();
        if !BACKENDS.contains(&self.backend.as_str()) {
            return Err(anyhow!(
                "unknown backend '{}' (expected one of: {})",
                self.backend,
                BACKENDS.join(", ")
            ));
        }
        self.classifier.validate("classifier")?;
        self.detector.validate("detector")?;

        if self.backend == "tract"
            && (self.classifier.model_path.is_none() || self.detector.model_path.is_none())
        {
            return Err(anyhow!(
                "tract backend requires both classifier and detector model paths"
            ));
        }
        if let Some(scale) = self.overlay_scale {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(anyhow!("overlay scale must be a positive number"));
            }
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_file(AppConfigFile::default())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
