use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::infer::result::{Classification, Detection};
use crate::picture::Picture;

use super::backend::{InferenceBackend, InferenceCapability};

type SharedBackend = Arc<Mutex<dyn InferenceBackend>>;

/// Thread-safe registry of inference backends.
///
/// Backends are wrapped in `Mutex` because `classify`/`detect` take `&mut self`.
pub struct BackendRegistry {
    backends: HashMap<String, SharedBackend>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: InferenceBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<SharedBackend> {
        self.backends.get(name).cloned()
    }

    /// Get default backend.
    pub fn default_backend(&self) -> Option<SharedBackend> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// List registered backends, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run every backend's warm-up hook.
    pub fn warm_up_all(&self) -> Result<()> {
        for (name, backend) in &self.backends {
            let mut guard = backend
                .lock()
                .map_err(|_| anyhow!("backend '{}' lock poisoned", name))?;
            guard.warm_up()?;
        }
        Ok(())
    }

    /// Select a backend that supports the requested capability.
    ///
    /// Prefers the default backend when it supports the capability.
    pub fn backend_for_capability(&self, capability: InferenceCapability) -> Result<SharedBackend> {
        if let Some(default_backend) = self.default_backend() {
            let supports = {
                let guard = default_backend
                    .lock()
                    .map_err(|_| anyhow!("default backend lock poisoned"))?;
                guard.supports(capability)
            };
            if supports {
                return Ok(default_backend);
            }
        }

        for name in self.list() {
            let Some(backend) = self.get(&name) else {
                continue;
            };
            let supports = {
                let guard = backend
                    .lock()
                    .map_err(|_| anyhow!("backend lock poisoned"))?;
                guard.supports(capability)
            };
            if supports {
                return Ok(backend);
            }
        }

        Err(anyhow!(
            "no registered backend supports capability {:?}",
            capability
        ))
    }

    /// Classify using a backend that supports classification.
    pub fn classify(&self, picture: &Picture) -> Result<Vec<Classification>> {
        let backend = self.backend_for_capability(InferenceCapability::Classification)?;
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        guard.classify(picture)
    }

    /// Detect using a backend that supports object detection.
    pub fn detect(&self, picture: &Picture) -> Result<Vec<Detection>> {
        let backend = self.backend_for_capability(InferenceCapability::ObjectDetection)?;
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("backend lock poisoned"))?;
        guard.detect(picture)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
