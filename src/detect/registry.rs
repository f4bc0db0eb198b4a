use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use super::backend::SmokeDetector;

/// Named detector backends, one of which is selected per run.
pub struct DetectorRegistry {
    backends: BTreeMap<String, Box<dyn SmokeDetector>>,
    default_name: Option<String>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            backends: BTreeMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: SmokeDetector + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Box::new(backend));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("detector backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    /// Take the named backend (or the default) out of the registry and
    /// initialize it.
    pub fn select(mut self, name: Option<&str>) -> Result<Box<dyn SmokeDetector>> {
        let name = match name.or(self.default_name.as_deref()) {
            Some(name) => name.to_string(),
            None => return Err(anyhow!("no detector backend registered")),
        };
        let mut backend = self.backends.remove(&name).ok_or_else(|| {
            anyhow!(
                "detector backend '{}' not registered (available: {})",
                name,
                self.list().join(", ")
            )
        })?;
        backend.init()?;
        log::info!("detector backend: {}", backend.name());
        Ok(backend)
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
