//! src/config.rs
//!
//! File-driven run configuration.
//!
//! ```text
//! {
//!   "io":           { "input_type": "vector", "output_type": "vector" },
//!   "training":     { "epochs": 10, "learning_rate": 0.1, "batch_size": 4 },
//!   "augmentation": { "factor": 0, "balance_classes": true },
//!   "layers": [
//!     { "neurons": 8, "activation": "tanh" },
//!     { "neurons": 1, "activation": "sigmoid" }
//!   ]
//! }
//! ```
//! Every section except `layers` may be omitted.

use crate::dataloader::LoaderConfig;
use crate::manifest::IoConfig;
use crate::train::{DenseKernel, LayerSpec, TrainingConfig};
use crate::transforms::AugmentationTransforms;
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Planner and materialization settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Per-class multiplier; 0 disables oversampling.
    pub factor: usize,
    pub balance_classes: bool,
    pub transforms: AugmentationTransforms,
    /// Decode threads (0 = available parallelism).
    pub io_threads: usize,
}

impl AugmentationConfig {
    pub fn is_enabled(&self) -> bool {
        self.factor > 0 || self.balance_classes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub io: IoConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub augmentation: AugmentationConfig,
    pub layers: Vec<LayerSpec>,
}

impl RunConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("Failed to parse run config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.io.validate()?;
        self.training.validate()?;
        ensure!(!self.layers.is_empty(), "Config must declare at least one layer");
        Ok(())
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig::builder()
            .io_threads(self.augmentation.io_threads)
            .transforms(self.augmentation.transforms)
            .build()
    }

    /// Dense network over `input_dim` inputs with the configured layers.
    pub fn build_kernel(&self, input_dim: usize) -> Result<DenseKernel> {
        DenseKernel::new(input_dim, self.layers.clone())
    }
}
