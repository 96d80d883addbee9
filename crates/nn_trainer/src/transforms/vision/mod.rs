//! src/transforms/vision/mod.rs
//!
//! Augmentation transforms for NCHW `f32` tensors in `[0, 1]`.
//!
//! # Module Organization
//!
//! ```text
//! transforms/vision/
//! ├── geometric.rs     → Spatial transformations (flip, rotate, translate)
//! ├── photometric.rs   → Intensity changes (brightness, contrast, noise)
//! └── augmentation.rs  → The configurable pipeline applied to augmented entries
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use crate::transforms::Transform;
//! use crate::transforms::vision::{AugmentationPipeline, AugmentationTransforms};
//!
//! let pipeline = AugmentationPipeline::new(AugmentationTransforms::default())?;
//! let augmented = pipeline.apply(tensor, &mut rng)?;
//! ```

pub mod augmentation;
pub mod geometric;
pub mod photometric;

pub use augmentation::{AugmentationPipeline, AugmentationTransforms};
pub use geometric::{HorizontalFlip, RandomRotation, RandomTranslation};
pub use photometric::{GaussianNoise, RandomBrightness, RandomContrast};
