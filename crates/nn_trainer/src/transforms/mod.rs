pub mod core;
pub mod vision;

pub use self::core::{RandomApply, Transform};
pub use vision::{AugmentationPipeline, AugmentationTransforms};
