pub mod config;
pub mod dataloader;
pub mod decode;
pub mod logging;
pub mod manifest;
pub mod parallel;
pub mod planner;
pub mod sample;
pub mod sampler;
pub mod train;
pub mod transforms;

pub use config::RunConfig;
pub use dataloader::{DataLoader, LoaderConfig, SampleProvider};
pub use decode::{Decoder, ImageDecoder};
pub use manifest::{IoConfig, Manifest};
pub use sample::{Sample, Shape, Tensor};
pub use train::{GradientAccumulator, GradientKernel, MergeStrategy, Parameters, Trainer, TrainingConfig};
