//! src/train/mod.rs
//!
//! Everything downstream of a materialized batch.
//!
//! ```text
//! SampleProvider ──Vec<Sample>──→ GradientAccumulator ──Gradients──→ Parameters
//!                                   │  scoped worker per chunk
//!                                   ↓
//!                              GradientKernel (DenseKernel)
//! ```
//!
//! [`Trainer`] drives epochs; [`GradientAccumulator`] handles one batch;
//! [`GradientKernel`] is the only place that knows the model's math.

pub mod accumulator;
pub mod activation;
pub mod dense;
pub mod kernel;
pub mod trainer;

pub use accumulator::{BatchReport, GradientAccumulator, MergeStrategy, SampleOutcome};
pub use activation::Activation;
pub use dense::{DenseKernel, LayerSpec};
pub use kernel::{GradientKernel, Gradients, Parameters};
pub use trainer::{EvaluationReport, Trainer, TrainingConfig, TrainingProgress, TrainingReport};
