//! src/train/trainer.rs
//!
//! The training driver: epochs over a [`DataLoader`] through one
//! [`SampleProvider`](crate::dataloader::SampleProvider), one accumulator
//! step per batch.

use crate::dataloader::DataLoader;
use crate::sample::{argmax, Sample};
use crate::sampler::{RandomSampler, Sampler, SequentialSampler};
use crate::train::accumulator::{GradientAccumulator, MergeStrategy};
use crate::train::kernel::{GradientKernel, Parameters};
use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Hyper-parameters of a training run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f32,
    pub batch_size: usize,
    /// Draw a fresh permutation (seeded with `seed + epoch`) every epoch.
    pub shuffle_samples: bool,
    pub seed: u64,
    /// Gradient worker threads (0 = available parallelism).
    pub num_threads: usize,
    pub merge_strategy: MergeStrategy,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 1,
            learning_rate: 0.01,
            batch_size: 32,
            shuffle_samples: true,
            seed: 0,
            num_threads: 0,
            merge_strategy: MergeStrategy::default(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.epochs > 0, "Number of epochs must be greater than 0");
        ensure!(self.batch_size > 0, "Batch size must be greater than 0");
        ensure!(
            self.learning_rate.is_finite() && self.learning_rate > 0.0,
            "Learning rate must be finite and positive (got {})",
            self.learning_rate
        );
        Ok(())
    }
}

/// Progress snapshot passed to the callback after every sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingProgress {
    /// 1-based.
    pub current_epoch: usize,
    pub total_epochs: usize,
    /// Samples finished in this epoch (1-based).
    pub current_sample: usize,
    pub total_samples: usize,
    pub sample_loss: f32,
    /// Mean loss of the epoch on its last callback, `0` otherwise.
    pub epoch_loss: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingReport {
    pub epochs: usize,
    pub num_samples: usize,
    /// Mean loss of the last epoch.
    pub final_loss: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationReport {
    pub num_samples: usize,
    pub total_loss: f64,
    pub average_loss: f64,
    /// Samples whose predicted argmax equals the expected argmax.
    pub num_correct: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
    accumulator: GradientAccumulator,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate().context("Invalid training configuration")?;
        let accumulator = GradientAccumulator::new(config.num_threads, config.merge_strategy);
        Ok(Self {
            config,
            accumulator,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Trains `parameters` in place over every entry of `loader` for the
    /// configured number of epochs.
    ///
    /// # Errors
    /// - the loader has no samples or the parameters do not fit the kernel
    /// - any load/decode/transform or kernel failure; updates applied by
    ///   earlier batches are kept
    pub fn fit<K, F>(
        &self,
        loader: &DataLoader,
        kernel: &K,
        parameters: &mut Parameters,
        on_progress: F,
    ) -> Result<TrainingReport>
    where
        K: GradientKernel + ?Sized,
        F: Fn(&TrainingProgress) + Send + Sync,
    {
        let total_samples = loader.num_samples();
        ensure!(total_samples > 0, "Cannot train on an empty data set");
        parameters.check_shapes(&kernel.parameter_shapes())?;

        let sampler: Box<dyn Sampler> = if self.config.shuffle_samples {
            Box::new(RandomSampler::new(total_samples, self.config.seed)?)
        } else {
            Box::new(SequentialSampler::new(total_samples))
        };

        let mut provider = loader.make_sample_provider()?;
        let batch_size = self.config.batch_size;
        let num_batches = total_samples.div_ceil(batch_size);

        tracing::info!(
            epochs = self.config.epochs,
            samples = total_samples,
            batch_size,
            threads = self.accumulator.num_threads(),
            "Training started"
        );

        let mut final_loss = 0.0_f32;
        for epoch in 0..self.config.epochs {
            let order = sampler.permutation(epoch);
            let samples_done = AtomicUsize::new(0);
            let loss_sum = Mutex::new(0.0_f64);

            for batch_index in 0..num_batches {
                let batch = provider
                    .get_batch(&order, batch_size, batch_index)
                    .with_context(|| format!("Epoch {}: loading batch {}", epoch + 1, batch_index))?;

                self.accumulator
                    .train_one_batch(
                        kernel,
                        &batch,
                        parameters,
                        self.config.learning_rate,
                        |outcome| {
                            if let Ok(mut sum) = loss_sum.lock() {
                                *sum += f64::from(outcome.loss);
                            }
                            let current = samples_done.fetch_add(1, Ordering::AcqRel) + 1;
                            let epoch_loss = if current == total_samples {
                                loss_sum
                                    .lock()
                                    .map(|sum| (*sum / total_samples as f64) as f32)
                                    .unwrap_or(0.0)
                            } else {
                                0.0
                            };
                            on_progress(&TrainingProgress {
                                current_epoch: epoch + 1,
                                total_epochs: self.config.epochs,
                                current_sample: current,
                                total_samples,
                                sample_loss: outcome.loss,
                                epoch_loss,
                            });
                        },
                    )
                    .with_context(|| format!("Epoch {}: training batch {}", epoch + 1, batch_index))?;
            }

            let epoch_sum = loss_sum
                .into_inner()
                .map_err(|_| anyhow!("Epoch loss accumulator poisoned"))?;
            final_loss = (epoch_sum / total_samples as f64) as f32;
            tracing::info!(
                epoch = epoch + 1,
                loss = final_loss,
                "Epoch {}/{} complete",
                epoch + 1,
                self.config.epochs
            );
        }

        Ok(TrainingReport {
            epochs: self.config.epochs,
            num_samples: total_samples,
            final_loss,
        })
    }

    /// Loss and argmax accuracy of `parameters` over `samples`.
    pub fn evaluate<K>(
        &self,
        kernel: &K,
        parameters: &Parameters,
        samples: &[Sample],
    ) -> Result<EvaluationReport>
    where
        K: GradientKernel + ?Sized,
    {
        let mut total_loss = 0.0_f64;
        let mut num_correct = 0;

        for (idx, sample) in samples.iter().enumerate() {
            let (loss, _) = kernel
                .compute_gradient(sample, parameters)
                .with_context(|| format!("Evaluating sample {}", idx))?;
            total_loss += f64::from(loss);

            let prediction = kernel.predict(&sample.input, parameters)?;
            let predicted = argmax(&prediction);
            if predicted.is_some() && predicted == sample.class_index() {
                num_correct += 1;
            }
        }

        let num_samples = samples.len();
        let (average_loss, accuracy) = if num_samples == 0 {
            (0.0, 0.0)
        } else {
            (
                total_loss / num_samples as f64,
                num_correct as f64 / num_samples as f64,
            )
        };

        Ok(EvaluationReport {
            num_samples,
            total_loss,
            average_loss,
            num_correct,
            accuracy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(TrainingConfig::default().validate().is_ok());
        for bad in [
            TrainingConfig {
                epochs: 0,
                ..TrainingConfig::default()
            },
            TrainingConfig {
                batch_size: 0,
                ..TrainingConfig::default()
            },
            TrainingConfig {
                learning_rate: f32::NAN,
                ..TrainingConfig::default()
            },
            TrainingConfig {
                learning_rate: -0.1,
                ..TrainingConfig::default()
            },
        ] {
            assert!(Trainer::new(bad).is_err());
        }
    }

    #[test]
    fn test_config_json_defaults() -> Result<()> {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"epochs": 3, "merge_strategy": "direct"}"#)?;
        assert_eq!(config.epochs, 3);
        assert_eq!(config.merge_strategy, MergeStrategy::Direct);
        assert_eq!(config.batch_size, TrainingConfig::default().batch_size);
        Ok(())
    }
}
