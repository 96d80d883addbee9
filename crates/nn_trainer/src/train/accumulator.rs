//! src/train/accumulator.rs
//!
//! Data-parallel gradient accumulation for one batch.
//!
//! The batch is split into contiguous chunks (sizes differ by at most one),
//! one per worker thread. Every worker runs forward/loss/backward through the
//! [`GradientKernel`] for each of its samples and merges the result into one
//! shared accumulator. Once all workers have joined, the parameters are
//! updated single-threaded:
//!
//! ```text
//! parameters -= (learning_rate / batch_len) * sum(gradients)
//! ```
//!
//! # Merge strategies
//! - [`MergeStrategy::Direct`]: lock the accumulator once per sample.
//! - [`MergeStrategy::PerWorker`]: sum privately, lock once per worker.
//!
//! Both produce the same sum up to floating-point reassociation.

use crate::parallel::{chunk_ranges, resolve_thread_count};
use crate::sample::Sample;
use crate::train::kernel::{GradientKernel, Gradients, Parameters};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

/// How worker gradients reach the shared accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    Direct,
    #[default]
    PerWorker,
}

/// What the progress callback sees for each finished sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleOutcome {
    /// Position of the sample within the batch.
    pub index_in_batch: usize,
    pub loss: f32,
    /// Samples of this batch finished so far, this one included.
    pub completed: usize,
}

/// Summary of one applied batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchReport {
    pub total_loss: f64,
    pub num_samples: usize,
}

impl BatchReport {
    pub fn mean_loss(&self) -> f64 {
        if self.num_samples == 0 {
            0.0
        } else {
            self.total_loss / self.num_samples as f64
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GradientAccumulator {
    num_threads: usize,
    strategy: MergeStrategy,
}

impl GradientAccumulator {
    /// `num_threads == 0` uses the machine's available parallelism.
    pub fn new(num_threads: usize, strategy: MergeStrategy) -> Self {
        Self {
            num_threads: resolve_thread_count(num_threads),
            strategy,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Sums the gradients of every sample in `batch` without touching the
    /// parameters.
    ///
    /// `on_sample` fires exactly once per sample, possibly from several
    /// threads at once.
    pub fn accumulate<K, F>(
        &self,
        kernel: &K,
        batch: &[Sample],
        parameters: &Parameters,
        on_sample: &F,
    ) -> Result<(Gradients, BatchReport)>
    where
        K: GradientKernel + ?Sized,
        F: Fn(SampleOutcome) + Send + Sync,
    {
        let accumulator = Mutex::new(Gradients::zeros_like(parameters));
        let completed = AtomicUsize::new(0);

        let num_workers = self.num_threads.min(batch.len()).max(1);
        let ranges = chunk_ranges(batch.len(), num_workers);

        let worker = |worker_id: usize, offset: usize, chunk: &[Sample]| -> Result<f64> {
            self.run_worker(kernel, chunk, offset, parameters, &accumulator, &completed, on_sample)
                .with_context(|| format!("Gradient worker {} failed", worker_id))
        };

        let losses: Vec<Result<f64>> = if num_workers == 1 {
            vec![worker(0, 0, batch)]
        } else {
            thread::scope(|scope| {
                let handles: Vec<_> = ranges
                    .iter()
                    .enumerate()
                    .map(|(worker_id, range)| {
                        let chunk = &batch[range.clone()];
                        let offset = range.start;
                        let worker = &worker;
                        scope.spawn(move || worker(worker_id, offset, chunk))
                    })
                    .collect();

                handles
                    .into_iter()
                    .enumerate()
                    .map(|(worker_id, handle)| {
                        handle
                            .join()
                            .map_err(|_| anyhow!("Gradient worker {} panicked", worker_id))?
                    })
                    .collect()
            })
        };

        let mut total_loss = 0.0;
        for loss in losses {
            total_loss += loss?;
        }

        let gradients = accumulator
            .into_inner()
            .map_err(|_| anyhow!("Gradient accumulator poisoned"))?;
        Ok((
            gradients,
            BatchReport {
                total_loss,
                num_samples: batch.len(),
            },
        ))
    }

    /// Accumulates the batch and applies
    /// `parameters -= (learning_rate / batch_len) * sum`.
    ///
    /// An empty batch is a no-op. On error the parameters are left unchanged.
    pub fn train_one_batch<K, F>(
        &self,
        kernel: &K,
        batch: &[Sample],
        parameters: &mut Parameters,
        learning_rate: f32,
        on_sample: F,
    ) -> Result<BatchReport>
    where
        K: GradientKernel + ?Sized,
        F: Fn(SampleOutcome) + Send + Sync,
    {
        if batch.is_empty() {
            return Ok(BatchReport {
                total_loss: 0.0,
                num_samples: 0,
            });
        }

        let (gradients, report) = self.accumulate(kernel, batch, parameters, &on_sample)?;
        parameters.apply_gradients(&gradients, learning_rate / batch.len() as f32)?;
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_worker<K, F>(
        &self,
        kernel: &K,
        chunk: &[Sample],
        offset: usize,
        parameters: &Parameters,
        accumulator: &Mutex<Gradients>,
        completed: &AtomicUsize,
        on_sample: &F,
    ) -> Result<f64>
    where
        K: GradientKernel + ?Sized,
        F: Fn(SampleOutcome) + Send + Sync,
    {
        let mut local = match self.strategy {
            MergeStrategy::PerWorker => Some(Gradients::zeros_like(parameters)),
            MergeStrategy::Direct => None,
        };
        let mut loss_sum = 0.0_f64;

        for (i, sample) in chunk.iter().enumerate() {
            let index_in_batch = offset + i;
            let (loss, gradients) = kernel
                .compute_gradient(sample, parameters)
                .with_context(|| format!("Sample {} of the batch", index_in_batch))?;

            match local.as_mut() {
                Some(local) => local.add_assign(&gradients)?,
                None => lock(accumulator)?.add_assign(&gradients)?,
            }
            loss_sum += f64::from(loss);

            let done = completed.fetch_add(1, Ordering::AcqRel) + 1;
            on_sample(SampleOutcome {
                index_in_batch,
                loss,
                completed: done,
            });
        }

        if let Some(local) = local {
            lock(accumulator)?.add_assign(&local)?;
        }
        Ok(loss_sum)
    }
}

fn lock(accumulator: &Mutex<Gradients>) -> Result<std::sync::MutexGuard<'_, Gradients>> {
    accumulator
        .lock()
        .map_err(|_| anyhow!("Gradient accumulator poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Tensor;

    /// Loss = 0.5 * (p - t)^2 for a single scalar parameter `p`, input ignored.
    struct ScalarKernel;

    impl GradientKernel for ScalarKernel {
        fn parameter_shapes(&self) -> Vec<usize> {
            vec![1]
        }

        fn compute_gradient(&self, sample: &Sample, parameters: &Parameters) -> Result<(f32, Gradients)> {
            let p = parameters.tensors()[0][0];
            let t = sample.output[0];
            Ok((0.5 * (p - t) * (p - t), Gradients::new(vec![vec![p - t]])))
        }

        fn predict(&self, _input: &Tensor, parameters: &Parameters) -> Result<Vec<f32>> {
            Ok(parameters.tensors()[0].clone())
        }
    }

    fn targets(values: &[f32]) -> Vec<Sample> {
        values
            .iter()
            .map(|&t| Sample::from_vectors(vec![0.0], vec![t]))
            .collect()
    }

    #[test]
    fn test_update_is_mean_gradient_step() -> Result<()> {
        let batch = targets(&[1.0, 2.0, 3.0, 6.0]);
        let mut params = Parameters::new(vec![vec![0.0]]);
        let acc = GradientAccumulator::new(3, MergeStrategy::PerWorker);

        let report = acc.train_one_batch(&ScalarKernel, &batch, &mut params, 0.5, |_| {})?;
        // mean gradient = (0 - 3) = -3; step = -0.5 * -3
        assert!((params.tensors()[0][0] - 1.5).abs() < 1e-6);
        assert_eq!(report.num_samples, 4);
        assert!((report.total_loss - 25.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_callback_fires_once_per_sample() -> Result<()> {
        let batch = targets(&[1.0; 10]);
        let seen = Mutex::new(Vec::new());
        let mut params = Parameters::new(vec![vec![0.0]]);
        let acc = GradientAccumulator::new(4, MergeStrategy::Direct);

        acc.train_one_batch(&ScalarKernel, &batch, &mut params, 0.1, |outcome| {
            seen.lock().unwrap().push(outcome);
        })?;

        let mut seen = seen.into_inner().unwrap();
        seen.sort_by_key(|o| o.index_in_batch);
        assert_eq!(
            seen.iter().map(|o| o.index_in_batch).collect::<Vec<_>>(),
            (0..10).collect::<Vec<_>>()
        );
        let mut completed: Vec<usize> = seen.iter().map(|o| o.completed).collect();
        completed.sort_unstable();
        assert_eq!(completed, (1..=10).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_empty_batch_is_noop() -> Result<()> {
        let mut params = Parameters::new(vec![vec![0.25]]);
        let acc = GradientAccumulator::new(2, MergeStrategy::Direct);
        let report = acc.train_one_batch(&ScalarKernel, &[], &mut params, 1.0, |_| {})?;
        assert_eq!(report.num_samples, 0);
        assert_eq!(params.tensors()[0][0], 0.25);
        Ok(())
    }

    #[test]
    fn test_kernel_error_leaves_parameters_untouched() -> Result<()> {
        struct Failing;
        impl GradientKernel for Failing {
            fn parameter_shapes(&self) -> Vec<usize> {
                vec![1]
            }
            fn compute_gradient(&self, sample: &Sample, _: &Parameters) -> Result<(f32, Gradients)> {
                anyhow::ensure!(sample.output[0] < 5.0, "bad sample");
                Ok((0.0, Gradients::new(vec![vec![1.0]])))
            }
            fn predict(&self, _: &Tensor, _: &Parameters) -> Result<Vec<f32>> {
                Ok(vec![])
            }
        }

        let batch = targets(&[1.0, 2.0, 9.0, 3.0]);
        let mut params = Parameters::new(vec![vec![0.0]]);
        let acc = GradientAccumulator::new(2, MergeStrategy::PerWorker);
        let err = acc
            .train_one_batch(&Failing, &batch, &mut params, 1.0, |_| {})
            .unwrap_err();
        assert!(format!("{:#}", err).contains("bad sample"));
        assert_eq!(params.tensors()[0][0], 0.0);
        Ok(())
    }
}
