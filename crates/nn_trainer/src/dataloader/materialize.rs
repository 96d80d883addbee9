//! src/dataloader/materialize.rs
//!
//! Turns augmented entry indices into concrete [`Sample`]s.
//!
//! A batch of `n` indices is split into `min(io_threads, n)` contiguous
//! chunks whose sizes differ by at most one. Chunks run on a dedicated
//! `rayon` pool (never the training threads), each with its own freshly
//! OS-seeded generator, and the results are assembled in chunk order so the
//! batch order always matches the requested indices.

use crate::decode::{resolve_path, Decoder};
use crate::manifest::{Manifest, ManifestEntry, Payload};
use crate::parallel::chunk_ranges;
use crate::planner::AugmentedEntry;
use crate::sample::{Sample, Shape, Tensor};
use crate::transforms::{AugmentationPipeline, Transform};
use anyhow::{anyhow, ensure, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;

/// Immutable snapshot of everything needed to load a sample.
///
/// Cloning is cheap (shared `Arc`s); the prefetch worker owns its own clone.
#[derive(Clone)]
pub(crate) struct Materializer {
    manifest: Arc<Manifest>,
    entries: Arc<Vec<AugmentedEntry>>,
    decoder: Arc<dyn Decoder>,
    augmentation: Arc<AugmentationPipeline>,
    pool: Option<Arc<rayon::ThreadPool>>,
    io_threads: usize,
}

impl Materializer {
    pub(crate) fn new(
        manifest: Arc<Manifest>,
        entries: Arc<Vec<AugmentedEntry>>,
        decoder: Arc<dyn Decoder>,
        augmentation: Arc<AugmentationPipeline>,
        pool: Option<Arc<rayon::ThreadPool>>,
    ) -> Self {
        let io_threads = pool.as_ref().map_or(1, |p| p.current_num_threads().max(1));
        Self {
            manifest,
            entries,
            decoder,
            augmentation,
            pool,
            io_threads,
        }
    }

    pub(crate) fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Loads `entry_indices` in order.
    ///
    /// Returns the first error in index order.
    pub(crate) fn load_batch(&self, entry_indices: &[usize]) -> Result<Vec<Sample>> {
        let count = entry_indices.len();
        let num_chunks = self.io_threads.min(count);

        let pool = match &self.pool {
            Some(pool) if num_chunks > 1 => pool,
            _ => return self.load_chunk(entry_indices, &mut StdRng::from_os_rng()),
        };

        let ranges = chunk_ranges(count, num_chunks);
        let chunks: Vec<Result<Vec<Sample>>> = pool.install(|| {
            ranges
                .par_iter()
                .map(|range| {
                    let mut rng = StdRng::from_os_rng();
                    self.load_chunk(&entry_indices[range.clone()], &mut rng)
                })
                .collect()
        });

        let mut batch = Vec::with_capacity(count);
        for chunk in chunks {
            batch.extend(chunk?);
        }
        Ok(batch)
    }

    fn load_chunk(&self, entry_indices: &[usize], rng: &mut StdRng) -> Result<Vec<Sample>> {
        entry_indices
            .iter()
            .map(|&idx| self.load_sample(idx, rng))
            .collect()
    }

    /// Loads a single augmented entry; synthetic entries go through the
    /// augmentation pipeline using `rng`.
    pub(crate) fn load_sample(&self, entry_index: usize, rng: &mut StdRng) -> Result<Sample> {
        let entry = self.entries.get(entry_index).ok_or_else(|| {
            anyhow!(
                "Entry index {} out of range ({} entries)",
                entry_index,
                self.entries.len()
            )
        })?;

        let sample = self
            .load_source(entry.source_index)
            .with_context(|| format!("Failed to load entry {}", entry_index))?;

        if !entry.augmented {
            return Ok(sample);
        }

        let Sample { input, output } = sample;
        let input = self
            .augmentation
            .apply(input, rng)
            .with_context(|| format!("Failed to augment entry {}", entry_index))?;
        Ok(Sample::new(input, output))
    }

    /// Expected output of an entry without running any augmentation. Inline
    /// outputs are copied; image outputs are decoded.
    pub(crate) fn load_output(&self, entry_index: usize) -> Result<Vec<f32>> {
        let entry = self.entries.get(entry_index).ok_or_else(|| {
            anyhow!(
                "Entry index {} out of range ({} entries)",
                entry_index,
                self.entries.len()
            )
        })?;

        match self
            .manifest
            .get(entry.source_index)
            .and_then(ManifestEntry::expected_output)
        {
            Some(output) => Ok(output.to_vec()),
            None => self
                .load_source(entry.source_index)
                .map(|sample| sample.output)
                .with_context(|| format!("Failed to load output of entry {}", entry_index)),
        }
    }

    fn load_source(&self, source_index: usize) -> Result<Sample> {
        let entry = self.manifest.get(source_index).ok_or_else(|| {
            anyhow!(
                "Source index {} out of range ({} samples)",
                source_index,
                self.manifest.len()
            )
        })?;

        let reference = match entry {
            ManifestEntry::Resident(sample) => return Ok(sample.clone()),
            ManifestEntry::Reference(reference) => reference,
        };

        let io = self.manifest.io();
        let input = match &reference.input {
            Payload::Values(values) => match io.input_shape {
                Some(shape) if shape.numel() == values.len() => Tensor::new(shape, values.clone())?,
                _ => Tensor::from_vec(values.clone()),
            },
            Payload::Path(path) => {
                let shape = io
                    .input_shape
                    .ok_or_else(|| anyhow!("No input_shape configured for image inputs"))?;
                Tensor::new(shape, self.decode(path, shape)?)?
            }
        };

        let output = match &reference.output {
            Payload::Values(values) => values.clone(),
            Payload::Path(path) => {
                let shape = io
                    .output_shape
                    .ok_or_else(|| anyhow!("No output_shape configured for image outputs"))?;
                self.decode(path, shape)?
            }
        };

        Ok(Sample::new(input, output))
    }

    fn decode(&self, path: &Path, shape: Shape) -> Result<Vec<f32>> {
        let full_path = resolve_path(path, self.manifest.base_dir());
        let data = self.decoder.decode(&full_path, shape)?;
        ensure!(
            data.len() == shape.numel(),
            "Decoder returned {} values for {} but shape {:?} needs {}",
            data.len(),
            full_path.display(),
            shape,
            shape.numel()
        );
        Ok(data)
    }
}
