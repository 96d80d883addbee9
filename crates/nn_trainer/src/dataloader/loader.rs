//! src/dataloader/loader.rs
//!
//! DataLoader constructors and the operations a training run drives.
//!
//! # Constructor Overview
//! - `new()` - Any manifest, decoded with [`ImageDecoder`]
//! - `with_decoder()` - Any manifest with a custom [`Decoder`]
//! - `from_samples()` - Resident samples (e.g. produced by an IDX reader)
//! - `from_json_file()` - Samples JSON; only references are stored
//!
//! # Lifecycle
//! ```ignore
//! let mut loader = DataLoader::from_json_file("train.json", io, LoaderConfig::default())?;
//! loader.plan_augmentation(2, true)?;       // optional, before any provider
//! let mut provider = loader.make_sample_provider()?;
//! let batch = provider.get_batch(&permutation, 32, 0)?;
//! ```
//!
//! Providers capture a snapshot of the augmented entry list when they are
//! created; re-planning afterwards only affects providers made later.

use crate::decode::{Decoder, ImageDecoder};
use crate::manifest::{IoConfig, Manifest};
use crate::planner::{self, AugmentedEntry};
use crate::sample::Sample;
use crate::transforms::AugmentationPipeline;
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::Arc;

use super::config::LoaderConfig;
use super::materialize::Materializer;
use super::provider::SampleProvider;

/// Owns the manifest, the augmented entry list and the decode pool.
pub struct DataLoader {
    manifest: Arc<Manifest>,
    entries: Arc<Vec<AugmentedEntry>>,
    decoder: Arc<dyn Decoder>,
    augmentation: Arc<AugmentationPipeline>,
    io_pool: Option<Arc<rayon::ThreadPool>>,
    config: LoaderConfig,
}

impl std::fmt::Debug for DataLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLoader")
            .field("num_original_samples", &self.manifest.len())
            .field("num_samples", &self.entries.len())
            .field("augmentation", &self.augmentation)
            .field("config", &self.config)
            .finish()
    }
}

impl DataLoader {
    /// Creates a loader that decodes image payloads with [`ImageDecoder`].
    pub fn new(manifest: Manifest, config: LoaderConfig) -> Result<Self> {
        Self::with_decoder(manifest, ImageDecoder::new(), config)
    }

    /// Creates a loader with a custom decoder.
    ///
    /// # Errors
    /// - the decode thread pool cannot be built
    pub fn with_decoder<D>(manifest: Manifest, decoder: D, config: LoaderConfig) -> Result<Self>
    where
        D: Decoder + 'static,
    {
        let augmentation = AugmentationPipeline::new(config.transforms)
            .context("Invalid augmentation configuration")?;

        let io_threads = config.effective_io_threads();
        let io_pool = if io_threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(io_threads)
                .thread_name(|i| format!("nn-trainer-io-{}", i))
                .build()
                .context("Failed to build decode thread pool")?;
            Some(Arc::new(pool))
        } else {
            None
        };

        tracing::debug!(
            samples = manifest.len(),
            io_threads,
            "Data loader created"
        );

        Ok(Self {
            entries: Arc::new(planner::identity_entries(manifest.len())),
            manifest: Arc::new(manifest),
            decoder: Arc::new(decoder),
            augmentation: Arc::new(augmentation),
            io_pool,
            config,
        })
    }

    /// Creates a loader over resident samples.
    pub fn from_samples(samples: Vec<Sample>, config: LoaderConfig) -> Result<Self> {
        Self::new(Manifest::from_samples(samples), config)
    }

    /// Creates a loader from a samples JSON file; relative paths resolve
    /// against the file's directory.
    pub fn from_json_file(path: impl AsRef<Path>, io: IoConfig, config: LoaderConfig) -> Result<Self> {
        Self::new(Manifest::from_json_file(path, io)?, config)
    }

    /// Replaces the entry list with the augmentation plan for this manifest.
    ///
    /// `factor == 0 && !balance_classes` resets to the 1:1 mapping. See
    /// [`planner::plan`] for the policy and its errors.
    pub fn plan_augmentation(&mut self, augmentation_factor: usize, balance_classes: bool) -> Result<()> {
        let entries = planner::plan_manifest(&self.manifest, augmentation_factor, balance_classes)?;
        self.entries = Arc::new(entries);
        Ok(())
    }

    /// Size of the augmented entry list (what a training epoch iterates).
    pub fn num_samples(&self) -> usize {
        self.entries.len()
    }

    /// Size of the original manifest.
    pub fn num_original_samples(&self) -> usize {
        self.manifest.len()
    }

    pub fn entries(&self) -> &[AugmentedEntry] {
        &self.entries
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Expected outputs of every entry in entry order. Image outputs are
    /// decoded.
    pub fn all_outputs(&self) -> Result<Vec<Vec<f32>>> {
        let materializer = self.materializer();
        (0..self.entries.len())
            .map(|idx| materializer.load_output(idx))
            .collect()
    }

    /// Starts a provider (and its prefetch worker) over the current entries.
    pub fn make_sample_provider(&self) -> Result<SampleProvider> {
        SampleProvider::new(self.materializer(), &self.config)
    }

    /// Synchronously materializes `entry_indices` in order.
    pub fn load_batch(&self, entry_indices: &[usize]) -> Result<Vec<Sample>> {
        self.materializer().load_batch(entry_indices)
    }

    /// Synchronously materializes one entry with a fresh generator.
    pub fn load_sample(&self, entry_index: usize) -> Result<Sample> {
        self.materializer()
            .load_sample(entry_index, &mut StdRng::from_os_rng())
    }

    fn materializer(&self) -> Materializer {
        Materializer::new(
            self.manifest.clone(),
            self.entries.clone(),
            self.decoder.clone(),
            self.augmentation.clone(),
            self.io_pool.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::AugmentationTransforms;

    fn vector_samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let mut output = vec![0.0; 2];
                output[i % 2] = 1.0;
                Sample::from_vectors(vec![i as f32 / 10.0], output)
            })
            .collect()
    }

    #[test]
    fn test_plan_augmentation_updates_entries() -> Result<()> {
        let mut loader = DataLoader::from_samples(vector_samples(4), LoaderConfig::default())?;
        assert_eq!(loader.num_samples(), 4);

        loader.plan_augmentation(3, false)?;
        assert_eq!(loader.num_samples(), 12);
        assert_eq!(loader.num_original_samples(), 4);
        assert_eq!(loader.all_outputs()?.len(), 12);

        loader.plan_augmentation(0, false)?;
        assert_eq!(loader.num_samples(), 4);
        Ok(())
    }

    #[test]
    fn test_original_entries_are_untouched() -> Result<()> {
        let config = LoaderConfig::builder().io_threads(2).build();
        let mut loader = DataLoader::from_samples(vector_samples(4), config)?;
        loader.plan_augmentation(2, false)?;

        let originals: Vec<usize> = (0..4).collect();
        assert_eq!(loader.load_batch(&originals)?, vector_samples(4));
        Ok(())
    }

    #[test]
    fn test_synthetic_entries_without_transforms_copy_source() -> Result<()> {
        let config = LoaderConfig::builder()
            .io_threads(1)
            .transforms(AugmentationTransforms::none())
            .build();
        let mut loader = DataLoader::from_samples(vector_samples(2), config)?;
        loader.plan_augmentation(2, false)?;

        for idx in 2..loader.num_samples() {
            let entry = loader.entries()[idx];
            assert!(entry.augmented);
            assert_eq!(loader.load_sample(idx)?, vector_samples(2)[entry.source_index]);
        }
        Ok(())
    }

    #[test]
    fn test_out_of_range_entry() -> Result<()> {
        let loader = DataLoader::from_samples(vector_samples(2), LoaderConfig::default())?;
        assert!(loader.load_sample(2).is_err());
        assert!(loader.load_batch(&[0, 5]).is_err());
        Ok(())
    }
}
