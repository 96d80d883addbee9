//! src/sampler.rs
//!
//! Epoch orderings over the augmented entry list.
//!
//! A training epoch asks its sampler for one permutation of
//! `0..num_entries` and slices it into batches through the
//! [`SampleProvider`](crate::dataloader::SampleProvider). Samplers only
//! produce indices; they never touch samples.

use anyhow::{ensure, Result};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

/// Produces the visiting order of one epoch.
pub trait Sampler: Send + Sync {
    /// Indices for `epoch`, lazily.
    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_>;

    /// The whole order for `epoch`.
    fn permutation(&self, epoch: usize) -> Vec<usize> {
        self.iter(epoch).collect()
    }
}

// ================================================================================================
// Sequential
// ================================================================================================

/// `0, 1, ..., num_entries - 1` every epoch.
#[derive(Debug, Clone, Copy)]
pub struct SequentialSampler {
    num_entries: usize,
}

impl SequentialSampler {
    pub fn new(num_entries: usize) -> Self {
        Self { num_entries }
    }
}

impl Sampler for SequentialSampler {
    fn iter(&self, _epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        Box::new(0..self.num_entries)
    }
}

// ================================================================================================
// Shuffled
// ================================================================================================

/// A uniform shuffle of `0..num_entries`, reseeded every epoch with
/// `seed + epoch` (wrapping). A run is reproducible from its seed while
/// consecutive epochs see different orders.
#[derive(Debug, Clone, Copy)]
pub struct RandomSampler {
    num_entries: usize,
    seed: u64,
}

impl RandomSampler {
    pub fn new(num_entries: usize, seed: u64) -> Result<Self> {
        ensure!(num_entries > 0, "Cannot shuffle an empty entry list");
        Ok(Self { num_entries, seed })
    }

    fn epoch_rng(&self, epoch: usize) -> StdRng {
        StdRng::seed_from_u64(self.seed.wrapping_add(epoch as u64))
    }
}

impl Sampler for RandomSampler {
    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        Box::new(self.permutation(epoch).into_iter())
    }

    fn permutation(&self, epoch: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.num_entries).collect();
        order.shuffle(&mut self.epoch_rng(epoch));
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ignores_epoch() {
        let sampler = SequentialSampler::new(6);
        assert_eq!(sampler.permutation(0), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(sampler.permutation(9), sampler.permutation(0));
        assert_eq!(SequentialSampler::new(0).iter(0).count(), 0);
    }

    #[test]
    fn test_random_is_a_permutation() -> Result<()> {
        let sampler = RandomSampler::new(50, 3)?;
        let mut order = sampler.permutation(4);
        order.sort_unstable();
        assert_eq!(order, (0..50).collect::<Vec<_>>());
        assert_eq!(sampler.iter(4).collect::<Vec<_>>(), sampler.permutation(4));
        Ok(())
    }

    #[test]
    fn test_random_seeding() -> Result<()> {
        let a = RandomSampler::new(50, 3)?;
        let b = RandomSampler::new(50, 3)?;
        assert_eq!(a.permutation(1), b.permutation(1));
        assert_ne!(a.permutation(0), a.permutation(1));
        // seed + epoch: (3, epoch 1) and (4, epoch 0) share a generator
        assert_eq!(a.permutation(1), RandomSampler::new(50, 4)?.permutation(0));
        assert!(RandomSampler::new(0, 3).is_err());
        Ok(())
    }
}
