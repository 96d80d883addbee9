//! src/planner.rs
//!
//! Augmentation planning: expands the original manifest into the ordered list
//! of [`AugmentedEntry`] values the rest of the pipeline iterates over.
//!
//! # Policy
//! Samples are grouped by class (argmax of the expected output). For a class
//! with `n` members the target count is
//! - `n * factor` when `factor > 0`, else `n`;
//! - raised to `max_n` (or `max_n * factor`) when balancing is enabled.
//!
//! The missing `target - n` entries are drawn with replacement from the
//! class's own originals.
//!
//! # Determinism
//! The plan uses its own [`StdRng`] seeded with [`PLAN_SEED`]. Calling
//! [`plan`] twice with the same inputs always yields the same list. The
//! randomness of the *transforms* applied to augmented entries comes from a
//! separate per-materialization generator in the data loader.

use crate::manifest::Manifest;
use crate::sample::argmax;
use anyhow::{anyhow, ensure, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Fixed seed of the planner's generator.
pub const PLAN_SEED: u64 = 42;

/// Entry in the expanded (augmented) sample list.
///
/// `source_index` always points into the *original* manifest, never at
/// another augmented entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AugmentedEntry {
    pub source_index: usize,
    pub augmented: bool,
}

impl AugmentedEntry {
    pub fn original(source_index: usize) -> Self {
        Self {
            source_index,
            augmented: false,
        }
    }

    pub fn synthetic(source_index: usize) -> Self {
        Self {
            source_index,
            augmented: true,
        }
    }
}

/// The 1:1 mapping of a manifest of `len` samples.
pub fn identity_entries(len: usize) -> Vec<AugmentedEntry> {
    (0..len).map(AugmentedEntry::original).collect()
}

/// Expands `outputs` (one expected-output vector per original sample) into
/// the augmented entry list.
///
/// Returns the originals in order followed by synthetic entries grouped by
/// ascending class index, in generation order within a class.
///
/// # Errors
/// - augmentation requested for an empty manifest
/// - augmentation requested while a sample has an empty output vector
/// - `augmentation_factor` so large that a class target or the total entry
///   count does not fit in `usize`, or the entry list cannot be allocated
pub fn plan<O>(
    outputs: &[O],
    augmentation_factor: usize,
    balance_classes: bool,
) -> Result<Vec<AugmentedEntry>>
where
    O: AsRef<[f32]>,
{
    let mut entries = identity_entries(outputs.len());
    if augmentation_factor == 0 && !balance_classes {
        return Ok(entries);
    }

    ensure!(
        !outputs.is_empty(),
        "Cannot plan augmentation (factor {}, balance {}) for an empty manifest",
        augmentation_factor,
        balance_classes
    );

    let mut class_indices: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, output) in outputs.iter().enumerate() {
        let class = argmax(output.as_ref()).ok_or_else(|| {
            anyhow!(
                "Sample {} has an empty expected output; cannot derive its class",
                idx
            )
        })?;
        class_indices.entry(class).or_default().push(idx);
    }

    let max_class_count = class_indices.values().map(Vec::len).max().unwrap_or(0);

    // Every target is checked before anything is drawn or allocated.
    let mut total = outputs.len();
    let mut to_generate = Vec::with_capacity(class_indices.len());
    for (class, indices) in &class_indices {
        let current = indices.len();
        let target = class_target(current, max_class_count, augmentation_factor, balance_classes)
            .ok_or_else(|| {
                anyhow!(
                    "Augmentation factor {} overflows the target of class {} ({} samples)",
                    augmentation_factor,
                    class,
                    current
                )
            })?;
        let missing = target.saturating_sub(current);
        total = total.checked_add(missing).ok_or_else(|| {
            anyhow!(
                "Augmentation factor {} overflows the total entry count",
                augmentation_factor
            )
        })?;
        to_generate.push(missing);
    }

    entries.try_reserve(total - outputs.len()).map_err(|e| {
        anyhow!("Cannot allocate {} augmented entries: {}", total, e)
    })?;
    let mut rng = StdRng::seed_from_u64(PLAN_SEED);

    for (indices, missing) in class_indices.values().zip(to_generate) {
        let current = indices.len();
        for _ in 0..missing {
            let pick = indices[rng.random_range(0..current)];
            entries.push(AugmentedEntry::synthetic(pick));
        }
    }

    tracing::info!(
        original = outputs.len(),
        augmented = entries.len() - outputs.len(),
        total = entries.len(),
        classes = class_indices.len(),
        "Data augmentation: {} original + {} augmented = {} total samples",
        outputs.len(),
        entries.len() - outputs.len(),
        entries.len()
    );

    Ok(entries)
}

/// Plans augmentation for every sample in `manifest`.
///
/// Only the expected outputs are inspected; nothing is decoded.
pub fn plan_manifest(
    manifest: &Manifest,
    augmentation_factor: usize,
    balance_classes: bool,
) -> Result<Vec<AugmentedEntry>> {
    if augmentation_factor == 0 && !balance_classes {
        return Ok(identity_entries(manifest.len()));
    }

    let outputs = manifest
        .entries()
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            entry.expected_output().ok_or_else(|| {
                anyhow!(
                    "Sample {} has no inline expected output (image outputs cannot be class-balanced)",
                    idx
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    plan(&outputs, augmentation_factor, balance_classes)
}

/// `None` when the target does not fit in `usize`.
fn class_target(current: usize, max_count: usize, factor: usize, balance: bool) -> Option<usize> {
    let scale = |n: usize| if factor > 0 { n.checked_mul(factor) } else { Some(n) };
    let mut target = scale(current)?;
    if balance {
        target = target.max(scale(max_count)?);
    }
    Some(target)
}
