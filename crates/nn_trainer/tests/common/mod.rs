#![allow(dead_code)]

use anyhow::{bail, Result};
use nn_trainer::decode::Decoder;
use nn_trainer::manifest::{DataType, IoConfig, Manifest, Payload, SampleReference};
use nn_trainer::sample::{Sample, Shape};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// `n` vector samples; sample `i` has input `[i]` and a one-hot output of
/// class `i % num_classes`.
pub fn make_samples(n: usize, num_classes: usize) -> Vec<Sample> {
    (0..n)
        .map(|i| {
            let mut output = vec![0.0; num_classes];
            output[i % num_classes] = 1.0;
            Sample::from_vectors(vec![i as f32], output)
        })
        .collect()
}

/// Samples with the given number of members per class, grouped by class.
pub fn make_class_samples(counts: &[usize]) -> Vec<Sample> {
    let mut samples = Vec::new();
    for (class, &count) in counts.iter().enumerate() {
        for _ in 0..count {
            let mut output = vec![0.0; counts.len()];
            output[class] = 1.0;
            samples.push(Sample::from_vectors(vec![samples.len() as f32], output));
        }
    }
    samples
}

/// "Decodes" a file name of the form `<n>.img` into `shape.numel()` copies of
/// `n`, without touching the filesystem. Names containing `bad` fail.
///
/// Every successful decode appends `n` to a shared log.
pub struct NameDecoder {
    pub delay: Duration,
    decoded: Arc<Mutex<Vec<f32>>>,
}

impl NameDecoder {
    pub fn new() -> Self {
        Self::slow(Duration::ZERO)
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            decoded: Arc::default(),
        }
    }

    /// Handle on the decode log that stays valid after the decoder is moved
    /// into a loader.
    pub fn log(&self) -> Arc<Mutex<Vec<f32>>> {
        Arc::clone(&self.decoded)
    }
}

impl Decoder for NameDecoder {
    fn decode(&self, path: &Path, shape: Shape) -> Result<Vec<f32>> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem.contains("bad") {
            bail!("corrupt file {}", path.display());
        }
        let value: f32 = stem.parse()?;
        if let Ok(mut decoded) = self.decoded.lock() {
            decoded.push(value);
        }
        Ok(vec![value; shape.numel()])
    }
}

/// Image-input manifest over the given file names with a `2x2` grayscale
/// shape and scalar outputs.
pub fn image_manifest(names: &[&str]) -> Result<Manifest> {
    let io = IoConfig {
        input_type: DataType::Image,
        output_type: DataType::Vector,
        input_shape: Some(Shape::new(1, 2, 2)),
        output_shape: None,
    };
    let references = names
        .iter()
        .enumerate()
        .map(|(i, name)| SampleReference {
            input: Payload::Path(name.into()),
            output: Payload::Values(vec![i as f32]),
        })
        .collect();
    Manifest::from_references(references, "", io)
}

/// The scalar every sample of a batch was built from.
pub fn first_inputs(batch: &[Sample]) -> Vec<f32> {
    batch.iter().map(|s| s.input.data()[0]).collect()
}
