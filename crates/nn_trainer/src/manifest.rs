//! src/manifest.rs
//!
//! The manifest is the dataset of record: the immutable list of original
//! samples a training run draws from.
//!
//! Each entry is selected once at load time to be either
//! - a [`ManifestEntry::Reference`]: paths (or small inline vectors) that are
//!   decoded lazily when a batch needs them, or
//! - a [`ManifestEntry::Resident`]: a fully materialized [`Sample`] kept in RAM
//!   (e.g. samples produced by an external IDX reader).
//!
//! # Manifest JSON
//! ```text
//! {
//!   "samples": [
//!     { "input": "digits/0001.png", "output": [0, 1, 0] },
//!     { "input": [0.1, 0.4],        "output": [1, 0, 0] }
//!   ]
//! }
//! ```
//! String payloads are paths, resolved relative to the manifest's directory;
//! array payloads are inline vectors. Which one is expected for the input and
//! output is declared by [`IoConfig`].

use crate::sample::{Sample, Shape};
use anyhow::{anyhow, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How an input or output payload is represented on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Vector,
    Image,
}

/// I/O configuration: how inputs and outputs of the manifest are interpreted
/// and which shape they decode to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    pub input_type: DataType,
    pub output_type: DataType,
    /// Shape inputs decode to. Required for image inputs.
    pub input_shape: Option<Shape>,
    /// Shape outputs decode to. Required for image outputs.
    pub output_shape: Option<Shape>,
}

impl IoConfig {
    /// Checks that every image payload has a declared shape.
    pub fn validate(&self) -> Result<()> {
        if self.input_type == DataType::Image {
            let shape = self
                .input_shape
                .ok_or_else(|| anyhow!("input_type is 'image' but no input_shape was provided"))?;
            ensure!(
                shape.numel() > 0,
                "input_shape must be non-empty (got {:?})",
                shape
            );
        }
        if self.output_type == DataType::Image {
            let shape = self
                .output_shape
                .ok_or_else(|| anyhow!("output_type is 'image' but no output_shape was provided"))?;
            ensure!(
                shape.numel() > 0,
                "output_shape must be non-empty (got {:?})",
                shape
            );
        }
        Ok(())
    }
}

/// One side (input or expected output) of a referenced sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// File to decode when the sample is materialized.
    Path(PathBuf),
    /// Values stored inline in the manifest.
    Values(Vec<f32>),
}

/// A lightweight, not-yet-decoded sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleReference {
    pub input: Payload,
    pub output: Payload,
}

/// A single manifest record. Exactly one representation is populated and it
/// never changes after load.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestEntry {
    Reference(SampleReference),
    Resident(Sample),
}

impl ManifestEntry {
    /// Expected output vector if it is available without decoding anything.
    pub fn expected_output(&self) -> Option<&[f32]> {
        match self {
            ManifestEntry::Resident(sample) => Some(&sample.output),
            ManifestEntry::Reference(reference) => match &reference.output {
                Payload::Values(values) => Some(values),
                Payload::Path(_) => None,
            },
        }
    }
}

/// The immutable list of original samples plus what is needed to decode them.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
    base_dir: PathBuf,
    io: IoConfig,
}

#[derive(Deserialize)]
struct ManifestFile {
    samples: Vec<RawSample>,
}

#[derive(Deserialize)]
struct RawSample {
    input: RawPayload,
    output: RawPayload,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPayload {
    Path(String),
    Values(Vec<f32>),
}

impl Manifest {
    /// Builds a manifest of resident samples (the in-memory path).
    ///
    /// The input shape of the first sample is recorded in the I/O config so
    /// augmentation knows whether inputs are images.
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        let input_shape = samples.first().map(|s| s.input.shape());
        Self {
            entries: samples.into_iter().map(ManifestEntry::Resident).collect(),
            base_dir: PathBuf::new(),
            io: IoConfig {
                input_shape,
                ..IoConfig::default()
            },
        }
    }

    /// Builds a manifest from explicit references.
    pub fn from_references(
        references: Vec<SampleReference>,
        base_dir: impl Into<PathBuf>,
        io: IoConfig,
    ) -> Result<Self> {
        io.validate()?;
        Ok(Self {
            entries: references
                .into_iter()
                .map(ManifestEntry::Reference)
                .collect(),
            base_dir: base_dir.into(),
            io,
        })
    }

    /// Parses a samples JSON file and stores references only; no pixel data
    /// is read here.
    pub fn from_json_file(path: impl AsRef<Path>, io: IoConfig) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to open samples file: {}", path.display()))?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::from_json_str(&text, base_dir, io)
            .with_context(|| format!("Failed to parse samples file: {}", path.display()))
    }

    /// Parses samples JSON, resolving relative paths against `base_dir`.
    pub fn from_json_str(text: &str, base_dir: impl Into<PathBuf>, io: IoConfig) -> Result<Self> {
        io.validate()?;
        let file: ManifestFile = serde_json::from_str(text).context("Invalid samples JSON")?;

        let references = file
            .samples
            .into_iter()
            .enumerate()
            .map(|(idx, raw)| {
                let input = Self::payload(raw.input, io.input_type)
                    .with_context(|| format!("Sample {}: invalid input", idx))?;
                let output = Self::payload(raw.output, io.output_type)
                    .with_context(|| format!("Sample {}: invalid output", idx))?;
                Ok(SampleReference { input, output })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_references(references, base_dir, io)
    }

    fn payload(raw: RawPayload, expected: DataType) -> Result<Payload> {
        match (raw, expected) {
            (RawPayload::Path(path), DataType::Image) => Ok(Payload::Path(PathBuf::from(path))),
            (RawPayload::Values(values), DataType::Vector) => Ok(Payload::Values(values)),
            (RawPayload::Path(path), DataType::Vector) => Err(anyhow!(
                "expected a numeric array but found path '{}'",
                path
            )),
            (RawPayload::Values(_), DataType::Image) => {
                Err(anyhow!("expected an image path but found a numeric array"))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ManifestEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Directory relative paths are resolved against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn io(&self) -> &IoConfig {
        &self.io
    }
}
