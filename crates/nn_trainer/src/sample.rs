use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// Channel-major shape of an input tensor: `(channels, height, width)`.
///
/// Flat vector inputs use `(1, 1, len)`; images use NCHW without the batch
/// dimension, i.e. `data[c * H * W + h * W + w]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Shape {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Shape of a flat vector of `len` values.
    pub fn vector(len: usize) -> Self {
        Self::new(1, 1, len)
    }

    /// Total number of scalars.
    pub fn numel(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// `true` when the shape describes a 2D image rather than a flat vector.
    pub fn is_image(&self) -> bool {
        self.height > 1 && self.width > 1
    }
}

/// A dense `f32` tensor with an explicit [`Shape`].
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

impl Tensor {
    /// Creates a tensor, checking that `data` matches `shape`.
    pub fn new(shape: Shape, data: Vec<f32>) -> Result<Self> {
        ensure!(
            shape.numel() == data.len(),
            "Tensor data has {} values but shape {}x{}x{} needs {}",
            data.len(),
            shape.channels,
            shape.height,
            shape.width,
            shape.numel()
        );
        Ok(Self { shape, data })
    }

    /// Wraps a flat vector as a `(1, 1, len)` tensor.
    pub fn from_vec(data: Vec<f32>) -> Self {
        Self {
            shape: Shape::vector(data.len()),
            data,
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Replaces the contents with a buffer of identical length.
    pub(crate) fn replace_data(&mut self, data: Vec<f32>) {
        debug_assert_eq!(data.len(), self.data.len());
        self.data = data;
    }
}

/// The `Sample` struct represents a single materialized training example.
///
/// It pairs an input [`Tensor`] with the expected output vector. Samples are
/// created on demand by the batch materializer and dropped once the batch
/// that needed them has been consumed.
///
/// # Examples:
/// - A vector sample: input `(1, 1, 2)` = `[0.0, 1.0]`, output `[1.0]`
/// - An MNIST sample: input `(1, 28, 28)`, output one-hot of length 10
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub input: Tensor,
    pub output: Vec<f32>,
}

impl Sample {
    pub fn new(input: Tensor, output: Vec<f32>) -> Self {
        Self { input, output }
    }

    /// Convenience constructor for flat vector inputs.
    pub fn from_vectors(input: Vec<f32>, output: Vec<f32>) -> Self {
        Self {
            input: Tensor::from_vec(input),
            output,
        }
    }

    /// Index of the first maximum of the expected output (one-hot decoding).
    ///
    /// Returns `None` for an empty output vector.
    pub fn class_index(&self) -> Option<usize> {
        argmax(&self.output)
    }
}

/// Index of the first maximum value; ties resolve to the earliest position.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}
