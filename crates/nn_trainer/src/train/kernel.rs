//! src/train/kernel.rs
//!
//! The seam between the training loop and the numeric model.
//!
//! A [`GradientKernel`] knows how to run one sample forward and backward; the
//! accumulator only needs it to be shareable across worker threads. Model
//! state lives in [`Parameters`] and per-sample derivatives in [`Gradients`],
//! both ordered lists of flat `f32` tensors with fixed lengths.

use crate::sample::{Sample, Tensor};
use anyhow::{ensure, Result};

/// Forward/backward computation for a model.
///
/// `compute_gradient` must be a pure function of `sample` and `parameters`
/// so that it can run on many threads at once.
pub trait GradientKernel: Send + Sync {
    /// Length of every flat parameter tensor, in order.
    fn parameter_shapes(&self) -> Vec<usize>;

    /// Loss for `sample` and the gradient of that loss with respect to every
    /// parameter tensor.
    fn compute_gradient(&self, sample: &Sample, parameters: &Parameters) -> Result<(f32, Gradients)>;

    /// Model output for `input`.
    fn predict(&self, input: &Tensor, parameters: &Parameters) -> Result<Vec<f32>>;
}

/// Model parameters: an ordered list of flat tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    tensors: Vec<Vec<f32>>,
}

impl Parameters {
    pub fn new(tensors: Vec<Vec<f32>>) -> Self {
        Self { tensors }
    }

    /// All-zero parameters with the given tensor lengths.
    pub fn zeros(shapes: &[usize]) -> Self {
        Self {
            tensors: shapes.iter().map(|&len| vec![0.0; len]).collect(),
        }
    }

    pub fn tensors(&self) -> &[Vec<f32>] {
        &self.tensors
    }

    pub fn tensor(&self, index: usize) -> Option<&[f32]> {
        self.tensors.get(index).map(Vec::as_slice)
    }

    pub fn tensor_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        self.tensors.get_mut(index).map(Vec::as_mut_slice)
    }

    pub fn shapes(&self) -> Vec<usize> {
        self.tensors.iter().map(Vec::len).collect()
    }

    /// Checks that the tensor lengths match `shapes`.
    pub fn check_shapes(&self, shapes: &[usize]) -> Result<()> {
        let own = self.shapes();
        ensure!(
            own == shapes,
            "Parameter shapes {:?} do not match the expected {:?}",
            own,
            shapes
        );
        Ok(())
    }

    /// `self -= scale * gradients`
    pub fn apply_gradients(&mut self, gradients: &Gradients, scale: f32) -> Result<()> {
        gradients.check_shapes(&self.shapes())?;
        for (param, grad) in self.tensors.iter_mut().zip(&gradients.tensors) {
            for (p, g) in param.iter_mut().zip(grad) {
                *p -= scale * g;
            }
        }
        Ok(())
    }
}

/// Gradients with the same layout as [`Parameters`].
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    tensors: Vec<Vec<f32>>,
}

impl Gradients {
    pub fn new(tensors: Vec<Vec<f32>>) -> Self {
        Self { tensors }
    }

    pub fn zeros(shapes: &[usize]) -> Self {
        Self {
            tensors: shapes.iter().map(|&len| vec![0.0; len]).collect(),
        }
    }

    pub fn zeros_like(parameters: &Parameters) -> Self {
        Self::zeros(&parameters.shapes())
    }

    pub fn tensors(&self) -> &[Vec<f32>] {
        &self.tensors
    }

    pub fn tensor_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        self.tensors.get_mut(index).map(Vec::as_mut_slice)
    }

    pub fn shapes(&self) -> Vec<usize> {
        self.tensors.iter().map(Vec::len).collect()
    }

    fn check_shapes(&self, shapes: &[usize]) -> Result<()> {
        let own = self.shapes();
        ensure!(
            own == shapes,
            "Gradient shapes {:?} do not match parameter shapes {:?}",
            own,
            shapes
        );
        Ok(())
    }

    /// Element-wise `self += other`.
    pub fn add_assign(&mut self, other: &Gradients) -> Result<()> {
        other.check_shapes(&self.shapes())?;
        for (acc, grad) in self.tensors.iter_mut().zip(&other.tensors) {
            for (a, g) in acc.iter_mut().zip(grad) {
                *a += g;
            }
        }
        Ok(())
    }

    /// Largest element-wise `|a - b| / max(|a|, |b|, 1)`.
    pub fn max_relative_difference(&self, other: &Gradients) -> Result<f32> {
        other.check_shapes(&self.shapes())?;
        let mut max = 0.0_f32;
        for (a_tensor, b_tensor) in self.tensors.iter().zip(&other.tensors) {
            for (a, b) in a_tensor.iter().zip(b_tensor) {
                let scale = a.abs().max(b.abs()).max(1.0);
                max = max.max((a - b).abs() / scale);
            }
        }
        Ok(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assign_and_apply() -> Result<()> {
        let mut params = Parameters::new(vec![vec![1.0, 2.0], vec![3.0]]);
        let mut grads = Gradients::zeros_like(&params);
        grads.add_assign(&Gradients::new(vec![vec![1.0, 1.0], vec![2.0]]))?;
        grads.add_assign(&Gradients::new(vec![vec![1.0, 3.0], vec![0.0]]))?;
        assert_eq!(grads.tensors(), &[vec![2.0, 4.0], vec![2.0]]);

        params.apply_gradients(&grads, 0.5)?;
        assert_eq!(params.tensors(), &[vec![0.0, 0.0], vec![2.0]]);
        Ok(())
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let mut grads = Gradients::zeros(&[2, 1]);
        assert!(grads.add_assign(&Gradients::zeros(&[2])).is_err());
        assert!(grads.add_assign(&Gradients::zeros(&[2, 2])).is_err());

        let mut params = Parameters::zeros(&[3]);
        assert!(params.apply_gradients(&grads, 1.0).is_err());
        assert!(params.check_shapes(&[3]).is_ok());
        assert!(params.check_shapes(&[2, 1]).is_err());
    }

    #[test]
    fn test_max_relative_difference() -> Result<()> {
        let a = Gradients::new(vec![vec![100.0, 0.0]]);
        let b = Gradients::new(vec![vec![101.0, 0.5]]);
        let diff = a.max_relative_difference(&b)?;
        assert!((diff - 0.5).abs() < 1e-6);
        Ok(())
    }
}
