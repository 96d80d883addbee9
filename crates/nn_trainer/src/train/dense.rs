//! Fully connected feed-forward network as a [`GradientKernel`].
//!
//! Parameter layout: `[w_0, b_0, w_1, b_1, ...]` where `w_l` is row-major
//! `(out_l, in_l)` and `b_l` has `out_l` entries. The loss is the mean
//! squared error over the output units.

use crate::sample::{Sample, Tensor};
use crate::train::activation::Activation;
use crate::train::kernel::{GradientKernel, Gradients, Parameters};
use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// One dense layer: `neurons` outputs followed by `activation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub neurons: usize,
    pub activation: Activation,
}

impl LayerSpec {
    pub fn new(neurons: usize, activation: Activation) -> Self {
        Self {
            neurons,
            activation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DenseKernel {
    input_dim: usize,
    layers: Vec<LayerSpec>,
}

impl DenseKernel {
    pub fn new(input_dim: usize, layers: Vec<LayerSpec>) -> Result<Self> {
        ensure!(input_dim > 0, "Input dimension must be > 0");
        ensure!(!layers.is_empty(), "A network needs at least one layer");
        for (idx, layer) in layers.iter().enumerate() {
            ensure!(layer.neurons > 0, "Layer {} has 0 neurons", idx);
        }
        Ok(Self { input_dim, layers })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.neurons)
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    /// Xavier-uniform weights drawn from a generator seeded with `seed`;
    /// biases start at zero.
    pub fn init_parameters(&self, seed: u64) -> Parameters {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tensors = Vec::with_capacity(self.layers.len() * 2);

        for (fan_in, layer) in self.fan_ins().zip(&self.layers) {
            let limit = (6.0 / (fan_in + layer.neurons) as f32).sqrt();
            let weights = (0..fan_in * layer.neurons)
                .map(|_| rng.random_range(-limit..=limit))
                .collect();
            tensors.push(weights);
            tensors.push(vec![0.0; layer.neurons]);
        }
        Parameters::new(tensors)
    }

    fn fan_ins(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.input_dim).chain(self.layers.iter().map(|l| l.neurons))
    }

    /// Activations of every layer, starting with the input itself.
    fn forward(&self, input: &[f32], parameters: &Parameters) -> Result<Vec<Vec<f32>>> {
        ensure!(
            input.len() == self.input_dim,
            "Input has {} values but the network expects {}",
            input.len(),
            self.input_dim
        );
        parameters.check_shapes(&self.parameter_shapes())?;

        let tensors = parameters.tensors();
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_vec());

        for (l, layer) in self.layers.iter().enumerate() {
            let weights = &tensors[2 * l];
            let biases = &tensors[2 * l + 1];
            let x = &activations[l];
            let in_dim = x.len();

            let y: Vec<f32> = (0..layer.neurons)
                .map(|o| {
                    let row = &weights[o * in_dim..(o + 1) * in_dim];
                    let z = row
                        .iter()
                        .zip(x)
                        .fold(biases[o], |acc, (w, xi)| w.mul_add(*xi, acc));
                    layer.activation.forward(z)
                })
                .collect();
            activations.push(y);
        }
        Ok(activations)
    }
}

impl GradientKernel for DenseKernel {
    fn parameter_shapes(&self) -> Vec<usize> {
        self.fan_ins()
            .zip(&self.layers)
            .flat_map(|(fan_in, layer)| [fan_in * layer.neurons, layer.neurons])
            .collect()
    }

    fn compute_gradient(&self, sample: &Sample, parameters: &Parameters) -> Result<(f32, Gradients)> {
        ensure!(
            sample.output.len() == self.output_dim(),
            "Expected output has {} values but the network produces {}",
            sample.output.len(),
            self.output_dim()
        );
        let activations = self.forward(sample.input.data(), parameters)?;
        let tensors = parameters.tensors();

        let Some(prediction) = activations.last() else {
            return Ok((0.0, Gradients::zeros(&self.parameter_shapes())));
        };
        let n = prediction.len() as f32;
        let loss = prediction
            .iter()
            .zip(&sample.output)
            .map(|(p, t)| (p - t) * (p - t))
            .sum::<f32>()
            / n;

        // dL/dy of the output layer
        let mut d_out: Vec<f32> = prediction
            .iter()
            .zip(&sample.output)
            .map(|(p, t)| 2.0 * (p - t) / n)
            .collect();

        let mut gradients = Gradients::zeros(&self.parameter_shapes());
        for (l, layer) in self.layers.iter().enumerate().rev() {
            let x = &activations[l];
            let y = &activations[l + 1];
            let weights = &tensors[2 * l];
            let in_dim = x.len();

            let d_z: Vec<f32> = d_out
                .iter()
                .zip(y)
                .map(|(d, y)| d * layer.activation.grad_from_output(*y))
                .collect();

            if let Some(d_w) = gradients.tensor_mut(2 * l) {
                for (o, dz) in d_z.iter().enumerate() {
                    for (i, xi) in x.iter().enumerate() {
                        d_w[o * in_dim + i] = dz * xi;
                    }
                }
            }
            if let Some(d_b) = gradients.tensor_mut(2 * l + 1) {
                d_b.copy_from_slice(&d_z);
            }

            let mut d_in = vec![0.0_f32; in_dim];
            for (o, dz) in d_z.iter().enumerate() {
                let row = &weights[o * in_dim..(o + 1) * in_dim];
                for (d, w) in d_in.iter_mut().zip(row) {
                    *d = w.mul_add(*dz, *d);
                }
            }
            d_out = d_in;
        }

        Ok((loss, gradients))
    }

    fn predict(&self, input: &Tensor, parameters: &Parameters) -> Result<Vec<f32>> {
        let mut activations = self.forward(input.data(), parameters)?;
        Ok(activations.pop().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel() -> DenseKernel {
        DenseKernel::new(
            3,
            vec![
                LayerSpec::new(4, Activation::Tanh),
                LayerSpec::new(2, Activation::Sigmoid),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_parameter_layout() {
        let kernel = kernel();
        assert_eq!(kernel.parameter_shapes(), vec![12, 4, 8, 2]);
        assert_eq!(kernel.init_parameters(1).shapes(), vec![12, 4, 8, 2]);
        assert_eq!(kernel.init_parameters(1), kernel.init_parameters(1));
        assert_ne!(kernel.init_parameters(1), kernel.init_parameters(2));
    }

    #[test]
    fn test_invalid_networks() {
        assert!(DenseKernel::new(0, vec![LayerSpec::new(1, Activation::Identity)]).is_err());
        assert!(DenseKernel::new(2, vec![]).is_err());
        assert!(DenseKernel::new(2, vec![LayerSpec::new(0, Activation::Identity)]).is_err());
    }

    #[test]
    fn test_gradient_matches_finite_difference() -> Result<()> {
        let kernel = kernel();
        let params = kernel.init_parameters(7);
        let sample = Sample::from_vectors(vec![0.3, -0.5, 0.9], vec![1.0, 0.0]);
        let (_, grads) = kernel.compute_gradient(&sample, &params)?;

        let eps = 1e-2_f32;
        for t in 0..params.tensors().len() {
            for i in 0..params.tensors()[t].len() {
                let mut plus = params.clone();
                let mut minus = params.clone();
                if let Some(p) = plus.tensor_mut(t) {
                    p[i] += eps;
                }
                if let Some(m) = minus.tensor_mut(t) {
                    m[i] -= eps;
                }
                let (lp, _) = kernel.compute_gradient(&sample, &plus)?;
                let (lm, _) = kernel.compute_gradient(&sample, &minus)?;
                let numeric = (lp - lm) / (2.0 * eps);
                let analytic = grads.tensors()[t][i];
                assert!(
                    (numeric - analytic).abs() < 2e-3,
                    "tensor {} index {}: numeric {} analytic {}",
                    t,
                    i,
                    numeric,
                    analytic
                );
            }
        }
        Ok(())
    }

    #[test]
    fn test_shape_errors() {
        let kernel = kernel();
        let params = kernel.init_parameters(0);
        let wrong_input = Sample::from_vectors(vec![0.0; 2], vec![0.0; 2]);
        let wrong_output = Sample::from_vectors(vec![0.0; 3], vec![0.0; 3]);
        assert!(kernel.compute_gradient(&wrong_input, &params).is_err());
        assert!(kernel.compute_gradient(&wrong_output, &params).is_err());
        assert!(kernel
            .compute_gradient(
                &Sample::from_vectors(vec![0.0; 3], vec![0.0; 2]),
                &Parameters::zeros(&[1])
            )
            .is_err());
    }

    #[test]
    fn test_predict_identity_layer() -> Result<()> {
        let kernel = DenseKernel::new(2, vec![LayerSpec::new(1, Activation::Identity)])?;
        let params = Parameters::new(vec![vec![2.0, -1.0], vec![0.5]]);
        let out = kernel.predict(&Tensor::from_vec(vec![1.0, 3.0]), &params)?;
        assert_eq!(out, vec![-0.5]);
        Ok(())
    }
}
