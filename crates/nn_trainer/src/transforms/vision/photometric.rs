use crate::sample::Tensor;
use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

// ============================================================================
// RandomBrightness
// ============================================================================

/// Adds one offset drawn from `[-max_delta, max_delta]` to every value, then
/// clamps to `[0, 1]`.
///
/// # Example
/// ```ignore
/// let brightness = RandomBrightness::new(0.1)?;
/// let brighter = brightness.apply(tensor, &mut rng)?;
/// ```
#[derive(Debug, Clone)]
pub struct RandomBrightness {
    max_delta: f32,
}

impl RandomBrightness {
    pub fn new(max_delta: f32) -> Result<Self> {
        ensure!(
            max_delta.is_finite() && max_delta >= 0.0,
            "Brightness delta must be finite and >= 0 (got {})",
            max_delta
        );
        Ok(Self { max_delta })
    }
}

impl Transform<Tensor, Tensor> for RandomBrightness {
    fn apply(&self, mut tensor: Tensor, rng: &mut StdRng) -> Result<Tensor> {
        let delta = if self.max_delta > 0.0 {
            rng.random_range(-self.max_delta..=self.max_delta)
        } else {
            0.0
        };
        for v in tensor.data_mut() {
            *v = (*v + delta).clamp(0.0, 1.0);
        }
        Ok(tensor)
    }
}

// ============================================================================
// RandomContrast
// ============================================================================

/// Scales each channel about its own mean by a factor drawn from
/// `[min_factor, max_factor]`.
///
/// # Mathematical Operation:
/// ```text
/// output[c,h,w] = clamp(mean[c] + factor * (input[c,h,w] - mean[c]), 0, 1)
/// ```
#[derive(Debug, Clone)]
pub struct RandomContrast {
    min_factor: f32,
    max_factor: f32,
}

impl RandomContrast {
    pub fn new(min_factor: f32, max_factor: f32) -> Result<Self> {
        ensure!(
            min_factor >= 0.0 && min_factor <= max_factor && max_factor.is_finite(),
            "Contrast range must satisfy 0 <= min <= max (got [{}, {}])",
            min_factor,
            max_factor
        );
        Ok(Self {
            min_factor,
            max_factor,
        })
    }
}

impl Transform<Tensor, Tensor> for RandomContrast {
    fn apply(&self, mut tensor: Tensor, rng: &mut StdRng) -> Result<Tensor> {
        let factor = rng.random_range(self.min_factor..=self.max_factor);
        let shape = tensor.shape();
        let plane = shape.height * shape.width;
        if plane == 0 {
            return Ok(tensor);
        }

        for channel in tensor.data_mut().chunks_exact_mut(plane) {
            let mean = channel.iter().sum::<f32>() / plane as f32;
            for v in channel.iter_mut() {
                *v = (mean + factor * (*v - mean)).clamp(0.0, 1.0);
            }
        }
        Ok(tensor)
    }
}

// ============================================================================
// GaussianNoise
// ============================================================================

/// Adds independent `N(0, std_dev²)` noise to every value, clamped to `[0, 1]`.
///
/// Works on any shape, so it is also the only augmentation applied to flat
/// vector inputs.
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    normal: Normal<f32>,
}

impl GaussianNoise {
    pub fn new(std_dev: f32) -> Result<Self> {
        let normal = Normal::new(0.0, std_dev)
            .with_context(|| format!("Invalid noise standard deviation {}", std_dev))?;
        Ok(Self { normal })
    }

    pub fn std_dev(&self) -> f32 {
        self.normal.std_dev()
    }
}

impl Transform<Tensor, Tensor> for GaussianNoise {
    fn apply(&self, mut tensor: Tensor, rng: &mut StdRng) -> Result<Tensor> {
        for v in tensor.data_mut() {
            *v = (*v + self.normal.sample(rng)).clamp(0.0, 1.0);
        }
        Ok(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Shape;
    use rand::SeedableRng;

    fn tensor(channels: usize, h: usize, w: usize, data: Vec<f32>) -> Tensor {
        Tensor::new(Shape::new(channels, h, w), data).unwrap()
    }

    fn in_unit_range(t: &Tensor) -> bool {
        t.data().iter().all(|v| (0.0..=1.0).contains(v))
    }

    #[test]
    fn test_brightness_shifts_uniformly_and_clamps() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(11);
        let input = tensor(1, 2, 2, vec![0.5, 0.5, 0.0, 1.0]);
        let out = RandomBrightness::new(0.1)?.apply(input, &mut rng)?;

        let delta = out.data()[0] - 0.5;
        assert!(delta.abs() <= 0.1 + 1e-6);
        assert!((out.data()[1] - 0.5 - delta).abs() < 1e-6);
        assert!(in_unit_range(&out));
        Ok(())
    }

    #[test]
    fn test_contrast_preserves_channel_mean_of_flat_image() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(5);
        // a constant channel stays constant whatever the factor
        let input = tensor(2, 2, 2, vec![0.3; 8]);
        let out = RandomContrast::new(0.8, 1.2)?.apply(input, &mut rng)?;
        for v in out.data() {
            assert!((v - 0.3).abs() < 1e-6);
        }
        assert!(RandomContrast::new(1.2, 0.8).is_err());
        Ok(())
    }

    #[test]
    fn test_contrast_stays_in_range() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(9);
        let input = tensor(1, 2, 2, vec![0.0, 1.0, 0.0, 1.0]);
        let out = RandomContrast::new(0.8, 1.2)?.apply(input, &mut rng)?;
        assert!(in_unit_range(&out));
        Ok(())
    }

    #[test]
    fn test_gaussian_noise_range() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(1);
        let input = Tensor::from_vec(vec![0.0, 0.5, 1.0, 0.99]);
        let noise = GaussianNoise::new(0.02)?;
        assert!((noise.std_dev() - 0.02).abs() < 1e-7);

        let out = noise.apply(input.clone(), &mut rng)?;
        assert_eq!(out.shape(), input.shape());
        assert!(in_unit_range(&out));
        assert!((out.data()[1] - 0.5).abs() < 0.2);
        assert!(GaussianNoise::new(-1.0).is_err());
        Ok(())
    }
}
