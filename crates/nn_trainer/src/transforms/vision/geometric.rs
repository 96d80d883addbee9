use crate::sample::Tensor;
use crate::transforms::Transform;
use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::Rng;

// ============================================================================
// HorizontalFlip
// ============================================================================

/// Mirrors every channel of an NCHW tensor left-to-right.
///
/// Deterministic; wrap it in [`RandomApply`](crate::transforms::RandomApply)
/// for a random flip.
#[derive(Debug, Clone, Copy)]
pub struct HorizontalFlip;

impl Transform<Tensor, Tensor> for HorizontalFlip {
    fn apply(&self, mut tensor: Tensor, _rng: &mut StdRng) -> Result<Tensor> {
        let width = tensor.shape().width.max(1);
        for row in tensor.data_mut().chunks_exact_mut(width) {
            row.reverse();
        }
        Ok(tensor)
    }
}

// ============================================================================
// RandomRotation
// ============================================================================

/// Rotates the image about its centre by an angle drawn uniformly from
/// `[-max_degrees, max_degrees]`, using bilinear interpolation. Pixels that
/// map outside the source are filled with zero.
#[derive(Debug, Clone)]
pub struct RandomRotation {
    max_degrees: f32,
}

impl RandomRotation {
    pub fn new(max_degrees: f32) -> Result<Self> {
        ensure!(
            max_degrees.is_finite() && max_degrees >= 0.0,
            "Rotation range must be finite and >= 0 (got {})",
            max_degrees
        );
        Ok(Self { max_degrees })
    }
}

impl Transform<Tensor, Tensor> for RandomRotation {
    fn apply(&self, mut tensor: Tensor, rng: &mut StdRng) -> Result<Tensor> {
        let degrees = if self.max_degrees > 0.0 {
            rng.random_range(-self.max_degrees..=self.max_degrees)
        } else {
            0.0
        };
        let rotated = rotate(&tensor, degrees);
        tensor.replace_data(rotated);
        Ok(tensor)
    }
}

/// Rotates every channel by `degrees`; returns the new buffer.
pub(crate) fn rotate(tensor: &Tensor, degrees: f32) -> Vec<f32> {
    let shape = tensor.shape();
    let (h, w) = (shape.height, shape.width);
    let data = tensor.data();

    let angle = degrees.to_radians();
    let (sin_a, cos_a) = angle.sin_cos();
    let cx = w as f32 / 2.0;
    let cy = h as f32 / 2.0;

    let mut result = vec![0.0_f32; data.len()];
    let plane = h * w;

    for ch in 0..shape.channels {
        let src = &data[ch * plane..(ch + 1) * plane];
        let dst = &mut result[ch * plane..(ch + 1) * plane];

        let sample = |sx: i64, sy: i64| -> f32 {
            if sx < 0 || sy < 0 || sx >= w as i64 || sy >= h as i64 {
                0.0
            } else {
                src[sy as usize * w + sx as usize]
            }
        };

        for y in 0..h {
            for x in 0..w {
                // Map the destination pixel back into the source.
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let src_x = cos_a * dx + sin_a * dy + cx;
                let src_y = -sin_a * dx + cos_a * dy + cy;

                let x0 = src_x.floor() as i64;
                let y0 = src_y.floor() as i64;
                let fx = src_x - x0 as f32;
                let fy = src_y - y0 as f32;

                dst[y * w + x] = (1.0 - fx) * (1.0 - fy) * sample(x0, y0)
                    + fx * (1.0 - fy) * sample(x0 + 1, y0)
                    + (1.0 - fx) * fy * sample(x0, y0 + 1)
                    + fx * fy * sample(x0 + 1, y0 + 1);
            }
        }
    }

    result
}

// ============================================================================
// RandomTranslation
// ============================================================================

/// Shifts the image by a whole number of pixels drawn uniformly from
/// `[-max_fraction * W, max_fraction * W]` horizontally (and likewise for
/// `H`). Uncovered pixels become zero.
#[derive(Debug, Clone)]
pub struct RandomTranslation {
    max_fraction: f32,
}

impl RandomTranslation {
    pub fn new(max_fraction: f32) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&max_fraction),
            "Translation fraction must be in [0.0, 1.0] (got {})",
            max_fraction
        );
        Ok(Self { max_fraction })
    }
}

impl Transform<Tensor, Tensor> for RandomTranslation {
    fn apply(&self, mut tensor: Tensor, rng: &mut StdRng) -> Result<Tensor> {
        let shape = tensor.shape();
        let max_dx = (self.max_fraction * shape.width as f32) as i64;
        let max_dy = (self.max_fraction * shape.height as f32) as i64;
        if max_dx == 0 && max_dy == 0 {
            return Ok(tensor);
        }

        let dx = rng.random_range(-max_dx..=max_dx);
        let dy = rng.random_range(-max_dy..=max_dy);
        let shifted = translate(&tensor, dx, dy);
        tensor.replace_data(shifted);
        Ok(tensor)
    }
}

/// Shifts every channel by `(dx, dy)` pixels; returns the new buffer.
pub(crate) fn translate(tensor: &Tensor, dx: i64, dy: i64) -> Vec<f32> {
    let shape = tensor.shape();
    let (h, w) = (shape.height as i64, shape.width as i64);
    let data = tensor.data();
    let plane = (h * w) as usize;

    let mut result = vec![0.0_f32; data.len()];
    for ch in 0..shape.channels {
        let offset = ch * plane;
        for y in 0..h {
            let src_y = y - dy;
            if src_y < 0 || src_y >= h {
                continue;
            }
            for x in 0..w {
                let src_x = x - dx;
                if src_x < 0 || src_x >= w {
                    continue;
                }
                result[offset + (y * w + x) as usize] = data[offset + (src_y * w + src_x) as usize];
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Shape;
    use rand::SeedableRng;

    fn ramp(channels: usize, h: usize, w: usize) -> Tensor {
        let data = (0..channels * h * w).map(|v| v as f32).collect();
        Tensor::new(Shape::new(channels, h, w), data).unwrap()
    }

    #[test]
    fn test_horizontal_flip() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(0);
        // 2 channels of a 2x3 image
        let flipped = HorizontalFlip.apply(ramp(2, 2, 3), &mut rng)?;
        assert_eq!(
            flipped.data(),
            &[2.0, 1.0, 0.0, 5.0, 4.0, 3.0, 8.0, 7.0, 6.0, 11.0, 10.0, 9.0]
        );
        Ok(())
    }

    #[test]
    fn test_rotation_by_zero_is_identity() {
        let tensor = ramp(1, 4, 4);
        let rotated = rotate(&tensor, 0.0);
        assert_eq!(rotated, tensor.data());
    }

    #[test]
    fn test_rotation_preserves_shape() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(3);
        let tensor = ramp(3, 5, 7);
        let rotated = RandomRotation::new(15.0)?.apply(tensor.clone(), &mut rng)?;
        assert_eq!(rotated.shape(), tensor.shape());
        assert!(RandomRotation::new(-1.0).is_err());
        Ok(())
    }

    #[test]
    fn test_translate_shifts_and_zero_fills() {
        let tensor = ramp(1, 2, 3);
        // shift right by one pixel
        assert_eq!(translate(&tensor, 1, 0), vec![0.0, 0.0, 1.0, 0.0, 3.0, 4.0]);
        // shift down by one row
        assert_eq!(translate(&tensor, 0, 1), vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_translation_too_small_is_noop() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(1);
        let tensor = ramp(1, 4, 4);
        let out = RandomTranslation::new(0.1)?.apply(tensor.clone(), &mut rng)?;
        assert_eq!(out, tensor);
        Ok(())
    }
}
