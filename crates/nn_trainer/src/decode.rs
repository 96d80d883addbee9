//! src/decode.rs
//!
//! Turning a referenced file into the flat `f32` buffer of a sample.
//!
//! The [`Decoder`] trait is the seam between the data loader and the file
//! formats it understands. [`ImageDecoder`] covers the common case: any
//! format the `image` crate reads (PNG, JPEG, BMP, GIF, TGA) converted to a
//! fixed `(channels, height, width)` in `[0, 1]`.

use crate::sample::Shape;
use anyhow::{bail, ensure, Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::path::{Path, PathBuf};

/// Decodes the file at `path` into exactly `shape.numel()` values laid out
/// channel-major (`data[c * H * W + h * W + w]`).
///
/// Implementations are called concurrently from the materialization pool and
/// must be thread-safe.
pub trait Decoder: Send + Sync {
    fn decode(&self, path: &Path, shape: Shape) -> Result<Vec<f32>>;
}

/// Image decoder backed by the `image` crate.
///
/// Channel Handling
/// | `shape.channels` | Conversion |
/// |------------------|------------|
/// | 1                | grayscale  |
/// | 3                | RGB        |
/// | 4                | RGBA       |
///
/// Images whose dimensions differ from `shape` are resized with a linear
/// (triangle) filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl ImageDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Converts an already decoded image; see [`Decoder::decode`].
    pub fn convert(&self, img: DynamicImage, shape: Shape) -> Result<Vec<f32>> {
        ensure!(
            img.width() > 0 && img.height() > 0,
            "Image dimensions must be positive (got {}x{})",
            img.width(),
            img.height()
        );
        ensure!(
            shape.height > 0 && shape.width > 0,
            "Target shape must have positive height and width (got {:?})",
            shape
        );

        let (target_w, target_h) = (shape.width as u32, shape.height as u32);
        let img = if img.width() != target_w || img.height() != target_h {
            img.resize_exact(target_w, target_h, FilterType::Triangle)
        } else {
            img
        };

        let raw = match shape.channels {
            1 => img.to_luma8().into_raw(),
            3 => img.to_rgb8().into_raw(),
            4 => img.to_rgba8().into_raw(),
            other => bail!("Unsupported channel count {} (expected 1, 3 or 4)", other),
        };

        Ok(interleaved_to_planar(&raw, shape))
    }
}

impl Decoder for ImageDecoder {
    fn decode(&self, path: &Path, shape: Shape) -> Result<Vec<f32>> {
        let img = ImageReader::open(path)
            .with_context(|| format!("Failed to open image: {}", path.display()))?
            .with_guessed_format()
            .with_context(|| format!("Failed to read image: {}", path.display()))?
            .decode()
            .with_context(|| format!("Failed to decode image: {}", path.display()))?;

        self.convert(img, shape)
            .with_context(|| format!("Failed to convert image: {}", path.display()))
    }
}

/// HWC bytes → CHW floats in `[0, 1]`.
fn interleaved_to_planar(raw: &[u8], shape: Shape) -> Vec<f32> {
    let channels = shape.channels;
    let plane = shape.height * shape.width;
    let mut data = vec![0.0_f32; channels * plane];

    for (pixel, values) in raw.chunks_exact(channels).enumerate() {
        for (c, &value) in values.iter().enumerate() {
            data[c * plane + pixel] = value as f32 / 255.0;
        }
    }
    data
}

/// Resolves a manifest path: absolute paths are returned unchanged, relative
/// ones are joined to `base_dir`.
pub fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() || base_dir.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn test_rgb_to_planar() -> Result<()> {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 51]));
        img.put_pixel(1, 0, Rgb([0, 255, 102]));

        let data = ImageDecoder.convert(DynamicImage::ImageRgb8(img), Shape::new(3, 1, 2))?;
        let expected = [1.0, 0.0, 0.0, 1.0, 0.2, 0.4];
        for (got, want) in data.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{} != {}", got, want);
        }
        Ok(())
    }

    #[test]
    fn test_resize_and_grayscale() -> Result<()> {
        let img = GrayImage::from_pixel(8, 8, Luma([255]));
        let data = ImageDecoder.convert(DynamicImage::ImageLuma8(img), Shape::new(1, 4, 4))?;
        assert_eq!(data.len(), 16);
        assert!(data.iter().all(|v| (v - 1.0).abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn test_unsupported_channels() {
        let img = GrayImage::new(2, 2);
        assert!(ImageDecoder
            .convert(DynamicImage::ImageLuma8(img), Shape::new(2, 2, 2))
            .is_err());
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/data/set");
        assert_eq!(
            resolve_path(Path::new("img/a.png"), base),
            PathBuf::from("/data/set/img/a.png")
        );
        assert_eq!(
            resolve_path(Path::new("/abs/a.png"), base),
            PathBuf::from("/abs/a.png")
        );
        assert_eq!(
            resolve_path(Path::new("a.png"), Path::new("")),
            PathBuf::from("a.png")
        );
    }
}
