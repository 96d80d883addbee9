use crate::sample::{Shape, Tensor};
use crate::transforms::core::RandomApply;
use crate::transforms::vision::{
    GaussianNoise, HorizontalFlip, RandomBrightness, RandomContrast, RandomRotation,
    RandomTranslation,
};
use crate::transforms::Transform;
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

pub const FLIP_PROBABILITY: f64 = 0.5;
pub const ROTATION_PROBABILITY: f64 = 0.5;
pub const ROTATION_DEGREES: f32 = 15.0;
pub const TRANSLATION_PROBABILITY: f64 = 0.5;
pub const TRANSLATION_FRACTION: f32 = 0.1;
pub const BRIGHTNESS_PROBABILITY: f64 = 0.5;
pub const BRIGHTNESS_DELTA: f32 = 0.1;
pub const CONTRAST_PROBABILITY: f64 = 0.5;
pub const CONTRAST_RANGE: (f32, f32) = (0.8, 1.2);
pub const NOISE_PROBABILITY: f64 = 0.3;
pub const NOISE_STD_DEV: f32 = 0.02;

/// Which augmentation ops are enabled. Each flag is independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationTransforms {
    pub horizontal_flip: bool,
    pub rotation: bool,
    pub translation: bool,
    pub brightness: bool,
    pub contrast: bool,
    pub gaussian_noise: bool,
}

impl Default for AugmentationTransforms {
    fn default() -> Self {
        Self::all()
    }
}

impl AugmentationTransforms {
    pub fn all() -> Self {
        Self {
            horizontal_flip: true,
            rotation: true,
            translation: true,
            brightness: true,
            contrast: true,
            gaussian_noise: true,
        }
    }

    pub fn none() -> Self {
        Self {
            horizontal_flip: false,
            rotation: false,
            translation: false,
            brightness: false,
            contrast: false,
            gaussian_noise: false,
        }
    }
}

type BoxedTransform = Box<dyn Transform<Tensor, Tensor>>;

struct Step {
    name: &'static str,
    image_only: bool,
    transform: BoxedTransform,
}

/// The randomized transform applied to augmented entries.
///
/// Image tensors run `flip → rotation → translation → brightness → contrast
/// → noise`, each gated by its own coin. Tensors without an image shape
/// (flat vectors) only get noise.
pub struct AugmentationPipeline {
    steps: Vec<Step>,
}

impl std::fmt::Debug for AugmentationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AugmentationPipeline")
            .field(
                "steps",
                &self.steps.iter().map(|step| step.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl AugmentationPipeline {
    pub fn new(transforms: AugmentationTransforms) -> Result<Self> {
        let mut steps = Vec::new();
        let mut push = |name, image_only, transform: BoxedTransform| {
            steps.push(Step {
                name,
                image_only,
                transform,
            })
        };

        if transforms.horizontal_flip {
            push(
                "horizontal_flip",
                true,
                Box::new(RandomApply::new(FLIP_PROBABILITY, HorizontalFlip)?),
            );
        }
        if transforms.rotation {
            push(
                "rotation",
                true,
                Box::new(RandomApply::new(
                    ROTATION_PROBABILITY,
                    RandomRotation::new(ROTATION_DEGREES)?,
                )?),
            );
        }
        if transforms.translation {
            push(
                "translation",
                true,
                Box::new(RandomApply::new(
                    TRANSLATION_PROBABILITY,
                    RandomTranslation::new(TRANSLATION_FRACTION)?,
                )?),
            );
        }
        if transforms.brightness {
            push(
                "brightness",
                true,
                Box::new(RandomApply::new(
                    BRIGHTNESS_PROBABILITY,
                    RandomBrightness::new(BRIGHTNESS_DELTA)?,
                )?),
            );
        }
        if transforms.contrast {
            let (min, max) = CONTRAST_RANGE;
            push(
                "contrast",
                true,
                Box::new(RandomApply::new(
                    CONTRAST_PROBABILITY,
                    RandomContrast::new(min, max)?,
                )?),
            );
        }
        if transforms.gaussian_noise {
            push(
                "gaussian_noise",
                false,
                Box::new(RandomApply::new(
                    NOISE_PROBABILITY,
                    GaussianNoise::new(NOISE_STD_DEV)?,
                )?),
            );
        }

        Ok(Self { steps })
    }

    /// Names of the steps a tensor of `shape` goes through, in order.
    pub fn step_names(&self, shape: Shape) -> Vec<&'static str> {
        let is_image = shape.is_image();
        self.steps
            .iter()
            .filter(|step| is_image || !step.image_only)
            .map(|step| step.name)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Transform<Tensor, Tensor> for AugmentationPipeline {
    fn apply(&self, tensor: Tensor, rng: &mut StdRng) -> Result<Tensor> {
        let is_image = tensor.shape().is_image();
        self.steps
            .iter()
            .filter(|step| is_image || !step.image_only)
            .try_fold(tensor, |t, step| {
                step.transform
                    .apply(t, rng)
                    .with_context(|| format!("Augmentation step '{}' failed", step.name))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_image_pipeline_order() -> Result<()> {
        let pipeline = AugmentationPipeline::new(AugmentationTransforms::all())?;
        assert_eq!(
            pipeline.step_names(Shape::new(1, 8, 8)),
            vec![
                "horizontal_flip",
                "rotation",
                "translation",
                "brightness",
                "contrast",
                "gaussian_noise"
            ]
        );
        Ok(())
    }

    #[test]
    fn test_vector_pipeline_only_noise() -> Result<()> {
        let pipeline = AugmentationPipeline::new(AugmentationTransforms::all())?;
        assert_eq!(pipeline.step_names(Shape::vector(4)), vec!["gaussian_noise"]);

        let without_noise = AugmentationTransforms {
            gaussian_noise: false,
            ..AugmentationTransforms::all()
        };
        let pipeline = AugmentationPipeline::new(without_noise)?;
        assert!(pipeline.step_names(Shape::vector(4)).is_empty());

        // nothing to do, so the vector comes back untouched
        let input = Tensor::from_vec(vec![0.25, 0.75]);
        let out = pipeline.apply(input.clone(), &mut StdRng::seed_from_u64(0))?;
        assert_eq!(out, input);
        assert!(AugmentationPipeline::new(AugmentationTransforms::none())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_pipeline_preserves_shape_and_range() -> Result<()> {
        let shape = Shape::new(3, 6, 5);
        let pipeline = AugmentationPipeline::new(AugmentationTransforms::all())?;
        let data: Vec<f32> = (0..shape.numel())
            .map(|i| (i % 11) as f32 / 10.0)
            .collect();

        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = pipeline.apply(Tensor::new(shape, data.clone())?, &mut rng)?;
            assert_eq!(out.shape(), shape);
            assert!(out.data().iter().all(|v| (0.0..=1.0).contains(v)));
        }
        Ok(())
    }

    #[test]
    fn test_pipeline_is_deterministic_given_rng() -> Result<()> {
        let shape = Shape::new(1, 4, 4);
        let pipeline = AugmentationPipeline::new(AugmentationTransforms::all())?;
        let data: Vec<f32> = (0..16).map(|i| i as f32 / 16.0).collect();

        let a = pipeline.apply(Tensor::new(shape, data.clone())?, &mut StdRng::seed_from_u64(3))?;
        let b = pipeline.apply(Tensor::new(shape, data)?, &mut StdRng::seed_from_u64(3))?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_transforms_config_defaults() -> Result<()> {
        let parsed: AugmentationTransforms =
            serde_json::from_str(r#"{"rotation": false, "gaussian_noise": false}"#)?;
        assert!(parsed.horizontal_flip);
        assert!(!parsed.rotation);
        assert!(!parsed.gaussian_noise);
        Ok(())
    }
}
