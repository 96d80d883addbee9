use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::Rng;

/// Defines the core `Transform` trait for composable augmentation pipelines.
///
/// The `Transform<I, O>` trait represents an operation converting an input
/// of type `I` to an output of type `O`. Any randomness is drawn from the
/// generator passed in, so a transform is pure given its RNG: the data loader
/// hands every materialization a fresh generator, and tests can pass a seeded
/// one.
///
/// Pipelines compose steps as boxed `Transform<T, T>` trait objects (see
/// [`AugmentationPipeline`](crate::transforms::vision::AugmentationPipeline)).
pub trait Transform<I, O>: Send + Sync {
    /// Applies the transformation to the input
    fn apply(&self, input: I, rng: &mut StdRng) -> Result<O>;
}

/// Applies the wrapped transform with probability `p`, otherwise passes the
/// input through unchanged.
#[derive(Debug, Clone)]
pub struct RandomApply<T> {
    p: f64,
    inner: T,
}

impl<T> RandomApply<T> {
    pub fn new(p: f64, inner: T) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&p),
            "Probability must be in [0.0, 1.0] range (got {})",
            p
        );
        Ok(Self { p, inner })
    }

    pub fn probability(&self) -> f64 {
        self.p
    }
}

impl<I, T> Transform<I, I> for RandomApply<T>
where
    T: Transform<I, I>,
{
    fn apply(&self, input: I, rng: &mut StdRng) -> Result<I> {
        if rng.random_bool(self.p) {
            self.inner.apply(input, rng)
        } else {
            Ok(input)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use rand::SeedableRng;

    struct AddOne;
    impl Transform<i32, i32> for AddOne {
        fn apply(&self, input: i32, _rng: &mut StdRng) -> Result<i32> {
            Ok(input + 1)
        }
    }

    #[test]
    fn test_boxed_transforms_apply_in_sequence() -> Result<()> {
        struct Fail;
        impl Transform<i32, i32> for Fail {
            fn apply(&self, _: i32, _rng: &mut StdRng) -> Result<i32> {
                Err(anyhow!("Test error"))
            }
        }

        let mut rng = StdRng::seed_from_u64(0);
        let steps: Vec<Box<dyn Transform<i32, i32>>> =
            vec![Box::new(AddOne), Box::new(RandomApply::new(1.0, AddOne)?)];
        let out = steps.iter().try_fold(4, |x, step| step.apply(x, &mut rng))?;
        assert_eq!(out, 6);

        let failing: Box<dyn Transform<i32, i32>> = Box::new(RandomApply::new(1.0, Fail)?);
        assert!(failing.apply(0, &mut rng).is_err());
        Ok(())
    }

    #[test]
    fn test_random_apply_extremes() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(7);
        let always = RandomApply::new(1.0, AddOne)?;
        let never = RandomApply::new(0.0, AddOne)?;

        for _ in 0..20 {
            assert_eq!(always.apply(0, &mut rng)?, 1);
            assert_eq!(never.apply(0, &mut rng)?, 0);
        }
        assert!(RandomApply::new(1.5, AddOne).is_err());
        Ok(())
    }
}
