//! Random source grids for the CLI and benchmarks.

use crate::config::SynthConfig;
use crate::error::{AppResult, PyramidError};
use crate::grid::{Grid, Sample};
use crate::index;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Largest exponent used for random power-of-two extents (`2^8 = 256`).
pub const MAX_RANDOM_EXPONENT: u32 = 8;

/// Seedable generator of random shapes and grids.
#[derive(Debug, Clone)]
pub struct Synth {
    rng: StdRng,
    max_value: Sample,
}

impl Synth {
    /// Generator drawing samples from `0..=max_value`, seeded from `seed` or
    /// from OS entropy.
    #[must_use]
    pub fn new(max_value: Sample, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self { rng, max_value }
    }

    /// Generator using the `[synth]` section's range and seed.
    #[must_use]
    pub fn from_config(config: &SynthConfig) -> Self {
        Self::new(config.max_value, config.seed)
    }

    /// Grid of `shape` filled with uniform random samples.
    pub fn grid(&mut self, shape: Vec<usize>) -> AppResult<Grid> {
        let max_value = self.max_value;
        let rng = &mut self.rng;
        Grid::from_fn(shape, |_| rng.gen_range(0..=max_value))
    }

    /// Shape of `rank` axes, each `2^k` with `k` drawn from
    /// `1..=MAX_RANDOM_EXPONENT`.
    pub fn power_of_two_shape(&mut self, rank: usize) -> AppResult<Vec<usize>> {
        if rank == 0 {
            return Err(PyramidError::invalid_argument("rank must be at least 1"));
        }
        Ok((0..rank)
            .map(|_| 1usize << self.rng.gen_range(1..=MAX_RANDOM_EXPONENT))
            .collect())
    }
}

/// Every shape of `rank` axes whose extents are `2^(k+1)` for `k` in
/// `0..max_exponent`, axis 0 varying fastest.
pub fn sweep_shapes(rank: usize, max_exponent: usize) -> AppResult<Vec<Vec<usize>>> {
    if max_exponent == 0 {
        return Err(PyramidError::invalid_argument(
            "max exponent must be at least 1",
        ));
    }
    if max_exponent >= usize::BITS as usize {
        return Err(PyramidError::invalid_argument(format!(
            "max exponent {max_exponent} overflows the extent type"
        )));
    }

    let exponents = vec![max_exponent; rank];
    let mut shapes = Vec::new();
    index::enumerate(&exponents, &exponents, 0, 1, |coordinates, _| {
        shapes.push(coordinates.iter().map(|&k| 1usize << (k + 1)).collect());
    })?;
    Ok(shapes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_grids_repeat() {
        let a = Synth::new(9, Some(7)).grid(vec![8, 4]).unwrap();
        let b = Synth::new(9, Some(7)).grid(vec![8, 4]).unwrap();
        assert_eq!(a, b);
        assert!(a.samples().iter().all(|&v| v <= 9));
    }

    #[test]
    fn test_power_of_two_shape() {
        let mut synth = Synth::new(1, Some(3));
        let shape = synth.power_of_two_shape(4).unwrap();
        assert_eq!(shape.len(), 4);
        assert!(shape
            .iter()
            .all(|e| e.is_power_of_two() && (2..=256).contains(e)));
        assert!(synth.power_of_two_shape(0).is_err());
    }

    #[test]
    fn test_sweep_shapes() {
        let shapes = sweep_shapes(2, 2).unwrap();
        assert_eq!(
            shapes,
            vec![vec![2, 2], vec![4, 2], vec![2, 4], vec![4, 4]]
        );
        assert_eq!(sweep_shapes(3, 3).unwrap().len(), 27);
        assert!(sweep_shapes(0, 2).is_err());
        assert!(sweep_shapes(2, 0).is_err());
    }
}
