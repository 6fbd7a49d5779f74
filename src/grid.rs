//! Owned n-dimensional grid of integer samples.
//!
//! A [`Grid`] is a flat `Vec<Sample>` plus its shape. Storage order puts the
//! first axis fastest: axis 0 has stride 1 and axis `i` has stride
//! `shape[0] * … * shape[i - 1]`. Every traversal in this crate (window
//! origins, samples inside a window, CSV output) uses the same order.

use crate::error::{AppResult, PyramidError};
use crate::index::{self, Odometer};

/// One sample value. Samples are non-negative integers.
pub type Sample = u32;

/// Dense, rank-agnostic array of samples.
///
/// The shape is fixed at construction; samples may be changed in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    shape: Vec<usize>,
    samples: Vec<Sample>,
}

/// Check that `shape` describes a non-empty grid and return its element count.
///
/// # Errors
/// `InvalidArgument` for rank 0, an extent of 0, or an element count that
/// overflows `usize`.
pub fn validate_shape(shape: &[usize]) -> AppResult<usize> {
    if shape.is_empty() {
        return Err(PyramidError::invalid_argument("grid rank must be at least 1"));
    }
    if let Some(axis) = shape.iter().position(|&extent| extent == 0) {
        return Err(PyramidError::invalid_argument(format!(
            "axis {axis} of shape {shape:?} has extent 0"
        )));
    }
    shape
        .iter()
        .try_fold(1usize, |acc, &extent| acc.checked_mul(extent))
        .ok_or_else(|| {
            PyramidError::invalid_argument(format!("shape {shape:?} has too many elements"))
        })
}

/// Per-axis extents after dividing each axis by `dim_size`.
///
/// Axes keep their position even when they reach extent 1; see
/// [`collapse_shape`] for the grid shape actually allocated.
pub fn reduced_extents(shape: &[usize], dim_size: usize) -> Vec<usize> {
    shape.iter().map(|&extent| extent / dim_size.max(1)).collect()
}

/// Shape of a reduced grid: extents of 1 are kept, unless every axis is 1,
/// in which case the grid becomes the single-element shape `[1]`.
pub fn collapse_shape(extents: &[usize]) -> Vec<usize> {
    if extents.iter().all(|&extent| extent == 1) {
        vec![1]
    } else {
        extents.to_vec()
    }
}

/// Highest downsampling level a shape supports: the smallest
/// `floor(log2(extent))` over all axes.
pub fn max_level(shape: &[usize]) -> u32 {
    shape
        .iter()
        .map(|&extent| extent.max(1).ilog2())
        .min()
        .unwrap_or(0)
}

impl Grid {
    /// Zero-filled grid of the given shape.
    pub fn new(shape: Vec<usize>) -> AppResult<Self> {
        let len = validate_shape(&shape)?;
        Ok(Self {
            shape,
            samples: vec![0; len],
        })
    }

    /// Grid over existing samples, stored axis 0 fastest.
    ///
    /// # Errors
    /// `InvalidArgument` if the shape is malformed or `samples` does not hold
    /// exactly one value per position.
    pub fn from_samples(shape: Vec<usize>, samples: Vec<Sample>) -> AppResult<Self> {
        let len = validate_shape(&shape)?;
        if samples.len() != len {
            return Err(PyramidError::invalid_argument(format!(
                "shape {shape:?} needs {len} samples, got {}",
                samples.len()
            )));
        }
        Ok(Self { shape, samples })
    }

    /// Grid whose sample at each coordinate tuple is `f(coordinates)`.
    pub fn from_fn<F>(shape: Vec<usize>, mut f: F) -> AppResult<Self>
    where
        F: FnMut(&[usize]) -> Sample,
    {
        let mut grid = Self::new(shape)?;
        let mut odometer = Odometer::new(&grid.shape, &grid.shape, 0, 1)?;
        while let Some((coordinates, index)) = odometer.current() {
            grid.samples[index] = f(coordinates);
            odometer.advance();
        }
        Ok(grid)
    }

    /// Number of axes.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Extent of every axis, axis 0 first.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false: a grid holds at least one sample.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in storage order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Mutable samples in storage order.
    pub fn samples_mut(&mut self) -> &mut [Sample] {
        &mut self.samples
    }

    /// Consume the grid, keeping its storage.
    #[must_use]
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    /// Sample at `coordinates`, or `None` when they fall outside the grid.
    #[must_use]
    pub fn get(&self, coordinates: &[usize]) -> Option<Sample> {
        self.offset_of(coordinates)
            .map(|offset| self.samples[offset])
    }

    /// Overwrite the sample at `coordinates`.
    pub fn set(&mut self, coordinates: &[usize], value: Sample) -> AppResult<()> {
        let offset = self.offset_of(coordinates).ok_or_else(|| {
            PyramidError::invalid_argument(format!(
                "coordinates {coordinates:?} are outside shape {:?}",
                self.shape
            ))
        })?;
        self.samples[offset] = value;
        Ok(())
    }

    /// Highest level [`Downsampler::downsample`](crate::Downsampler::downsample)
    /// accepts for this grid.
    #[must_use]
    pub fn max_level(&self) -> u32 {
        max_level(&self.shape)
    }

    /// Whether every extent is a power of two (required for a full pyramid).
    #[must_use]
    pub fn is_power_of_two(&self) -> bool {
        self.shape.iter().all(|extent| extent.is_power_of_two())
    }

    fn offset_of(&self, coordinates: &[usize]) -> Option<usize> {
        let inside = coordinates.len() == self.shape.len()
            && coordinates
                .iter()
                .zip(&self.shape)
                .all(|(coordinate, extent)| coordinate < extent);
        inside.then(|| index::flat_index(&self.shape, coordinates, 0))
    }
}
