//! Rank-agnostic coordinate arithmetic.
//!
//! Window enumeration works for any number of axes through a single
//! mixed-radix counter, [`Odometer`]. Axis 0 is the fastest-moving digit. When
//! an axis passes its bound it resets to 0 and carries into the next axis;
//! the walk ends when the last axis overflows.
//!
//! Two configurations cover every traversal the engine needs:
//!
//! ```text
//! window origins:     window_shape = shape,        stride = dim_size, start = 0
//! samples in window:  window_shape = (dim_size,…), stride = 1,        start = origin
//! ```
//!
//! Coordinates reported by the odometer are relative to its start offset;
//! flat indices are absolute offsets into the grid's storage.

use crate::error::{AppResult, PyramidError};

/// Storage stride of each axis: `1, shape[0], shape[0] * shape[1], …`.
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut running = 1usize;
    shape
        .iter()
        .map(|&extent| {
            let stride = running;
            running = running.saturating_mul(extent);
            stride
        })
        .collect()
}

/// Flat storage offset of `coordinates`, counted from `start_offset`.
pub fn flat_index(shape: &[usize], coordinates: &[usize], start_offset: usize) -> usize {
    debug_assert_eq!(shape.len(), coordinates.len());
    start_offset
        + strides(shape)
            .iter()
            .zip(coordinates)
            .map(|(stride, coordinate)| stride * coordinate)
            .sum::<usize>()
}

/// Coordinate tuple of a flat storage offset.
pub fn coordinates(shape: &[usize], flat_index: usize) -> Vec<usize> {
    let mut rest = flat_index;
    shape
        .iter()
        .map(|&extent| {
            let coordinate = rest.checked_rem(extent).unwrap_or(0);
            rest = rest.checked_div(extent).unwrap_or(0);
            coordinate
        })
        .collect()
}

/// Mixed-radix counter over a sub-region of a grid.
///
/// Iterating yields flat indices. Use [`Odometer::current`] and
/// [`Odometer::advance`] (or [`enumerate`]) when the coordinates are needed
/// as well.
#[derive(Debug, Clone)]
pub struct Odometer {
    bounds: Vec<usize>,
    strides: Vec<usize>,
    step: usize,
    start: usize,
    position: Vec<usize>,
    index: Option<usize>,
}

impl Odometer {
    /// Counter over `window_shape` (in elements) of a grid shaped `shape`,
    /// starting at flat offset `start_offset` and moving `stride` elements
    /// per step on every axis.
    ///
    /// # Errors
    /// `InvalidArgument` for rank 0, mismatched ranks, a zero stride or
    /// extent, a start offset outside the grid, or a window extending past
    /// the end of any axis.
    pub fn new(
        shape: &[usize],
        window_shape: &[usize],
        start_offset: usize,
        stride: usize,
    ) -> AppResult<Self> {
        if shape.is_empty() {
            return Err(PyramidError::invalid_argument("cannot index a rank-0 shape"));
        }
        if shape.len() != window_shape.len() {
            return Err(PyramidError::invalid_argument(format!(
                "window rank {} does not match grid rank {}",
                window_shape.len(),
                shape.len()
            )));
        }
        if stride == 0 {
            return Err(PyramidError::invalid_argument("stride must be at least 1"));
        }
        if shape.contains(&0) || window_shape.contains(&0) {
            return Err(PyramidError::invalid_argument(format!(
                "zero extent in shape {shape:?} or window {window_shape:?}"
            )));
        }

        let len: usize = shape.iter().product();
        if start_offset >= len {
            return Err(PyramidError::invalid_argument(format!(
                "start offset {start_offset} is outside a grid of {len} samples"
            )));
        }

        let origin = coordinates(shape, start_offset);
        for (axis, ((&from, &extent), &window)) in
            origin.iter().zip(shape).zip(window_shape).enumerate()
        {
            if from + window > extent {
                return Err(PyramidError::invalid_argument(format!(
                    "window {window_shape:?} at {origin:?} extends past axis {axis} of shape {shape:?}"
                )));
            }
        }

        Ok(Self {
            bounds: window_shape.to_vec(),
            strides: strides(shape),
            step: stride,
            start: start_offset,
            position: vec![0; shape.len()],
            index: Some(start_offset),
        })
    }

    /// Origins of the `dim_size`-edged windows tiling a grid.
    pub fn window_origins(shape: &[usize], dim_size: usize) -> AppResult<Self> {
        Self::new(shape, shape, 0, dim_size)
    }

    /// Every position of the `edge`-sided hypercube starting at `origin`.
    pub fn window(shape: &[usize], origin: usize, edge: usize) -> AppResult<Self> {
        Self::new(shape, &vec![edge; shape.len()], origin, 1)
    }

    /// Current coordinates (relative to the start offset) and flat index, or
    /// `None` once the walk is finished.
    #[must_use]
    pub fn current(&self) -> Option<(&[usize], usize)> {
        self.index.map(|index| (self.position.as_slice(), index))
    }

    /// Step to the next position, carrying into higher axes as needed.
    pub fn advance(&mut self) {
        if self.index.is_none() {
            return;
        }

        let mut axis = 0;
        loop {
            self.position[axis] += self.step;
            if self.position[axis] < self.bounds[axis] {
                break;
            }
            // Carry the one.
            self.position[axis] = 0;
            axis += 1;
            if axis == self.position.len() {
                self.index = None;
                return;
            }
        }

        self.index = Some(
            self.start
                + self
                    .position
                    .iter()
                    .zip(&self.strides)
                    .map(|(position, stride)| position * stride)
                    .sum::<usize>(),
        );
    }

    /// Total number of positions the full walk visits.
    #[must_use]
    pub fn total(&self) -> usize {
        self.bounds
            .iter()
            .map(|bound| bound.div_ceil(self.step))
            .product()
    }
}

impl Iterator for Odometer {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let index = self.index?;
        self.advance();
        Some(index)
    }
}

/// Visit every position of an [`Odometer`] walk with its coordinates and
/// flat index.
pub fn enumerate<F>(
    shape: &[usize],
    window_shape: &[usize],
    start_offset: usize,
    stride: usize,
    mut visit: F,
) -> AppResult<()>
where
    F: FnMut(&[usize], usize),
{
    let mut odometer = Odometer::new(shape, window_shape, start_offset, stride)?;
    while let Some((coordinates, index)) = odometer.current() {
        visit(coordinates, index);
        odometer.advance();
    }
    Ok(())
}
