//! # mode-pyramid
//!
//! Mode downsampling of n-dimensional integer grids. Level `l` of a grid
//! replaces every `2^l`-sided hypercube window by the most frequent sample
//! value inside it. Windows are independent, so each level is computed as one
//! batch of jobs on a [`mode_pool::TaskPool`].
//!
//! ## Crate Structure
//!
//! - **`grid`**: the owned, rank-agnostic [`Grid`] and shape helpers.
//! - **`index`**: the [`Odometer`](index::Odometer) walking window origins
//!   and window contents for any rank.
//! - **`mode`**: per-window [`FrequencyMap`]s, raw and merged.
//! - **`engine`**: the [`Downsampler`] producing one level or the whole
//!   pyramid.
//! - **`storage`**: CSV grid files.
//! - **`config`**, **`logging`**: figment configuration and the tracing
//!   subscriber used by the binary.
//! - **`synth`**: random source grids.
//! - **`error`**: the [`PyramidError`] enum shared by every module.
//!
//! ## Example
//!
//! ```
//! use mode_pyramid::{Downsampler, Grid};
//! use std::sync::Arc;
//!
//! let grid = Arc::new(Grid::from_samples(
//!     vec![4, 4],
//!     vec![5, 5, 5, 9, 5, 5, 9, 9, 1, 1, 1, 1, 1, 1, 1, 1],
//! )?);
//! let levels = Downsampler::new(2)?.downsample_all(&grid)?;
//! assert_eq!(levels[0].samples(), &[5, 9, 1, 1]);
//! assert_eq!(levels[1].samples(), &[1]);
//! # Ok::<(), mode_pyramid::PyramidError>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod index;
pub mod logging;
pub mod mode;
pub mod storage;
pub mod synth;

pub use engine::{Downsampler, Strategy};
pub use error::{AppResult, PyramidError};
pub use grid::{Grid, Sample};
pub use mode::FrequencyMap;
pub use mode_pool::{TaskFailure, TaskPool};
