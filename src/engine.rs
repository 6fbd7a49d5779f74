//! Downsample engine.
//!
//! Level `l` replaces every `2^l`-sided window of the source grid by its
//! mode. Each level owns a fresh [`TaskPool`]: one job per window origin is
//! submitted, the pool is shut down (waiting for every job), then the
//! handles are read back in origin order. Origins are enumerated axis 0
//! fastest, which is also the output grid's storage order, so results are
//! written sequentially by the collecting thread and no lock guards the
//! output.
//!
//! [`Downsampler::downsample_all`] builds the full pyramid. With
//! [`Strategy::Reduce`] only level 1 reads raw samples; every later level
//! merges the 2×…×2 blocks of frequency maps kept from the level below.

use crate::config::EngineConfig;
use crate::error::{AppResult, PyramidError};
use crate::grid::{collapse_shape, reduced_extents, Grid, Sample};
use crate::index::Odometer;
use crate::mode::{mode_of_window, reduce_modes, FrequencyMap};
use mode_pool::{PoolError, TaskPool};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// How [`Downsampler::downsample_all`] computes levels past the first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Merge the previous level's frequency maps.
    #[default]
    Reduce,
    /// Recompute every level from the source grid.
    Rescan,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reduce => write!(f, "reduce"),
            Self::Rescan => write!(f, "rescan"),
        }
    }
}

impl FromStr for Strategy {
    type Err = PyramidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reduce" => Ok(Self::Reduce),
            "rescan" => Ok(Self::Rescan),
            other => Err(PyramidError::invalid_argument(format!(
                "unknown strategy '{other}', expected reduce or rescan"
            ))),
        }
    }
}

/// Number of worker threads the host can run in parallel (at least 1).
#[must_use]
pub fn hardware_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Computes mode-downsampled levels of a grid on a worker pool.
#[derive(Debug, Clone)]
pub struct Downsampler {
    workers: usize,
    strategy: Strategy,
}

impl Downsampler {
    /// Engine using `workers` threads per level.
    ///
    /// # Errors
    /// `InvalidArgument` if `workers` is 0.
    pub fn new(workers: usize) -> AppResult<Self> {
        if workers == 0 {
            return Err(PyramidError::invalid_argument(
                "worker count must be at least 1",
            ));
        }
        Ok(Self {
            workers,
            strategy: Strategy::default(),
        })
    }

    /// Engine from the `[engine]` configuration section. A worker count of
    /// 0 there means one worker per hardware thread.
    pub fn from_config(config: &EngineConfig) -> AppResult<Self> {
        let workers = match config.workers {
            0 => hardware_parallelism(),
            n => n,
        };
        Ok(Self::new(workers)?.with_strategy(config.strategy))
    }

    /// Use `strategy` for levels past the first.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Worker threads per level pool.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Strategy used by [`Downsampler::downsample_all`].
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Downsample `grid` to level `level` (windows of edge `2^level`).
    ///
    /// The output has extent `shape[i] / 2^level` on every axis. A result
    /// where every axis reaches 1 has shape `[1]`.
    ///
    /// # Errors
    /// - `InvalidArgument` if `level` is 0, exceeds [`Grid::max_level`], or
    ///   some extent is not divisible by `2^level`.
    /// - `TaskFailed` if a window job panicked.
    pub fn downsample(&self, grid: &Arc<Grid>, level: u32) -> AppResult<Grid> {
        let edge = check_level(grid, level)?;
        let started = Instant::now();

        let origins: Vec<usize> = Odometer::window_origins(grid.shape(), edge)?.collect();
        let windows = origins.len();
        let jobs = origins.into_iter().map(|origin| {
            let grid = Arc::clone(grid);
            move || mode_of_window(&grid, origin, edge).map(|(mode, _)| mode)
        });
        let samples = self.run_jobs(jobs)?;

        let output = Grid::from_samples(
            collapse_shape(&reduced_extents(grid.shape(), edge)),
            samples,
        )?;
        log_level(level, edge, windows, &output, started);
        Ok(output)
    }

    /// Every level from 1 to [`Grid::max_level`], finest first.
    ///
    /// A grid whose max level is 0 yields an empty vector.
    ///
    /// # Errors
    /// - `InvalidArgument` if some extent is not a power of two.
    /// - `TaskFailed` if a window job panicked; no later level is started.
    pub fn downsample_all(&self, grid: &Arc<Grid>) -> AppResult<Vec<Grid>> {
        if !grid.is_power_of_two() {
            return Err(PyramidError::invalid_argument(format!(
                "every extent must be a power of two to build all levels, got {:?}",
                grid.shape()
            )));
        }

        let max_level = grid.max_level();
        debug!(
            shape = ?grid.shape(),
            max_level,
            strategy = %self.strategy,
            "building pyramid"
        );

        match self.strategy {
            Strategy::Rescan => (1..=max_level)
                .map(|level| self.downsample(grid, level))
                .collect(),
            Strategy::Reduce => self.reduce_chain(grid, max_level),
        }
    }

    fn reduce_chain(&self, grid: &Arc<Grid>, max_level: u32) -> AppResult<Vec<Grid>> {
        let mut levels = Vec::with_capacity(max_level as usize);
        if max_level == 0 {
            return Ok(levels);
        }

        // Level 1 reads raw samples and keeps each window's map.
        let started = Instant::now();
        let origins: Vec<usize> = Odometer::window_origins(grid.shape(), 2)?.collect();
        let windows = origins.len();
        let jobs = origins.into_iter().map(|origin| {
            let grid = Arc::clone(grid);
            move || mode_of_window(&grid, origin, 2)
        });
        let (samples, maps): (Vec<Sample>, Vec<FrequencyMap>) =
            self.run_jobs(jobs)?.into_iter().unzip();

        let mut maps_shape = reduced_extents(grid.shape(), 2);
        let output = Grid::from_samples(collapse_shape(&maps_shape), samples)?;
        log_level(1, 2, windows, &output, started);
        levels.push(output);

        let mut maps = Arc::new(maps);
        for level in 2..=max_level {
            let started = Instant::now();
            let shape: Arc<[usize]> = maps_shape.as_slice().into();
            let origins: Vec<usize> = Odometer::window_origins(&shape, 2)?.collect();
            let windows = origins.len();
            let jobs = origins.into_iter().map(|origin| {
                let maps = Arc::clone(&maps);
                let shape = Arc::clone(&shape);
                move || reduce_modes(&maps, &shape, origin, 2)
            });
            let (samples, merged): (Vec<Sample>, Vec<FrequencyMap>) =
                self.run_jobs(jobs)?.into_iter().unzip();

            maps_shape = reduced_extents(&maps_shape, 2);
            let output = Grid::from_samples(collapse_shape(&maps_shape), samples)?;
            log_level(level, 1 << level, windows, &output, started);
            levels.push(output);
            maps = Arc::new(merged);
        }

        Ok(levels)
    }

    /// Run `jobs` on a pool of this engine's size and return their results in
    /// submission order.
    ///
    /// The pool is shut down, and so every job has finished, before any
    /// result is read. The first failure in submission order is returned,
    /// whether the job returned an error or panicked.
    pub fn run_jobs<I, F, T>(&self, jobs: I) -> AppResult<Vec<T>>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = TaskPool::new(self.workers)?;
        debug!(workers = self.workers, "level pool started");

        let handles = jobs
            .into_iter()
            .map(|job| pool.submit(job))
            .collect::<Result<Vec<_>, PoolError>>()?;
        pool.shutdown();

        let mut results = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(value)) => results.push(value),
                Ok(Err(err)) => {
                    first_error.get_or_insert(err);
                }
                Err(failure) => {
                    first_error.get_or_insert(failure.into());
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }
}

/// Window edge for `level`, after checking the level fits the grid.
fn check_level(grid: &Grid, level: u32) -> AppResult<usize> {
    let max_level = grid.max_level();
    if level == 0 || level > max_level {
        return Err(PyramidError::invalid_argument(format!(
            "level {level} is outside 1..={max_level} for shape {:?}",
            grid.shape()
        )));
    }

    let edge = 1usize << level;
    if let Some(axis) = grid.shape().iter().position(|extent| extent % edge != 0) {
        return Err(PyramidError::invalid_argument(format!(
            "axis {axis} of shape {:?} is not divisible by window edge {edge}",
            grid.shape()
        )));
    }
    Ok(edge)
}

fn log_level(level: u32, edge: usize, windows: usize, output: &Grid, started: Instant) {
    info!(
        level,
        edge,
        windows,
        shape = ?output.shape(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
        "level complete"
    );
}
