//! Per-window mode computation.
//!
//! A [`FrequencyMap`] counts how often each sample value occurs in a window
//! and caches the current mode. It can be built two ways:
//!
//! - from raw samples, with [`mode_of_window`], visiting the window in
//!   storage order (axis 0 fastest);
//! - from already computed child maps, with [`reduce_modes`], adding counts
//!   per value. This costs O(distinct values) per child instead of
//!   O(window volume).
//!
//! # Tie-break
//!
//! While counting raw samples the mode is replaced only when a value's count
//! becomes strictly greater than the mode's count. Among values tied for the
//! highest count `M`, the survivor is therefore the value that reached `M`
//! first. A value's `M`-th occurrence is its last one, so the survivor is the
//! tied value whose last occurrence comes earliest in traversal order.
//!
//! Each tally keeps that last occurrence as a flat index into the source
//! grid (`last_seen`). Flat indices order positions exactly like the
//! traversal does, and merging takes the larger one. A merged map thus
//! selects the same mode as a rescan of the raw samples it covers.

use crate::error::{AppResult, PyramidError};
use crate::grid::{validate_shape, Grid, Sample};
use crate::index::Odometer;
use std::collections::BTreeMap;

/// Occurrences of one value inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    /// Occurrences so far.
    pub count: usize,
    /// Flat index (in the source grid) of the value's last occurrence.
    pub last_seen: usize,
}

impl Tally {
    fn outranks(&self, other: &Tally) -> bool {
        self.count > other.count || (self.count == other.count && self.last_seen < other.last_seen)
    }
}

/// Value → occurrence counts for one window, plus its current mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyMap {
    tallies: BTreeMap<Sample, Tally>,
    mode: Option<Sample>,
    total: usize,
}

impl FrequencyMap {
    /// Empty map with no mode.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one raw sample found at flat `index`.
    ///
    /// Indices must be recorded in increasing order for the tie-break to
    /// hold.
    pub fn record(&mut self, value: Sample, index: usize) {
        let tally = self.tallies.entry(value).or_insert(Tally {
            count: 0,
            last_seen: index,
        });
        tally.count += 1;
        tally.last_seen = index;
        let count = tally.count;
        self.total += 1;

        let replace = match self.mode {
            None => true,
            Some(mode) => count > self.count(mode),
        };
        if replace {
            self.mode = Some(value);
        }
    }

    /// Fold another window's counts into this one.
    pub fn merge(&mut self, other: &FrequencyMap) {
        for (&value, tally) in &other.tallies {
            let entry = self.tallies.entry(value).or_insert(Tally {
                count: 0,
                last_seen: tally.last_seen,
            });
            entry.count += tally.count;
            entry.last_seen = entry.last_seen.max(tally.last_seen);
        }
        self.total += other.total;
        self.mode = self.leading_value();
    }

    /// Most frequent value, or `None` for an empty map.
    #[must_use]
    pub fn mode(&self) -> Option<Sample> {
        self.mode
    }

    /// Occurrences of `value` (0 if never seen).
    #[must_use]
    pub fn count(&self, value: Sample) -> usize {
        self.tallies.get(&value).map_or(0, |tally| tally.count)
    }

    /// Count and last position of `value`, if it was seen.
    #[must_use]
    pub fn tally(&self, value: Sample) -> Option<Tally> {
        self.tallies.get(&value).copied()
    }

    /// Number of samples folded in.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of distinct values.
    #[must_use]
    pub fn distinct(&self) -> usize {
        self.tallies.len()
    }

    /// True until the first sample or merge.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    /// `(value, count)` pairs in ascending value order.
    pub fn iter(&self) -> impl Iterator<Item = (Sample, usize)> + '_ {
        self.tallies.iter().map(|(&value, tally)| (value, tally.count))
    }

    fn leading_value(&self) -> Option<Sample> {
        self.tallies
            .iter()
            .fold(None::<(Sample, &Tally)>, |best, (&value, tally)| match best {
                Some((_, leader)) if !tally.outranks(leader) => best,
                _ => Some((value, tally)),
            })
            .map(|(value, _)| value)
    }
}

/// Mode and frequency map of the `edge`-sided window of `grid` starting at
/// flat offset `window_origin`.
///
/// # Errors
/// `InvalidArgument` if `edge` is 0 or the window leaves the grid.
pub fn mode_of_window(
    grid: &Grid,
    window_origin: usize,
    edge: usize,
) -> AppResult<(Sample, FrequencyMap)> {
    if edge == 0 {
        return Err(PyramidError::invalid_argument("window edge length must be at least 1"));
    }

    let samples = grid.samples();
    let mut map = FrequencyMap::new();
    for index in Odometer::window(grid.shape(), window_origin, edge)? {
        map.record(samples[index], index);
    }

    finish(map)
}

/// Mode and merged map of the `edge`-sided window of child maps starting at
/// `window_origin`.
///
/// `maps` holds one map per position of a grid shaped `maps_shape`, in
/// storage order (typically the maps retained from the previous level).
///
/// # Errors
/// `InvalidArgument` if `edge` is 0, `maps` does not match `maps_shape`, the
/// window leaves the grid, or every child map is empty.
pub fn reduce_modes(
    maps: &[FrequencyMap],
    maps_shape: &[usize],
    window_origin: usize,
    edge: usize,
) -> AppResult<(Sample, FrequencyMap)> {
    if edge == 0 {
        return Err(PyramidError::invalid_argument("window edge length must be at least 1"));
    }
    let expected = validate_shape(maps_shape)?;
    if maps.len() != expected {
        return Err(PyramidError::invalid_argument(format!(
            "{} frequency maps supplied for a shape of {expected} positions",
            maps.len()
        )));
    }

    let mut merged = FrequencyMap::new();
    for index in Odometer::window(maps_shape, window_origin, edge)? {
        merged.merge(&maps[index]);
    }

    finish(merged)
}

/// Mode and frequency map of the entire grid.
pub fn global_mode(grid: &Grid) -> AppResult<(Sample, FrequencyMap)> {
    let mut map = FrequencyMap::new();
    for (index, &value) in grid.samples().iter().enumerate() {
        map.record(value, index);
    }
    finish(map)
}

fn finish(map: FrequencyMap) -> AppResult<(Sample, FrequencyMap)> {
    let mode = map
        .mode()
        .ok_or_else(|| PyramidError::invalid_argument("window contains no samples"))?;
    Ok((mode, map))
}
