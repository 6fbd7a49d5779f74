//! End-to-end downsampling scenarios on fixed and random grids.

use mode_pyramid::index::Odometer;
use mode_pyramid::mode::{global_mode, mode_of_window, reduce_modes, FrequencyMap};
use mode_pyramid::synth::Synth;
use mode_pyramid::{Downsampler, Grid, PyramidError, Sample, Strategy};
use std::sync::Arc;

fn quadrant_grid() -> Arc<Grid> {
    Arc::new(Grid::from_fn(vec![8, 8], |c| if c[0] < 4 && c[1] < 4 { 1 } else { 2 }).unwrap())
}

#[test]
fn test_quadrant_level_one() {
    let engine = Downsampler::new(4).unwrap();
    let level = engine.downsample(&quadrant_grid(), 1).unwrap();

    assert_eq!(level.shape(), &[4, 4]);
    let expected = Grid::from_fn(vec![4, 4], |c| if c[0] < 2 && c[1] < 2 { 1 } else { 2 }).unwrap();
    assert_eq!(level, expected);
}

#[test]
fn test_quadrant_pyramid() {
    let engine = Downsampler::new(3).unwrap();
    let levels = engine.downsample_all(&quadrant_grid()).unwrap();

    let shapes: Vec<&[usize]> = levels.iter().map(Grid::shape).collect();
    assert_eq!(shapes, vec![&[4, 4][..], &[2, 2][..], &[1][..]]);
    assert_eq!(levels[1].samples(), &[1, 2, 2, 2]);
    assert_eq!(levels[2].samples(), &[2]);
}

#[test]
fn test_tie_heavy_four_by_four() {
    // Rows run along axis 0.
    let grid = Arc::new(
        Grid::from_samples(
            vec![4, 4],
            vec![5, 5, 5, 9, 5, 5, 9, 9, 1, 1, 1, 1, 1, 1, 1, 1],
        )
        .unwrap(),
    );

    for strategy in [Strategy::Reduce, Strategy::Rescan] {
        let engine = Downsampler::new(2).unwrap().with_strategy(strategy);
        let levels = engine.downsample_all(&grid).unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].shape(), &[2, 2]);
        assert_eq!(levels[0].samples(), &[5, 9, 1, 1]);
        assert_eq!(levels[1].samples(), &[1], "strategy {strategy}");
    }
}

#[test]
fn test_each_sample_is_its_window_mode() {
    let mut synth = Synth::new(3, Some(11));
    for shape in [vec![16], vec![8, 8], vec![4, 8, 4], vec![4, 4, 2, 2]] {
        let grid = Arc::new(synth.grid(shape).unwrap());
        let engine = Downsampler::new(4).unwrap();

        for level in 1..=grid.max_level() {
            let edge = 1usize << level;
            let output = engine.downsample(&grid, level).unwrap();
            let origins = Odometer::window_origins(grid.shape(), edge).unwrap();
            for (position, origin) in origins.enumerate() {
                let (mode, _) = mode_of_window(&grid, origin, edge).unwrap();
                assert_eq!(output.samples()[position], mode);
            }
        }
    }
}

#[test]
fn test_reduce_matches_rescan_on_random_grids() {
    let mut synth = Synth::new(2, Some(2024));
    let reduce = Downsampler::new(3).unwrap();
    let rescan = Downsampler::new(5).unwrap().with_strategy(Strategy::Rescan);

    for rank in 1..=4 {
        for _ in 0..4 {
            let shape = (0..rank).map(|axis| 4 << (axis % 2)).collect();
            let grid = Arc::new(synth.grid(shape).unwrap());
            assert_eq!(
                reduce.downsample_all(&grid).unwrap(),
                rescan.downsample_all(&grid).unwrap(),
                "shape {:?}",
                grid.shape()
            );
        }
    }
}

#[test]
fn test_merged_maps_equal_rescanned_maps() {
    let grid = Synth::new(3, Some(5)).grid(vec![8, 8, 4]).unwrap();

    let level_one: Vec<FrequencyMap> = Odometer::window_origins(grid.shape(), 2)
        .unwrap()
        .map(|origin| mode_of_window(&grid, origin, 2).unwrap().1)
        .collect();
    let maps_shape = [4, 4, 2];

    let merged = Odometer::window_origins(&maps_shape, 2).unwrap();
    let rescanned = Odometer::window_origins(grid.shape(), 4).unwrap();
    let mut windows = 0;
    for (map_origin, grid_origin) in merged.zip(rescanned) {
        let (merged_mode, merged_map) = reduce_modes(&level_one, &maps_shape, map_origin, 2).unwrap();
        let (raw_mode, raw_map) = mode_of_window(&grid, grid_origin, 4).unwrap();
        assert_eq!(merged_mode, raw_mode);
        assert_eq!(merged_map, raw_map);
        windows += 1;
    }
    // [4,4,2] maps in edge-2 windows: 2 * 2 * 1.
    assert_eq!(windows, 4);
}

#[test]
fn test_last_level_is_global_mode() {
    let mut synth = Synth::new(4, Some(99));
    for shape in [vec![32], vec![16, 16], vec![8, 8, 8]] {
        let grid = Arc::new(synth.grid(shape).unwrap());
        let (expected, _) = global_mode(&grid).unwrap();

        let levels = Downsampler::new(2).unwrap().downsample_all(&grid).unwrap();
        let last = levels.last().unwrap();
        assert_eq!(last.shape(), &[1]);
        assert_eq!(last.samples(), &[expected]);
    }
}

#[test]
fn test_worker_count_does_not_change_results() {
    let grid = Arc::new(Synth::new(5, Some(1)).grid(vec![16, 8, 4]).unwrap());
    let baseline = Downsampler::new(1).unwrap().downsample_all(&grid).unwrap();
    for workers in [2, 3, 8] {
        let levels = Downsampler::new(workers).unwrap().downsample_all(&grid).unwrap();
        assert_eq!(levels, baseline, "{workers} workers");
    }
}

#[test]
fn test_zero_samples_are_values() {
    let grid = Arc::new(Grid::from_samples(vec![2, 2], vec![0, 0, 0, 7]).unwrap());
    let level = Downsampler::new(1).unwrap().downsample(&grid, 1).unwrap();
    assert_eq!(level.samples(), &[0 as Sample]);
}

#[test]
fn test_contract_violations() {
    let engine = Downsampler::new(2).unwrap();
    let grid = Arc::new(Grid::new(vec![12, 8]).unwrap());

    assert!(matches!(
        engine.downsample(&grid, 0),
        Err(PyramidError::InvalidArgument(_))
    ));
    assert!(matches!(
        engine.downsample(&grid, 4),
        Err(PyramidError::InvalidArgument(_))
    ));
    assert!(matches!(
        engine.downsample_all(&grid),
        Err(PyramidError::InvalidArgument(_))
    ));
    // 12 is divisible by 4, so level 2 is fine.
    assert_eq!(engine.downsample(&grid, 2).unwrap().shape(), &[3, 2]);
}
