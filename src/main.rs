//! CLI entry point for mode-pyramid
//!
//! Builds mode-downsampled levels of random or file-backed grids and writes
//! every level as CSV.
//!
//! # Usage
//!
//! One random 2-D grid, all levels:
//! ```bash
//! mode-pyramid run --shape 64,64
//! ```
//!
//! Every shape with extents 2..=16 along three axes:
//! ```bash
//! mode-pyramid --workers 8 sweep --rank 3 --max-exponent 4
//! ```
//!
//! Downsample a saved grid to level 2 only:
//! ```bash
//! mode-pyramid file --input output/source.csv --level 2
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mode_pyramid::config::PyramidConfig;
use mode_pyramid::mode::global_mode;
use mode_pyramid::storage::CsvWriter;
use mode_pyramid::synth::{sweep_shapes, Synth};
use mode_pyramid::{logging, Downsampler, Grid};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "mode-pyramid")]
#[command(about = "Mode downsampling pyramids for n-dimensional grids", long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/pyramid.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads per level (0 = one per hardware thread)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Downsample a random grid of the given shape
    Run {
        /// Comma-separated extents, e.g. 64,64,8
        #[arg(long, value_delimiter = ',', required = true)]
        shape: Vec<usize>,

        /// Compute this level only instead of the whole pyramid
        #[arg(long)]
        level: Option<u32>,
    },

    /// Downsample a random grid with random power-of-two extents
    Random {
        /// Number of axes
        #[arg(long, default_value_t = 2)]
        rank: usize,
    },

    /// Downsample every power-of-two shape up to a maximum extent
    Sweep {
        /// Number of axes
        #[arg(long, default_value_t = 2)]
        rank: usize,

        /// Extents run over 2^1 ..= 2^max_exponent on every axis
        #[arg(long, default_value_t = 4)]
        max_exponent: usize,
    },

    /// Downsample a grid stored as CSV
    File {
        /// Grid file written by a previous run
        #[arg(long)]
        input: PathBuf,

        /// Compute this level only instead of the whole pyramid
        #[arg(long)]
        level: Option<u32>,
    },
}

/// Which levels a subcommand asks for.
#[derive(Debug, Clone, Copy)]
enum Levels {
    /// The whole pyramid in one chained pass
    All,
    /// A single level
    Only(u32),
    /// Every level, each computed on its own from the source grid
    Each,
}

impl From<Option<u32>> for Levels {
    fn from(level: Option<u32>) -> Self {
        level.map_or(Self::All, Self::Only)
    }
}

/// Everything a subcommand needs to process grids.
struct Session {
    engine: Downsampler,
    writer: CsvWriter,
    write_source: bool,
}

impl Session {
    /// Downsample `grid` and write the requested levels under `name`.
    fn process(&self, name: &str, grid: Grid, levels: Levels) -> Result<()> {
        describe(name, &grid)?;
        if self.write_source {
            self.writer.write(&format!("{name}_source"), &grid)?;
        }

        let grid = Arc::new(grid);
        let started = Instant::now();
        let levels: Vec<(u32, Grid)> = match levels {
            Levels::All => (1..).zip(self.engine.downsample_all(&grid)?).collect(),
            Levels::Only(level) => vec![(level, self.engine.downsample(&grid, level)?)],
            Levels::Each => (1..=grid.max_level())
                .map(|level| Ok((level, self.engine.downsample(&grid, level)?)))
                .collect::<Result<_>>()?,
        };
        info!(
            grid = name,
            levels = levels.len(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
            "downsampling finished"
        );

        for (level, output) in &levels {
            self.writer.write(&format!("{name}_level_{level}"), output)?;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PyramidConfig::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PyramidConfig::load()?,
    };
    if let Some(workers) = cli.workers {
        config.engine.workers = workers;
    }
    if let Some(level) = cli.log_level {
        config.application.log_level = level;
    }
    config.validate()?;
    logging::init_from_config(&config)?;

    let engine = Downsampler::from_config(&config.engine)?;
    info!(
        app = %config.application.name,
        workers = engine.workers(),
        strategy = %engine.strategy(),
        output = %config.output.directory.display(),
        "starting"
    );

    let mut writer = CsvWriter::new(&config.output.directory);
    if config.output.timestamped {
        writer = writer.timestamped();
    }
    let session = Session {
        engine,
        writer,
        write_source: config.output.write_source,
    };
    let mut synth = Synth::from_config(&config.synth);

    match cli.command {
        Commands::Run { shape, level } => {
            let grid = synth.grid(shape)?;
            session.process("run", grid, level.into())
        }
        Commands::Random { rank } => {
            let shape = synth.power_of_two_shape(rank)?;
            info!(?shape, "random shape chosen");
            let grid = synth.grid(shape)?;
            session.process("random", grid, Levels::All)
        }
        Commands::Sweep { rank, max_exponent } => {
            let shapes = sweep_shapes(rank, max_exponent)?;
            info!(count = shapes.len(), "sweeping shapes");
            for shape in shapes {
                let name = format!(
                    "sweep_{}",
                    shape
                        .iter()
                        .map(usize::to_string)
                        .collect::<Vec<_>>()
                        .join("x")
                );
                let grid = synth.grid(shape)?;
                session.process(&name, grid, Levels::Each)?;
            }
            Ok(())
        }
        Commands::File { input, level } => {
            let grid = CsvWriter::read(&input)
                .with_context(|| format!("loading grid from {}", input.display()))?;
            if level.is_none() && !grid.is_power_of_two() {
                warn!(shape = ?grid.shape(), "extents are not powers of two; pass --level");
            }
            let name = input
                .file_stem()
                .map_or_else(|| "file".to_string(), |stem| stem.to_string_lossy().into_owned());
            session.process(&name, grid, level.into())
        }
    }
}

/// Log the source grid's global mode and value histogram.
fn describe(name: &str, grid: &Grid) -> Result<()> {
    let (mode, map) = global_mode(grid)?;
    let histogram: Vec<(u32, usize)> = map.iter().collect();
    info!(
        grid = name,
        shape = ?grid.shape(),
        samples = grid.len(),
        mode,
        distinct = map.distinct(),
        ?histogram,
        "source grid"
    );
    Ok(())
}
