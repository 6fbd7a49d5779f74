//! CSV grid files.
//!
//! Layout, one record per line:
//!
//! ```text
//! [4,2]
//! <0,0>,5
//! <1,0>,5
//! …
//! <3,1>,1
//! ```
//!
//! The first line is the shape. Every following line is one sample: its
//! coordinate tuple in angle brackets, then its value. Samples are listed in
//! storage order (axis 0 fastest). Nothing is quoted.

use crate::error::{AppResult, PyramidError};
use crate::grid::{Grid, Sample};
use crate::index::{self, Odometer};
use chrono::Local;
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Serialize `grid` to `writer`.
pub fn write_grid<W: Write>(grid: &Grid, writer: W) -> AppResult<()> {
    let mut csv = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);

    let shape: Vec<String> = grid.shape().iter().map(usize::to_string).collect();
    csv.write_record(&bracketed(shape, '[', ']'))?;

    let samples = grid.samples();
    let mut odometer = Odometer::new(grid.shape(), grid.shape(), 0, 1)?;
    while let Some((coordinates, index)) = odometer.current() {
        let mut record = bracketed(
            coordinates.iter().map(usize::to_string).collect(),
            '<',
            '>',
        );
        record.push(samples[index].to_string());
        csv.write_record(&record)?;
        odometer.advance();
    }

    csv.flush()?;
    Ok(())
}

/// Parse a grid written by [`write_grid`].
///
/// Lines may appear in any order, but every position must be listed exactly
/// once.
pub fn read_grid<R: Read>(reader: R) -> AppResult<Grid> {
    let mut csv = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = csv.records();

    let header = records
        .next()
        .ok_or_else(|| PyramidError::Parse("file is empty".to_string()))??;
    let shape = parse_tuple(&header, 0, header.len(), '[', ']')?;
    let mut grid = Grid::new(shape)?;
    let rank = grid.rank();
    let mut seen = vec![false; grid.len()];

    for (line, record) in records.enumerate() {
        let record = record?;
        let line = line + 2;
        if record.len() != rank + 1 {
            return Err(PyramidError::Parse(format!(
                "line {line}: expected {rank} coordinates and a value, found {} fields",
                record.len()
            )));
        }

        let coordinates = parse_tuple(&record, 0, rank, '<', '>')
            .map_err(|e| PyramidError::Parse(format!("line {line}: {e}")))?;
        let value: Sample = record[rank].trim().parse().map_err(|_| {
            PyramidError::Parse(format!("line {line}: bad sample value '{}'", &record[rank]))
        })?;

        grid.set(&coordinates, value)
            .map_err(|e| PyramidError::Parse(format!("line {line}: {e}")))?;
        let offset = index::flat_index(grid.shape(), &coordinates, 0);
        if std::mem::replace(&mut seen[offset], true) {
            return Err(PyramidError::Parse(format!(
                "line {line}: position {coordinates:?} listed twice"
            )));
        }
    }

    if let Some(missing) = seen.iter().position(|&found| !found) {
        return Err(PyramidError::Parse(format!(
            "position {:?} has no sample",
            index::coordinates(grid.shape(), missing)
        )));
    }
    Ok(grid)
}

/// Write `grid` to a new file at `path`.
pub fn write_grid_file(path: &Path, grid: &Grid) -> AppResult<()> {
    let file = File::create(path)?;
    write_grid(grid, file)
}

/// Read a grid file from `path`.
pub fn read_grid_file(path: &Path) -> AppResult<Grid> {
    let file = File::open(path)?;
    read_grid(file)
}

/// Writes a run's grids into one directory.
///
/// With a timestamp, every file name of the run shares the same
/// `%Y%m%d%H%M%S_` prefix taken when the writer was created.
#[derive(Debug, Clone)]
pub struct CsvWriter {
    directory: PathBuf,
    prefix: Option<String>,
}

impl CsvWriter {
    /// Writer into `directory`, without a timestamp prefix.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: None,
        }
    }

    /// Prefix file names with the current local time.
    #[must_use]
    pub fn timestamped(mut self) -> Self {
        self.prefix = Some(Local::now().format("%Y%m%d%H%M%S").to_string());
        self
    }

    /// Path the grid called `name` is written to.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        let file_name = match &self.prefix {
            Some(prefix) => format!("{prefix}_{name}.csv"),
            None => format!("{name}.csv"),
        };
        self.directory.join(file_name)
    }

    /// Write `grid` as `<name>.csv`, creating the directory if needed.
    pub fn write(&self, name: &str, grid: &Grid) -> AppResult<PathBuf> {
        if !self.directory.exists() {
            fs::create_dir_all(&self.directory)?;
        }
        let path = self.path_for(name);
        write_grid_file(&path, grid)?;
        info!(path = %path.display(), shape = ?grid.shape(), "grid written");
        Ok(path)
    }

    /// Load a grid previously written by [`CsvWriter::write`].
    pub fn read(path: &Path) -> AppResult<Grid> {
        read_grid_file(path)
    }
}

fn bracketed(mut fields: Vec<String>, open: char, close: char) -> Vec<String> {
    if let Some(first) = fields.first_mut() {
        first.insert(0, open);
    }
    if let Some(last) = fields.last_mut() {
        last.push(close);
    }
    fields
}

/// Parse `record[from..to]` as a bracketed tuple of extents or coordinates.
fn parse_tuple(
    record: &StringRecord,
    from: usize,
    to: usize,
    open: char,
    close: char,
) -> AppResult<Vec<usize>> {
    let fields: Vec<&str> = record.iter().skip(from).take(to - from).collect();
    let joined = fields.join(",");
    let inner = joined
        .trim()
        .strip_prefix(open)
        .and_then(|rest| rest.strip_suffix(close))
        .ok_or_else(|| {
            PyramidError::Parse(format!("expected {open}…{close} tuple, found '{joined}'"))
        })?;

    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| PyramidError::Parse(format!("bad integer '{part}' in '{joined}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(grid: &Grid) -> String {
        let mut buffer = Vec::new();
        write_grid(grid, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_exact_layout() {
        let grid = Grid::from_samples(vec![2, 2], vec![5, 9, 1, 0]).unwrap();
        assert_eq!(
            text_of(&grid),
            "[2,2]\n<0,0>,5\n<1,0>,9\n<0,1>,1\n<1,1>,0\n"
        );
    }

    #[test]
    fn test_rank_one_layout() {
        let grid = Grid::from_samples(vec![1], vec![7]).unwrap();
        assert_eq!(text_of(&grid), "[1]\n<0>,7\n");
    }

    #[test]
    fn test_read_back() {
        let grid = Grid::from_fn(vec![4, 2, 2], |c| (c[0] * c[1] + c[2]) as Sample).unwrap();
        let parsed = read_grid(text_of(&grid).as_bytes()).unwrap();
        assert_eq!(parsed, grid);
    }

    #[test]
    fn test_read_accepts_any_line_order() {
        let text = "[2,1]\n<1,0>,4\n<0,0>,3\n";
        let grid = read_grid(text.as_bytes()).unwrap();
        assert_eq!(grid.samples(), &[3, 4]);
    }

    #[test]
    fn test_malformed_files() {
        let cases = [
            "",
            "2,2\n",
            "[2,x]\n",
            "[2]\n<0>,1\n",
            "[2]\n<0>,1\n<0>,2\n",
            "[2]\n<0>,1\n<2>,2\n",
            "[2]\n<0>,1\n<1>,-3\n",
            "[2,1]\n<0,0>,1\n<1>,2\n",
            "[2,2]\n<0,18446744073709551615>,1\n",
        ];
        for text in cases {
            assert!(read_grid(text.as_bytes()).is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn test_out_of_range_coordinate_is_a_parse_error() {
        let text = format!("[2,2]\n<0,{}>,1\n", usize::MAX);
        let err = read_grid(text.as_bytes()).unwrap_err();
        assert!(matches!(err, PyramidError::Parse(ref message) if message.starts_with("line 2:")));
    }

    #[test]
    fn test_path_for() {
        let writer = CsvWriter::new("out");
        assert_eq!(writer.path_for("level_1"), PathBuf::from("out/level_1.csv"));

        let writer = writer.timestamped();
        let name = writer.path_for("source");
        let file_name = name.file_name().unwrap().to_str().unwrap();
        assert_eq!(file_name.len(), "YYYYmmddHHMMSS_source.csv".len());
        assert!(file_name.ends_with("_source.csv"));
    }
}
