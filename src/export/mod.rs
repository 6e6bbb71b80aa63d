//! CSV output: which columns a sample turns into, where the file goes and
//! how name collisions are resolved.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::types::{ExportResult, Sample};

/// One logical output column. `Fingers` expands to x, y, z per finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Elapsed,
    Target,
    Speed,
    X,
    Y,
    Z,
    Fingers,
}

impl Column {
    pub fn headers(&self, max_fingers: usize) -> Vec<String> {
        match self {
            Column::Elapsed => vec!["elapsed".to_string()],
            Column::Target => vec!["target".to_string()],
            Column::Speed => vec!["speed".to_string()],
            Column::X => vec!["x".to_string()],
            Column::Y => vec!["y".to_string()],
            Column::Z => vec!["z".to_string()],
            Column::Fingers => (1..=max_fingers)
                .flat_map(|i| [format!("finger{i}_x"), format!("finger{i}_y"), format!("finger{i}_z")])
                .collect(),
        }
    }

    /// Cells for one sample; missing values are empty cells
    pub fn cells(&self, sample: &Sample, max_fingers: usize) -> Vec<String> {
        match self {
            Column::Elapsed => vec![sample.elapsed.to_string()],
            Column::Target => vec![sample.target.clone().unwrap_or_default()],
            Column::Speed => vec![sample.speed.map(|s| s.to_string()).unwrap_or_default()],
            Column::X => vec![sample.position.x.to_string()],
            Column::Y => vec![sample.position.y.to_string()],
            Column::Z => vec![sample.position.z.to_string()],
            Column::Fingers => {
                let mut cells = Vec::with_capacity(max_fingers * 3);
                for i in 0..max_fingers {
                    match sample.fingers.get(i) {
                        Some(f) => cells.extend([f.x.to_string(), f.y.to_string(), f.z.to_string()]),
                        None => cells.extend([String::new(), String::new(), String::new()]),
                    }
                }
                cells
            }
        }
    }
}

/// Column set of the target tasks
pub fn default_columns() -> Vec<Column> {
    vec![Column::Elapsed, Column::X, Column::Y, Column::Z, Column::Speed, Column::Target]
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Cannot create output directory {path}: {source}")]
    CreateDir { path: PathBuf, source: std::io::Error },
    #[error("Cannot open {path} for writing: {source}")]
    Open { path: PathBuf, source: std::io::Error },
    #[error("Write to {path} failed: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("No columns configured")]
    NoColumns,
}

/// An output file opened before a run starts, so a locked or unwritable
/// destination is reported before any data is collected.
#[derive(Debug)]
pub struct ExportTarget {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ExportTarget {
    /// Opens `<dir>/<stem>.csv`, or the next free numbered name
    pub fn prepare(dir: &Path, stem: &str) -> Result<Self, ExportError> {
        std::fs::create_dir_all(dir).map_err(|source| ExportError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = unique_path(dir, stem, "csv");
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| ExportError::Open { path: path.clone(), source })?;
        info!("Output file ready: {}", path.display());
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Opens `count` files under the same stem. If any open fails, the
    /// ones already opened are removed again.
    pub fn prepare_many(dir: &Path, stem: &str, count: usize) -> Result<Vec<Self>, ExportError> {
        let mut targets = Vec::with_capacity(count);
        for _ in 0..count {
            match Self::prepare(dir, stem) {
                Ok(target) => targets.push(target),
                Err(e) => {
                    targets.into_iter().for_each(Self::discard);
                    return Err(e);
                }
            }
        }
        Ok(targets)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header from the column names, then one row per sample
    pub fn write_samples(self, samples: &[Sample], columns: &[Column]) -> Result<usize, ExportError> {
        self.write_samples_with_preamble(samples, columns, &[])
    }

    /// Like `write_samples`, with free-text lines ahead of the header
    pub fn write_samples_with_preamble(
        self,
        samples: &[Sample],
        columns: &[Column],
        preamble: &[String],
    ) -> Result<usize, ExportError> {
        if columns.is_empty() {
            return Err(ExportError::NoColumns);
        }
        let max_fingers = samples.iter().map(|s| s.fingers.len()).max().unwrap_or(0);
        let header: Vec<String> = columns.iter().flat_map(|c| c.headers(max_fingers)).collect();
        let rows = samples
            .iter()
            .map(|s| columns.iter().flat_map(|c| c.cells(s, max_fingers)).collect());

        let mut lines: Vec<Vec<String>> = preamble.iter().map(|l| vec![l.clone()]).collect();
        lines.push(header);
        self.write_rows(&lines, rows)
    }

    /// Writes the header lines and rows, returns the number of rows
    pub fn write_rows<I>(mut self, header: &[Vec<String>], rows: I) -> Result<usize, ExportError>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let path = self.path.clone();
        let wrap = |source| ExportError::Write { path: path.clone(), source };

        for line in header {
            writeln!(self.writer, "{}", line.join(",")).map_err(wrap)?;
        }
        let mut count = 0;
        for row in rows {
            writeln!(self.writer, "{}", row.join(",")).map_err(wrap)?;
            count += 1;
        }
        self.writer.flush().map_err(wrap)?;
        info!("Wrote {} rows to {}", count, self.path.display());
        Ok(count)
    }

    /// Gives up on the file; removes it if nothing was written
    pub fn discard(self) {
        let path = self.path.clone();
        drop(self);
        if let Err(e) = std::fs::remove_file(&path) {
            warn!("Could not remove unused output file {}: {}", path.display(), e);
        }
    }
}

/// Writes samples and folds the outcome into an [`ExportResult`]
pub fn export_samples(target: ExportTarget, samples: &[Sample], columns: &[Column]) -> ExportResult {
    if samples.is_empty() {
        target.discard();
        return ExportResult::no_data();
    }
    let path = target.path().to_path_buf();
    match target.write_samples(samples, columns) {
        Ok(rows) => ExportResult::success(path, rows),
        Err(e) => ExportResult::error(e.to_string()),
    }
}

/// Writes each trial into its own pre-opened file, headed by its tap count
/// and trial number. A failed trial does not stop the ones after it, and
/// files left over are removed.
pub fn export_trials(targets: Vec<ExportTarget>, trials: &[(u32, Vec<Sample>)], columns: &[Column]) -> ExportResult {
    let mut targets = targets.into_iter();
    let mut written: Vec<(PathBuf, usize)> = Vec::new();
    let mut failures = Vec::new();

    for (i, (taps, samples)) in trials.iter().enumerate() {
        let trial = i + 1;
        let Some(target) = targets.next() else {
            error!("Trial {} not written: no output file left", trial);
            failures.push(format!("trial {}: no output file", trial));
            continue;
        };
        let path = target.path().to_path_buf();
        let preamble = [format!("Total taps,{}", taps), format!("Trial,{}", trial)];
        match target.write_samples_with_preamble(samples, columns, &preamble) {
            Ok(rows) => written.push((path, rows)),
            Err(e) => {
                error!("Trial {} not written: {}", trial, e);
                failures.push(format!("trial {}: {}", trial, e));
            }
        }
    }
    targets.for_each(ExportTarget::discard);

    if trials.is_empty() {
        return ExportResult::no_data();
    }
    let rows: usize = written.iter().map(|(_, rows)| rows).sum();
    match written.last() {
        Some((path, _)) if failures.is_empty() => ExportResult {
            path: Some(path.clone()),
            rows_written: rows,
            message: format!("{} trials written, {} rows, last to {}", written.len(), rows, path.display()),
        },
        _ => ExportResult::error(format!(
            "{} of {} trials written; {}",
            written.len(),
            trials.len(),
            failures.join("; ")
        )),
    }
}

/// `dir/stem.ext` if free; otherwise trailing digits of the stem are
/// incremented (or `1` appended) until a free name is found
pub fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let mut stem = stem.to_string();
    loop {
        let candidate = dir.join(format!("{stem}.{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        stem = next_stem(&stem);
    }
}

fn next_stem(stem: &str) -> String {
    let digits = stem.chars().rev().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return format!("{stem}1");
    }
    let (head, num) = stem.split_at(stem.len() - digits);
    match num.parse::<u64>() {
        Ok(n) => format!("{head}{}", n + 1),
        Err(_) => format!("{stem}1"),
    }
}

/// `root_participant_timestamp[_suffix]`, skipping empty parts
pub fn run_file_stem(root: &str, participant: &str, timestamp: &str, suffix: Option<&str>) -> String {
    [Some(root), Some(participant), Some(timestamp), suffix]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vector3;
    use tempfile::TempDir;

    fn samples() -> Vec<Sample> {
        let mut two_fingers = Sample::new(0.5, Vector3::new(1.0, 2.0, 3.0)).with_target("NW");
        two_fingers.fingers.push(Vector3::new(4.0, 5.0, 6.0));
        vec![
            Sample::new(0.0, Vector3::new(1.0, 2.0, 3.0)).with_speed(12.5).with_target("NW"),
            two_fingers,
        ]
    }

    #[test]
    fn collisions_get_a_numeric_suffix() {
        let dir = TempDir::new().unwrap();
        let first = ExportTarget::prepare(dir.path(), "postural_data").unwrap();
        assert!(first.path().ends_with("postural_data.csv"));
        let second = ExportTarget::prepare(dir.path(), "postural_data").unwrap();
        assert!(second.path().ends_with("postural_data1.csv"));
        let third = ExportTarget::prepare(dir.path(), "postural_data").unwrap();
        assert!(third.path().ends_with("postural_data2.csv"));
    }

    fn trial(taps: u32) -> (u32, Vec<Sample>) {
        (taps, vec![Sample::new(0.0, Vector3::new(1.0, 2.0, 3.0))])
    }

    #[test]
    fn each_trial_gets_its_own_file_and_spares_are_removed() {
        let dir = TempDir::new().unwrap();
        let targets = ExportTarget::prepare_many(dir.path(), "tapping_p01", 4).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);

        let result = export_trials(targets, &[trial(21), trial(23)], &default_columns());
        assert!(result.is_success());
        assert_eq!(result.rows_written, 2);

        let first = std::fs::read_to_string(dir.path().join("tapping_p01.csv")).unwrap();
        let lines: Vec<&str> = first.lines().collect();
        assert_eq!(lines[..3], ["Total taps,21", "Trial,1", "elapsed,x,y,z,speed,target"]);
        let second = std::fs::read_to_string(dir.path().join("tapping_p011.csv")).unwrap();
        assert!(second.starts_with("Total taps,23\nTrial,2\n"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn a_missing_trial_file_does_not_stop_the_rest() {
        let dir = TempDir::new().unwrap();
        let targets = ExportTarget::prepare_many(dir.path(), "tapping", 2).unwrap();

        let result = export_trials(targets, &[trial(20), trial(22), trial(21)], &default_columns());
        assert!(!result.is_success());
        assert!(result.message.starts_with("2 of 3 trials written"));
        assert!(dir.path().join("tapping.csv").exists());
        assert!(dir.path().join("tapping1.csv").exists());
    }

    #[test]
    fn no_trials_removes_every_file() {
        let dir = TempDir::new().unwrap();
        let targets = ExportTarget::prepare_many(dir.path(), "tapping", 3).unwrap();
        let result = export_trials(targets, &[], &default_columns());
        assert!(!result.is_success());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn trailing_digits_are_incremented() {
        assert_eq!(next_stem("run9"), "run10");
        assert_eq!(next_stem("run"), "run1");
        assert_eq!(next_stem("clock_20240101_3"), "clock_20240101_4");
    }

    #[test]
    fn configured_columns_shape_the_file() {
        let dir = TempDir::new().unwrap();
        let target = ExportTarget::prepare(dir.path(), "clock").unwrap();
        let path = target.path().to_path_buf();
        let columns = [Column::Elapsed, Column::Speed, Column::Target, Column::Fingers];
        assert_eq!(target.write_samples(&samples(), &columns).unwrap(), 2);

        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "elapsed,speed,target,finger1_x,finger1_y,finger1_z,finger2_x,finger2_y,finger2_z"
        );
        assert_eq!(lines[1], "0,12.5,NW,1,2,3,,,");
        assert_eq!(lines[2], "0.5,,NW,1,2,3,4,5,6");
    }

    #[test]
    fn empty_log_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let target = ExportTarget::prepare(dir.path(), "empty").unwrap();
        let path = target.path().to_path_buf();
        let result = export_samples(target, &[], &default_columns());
        assert!(!result.is_success());
        assert!(!path.exists());
    }

    #[test]
    fn no_columns_is_an_error() {
        let dir = TempDir::new().unwrap();
        let target = ExportTarget::prepare(dir.path(), "x").unwrap();
        assert!(matches!(target.write_samples(&samples(), &[]), Err(ExportError::NoColumns)));
    }

    #[test]
    fn stem_skips_missing_parts() {
        assert_eq!(run_file_stem("clock", "p01", "20240101120000", None), "clock_p01_20240101120000");
        assert_eq!(run_file_stem("tapping", "", "20240101120000", Some("2")), "tapping_20240101120000_2");
    }
}
