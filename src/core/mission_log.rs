//! Mission Log
//!
//! Plain-text record of every phase transition, one file per run:
//!
//! ```text
//! % Mission log started at 2024-05-01 12:00:00
//! % Start mission 1 end mission 2
//! % 1  Time [sec]
//! % 2  mission number.
//! % 3  mission state.
//! 1714564800.120 1 0
//! 1714564800.120 1 10
//! ```
//!
//! Each transition writes two rows with the same timestamp: the state left and
//! the state entered, so a plot of column 3 over column 1 shows steps.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use robobot_mission_core::phase::PhaseId;
use robobot_mission_core::supervisor::Progress;

/// Transition log writer.
pub struct MissionLog<W: Write> {
    out: W,
    rows: u64,
}

impl MissionLog<BufWriter<File>> {
    /// Create `log_mission_<date>.txt` in `dir` and write the header.
    pub fn create(dir: &Path, first: PhaseId, last: PhaseId) -> io::Result<(Self, PathBuf)> {
        let name = format!("log_mission_{}.txt", Local::now().format("%Y%b%d_%H%M%S"));
        let path = dir.join(name);
        let file = File::create(&path)?;
        let log = Self::new(BufWriter::new(file), first, last)?;
        Ok((log, path))
    }
}

impl<W: Write> MissionLog<W> {
    /// Wrap `out` and write the header.
    pub fn new(mut out: W, first: PhaseId, last: PhaseId) -> io::Result<Self> {
        writeln!(
            out,
            "% Mission log started at {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(out, "% Start mission {} end mission {}", first, last)?;
        writeln!(out, "% 1  Time [sec]")?;
        writeln!(out, "% 2  mission number.")?;
        writeln!(out, "% 3  mission state.")?;
        Ok(Self { out, rows: 0 })
    }

    /// Record a transition at `at_ms`.
    pub fn record(&mut self, at_ms: u64, from: Progress, to: Progress) -> io::Result<()> {
        self.row(at_ms, from)?;
        self.row(at_ms, to)?;
        self.out.flush()
    }

    fn row(&mut self, at_ms: u64, p: Progress) -> io::Result<()> {
        writeln!(self.out, "{}.{:03} {} {}", at_ms / 1000, at_ms % 1000, p.phase, p.state)?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far (two per transition).
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(phase: PhaseId, state: u16) -> Progress {
        Progress { phase, state }
    }

    #[test]
    fn test_header_and_rows() {
        let mut log = MissionLog::new(Vec::new(), 1, 2).unwrap();
        log.record(12_345, p(1, 0), p(1, 10)).unwrap();
        log.record(13_005, p(1, 999), p(2, 0)).unwrap();

        let text = String::from_utf8(log.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("% Mission log started at "));
        assert_eq!(lines[1], "% Start mission 1 end mission 2");
        assert_eq!(lines[4], "% 3  mission state.");
        assert_eq!(&lines[5..], ["12.345 1 0", "12.345 1 10", "13.005 1 999", "13.005 2 0"]);
    }

    #[test]
    fn test_create_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (mut log, path) = MissionLog::create(dir.path(), 1, 3).unwrap();
        log.record(1_000, p(1, 0), p(1, 10)).unwrap();
        assert_eq!(log.rows(), 2);

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("log_mission_"));
        assert!(name.ends_with(".txt"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("% Start mission 1 end mission 3"));
        assert!(text.ends_with("1.000 1 10\n"));
    }
}
