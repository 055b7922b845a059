//! Run artifacts on disk.
//!
//! Each run writes a timestamp-qualified Playwright script and a JSON report
//! into one output directory:
//! - `<dir>/pdp-<YYYYmmdd_HHMMSS>.spec.ts`
//! - `<dir>/pdp-<YYYYmmdd_HHMMSS>.report.json`

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::runner::RunReport;

/// Prefix of every artifact name
const ARTIFACT_PREFIX: &str = "pdp";

pub type OutputResult<T> = Result<T, OutputError>;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize run report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Output directory for one run's artifacts
#[derive(Debug, Clone)]
pub struct OutputDir {
    pub dir: PathBuf,
    /// Run-qualified stem shared by every artifact
    pub stem: String,
}

impl OutputDir {
    /// Artifacts named after the current time
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::at(dir, Utc::now())
    }

    /// Artifacts named after `timestamp`
    pub fn at(dir: impl Into<PathBuf>, timestamp: DateTime<Utc>) -> Self {
        Self {
            dir: dir.into(),
            stem: format!("{}-{}", ARTIFACT_PREFIX, timestamp.format("%Y%m%d_%H%M%S")),
        }
    }

    pub fn script_path(&self) -> PathBuf {
        self.dir.join(format!("{}.spec.ts", self.stem))
    }

    pub fn report_path(&self) -> PathBuf {
        self.dir.join(format!("{}.report.json", self.stem))
    }

    /// Create the directory if needed
    pub fn init(&self) -> OutputResult<()> {
        fs::create_dir_all(&self.dir).map_err(|source| OutputError::Write {
            path: self.dir.clone(),
            source,
        })
    }

    pub fn write_script(&self, script: &str) -> OutputResult<PathBuf> {
        let path = self.script_path();
        write_file(&path, script.as_bytes())?;
        info!(path = %path.display(), "wrote generated script");
        Ok(path)
    }

    pub fn write_report(&self, report: &RunReport) -> OutputResult<PathBuf> {
        let path = self.report_path();
        let json = serde_json::to_string_pretty(report)?;
        write_file(&path, json.as_bytes())?;
        info!(path = %path.display(), "wrote run report");
        Ok(path)
    }
}

fn write_file(path: &Path, contents: &[u8]) -> OutputResult<()> {
    fs::write(path, contents).map_err(|source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_artifact_names() {
        let out = OutputDir::at("generated-tests", fixed());
        assert_eq!(out.script_path(), PathBuf::from("generated-tests/pdp-20240309_140507.spec.ts"));
        assert_eq!(out.report_path(), PathBuf::from("generated-tests/pdp-20240309_140507.report.json"));
    }

    #[test]
    fn test_write_script_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let out = OutputDir::at(tmp.path().join("nested"), fixed());
        out.init().unwrap();
        let path = out.write_script("import { test } from '@playwright/test';\n").unwrap();
        let written = fs::read_to_string(path).unwrap();
        assert!(written.starts_with("import"));
    }
}
