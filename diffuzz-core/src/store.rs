//! On-disk storage of generated tests

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::trace;

use crate::Result;

/// Standardized test name: "{sequence:08}-{label}-{worker}"
pub fn test_name(sequence: u64, label: &str, worker: usize) -> String {
    format!("{:08}-{}-{}", sequence, label, worker)
}

/// Writes test artifacts as JSON files into one output directory
#[derive(Debug, Clone)]
pub struct TestStore {
    output_dir: PathBuf,
}

impl TestStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Path the artifact for `name` is written to
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.json", name))
    }

    /// Serialize `test` to `{output_dir}/{name}.json`, replacing any previous
    /// file of that name, and return the path.
    pub fn store<T: Serialize + ?Sized>(&self, test: &T, name: &str) -> Result<PathBuf> {
        let path = self.artifact_path(name);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, test)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        trace!(artifact = %path.display(), "Stored test artifact");
        Ok(path)
    }
}
