//! Reusable engine output buffers
//!
//! Each execution worker opens one file per engine when it starts and keeps
//! it for its whole life. Between test cases the file is truncated and
//! rewound instead of reopened, so descriptor usage stays at
//! `engines x execution workers` for the entire run. The file is closed when
//! the buffer is dropped, on every exit path of the owning worker.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt, BufReader};

use crate::Result;

/// Standardized buffer file name: "{engine}-output-{worker}.jsonl"
pub fn buffer_file_name(engine: &str, worker: usize) -> String {
    format!("{}-output-{}.jsonl", engine, worker)
}

#[derive(Debug)]
pub struct OutputBuffer {
    engine: String,
    path: PathBuf,
    file: File,
}

impl OutputBuffer {
    /// Open (or create) the buffer for `engine` owned by `worker`.
    pub async fn open(dir: &Path, engine: &str, worker: usize) -> Result<Self> {
        let path = dir.join(buffer_file_name(engine, worker));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;
        Ok(Self {
            engine: engine.to_string(),
            path,
            file,
        })
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Empty the buffer and position it for the next engine run.
    pub async fn reset(&mut self) -> Result<()> {
        self.file.set_len(0).await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }

    /// Flush pending writes and move back to the start for reading.
    pub async fn rewind(&mut self) -> Result<()> {
        self.file.flush().await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }

    /// Sink the engine writes its output into
    pub fn sink(&mut self) -> &mut File {
        &mut self.file
    }

    /// Buffered reader over the current contents, starting at the current
    /// position. Call [`OutputBuffer::rewind`] first.
    pub fn reader(&mut self) -> BufReader<&mut File> {
        BufReader::new(&mut self.file)
    }
}
