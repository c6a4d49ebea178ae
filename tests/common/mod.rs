//! Shared fixtures for the pipeline test suite: in-process engines and
//! generators plus a scratch layout under a temporary directory.

#![allow(dead_code)]

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

use diffuzz_core::{ComparisonTopology, Engine, EngineSink, FuzzConfig, Result, TestGenerator};

/// Directories for one run, removed on drop
pub struct TestLayout {
    _root: TempDir,
    pub output_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub counter_file: PathBuf,
}

impl TestLayout {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let output_dir = root.path().join("out");
        let scratch_dir = root.path().join("scratch");
        let counter_file = root.path().join(".fuzzcounter");
        Self {
            _root: root,
            output_dir,
            scratch_dir,
            counter_file,
        }
    }

    pub fn config(&self, parallelism: usize) -> FuzzConfig {
        FuzzConfig {
            output_dir: self.output_dir.clone(),
            scratch_dir: self.scratch_dir.clone(),
            label: "test".to_string(),
            parallelism,
            queue_capacity: 4,
            cleanup_capacity: 4,
            report_interval: Duration::from_millis(50),
            counter_file: self.counter_file.clone(),
            topology: ComparisonTopology::Star,
            max_tests: None,
        }
    }

    /// Test artifacts currently on disk, sorted by name
    pub fn artifacts(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.output_dir) else {
            return Vec::new();
        };
        let mut artifacts: Vec<PathBuf> = entries
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        artifacts.sort();
        artifacts
    }
}

#[derive(Debug, Serialize)]
pub struct SimpleTest {
    pub name: String,
    pub payload: String,
}

/// Generator whose tests carry their own name as payload
pub struct NamedTestGenerator;

impl TestGenerator for NamedTestGenerator {
    type Test = SimpleTest;

    fn generate(&self, name: &str) -> Result<Self::Test> {
        Ok(SimpleTest {
            name: name.to_string(),
            payload: format!("payload for {}", name),
        })
    }
}

/// Generator that produces `healthy` tests in total, then fails every call
pub struct FailingGenerator {
    healthy: u64,
    produced: AtomicU64,
}

impl FailingGenerator {
    pub fn new(healthy: u64) -> Self {
        Self {
            healthy,
            produced: AtomicU64::new(0),
        }
    }
}

impl TestGenerator for FailingGenerator {
    type Test = SimpleTest;

    fn generate(&self, name: &str) -> Result<Self::Test> {
        if self.produced.fetch_add(1, Ordering::SeqCst) >= self.healthy {
            return Err(std::io::Error::other("generator out of entropy").into());
        }
        NamedTestGenerator.generate(name)
    }
}

/// Engine that writes the artifact contents as its output
pub struct EchoEngine {
    name: String,
    runs: Arc<AtomicU64>,
}

impl EchoEngine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            runs: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn runs(&self) -> Arc<AtomicU64> {
        self.runs.clone()
    }
}

#[async_trait]
impl Engine for EchoEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, artifact: &Path, sink: EngineSink<'_>) -> Result<()> {
        let content = tokio::fs::read(artifact).await?;
        sink.write_all(&content).await?;
        sink.write_all(b"{\"step\":1}\n{\"step\":2}\n").await?;
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Echo engine that appends an extra line for artifacts whose file name
/// starts with `prefix`
pub struct DivergingEngine {
    inner: EchoEngine,
    prefix: String,
}

impl DivergingEngine {
    pub fn new(name: &str, prefix: &str) -> Self {
        Self {
            inner: EchoEngine::new(name),
            prefix: prefix.to_string(),
        }
    }
}

#[async_trait]
impl Engine for DivergingEngine {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(&self, artifact: &Path, sink: EngineSink<'_>) -> Result<()> {
        self.inner.run(artifact, &mut *sink).await?;
        let diverges = artifact
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(&self.prefix));
        if diverges {
            sink.write_all(b"{\"extra\":true}\n").await?;
        }
        Ok(())
    }
}

/// Echo engine that holds every run until the gate opens
pub struct GatedEngine {
    inner: EchoEngine,
    gate: Arc<AtomicBool>,
}

impl GatedEngine {
    pub fn new(name: &str, gate: Arc<AtomicBool>) -> Self {
        Self {
            inner: EchoEngine::new(name),
            gate,
        }
    }
}

#[async_trait]
impl Engine for GatedEngine {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(&self, artifact: &Path, sink: EngineSink<'_>) -> Result<()> {
        while !self.gate.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.inner.run(artifact, sink).await
    }
}

/// Resolve once `counter` reaches `target`
pub async fn reached(counter: Arc<AtomicU64>, target: u64) {
    while counter.load(Ordering::SeqCst) < target {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
