//! Pipeline configuration
//!
//! [`FuzzConfig`] carries every knob the pipeline reads at startup. It is
//! plain data: the binary fills it from command line flags, tests build it
//! directly and override what they need.
//!
//! ```rust
//! use diffuzz_core::config::{ComparisonTopology, FuzzConfig};
//!
//! let config = FuzzConfig {
//!     parallelism: 8,
//!     topology: ComparisonTopology::AllPairs,
//!     ..FuzzConfig::default()
//! };
//! config.validate().unwrap();
//! assert_eq!(config.generator_workers(), 4);
//! assert_eq!(config.execution_workers(), 4);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Default bound of the pending-tests queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default interval between progress reports
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Default location of the cumulative test counter
pub const DEFAULT_COUNTER_FILE: &str = ".fuzzcounter";

/// Which engine outputs get compared against each other
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComparisonTopology {
    /// engine[0] against every other engine
    #[default]
    Star,
    /// every engine against every other engine
    AllPairs,
}

impl ComparisonTopology {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonTopology::Star => "star",
            ComparisonTopology::AllPairs => "all-pairs",
        }
    }

    /// Index pairs to compare for `engines` engines, in comparison order
    pub fn pairs(&self, engines: usize) -> Vec<(usize, usize)> {
        match self {
            ComparisonTopology::Star => (1..engines).map(|i| (0, i)).collect(),
            ComparisonTopology::AllPairs => (0..engines)
                .flat_map(|a| (a + 1..engines).map(move |b| (a, b)))
                .collect(),
        }
    }
}

impl std::fmt::Display for ComparisonTopology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ComparisonTopology {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "star" => Ok(ComparisonTopology::Star),
            "all-pairs" | "allpairs" => Ok(ComparisonTopology::AllPairs),
            other => Err(Error::configuration(format!(
                "unknown comparison topology '{}', expected 'star' or 'all-pairs'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzConfig {
    /// Where test artifacts are written
    pub output_dir: PathBuf,
    /// Where per-worker engine output buffers live
    pub scratch_dir: PathBuf,
    /// Label embedded in every test name
    pub label: String,
    /// Total worker budget, split evenly between generation and execution
    pub parallelism: usize,
    pub queue_capacity: usize,
    pub cleanup_capacity: usize,
    pub report_interval: Duration,
    pub counter_file: PathBuf,
    pub topology: ComparisonTopology,
    /// Stop generating after this many tests; `None` runs until interrupted
    pub max_tests: Option<u64>,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir(),
            scratch_dir: PathBuf::from("."),
            label: "diffuzz".to_string(),
            parallelism: 2,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            cleanup_capacity: DEFAULT_QUEUE_CAPACITY,
            report_interval: DEFAULT_REPORT_INTERVAL,
            counter_file: PathBuf::from(DEFAULT_COUNTER_FILE),
            topology: ComparisonTopology::Star,
            max_tests: None,
        }
    }
}

impl FuzzConfig {
    pub fn validate(&self) -> Result<()> {
        if self.parallelism < 2 {
            return Err(Error::configuration(format!(
                "parallelism must be at least 2, got {}",
                self.parallelism
            )));
        }
        if self.queue_capacity == 0 {
            return Err(Error::configuration("queue capacity must be greater than 0"));
        }
        if self.cleanup_capacity == 0 {
            return Err(Error::configuration(
                "cleanup queue capacity must be greater than 0",
            ));
        }
        if self.report_interval.is_zero() {
            return Err(Error::configuration(
                "report interval must be greater than 0",
            ));
        }
        if self.label.trim().is_empty() {
            return Err(Error::configuration("label cannot be empty"));
        }
        if self.label.contains(['/', '\\']) {
            return Err(Error::configuration(format!(
                "label '{}' cannot contain path separators",
                self.label
            )));
        }
        Ok(())
    }

    pub fn generator_workers(&self) -> usize {
        (self.parallelism / 2).max(1)
    }

    pub fn execution_workers(&self) -> usize {
        (self.parallelism / 2).max(1)
    }
}
