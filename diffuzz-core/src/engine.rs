//! Collaborator traits: test generators and execution engines

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncWrite;

use crate::Result;

/// Writable sink an engine streams its raw output into
pub type EngineSink<'a> = &'a mut (dyn AsyncWrite + Send + Unpin);

/// Produces randomized test cases.
///
/// Called concurrently from every generator worker, so implementations must
/// not rely on shared mutable state.
pub trait TestGenerator: Send + Sync + 'static {
    type Test: Serialize + Send + 'static;

    /// Produce one test case. `name` is the unique name the test is stored
    /// under and may be embedded in the test itself.
    fn generate(&self, name: &str) -> Result<Self::Test>;
}

/// One implementation of the computation under test.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Human readable name, also used in output buffer file names
    fn name(&self) -> &str;

    /// Execute the artifact at `artifact` and write the raw output to `sink`.
    ///
    /// Failures are reported but carry no special meaning to the pipeline:
    /// whatever reached the sink is compared like any other output.
    async fn run(&self, artifact: &Path, sink: EngineSink<'_>) -> Result<()>;
}
