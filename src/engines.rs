use async_trait::async_trait;
use diffuzz_core::{Engine, EngineSink, Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::config::{CaptureStream, EngineSpec};

/// Runs an external program once per test: `PROGRAM [ARGS..] <artifact>`,
/// streaming the captured output into the engine sink.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    capture: CaptureStream,
}

impl CommandEngine {
    pub fn new(spec: EngineSpec, capture: CaptureStream) -> Self {
        Self {
            name: spec.name,
            program: spec.program,
            args: spec.args,
            capture,
        }
    }
}

#[async_trait]
impl Engine for CommandEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, artifact: &Path, sink: EngineSink<'_>) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(artifact)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        match self.capture {
            CaptureStream::Stdout => cmd.stdout(Stdio::piped()).stderr(Stdio::null()),
            CaptureStream::Stderr => cmd.stdout(Stdio::null()).stderr(Stdio::piped()),
        };

        trace!(engine = %self.name, "Executing command: {:?}", cmd);
        let mut child = cmd.spawn().map_err(|e| {
            Error::engine(
                &self.name,
                format!("failed to spawn '{}': {}", self.program.display(), e),
            )
        })?;

        match self.capture {
            CaptureStream::Stdout => {
                if let Some(mut stdout) = child.stdout.take() {
                    tokio::io::copy(&mut stdout, &mut *sink).await?;
                }
            }
            CaptureStream::Stderr => {
                if let Some(mut stderr) = child.stderr.take() {
                    tokio::io::copy(&mut stderr, &mut *sink).await?;
                }
            }
        }
        sink.flush().await?;

        let status = child.wait().await?;
        if !status.success() {
            debug!(
                engine = %self.name,
                artifact = %artifact.display(),
                %status,
                "Engine exited unsuccessfully"
            );
        }
        Ok(())
    }
}

/// Build engines in the order given; engine[0] is the reference engine.
pub fn build_engines(specs: Vec<EngineSpec>, capture: CaptureStream) -> Vec<Arc<dyn Engine>> {
    specs
        .into_iter()
        .map(|spec| Arc::new(CommandEngine::new(spec, capture)) as Arc<dyn Engine>)
        .collect()
}
