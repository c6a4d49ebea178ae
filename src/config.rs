use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Which output stream of an engine process is compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum CaptureStream {
    #[default]
    Stdout,
    Stderr,
}

impl CaptureStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureStream::Stdout => "stdout",
            CaptureStream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for CaptureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine given on the command line as `NAME=PROGRAM [ARGS..]`.
/// The artifact path is appended as the final argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSpec {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl FromStr for EngineSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, command) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=PROGRAM [ARGS..], got '{}'", s))?;

        let name = name.trim();
        if name.is_empty() {
            return Err(format!("engine name missing in '{}'", s));
        }
        if !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(format!(
                "engine name '{}' can only contain alphanumeric characters, '-', '_' and '.'",
                name
            ));
        }

        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| format!("engine '{}' has no program", name))?;

        Ok(Self {
            name: name.to_string(),
            program: PathBuf::from(program),
            args: parts.map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for EngineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
