//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the engine-backed converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Path to the `ebook-convert` binary.
    #[serde(default = "default_engine_path")]
    pub engine_path: PathBuf,

    /// Directory under which per-job workspaces are created.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Timeout for a single conversion job in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Leftover workspaces older than this are removed at start-up.
    #[serde(default = "default_stale_workspace")]
    pub stale_workspace_secs: u64,

    /// Paper size passed to the engine for PDF output.
    #[serde(default = "default_paper_size")]
    pub pdf_paper_size: String,

    /// Flags added to every invocation, before request-level extras.
    #[serde(default)]
    pub extra_engine_args: Vec<String>,
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("ebook-convert")
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("inkpress")
}

fn default_timeout() -> u64 {
    600 // 10 minutes
}

fn default_stale_workspace() -> u64 {
    86_400 // 1 day
}

fn default_paper_size() -> String {
    "a4".to_string()
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            engine_path: default_engine_path(),
            workspace_root: default_workspace_root(),
            timeout_secs: default_timeout(),
            stale_workspace_secs: default_stale_workspace(),
            pdf_paper_size: default_paper_size(),
            extra_engine_args: Vec::new(),
        }
    }
}

impl ConverterConfig {
    /// Creates a new config with a custom engine path.
    pub fn with_engine_path(engine_path: impl Into<PathBuf>) -> Self {
        Self {
            engine_path: engine_path.into(),
            ..Default::default()
        }
    }

    /// Sets the workspace root.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the PDF paper size.
    pub fn with_paper_size(mut self, paper_size: impl Into<String>) -> Self {
        self.pdf_paper_size = paper_size.into();
        self
    }

    /// Sets flags added to every invocation.
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_engine_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn stale_workspace_age(&self) -> Duration {
        Duration::from_secs(self.stale_workspace_secs)
    }
}
