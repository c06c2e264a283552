use std::path::Path;
use std::process::Stdio;

use log::debug;
use tempfile::TempPath;
use thiserror::Error;

/// Reserved transform name meaning "serve the source as-is".
pub const IDENTITY: &str = "none";

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Unknown transform: {0}")]
    UnknownTransform(String),

    #[error("Cannot create scratch file: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("Cannot run {0}: {1}")]
    Spawn(String, #[source] std::io::Error),

    #[error("{0} exited with {1}")]
    CommandFailed(String, std::process::ExitStatus),
}

/// Expand `{{width}}`/`{{height}}` placeholders and split every template on
/// whitespace, so a single template entry may yield several argument tokens.
pub fn build_args(templates: &[String], width: u32, height: u32) -> Vec<String> {
    let width = width.to_string();
    let height = height.to_string();
    templates
        .iter()
        .flat_map(|template| {
            template
                .replace("{{width}}", &width)
                .replace("{{height}}", &height)
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Runs the external image tool against a cached source file.
pub struct Invoker {
    bin: String,
}

impl Invoker {
    pub fn new(bin: &str) -> Self {
        Self {
            bin: bin.to_string(),
        }
    }

    /// Execute the tool with `args` followed by the source path and a fresh
    /// scratch output path. The returned [`TempPath`] unlinks the scratch
    /// file when dropped, on success and failure alike.
    pub async fn run(&self, args: &[String], source: &Path) -> Result<TempPath, TransformError> {
        let scratch = tempfile::Builder::new()
            .prefix("magickd-")
            .tempfile()
            .map_err(TransformError::Scratch)?
            .into_temp_path();

        debug!("Running {} {:?} on {}", self.bin, args, source.display());
        let status = tokio::process::Command::new(&self.bin)
            // keep the tool single-threaded; parallelism comes from requests
            .env("OMP_NUM_THREADS", "1")
            .args(args)
            .arg(source)
            .arg(scratch.as_os_str())
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| TransformError::Spawn(self.bin.clone(), e))?;

        if !status.success() {
            return Err(TransformError::CommandFailed(self.bin.clone(), status));
        }
        Ok(scratch)
    }
}
