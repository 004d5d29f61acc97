use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

use super::{DetectionOutput, Detector};

/// Runs an external detector program with the image path appended to `args`
/// and reads a `DetectionOutput` JSON document from its stdout.
#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Detector for CommandDetector {
    fn detect(&self, image_path: &Path) -> Result<DetectionOutput> {
        info!("detector: running {} on {}", self.program, image_path.display());
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(image_path)
            .output()
            .with_context(|| {
                format!("failed to run detector '{}' (is it installed?)", self.program)
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("detector '{}' failed: {}", self.program, stderr.trim()));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        DetectionOutput::parse(stdout.trim())
            .with_context(|| format!("detector '{}' returned invalid output", self.program))
    }
}

#[derive(Debug, Clone)]
pub struct FileDetector {
    path: PathBuf,
}

impl FileDetector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Detector for FileDetector {
    fn detect(&self, image_path: &Path) -> Result<DetectionOutput> {
        info!(
            "detector: replaying {} for {}",
            self.path.display(),
            image_path.display()
        );
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read detections: {}", self.path.display()))?;
        DetectionOutput::parse(&content)
            .with_context(|| format!("failed to parse detections: {}", self.path.display()))
    }
}
