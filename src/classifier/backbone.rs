use anyhow::{Context, Result, anyhow};
use std::process::Command;

use super::{Backbone, ImageTensor};

/// Average intensity per channel over a `grid` x `grid` partition of the
/// tensor. Feature length is `3 * grid * grid`.
#[derive(Debug, Clone)]
pub struct PooledBackbone {
    grid: usize,
}

impl PooledBackbone {
    pub fn new(grid: usize) -> Self {
        Self { grid: grid.max(1) }
    }
}

impl Backbone for PooledBackbone {
    fn feature_dim(&self) -> Option<usize> {
        Some(3 * self.grid * self.grid)
    }

    fn features(&self, tensor: &ImageTensor) -> Result<Vec<f32>> {
        if tensor.height < self.grid || tensor.width < self.grid {
            return Err(anyhow!(
                "tensor {}x{} is smaller than the {} pooling grid",
                tensor.width,
                tensor.height,
                self.grid
            ));
        }
        let mut features = Vec::with_capacity(tensor.channels * self.grid * self.grid);
        for channel in 0..tensor.channels {
            for gy in 0..self.grid {
                let y0 = gy * tensor.height / self.grid;
                let y1 = (gy + 1) * tensor.height / self.grid;
                for gx in 0..self.grid {
                    let x0 = gx * tensor.width / self.grid;
                    let x1 = (gx + 1) * tensor.width / self.grid;
                    let mut sum = 0.0f32;
                    for y in y0..y1 {
                        for x in x0..x1 {
                            sum += tensor.at(channel, y, x);
                        }
                    }
                    let count = ((y1 - y0) * (x1 - x0)).max(1) as f32;
                    features.push(sum / count);
                }
            }
        }
        Ok(features)
    }
}

#[derive(Debug, Clone)]
pub struct CommandBackbone {
    program: String,
    args: Vec<String>,
}

impl CommandBackbone {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Backbone for CommandBackbone {
    fn feature_dim(&self) -> Option<usize> {
        None
    }

    fn features(&self, tensor: &ImageTensor) -> Result<Vec<f32>> {
        let tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .with_context(|| "failed to create temp file for backbone input")?;
        tensor
            .to_rgb_image()
            .save_with_format(tmp.path(), image::ImageFormat::Png)
            .with_context(|| "failed to write backbone input image")?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(tmp.path())
            .output()
            .with_context(|| {
                format!("failed to run backbone '{}' (is it installed?)", self.program)
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("backbone '{}' failed: {}", self.program, stderr.trim()));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(stdout.trim())
            .with_context(|| format!("backbone '{}' did not print a float array", self.program))
    }
}
