use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadWeights {
    pub weight: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

impl HeadWeights {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read classifier weights: {}", path.display()))?;
        let weights: HeadWeights = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse classifier weights: {}", path.display()))?;
        weights
            .validate()
            .with_context(|| format!("invalid classifier weights: {}", path.display()))?;
        Ok(weights)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write classifier weights: {}", path.display()))
    }

    pub fn out_features(&self) -> usize {
        self.weight.len()
    }

    pub fn in_features(&self) -> usize {
        self.weight.first().map(Vec::len).unwrap_or(0)
    }

    fn validate(&self) -> Result<()> {
        if self.weight.is_empty() {
            return Err(anyhow!("weight matrix is empty"));
        }
        let width = self.in_features();
        if width == 0 {
            return Err(anyhow!("weight rows are empty"));
        }
        if let Some(row) = self.weight.iter().position(|row| row.len() != width) {
            return Err(anyhow!(
                "weight row {} has {} columns, expected {}",
                row,
                self.weight[row].len(),
                width
            ));
        }
        if self.bias.len() != self.weight.len() {
            return Err(anyhow!(
                "bias has {} entries, expected {}",
                self.bias.len(),
                self.weight.len()
            ));
        }
        Ok(())
    }

    /// Deterministic uniform init in `[-1/sqrt(in), 1/sqrt(in)]`, the range a
    /// freshly constructed linear layer starts from.
    pub fn fresh(out_features: usize, in_features: usize) -> Self {
        let bound = 1.0 / (in_features.max(1) as f32).sqrt();
        let sample = |name: &str, row: usize, col: usize| {
            let digest = md5::compute(format!(
                "{}:{}x{}:{}:{}",
                name, out_features, in_features, row, col
            ));
            let bits = u32::from_le_bytes([digest.0[0], digest.0[1], digest.0[2], digest.0[3]]);
            let unit = bits as f32 / u32::MAX as f32;
            bound * (2.0 * unit - 1.0)
        };
        let weight = (0..out_features)
            .map(|row| (0..in_features).map(|col| sample("weight", row, col)).collect())
            .collect();
        let bias = (0..out_features).map(|row| sample("bias", row, 0)).collect();
        Self { weight, bias }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadMismatchPolicy {
    #[default]
    Reinitialize,
    Fail,
}

impl HeadMismatchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeadMismatchPolicy::Reinitialize => "reinitialize",
            HeadMismatchPolicy::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadStatus {
    Loaded,
    Reinitialized { saved: usize, current: usize },
}

impl HeadStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, HeadStatus::Reinitialized { .. })
    }

    pub fn notice(&self) -> Option<String> {
        match self {
            HeadStatus::Loaded => None,
            HeadStatus::Reinitialized { saved, current } => Some(format!(
                "Position classifier final layer was reinitialized ({} saved classes vs {} current); positions are unreliable.",
                saved, current
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinearHead {
    weights: HeadWeights,
}

impl LinearHead {
    pub fn new(weights: HeadWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &HeadWeights {
        &self.weights
    }

    pub fn forward(&self, features: &[f32]) -> Vec<f32> {
        self.weights
            .weight
            .iter()
            .zip(&self.weights.bias)
            .map(|(row, bias)| {
                row.iter()
                    .zip(features)
                    .map(|(weight, value)| weight * value)
                    .sum::<f32>()
                    + bias
            })
            .collect()
    }

    pub fn predict(&self, features: &[f32]) -> Option<usize> {
        let logits = self.forward(features);
        let mut best: Option<(usize, f32)> = None;
        for (idx, value) in logits.into_iter().enumerate() {
            let is_better = best.map(|(_, current)| value > current).unwrap_or(true);
            if is_better {
                best = Some((idx, value));
            }
        }
        best.map(|(idx, _)| idx)
    }
}
