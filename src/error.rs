use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("image not found: {}", path.display())]
    ImageNotFound { path: PathBuf },
    #[error("classifier head has {saved} outputs but {current} classes were found")]
    HeadClassMismatch { saved: usize, current: usize },
    #[error("backbone produced {backbone} features but the classifier head expects {head}")]
    FeatureDimMismatch { backbone: usize, head: usize },
    #[error("malformed detector output: {0}")]
    MalformedDetections(String),
}
