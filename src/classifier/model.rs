use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use super::head::{HeadMismatchPolicy, HeadStatus, HeadWeights, LinearHead};
use super::{Backbone, ImageTensor};
use crate::error::ReportError;
use crate::paths;

pub struct PositionModel<B: Backbone> {
    classes: Vec<String>,
    backbone: B,
    head: LinearHead,
    status: HeadStatus,
}

impl<B: Backbone> PositionModel<B> {
    pub fn new(classes: Vec<String>, backbone: B, head: LinearHead, status: HeadStatus) -> Self {
        Self {
            classes,
            backbone,
            head,
            status,
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn status(&self) -> HeadStatus {
        self.status
    }

    pub fn head(&self) -> &LinearHead {
        &self.head
    }

    pub fn predict_tensor(&self, tensor: &ImageTensor) -> Result<String> {
        let features = self.backbone.features(tensor)?;
        let expected = self.head.weights().in_features();
        if features.len() != expected {
            return Err(ReportError::FeatureDimMismatch {
                backbone: features.len(),
                head: expected,
            }
            .into());
        }
        let idx = self
            .head
            .predict(&features)
            .ok_or_else(|| anyhow!("classifier head produced no logits"))?;
        self.classes
            .get(idx)
            .cloned()
            .ok_or_else(|| anyhow!("predicted class index {} out of range", idx))
    }

    pub fn predict_image(&self, path: &Path) -> Result<String> {
        let image = image::open(path).with_context(|| {
            format!("failed to open image for classification: {}", path.display())
        })?;
        self.predict_tensor(&ImageTensor::from_image(&image))
    }
}

/// Class labels are the sorted names of the immediate subdirectories of the
/// training image directory.
pub fn discover_classes(train_dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(train_dir)
        .with_context(|| format!("failed to list training directory: {}", train_dir.display()))?;
    let mut classes = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read entry in {}", train_dir.display()))?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                classes.push(name.to_string());
            }
        }
    }
    classes.sort();
    if classes.is_empty() {
        return Err(anyhow!(
            "no class folders found in training directory: {}",
            train_dir.display()
        ));
    }
    Ok(classes)
}

pub fn load_position_model<B: Backbone>(
    weights_path: &Path,
    train_dir: &Path,
    backbone: B,
    policy: HeadMismatchPolicy,
) -> Result<PositionModel<B>> {
    let classes = discover_classes(train_dir)?;
    let saved = HeadWeights::load(weights_path)?;

    if let Some(dim) = backbone.feature_dim() {
        if dim != saved.in_features() {
            return Err(ReportError::FeatureDimMismatch {
                backbone: dim,
                head: saved.in_features(),
            }
            .into());
        }
    }

    let current = classes.len();
    let (weights, status) = if saved.out_features() == current {
        (saved, HeadStatus::Loaded)
    } else {
        match policy {
            HeadMismatchPolicy::Fail => {
                return Err(ReportError::HeadClassMismatch {
                    saved: saved.out_features(),
                    current,
                }
                .into());
            }
            HeadMismatchPolicy::Reinitialize => {
                warn!(
                    "classifier: saved head has {} classes but {} were found in {}; final layer reinitialized",
                    saved.out_features(),
                    current,
                    train_dir.display()
                );
                let status = HeadStatus::Reinitialized {
                    saved: saved.out_features(),
                    current,
                };
                (HeadWeights::fresh(current, saved.in_features()), status)
            }
        }
    };

    info!(
        "classifier: {} classes, head {}x{}",
        current,
        weights.out_features(),
        weights.in_features()
    );
    Ok(PositionModel::new(
        classes,
        backbone,
        LinearHead::new(weights),
        status,
    ))
}

pub fn classify_folder<B: Backbone>(
    model: &PositionModel<B>,
    dir: &Path,
) -> Result<BTreeMap<String, String>> {
    let matcher = paths::image_matcher()?;
    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("failed to list image folder: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .collect();
    entries.sort_by_key(|entry| entry.path());

    let mut predictions = BTreeMap::new();
    for entry in entries {
        let path = entry.path();
        let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !path.is_file() || !matcher.is_match(filename) {
            debug!("classifier: skipping {}", path.display());
            continue;
        }
        let label = model.predict_image(&path)?;
        info!("classifier: {} -> {}", filename, label);
        predictions.insert(filename.to_string(), label);
    }
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::PooledBackbone;
    use crate::test_util::{write_train_dir, write_xray};
    use tempfile::tempdir;

    const CLASSES: [&str; 4] = ["Lower Left", "Lower Right", "Upper Left", "Upper Right"];

    #[test]
    fn classes_are_sorted_folder_names() {
        let dir = tempdir().expect("tempdir");
        let train = write_train_dir(dir.path(), &["Upper Right", "Lower Left", "Upper Left"]);
        fs::write(train.join("README.txt"), "not a class").expect("write file");
        let classes = discover_classes(&train).unwrap();
        assert_eq!(classes, vec!["Lower Left", "Upper Left", "Upper Right"]);
    }

    #[test]
    fn matching_head_is_loaded_as_is() {
        let dir = tempdir().expect("tempdir");
        let train = write_train_dir(dir.path(), &CLASSES);
        let weights = HeadWeights::fresh(4, 12);
        let path = dir.path().join("head.json");
        weights.save(&path).unwrap();

        let model = load_position_model(
            &path,
            &train,
            PooledBackbone::new(2),
            HeadMismatchPolicy::Reinitialize,
        )
        .unwrap();
        assert_eq!(model.status(), HeadStatus::Loaded);
        assert_eq!(model.head().weights(), &weights);
    }

    #[test]
    fn class_count_mismatch_replaces_only_the_head() {
        let dir = tempdir().expect("tempdir");
        let train = write_train_dir(dir.path(), &CLASSES);
        let path = dir.path().join("head.json");
        HeadWeights::fresh(2, 12).save(&path).unwrap();

        let model = load_position_model(
            &path,
            &train,
            PooledBackbone::new(2),
            HeadMismatchPolicy::Reinitialize,
        )
        .unwrap();
        assert_eq!(
            model.status(),
            HeadStatus::Reinitialized {
                saved: 2,
                current: 4
            }
        );
        assert!(model.status().notice().is_some());
        assert_eq!(model.head().weights().out_features(), 4);
        assert_eq!(model.head().weights().in_features(), 12);
        assert_eq!(model.head().weights(), &HeadWeights::fresh(4, 12));

        let image = write_xray(dir.path(), "crop.png", 16, 16);
        let label = model.predict_image(&image).unwrap();
        assert!(CLASSES.contains(&label.as_str()));
    }

    #[test]
    fn class_count_mismatch_fails_under_fail_policy() {
        let dir = tempdir().expect("tempdir");
        let train = write_train_dir(dir.path(), &CLASSES);
        let path = dir.path().join("head.json");
        HeadWeights::fresh(2, 12).save(&path).unwrap();

        let err = load_position_model(
            &path,
            &train,
            PooledBackbone::new(2),
            HeadMismatchPolicy::Fail,
        )
        .err()
        .expect("mismatch must fail");
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::HeadClassMismatch {
                saved: 2,
                current: 4
            })
        ));
    }

    #[test]
    fn feature_dim_mismatch_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let train = write_train_dir(dir.path(), &CLASSES);
        let path = dir.path().join("head.json");
        HeadWeights::fresh(4, 10).save(&path).unwrap();

        let err = load_position_model(
            &path,
            &train,
            PooledBackbone::new(2),
            HeadMismatchPolicy::Reinitialize,
        )
        .err()
        .expect("dimension mismatch must fail");
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::FeatureDimMismatch {
                backbone: 12,
                head: 10
            })
        ));
    }

    #[test]
    fn folder_scan_skips_unsupported_files() {
        let dir = tempdir().expect("tempdir");
        let train = write_train_dir(dir.path(), &CLASSES);
        let path = dir.path().join("head.json");
        HeadWeights::fresh(4, 12).save(&path).unwrap();
        let model = load_position_model(
            &path,
            &train,
            PooledBackbone::new(2),
            HeadMismatchPolicy::Reinitialize,
        )
        .unwrap();

        let crops = dir.path().join("crops");
        fs::create_dir_all(&crops).unwrap();
        write_xray(&crops, "yolo_0_Caries.png", 20, 20);
        write_xray(&crops, "yolo_1_Impacted.PNG", 20, 20);
        fs::write(crops.join("notes.txt"), "skip me").unwrap();
        fs::write(crops.join("scan.gif"), "skip me too").unwrap();

        let predictions = classify_folder(&model, &crops).unwrap();
        let keys: Vec<&str> = predictions.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["yolo_0_Caries.png", "yolo_1_Impacted.PNG"]);
    }
}
