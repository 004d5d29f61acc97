use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::ReportError;
use crate::legend::{ColorMap, Rgb};

mod command;

pub use command::{CommandDetector, FileDetector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn from_xyxy(xyxy: [f32; 4]) -> Self {
        let [ax, ay, bx, by] = xyxy.map(|value| value as i32);
        Self {
            x1: ax.min(bx),
            y1: ay.min(by),
            x2: ax.max(bx),
            y2: ay.max(by),
        }
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub index: usize,
    pub class_id: usize,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_id: usize,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
    pub xyxy: [f32; 4],
}

fn full_confidence() -> f32 {
    1.0
}

/// Class table as emitted by the detector: either `{"0": "Caries"}` or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassNames {
    Map(BTreeMap<String, String>),
    List(Vec<String>),
}

impl ClassNames {
    pub fn get(&self, class_id: usize) -> Option<&str> {
        match self {
            ClassNames::Map(map) => map.get(&class_id.to_string()).map(String::as_str),
            ClassNames::List(list) => list.get(class_id).map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutput {
    pub names: ClassNames,
    #[serde(default)]
    pub boxes: Vec<RawDetection>,
}

impl DetectionOutput {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| ReportError::MalformedDetections(err.to_string()).into())
    }
}

pub trait Detector {
    fn detect(&self, image_path: &Path) -> Result<DetectionOutput>;
}

#[derive(Debug, Clone)]
pub enum DetectorImpl {
    Command(CommandDetector),
    File(FileDetector),
}

impl Detector for DetectorImpl {
    fn detect(&self, image_path: &Path) -> Result<DetectionOutput> {
        match self {
            DetectorImpl::Command(detector) => detector.detect(image_path),
            DetectorImpl::File(detector) => detector.detect(image_path),
        }
    }
}

/// Drops boxes under `min_confidence`, names the rest and assigns colors.
/// Indices are dense and follow detector order.
pub fn resolve_detections(
    output: &DetectionOutput,
    colors: &ColorMap,
    min_confidence: f32,
) -> Result<Vec<Detection>> {
    let mut detections = Vec::with_capacity(output.boxes.len());
    for raw in &output.boxes {
        if raw.confidence < min_confidence {
            debug!(
                "detection: dropped class {} at confidence {:.3}",
                raw.class_id, raw.confidence
            );
            continue;
        }
        let class_name = output.names.get(raw.class_id).ok_or_else(|| {
            ReportError::MalformedDetections(format!(
                "class id {} missing from class table",
                raw.class_id
            ))
        })?;
        detections.push(Detection {
            index: detections.len(),
            class_id: raw.class_id,
            class_name: class_name.to_string(),
            confidence: raw.confidence,
            bbox: BoundingBox::from_xyxy(raw.xyxy),
            color: colors.color_for(class_name),
        });
    }
    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "names": {"0": "Caries", "1": "Deep Caries", "2": "Impacted", "3": "Periapical Lesion"},
        "boxes": [
            {"class_id": 2, "confidence": 0.91, "xyxy": [10.7, 20.2, 60.9, 90.5]},
            {"class_id": 0, "confidence": 0.12, "xyxy": [5.0, 5.0, 9.0, 9.0]},
            {"class_id": 3, "confidence": 0.55, "xyxy": [120.0, 40.0, 100.0, 10.0]}
        ]
    }"#;

    #[test]
    fn resolves_names_colors_and_dense_indices() {
        let output = DetectionOutput::parse(SAMPLE).unwrap();
        let detections = resolve_detections(&output, &ColorMap::default(), 0.25).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].index, 0);
        assert_eq!(detections[0].class_name, "Impacted");
        assert_eq!(detections[0].color, Rgb::new(0, 0, 255));
        assert_eq!(
            detections[0].bbox,
            BoundingBox {
                x1: 10,
                y1: 20,
                x2: 60,
                y2: 90
            }
        );
        assert_eq!(detections[1].index, 1);
        assert_eq!(detections[1].class_name, "Periapical Lesion");
        assert_eq!(detections[1].bbox.x1, 100);
        assert_eq!(detections[1].bbox.y2, 40);
    }

    #[test]
    fn accepts_list_class_table_and_default_confidence() {
        let output = DetectionOutput::parse(
            r#"{"names": ["Caries", "Crown"], "boxes": [{"class_id": 1, "xyxy": [0, 0, 4, 4]}]}"#,
        )
        .unwrap();
        let detections = resolve_detections(&output, &ColorMap::default(), 0.25).unwrap();
        assert_eq!(detections[0].class_name, "Crown");
        assert_eq!(detections[0].confidence, 1.0);
        assert_eq!(detections[0].color, Rgb::WHITE);
    }

    #[test]
    fn unknown_class_id_is_malformed() {
        let output = DetectionOutput::parse(
            r#"{"names": ["Caries"], "boxes": [{"class_id": 7, "xyxy": [0, 0, 4, 4]}]}"#,
        )
        .unwrap();
        let err = resolve_detections(&output, &ColorMap::default(), 0.0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReportError>(),
            Some(ReportError::MalformedDetections(_))
        ));
    }

    #[test]
    fn empty_box_list_is_valid() {
        let output = DetectionOutput::parse(r#"{"names": []}"#).unwrap();
        let detections = resolve_detections(&output, &ColorMap::default(), 0.25).unwrap();
        assert!(detections.is_empty());
    }
}
