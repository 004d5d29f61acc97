use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use time::Date;
use time::format_description;

use crate::annotate::CropFile;
use crate::detection::Detection;

pub const UNKNOWN_POSITION: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropRecord {
    pub detection_index: usize,
    pub filename: String,
    pub predicted_position: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub tooth_id: usize,
    pub position: String,
    pub issue: String,
    pub date: String,
}

pub fn crop_records(crops: &[CropFile], predictions: &BTreeMap<String, String>) -> Vec<CropRecord> {
    crops
        .iter()
        .map(|crop| CropRecord {
            detection_index: crop.detection_index,
            filename: crop.filename.clone(),
            predicted_position: predictions.get(&crop.filename).cloned(),
        })
        .collect()
}

pub fn assemble_rows(
    detections: &[Detection],
    records: &[CropRecord],
    date: Date,
) -> Result<Vec<ReportRow>> {
    let date = format_date(date)?;
    Ok(detections
        .iter()
        .map(|detection| {
            let position = records
                .iter()
                .find(|record| record.detection_index == detection.index)
                .and_then(|record| record.predicted_position.clone())
                .unwrap_or_else(|| UNKNOWN_POSITION.to_string());
            ReportRow {
                tooth_id: detection.index,
                position,
                issue: detection.class_name.clone(),
                date: date.clone(),
            }
        })
        .collect())
}

pub fn format_date(date: Date) -> Result<String> {
    let format =
        format_description::parse("[year]-[month]-[day]").with_context(|| "invalid date format")?;
    date.format(&format).with_context(|| "failed to format date")
}

/// Reads the index out of a crop name shaped `<prefix>_<index>_<class>.<ext>`.
/// Only for crop folders written by older runs; new rows carry the index.
pub fn tooth_id_from_filename(filename: &str) -> Option<usize> {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);
    let mut parts = stem.splitn(3, '_');
    let _prefix = parts.next()?;
    let index = parts.next()?;
    parts.next()?;
    index.parse().ok()
}

pub fn rows_table_text(rows: &[ReportRow]) -> String {
    rows.iter()
        .map(|row| {
            format!(
                "{} | {} | {} | {}",
                row.tooth_id, row.position, row.issue, row.date
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;
    use crate::legend::Rgb;
    use std::path::PathBuf;
    use time::Month;

    fn detection(index: usize, class_name: &str) -> Detection {
        Detection {
            index,
            class_id: 0,
            class_name: class_name.to_string(),
            confidence: 0.7,
            bbox: BoundingBox {
                x1: 0,
                y1: 0,
                x2: 10,
                y2: 10,
            },
            color: Rgb::WHITE,
        }
    }

    fn crop(index: usize, class_name: &str) -> CropFile {
        let filename = format!("yolo_{}_{}.png", index, class_name);
        CropFile {
            detection_index: index,
            path: PathBuf::from("crops").join(&filename),
            filename,
        }
    }

    fn date() -> Date {
        Date::from_calendar_date(2025, Month::March, 14).unwrap()
    }

    #[test]
    fn one_row_per_detection_with_issue_from_class() {
        let detections: Vec<Detection> = ["Caries", "Impacted", "Deep Caries"]
            .iter()
            .enumerate()
            .map(|(idx, name)| detection(idx, name))
            .collect();
        let crops: Vec<CropFile> = detections
            .iter()
            .map(|d| crop(d.index, &d.class_name))
            .collect();
        let mut predictions = BTreeMap::new();
        predictions.insert("yolo_0_Caries.png".to_string(), "Upper Left".to_string());
        predictions.insert("yolo_2_Deep Caries.png".to_string(), "Lower Right".to_string());
        predictions.insert("stale_9_Old.png".to_string(), "Upper Right".to_string());

        let records = crop_records(&crops, &predictions);
        let rows = assemble_rows(&detections, &records, date()).unwrap();

        assert_eq!(rows.len(), detections.len());
        for (row, detection) in rows.iter().zip(&detections) {
            assert_eq!(row.tooth_id, detection.index);
            assert_eq!(row.issue, detection.class_name);
        }
        insta::assert_snapshot!(rows_table_text(&rows), @r"
        0 | Upper Left | Caries | 2025-03-14
        1 | Unknown | Impacted | 2025-03-14
        2 | Lower Right | Deep Caries | 2025-03-14
        ");
    }

    #[test]
    fn no_detections_no_rows() {
        let rows = assemble_rows(&[], &[], date()).unwrap();
        assert!(rows.is_empty());
        assert_eq!(rows_table_text(&rows), "");
    }

    #[test]
    fn legacy_filename_parsing() {
        assert_eq!(tooth_id_from_filename("yolo_3_Caries.png"), Some(3));
        assert_eq!(tooth_id_from_filename("box_12_Periapical Lesion.jpg"), Some(12));
        assert_eq!(tooth_id_from_filename("yolo_x_Caries.png"), None);
        assert_eq!(tooth_id_from_filename("scan.png"), None);
        assert_eq!(tooth_id_from_filename("yolo_4.png"), None);
    }
}
