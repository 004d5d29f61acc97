pub mod layout;
pub mod metrics;
mod pdf;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use time::Date;
use tracing::{debug, info, warn};

use crate::assemble::ReportRow;
use crate::legend::ColorMap;

pub use layout::{
    DrawOp, ImageSlot, LETTER, Layout, LayoutInput, PageSize, Section, SectionExtent, compose,
};
pub use pdf::{ImageSources, render_pdf};

const DOCUMENT_TITLE: &str = "Dental Health Report";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PatientInfo {
    pub name: String,
    pub sex: String,
    pub birthdate: String,
    pub dentist: String,
}

pub struct ReportRequest<'a> {
    pub rows: &'a [ReportRow],
    pub legend: &'a ColorMap,
    pub composite_path: Option<&'a Path>,
    pub logo_path: Option<&'a Path>,
    pub patient: &'a PatientInfo,
    pub report_date: Date,
    pub notice: Option<&'a str>,
}

pub fn generate_report(request: &ReportRequest<'_>, output: &Path) -> Result<Layout> {
    let composite = request.composite_path.filter(|path| {
        let exists = path.is_file();
        if !exists {
            warn!("report: annotated image missing, leaving it out: {}", path.display());
        }
        exists
    });
    let logo = request.logo_path.filter(|path| {
        let exists = path.is_file();
        if !exists {
            debug!("report: no logo at {}", path.display());
        }
        exists
    });

    let composite_size = composite.map(image_size).transpose()?;
    let logo_size = logo.map(image_size).transpose()?;

    let layout = compose(
        &LayoutInput {
            rows: request.rows,
            legend: request.legend,
            patient: request.patient,
            report_date: request.report_date,
            composite_size,
            logo_size,
            notice: request.notice,
        },
        LETTER,
    )?;

    let images = ImageSources::load(logo, composite)?;
    let bytes = render_pdf(&layout, &images, DOCUMENT_TITLE)?;
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create report directory: {}", parent.display()))?;
    }
    fs::write(output, bytes)
        .with_context(|| format!("failed to write report: {}", output.display()))?;
    info!(
        "report: {} rows, {} page(s) -> {}",
        request.rows.len(),
        layout.page_count,
        output.display()
    );
    Ok(layout)
}

fn image_size(path: &Path) -> Result<(u32, u32)> {
    image::image_dimensions(path)
        .with_context(|| format!("failed to read image size: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::write_xray;
    use tempfile::tempdir;
    use time::Month;

    fn rows(count: usize) -> Vec<ReportRow> {
        (0..count)
            .map(|idx| ReportRow {
                tooth_id: idx,
                position: "Lower Left".to_string(),
                issue: "Caries".to_string(),
                date: "2025-03-14".to_string(),
            })
            .collect()
    }

    #[test]
    fn writes_a_pdf_with_images() {
        let dir = tempdir().expect("tempdir");
        let composite = write_xray(dir.path(), "scan_20250314_093005.png", 320, 240);
        let logo = write_xray(dir.path(), "logo.png", 60, 30);
        let rows = rows(3);
        let legend = ColorMap::default();
        let patient = PatientInfo {
            name: "Jane Roe".to_string(),
            ..PatientInfo::default()
        };
        let output = dir.path().join("out").join("report.pdf");

        let layout = generate_report(
            &ReportRequest {
                rows: &rows,
                legend: &legend,
                composite_path: Some(&composite),
                logo_path: Some(&logo),
                patient: &patient,
                report_date: Date::from_calendar_date(2025, Month::March, 14).unwrap(),
                notice: None,
            },
            &output,
        )
        .unwrap();

        let bytes = fs::read(&output).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(layout.page_count, 1);
        let images = layout
            .ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Image { .. }))
            .count();
        assert_eq!(images, 2);
    }

    #[test]
    fn missing_images_are_left_out() {
        let dir = tempdir().expect("tempdir");
        let rows = rows(40);
        let legend = ColorMap::default();
        let patient = PatientInfo::default();
        let output = dir.path().join("report.pdf");
        let missing = dir.path().join("nope.png");

        let layout = generate_report(
            &ReportRequest {
                rows: &rows,
                legend: &legend,
                composite_path: Some(&missing),
                logo_path: Some(&missing),
                patient: &patient,
                report_date: Date::from_calendar_date(2025, Month::March, 14).unwrap(),
                notice: Some("positions are unreliable"),
            },
            &output,
        )
        .unwrap();

        assert!(output.is_file());
        assert!(layout.page_count > 1);
        assert!(!layout.ops.iter().any(|op| matches!(op, DrawOp::Image { .. })));
    }

    #[test]
    fn patient_fields_default_when_absent() {
        let patient: PatientInfo = toml::from_str("name = \"Ann\"").unwrap();
        assert_eq!(patient.name, "Ann");
        assert_eq!(patient.dentist, "");
    }
}
