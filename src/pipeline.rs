use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::info;

use crate::annotate::{self, AnnotatedSet};
use crate::assemble::{self, CropRecord, ReportRow};
use crate::classifier::{
    self, Backbone, BackboneImpl, CommandBackbone, HeadStatus, PooledBackbone, PositionModel,
};
use crate::detection::{self, CommandDetector, Detection, Detector, DetectorImpl, FileDetector};
use crate::error::ReportError;
use crate::report::{self, PatientInfo, ReportRequest};
use crate::settings::{BackboneKind, DetectorKind, Settings};

#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub detections: Vec<Detection>,
    pub annotated: AnnotatedSet,
    pub records: Vec<CropRecord>,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub diagnosis: Diagnosis,
    pub pdf_path: PathBuf,
    pub pages: usize,
    pub head_status: HeadStatus,
}

pub struct Pipeline<D: Detector, B: Backbone> {
    detector: D,
    model: PositionModel<B>,
    settings: Settings,
}

impl<D: Detector, B: Backbone> Pipeline<D, B> {
    pub fn new(detector: D, model: PositionModel<B>, settings: Settings) -> Self {
        Self {
            detector,
            model,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn model(&self) -> &PositionModel<B> {
        &self.model
    }

    pub fn diagnose(&self, image_path: &Path, now: OffsetDateTime) -> Result<Diagnosis> {
        if !image_path.is_file() {
            return Err(ReportError::ImageNotFound {
                path: image_path.to_path_buf(),
            }
            .into());
        }

        let output = self.detector.detect(image_path)?;
        let detections = detection::resolve_detections(
            &output,
            &self.settings.legend,
            self.settings.detector.min_confidence,
        )?;
        info!(
            "pipeline: {} detection(s) in {}",
            detections.len(),
            image_path.display()
        );

        let annotated = annotate::render_crops(
            image_path,
            &detections,
            &self.settings.annotate_options(),
            now,
        )?;

        // the whole folder is scanned; crops left by earlier runs are
        // classified too but never reach the table
        let predictions = classifier::classify_folder(&self.model, &self.settings.crop_dir)?;
        let records = assemble::crop_records(&annotated.crops, &predictions);
        let rows = assemble::assemble_rows(&detections, &records, now.date())?;

        Ok(Diagnosis {
            detections,
            annotated,
            records,
            rows,
        })
    }

    pub fn generate(
        &self,
        image_path: &Path,
        patient: &PatientInfo,
        output: &Path,
        now: OffsetDateTime,
    ) -> Result<PipelineOutput> {
        let diagnosis = self.diagnose(image_path, now)?;
        let head_status = self.model.status();
        let notice = head_status.notice();

        let layout = report::generate_report(
            &ReportRequest {
                rows: &diagnosis.rows,
                legend: &self.settings.legend,
                composite_path: Some(&diagnosis.annotated.composite),
                logo_path: self.settings.logo.as_deref(),
                patient,
                report_date: now.date(),
                notice: notice.as_deref(),
            },
            output,
        )?;

        Ok(PipelineOutput {
            diagnosis,
            pdf_path: output.to_path_buf(),
            pages: layout.page_count,
            head_status,
        })
    }
}

/// `replay` wins over the configured detector when given.
pub fn build_detector(settings: &Settings, replay: Option<&Path>) -> Result<DetectorImpl> {
    if let Some(path) = replay {
        return Ok(DetectorImpl::File(FileDetector::new(path)));
    }
    let detector = &settings.detector;
    match detector.kind {
        DetectorKind::File => {
            let path = detector
                .path
                .clone()
                .ok_or_else(|| anyhow!("detector.kind = \"file\" requires detector.path"))?;
            Ok(DetectorImpl::File(FileDetector::new(path)))
        }
        DetectorKind::Command => {
            if detector.program.trim().is_empty() {
                return Err(anyhow!("detector.program is not configured"));
            }
            Ok(DetectorImpl::Command(CommandDetector::new(
                detector.program.clone(),
                detector.args.clone(),
            )))
        }
    }
}

pub fn build_backbone(settings: &Settings) -> Result<BackboneImpl> {
    let classifier = &settings.classifier;
    match classifier.backbone {
        BackboneKind::Pooled => Ok(BackboneImpl::Pooled(PooledBackbone::new(classifier.grid))),
        BackboneKind::Command => {
            if classifier.program.trim().is_empty() {
                return Err(anyhow!("classifier.program is not configured"));
            }
            Ok(BackboneImpl::Command(CommandBackbone::new(
                classifier.program.clone(),
                classifier.args.clone(),
            )))
        }
    }
}

pub fn load_model(settings: &Settings) -> Result<PositionModel<BackboneImpl>> {
    classifier::load_position_model(
        &settings.classifier.weights,
        &settings.classifier.train_dir,
        build_backbone(settings)?,
        settings.classifier.on_mismatch,
    )
}
