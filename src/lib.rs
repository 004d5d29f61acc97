use anyhow::{Result, anyhow};
use std::path::Path;
use time::OffsetDateTime;

pub mod annotate;
pub mod assemble;
pub mod classifier;
pub mod detection;
pub mod error;
pub mod legend;
pub mod logging;
pub mod paths;
pub mod pipeline;
pub mod report;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use error::ReportError;
pub use pipeline::{Diagnosis, Pipeline, PipelineOutput};
pub use report::PatientInfo;
pub use settings::Settings;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub image: Option<String>,
    pub output: Option<String>,
    pub detector_output: Option<String>,
    pub settings_path: Option<String>,
    pub patient_name: Option<String>,
    pub patient_sex: Option<String>,
    pub patient_birthdate: Option<String>,
    pub dentist: Option<String>,
    pub show_legend: bool,
    pub show_classes: bool,
    pub classify: Option<String>,
}

pub fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    if config.show_legend || config.show_classes {
        return format_show_output(&config, &settings);
    }

    if let Some(dir) = config.classify.as_deref() {
        return classify_dir(&settings, &paths::resolve_path(dir));
    }

    let image = config
        .image
        .as_deref()
        .map(paths::resolve_path)
        .ok_or_else(|| anyhow!("--image is required"))?;
    let output = config
        .output
        .as_deref()
        .map(paths::resolve_path)
        .unwrap_or_else(|| settings.report_output.clone());
    let replay = config.detector_output.as_deref().map(paths::resolve_path);
    let patient = patient_info(&config, &settings);

    let detector = pipeline::build_detector(&settings, replay.as_deref())?;
    let model = pipeline::load_model(&settings)?;
    let pipeline = Pipeline::new(detector, model, settings);
    let result = pipeline.generate(&image, &patient, &output, local_now())?;

    Ok(format_summary(&result))
}

fn patient_info(config: &Config, settings: &Settings) -> PatientInfo {
    let mut patient = settings.patient.clone();
    let overrides = [
        (&config.patient_name, &mut patient.name),
        (&config.patient_sex, &mut patient.sex),
        (&config.patient_birthdate, &mut patient.birthdate),
        (&config.dentist, &mut patient.dentist),
    ];
    for (flag, field) in overrides {
        if let Some(value) = flag {
            *field = value.trim().to_string();
        }
    }
    patient
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn classify_dir(settings: &Settings, dir: &Path) -> Result<String> {
    let model = pipeline::load_model(settings)?;
    let predictions = classifier::classify_folder(&model, dir)?;
    let mut lines: Vec<String> = predictions
        .iter()
        .map(|(filename, label)| format!("{}\t{}", filename, label))
        .collect();
    if let Some(notice) = model.status().notice() {
        lines.push(format!("note: {}", notice));
    }
    Ok(lines.join("\n"))
}

fn format_show_output(config: &Config, settings: &Settings) -> Result<String> {
    let mut sections = Vec::new();

    if config.show_legend {
        let lines: Vec<String> = settings
            .legend
            .entries()
            .iter()
            .map(|entry| format!("{}\t{}", entry.class_name, entry.color.to_hex()))
            .collect();
        sections.push(lines.join("\n"));
    }

    if config.show_classes {
        let classes = classifier::discover_classes(&settings.classifier.train_dir)?;
        sections.push(classes.join("\n"));
    }

    Ok(sections.join("\n"))
}

fn format_summary(result: &PipelineOutput) -> String {
    let diagnosis = &result.diagnosis;
    let mut lines = vec![format!("detections: {}", diagnosis.detections.len())];
    let table = assemble::rows_table_text(&diagnosis.rows);
    if !table.is_empty() {
        lines.push(table);
    }
    lines.push(format!("composite: {}", diagnosis.annotated.composite.display()));
    lines.push(format!(
        "report: {} ({} page{})",
        result.pdf_path.display(),
        result.pages,
        if result.pages == 1 { "" } else { "s" }
    ));
    if let Some(notice) = result.head_status.notice() {
        lines.push(format!("note: {}", notice));
    }
    lines.join("\n")
}
