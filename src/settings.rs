use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::annotate::{AnnotateOptions, AnnotationStyle};
use crate::classifier::HeadMismatchPolicy;
use crate::legend::{ColorMap, Rgb};
use crate::paths;
use crate::report::PatientInfo;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    #[default]
    Command,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackboneKind {
    #[default]
    Pooled,
    Command,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub kind: DetectorKind,
    pub program: String,
    pub args: Vec<String>,
    pub path: Option<PathBuf>,
    pub min_confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSettings {
    pub weights: PathBuf,
    pub train_dir: PathBuf,
    pub backbone: BackboneKind,
    pub grid: usize,
    pub program: String,
    pub args: Vec<String>,
    pub on_mismatch: HeadMismatchPolicy,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub crop_dir: PathBuf,
    pub composite_dir: PathBuf,
    pub crop_tag: String,
    pub crop_extension: String,
    pub detector: DetectorSettings,
    pub classifier: ClassifierSettings,
    pub annotation: AnnotationStyle,
    pub label_font: Option<PathBuf>,
    pub report_output: PathBuf,
    pub logo: Option<PathBuf>,
    pub patient: PatientInfo,
    pub legend: ColorMap,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            crop_dir: PathBuf::from("Data/individual_detection"),
            composite_dir: PathBuf::from("Data/yolo_results"),
            crop_tag: "yolo".to_string(),
            crop_extension: "png".to_string(),
            detector: DetectorSettings {
                kind: DetectorKind::Command,
                program: String::new(),
                args: Vec::new(),
                path: None,
                min_confidence: 0.25,
            },
            classifier: ClassifierSettings {
                weights: PathBuf::from("Model/finalModel.json"),
                train_dir: PathBuf::from("Data/TeethPosition"),
                backbone: BackboneKind::Pooled,
                grid: 4,
                program: String::new(),
                args: Vec::new(),
                on_mismatch: HeadMismatchPolicy::Reinitialize,
            },
            annotation: AnnotationStyle::default(),
            label_font: None,
            report_output: PathBuf::from("dental_report.pdf"),
            logo: None,
            patient: PatientInfo::default(),
            legend: ColorMap::default(),
        }
    }
}

impl Settings {
    pub fn annotate_options(&self) -> AnnotateOptions {
        AnnotateOptions {
            crop_dir: self.crop_dir.clone(),
            composite_dir: self.composite_dir.clone(),
            tag: self.crop_tag.clone(),
            extension: self.crop_extension.clone(),
            style: self.annotation,
            label_font: self.label_font.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    paths: Option<PathSettings>,
    detector: Option<DetectorFile>,
    classifier: Option<ClassifierFile>,
    annotation: Option<AnnotationFile>,
    report: Option<ReportFile>,
    patient: Option<PatientFile>,
    legend: Option<Vec<LegendFile>>,
}

#[derive(Debug, Default, Deserialize)]
struct PathSettings {
    crop_dir: Option<String>,
    composite_dir: Option<String>,
    crop_tag: Option<String>,
    crop_extension: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DetectorFile {
    kind: Option<DetectorKind>,
    program: Option<String>,
    args: Option<Vec<String>>,
    path: Option<String>,
    min_confidence: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierFile {
    weights: Option<String>,
    train_dir: Option<String>,
    backbone: Option<BackboneKind>,
    grid: Option<usize>,
    program: Option<String>,
    args: Option<Vec<String>>,
    on_mismatch: Option<HeadMismatchPolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct AnnotationFile {
    stroke_width: Option<f32>,
    label_font_size: Option<f32>,
    font_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportFile {
    output: Option<String>,
    logo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PatientFile {
    name: Option<String>,
    sex: Option<String>,
    birthdate: Option<String>,
    dentist: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegendFile {
    class: String,
    color: String,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let home = paths::settings_dir();
    load_settings_from(Path::new("."), home.as_deref(), extra_path)
}

/// Layers `<work_dir>/settings.toml`, `<work_dir>/settings.local.toml`,
/// `<home>/settings.toml` and `extra_path` over the embedded defaults.
pub fn load_settings_from(
    work_dir: &Path,
    home: Option<&Path>,
    extra_path: Option<&Path>,
) -> Result<Settings> {
    let mut ordered_paths = vec![
        work_dir.join("settings.toml"),
        work_dir.join("settings.local.toml"),
    ];

    if let Some(home) = home {
        ensure_home_settings_file(home)?;
        ordered_paths.push(home.join("settings.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    layered_settings(&ordered_paths)
}

pub fn layered_settings(ordered_paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(defaults)?;

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings
                .merge(parsed)
                .with_context(|| format!("invalid settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(section) = incoming.paths {
            if let Some(dir) = non_empty(section.crop_dir) {
                self.crop_dir = paths::resolve_path(&dir);
            }
            if let Some(dir) = non_empty(section.composite_dir) {
                self.composite_dir = paths::resolve_path(&dir);
            }
            if let Some(tag) = non_empty(section.crop_tag) {
                self.crop_tag = tag;
            }
            if let Some(ext) = non_empty(section.crop_extension) {
                let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
                if !paths::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                    return Err(anyhow!(
                        "paths.crop_extension must be one of {}, got '{}'",
                        paths::IMAGE_EXTENSIONS.join(", "),
                        ext
                    ));
                }
                self.crop_extension = ext;
            }
        }
        if let Some(section) = incoming.detector {
            if let Some(kind) = section.kind {
                self.detector.kind = kind;
            }
            if let Some(program) = non_empty(section.program) {
                self.detector.program = program;
            }
            if let Some(args) = section.args {
                self.detector.args = args;
            }
            if let Some(path) = non_empty(section.path) {
                self.detector.path = Some(paths::resolve_path(&path));
            }
            if let Some(min) = section.min_confidence {
                if !(0.0..=1.0).contains(&min) {
                    return Err(anyhow!(
                        "detector.min_confidence must be within 0..=1, got {}",
                        min
                    ));
                }
                self.detector.min_confidence = min;
            }
        }
        if let Some(section) = incoming.classifier {
            if let Some(weights) = non_empty(section.weights) {
                self.classifier.weights = paths::resolve_path(&weights);
            }
            if let Some(dir) = non_empty(section.train_dir) {
                self.classifier.train_dir = paths::resolve_path(&dir);
            }
            if let Some(backbone) = section.backbone {
                self.classifier.backbone = backbone;
            }
            if let Some(grid) = section.grid {
                if grid > 0 {
                    self.classifier.grid = grid;
                }
            }
            if let Some(program) = non_empty(section.program) {
                self.classifier.program = program;
            }
            if let Some(args) = section.args {
                self.classifier.args = args;
            }
            if let Some(policy) = section.on_mismatch {
                self.classifier.on_mismatch = policy;
            }
        }
        if let Some(section) = incoming.annotation {
            if let Some(width) = section.stroke_width {
                if width > 0.0 {
                    self.annotation.stroke_width = width;
                }
            }
            if let Some(size) = section.label_font_size {
                if size > 0.0 {
                    self.annotation.label_font_size = size;
                }
            }
            if let Some(font) = section.font_file {
                self.label_font = non_empty(Some(font)).map(|font| paths::resolve_path(&font));
            }
        }
        if let Some(section) = incoming.report {
            if let Some(output) = non_empty(section.output) {
                self.report_output = paths::resolve_path(&output);
            }
            if let Some(logo) = section.logo {
                // an explicit empty string turns the logo off
                self.logo = non_empty(Some(logo)).map(|logo| paths::resolve_path(&logo));
            }
        }
        if let Some(section) = incoming.patient {
            if let Some(name) = non_empty(section.name) {
                self.patient.name = name;
            }
            if let Some(sex) = non_empty(section.sex) {
                self.patient.sex = sex;
            }
            if let Some(birthdate) = non_empty(section.birthdate) {
                self.patient.birthdate = birthdate;
            }
            if let Some(dentist) = non_empty(section.dentist) {
                self.patient.dentist = dentist;
            }
        }
        if let Some(entries) = incoming.legend {
            let mut legend = ColorMap::empty();
            for entry in entries {
                let color = Rgb::parse_hex(&entry.color)
                    .with_context(|| format!("legend entry '{}'", entry.class))?;
                legend.insert(entry.class.trim(), color);
            }
            self.legend = legend;
        }
        Ok(())
    }
}

fn ensure_home_settings_file(home: &Path) -> Result<()> {
    fs::create_dir_all(home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, home_settings_template())
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_settings_template() -> String {
    DEFAULT_SETTINGS_TOML
        .lines()
        .map(|line| {
            if line.trim().is_empty() || line.starts_with('#') {
                line.to_string()
            } else {
                format!("# {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}
