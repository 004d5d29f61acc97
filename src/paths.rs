use anyhow::{Context, Result, anyhow};
use globset::{GlobBuilder, GlobMatcher};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description;

const BASE_DIR_ENV: &str = "DENTAL_XRAY_REPORT_DIR";
pub(crate) const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// `<tag>_<index>_<class_name>.<ext>`
pub fn crop_filename(tag: &str, index: usize, class_name: &str, extension: &str) -> String {
    format!("{}_{}_{}.{}", tag, index, class_name, extension)
}

/// `<basename>_<YYYYmmdd_HHMMSS>.png`
pub fn composite_filename(image_path: &Path, timestamp: OffsetDateTime) -> Result<String> {
    let base = image_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| anyhow!("image path has no file name: {}", image_path.display()))?;
    Ok(format!("{}_{}.png", base, timestamp_label(timestamp)?))
}

pub fn timestamp_label(timestamp: OffsetDateTime) -> Result<String> {
    let format = format_description::parse("[year][month][day]_[hour][minute][second]")
        .with_context(|| "invalid timestamp format")?;
    timestamp
        .format(&format)
        .with_context(|| "failed to format timestamp")
}

pub(crate) fn image_matcher() -> Result<GlobMatcher> {
    let pattern = format!("*.{{{}}}", IMAGE_EXTENSIONS.join(","));
    let glob = GlobBuilder::new(&pattern)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .map_err(|err| anyhow!("invalid image glob: {}", err))?;
    Ok(glob.compile_matcher())
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory: {}", dir.display()))
}

pub(crate) fn settings_dir() -> Option<PathBuf> {
    if let Some(dir) = base_dir_override() {
        return Some(dir);
    }
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".dental-xray-report"))
        }
    })
}

pub fn resolve_path(value: &str) -> PathBuf {
    let home = std::env::var("HOME").ok();
    normalize_path(PathBuf::from(expand_tilde(value.trim(), home.as_deref())))
}

fn base_dir_override() -> Option<PathBuf> {
    std::env::var(BASE_DIR_ENV).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(resolve_path(trimmed))
        }
    })
}

fn normalize_path(path: PathBuf) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        normalized.push(component.as_os_str());
    }
    normalized
}

fn expand_tilde(value: &str, home: Option<&str>) -> String {
    if value == "~" || value.starts_with("~/") {
        if let Some(home) = home.map(str::trim) {
            if home.is_empty() {
                return value.to_string();
            }
            if value == "~" {
                return home.to_string();
            }
            return format!("{}{}", home, &value[1..]);
        }
    }
    value.to_string()
}
