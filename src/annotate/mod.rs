use anyhow::{Context, Result, anyhow};
use image::GenericImageView;
use std::fs;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::info;

use crate::detection::Detection;
use crate::error::ReportError;
use crate::paths;

mod render;

pub use render::{
    AnnotationStyle, annotation_svg, image_format_from_extension, label_fontdb, render_svg_bytes,
};

#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    pub crop_dir: PathBuf,
    pub composite_dir: PathBuf,
    pub tag: String,
    pub extension: String,
    pub style: AnnotationStyle,
    pub label_font: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CropFile {
    pub detection_index: usize,
    pub filename: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AnnotatedSet {
    pub crops: Vec<CropFile>,
    pub composite: PathBuf,
    pub width: u32,
    pub height: u32,
}

pub fn read_source_image(image_path: &Path) -> Result<Vec<u8>> {
    match fs::read(image_path) {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(ReportError::ImageNotFound {
            path: image_path.to_path_buf(),
        }
        .into()),
        Err(err) => Err(err)
            .with_context(|| format!("failed to read image: {}", image_path.display())),
    }
}

pub fn render_crops(
    image_path: &Path,
    detections: &[Detection],
    options: &AnnotateOptions,
    timestamp: OffsetDateTime,
) -> Result<AnnotatedSet> {
    let bytes = read_source_image(image_path)?;
    let source = image::load_from_memory(&bytes)
        .with_context(|| format!("failed to decode image: {}", image_path.display()))?;
    let (width, height) = source.dimensions();
    let png = encode_png(&source)?;

    let crop_format = image_format_from_extension(&options.extension).ok_or_else(|| {
        anyhow!("unsupported crop image extension '{}'", options.extension)
    })?;
    paths::ensure_dir(&options.crop_dir)?;
    paths::ensure_dir(&options.composite_dir)?;
    let fontdb = label_fontdb(options.label_font.as_deref())?;

    let mut crops = Vec::with_capacity(detections.len());
    for detection in detections {
        let svg = annotation_svg(&png, width, height, &[detection], &options.style);
        let rendered = render_svg_bytes(&svg, crop_format, &fontdb)?;
        let filename = paths::crop_filename(
            &options.tag,
            detection.index,
            &detection.class_name,
            &options.extension,
        );
        let path = options.crop_dir.join(&filename);
        fs::write(&path, rendered)
            .with_context(|| format!("failed to write crop image: {}", path.display()))?;
        crops.push(CropFile {
            detection_index: detection.index,
            filename,
            path,
        });
    }

    let all: Vec<&Detection> = detections.iter().collect();
    let svg = annotation_svg(&png, width, height, &all, &options.style);
    let rendered = render_svg_bytes(&svg, image::ImageFormat::Png, &fontdb)?;
    let composite = options
        .composite_dir
        .join(paths::composite_filename(image_path, timestamp)?);
    fs::write(&composite, rendered)
        .with_context(|| format!("failed to write composite image: {}", composite.display()))?;

    info!("annotate: composite image saved to {}", composite.display());
    info!("annotate: {} crop image(s) saved", crops.len());

    Ok(AnnotatedSet {
        crops,
        composite,
        width,
        height,
    })
}

fn encode_png(image: &image::DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .with_context(|| "failed to re-encode source image")?;
    Ok(bytes)
}
