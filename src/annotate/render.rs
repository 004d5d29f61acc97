use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::Pixmap;
use tracing::{debug, warn};
use usvg::{Options, Tree, fontdb};

use crate::detection::Detection;

#[derive(Debug, Clone, Copy)]
pub struct AnnotationStyle {
    pub stroke_width: f32,
    pub label_font_size: f32,
    pub label_offset: f32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            stroke_width: 4.0,
            label_font_size: 16.0,
            label_offset: 10.0,
        }
    }
}

/// Builds an SVG that paints the PNG-encoded source image and one outlined
/// box plus `ID: <index>` label per detection.
pub fn annotation_svg(
    png_bytes: &[u8],
    width: u32,
    height: u32,
    detections: &[&Detection],
    style: &AnnotationStyle,
) -> String {
    let data_uri = format!("data:image/png;base64,{}", BASE64.encode(png_bytes));

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    for detection in detections {
        let bbox = detection.bbox;
        let color = detection.color.to_hex();
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{color}" stroke-width="{stroke}"/>"#,
            x = bbox.x1,
            y = bbox.y1,
            w = bbox.width().max(1),
            h = bbox.height().max(1),
            color = color,
            stroke = style.stroke_width
        ));
        // keep the label inside the canvas when the box touches the top edge
        let label_y = (bbox.y1 as f32 - style.label_offset).max(style.label_font_size);
        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-size="{size}" font-family="sans-serif" font-weight="bold" fill="{color}">{text}</text>"#,
            x = bbox.x1.max(0),
            y = label_y,
            size = style.label_font_size,
            color = color,
            text = escape_xml(&format!("ID: {}", detection.index))
        ));
    }

    svg.push_str("</svg>");
    svg
}

pub fn label_fontdb(font_file: Option<&Path>) -> Result<Arc<fontdb::Database>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(path) = font_file {
        db.load_font_file(path)
            .with_context(|| format!("failed to load label font: {}", path.display()))?;
    }
    if db.is_empty() {
        warn!("annotate: no fonts available, ID labels will not be drawn");
    } else {
        debug!("annotate: {} font face(s) loaded", db.len());
    }
    Ok(Arc::new(db))
}

pub fn render_svg_bytes(
    svg: &str,
    format: image::ImageFormat,
    fontdb: &Arc<fontdb::Database>,
) -> Result<Vec<u8>> {
    let options = Options {
        fontdb: Arc::clone(fontdb),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    // radiographs carry no alpha; JPEG output cannot encode it either
    let rgb = image::DynamicImage::ImageRgba8(image).to_rgb8();
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image::DynamicImage::ImageRgb8(rgb)
        .write_to(&mut cursor, format)
        .with_context(|| "failed to encode annotated image")?;
    Ok(bytes)
}

pub fn image_format_from_extension(extension: &str) -> Option<image::ImageFormat> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some(image::ImageFormat::Png),
        "jpg" | "jpeg" => Some(image::ImageFormat::Jpeg),
        _ => None,
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
