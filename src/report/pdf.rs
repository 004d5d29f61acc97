use anyhow::{Context, Result, anyhow};
use printpdf::image_crate::DynamicImage;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfLayerIndex, PdfPageIndex, Point, Polygon, PolygonMode,
};
use std::io::BufWriter;
use std::path::Path;

use super::layout::{DrawOp, ImageSlot, Layout};
use super::metrics::Font;
use crate::legend::Rgb;

#[derive(Default)]
pub struct ImageSources {
    pub logo: Option<DynamicImage>,
    pub composite: Option<DynamicImage>,
}

impl ImageSources {
    pub fn load(logo: Option<&Path>, composite: Option<&Path>) -> Result<Self> {
        Ok(Self {
            logo: logo.map(open_rgb).transpose()?,
            composite: composite.map(open_rgb).transpose()?,
        })
    }

    fn get(&self, slot: ImageSlot) -> Option<&DynamicImage> {
        match slot {
            ImageSlot::Logo => self.logo.as_ref(),
            ImageSlot::Composite => self.composite.as_ref(),
        }
    }
}

fn open_rgb(path: &Path) -> Result<DynamicImage> {
    let image = printpdf::image_crate::open(path)
        .with_context(|| format!("failed to open report image: {}", path.display()))?;
    // the pdf image stream has no alpha channel
    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

pub fn render_pdf(layout: &Layout, images: &ImageSources, title: &str) -> Result<Vec<u8>> {
    let width = mm(layout.page_size.width);
    let height = mm(layout.page_size.height);
    let (doc, first_page, first_layer) = PdfDocument::new(title, width, height, "Layer 1");
    let mut pages: Vec<(PdfPageIndex, PdfLayerIndex)> = vec![(first_page, first_layer)];
    for idx in 1..layout.page_count {
        pages.push(doc.add_page(width, height, format!("Layer {}", idx + 1)));
    }

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|err| anyhow!("failed to load Helvetica: {}", err))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|err| anyhow!("failed to load Helvetica-Bold: {}", err))?;

    for op in &layout.ops {
        let (page, layer) = pages
            .get(op.page())
            .copied()
            .ok_or_else(|| anyhow!("draw operation on missing page {}", op.page()))?;
        let layer = doc.get_page(page).get_layer(layer);
        match op {
            DrawOp::Text {
                x,
                y,
                size,
                font,
                text,
                ..
            } => {
                layer.set_fill_color(pdf_color(Rgb::BLACK));
                let face: &IndirectFontRef = match font {
                    Font::Helvetica => &regular,
                    Font::HelveticaBold => &bold,
                };
                layer.use_text(text.as_str(), *size, mm(*x), mm(*y), face);
            }
            DrawOp::Line {
                x1,
                y1,
                x2,
                y2,
                thickness,
                ..
            } => {
                layer.set_outline_color(pdf_color(Rgb::BLACK));
                layer.set_outline_thickness(*thickness);
                layer.add_line(Line {
                    points: vec![
                        (Point::new(mm(*x1), mm(*y1)), false),
                        (Point::new(mm(*x2), mm(*y2)), false),
                    ],
                    is_closed: false,
                });
            }
            DrawOp::Rect {
                x,
                y,
                width,
                height,
                fill,
                stroke,
                ..
            } => {
                let corners = [
                    (*x, *y),
                    (x + width, *y),
                    (x + width, y + height),
                    (*x, y + height),
                ];
                if let Some(color) = fill {
                    layer.set_fill_color(pdf_color(*color));
                    layer.add_polygon(rect_polygon(corners, PolygonMode::Fill));
                }
                if let Some(thickness) = stroke {
                    layer.set_outline_color(pdf_color(Rgb::BLACK));
                    layer.set_outline_thickness(*thickness);
                    layer.add_polygon(rect_polygon(corners, PolygonMode::Stroke));
                }
            }
            DrawOp::Image {
                slot,
                x,
                y,
                width,
                height,
                ..
            } => {
                let Some(source) = images.get(*slot) else {
                    continue;
                };
                if source.width() == 0 || source.height() == 0 {
                    continue;
                }
                // at 72 dpi one pixel is one point
                let transform = ImageTransform {
                    translate_x: Some(mm(*x)),
                    translate_y: Some(mm(*y)),
                    rotate: None,
                    scale_x: Some(width / source.width() as f32),
                    scale_y: Some(height / source.height() as f32),
                    dpi: Some(72.0),
                };
                Image::from_dynamic_image(source).add_to_layer(layer, transform);
            }
        }
    }

    let mut buffer = Vec::new();
    {
        let mut writer = BufWriter::new(&mut buffer);
        doc.save(&mut writer).with_context(|| "failed to write pdf")?;
    }
    Ok(buffer)
}

fn rect_polygon(corners: [(f32, f32); 4], mode: PolygonMode) -> Polygon {
    Polygon {
        rings: vec![
            corners
                .iter()
                .map(|(x, y)| (Point::new(mm(*x), mm(*y)), false))
                .collect(),
        ],
        mode,
        ..Default::default()
    }
}

fn pdf_color(color: Rgb) -> Color {
    let (r, g, b) = color.to_unit();
    Color::Rgb(printpdf::Rgb::new(r, g, b, None))
}

fn mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}
