use anyhow::{Result, anyhow};
use time::{Date, Duration};

use super::PatientInfo;
use super::metrics::{ASCENT, DESCENT, Font, string_width};
use crate::assemble::{ReportRow, format_date};
use crate::legend::{ColorMap, Rgb};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

pub const LETTER: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};

pub const LEFT: f32 = 50.0;
pub const TOP_MARGIN: f32 = 50.0;
pub const BOTTOM_MARGIN: f32 = 50.0;

const LOGO_MAX: (f32, f32) = (100.0, 50.0);
const LOGO_INSET: f32 = 30.0;
const IMAGE_MAX_HEIGHT: f32 = 200.0;
const IMAGE_LEGEND_RESERVE: f32 = 200.0;
const FINDINGS_GAP: f32 = 28.0;
const TABLE_TITLE_GAP: f32 = 25.0;
const SECTION_GAP: f32 = 30.0;
const SUMMARY_GAP: f32 = 48.0;
const SIGNATURE_GAP: f32 = 35.0;

const COLUMN_WIDTHS: [f32; 4] = [80.0, 100.0, 200.0, 80.0];
const COLUMN_HEADERS: [&str; 4] = ["Tooth", "Position", "Diagnosis", "Date"];
const ROW_HEIGHT: f32 = 20.0;
const FONT_SIZE: f32 = 10.0;
const CHECKBOX_SIZE: f32 = 12.0;
const CHECKBOX_DROP: f32 = 18.0;
const NEXT_APPOINTMENT_DAYS: i64 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Logo,
    Composite,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        page: usize,
        x: f32,
        y: f32,
        size: f32,
        font: Font,
        text: String,
    },
    Line {
        page: usize,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        thickness: f32,
    },
    Rect {
        page: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Rgb>,
        stroke: Option<f32>,
    },
    Image {
        page: usize,
        slot: ImageSlot,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

impl DrawOp {
    pub fn page(&self) -> usize {
        match self {
            DrawOp::Text { page, .. }
            | DrawOp::Line { page, .. }
            | DrawOp::Rect { page, .. }
            | DrawOp::Image { page, .. } => *page,
        }
    }

    pub fn vertical_extent(&self) -> (f32, f32) {
        match self {
            DrawOp::Text { y, size, .. } => (y - DESCENT * size, y + ASCENT * size),
            DrawOp::Line {
                y1, y2, thickness, ..
            } => (y1.min(*y2) - thickness / 2.0, y1.max(*y2) + thickness / 2.0),
            DrawOp::Rect {
                y, height, stroke, ..
            } => {
                let half = stroke.unwrap_or(0.0) / 2.0;
                (y - half, y + height + half)
            }
            DrawOp::Image { y, height, .. } => (*y, y + height),
        }
    }

    pub fn horizontal_extent(&self) -> (f32, f32) {
        match self {
            DrawOp::Text {
                x, size, font, text, ..
            } => (*x, x + string_width(text, *font, *size)),
            DrawOp::Line {
                x1, x2, thickness, ..
            } => (x1.min(*x2) - thickness / 2.0, x1.max(*x2) + thickness / 2.0),
            DrawOp::Rect {
                x, width, stroke, ..
            } => {
                let half = stroke.unwrap_or(0.0) / 2.0;
                (x - half, x + width + half)
            }
            DrawOp::Image { x, width, .. } => (*x, x + width),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    Findings,
    Table,
    Visit,
    NextSteps,
    Summary,
    Signatures,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionExtent {
    pub section: Section,
    pub page: usize,
    pub top: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub page_size: PageSize,
    pub page_count: usize,
    pub ops: Vec<DrawOp>,
    pub sections: Vec<SectionExtent>,
}

pub struct LayoutInput<'a> {
    pub rows: &'a [ReportRow],
    pub legend: &'a ColorMap,
    pub patient: &'a PatientInfo,
    pub report_date: Date,
    pub composite_size: Option<(u32, u32)>,
    pub logo_size: Option<(u32, u32)>,
    pub notice: Option<&'a str>,
}

pub fn compose(input: &LayoutInput<'_>, page_size: PageSize) -> Result<Layout> {
    let mut composer = Composer::new(page_size);
    let report_date = format_date(input.report_date)?;

    let cursor = header(&mut composer, input, &report_date);
    let cursor = findings(&mut composer, input, cursor);
    let cursor = table(&mut composer, input.rows, cursor);

    let has_rows = !input.rows.is_empty();
    let cursor = checklist(
        &mut composer,
        Section::Visit,
        "2. AT THIS VISIT PATIENT RECEIVED:",
        &[
            ("CLEANING", true),
            ("TREATMENT", has_rows),
            ("FLUORIDE", false),
            ("EXAM UNABLE TO BE DONE", false),
        ],
        110.0,
        None,
        cursor,
    );
    let next_visit = input
        .report_date
        .checked_add(Duration::days(NEXT_APPOINTMENT_DAYS))
        .ok_or_else(|| anyhow!("next appointment date is out of range"))?;
    let next_visit = format_date(next_visit)?;
    let cursor = checklist(
        &mut composer,
        Section::NextSteps,
        "3. NEXT STEPS:",
        &[("TREATMENT", has_rows), ("NEXT APPOINTMENT:", !has_rows)],
        200.0,
        Some(next_visit.as_str()),
        cursor,
    );
    let cursor = summary(&mut composer, cursor);
    signatures(&mut composer, cursor);

    Ok(composer.finish())
}

fn header(composer: &mut Composer, input: &LayoutInput<'_>, report_date: &str) -> f32 {
    let PageSize { width, height } = composer.page_size;
    composer.begin(Section::Header);

    if let Some((w, h)) = input.logo_size {
        let scale = fit_scale(w, h, LOGO_MAX.0, LOGO_MAX.1);
        let (dw, dh) = (w as f32 * scale, h as f32 * scale);
        composer.image(
            ImageSlot::Logo,
            width - LOGO_INSET - dw,
            height - LOGO_INSET - dh,
            dw,
            dh,
        );
    }

    let title = "DENTAL HEALTH REPORT";
    let title_width = string_width(title, Font::HelveticaBold, 16.0);
    composer.text(
        width / 2.0 - title_width / 2.0,
        height - 50.0,
        16.0,
        Font::HelveticaBold,
        title,
    );

    let patient = input.patient;
    composer.text(
        LEFT,
        height - 80.0,
        FONT_SIZE,
        Font::Helvetica,
        &format!("Date: {}", report_date),
    );
    composer.text(
        LEFT,
        height - 95.0,
        FONT_SIZE,
        Font::Helvetica,
        &format!("Name: {}", patient.name),
    );
    composer.text(
        250.0,
        height - 95.0,
        FONT_SIZE,
        Font::Helvetica,
        &format!("Sex: {}", patient.sex),
    );
    composer.text(
        370.0,
        height - 95.0,
        FONT_SIZE,
        Font::Helvetica,
        &format!("Birthdate: {}", patient.birthdate),
    );
    composer.line(LEFT, height - 105.0, width - LEFT, height - 105.0, 0.5);
    composer.text(
        LEFT,
        height - 120.0,
        FONT_SIZE,
        Font::Helvetica,
        &format!("Dentist: {}", patient.dentist),
    );

    composer.end().unwrap_or(height - TOP_MARGIN)
}

fn findings(composer: &mut Composer, input: &LayoutInput<'_>, cursor: f32) -> f32 {
    let page_width = composer.page_size.width;
    composer.begin(Section::Findings);
    let top = cursor - FINDINGS_GAP;

    let mut legend_x = LEFT;
    if let Some((w, h)) = input.composite_size {
        let scale = fit_scale(
            w,
            h,
            page_width - IMAGE_LEGEND_RESERVE,
            IMAGE_MAX_HEIGHT,
        );
        let (dw, dh) = (w as f32 * scale, h as f32 * scale);
        composer.image(ImageSlot::Composite, LEFT, top - dh, dw, dh);
        legend_x = LEFT + dw + 20.0;
    }

    if !input.legend.is_empty() {
        let mut y = top - 10.0;
        composer.text(legend_x, y, FONT_SIZE, Font::HelveticaBold, "LEGEND");
        y -= 15.0;
        for entry in input.legend.entries() {
            composer.rect(legend_x, y - 3.0, 10.0, 10.0, Some(entry.color), None);
            composer.text(legend_x + 15.0, y, 9.0, Font::Helvetica, &entry.class_name);
            y -= 15.0;
        }
    }

    if let Some(notice) = input.notice {
        let lowest = composer.section_bottom().unwrap_or(top);
        composer.text(LEFT, lowest - 12.0, 8.0, Font::Helvetica, notice);
    }

    composer.end().unwrap_or(cursor)
}

fn table(composer: &mut Composer, rows: &[ReportRow], cursor: f32) -> f32 {
    let page_width = composer.page_size.width;
    let table_width: f32 = COLUMN_WIDTHS.iter().sum();
    let table_x = (page_width - table_width) / 2.0;
    composer.begin(Section::Table);

    // the heading never sits alone at the bottom of a page
    let first_row = if rows.is_empty() { 0.0 } else { ROW_HEIGHT };
    let mut title_y = cursor - TABLE_TITLE_GAP;
    if !composer.fits(title_y - 10.0 - ROW_HEIGHT - first_row) {
        composer.new_page();
        title_y = composer.page_top_baseline(FONT_SIZE);
    }
    composer.text(LEFT, title_y, FONT_SIZE, Font::HelveticaBold, "1.");
    composer.text(
        LEFT + 15.0,
        title_y,
        FONT_SIZE,
        Font::HelveticaBold,
        "EXAMINATION AND TREATMENT RECORD",
    );

    let mut row_top = title_y - 10.0;
    table_row(composer, table_x, row_top, &COLUMN_HEADERS, Font::HelveticaBold);
    row_top -= ROW_HEIGHT;

    for row in rows {
        if !composer.fits(row_top - ROW_HEIGHT) {
            composer.new_page();
            row_top = composer.page_size.height - TOP_MARGIN;
            table_row(composer, table_x, row_top, &COLUMN_HEADERS, Font::HelveticaBold);
            row_top -= ROW_HEIGHT;
        }
        let values = [
            row.tooth_id.to_string(),
            row.position.clone(),
            row.issue.clone(),
            row.date.clone(),
        ];
        let cells: Vec<&str> = values.iter().map(String::as_str).collect();
        table_row(composer, table_x, row_top, &cells, Font::Helvetica);
        row_top -= ROW_HEIGHT;
    }

    composer.end().unwrap_or(cursor)
}

fn table_row(composer: &mut Composer, table_x: f32, top: f32, cells: &[&str], font: Font) {
    let bottom = top - ROW_HEIGHT;
    let table_width: f32 = COLUMN_WIDTHS.iter().sum();
    composer.line(table_x, top, table_x + table_width, top, 1.0);
    composer.line(table_x, bottom, table_x + table_width, bottom, 1.0);

    let mut x = table_x;
    for (width, value) in COLUMN_WIDTHS.iter().zip(cells) {
        composer.line(x, top, x, bottom, 1.0);
        let text_width = string_width(value, font, FONT_SIZE);
        let text_y = bottom + (ROW_HEIGHT - FONT_SIZE) / 2.0;
        composer.text(x + width / 2.0 - text_width / 2.0, text_y, FONT_SIZE, font, value);
        x += width;
    }
    composer.line(x, top, x, bottom, 1.0);
}

fn checklist(
    composer: &mut Composer,
    section: Section,
    title: &str,
    items: &[(&str, bool)],
    spacing: f32,
    trailing_date: Option<&str>,
    cursor: f32,
) -> f32 {
    composer.begin(section);
    let mut y = cursor - SECTION_GAP;
    if !composer.fits(y - CHECKBOX_DROP - DESCENT * FONT_SIZE) {
        composer.new_page();
        y = composer.page_top_baseline(FONT_SIZE);
    }
    composer.text(LEFT, y, FONT_SIZE, Font::HelveticaBold, title);

    let label_offset = CHECKBOX_SIZE + 5.0;
    for (idx, (label, checked)) in items.iter().enumerate() {
        let box_x = LEFT + idx as f32 * spacing;
        let box_y = y - CHECKBOX_DROP;
        composer.rect(box_x, box_y, CHECKBOX_SIZE, CHECKBOX_SIZE, None, Some(1.0));
        if *checked {
            composer.line(box_x + 2.0, box_y + 5.0, box_x + 5.0, box_y + 2.0, 2.0);
            composer.line(box_x + 5.0, box_y + 2.0, box_x + 10.0, box_y + 10.0, 2.0);
        }
        composer.text(box_x + label_offset, box_y, FONT_SIZE, Font::Helvetica, label);
        // the date trails the last item only when it is ticked
        if *checked && idx + 1 == items.len() {
            if let Some(date) = trailing_date {
                composer.text(
                    box_x + label_offset + 115.0,
                    box_y,
                    FONT_SIZE,
                    Font::Helvetica,
                    date,
                );
            }
        }
    }

    composer.end().unwrap_or(cursor)
}

fn summary(composer: &mut Composer, cursor: f32) -> f32 {
    composer.begin(Section::Summary);
    let mut y = cursor - SUMMARY_GAP;
    if !composer.fits(y - 45.5) {
        composer.new_page();
        y = composer.page_top_baseline(FONT_SIZE);
    }
    composer.text(LEFT, y, FONT_SIZE, Font::HelveticaBold, "4. SUMMARY:");
    composer.line(LEFT, y - 20.0, 550.0, y - 20.0, 1.0);
    composer.line(LEFT, y - 45.0, 550.0, y - 45.0, 1.0);
    composer.end().unwrap_or(cursor)
}

fn signatures(composer: &mut Composer, cursor: f32) {
    composer.begin(Section::Signatures);
    let mut y = cursor - SIGNATURE_GAP;
    if !composer.fits(y - 12.0 - DESCENT * FONT_SIZE) {
        composer.new_page();
        y = composer.page_size.height - TOP_MARGIN;
    }
    composer.line(LEFT, y, 250.0, y, 1.0);
    composer.text(
        LEFT,
        y - 12.0,
        FONT_SIZE,
        Font::Helvetica,
        "Signature of the Dentist",
    );
    composer.line(300.0, y, 450.0, y, 1.0);
    composer.text(300.0, y - 12.0, FONT_SIZE, Font::Helvetica, "Date");
    composer.end();
}

fn fit_scale(w: u32, h: u32, max_w: f32, max_h: f32) -> f32 {
    if w == 0 || h == 0 {
        return 0.0;
    }
    (max_w / w as f32).min(max_h / h as f32).min(1.0)
}

struct Composer {
    page_size: PageSize,
    page: usize,
    ops: Vec<DrawOp>,
    sections: Vec<SectionExtent>,
    open: Option<(Section, usize)>,
}

impl Composer {
    fn new(page_size: PageSize) -> Self {
        Self {
            page_size,
            page: 0,
            ops: Vec::new(),
            sections: Vec::new(),
            open: None,
        }
    }

    fn begin(&mut self, section: Section) {
        self.open = Some((section, self.ops.len()));
    }

    fn end(&mut self) -> Option<f32> {
        let (section, start) = self.open.take()?;
        let drawn = &self.ops[start..];
        let mut pages: Vec<usize> = drawn.iter().map(DrawOp::page).collect();
        pages.dedup();
        for page in pages {
            let (bottom, top) = drawn
                .iter()
                .filter(|op| op.page() == page)
                .map(DrawOp::vertical_extent)
                .fold((f32::MAX, f32::MIN), |(lo, hi), (bottom, top)| {
                    (lo.min(bottom), hi.max(top))
                });
            self.sections.push(SectionExtent {
                section,
                page,
                top,
                bottom,
            });
        }
        self.sections
            .last()
            .filter(|extent| extent.section == section && extent.page == self.page)
            .map(|extent| extent.bottom)
    }

    fn section_bottom(&self) -> Option<f32> {
        let (_, start) = self.open?;
        self.ops[start..]
            .iter()
            .filter(|op| op.page() == self.page)
            .map(|op| op.vertical_extent().0)
            .reduce(f32::min)
    }

    fn fits(&self, lowest: f32) -> bool {
        lowest >= BOTTOM_MARGIN
    }

    fn new_page(&mut self) {
        self.page += 1;
    }

    fn page_top_baseline(&self, size: f32) -> f32 {
        self.page_size.height - TOP_MARGIN - ASCENT * size
    }

    fn text(&mut self, x: f32, y: f32, size: f32, font: Font, text: &str) {
        self.ops.push(DrawOp::Text {
            page: self.page,
            x,
            y,
            size,
            font,
            text: text.to_string(),
        });
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, thickness: f32) {
        self.ops.push(DrawOp::Line {
            page: self.page,
            x1,
            y1,
            x2,
            y2,
            thickness,
        });
    }

    fn rect(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Rgb>,
        stroke: Option<f32>,
    ) {
        self.ops.push(DrawOp::Rect {
            page: self.page,
            x,
            y,
            width,
            height,
            fill,
            stroke,
        });
    }

    fn image(&mut self, slot: ImageSlot, x: f32, y: f32, width: f32, height: f32) {
        self.ops.push(DrawOp::Image {
            page: self.page,
            slot,
            x,
            y,
            width,
            height,
        });
    }

    fn finish(self) -> Layout {
        Layout {
            page_size: self.page_size,
            page_count: self.page + 1,
            ops: self.ops,
            sections: self.sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    fn patient() -> PatientInfo {
        PatientInfo {
            name: "Jane Roe".to_string(),
            sex: "Female".to_string(),
            birthdate: "1990-01-02".to_string(),
            dentist: "Dr. Lee".to_string(),
        }
    }

    fn rows(count: usize) -> Vec<ReportRow> {
        (0..count)
            .map(|idx| ReportRow {
                tooth_id: idx,
                position: "Upper Left".to_string(),
                issue: "Periapical Lesion".to_string(),
                date: "2025-03-14".to_string(),
            })
            .collect()
    }

    fn layout_for(count: usize, composite: Option<(u32, u32)>, logo: Option<(u32, u32)>) -> Layout {
        let rows = rows(count);
        let legend = ColorMap::default();
        let patient = patient();
        let input = LayoutInput {
            rows: &rows,
            legend: &legend,
            patient: &patient,
            report_date: Date::from_calendar_date(2025, Month::March, 14).unwrap(),
            composite_size: composite,
            logo_size: logo,
            notice: Some("Position classifier final layer was reinitialized (2 saved classes vs 4 current); positions are unreliable."),
        };
        compose(&input, LETTER).unwrap()
    }

    fn texts(layout: &Layout) -> Vec<&str> {
        layout
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn sections_never_overlap_for_any_row_count() {
        for count in 0..=50 {
            for composite in [None, Some((1280, 720)), Some((300, 900))] {
                let layout = layout_for(count, composite, Some((400, 400)));
                for pair in layout.sections.windows(2) {
                    let (prev, next) = (pair[0], pair[1]);
                    assert!(
                        next.page > prev.page || (next.page == prev.page && next.top < prev.bottom),
                        "{:?} overlaps {:?} with {} rows",
                        next,
                        prev,
                        count
                    );
                }
            }
        }
    }

    #[test]
    fn everything_stays_inside_the_page() {
        for count in [0, 1, 16, 17, 50] {
            let layout = layout_for(count, Some((1280, 720)), Some((120, 60)));
            for op in &layout.ops {
                let (bottom, top) = op.vertical_extent();
                let (left, right) = op.horizontal_extent();
                assert!(bottom >= 30.0 && top <= LETTER.height - 30.0, "{:?}", op);
                assert!(left >= 30.0 && right <= LETTER.width - 30.0, "{:?}", op);
                assert!(op.page() < layout.page_count);
            }
        }
    }

    #[test]
    fn sections_appear_in_template_order() {
        let layout = layout_for(3, Some((1280, 720)), None);
        let mut order: Vec<Section> = layout.sections.iter().map(|extent| extent.section).collect();
        order.dedup();
        assert_eq!(
            order,
            vec![
                Section::Header,
                Section::Findings,
                Section::Table,
                Section::Visit,
                Section::NextSteps,
                Section::Summary,
                Section::Signatures
            ]
        );
        assert_eq!(layout.page_count, 1);
    }

    fn section_texts(layout: &Layout, section: Section) -> Vec<&str> {
        let extents: Vec<SectionExtent> = layout
            .sections
            .iter()
            .filter(|extent| extent.section == section)
            .copied()
            .collect();
        layout
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => {
                    let (bottom, top) = op.vertical_extent();
                    let inside = extents.iter().any(|extent| {
                        extent.page == op.page() && bottom >= extent.bottom && top <= extent.top
                    });
                    inside.then_some(text.as_str())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_table_has_only_the_header_row() {
        let layout = layout_for(0, None, None);
        assert_eq!(
            section_texts(&layout, Section::Table),
            vec![
                "1.",
                "EXAMINATION AND TREATMENT RECORD",
                "Tooth",
                "Position",
                "Diagnosis",
                "Date"
            ]
        );
        // no treatment: the follow-up appointment is ticked and dated
        assert!(texts(&layout).contains(&"2025-09-10"));
    }

    #[test]
    fn long_tables_flow_onto_new_pages_with_repeated_header() {
        let layout = layout_for(50, Some((1280, 720)), None);
        let table_pages = layout
            .sections
            .iter()
            .filter(|extent| extent.section == Section::Table)
            .count();
        assert!(table_pages > 1);
        assert!(layout.page_count >= table_pages);
        let headers = texts(&layout)
            .into_iter()
            .filter(|text| *text == "Diagnosis")
            .count();
        assert_eq!(headers, table_pages);
        let data_rows = texts(&layout)
            .into_iter()
            .filter(|text| *text == "Periapical Lesion")
            .count();
        // one per row plus the legend entry
        assert_eq!(data_rows, 51);
    }

    #[test]
    fn legend_lists_every_configured_class() {
        let layout = layout_for(1, Some((640, 480)), None);
        let legend = ColorMap::default();
        let swatches: Vec<Rgb> = layout
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Rect {
                    fill: Some(color), ..
                } => Some(*color),
                _ => None,
            })
            .collect();
        let expected: Vec<Rgb> = legend.entries().iter().map(|entry| entry.color).collect();
        assert_eq!(swatches, expected);
        for name in legend.class_names() {
            assert!(texts(&layout).contains(&name));
        }
    }

    #[test]
    fn composite_is_scaled_down_but_never_up() {
        let layout = layout_for(0, Some((100, 50)), None);
        let image = layout
            .ops
            .iter()
            .find(|op| matches!(op, DrawOp::Image { slot: ImageSlot::Composite, .. }))
            .cloned()
            .unwrap();
        match image {
            DrawOp::Image { width, height, .. } => assert_eq!((width, height), (100.0, 50.0)),
            _ => unreachable!(),
        }

        let layout = layout_for(0, Some((2000, 1000)), None);
        let image = layout
            .ops
            .iter()
            .find(|op| matches!(op, DrawOp::Image { slot: ImageSlot::Composite, .. }))
            .cloned()
            .unwrap();
        match image {
            DrawOp::Image { width, height, .. } => {
                assert!((width - 400.0).abs() < 1e-3);
                assert!((height - 200.0).abs() < 1e-3);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn treatment_boxes_follow_row_count() {
        let checkmarks = |layout: &Layout| {
            layout
                .ops
                .iter()
                .filter(|op| matches!(op, DrawOp::Line { thickness, .. } if *thickness == 2.0))
                .count()
                / 2
        };
        // cleaning + treatment, then treatment
        assert_eq!(checkmarks(&layout_for(2, None, None)), 3);
        // cleaning, then next appointment
        assert_eq!(checkmarks(&layout_for(0, None, None)), 2);
        assert!(!texts(&layout_for(2, None, None)).contains(&"2025-09-10"));
    }
}
