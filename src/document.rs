//! Paginated (PDF) rendering.
//!
//! Layout and painting are separate steps: `layout_*` functions produce a
//! [`DocumentLayout`] of positioned draw operations in millimetres measured
//! from the top-left corner of an A4 page, and [`paint`] turns that into PDF
//! bytes with `printpdf`.

use crate::error::{ExportError, Result};
use crate::output::Artifact;
use crate::types::{Event, NormalizedRow, Report, Section, Summary};
use crate::util::{clock_time, format_fixed, long_date, parse_timestamp};
use printpdf::path::PaintMode;
use printpdf::{BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, Point, Rect, Rgb};
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

pub const PAGE_W: f32 = 210.0;
pub const PAGE_H: f32 = 297.0;
pub const MARGIN_X: f32 = 14.0;
pub const TOP_MARGIN: f32 = 15.0;
pub const BOTTOM_MARGIN: f32 = 15.0;
pub const ROW_H: f32 = 7.0;
pub const TABLE_FONT: f32 = 8.0;

/// Table start when there is no event header.
pub const PLAIN_START_Y: f32 = 20.0;
/// Table start below the event header box (box spans 10..50).
pub const HEADER_START_Y: f32 = 55.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb8(pub u8, pub u8, pub u8);

impl Rgb8 {
    fn color(self) -> Color {
        let c = |v: u8| v as f32 / 255.0;
        Color::Rgb(Rgb::new(c(self.0), c(self.1), c(self.2), None))
    }
}

pub const BLACK: Rgb8 = Rgb8(0, 0, 0);
pub const WHITE: Rgb8 = Rgb8(255, 255, 255);
pub const GRID: Rgb8 = Rgb8(200, 200, 200);
pub const ZEBRA: Rgb8 = Rgb8(242, 242, 242);
pub const HEADER_BLUE: Rgb8 = Rgb8(0, 102, 204);
pub const HEADER_FILL: Rgb8 = Rgb8(230, 240, 250);
pub const DETAIL_GRAY: Rgb8 = Rgb8(68, 68, 68);
pub const ACCENT_NEUTRAL: Rgb8 = Rgb8(0, 123, 255);
pub const ACCENT_INCOME: Rgb8 = Rgb8(40, 167, 69);
pub const ACCENT_EXPENSE: Rgb8 = Rgb8(220, 53, 69);
pub const ACCENT_NAVY: Rgb8 = Rgb8(0, 51, 102);

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        size: f32,
        bold: bool,
        color: Rgb8,
        text: String,
    },
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        fill: Option<Rgb8>,
        stroke: Option<Rgb8>,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        color: Rgb8,
    },
}

/// Positioned draw operations, one list per page.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub pages: Vec<Vec<DrawOp>>,
    /// Bottom edge of the last drawn table, on the last page.
    pub final_y: f32,
}

impl DocumentLayout {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().flatten().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn has_text(&self, needle: &str) -> bool {
        self.texts().any(|t| t.contains(needle))
    }
}

/// Layout builder tracking the current page and vertical cursor.
pub(crate) struct Pager {
    pages: Vec<Vec<DrawOp>>,
    pub y: f32,
}

pub(crate) struct TableStyle {
    pub accent: Rgb8,
    pub zebra: bool,
}

impl Pager {
    pub fn new(start_y: f32) -> Self {
        Self {
            pages: vec![Vec::new()],
            y: start_y,
        }
    }

    pub fn push_op(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.push(op);
        }
    }

    /// Start a new page when `height` no longer fits below the cursor.
    pub fn ensure(&mut self, height: f32) -> bool {
        if self.y + height > PAGE_H - BOTTOM_MARGIN {
            self.pages.push(Vec::new());
            self.y = TOP_MARGIN;
            true
        } else {
            false
        }
    }

    pub fn text(&mut self, x: f32, y: f32, size: f32, bold: bool, color: Rgb8, text: impl Into<String>) {
        self.push_op(DrawOp::Text {
            x,
            y,
            size,
            bold,
            color,
            text: text.into(),
        });
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, fill: Option<Rgb8>, stroke: Option<Rgb8>) {
        self.push_op(DrawOp::Rect {
            x,
            y,
            w,
            h,
            fill,
            stroke,
        });
    }

    fn table_row(&mut self, cells: &[String], col_w: f32, fill: Option<Rgb8>, text_color: Rgb8, bold: bool) {
        let max_chars = fit_chars(col_w - 3.0, TABLE_FONT);
        for (i, cell) in cells.iter().enumerate() {
            let x = MARGIN_X + i as f32 * col_w;
            self.rect(x, self.y, col_w, ROW_H, fill, Some(GRID));
            self.text(x + 1.5, self.y + ROW_H - 2.2, TABLE_FONT, bold, text_color, truncate(cell, max_chars));
        }
        self.y += ROW_H;
    }

    /// Grid table; the header row is repeated after every page break.
    /// Leaves the cursor at the table's bottom edge.
    pub fn table(&mut self, headers: &[String], rows: &[Vec<String>], style: &TableStyle) {
        let width = PAGE_W - 2.0 * MARGIN_X;
        let col_w = width / headers.len().max(1) as f32;
        self.ensure(ROW_H * 2.0);
        self.table_row(headers, col_w, Some(style.accent), WHITE, true);
        for (i, row) in rows.iter().enumerate() {
            if self.ensure(ROW_H) {
                self.table_row(headers, col_w, Some(style.accent), WHITE, true);
            }
            let fill = (style.zebra && i % 2 == 0).then_some(ZEBRA);
            self.table_row(row, col_w, fill, BLACK, false);
        }
    }

    pub fn finish(self) -> DocumentLayout {
        DocumentLayout {
            final_y: self.y,
            pages: self.pages,
        }
    }
}

/// Rough Helvetica capacity of `width` mm of text at `size` pt.
fn fit_chars(width: f32, size: f32) -> usize {
    let per_char = size * 0.5 * 0.3528;
    (width / per_char).max(3.0) as usize
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn body(section: &Section) -> Vec<Vec<String>> {
    section.rows.iter().map(row_strings).collect()
}

fn row_strings(row: &NormalizedRow) -> Vec<String> {
    row.values().map(|c| c.to_string()).collect()
}

const HEADER_BOX_X: f32 = 10.0;
const HEADER_BOX_W: f32 = 190.0;
const DETAIL_COL_X: f32 = 120.0;

/// Bordered box with the event's name, date, time, location and type.
/// Every line is cut to fit inside the box.
fn event_header(pager: &mut Pager, event: &Event) {
    let box_right = HEADER_BOX_X + HEADER_BOX_W - 4.0;
    pager.rect(HEADER_BOX_X, 10.0, HEADER_BOX_W, 40.0, Some(HEADER_FILL), Some(HEADER_BLUE));
    let title = format!("Event: {}", event.name);
    pager.text(MARGIN_X, 20.0, 16.0, true, HEADER_BLUE, truncate(&title, fit_chars(box_right - MARGIN_X, 16.0)));

    let (date, time) = match parse_timestamp(&event.date) {
        Some(dt) => (long_date(&dt), clock_time(&dt)),
        None => (event.date.clone(), String::new()),
    };
    let left = fit_chars(DETAIL_COL_X - 4.0 - MARGIN_X, 10.0);
    let right = fit_chars(box_right - DETAIL_COL_X, 10.0);
    let details = [
        (MARGIN_X, 28.0, left, format!("Date: {}", date)),
        (MARGIN_X, 34.0, left, format!("Time: {}", time)),
        (MARGIN_X, 40.0, left, format!("Location: {}", event.location)),
        (DETAIL_COL_X, 28.0, right, format!("Event Type: {}", event.event_type)),
    ];
    for (x, y, max_chars, line) in details {
        pager.text(x, y, 10.0, false, DETAIL_GRAY, truncate(&line, max_chars));
    }
}

fn summary_block(pager: &mut Pager, summary: &Summary) {
    pager.y += 20.0;
    pager.ensure(16.0);
    let y = pager.y;
    let lines = [
        format!("Total Income: {}", format_fixed(summary.total_income, 2)),
        format!("Total Expenses: {}", format_fixed(summary.total_expense, 2)),
        format!("Balance: {}", format_fixed(summary.balance, 2)),
    ];
    for (i, line) in lines.into_iter().enumerate() {
        pager.text(MARGIN_X, y + i as f32 * 7.0, 12.0, false, BLACK, line);
    }
    pager.y = y + 14.0;
}

/// Material reports carry weights, not money, so they get no total line.
pub fn is_material_export(file_name: &str) -> bool {
    file_name.to_lowercase().contains("material")
}

pub fn layout_document(report: &Report, file_name: &str, event: Option<&Event>) -> DocumentLayout {
    let start_y = if event.is_some() {
        HEADER_START_Y
    } else {
        PLAIN_START_Y
    };
    let mut pager = Pager::new(start_y);
    if let Some(e) = event {
        event_header(&mut pager, e);
    }

    match report {
        Report::Single(section) => {
            pager.table(
                &section.headers,
                &body(section),
                &TableStyle {
                    accent: ACCENT_NEUTRAL,
                    zebra: false,
                },
            );
            if !is_material_export(file_name) {
                pager.y += 10.0;
                pager.ensure(5.0);
                let y = pager.y;
                pager.text(
                    MARGIN_X,
                    y,
                    10.0,
                    false,
                    BLACK,
                    format!("Total Amount: {}", format_fixed(section.total, 2)),
                );
            }
        }
        Report::Dual(d) => {
            pager.y += 6.0;
            let y = pager.y;
            pager.text(MARGIN_X, y, 16.0, true, ACCENT_INCOME, "Income");
            pager.y += 4.0;
            pager.table(
                &d.income.headers,
                &body(&d.income),
                &TableStyle {
                    accent: ACCENT_INCOME,
                    zebra: false,
                },
            );

            pager.y += 15.0;
            pager.ensure(ROW_H * 2.0 + 5.0);
            let y = pager.y;
            pager.text(MARGIN_X, y, 16.0, true, ACCENT_EXPENSE, "Expenses");
            pager.y += 5.0;
            pager.table(
                &d.expense.headers,
                &body(&d.expense),
                &TableStyle {
                    accent: ACCENT_EXPENSE,
                    zebra: false,
                },
            );
            summary_block(&mut pager, &d.summary);
        }
    }
    pager.finish()
}

/// Fonts used when painting.
pub enum FontSource<'a> {
    /// Helvetica / Helvetica-Bold; Latin text only.
    Builtin,
    /// A TrueType file used for both weights.
    External(&'a Path),
}

fn pdf_err<E: std::fmt::Display>(e: E) -> ExportError {
    ExportError::Document(e.to_string())
}

/// Paint a layout to PDF bytes.
pub fn paint(layout: &DocumentLayout, title: &str, fonts: FontSource<'_>) -> Result<Vec<u8>> {
    let (doc, page1, layer1) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");

    let (regular, bold): (IndirectFontRef, IndirectFontRef) = match fonts {
        FontSource::Builtin => (
            doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?,
            doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?,
        ),
        FontSource::External(path) => {
            let font = doc
                .add_external_font(std::fs::File::open(path)?)
                .map_err(pdf_err)?;
            (font.clone(), font)
        }
    };

    for (idx, ops) in layout.pages.iter().enumerate() {
        let layer = if idx == 0 {
            doc.get_page(page1).get_layer(layer1)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
            doc.get_page(page).get_layer(layer)
        };
        for op in ops {
            match op {
                DrawOp::Text {
                    x,
                    y,
                    size,
                    bold: is_bold,
                    color,
                    text,
                } => {
                    layer.set_fill_color(color.color());
                    let font = if *is_bold { &bold } else { &regular };
                    layer.use_text(text.as_str(), *size, Mm(*x), Mm(PAGE_H - *y), font);
                }
                DrawOp::Rect {
                    x,
                    y,
                    w,
                    h,
                    fill,
                    stroke,
                } => {
                    let mode = match (fill, stroke) {
                        (Some(_), Some(_)) => PaintMode::FillStroke,
                        (Some(_), None) => PaintMode::Fill,
                        (None, _) => PaintMode::Stroke,
                    };
                    if let Some(f) = fill {
                        layer.set_fill_color(f.color());
                    }
                    if let Some(s) = stroke {
                        layer.set_outline_color(s.color());
                        layer.set_outline_thickness(0.3);
                    }
                    let rect = Rect::new(Mm(*x), Mm(PAGE_H - *y - *h), Mm(*x + *w), Mm(PAGE_H - *y))
                        .with_mode(mode);
                    layer.add_rect(rect);
                }
                DrawOp::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    color,
                } => {
                    layer.set_outline_color(color.color());
                    layer.add_line(Line {
                        points: vec![
                            (Point::new(Mm(*x1), Mm(PAGE_H - *y1)), false),
                            (Point::new(Mm(*x2), Mm(PAGE_H - *y2)), false),
                        ],
                        is_closed: false,
                    });
                }
            }
        }
    }

    let mut writer = BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer).map_err(pdf_err)?;
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

/// Lay out and paint a report. Nothing is written anywhere; hand the
/// artifact to [`crate::output::deliver`].
pub fn render_document(report: &Report, file_name: &str, event: Option<&Event>) -> Result<Artifact> {
    let layout = layout_document(report, file_name, event);
    debug!(file_name, pages = layout.pages.len(), "rendering document");
    let title = event.map(|e| e.name.as_str()).unwrap_or(file_name);
    Ok(Artifact {
        file_name: format!("{}.pdf", file_name),
        bytes: paint(&layout, title, FontSource::Builtin)?,
    })
}
