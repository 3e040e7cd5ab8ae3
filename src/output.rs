// Output side of the pipeline: workbook and CSV rendering, console previews,
// and delivery of finished artifacts.
//
// Rendering always produces an in-memory `Artifact`; only `deliver` touches
// the filesystem, so a failed render never leaves a partial file behind.
use crate::error::{ExportError, Result};
use crate::types::{Cell, Report, Section};
use rust_xlsxwriter::{Format, Workbook};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style};
use tracing::{debug, info};

/// A rendered file waiting to be delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Where finished artifacts go.
pub trait Sink {
    fn save(&self, artifact: &Artifact) -> Result<PathBuf>;
}

/// Writes artifacts into a directory, creating it on first use.
pub struct DirectorySink {
    pub dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Sink for DirectorySink {
    fn save(&self, artifact: &Artifact) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&artifact.file_name);
        std::fs::write(&path, &artifact.bytes)?;
        Ok(path)
    }
}

pub fn deliver(artifact: &Artifact, sink: &dyn Sink) -> Result<PathBuf> {
    let path = sink.save(artifact)?;
    info!(path = %path.display(), bytes = artifact.bytes.len(), "export saved");
    Ok(path)
}

/// One worksheet: header row first, then data rows, then the totals row.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetGrid {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl SheetGrid {
    pub fn from_section(name: &str, section: &Section) -> Self {
        let header = section.headers.iter().map(|h| Cell::Text(h.clone())).collect();
        let rows = std::iter::once(header)
            .chain(section.all_rows().map(|r| r.values().cloned().collect()))
            .collect();
        Self {
            name: name.to_string(),
            rows,
        }
    }
}

/// Sheet layout for a report: `Sheet1`, or `Income` + `Expenses`.
pub fn layout_workbook(report: &Report) -> Vec<SheetGrid> {
    match report {
        Report::Single(section) => vec![SheetGrid::from_section("Sheet1", section)],
        Report::Dual(d) => vec![
            SheetGrid::from_section("Income", &d.income),
            SheetGrid::from_section("Expenses", &d.expense),
        ],
    }
}

/// Serialize sheet grids to `.xlsx` bytes. The first row of each grid is
/// written bold.
pub fn write_workbook(sheets: &[SheetGrid]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    for grid in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&grid.name)?;
        let width = grid.rows.iter().map(Vec::len).max().unwrap_or(0);
        for col in 0..width {
            worksheet.set_column_width(col as u16, 20)?;
        }
        for (r, row) in grid.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match (cell, r == 0) {
                    (Cell::Blank, _) => {}
                    (Cell::Text(s), true) => {
                        worksheet.write_string_with_format(r, c, s, &bold)?;
                    }
                    (Cell::Text(s), false) => {
                        worksheet.write_string(r, c, s)?;
                    }
                    (Cell::Number(n), _) => {
                        worksheet.write_number(r, c, *n)?;
                    }
                }
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}

pub fn render_workbook(report: &Report, file_name: &str) -> Result<Artifact> {
    let sheets = layout_workbook(report);
    debug!(file_name, sheets = sheets.len(), "rendering workbook");
    Ok(Artifact {
        file_name: format!("{}.xlsx", file_name),
        bytes: write_workbook(&sheets)?,
    })
}

fn section_csv(section: &Section) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&section.headers)?;
    for row in section.all_rows() {
        wtr.write_record(row.values().map(|c| c.to_string()))?;
    }
    wtr.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// CSV export: one file per section.
pub fn render_csv(report: &Report, file_name: &str) -> Result<Vec<Artifact>> {
    match report {
        Report::Single(section) => Ok(vec![Artifact {
            file_name: format!("{}.csv", file_name),
            bytes: section_csv(section)?,
        }]),
        Report::Dual(d) => Ok(vec![
            Artifact {
                file_name: format!("{}-income.csv", file_name),
                bytes: section_csv(&d.income)?,
            },
            Artifact {
                file_name: format!("{}-expenses.csv", file_name),
                bytes: section_csv(&d.expense)?,
            },
        ]),
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, s)?;
    Ok(())
}

/// Markdown table of the first `max_rows` data rows plus the totals row.
pub fn preview_section(section: &Section, max_rows: usize) -> String {
    let mut builder = Builder::default();
    builder.push_record(section.headers.iter().cloned());
    for row in section.rows.iter().take(max_rows).chain(std::iter::once(&section.totals)) {
        builder.push_record(row.values().map(|c| c.to_string()));
    }
    let mut table = builder.build();
    table.with(Style::markdown());
    table.to_string()
}

pub fn preview_report(report: &Report, max_rows: usize) {
    match report {
        Report::Single(section) => {
            if section.rows.is_empty() {
                println!("(no rows)\n");
                return;
            }
            println!("{}\n", preview_section(section, max_rows));
        }
        Report::Dual(d) => {
            println!("Income");
            println!("{}\n", preview_section(&d.income, max_rows));
            println!("Expenses");
            println!("{}\n", preview_section(&d.expense, max_rows));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{Column, ColumnKey};
    use crate::reports::{assemble, assemble_dual};
    use crate::types::RawRecord;
    use serde_json::json;

    fn cols() -> Vec<Column> {
        vec![
            Column::new("Name", ColumnKey::ContributorName),
            Column::new("Amount", ColumnKey::Amount),
        ]
    }

    fn raw(v: serde_json::Value) -> RawRecord {
        RawRecord::from_value(v).unwrap()
    }

    #[test]
    fn single_report_is_sheet1() {
        let report = Report::Single(assemble(&[raw(json!({"contributor_name": "A", "amount": 5}))], &cols()));
        let sheets = layout_workbook(&report);
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].name, "Sheet1");
        assert_eq!(sheets[0].rows.len(), 3);
        assert_eq!(sheets[0].rows[0], vec![Cell::from("Name"), Cell::from("Amount")]);
        assert_eq!(sheets[0].rows[2], vec![Cell::from("Total"), Cell::from("5.00")]);
    }

    #[test]
    fn dual_report_has_income_and_expenses() {
        let report = Report::Dual(assemble_dual(
            &[raw(json!({"amount": 1}))],
            &[],
            &cols(),
            &cols(),
            None,
        ));
        let names: Vec<_> = layout_workbook(&report).into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["Income", "Expenses"]);
    }

    #[test]
    fn workbook_bytes_are_a_zip() {
        let report = Report::Single(assemble(&[raw(json!({"amount": "12"}))], &cols()));
        let artifact = render_workbook(&report, "moi-entries-event-3").unwrap();
        assert_eq!(artifact.file_name, "moi-entries-event-3.xlsx");
        assert_eq!(&artifact.bytes[..2], b"PK");
    }

    #[test]
    fn csv_includes_totals() {
        let report = Report::Single(assemble(
            &[raw(json!({"contributor_name": "A, B", "amount": 5}))],
            &cols(),
        ));
        let files = render_csv(&report, "x").unwrap();
        let text = String::from_utf8(files[0].bytes.clone()).unwrap();
        assert_eq!(text, "Name,Amount\n\"A, B\",5.00\nTotal,5.00\n");
    }

    #[test]
    fn dual_csv_is_two_files() {
        let report = Report::Dual(assemble_dual::<RawRecord>(&[], &[], &cols(), &cols(), None));
        let names: Vec<_> = render_csv(&report, "finance-report-event-1")
            .unwrap()
            .into_iter()
            .map(|a| a.file_name)
            .collect();
        assert_eq!(names, ["finance-report-event-1-income.csv", "finance-report-event-1-expenses.csv"]);
    }

    #[test]
    fn preview_limits_rows() {
        let records: Vec<_> = (0..10).map(|i| raw(json!({"contributor_name": format!("c{i}")}))).collect();
        let section = assemble(&records, &cols());
        let out = preview_section(&section, 2);
        assert!(out.contains("c1"));
        assert!(!out.contains("c2"));
        assert!(out.contains("Total"));
    }

    #[test]
    fn directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("exports"));
        let artifact = Artifact {
            file_name: "a.csv".into(),
            bytes: b"x".to_vec(),
        };
        let path = deliver(&artifact, &sink).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"x");
    }
}
