use crate::columns::{CellFormat, Column, ColumnKey, ColumnSpec, ReportKind};
use crate::loader::{localize_finance, localize_material, localize_moi, EventBundle};
use crate::types::{
    Cell, DualReport, FinanceEntry, FinanceKind, MaterialEntry, MoiEntry, NormalizedRow, Record,
    Report, Scalar, Section, Summary, SummaryDiscrepancy, SummaryOrigin,
};
use crate::util::format_fixed;
use serde::Serialize;
use tracing::{debug, warn};

pub const TOTAL_LABEL: &str = "Total";

/// Apply a column's formatting rule to one extracted value.
///
/// Returns the cell and, for amount columns, the number that feeds the
/// total. Values that cannot be read as numbers keep their original text.
fn format_cell(key: &ColumnKey, value: Option<Scalar>) -> (Cell, Option<f64>) {
    let Some(value) = value else {
        return (Cell::Blank, None);
    };
    let decimals = match key.format() {
        CellFormat::Amount => 2,
        CellFormat::Weight => 3,
        CellFormat::Verbatim => {
            let cell = match value {
                Scalar::Number(n) => Cell::Number(n),
                Scalar::Text(s) => Cell::Text(s),
            };
            return (cell, None);
        }
    };
    match value.as_f64() {
        Some(n) => {
            let counted = (key.format() == CellFormat::Amount).then_some(n);
            (Cell::Text(format_fixed(n, decimals)), counted)
        }
        None => (Cell::Text(value.to_string()), None),
    }
}

fn totals_row(columns: &[Column], total: f64) -> NormalizedRow {
    let last = columns.len().saturating_sub(1);
    let cells = columns
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let cell = if idx == last {
                Cell::Text(format_fixed(total, 2))
            } else if idx == 0 {
                Cell::from(TOTAL_LABEL)
            } else {
                Cell::Blank
            };
            (col.label.clone(), cell)
        })
        .collect();
    NormalizedRow { cells }
}

/// Normalize `records` against `columns` and append the totals row.
///
/// Never fails: missing fields become blank cells and amounts that are not
/// numbers count as zero.
pub fn assemble<R: Record>(records: &[R], columns: &[Column]) -> Section {
    let mut total = 0.0;
    let rows: Vec<NormalizedRow> = records
        .iter()
        .map(|record| {
            let cells = columns
                .iter()
                .map(|col| {
                    let (cell, counted) = format_cell(&col.key, record.value(&col.key));
                    total += counted.unwrap_or(0.0);
                    (col.label.clone(), cell)
                })
                .collect();
            NormalizedRow { cells }
        })
        .collect();
    debug!(rows = rows.len(), total, "assembled section");
    Section {
        headers: columns.iter().map(|c| c.label.clone()).collect(),
        rows,
        totals: totals_row(columns, total),
        total,
    }
}

fn differs(a: f64, b: f64) -> bool {
    (a - b).abs() > 0.005
}

/// Build the income/expense report.
///
/// A `supplied` summary is passed through as-is even when it disagrees with
/// the rows; the disagreement is recorded on the report and logged rather
/// than reconciled.
pub fn assemble_dual<R: Record>(
    income: &[R],
    expense: &[R],
    income_columns: &[Column],
    expense_columns: &[Column],
    supplied: Option<Summary>,
) -> DualReport {
    let income = assemble(income, income_columns);
    let expense = assemble(expense, expense_columns);
    let from_rows = Summary {
        total_income: income.total,
        total_expense: expense.total,
        balance: income.total - expense.total,
    };

    let (summary, summary_origin, discrepancy) = match supplied {
        Some(s) => {
            let mismatch = differs(s.total_income, from_rows.total_income)
                || differs(s.total_expense, from_rows.total_expense)
                || differs(s.balance, from_rows.balance);
            let discrepancy = mismatch.then(|| {
                warn!(
                    supplied_income = s.total_income,
                    supplied_expense = s.total_expense,
                    supplied_balance = s.balance,
                    row_income = from_rows.total_income,
                    row_expense = from_rows.total_expense,
                    "supplied finance summary disagrees with entry rows; using supplied figures"
                );
                SummaryDiscrepancy {
                    supplied: s,
                    from_rows,
                }
            });
            (s, SummaryOrigin::Supplied, discrepancy)
        }
        None => (from_rows, SummaryOrigin::Derived, None),
    };

    DualReport {
        income,
        expense,
        summary,
        summary_origin,
        discrepancy,
    }
}

/// Partition finance entries by their `type`.
///
/// Entries with an unrecognised type are left out of both sides.
pub fn split_finance(entries: &[FinanceEntry]) -> (Vec<FinanceEntry>, Vec<FinanceEntry>) {
    let mut income = Vec::new();
    let mut expense = Vec::new();
    for e in entries {
        match e.kind() {
            Some(FinanceKind::Income) => income.push(e.clone()),
            Some(FinanceKind::Expense) => expense.push(e.clone()),
            None => warn!(id = ?e.id, kind = ?e.kind, "skipping finance entry with unknown type"),
        }
    }
    (income, expense)
}

/// Localize dates and assemble one of the dashboard's exports.
pub fn report_for(kind: ReportKind, bundle: &EventBundle) -> Report {
    match kind.columns() {
        ColumnSpec::Flat(cols) if kind == ReportKind::Material => {
            let mut entries = bundle.material.clone();
            localize_material(&mut entries);
            Report::Single(assemble(&entries, &cols))
        }
        ColumnSpec::Flat(cols) => {
            let mut entries = bundle.moi.clone();
            localize_moi(&mut entries);
            Report::Single(assemble(&entries, &cols))
        }
        ColumnSpec::Dual { income, expense } => {
            let mut income_entries = bundle.finance.income_entries.clone();
            let mut expense_entries = bundle.finance.expense_entries.clone();
            localize_finance(&mut income_entries);
            localize_finance(&mut expense_entries);
            Report::Dual(assemble_dual(
                &income_entries,
                &expense_entries,
                &income,
                &expense,
                bundle.finance.supplied_summary(),
            ))
        }
    }
}

/// Totals across all three exports of one event, written next to the
/// exported files.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SummaryStats {
    pub event_id: i64,
    pub moi_entries: usize,
    pub moi_total: f64,
    pub material_entries: usize,
    pub material_weight: f64,
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    pub summary_supplied: bool,
    pub summary_mismatch: bool,
}

pub fn generate_summary(
    event_id: i64,
    moi: &[MoiEntry],
    material: &[MaterialEntry],
    finance: &Report,
) -> SummaryStats {
    let moi_total: f64 = moi
        .iter()
        .filter_map(|e| e.amount.as_ref().and_then(Scalar::as_f64))
        .sum();
    let material_weight: f64 = material
        .iter()
        .filter_map(|e| e.weight.as_ref().and_then(Scalar::as_f64))
        .sum();
    let (summary, supplied, mismatch) = match finance {
        Report::Dual(d) => (
            d.summary,
            d.summary_origin == SummaryOrigin::Supplied,
            d.discrepancy.is_some(),
        ),
        Report::Single(s) => (
            Summary {
                total_income: s.total,
                total_expense: 0.0,
                balance: s.total,
            },
            false,
            false,
        ),
    };
    SummaryStats {
        event_id,
        moi_entries: moi.len(),
        moi_total,
        material_entries: material.len(),
        material_weight,
        total_income: summary.total_income,
        total_expense: summary.total_expense,
        balance: summary.balance,
        summary_supplied: supplied,
        summary_mismatch: mismatch,
    }
}
