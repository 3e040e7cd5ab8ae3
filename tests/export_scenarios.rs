use async_trait::async_trait;
use moi_report::columns::{Column, ColumnKey, ReportKind};
use moi_report::document::layout_document;
use moi_report::output::{deliver, render_csv, render_workbook, DirectorySink};
use moi_report::reports::{assemble, assemble_dual, report_for};
use moi_report::translate::{translate, Translator};
use moi_report::types::{Cell, RawRecord, Report, Summary, SummaryOrigin};
use moi_report::Result;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

fn records(v: serde_json::Value) -> Vec<RawRecord> {
    serde_json::from_value::<Vec<serde_json::Value>>(v)
        .unwrap()
        .into_iter()
        .map(|r| RawRecord::from_value(r).unwrap())
        .collect()
}

fn columns(pairs: &[(&str, &str)]) -> Vec<Column> {
    pairs
        .iter()
        .map(|(label, key)| Column::new(*label, ColumnKey::from_wire(key)))
        .collect()
}

#[test]
fn amounts_are_formatted_and_bad_values_kept() {
    let rows = records(json!([
        {"amount": "1000.5", "contributor_name": "A"},
        {"amount": "abc", "contributor_name": "B"}
    ]));
    let section = assemble(&rows, &columns(&[("Name", "contributor_name"), ("Amount", "amount")]));

    assert_eq!(section.row_count(), rows.len() + 1);
    assert_eq!(section.rows[0].get("Name"), Some(&Cell::from("A")));
    assert_eq!(section.rows[0].get("Amount"), Some(&Cell::from("1000.50")));
    assert_eq!(section.rows[1].get("Name"), Some(&Cell::from("B")));
    assert_eq!(section.rows[1].get("Amount"), Some(&Cell::from("abc")));
    assert_eq!(section.totals.get("Name"), Some(&Cell::from("Total")));
    assert_eq!(section.totals.get("Amount"), Some(&Cell::from("1000.50")));
}

#[test]
fn material_document_has_no_total_amount_line() {
    let rows = records(json!([
        {"material_type": "Gold", "weight": 8, "amount": 250000},
        {"material_type": "Silver", "weight": "12.5"}
    ]));
    let cols = columns(&[("Type", "material_type"), ("Weight", "weight"), ("Amount", "amount")]);
    let report = Report::Single(assemble(&rows, &cols));

    let material = layout_document(&report, "material-entries-event-7", None);
    assert!(material.has_text("Gold"));
    assert!(!material.has_text("Total Amount"));

    let moi = layout_document(&report, "moi-entries-event-7", None);
    assert!(moi.has_text("Total Amount: 250000.00"));
}

#[test]
fn supplied_finance_summary_is_rendered_verbatim() {
    let income = records(json!([{"description": "Hall", "amount": 10}]));
    let expense = records(json!([{"description": "Food", "amount": 1}]));
    let cols = columns(&[("Description", "description"), ("Amount", "amount")]);
    let supplied = Summary {
        total_income: 500.0,
        total_expense: 200.0,
        balance: 300.0,
    };
    let dual = assemble_dual(&income, &expense, &cols, &cols, Some(supplied));
    assert_eq!(dual.summary_origin, SummaryOrigin::Supplied);
    assert!(dual.discrepancy.is_some());

    let layout = layout_document(&Report::Dual(dual), "finance-report-event-2", None);
    assert!(layout.has_text("Total Income: 500.00"));
    assert!(layout.has_text("Total Expenses: 200.00"));
    assert!(layout.has_text("Balance: 300.00"));
}

#[test]
fn income_and_expense_totals_stay_separate() {
    let income = records(json!([{"amount": 100}, {"amount": 50}]));
    let expense = records(json!([{"amount": 30}]));
    let cols = columns(&[("Label", "description"), ("Amount", "amount")]);
    let dual = assemble_dual(&income, &expense, &cols, &cols, None);
    assert_eq!(dual.income.total, 150.0);
    assert_eq!(dual.expense.total, 30.0);
    assert_eq!(dual.summary.balance, 120.0);
    assert_eq!(dual.summary_origin, SummaryOrigin::Derived);
}

#[test]
fn missing_keys_give_blank_cells() {
    let rows = records(json!([{}, {"notes": null}]));
    let section = assemble(&rows, &columns(&[("Name", "contributor_name"), ("Notes", "notes")]));
    assert_eq!(section.rows[0].get("Name"), Some(&Cell::Blank));
    assert_eq!(section.rows[1].get("Notes"), Some(&Cell::Blank));
}

#[test]
fn formatted_amounts_are_stable() {
    let cols = columns(&[("Amount", "amount")]);
    let first = assemble(&records(json!([{"amount": "42.1"}])), &cols);
    let Some(Cell::Text(once)) = first.rows[0].get("Amount").cloned() else {
        panic!("amount should be text");
    };
    let second = assemble(&records(json!([{ "amount": once.clone() }])), &cols);
    assert_eq!(second.rows[0].get("Amount"), Some(&Cell::Text(once)));
}

#[test]
fn event_exports_reach_the_output_directory() {
    let bundle = moi_report::loader::EventBundle {
        event_id: 7,
        moi: serde_json::from_value(json!([{"contributor_name": "A", "amount": 100}])).unwrap(),
        ..Default::default()
    };
    let report = report_for(ReportKind::Moi, &bundle);
    let file_name = ReportKind::Moi.file_stem(bundle.event_id);

    let dir = tempfile::tempdir().unwrap();
    let sink = DirectorySink::new(dir.path());
    let mut artifacts = vec![render_workbook(&report, &file_name).unwrap()];
    artifacts.extend(render_csv(&report, &file_name).unwrap());
    for a in &artifacts {
        deliver(a, &sink).unwrap();
    }
    assert!(dir.path().join("moi-entries-event-7.xlsx").exists());
    assert!(dir.path().join("moi-entries-event-7.csv").exists());
}

struct Counting(AtomicUsize);

#[async_trait]
impl Translator for Counting {
    async fn request(&self, _text: &str) -> Result<String> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok("வணக்கம்".to_string())
    }
}

#[tokio::test]
async fn empty_text_is_never_sent_for_translation() {
    let t = Counting(AtomicUsize::new(0));
    assert_eq!(translate(&t, "").await, "");
    assert_eq!(t.0.load(Ordering::SeqCst), 0);
    assert_eq!(translate(&t, "Hello").await, "வணக்கம்");
    assert_eq!(t.0.load(Ordering::SeqCst), 1);
}
