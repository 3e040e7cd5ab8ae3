//! Moi export with Tamil translations of names, notes and places.

use crate::config::TranslateConfig;
use crate::document::{paint, DrawOp, FontSource, Pager, TableStyle, ACCENT_NAVY, BLACK, MARGIN_X, PAGE_W, PLAIN_START_Y};
use crate::error::{ExportError, Result};
use crate::output::{write_workbook, Artifact, SheetGrid};
use crate::translate::{translate_all, Translator};
use crate::types::{Cell, MoiEntry, Scalar};
use crate::util::format_fixed;
use chrono::NaiveDateTime;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedMoi {
    pub entry: MoiEntry,
    pub name_ta: String,
    pub notes_ta: String,
    pub place_ta: String,
}

impl TranslatedMoi {
    fn amount(&self) -> Option<f64> {
        self.entry.amount.as_ref().and_then(Scalar::as_f64)
    }
}

pub fn file_stem(event_id: i64) -> String {
    format!("MOY_Entries_Tamil_Event_{}", event_id)
}

fn field(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}

/// Translate every entry's name, notes and place in one bounded batch.
pub async fn translate_entries<T: Translator + ?Sized>(
    translator: &T,
    entries: &[MoiEntry],
    config: &TranslateConfig,
) -> Vec<TranslatedMoi> {
    let texts: Vec<String> = entries
        .iter()
        .flat_map(|e| [field(&e.contributor_name), field(&e.notes), field(&e.place)])
        .collect();
    let translated = translate_all(translator, &texts, config).await;
    info!(entries = entries.len(), fields = texts.len(), "translated moi entries");
    entries
        .iter()
        .zip(translated.chunks(3))
        .map(|(entry, t)| TranslatedMoi {
            entry: entry.clone(),
            name_ta: t.first().cloned().unwrap_or_default(),
            notes_ta: t.get(1).cloned().unwrap_or_default(),
            place_ta: t.get(2).cloned().unwrap_or_default(),
        })
        .collect()
}

fn total(entries: &[TranslatedMoi]) -> f64 {
    entries.iter().filter_map(TranslatedMoi::amount).sum()
}

fn ensure_entries(entries: &[TranslatedMoi], event_id: i64) -> Result<()> {
    if entries.is_empty() {
        return Err(ExportError::NotFound(format!("moi entries for event {}", event_id)));
    }
    Ok(())
}

/// Single sheet of translated text with a numeric total row.
pub fn layout_workbook(entries: &[TranslatedMoi]) -> SheetGrid {
    let header = ["Name", "Amount", "Notes", "Place"].map(Cell::from).to_vec();
    let amount_cell = |e: &TranslatedMoi| match (&e.entry.amount, e.amount()) {
        (_, Some(n)) => Cell::Number(n),
        (Some(raw), None) => Cell::Text(raw.to_string()),
        (None, None) => Cell::Blank,
    };
    let mut rows = vec![header];
    rows.extend(entries.iter().map(|e| {
        vec![
            Cell::Text(e.name_ta.clone()),
            amount_cell(e),
            Cell::Text(e.notes_ta.clone()),
            Cell::Text(e.place_ta.clone()),
        ]
    }));
    rows.push(vec![Cell::from("Total"), Cell::Number(total(entries)), Cell::Blank, Cell::Blank]);
    SheetGrid {
        name: "Tamil Translations".to_string(),
        rows,
    }
}

pub fn render_workbook(entries: &[TranslatedMoi], event_id: i64) -> Result<Artifact> {
    ensure_entries(entries, event_id)?;
    Ok(Artifact {
        file_name: format!("{}.xlsx", file_stem(event_id)),
        bytes: write_workbook(&[layout_workbook(entries)])?,
    })
}

pub fn layout_document(
    entries: &[TranslatedMoi],
    event_id: i64,
    generated_at: NaiveDateTime,
) -> crate::document::DocumentLayout {
    let mut pager = Pager::new(PLAIN_START_Y);
    pager.text(MARGIN_X, 20.0, 16.0, true, ACCENT_NAVY, "MOY Entries - Tamil Translation");
    pager.push_op(DrawOp::Line {
        x1: MARGIN_X,
        y1: 23.0,
        x2: PAGE_W - MARGIN_X,
        y2: 23.0,
        color: ACCENT_NAVY,
    });
    pager.text(MARGIN_X, 30.0, 10.0, false, BLACK, format!("Event ID: {}", event_id));
    pager.text(
        MARGIN_X,
        36.0,
        10.0,
        false,
        BLACK,
        format!("Generated on: {}", generated_at.format("%-d/%-m/%Y, %-I:%M:%S %P")),
    );
    pager.y = 42.0;

    let headers: Vec<String> = ["ID", "Name", "Tamil Name", "Amount", "Notes", "Tamil Notes", "Place"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            let amount = e
                .entry
                .amount
                .as_ref()
                .map(|a| format!("₹{}", a))
                .unwrap_or_default();
            vec![
                e.entry.id.map(|i| i.to_string()).unwrap_or_default(),
                field(&e.entry.contributor_name),
                e.name_ta.clone(),
                amount,
                field(&e.entry.notes),
                e.notes_ta.clone(),
                e.place_ta.clone(),
            ]
        })
        .collect();
    pager.table(
        &headers,
        &rows,
        &TableStyle {
            accent: ACCENT_NAVY,
            zebra: true,
        },
    );

    pager.y += 10.0;
    pager.ensure(6.0);
    let y = pager.y;
    pager.text(
        MARGIN_X,
        y,
        11.0,
        true,
        BLACK,
        format!("Total Amount: ₹{}", format_fixed(total(entries), 2)),
    );
    pager.finish()
}

/// Translated PDF. Needs a font with Tamil glyphs; fails before any layout
/// work when none is configured.
pub fn render_document(
    entries: &[TranslatedMoi],
    event_id: i64,
    generated_at: NaiveDateTime,
    font: Option<&Path>,
) -> Result<Artifact> {
    let font = font.ok_or(ExportError::MissingFont { script: "Tamil" })?;
    ensure_entries(entries, event_id)?;
    let layout = layout_document(entries, event_id, generated_at);
    let stem = file_stem(event_id);
    Ok(Artifact {
        file_name: format!("{}.pdf", stem),
        bytes: paint(&layout, &stem, FontSource::External(font))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::Passthrough;
    use async_trait::async_trait;

    struct Fixed;

    #[async_trait]
    impl Translator for Fixed {
        async fn request(&self, text: &str) -> Result<String> {
            Ok(match text {
                "Ramesh Kumar" => "ரமேஷ் குமார்".to_string(),
                "Chennai" => "சென்னை".to_string(),
                _ => "Sorry, I cannot translate that".to_string(),
            })
        }
    }

    fn entries() -> Vec<MoiEntry> {
        vec![
            MoiEntry {
                id: Some(1),
                contributor_name: Some("Ramesh Kumar".into()),
                amount: Some(Scalar::Number(5000.0)),
                notes: Some("Best wishes".into()),
                place: Some("Chennai".into()),
                ..Default::default()
            },
            MoiEntry {
                id: Some(2),
                contributor_name: Some("Priya".into()),
                amount: Some(Scalar::text("n/a")),
                notes: None,
                place: Some("Madurai".into()),
                ..Default::default()
            },
        ]
    }

    fn generated() -> NaiveDateTime {
        crate::util::parse_timestamp("2024-01-02T15:04:05").unwrap()
    }

    #[tokio::test]
    async fn translation_falls_back_per_field() {
        let out = translate_entries(&Fixed, &entries(), &TranslateConfig::default()).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name_ta, "ரமேஷ் குமார்");
        assert_eq!(out[0].notes_ta, "Best wishes");
        assert_eq!(out[0].place_ta, "சென்னை");
        assert_eq!(out[1].notes_ta, "");
        assert_eq!(out[1].place_ta, "Madurai");
    }

    #[tokio::test]
    async fn translated_entries_carry_their_source_entry() {
        let source = entries();
        let out = translate_entries(&Passthrough, &source, &TranslateConfig::default()).await;
        assert_eq!(out[1].entry, source[1]);
        assert_eq!(
            out[0],
            TranslatedMoi {
                entry: source[0].clone(),
                name_ta: "Ramesh Kumar".into(),
                notes_ta: "Best wishes".into(),
                place_ta: "Chennai".into(),
            }
        );
    }

    #[tokio::test]
    async fn workbook_totals_valid_amounts() {
        let out = translate_entries(&Passthrough, &entries(), &TranslateConfig::default()).await;
        let grid = layout_workbook(&out);
        assert_eq!(grid.name, "Tamil Translations");
        assert_eq!(grid.rows.len(), 4);
        assert_eq!(grid.rows[2][1], Cell::from("n/a"));
        assert_eq!(grid.rows[3], vec![Cell::from("Total"), Cell::Number(5000.0), Cell::Blank, Cell::Blank]);
        let artifact = render_workbook(&out, 4).unwrap();
        assert_eq!(artifact.file_name, "MOY_Entries_Tamil_Event_4.xlsx");
    }

    #[tokio::test]
    async fn document_layout_lists_entries() {
        let out = translate_entries(&Fixed, &entries(), &TranslateConfig::default()).await;
        let layout = layout_document(&out, 4, generated());
        assert!(layout.has_text("MOY Entries - Tamil Translation"));
        assert!(layout.has_text("Event ID: 4"));
        assert!(layout.has_text("Generated on: 2/1/2024, 3:04:05 pm"));
        assert!(layout.has_text("₹5000"));
        assert!(layout.has_text("Total Amount: ₹5000.00"));
    }

    #[test]
    fn document_needs_a_font() {
        let err = render_document(&[], 4, generated(), None).unwrap_err();
        assert!(matches!(err, ExportError::MissingFont { .. }));
    }

    #[test]
    fn empty_export_is_not_found() {
        assert!(matches!(render_workbook(&[], 9), Err(ExportError::NotFound(_))));
    }
}
