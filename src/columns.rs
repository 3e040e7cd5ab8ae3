//! Column specifications: which fields a report shows, in which order, and
//! how each one is formatted.

use std::fmt;

/// Field identifiers known to the exporter.
///
/// `Other` covers wire keys this crate has no special handling for; they are
/// looked up verbatim and rendered as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Id,
    ContributorName,
    Amount,
    Weight,
    Notes,
    Place,
    MaterialType,
    Description,
    Category,
    Date,
    CreatedAt,
    Other(String),
}

/// Per-column formatting rule applied by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFormat {
    /// Currency-style, 2 fractional digits. Feeds the totals row.
    Amount,
    /// 3 fractional digits.
    Weight,
    Verbatim,
}

impl ColumnKey {
    pub fn wire_name(&self) -> &str {
        match self {
            ColumnKey::Id => "id",
            ColumnKey::ContributorName => "contributor_name",
            ColumnKey::Amount => "amount",
            ColumnKey::Weight => "weight",
            ColumnKey::Notes => "notes",
            ColumnKey::Place => "place",
            ColumnKey::MaterialType => "material_type",
            ColumnKey::Description => "description",
            ColumnKey::Category => "category",
            ColumnKey::Date => "date",
            ColumnKey::CreatedAt => "created_at",
            ColumnKey::Other(name) => name,
        }
    }

    pub fn from_wire(name: &str) -> Self {
        match name {
            "id" => ColumnKey::Id,
            "contributor_name" => ColumnKey::ContributorName,
            "amount" => ColumnKey::Amount,
            "weight" => ColumnKey::Weight,
            "notes" => ColumnKey::Notes,
            "place" => ColumnKey::Place,
            "material_type" => ColumnKey::MaterialType,
            "description" => ColumnKey::Description,
            "category" => ColumnKey::Category,
            "date" => ColumnKey::Date,
            "created_at" => ColumnKey::CreatedAt,
            other => ColumnKey::Other(other.to_string()),
        }
    }

    pub fn format(&self) -> CellFormat {
        match self {
            ColumnKey::Amount => CellFormat::Amount,
            ColumnKey::Weight => CellFormat::Weight,
            _ => CellFormat::Verbatim,
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub label: String,
    pub key: ColumnKey,
}

impl Column {
    pub fn new(label: impl Into<String>, key: ColumnKey) -> Self {
        Self {
            label: label.into(),
            key,
        }
    }
}

/// Shape of a report: one table, or paired income/expense tables.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnSpec {
    Flat(Vec<Column>),
    Dual {
        income: Vec<Column>,
        expense: Vec<Column>,
    },
}

/// The three exports the dashboard offers per event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Moi,
    Material,
    Finance,
}

impl ReportKind {
    pub fn columns(self) -> ColumnSpec {
        match self {
            ReportKind::Moi => ColumnSpec::Flat(vec![
                Column::new("Contributor Name", ColumnKey::ContributorName),
                Column::new("Amount", ColumnKey::Amount),
                Column::new("Notes", ColumnKey::Notes),
                Column::new("Place", ColumnKey::Place),
                Column::new("Date", ColumnKey::CreatedAt),
            ]),
            ReportKind::Material => ColumnSpec::Flat(vec![
                Column::new("Contributor Name", ColumnKey::ContributorName),
                Column::new("Material Type", ColumnKey::MaterialType),
                Column::new("Weight", ColumnKey::Weight),
                Column::new("Description", ColumnKey::Description),
                Column::new("Place", ColumnKey::Place),
                Column::new("Date", ColumnKey::CreatedAt),
            ]),
            ReportKind::Finance => {
                let cols = || {
                    vec![
                        Column::new("Date", ColumnKey::Date),
                        Column::new("Category", ColumnKey::Category),
                        Column::new("Description", ColumnKey::Description),
                        Column::new("Amount", ColumnKey::Amount),
                    ]
                };
                ColumnSpec::Dual {
                    income: cols(),
                    expense: cols(),
                }
            }
        }
    }

    /// Base file name without extension, e.g. `material-entries-event-7`.
    pub fn file_stem(self, event_id: i64) -> String {
        let kind = match self {
            ReportKind::Moi => "moi-entries",
            ReportKind::Material => "material-entries",
            ReportKind::Finance => "finance-report",
        };
        format!("{}-event-{}", kind, event_id)
    }

    pub fn title(self) -> &'static str {
        match self {
            ReportKind::Moi => "Moi Entries",
            ReportKind::Material => "Material Entries",
            ReportKind::Finance => "Finance Report",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for key in [
            ColumnKey::Id,
            ColumnKey::ContributorName,
            ColumnKey::Amount,
            ColumnKey::Weight,
            ColumnKey::CreatedAt,
        ] {
            assert_eq!(ColumnKey::from_wire(key.wire_name()), key);
        }
        assert_eq!(
            ColumnKey::from_wire("gift_code"),
            ColumnKey::Other("gift_code".into())
        );
    }

    #[test]
    fn only_amount_and_weight_are_numeric() {
        assert_eq!(ColumnKey::Amount.format(), CellFormat::Amount);
        assert_eq!(ColumnKey::Weight.format(), CellFormat::Weight);
        assert_eq!(ColumnKey::from_wire("Amount").format(), CellFormat::Verbatim);
    }

    #[test]
    fn file_stems_follow_kind() {
        assert_eq!(ReportKind::Material.file_stem(7), "material-entries-event-7");
        assert_eq!(ReportKind::Finance.file_stem(12), "finance-report-event-12");
    }

    #[test]
    fn finance_is_dual() {
        match ReportKind::Finance.columns() {
            ColumnSpec::Dual { income, expense } => {
                assert_eq!(income.len(), 4);
                assert_eq!(income, expense);
            }
            ColumnSpec::Flat(_) => panic!("finance report must be dual"),
        }
    }
}
