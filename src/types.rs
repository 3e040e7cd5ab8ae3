use crate::columns::ColumnKey;
use crate::loader::decode_records;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// A raw field value as the backend sends it: amounts show up both as JSON
/// numbers and as strings, so both are accepted. Any other JSON shape is
/// kept as its text rather than rejecting the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn text(s: impl Into<String>) -> Self {
        Scalar::Text(s.into())
    }

    /// `None` for JSON `null`.
    pub fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Null => None,
            Value::Number(n) => n.as_f64().map(Scalar::Number),
            Value::String(s) => Some(Scalar::Text(s)),
            other => Some(Scalar::Text(other.to_string())),
        }
    }

    /// Numeric view, tolerant of formatted strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) if n.is_finite() => Some(*n),
            Scalar::Number(_) => None,
            Scalar::Text(s) => crate::util::parse_amount(s),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(Scalar::from_value(Value::deserialize(d)?).unwrap_or_else(|| Scalar::text("")))
    }
}

/// Strings that may arrive as `null` or as some other JSON value.
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Entry lists that drop malformed members instead of failing the parent.
fn lenient_records<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let values = Option::<Vec<Value>>::deserialize(d)?.unwrap_or_default();
    Ok(decode_records(values).0)
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// Anything a report column can be extracted from.
///
/// A missing field is `None`; the assembler turns that into a blank cell.
pub trait Record {
    fn value(&self, key: &ColumnKey) -> Option<Scalar>;
}

fn text(v: &Option<String>) -> Option<Scalar> {
    v.as_ref().map(|s| Scalar::Text(s.clone()))
}

fn int(v: Option<i64>) -> Option<Scalar> {
    v.map(|n| Scalar::Number(n as f64))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub location: String,
    #[serde(deserialize_with = "lenient_string")]
    pub event_type: String,
}

/// Monetary ("Moi") contribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoiEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i64>,
    pub contributor_name: Option<String>,
    pub amount: Option<Scalar>,
    pub notes: Option<String>,
    pub place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing)]
    pub created_at: Option<String>,
    #[serde(skip_serializing)]
    pub updated_at: Option<String>,
}

impl Record for MoiEntry {
    fn value(&self, key: &ColumnKey) -> Option<Scalar> {
        match key {
            ColumnKey::Id => int(self.id),
            ColumnKey::ContributorName => text(&self.contributor_name),
            ColumnKey::Amount => self.amount.clone(),
            ColumnKey::Notes => text(&self.notes),
            ColumnKey::Place => text(&self.place),
            ColumnKey::Date => text(&self.date),
            ColumnKey::CreatedAt => text(&self.created_at),
            _ => None,
        }
    }
}

/// Material / gold donation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i64>,
    pub contributor_name: Option<String>,
    pub material_type: Option<String>,
    pub weight: Option<Scalar>,
    pub description: Option<String>,
    pub place: Option<String>,
    #[serde(skip_serializing)]
    pub created_at: Option<String>,
    #[serde(skip_serializing)]
    pub updated_at: Option<String>,
}

impl Record for MaterialEntry {
    fn value(&self, key: &ColumnKey) -> Option<Scalar> {
        match key {
            ColumnKey::Id => int(self.id),
            ColumnKey::ContributorName => text(&self.contributor_name),
            ColumnKey::MaterialType => text(&self.material_type),
            ColumnKey::Weight => self.weight.clone(),
            ColumnKey::Description => text(&self.description),
            ColumnKey::Place => text(&self.place),
            ColumnKey::CreatedAt => text(&self.created_at),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinanceKind {
    Income,
    Expense,
}

/// Income or expense line for an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub amount: Option<Scalar>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
    #[serde(skip_serializing)]
    pub created_at: Option<String>,
    #[serde(skip_serializing)]
    pub updated_at: Option<String>,
}

impl FinanceEntry {
    pub fn kind(&self) -> Option<FinanceKind> {
        match self.kind.as_deref().map(str::trim) {
            Some(k) if k.eq_ignore_ascii_case("INCOME") => Some(FinanceKind::Income),
            Some(k) if k.eq_ignore_ascii_case("EXPENSE") => Some(FinanceKind::Expense),
            _ => None,
        }
    }
}

impl Record for FinanceEntry {
    fn value(&self, key: &ColumnKey) -> Option<Scalar> {
        match key {
            ColumnKey::Id => int(self.id),
            ColumnKey::Amount => self.amount.clone(),
            ColumnKey::Description => text(&self.description),
            ColumnKey::Date => text(&self.date),
            ColumnKey::Category => text(&self.category),
            ColumnKey::CreatedAt => text(&self.created_at),
            ColumnKey::Other(k) if k == "type" => text(&self.kind),
            _ => None,
        }
    }
}

/// Response of `GET /api/finance/detailed-summary/{event}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DetailedFinanceSummary {
    pub event_id: Option<Scalar>,
    pub total_income: Option<Scalar>,
    pub total_expense: Option<Scalar>,
    pub balance: Option<Scalar>,
    #[serde(deserialize_with = "lenient_records")]
    pub income_entries: Vec<FinanceEntry>,
    #[serde(deserialize_with = "lenient_records")]
    pub expense_entries: Vec<FinanceEntry>,
}

impl DetailedFinanceSummary {
    /// The backend's own figures, if all three are present and numeric.
    pub fn supplied_summary(&self) -> Option<Summary> {
        let total_income = self.total_income.as_ref()?.as_f64()?;
        let total_expense = self.total_expense.as_ref()?.as_f64()?;
        let balance = self.balance.as_ref()?.as_f64()?;
        Some(Summary {
            total_income,
            total_expense,
            balance,
        })
    }
}

/// Untyped JSON object, for callers whose rows have no dedicated type.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub serde_json::Map<String, Value>);

impl RawRecord {
    pub fn from_value(v: Value) -> Option<Self> {
        match v {
            Value::Object(map) => Some(RawRecord(map)),
            _ => None,
        }
    }
}

impl Record for RawRecord {
    fn value(&self, key: &ColumnKey) -> Option<Scalar> {
        Scalar::from_value(self.0.get(key.wire_name())?.clone())
    }
}

/// One extracted and formatted table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Blank,
    Text(String),
    Number(f64),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Blank => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => fmt::Display::fmt(&Scalar::Number(*n), f),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

/// A record after column extraction, keyed by display label in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedRow {
    pub cells: Vec<(String, Cell)>,
}

impl NormalizedRow {
    pub fn get(&self, label: &str) -> Option<&Cell> {
        self.cells.iter().find(|(l, _)| l == label).map(|(_, c)| c)
    }

    pub fn values(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().map(|(_, c)| c)
    }
}

/// One table of a report: data rows followed by the totals row.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub headers: Vec<String>,
    pub rows: Vec<NormalizedRow>,
    pub totals: NormalizedRow,
    /// Unformatted sum of the amount column.
    pub total: f64,
}

impl Section {
    /// Data rows plus the totals row.
    pub fn row_count(&self) -> usize {
        self.rows.len() + 1
    }

    pub fn all_rows(&self) -> impl Iterator<Item = &NormalizedRow> {
        self.rows.iter().chain(std::iter::once(&self.totals))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Summary {
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOrigin {
    /// Taken verbatim from the caller / backend.
    Supplied,
    /// Recomputed from the section rows.
    Derived,
}

/// A supplied summary that does not match the row data it came with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryDiscrepancy {
    pub supplied: Summary,
    pub from_rows: Summary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DualReport {
    pub income: Section,
    pub expense: Section,
    pub summary: Summary,
    pub summary_origin: SummaryOrigin,
    pub discrepancy: Option<SummaryDiscrepancy>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Single(Section),
    Dual(DualReport),
}
