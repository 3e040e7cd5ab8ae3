// Data intake: the REST backend client and an offline file loader.
//
// Every fetch returns typed entries; nothing here formats amounts. The only
// preparation applied before assembly is turning timestamps into the short
// dates shown in exports (`localize_*`).
use crate::config::ApiConfig;
use crate::error::{ExportError, Result};
use crate::session::User;
use crate::types::{DetailedFinanceSummary, Event, FinanceEntry, FinanceKind, MaterialEntry, MoiEntry};
use crate::util::locale_date;
use csv::ReaderBuilder;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub parse_errors: usize,
}

/// Deserialize each JSON value on its own, skipping and counting the ones
/// that do not fit `T`.
pub fn decode_records<T: DeserializeOwned>(values: Vec<Value>) -> (Vec<T>, LoadReport) {
    let total_rows = values.len();
    let mut parse_errors = 0usize;
    let mut out = Vec::with_capacity(total_rows);
    for (idx, v) in values.into_iter().enumerate() {
        match serde_json::from_value::<T>(v) {
            Ok(r) => out.push(r),
            Err(e) => {
                debug!(row = idx + 1, error = %e, "skipping json row");
                parse_errors += 1;
            }
        }
    }
    (
        out,
        LoadReport {
            total_rows,
            parse_errors,
        },
    )
}

/// Load entries from a local `.json` (array of objects) or `.csv` file.
///
/// Rows that fail to deserialize are counted and skipped.
pub fn load_entries_file<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, LoadReport)> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if !is_csv {
        let raw = std::fs::read_to_string(path)?;
        let values: Vec<Value> = serde_json::from_str(&raw)?;
        return Ok(decode_records(values));
    }

    let mut total_rows = 0usize;
    let mut parse_errors = 0usize;
    let mut out = Vec::new();
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    for result in rdr.deserialize::<T>() {
        total_rows += 1;
        match result {
            Ok(r) => out.push(r),
            Err(e) => {
                debug!(row = total_rows, error = %e, "skipping csv row");
                parse_errors += 1;
            }
        }
    }

    Ok((
        out,
        LoadReport {
            total_rows,
            parse_errors,
        },
    ))
}

/// Backend collections that accept create/update/delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    MoiEntries,
    MaterialEntries,
    Finance,
}

impl Collection {
    pub fn path(self) -> &'static str {
        match self {
            Collection::MoiEntries => "moyentries",
            Collection::MaterialEntries => "materialentries",
            Collection::Finance => "finance",
        }
    }
}

/// An entry the dashboard forms can create and edit.
pub trait Entry: Serialize + Sync {
    const COLLECTION: Collection;

    /// Path a new entry is posted to.
    fn create_path(&self) -> Result<String> {
        Ok(Self::COLLECTION.path().to_string())
    }

    fn item_path(id: i64) -> String {
        format!("{}/{}", Self::COLLECTION.path(), id)
    }
}

impl Entry for MoiEntry {
    const COLLECTION: Collection = Collection::MoiEntries;
}

impl Entry for MaterialEntry {
    const COLLECTION: Collection = Collection::MaterialEntries;
}

impl Entry for FinanceEntry {
    const COLLECTION: Collection = Collection::Finance;

    /// New finance entries go to `finance/income` or `finance/expense`.
    fn create_path(&self) -> Result<String> {
        let side = match self.kind() {
            Some(FinanceKind::Income) => "income",
            Some(FinanceKind::Expense) => "expense",
            None => {
                return Err(ExportError::InvalidEntry(format!(
                    "finance type must be INCOME or EXPENSE, got {:?}",
                    self.kind.as_deref().unwrap_or("")
                )))
            }
        };
        Ok(format!("{}/{}", Self::COLLECTION.path(), side))
    }
}

/// Everything the exports need for one event.
#[derive(Debug, Clone, Default)]
pub struct EventBundle {
    pub event_id: i64,
    pub event: Option<Event>,
    pub moi: Vec<MoiEntry>,
    pub material: Vec<MaterialEntry>,
    pub finance: DetailedFinanceSummary,
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, req: RequestBuilder, url: &str) -> Result<reqwest::Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ExportError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "backend request failed");
            return Err(ExportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!(url, "GET");
        let resp = self.send(self.client.get(&url), &url).await?;
        Ok(resp.json().await?)
    }

    /// GET a JSON array, keeping every element that decodes.
    async fn get_records<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let values: Vec<Value> = self.get_json(path).await?;
        let (records, report) = decode_records(values);
        if report.parse_errors > 0 {
            warn!(
                path,
                skipped = report.parse_errors,
                total = report.total_rows,
                "skipped malformed records"
            );
        }
        Ok(records)
    }

    async fn write_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Value> {
        let url = self.url(path);
        debug!(url, %method, "write");
        let resp = self
            .send(self.client.request(method, &url).json(body), &url)
            .await?;
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn event(&self, event_id: i64) -> Result<Event> {
        self.get_json(&format!("events/{}", event_id)).await
    }

    pub async fn events(&self) -> Result<Vec<Event>> {
        self.get_records("events").await
    }

    pub async fn moi_entries(&self, event_id: i64) -> Result<Vec<MoiEntry>> {
        self.get_records(&format!("moyentries/event/{}", event_id))
            .await
    }

    pub async fn material_entries(&self, event_id: i64) -> Result<Vec<MaterialEntry>> {
        self.get_records(&format!("materialentries/event/{}", event_id))
            .await
    }

    pub async fn finance_entries(&self, event_id: i64) -> Result<Vec<FinanceEntry>> {
        self.get_records(&format!("finance/event/{}", event_id))
            .await
    }

    pub async fn finance_summary(&self, event_id: i64) -> Result<DetailedFinanceSummary> {
        self.get_json(&format!("finance/detailed-summary/{}", event_id))
            .await
    }

    pub async fn create<E: Entry>(&self, entry: &E) -> Result<Value> {
        let path = entry.create_path()?;
        self.write_json(Method::POST, &path, entry).await
    }

    pub async fn update<E: Entry>(&self, id: i64, entry: &E) -> Result<Value> {
        self.write_json(Method::PUT, &E::item_path(id), entry).await
    }

    pub async fn delete(&self, collection: Collection, id: i64) -> Result<()> {
        let url = self.url(&format!("{}/{}", collection.path(), id));
        debug!(url, "DELETE");
        self.send(self.client.delete(&url), &url).await?;
        Ok(())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let body = serde_json::json!({ "username": username, "password": password });
        let value = self.write_json(Method::POST, "users/login", &body).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fetch the event and its three datasets concurrently.
    ///
    /// Missing event metadata only costs the document header; any dataset
    /// failure fails the whole bundle.
    pub async fn load_event_bundle(&self, event_id: i64) -> Result<EventBundle> {
        let (event, moi, material, finance) = tokio::join!(
            self.event(event_id),
            self.moi_entries(event_id),
            self.material_entries(event_id),
            self.finance_summary(event_id),
        );
        let event = match event {
            Ok(e) => Some(e),
            Err(e) => {
                warn!(event_id, error = %e, "event details unavailable");
                None
            }
        };
        let bundle = EventBundle {
            event_id,
            event,
            moi: moi?,
            material: material?,
            finance: finance?,
        };
        info!(
            event_id,
            moi = bundle.moi.len(),
            material = bundle.material.len(),
            income = bundle.finance.income_entries.len(),
            expense = bundle.finance.expense_entries.len(),
            "event data loaded"
        );
        Ok(bundle)
    }
}

fn localize(field: &mut Option<String>) {
    if let Some(v) = field.as_mut() {
        *v = locale_date(v);
    }
}

pub fn localize_moi(entries: &mut [MoiEntry]) {
    for e in entries {
        localize(&mut e.created_at);
        localize(&mut e.date);
    }
}

pub fn localize_material(entries: &mut [MaterialEntry]) {
    for e in entries {
        localize(&mut e.created_at);
    }
}

pub fn localize_finance(entries: &mut [FinanceEntry]) {
    for e in entries {
        localize(&mut e.date);
        localize(&mut e.created_at);
    }
}
