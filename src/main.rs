// Entry point and high-level CLI flow.
//
// - Option [1] fetches one event's records from the backend.
// - Option [2] reads the same records from local JSON/CSV files.
// - Option [3] renders every export (xlsx, pdf, csv) plus a JSON summary.
// - Option [4] renders the Tamil-translated Moi export.
// - Option [5] adds, edits or deletes entries on the backend.
// Every option except loading from files requires a logged-in session.
use moi_report::columns::ReportKind;
use moi_report::config::{Config, DEFAULT_CONFIG_FILE};
use moi_report::document::render_document;
use moi_report::loader::{load_entries_file, ApiClient, Collection, Entry, EventBundle};
use moi_report::output::{deliver, preview_report, render_csv, render_workbook, write_json, Artifact, DirectorySink};
use moi_report::reports::{generate_summary, report_for, split_finance};
use moi_report::session::Session;
use moi_report::tamil;
use moi_report::translate::{GeminiTranslator, Passthrough, Translator};
use moi_report::types::{DetailedFinanceSummary, FinanceEntry, MaterialEntry, MoiEntry, Report, Scalar};
use moi_report::util::{format_int, format_number, parse_amount};
use moi_report::{ExportError, Result};
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// The loaded event stays in memory so exports can be regenerated without
// fetching again.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        bundle: None,
        session: Session::anonymous(),
    })
});

struct AppState {
    bundle: Option<EventBundle>,
    session: Session,
}

const REPORT_KINDS: [ReportKind; 3] = [ReportKind::Moi, ReportKind::Material, ReportKind::Finance];

fn with_state<T>(f: impl FnOnce(&mut AppState) -> T) -> T {
    let mut state = APP_STATE.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut state)
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    prompt("Enter choice")
}

fn prompt(label: &str) -> String {
    print!("{}: ", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn prompt_optional(label: &str) -> Option<String> {
    let v = prompt(label);
    (!v.is_empty()).then_some(v)
}

fn prompt_id(label: &str) -> Option<i64> {
    let raw = prompt(label);
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            println!("Invalid number: {:?}\n", raw);
            None
        }
    }
}

/// Ask the user whether to go back to the main menu after an export.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        let resp = prompt("Back to main menu (Y/N)").to_uppercase();
        match resp.as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

fn require_login() -> bool {
    with_state(|s| match s.session.require_user() {
        Ok(_) => true,
        Err(e) => {
            println!("{}. Please log in first.\n", e);
            false
        }
    })
}

async fn handle_login(client: &ApiClient, config: &Config) {
    let username = prompt("Username");
    let password = prompt("Password");
    match client.login(&username, &password).await {
        Ok(user) => match Session::start(user, Some(&config.session_file)) {
            Ok(session) => {
                let name = session
                    .current_user()
                    .map(|u| if u.name.is_empty() { u.username.clone() } else { u.name.clone() })
                    .unwrap_or_default();
                println!("Welcome, {}.\n", name);
                with_state(|s| s.session = session);
            }
            Err(e) => eprintln!("Could not save session: {}\n", e),
        },
        Err(e) => eprintln!("Login failed: {}\n", e),
    }
}

fn handle_logout() {
    let result = with_state(|s| s.session.logout());
    match result {
        Ok(()) => println!("Logged out.\n"),
        Err(e) => eprintln!("Logout failed: {}\n", e),
    }
}

fn print_loaded(bundle: &EventBundle) {
    if let Some(event) = &bundle.event {
        println!("Event: {} ({}, {})", event.name, event.event_type, event.location);
    }
    println!(
        "Loaded {} moi entries, {} material entries, {} income and {} expense entries.\n",
        format_int(bundle.moi.len()),
        format_int(bundle.material.len()),
        format_int(bundle.finance.income_entries.len()),
        format_int(bundle.finance.expense_entries.len()),
    );
}

/// Handle option [1]: fetch an event and its three datasets.
async fn handle_load(client: &ApiClient) {
    match client.events().await {
        Ok(events) if !events.is_empty() => {
            println!("Available events:");
            for e in &events {
                println!("  [{}] {} - {}", e.id.unwrap_or_default(), e.name, e.date);
            }
            println!();
        }
        Ok(_) => println!("No events found.\n"),
        Err(e) => warn!(error = %e, "could not list events"),
    }
    let Some(event_id) = prompt_id("Event ID") else {
        return;
    };
    match client.load_event_bundle(event_id).await {
        Ok(bundle) => {
            print_loaded(&bundle);
            with_state(|s| s.bundle = Some(bundle));
        }
        Err(e) => eprintln!("Failed to load event {}: {}\n", event_id, e),
    }
}

fn find_data_file(dir: &Path, stem: &str) -> Option<PathBuf> {
    ["json", "csv"]
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|p| p.exists())
}

fn load_dataset<T: serde::de::DeserializeOwned>(dir: &Path, stem: &str) -> Result<Vec<T>> {
    let Some(path) = find_data_file(dir, stem) else {
        warn!(dir = %dir.display(), stem, "no data file; treating as empty");
        return Ok(Vec::new());
    };
    let (rows, report) = load_entries_file(&path)?;
    println!(
        "{}: {} rows read, {} skipped",
        path.display(),
        format_int(report.total_rows),
        format_int(report.parse_errors)
    );
    Ok(rows)
}

/// Handle option [2]: read `moi`, `material` and `finance` files from a
/// directory. Offline finance data carries no backend summary, so totals
/// are derived from the rows.
fn handle_load_files() {
    let Some(event_id) = prompt_id("Event ID") else {
        return;
    };
    let dir = PathBuf::from(prompt("Data directory"));
    let loaded = (|| -> Result<EventBundle> {
        let moi: Vec<MoiEntry> = load_dataset(&dir, "moi")?;
        let material: Vec<MaterialEntry> = load_dataset(&dir, "material")?;
        let finance: Vec<FinanceEntry> = load_dataset(&dir, "finance")?;
        let (income_entries, expense_entries) = split_finance(&finance);
        Ok(EventBundle {
            event_id,
            event: None,
            moi,
            material,
            finance: DetailedFinanceSummary {
                income_entries,
                expense_entries,
                ..Default::default()
            },
        })
    })();
    match loaded {
        Ok(bundle) => {
            println!();
            print_loaded(&bundle);
            with_state(|s| s.bundle = Some(bundle));
        }
        Err(e) => eprintln!("Failed to read files: {}\n", e),
    }
}

fn loaded_bundle() -> Option<EventBundle> {
    let bundle = with_state(|s| s.bundle.clone());
    if bundle.is_none() {
        println!("Error: No event loaded. Please load event data first (option 1 or 2).\n");
    }
    bundle
}

fn save_all(artifacts: &[Artifact], sink: &DirectorySink) {
    for artifact in artifacts {
        match deliver(artifact, sink) {
            Ok(path) => println!("  saved {}", path.display()),
            Err(e) => {
                error!(file = %artifact.file_name, error = %e, "delivery failed");
                eprintln!("  export failed: {}", e);
            }
        }
    }
}

fn render_all(report: &Report, file_name: &str, bundle: &EventBundle) -> Result<Vec<Artifact>> {
    let mut artifacts = vec![
        render_workbook(report, file_name)?,
        render_document(report, file_name, bundle.event.as_ref())?,
    ];
    artifacts.extend(render_csv(report, file_name)?);
    Ok(artifacts)
}

/// Handle option [3]: render all three exports and the JSON summary.
fn handle_generate_reports(config: &Config) {
    let Some(bundle) = loaded_bundle() else {
        return;
    };
    let sink = DirectorySink::new(&config.output_dir);
    println!("Generating reports...\n");

    let mut finance_report = None;
    for kind in REPORT_KINDS {
        let report = report_for(kind, &bundle);
        let file_name = kind.file_stem(bundle.event_id);
        println!("{}", kind.title());
        preview_report(&report, 3);
        if let Report::Dual(d) = &report {
            println!(
                "Total Income: {}  Total Expenses: {}  Balance: {}",
                format_number(d.summary.total_income, 2),
                format_number(d.summary.total_expense, 2),
                format_number(d.summary.balance, 2)
            );
            if let Some(diff) = &d.discrepancy {
                println!(
                    "Note: backend totals differ from the entries (entries give income {}, expenses {}).",
                    format_number(diff.from_rows.total_income, 2),
                    format_number(diff.from_rows.total_expense, 2)
                );
            }
        }
        match render_all(&report, &file_name, &bundle) {
            Ok(artifacts) => save_all(&artifacts, &sink),
            Err(e) => {
                error!(file = %file_name, error = %e, "render failed");
                eprintln!("Export failed for {}: {}", file_name, e);
            }
        }
        println!();
        if kind == ReportKind::Finance {
            finance_report = Some(report);
        }
    }

    let Some(finance_report) = finance_report else {
        return;
    };
    let summary = generate_summary(bundle.event_id, &bundle.moi, &bundle.material, &finance_report);
    let path = config
        .output_dir
        .join(format!("summary-event-{}.json", bundle.event_id));
    if let Err(e) = write_json(&path, &summary) {
        eprintln!("Write error: {}", e);
    }
    println!("Summary Stats ({}):", path.display());
    println!(
        "{{\"moi_total\": {}, \"material_weight\": {}, \"balance\": {}}}\n",
        format_number(summary.moi_total, 2),
        format_number(summary.material_weight, 3),
        format_number(summary.balance, 2)
    );
}

fn translator_for(config: &Config) -> Box<dyn Translator> {
    match GeminiTranslator::new(&config.translation) {
        Ok(t) => Box::new(t),
        Err(e) => {
            warn!(error = %e, "translation backend unavailable; exporting untranslated text");
            Box::new(Passthrough)
        }
    }
}

/// Handle option [4]: Tamil workbook, plus the PDF when a font is configured.
async fn handle_tamil_export(config: &Config) {
    let Some(bundle) = loaded_bundle() else {
        return;
    };
    let translator = translator_for(config);
    println!("Translating {} entries...", format_int(bundle.moi.len()));
    let entries = tamil::translate_entries(translator.as_ref(), &bundle.moi, &config.translation).await;
    let sink = DirectorySink::new(&config.output_dir);

    match tamil::render_workbook(&entries, bundle.event_id) {
        Ok(artifact) => save_all(&[artifact], &sink),
        Err(e) => eprintln!("Export failed: {}", e),
    }
    let generated_at = chrono::Local::now().naive_local();
    match tamil::render_document(&entries, bundle.event_id, generated_at, config.tamil_font_path.as_deref()) {
        Ok(artifact) => save_all(&[artifact], &sink),
        Err(ExportError::MissingFont { script }) => {
            println!("Skipping PDF: set tamil_font_path (or MOI_TAMIL_FONT) to a font with {} glyphs.", script)
        }
        Err(e) => eprintln!("Export failed: {}", e),
    }
    println!();
}

fn choose_collection() -> Option<Collection> {
    println!("[1] Moi entries  [2] Material entries  [3] Finance entries");
    match read_choice().as_str() {
        "1" => Some(Collection::MoiEntries),
        "2" => Some(Collection::MaterialEntries),
        "3" => Some(Collection::Finance),
        _ => {
            println!("Invalid choice.\n");
            None
        }
    }
}

/// Numbers are sent as JSON numbers; anything else as typed.
fn prompt_scalar(label: &str) -> Option<Scalar> {
    prompt_optional(label).map(|v| match parse_amount(&v) {
        Some(n) => Scalar::Number(n),
        None => Scalar::Text(v),
    })
}

fn moi_form(event_id: Option<i64>) -> MoiEntry {
    MoiEntry {
        event_id,
        contributor_name: prompt_optional("Contributor name"),
        amount: prompt_scalar("Amount"),
        notes: prompt_optional("Notes"),
        place: prompt_optional("Place"),
        ..Default::default()
    }
}

fn material_form(event_id: Option<i64>) -> MaterialEntry {
    MaterialEntry {
        event_id,
        contributor_name: prompt_optional("Contributor name"),
        material_type: prompt_optional("Material type"),
        weight: prompt_scalar("Weight (g)"),
        description: prompt_optional("Description"),
        place: prompt_optional("Place"),
        ..Default::default()
    }
}

fn finance_form(event_id: Option<i64>) -> FinanceEntry {
    FinanceEntry {
        event_id,
        kind: prompt_optional("Type (INCOME/EXPENSE)").map(|t| t.to_uppercase()),
        amount: prompt_scalar("Amount"),
        category: prompt_optional("Category"),
        description: prompt_optional("Description"),
        date: prompt_optional("Date (YYYY-MM-DD)"),
        ..Default::default()
    }
}

/// Create when `id` is `None`, otherwise edit that entry.
async fn submit<E: Entry>(client: &ApiClient, id: Option<i64>, entry: &E) -> Result<&'static str> {
    match id {
        Some(id) => client.update(id, entry).await.map(|_| "Entry updated."),
        None => client.create(entry).await.map(|_| "Entry added."),
    }
}

/// Handle option [5]: the entry mutations the dashboard forms issue. The
/// loaded event is refreshed afterwards so exports see the change.
async fn handle_manage_entries(client: &ApiClient) {
    println!("[1] Add entry  [2] Edit entry  [3] Delete entry");
    let action = read_choice();
    if !["1", "2", "3"].contains(&action.as_str()) {
        println!("Invalid choice.\n");
        return;
    }
    let Some(collection) = choose_collection() else {
        return;
    };
    let loaded_event = with_state(|s| s.bundle.as_ref().map(|b| b.event_id));

    let (event_id, edit_id) = match action.as_str() {
        "1" => match loaded_event.or_else(|| prompt_id("Event ID")) {
            Some(event_id) => (Some(event_id), None),
            None => return,
        },
        _ => match prompt_id("Entry ID") {
            Some(id) => (loaded_event, Some(id)),
            None => return,
        },
    };

    let outcome = if action == "3" {
        match edit_id {
            Some(id) => client.delete(collection, id).await.map(|_| "Entry deleted."),
            None => return,
        }
    } else {
        match collection {
            Collection::MoiEntries => submit(client, edit_id, &moi_form(event_id)).await,
            Collection::MaterialEntries => submit(client, edit_id, &material_form(event_id)).await,
            Collection::Finance => submit(client, edit_id, &finance_form(event_id)).await,
        }
    };
    let event_id = loaded_event;
    match outcome {
        Ok(msg) => {
            println!("{}\n", msg);
            if let Some(event_id) = event_id {
                match client.load_event_bundle(event_id).await {
                    Ok(bundle) => with_state(|s| s.bundle = Some(bundle)),
                    Err(e) => warn!(event_id, error = %e, "refresh after edit failed"),
                }
            }
        }
        Err(e) => eprintln!("Request failed: {}\n", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = Config::load(Path::new(DEFAULT_CONFIG_FILE))?;
    let client = ApiClient::new(&config.api)?;
    let session = Session::load(&config.session_file);
    info!(api = %config.api.base_url, authenticated = session.is_authenticated(), "starting");
    with_state(|s| s.session = session);

    loop {
        let logged_in = with_state(|s| s.session.is_authenticated());
        println!("Event Export Menu:");
        println!("[1] Load event data");
        println!("[2] Load event data from files");
        println!("[3] Generate Reports");
        println!("[4] Tamil Moi export");
        println!("[5] Manage entries");
        println!("[6] {}", if logged_in { "Logout" } else { "Login" });
        println!("[0] Exit\n");
        match read_choice().as_str() {
            "1" => {
                if require_login() {
                    handle_load(&client).await;
                }
            }
            "2" => handle_load_files(),
            "3" => {
                if require_login() {
                    println!();
                    handle_generate_reports(&config);
                    if !prompt_back_to_menu() {
                        break;
                    }
                }
            }
            "4" => {
                if require_login() {
                    handle_tamil_export(&config).await;
                    if !prompt_back_to_menu() {
                        break;
                    }
                }
            }
            "5" => {
                if require_login() {
                    handle_manage_entries(&client).await;
                }
            }
            "6" if logged_in => handle_logout(),
            "6" => handle_login(&client, &config).await,
            "0" => break,
            _ => println!("Invalid choice. Please enter a number from 0 to 6.\n"),
        }
    }
    println!("Exiting the program.");
    Ok(())
}
