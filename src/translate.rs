//! Tamil machine translation for contributor-facing text.
//!
//! Translation never fails an export: blank input short-circuits, and any
//! error, timeout or answer without Tamil script falls back to the original
//! text.

use crate::config::TranslateConfig;
use crate::error::{ExportError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Tamil Unicode block.
pub const TAMIL_RANGE: std::ops::RangeInclusive<char> = '\u{0B80}'..='\u{0BFF}';

static EDGE_QUOTES: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^["']|["']$"#).expect("static regex"));
static PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(Here is the translation:|The translation is:|Translated text:|In Tamil:)\s*")
        .expect("static regex")
});

/// A backend that turns one piece of text into Tamil.
///
/// Implementations only perform the call; cleanup, validation and the
/// fall-back policy live in [`translate`].
#[async_trait]
pub trait Translator: Send + Sync {
    async fn request(&self, text: &str) -> Result<String>;
}

/// Strip quoting and boilerplate the model tends to wrap answers in.
pub fn clean_response(raw: &str) -> String {
    let unquoted = EDGE_QUOTES.replace_all(raw.trim(), "");
    PREAMBLE.replace(&unquoted, "").trim().to_string()
}

pub fn contains_tamil(s: &str) -> bool {
    s.chars().any(|c| TAMIL_RANGE.contains(&c))
}

enum Attempt {
    Done(String),
    Failed(ExportError),
}

async fn attempt<T: Translator + ?Sized>(translator: &T, text: &str) -> Attempt {
    match translator.request(text).await {
        Ok(raw) => {
            let cleaned = clean_response(&raw);
            if contains_tamil(&cleaned) {
                Attempt::Done(cleaned)
            } else {
                warn!(input = text, "translation has no Tamil characters, keeping original");
                Attempt::Done(text.to_string())
            }
        }
        Err(e) => Attempt::Failed(e),
    }
}

/// Translate once, falling back to `text` on any failure.
pub async fn translate<T: Translator + ?Sized>(translator: &T, text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    match attempt(translator, text).await {
        Attempt::Done(s) => s,
        Attempt::Failed(e) => {
            warn!(input = text, error = %e, "translation failed, keeping original");
            text.to_string()
        }
    }
}

/// Timeout and retry around a single translation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl From<&TranslateConfig> for RetryPolicy {
    fn from(c: &TranslateConfig) -> Self {
        Self {
            timeout: c.timeout(),
            max_retries: c.max_retries,
            backoff: Duration::from_millis(c.backoff_ms),
        }
    }
}

/// Like [`translate`], with a per-attempt timeout and exponential backoff
/// between failed attempts.
pub async fn translate_with_retry<T: Translator + ?Sized>(
    translator: &T,
    text: &str,
    policy: &RetryPolicy,
) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let mut tries = 0u32;
    loop {
        let err = match tokio::time::timeout(policy.timeout, attempt(translator, text)).await {
            Ok(Attempt::Done(s)) => return s,
            Ok(Attempt::Failed(e)) => e,
            Err(_) => ExportError::Translation(format!("timed out after {:?}", policy.timeout)),
        };
        if tries >= policy.max_retries {
            warn!(input = text, attempts = tries + 1, error = %err, "translation failed, keeping original");
            return text.to_string();
        }
        let delay = policy.backoff.saturating_mul(2u32.saturating_pow(tries));
        debug!(input = text, attempt = tries + 1, ?delay, error = %err, "retrying translation");
        tokio::time::sleep(delay).await;
        tries += 1;
    }
}

/// Translate many texts with at most `concurrency` requests in flight.
/// Results keep the input order.
pub async fn translate_all<T: Translator + ?Sized>(
    translator: &T,
    texts: &[String],
    config: &TranslateConfig,
) -> Vec<String> {
    let policy = RetryPolicy::from(config);
    let width = config.concurrency.max(1);
    debug!(count = texts.len(), width, "translating batch");
    stream::iter(texts.iter())
        .map(|t| translate_with_retry(translator, t, &policy))
        .buffered(width)
        .collect()
        .await
}

/// Returns its input; used when no translation backend is configured.
pub struct Passthrough;

#[async_trait]
impl Translator for Passthrough {
    async fn request(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

fn prompt(text: &str) -> String {
    format!(
        "Translate this text to Tamil: \"{}\". Provide ONLY the Tamil translation with proper Unicode encoding. \
         Do not include any English text, explanations, or quotation marks in your response.",
        text
    )
}

/// Client for a `generateContent` completion endpoint.
///
/// The key comes from the environment and travels in a header. With a proxy
/// configured no key is sent at all; the proxy adds it server-side.
pub struct GeminiTranslator {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl GeminiTranslator {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let (url, api_key) = match &config.proxy_url {
            Some(proxy) => (proxy.clone(), None),
            None => {
                let key = config.api_key().ok_or_else(|| {
                    ExportError::Config(format!(
                        "translation needs {} or a proxy_url",
                        config.api_key_env
                    ))
                })?;
                (config.endpoint.clone(), Some(key))
            }
        };
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl Translator for GeminiTranslator {
    async fn request(&self, text: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt(text)),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 1024,
            },
        };
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("x-goog-api-key", key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ExportError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        let parsed: GenerateResponse = resp.json().await?;
        parsed
            .first_text()
            .ok_or_else(|| ExportError::Translation("response carried no text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers from a fixed table, counting calls; unknown input errors.
    struct Table {
        answers: HashMap<String, String>,
        calls: AtomicUsize,
    }

    impl Table {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                answers: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Translator for Table {
        async fn request(&self, text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .get(text)
                .cloned()
                .ok_or_else(|| ExportError::Translation("unknown".into()))
        }
    }

    struct Flaky {
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for Flaky {
        async fn request(&self, _text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ExportError::Translation("503".into()));
            }
            Ok("சென்னை".into())
        }
    }

    struct Slow;

    #[async_trait]
    impl Translator for Slow {
        async fn request(&self, _text: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("சென்னை".into())
        }
    }

    /// Records the highest number of overlapping requests.
    struct Gauge {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Translator for Gauge {
        async fn request(&self, text: &str) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("த {}", text))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(50),
            max_retries: 2,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn cleanup_strips_quotes_and_preambles() {
        assert_eq!(clean_response("  \"சென்னை\"  "), "சென்னை");
        assert_eq!(clean_response("Here is the translation: மதுரை"), "மதுரை");
        assert_eq!(clean_response("in tamil: கோவை"), "கோவை");
        assert_eq!(clean_response("'The translation is: வாழ்த்துக்கள்'"), "வாழ்த்துக்கள்");
    }

    #[test]
    fn tamil_detection() {
        assert!(contains_tamil("Ramesh ரமேஷ்"));
        assert!(!contains_tamil("Ramesh Kumar"));
    }

    #[test]
    fn response_text_extraction() {
        let parsed: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "சென்னை"}], "role": "model"}}]
        }))
        .unwrap();
        assert_eq!(parsed.first_text().as_deref(), Some("சென்னை"));
        let empty: GenerateResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(empty.first_text().is_none());
    }

    #[test]
    fn gemini_requires_key_or_proxy() {
        let config = TranslateConfig {
            api_key_env: "MOI_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..TranslateConfig::default()
        };
        assert!(matches!(GeminiTranslator::new(&config), Err(ExportError::Config(_))));
        let proxied = TranslateConfig {
            proxy_url: Some("http://localhost:3000/api/translate".into()),
            ..config
        };
        assert!(GeminiTranslator::new(&proxied).is_ok());
    }

    #[tokio::test]
    async fn blank_input_makes_no_call() {
        let t = Table::new(&[]);
        assert_eq!(translate(&t, "").await, "");
        assert_eq!(translate(&t, "   ").await, "");
        assert_eq!(translate_with_retry(&t, "", &fast_policy()).await, "");
        assert_eq!(t.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_returns_original() {
        let t = Table::new(&[]);
        assert_eq!(translate(&t, "Chennai").await, "Chennai");
        assert_eq!(t.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_tamil_answer_returns_original() {
        let t = Table::new(&[("Chennai", "Here is the translation: Chennai")]);
        assert_eq!(translate(&t, "Chennai").await, "Chennai");
    }

    #[tokio::test]
    async fn successful_translation_is_cleaned() {
        let t = Table::new(&[("Chennai", "\"சென்னை\"")]);
        assert_eq!(translate(&t, "Chennai").await, "சென்னை");
    }

    #[tokio::test]
    async fn retries_until_success() {
        let t = Flaky {
            failures_left: AtomicUsize::new(2),
            calls: AtomicUsize::new(0),
        };
        assert_eq!(translate_with_retry(&t, "Chennai", &fast_policy()).await, "சென்னை");
        assert_eq!(t.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let t = Flaky {
            failures_left: AtomicUsize::new(10),
            calls: AtomicUsize::new(0),
        };
        assert_eq!(translate_with_retry(&t, "Chennai", &fast_policy()).await, "Chennai");
        assert_eq!(t.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn timeout_falls_back() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..fast_policy()
        };
        assert_eq!(translate_with_retry(&Slow, "Madurai", &policy).await, "Madurai");
    }

    #[tokio::test]
    async fn batch_is_bounded_and_ordered() {
        let g = Gauge {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let texts: Vec<String> = (0..12).map(|i| format!("t{i}")).collect();
        let config = TranslateConfig {
            concurrency: 3,
            ..TranslateConfig::default()
        };
        let out = translate_all(&g, &texts, &config).await;
        assert_eq!(out.len(), 12);
        assert_eq!(out[0], "த t0");
        assert_eq!(out[11], "த t11");
        assert!(g.peak.load(Ordering::SeqCst) <= 3);
        assert!(g.peak.load(Ordering::SeqCst) >= 2);
    }
}
