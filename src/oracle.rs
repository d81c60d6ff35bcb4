// src/oracle.rs
//! Relevance oracle: provider abstraction + result cache + daily limit.
//!
//! The oracle is a black box that scores an article against a user's
//! interest profile. Concrete providers: a generic HTTP endpoint, a
//! deterministic mock for tests, and a disabled client.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::UserPreferences;
use crate::dedup::content_hash;
use crate::error::{PipelineError, Result};

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Verdict returned by the oracle for one article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OracleVerdict {
    /// Relevance in [0,1] against the user's interest profile.
    pub relevance_score: f64,
    pub reasoning: String,
    pub topic_category: String,
    pub confidence: f64,
}

impl OracleVerdict {
    /// Clamp scores and keep the reasoning to one sane line.
    pub fn sanitized(mut self) -> Self {
        self.relevance_score = self.relevance_score.clamp(0.0, 1.0);
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self.reasoning = sanitize_reasoning(&self.reasoning);
        self
    }
}

/// One scoring request. Content is already truncated by the caller.
#[derive(Debug, Clone)]
pub struct OracleRequest<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub user_context: &'a str,
    pub preferences: &'a UserPreferences,
}

/// Trait object used by the relevance stage and tests.
#[async_trait::async_trait]
pub trait RelevanceOracle: Send + Sync {
    async fn score(&self, req: OracleRequest<'_>) -> Result<OracleVerdict>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynOracle = Arc<dyn RelevanceOracle>;

/// Config loaded from `config/oracle.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub enabled: bool,
    /// "http" is the only real provider; anything else disables the oracle.
    pub provider: Option<String>,
    /// Optional per-day call limit; defaults to 200 if absent.
    pub daily_limit: Option<u32>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: None,
            daily_limit: Some(200),
            endpoint: None,
            model: None,
        }
    }
}

/// Load config from `config/oracle.json`. Falls back to defaults on error.
pub fn load_oracle_config() -> OracleConfig {
    let path = Path::new("config/oracle.json");
    match std::fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
        Err(_) => OracleConfig::default(),
    }
}

/// Factory: build a client according to config and environment.
///
/// * If `ORACLE_TEST_MODE=mock`, returns a deterministic mock.
/// * Else if `config.enabled == false`, returns a disabled client.
/// * Else builds the HTTP provider wrapped with caching + daily limit.
pub fn build_oracle_from_config(config: &OracleConfig) -> DynOracle {
    if std::env::var("ORACLE_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        let mock = MockOracle::fixed(0.8, "mock verdict");
        return Arc::new(BudgetedOracle::new(
            mock,
            config.daily_limit.unwrap_or(200),
        ));
    }

    if !config.enabled {
        return Arc::new(DisabledOracle);
    }

    match config.provider.as_deref() {
        Some("http") => {
            let provider = HttpOracleProvider::new(config.endpoint.clone(), config.model.clone());
            Arc::new(BudgetedOracle::new(
                provider,
                config.daily_limit.unwrap_or(200),
            ))
        }
        _ => Arc::new(DisabledOracle),
    }
}

// ------------------------------------------------------------
// Concrete providers
// ------------------------------------------------------------

/// Generic JSON-over-HTTP provider. Requires `ORACLE_API_KEY`; the endpoint
/// receives the article plus interest context and answers with an
/// `OracleVerdict`-shaped body.
pub struct HttpOracleProvider {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl HttpOracleProvider {
    pub fn new(endpoint: Option<String>, model: Option<String>) -> Self {
        let api_key = std::env::var("ORACLE_API_KEY").unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent("linkpilot/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(20))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            endpoint: endpoint.unwrap_or_else(|| "http://localhost:8089/score".to_string()),
            model: model.unwrap_or_else(|| "relevance-small".to_string()),
        }
    }
}

#[async_trait::async_trait]
impl RelevanceOracle for HttpOracleProvider {
    async fn score(&self, req: OracleRequest<'_>) -> Result<OracleVerdict> {
        if self.api_key.is_empty() {
            return Err(PipelineError::Oracle("ORACLE_API_KEY not set".into()));
        }

        #[derive(Serialize)]
        struct Payload<'a> {
            model: &'a str,
            title: &'a str,
            content: &'a str,
            user_context: &'a str,
            min_relevance_score: f64,
        }

        let payload = Payload {
            model: &self.model,
            title: req.title,
            content: req.content,
            user_context: req.user_context,
            min_relevance_score: req.preferences.min_relevance_score,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::Oracle(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PipelineError::Oracle(format!(
                "oracle endpoint returned {}",
                resp.status()
            )));
        }

        let verdict: OracleVerdict = resp
            .json()
            .await
            .map_err(|e| PipelineError::Oracle(e.to_string()))?;
        Ok(verdict.sanitized())
    }

    fn provider_name(&self) -> &'static str {
        "http"
    }
}

/// Always errors; used when the oracle is switched off.
pub struct DisabledOracle;

#[async_trait::async_trait]
impl RelevanceOracle for DisabledOracle {
    async fn score(&self, _req: OracleRequest<'_>) -> Result<OracleVerdict> {
        Err(PipelineError::Oracle("oracle disabled".into()))
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic mock for tests and local runs. Per-title overrides take
/// precedence over the fixed default verdict.
#[derive(Clone)]
pub struct MockOracle {
    default: OracleVerdict,
    by_title: HashMap<String, OracleVerdict>,
    fail_titles: Vec<String>,
}

impl MockOracle {
    pub fn fixed(score: f64, reasoning: &str) -> Self {
        Self {
            default: OracleVerdict {
                relevance_score: score,
                reasoning: reasoning.to_string(),
                topic_category: "general".to_string(),
                confidence: 0.9,
            },
            by_title: HashMap::new(),
            fail_titles: Vec::new(),
        }
    }

    pub fn with_score(mut self, title: &str, score: f64) -> Self {
        let v = OracleVerdict {
            relevance_score: score,
            ..self.default.clone()
        };
        self.by_title.insert(title.to_string(), v);
        self
    }

    /// Calls for this title return an `Oracle` error.
    pub fn failing_on(mut self, title: &str) -> Self {
        self.fail_titles.push(title.to_string());
        self
    }
}

#[async_trait::async_trait]
impl RelevanceOracle for MockOracle {
    async fn score(&self, req: OracleRequest<'_>) -> Result<OracleVerdict> {
        if self.fail_titles.iter().any(|t| t == req.title) {
            return Err(PipelineError::Oracle("mock failure".into()));
        }
        Ok(self
            .by_title
            .get(req.title)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
            .sanitized())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Budget + cache wrapper
// ------------------------------------------------------------

/// Wraps a provider with an in-memory result cache (keyed by content hash)
/// and a daily call budget. Cache hits do not count against the budget.
pub struct BudgetedOracle<P: RelevanceOracle> {
    inner: P,
    daily_limit: u32,
    state: Mutex<BudgetState>,
}

#[derive(Debug, Default)]
struct BudgetState {
    day: u64,
    calls: u32,
    cache: HashMap<String, OracleVerdict>,
}

fn today_unix_days() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        / 86_400
}

impl<P: RelevanceOracle> BudgetedOracle<P> {
    pub fn new(inner: P, daily_limit: u32) -> Self {
        Self {
            inner,
            daily_limit,
            state: Mutex::new(BudgetState {
                day: today_unix_days(),
                ..Default::default()
            }),
        }
    }
}

#[async_trait::async_trait]
impl<P: RelevanceOracle> RelevanceOracle for BudgetedOracle<P> {
    async fn score(&self, req: OracleRequest<'_>) -> Result<OracleVerdict> {
        let key = content_hash(&format!("{}\n{}", req.title, req.content));

        // 1) Cache lookup + budget check.
        {
            let mut g = self.state.lock().expect("budget state poisoned");
            let today = today_unix_days();
            if g.day != today {
                g.day = today;
                g.calls = 0;
            }
            if let Some(hit) = g.cache.get(&key) {
                return Ok(hit.clone());
            }
            if g.calls >= self.daily_limit {
                return Err(PipelineError::Oracle("daily oracle budget exhausted".into()));
            }
        }

        // 2) Real call; only successes are cached and counted.
        let verdict = self.inner.score(req).await?;
        let mut g = self.state.lock().expect("budget state poisoned");
        g.calls = g.calls.saturating_add(1);
        g.cache.insert(key, verdict.clone());
        Ok(verdict)
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

// ------------------------------------------------------------
// Sanitization
// ------------------------------------------------------------

/// Single line, <=240 chars, collapsed whitespace.
pub fn sanitize_reasoning(input: &str) -> String {
    let mut out = String::with_capacity(240);
    let mut prev_space = false;
    for ch in input.chars() {
        let c = match ch {
            '\r' | '\n' | '\t' => ' ',
            c => c,
        };
        if c == ' ' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
        if out.chars().count() >= 240 {
            break;
        }
    }
    out.trim().to_string()
}
