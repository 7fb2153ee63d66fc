use async_trait::async_trait;
use chrono::NaiveDate;
use rekon_core::{Proccode, Vendor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Core banking API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Core banking API unavailable: {0}")]
    Unavailable(String),
}

/// What to ask the core-banking API for, independent of the day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchQuery {
    pub endpoint: String,
    pub proccode: String,
    pub params: Map<String, Value>,
}

impl FetchQuery {
    pub fn for_proccode(vendor: &Vendor, proccode: &Proccode) -> Self {
        Self {
            endpoint: vendor.api_endpoint.clone(),
            proccode: proccode.code.clone(),
            params: proccode.api_params.clone(),
        }
    }
}

/// Abstraction over the upstream core-banking inquiry service.
/// One call returns the raw JSON response for a single business day.
#[async_trait]
pub trait CoreBankingApi: Send + Sync {
    async fn fetch_day(&self, query: &FetchQuery, day: NaiveDate) -> Result<Value, ClientError>;
}

// ── HTTP backend ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
    /// strftime pattern for the `date` request field.
    pub date_param_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            token: None,
            timeout_secs: 30,
            date_param_format: "%Y%m%d".to_string(),
        }
    }
}

pub struct HttpCoreBankingClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpCoreBankingClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Proccode parameters, then `proccode` and `date`, which always win.
    pub fn request_body(&self, query: &FetchQuery, day: NaiveDate) -> Value {
        let mut body = query.params.clone();
        body.insert("proccode".to_string(), Value::String(query.proccode.clone()));
        let mut date = String::new();
        if write!(date, "{}", day.format(&self.config.date_param_format)).is_err() {
            date = day.format("%Y%m%d").to_string();
        }
        body.insert("date".to_string(), Value::String(date));
        Value::Object(body)
    }
}

#[async_trait]
impl CoreBankingApi for HttpCoreBankingClient {
    async fn fetch_day(&self, query: &FetchQuery, day: NaiveDate) -> Result<Value, ClientError> {
        let mut request = self.http.post(self.url(&query.endpoint)).json(&self.request_body(query, day));
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status: status.as_u16(), body });
        }
        Ok(response.json::<Value>().await?)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Serves canned per-day responses and records every requested day.
/// Days without a canned response return `null`, i.e. no items.
#[derive(Default)]
pub struct MockCoreBanking {
    responses: HashMap<NaiveDate, Value>,
    failing: HashSet<NaiveDate>,
    calls: Mutex<Vec<(String, NaiveDate)>>,
}

impl MockCoreBanking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_day(mut self, day: NaiveDate, response: Value) -> Self {
        self.responses.insert(day, response);
        self
    }

    pub fn failing_on(mut self, day: NaiveDate) -> Self {
        self.failing.insert(day);
        self
    }

    /// `(proccode, day)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, NaiveDate)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CoreBankingApi for MockCoreBanking {
    async fn fetch_day(&self, query: &FetchQuery, day: NaiveDate) -> Result<Value, ClientError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((query.proccode.clone(), day));
        }
        if self.failing.contains(&day) {
            return Err(ClientError::Unavailable(format!("no response for {day}")));
        }
        Ok(self.responses.get(&day).cloned().unwrap_or(Value::Null))
    }
}
