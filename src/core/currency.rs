//! Currency rate abstractions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// An upper-cased currency code such as `USD` or `GHS`.
///
/// Only the shape is checked here. The rate service decides which codes exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Built-in codes only; user input goes through `FromStr`.
    pub(crate) fn from_static(code: &'static str) -> Self {
        CurrencyCode(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if code.is_empty() {
            return Err(anyhow::anyhow!("Currency code must not be empty"));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(anyhow::anyhow!("Invalid currency code: {}", code));
        }
        Ok(CurrencyCode(code.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// All rates the service knows for one base currency, as of `fetched_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub base: CurrencyCode,
    pub rates: BTreeMap<CurrencyCode, f64>,
    pub flags: HashMap<CurrencyCode, String>,
    pub fetched_at: DateTime<Utc>,
}

impl RateSnapshot {
    pub fn rate_for(&self, target: &CurrencyCode) -> Option<f64> {
        self.rates.get(target).copied()
    }

    /// Selectable currencies, ordered by code.
    pub fn options(&self) -> Vec<CurrencyOption> {
        self.rates
            .keys()
            .map(|code| {
                let flag = self.flags.get(code).map(String::as_str);
                CurrencyOption::new(code.clone(), flag)
            })
            .collect()
    }
}

/// One entry of the currency picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyOption {
    pub code: CurrencyCode,
    pub label: String,
}

impl CurrencyOption {
    pub fn new(code: CurrencyCode, flag: Option<&str>) -> Self {
        let label = match flag {
            Some(flag) if !flag.is_empty() => format!("{flag} {code}"),
            _ => code.to_string(),
        };
        CurrencyOption { code, label }
    }
}

/// Failure to obtain a [`RateSnapshot`] from the rate service.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Request error: {source} for base currency: {base}")]
    Transport {
        base: CurrencyCode,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP error: {status} for base currency: {base}")]
    Status {
        base: CurrencyCode,
        status: reqwest::StatusCode,
    },
    #[error("Failed to parse JSON response for {base}: {reason}")]
    Malformed { base: CurrencyCode, reason: String },
    #[error("Rate service error: {kind} for base currency: {base}")]
    Upstream { base: CurrencyCode, kind: String },
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetches every known rate for `base`. Each call issues a new request.
    async fn fetch_rates(&self, base: &CurrencyCode) -> Result<RateSnapshot, NetworkError>;
}
