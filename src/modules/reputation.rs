use std::{collections::HashMap, error::Error as _, time::Duration};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::core::error::PhishyError;
use crate::core::types::{ReputationReport, ReputationVerdict};

pub const ENGINE_LABEL: &str = "VirusTotal v3 API";

#[derive(Debug, Deserialize)]
struct UrlObject {
    data: UrlData,
}

#[derive(Debug, Deserialize)]
struct UrlData {
    attributes: UrlAttributes,
}

#[derive(Debug, Deserialize)]
struct UrlAttributes {
    last_analysis_stats: HashMap<String, u64>,
    #[serde(default)]
    reputation: Option<i64>,
}

/// VirusTotal URL lookups. `lookup` never returns an error: every failure is
/// folded into the report verdict.
pub struct ReputationClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ReputationClient {
    pub fn new(config: &AppConfig, api_key: Option<String>) -> Result<Self, PhishyError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PhishyError::Config(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.reputation_base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn lookup(&self, url: &str) -> ReputationReport {
        let Some(api_key) = self.api_key.as_deref() else {
            return ReputationReport::failure(
                ReputationVerdict::Error,
                "API Key missing. Check your .env file.",
            );
        };

        let endpoint = format!("{}/urls/{}", self.base_url, url_identifier(url));
        debug!("reputation lookup: {}", endpoint);

        let response = match self
            .client
            .get(&endpoint)
            .header("accept", "application/json")
            .header("x-apikey", api_key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                warn!("reputation lookup failed: {}", err);
                return ReputationReport::failure(
                    ReputationVerdict::ConnectionFailed,
                    error_chain(&err),
                );
            }
        };

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return ReputationReport::failure(
                    ReputationVerdict::NotFound,
                    "URL not in VT database.",
                );
            }
            status => {
                warn!("reputation service returned {}", status);
                return ReputationReport::failure(
                    ReputationVerdict::Error,
                    format!("API returned status code {}", status.as_u16()),
                );
            }
        }

        match response.text().await {
            Ok(body) => parse_report(&body),
            Err(err) => {
                warn!("reading reputation response failed: {}", err);
                ReputationReport::failure(ReputationVerdict::ConnectionFailed, error_chain(&err))
            }
        }
    }
}

/// VirusTotal URL identifier: URL-safe base64 without padding.
pub fn url_identifier(url: &str) -> String {
    URL_SAFE_NO_PAD.encode(url.as_bytes())
}

/// Turn a 200 body into a report; an unexpected shape is an upstream-data ERROR.
pub fn parse_report(body: &str) -> ReputationReport {
    let object: UrlObject = match serde_json::from_str(body) {
        Ok(o) => o,
        Err(err) => {
            return ReputationReport::failure(
                ReputationVerdict::Error,
                format!("unexpected response shape: {}", err),
            );
        }
    };

    let attrs = object.data.attributes;
    let stats = &attrs.last_analysis_stats;
    let malicious = stats.get("malicious").copied().unwrap_or(0);
    let suspicious = stats.get("suspicious").copied().unwrap_or(0);
    let Some(total) = stats.values().try_fold(0u64, |acc, n| acc.checked_add(*n)) else {
        return ReputationReport::failure(
            ReputationVerdict::Error,
            "unexpected response shape: engine counts overflow",
        );
    };

    let verdict = if malicious > 0 {
        ReputationVerdict::Malicious
    } else if suspicious > 0 {
        ReputationVerdict::Suspicious
    } else {
        ReputationVerdict::Clean
    };

    ReputationReport {
        verdict,
        malicious_count: Some(malicious),
        suspicious_count: Some(suspicious),
        total_engines: Some(total),
        reputation: Some(attrs.reputation.unwrap_or(0)),
        message: None,
        engine: Some(ENGINE_LABEL.to_string()),
    }
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
