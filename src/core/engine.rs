use std::sync::Arc;

use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
    config::AppConfig,
    core::{
        error::PhishyError,
        features::extract,
        types::{
            format_percent, AnalysisRequest, AnalysisResponse, BatchEntry, ErrorResponse,
            FusedVerdict, HybridReport, StatusReport,
        },
    },
    modules::{inference::LocalEngine, reputation::ReputationClient},
    pipeline::fusion::fuse,
};

pub const ENGINE_STATUS: &str = "Success: Hybrid explainable analysis complete.";

pub struct Engine {
    pub config: AppConfig,
    reputation: ReputationClient,
    local: LocalEngine,
    semaphore: Arc<Semaphore>,
}

impl Engine {
    /// Refuses to build without a ready local model.
    pub fn new(config: AppConfig, local: LocalEngine) -> Result<Self, PhishyError> {
        local.ensure_ready()?;
        let reputation = ReputationClient::new(&config, config.api_key())?;
        if !reputation.has_credential() {
            tracing::warn!(
                "{} not set; reputation lookups will report ERROR (degraded mode)",
                config.api_key_env
            );
        }

        Ok(Self {
            reputation,
            local,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            config,
        })
    }

    /// Run both sources concurrently and fuse their reports.
    pub async fn assess(&self, url: &str) -> Result<FusedVerdict, PhishyError> {
        if url.is_empty() {
            return Err(PhishyError::InvalidRequest("url must not be empty".into()));
        }

        let (reputation, local) = tokio::join!(self.reputation.lookup(url), async {
            self.local.predict(&extract(url))
        });

        let fused = fuse(reputation, local);
        tracing::info!(
            "{} -> {:?} ({:.2}%){}",
            url,
            fused.verdict,
            fused.intensity,
            if fused.degraded { " [degraded]" } else { "" }
        );
        Ok(fused)
    }

    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse, PhishyError> {
        let fused = self.assess(&request.url).await?;
        Ok(AnalysisResponse {
            url: request.url.clone(),
            final_verdict: fused.verdict,
            malicious_intensity: format_percent(fused.intensity),
            hybrid_report: HybridReport {
                global_threat_intel: fused.reputation_report,
                local_ml_engine: fused.local_report,
            },
            decision_trace: fused.rule_trace,
            engine_status: ENGINE_STATUS.to_string(),
        })
    }

    /// Analyze many URLs with at most `max_concurrent_requests` in flight.
    /// Results come back in input order; per-URL failures become `Failed` entries.
    pub async fn analyze_batch(self: &Arc<Self>, urls: Vec<String>) -> Vec<BatchEntry> {
        let mut set = JoinSet::new();
        for (idx, url) in urls.iter().cloned().enumerate() {
            let engine = Arc::clone(self);
            set.spawn(async move {
                let outcome = match engine.semaphore.acquire().await {
                    Ok(_permit) => engine.analyze(&AnalysisRequest::new(url)).await,
                    Err(_) => Err(PhishyError::Internal("semaphore closed".into())),
                };
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<BatchEntry>> = vec![None; urls.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(to_entry(&urls[idx], outcome)),
                Err(err) => tracing::error!("batch task failed: {}", err),
            }
        }

        slots
            .into_iter()
            .zip(urls)
            .map(|(slot, url)| {
                slot.unwrap_or_else(|| {
                    BatchEntry::Failed(ErrorResponse {
                        url,
                        detail: internal_failure_detail(&PhishyError::Internal(
                            "analysis task aborted".into(),
                        )),
                    })
                })
            })
            .collect()
    }

    pub fn status(&self) -> StatusReport {
        let info = self.local.info();
        StatusReport {
            status: "Phishy Engine Online".to_string(),
            ml_engine: "LightGBM + SHAP Ready".to_string(),
            model_path: self.config.model_path.clone(),
            model_sha256: info.map(|i| i.sha256.clone()),
            model_trees: info.map(|i| i.trees),
            reputation_credential: self.reputation.has_credential(),
            reputation_endpoint: self.reputation.base_url().to_string(),
        }
    }
}

/// Message for failures that escaped both adapters.
pub fn internal_failure_detail(err: &PhishyError) -> String {
    match err {
        PhishyError::InvalidRequest(msg) => format!("Invalid request: {}", msg),
        other => format!("Internal Analysis Failure: {}", other),
    }
}

fn to_entry(url: &str, outcome: Result<AnalysisResponse, PhishyError>) -> BatchEntry {
    match outcome {
        Ok(response) => BatchEntry::Analyzed(response),
        Err(err) => BatchEntry::Failed(ErrorResponse {
            url: url.to_string(),
            detail: internal_failure_detail(&err),
        }),
    }
}
