use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Final three-level decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreatVerdict {
    Clean,
    Suspicious,
    Malicious,
}

/// Outcome of the remote reputation lookup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReputationVerdict {
    Malicious,
    Suspicious,
    Clean,
    NotFound,
    Error,
    ConnectionFailed,
}

impl ReputationVerdict {
    /// A definitive answer from the service, as opposed to a failed lookup.
    pub fn is_conclusive(&self) -> bool {
        !matches!(self, Self::Error | Self::ConnectionFailed)
    }
}

/// Outcome of the local classifier pass.
/// Inbound analysis request. Only emptiness is checked; the URL is otherwise opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub url: String,
}

impl AnalysisRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocalVerdict {
    Malicious,
    Suspicious,
    Clean,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReputationReport {
    pub verdict: ReputationVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub malicious_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspicious_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_engines: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reputation: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

impl ReputationReport {
    pub fn failure(verdict: ReputationVerdict, message: impl Into<String>) -> Self {
        Self {
            verdict,
            malicious_count: None,
            suspicious_count: None,
            total_engines: None,
            reputation: None,
            message: Some(message.into()),
            engine: None,
        }
    }
}

/// Signed per-feature contributions, serialized as a JSON object in schema order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureImpacts(Vec<(String, f64)>);

impl FeatureImpacts {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self(entries)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Feature pushing hardest toward the positive class, if any pushes at all.
    pub fn strongest_positive(&self) -> Option<(&str, f64)> {
        self.iter()
            .filter(|(_, v)| *v > 0.0)
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FeatureImpacts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalInferenceReport {
    pub verdict: LocalVerdict,
    pub confidence_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_impacts: Option<FeatureImpacts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
}

impl LocalInferenceReport {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            verdict: LocalVerdict::Error,
            confidence_score: 0.0,
            feature_impacts: None,
            message: Some(message.into()),
            engine: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedVerdict {
    pub verdict: ThreatVerdict,
    pub intensity: f64,
    pub reputation_report: ReputationReport,
    pub local_report: LocalInferenceReport,
    /// The high-reputation override decided the verdict.
    pub override_applied: bool,
    /// Neither source contributed usable evidence; CLEAN here means "unknown".
    pub degraded: bool,
    pub rule_trace: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HybridReport {
    pub global_threat_intel: ReputationReport,
    pub local_ml_engine: LocalInferenceReport,
}

/// Boundary payload for one analysed URL.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub url: String,
    pub final_verdict: ThreatVerdict,
    pub malicious_intensity: String,
    pub hybrid_report: HybridReport,
    pub decision_trace: Vec<String>,
    pub engine_status: String,
}

/// Error payload for requests that could not be analysed.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub url: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Analyzed(AnalysisResponse),
    Failed(ErrorResponse),
}

impl BatchEntry {
    pub fn url(&self) -> &str {
        match self {
            BatchEntry::Analyzed(r) => &r.url,
            BatchEntry::Failed(e) => &e.url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: String,
    pub ml_engine: String,
    pub model_path: String,
    pub model_sha256: Option<String>,
    pub model_trees: Option<usize>,
    pub reputation_credential: bool,
    pub reputation_endpoint: String,
}

/// Render a percentage the way the boundary contract expects: shortest float
/// form, always with a decimal part (`96.0%`, `74.99%`).
pub fn format_percent(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}%", value)
    } else {
        format!("{}%", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdicts_serialize_screaming_snake() {
        let json = serde_json::to_string(&ReputationVerdict::ConnectionFailed).unwrap();
        assert_eq!(json, "\"CONNECTION_FAILED\"");
        let json = serde_json::to_string(&ReputationVerdict::NotFound).unwrap();
        assert_eq!(json, "\"NOT_FOUND\"");
        let json = serde_json::to_string(&ThreatVerdict::Malicious).unwrap();
        assert_eq!(json, "\"MALICIOUS\"");
    }

    #[test]
    fn failure_reports_omit_counts() {
        let report = ReputationReport::failure(ReputationVerdict::Error, "boom");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value, serde_json::json!({"verdict": "ERROR", "message": "boom"}));
    }

    #[test]
    fn impacts_keep_schema_order() {
        let impacts = FeatureImpacts::new(vec![
            ("url_length".into(), 0.5),
            ("hostname_length".into(), -0.25),
            ("num_dots".into(), 0.0),
        ]);
        let json = serde_json::to_string(&impacts).unwrap();
        assert_eq!(
            json,
            r#"{"url_length":0.5,"hostname_length":-0.25,"num_dots":0.0}"#
        );
        assert_eq!(impacts.strongest_positive(), Some(("url_length", 0.5)));
        assert_eq!(impacts.get("hostname_length"), Some(-0.25));
    }

    #[test]
    fn percent_always_has_decimal() {
        assert_eq!(format_percent(96.0), "96.0%");
        assert_eq!(format_percent(0.0), "0.0%");
        assert_eq!(format_percent(74.99), "74.99%");
        assert_eq!(format_percent(40.5), "40.5%");
    }
}
