use std::{path::Path, sync::Arc};

use tracing::{debug, warn};

use crate::core::error::PhishyError;
use crate::core::features::{FeatureVector, FEATURE_NAMES};
use crate::core::types::{FeatureImpacts, LocalInferenceReport, LocalVerdict};
use crate::ml::ensemble::TreeEnsemble;
use crate::ml::explainer::TreeExplainer;
use crate::ml::{Classifier, Explainer};

/// `prob` strictly above this is MALICIOUS.
pub const MALICIOUS_PROBABILITY: f64 = 0.8;
/// `prob` strictly above this (and not MALICIOUS) is SUSPICIOUS.
pub const SUSPICIOUS_PROBABILITY: f64 = 0.4;

pub const ENGINE_LABEL: &str = "LightGBM Classifier";

/// Metadata about a loaded artifact, for status output.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub sha256: String,
    pub trees: usize,
}

/// Local classifier adapter. Every failure comes back as an ERROR report.
#[derive(Clone, Default)]
pub struct LocalEngine {
    classifier: Option<Arc<dyn Classifier>>,
    explainer: Option<Arc<dyn Explainer>>,
    info: Option<ModelInfo>,
}

impl LocalEngine {
    pub fn new(classifier: Arc<dyn Classifier>, explainer: Arc<dyn Explainer>) -> Self {
        Self {
            classifier: Some(classifier),
            explainer: Some(explainer),
            info: None,
        }
    }

    /// Load the tree ensemble and build its explainer.
    pub fn from_artifact(path: &Path) -> Result<Self, PhishyError> {
        let model = Arc::new(TreeEnsemble::load(path)?);
        let explainer = TreeExplainer::new(Arc::clone(&model))?;
        let info = ModelInfo {
            sha256: model.digest().to_string(),
            trees: model.num_trees(),
        };
        tracing::info!(
            "model loaded from {} ({} trees, sha256 {})",
            path.display(),
            info.trees,
            info.sha256
        );
        Ok(Self {
            classifier: Some(model as Arc<dyn Classifier>),
            explainer: Some(Arc::new(explainer) as Arc<dyn Explainer>),
            info: Some(info),
        })
    }

    pub fn info(&self) -> Option<&ModelInfo> {
        self.info.as_ref()
    }

    /// Startup gate: refuse to serve without both components.
    pub fn ensure_ready(&self) -> Result<(), PhishyError> {
        if let Some(missing) = self.missing_component() {
            return Err(PhishyError::Config(format!(
                "{} failed to initialize",
                missing
            )));
        }
        Ok(())
    }

    fn missing_component(&self) -> Option<&'static str> {
        match (&self.classifier, &self.explainer) {
            (None, None) => Some("ML model and explainer"),
            (None, Some(_)) => Some("ML model"),
            (Some(_), None) => Some("Explainer"),
            (Some(_), Some(_)) => None,
        }
    }

    pub fn predict(&self, vector: &FeatureVector) -> LocalInferenceReport {
        let (classifier, explainer) = match (&self.classifier, &self.explainer) {
            (Some(c), Some(e)) => (c, e),
            _ => {
                let missing = self.missing_component().unwrap_or("ML model");
                return LocalInferenceReport::failure(format!("{} not loaded", missing));
            }
        };

        let row = vector.to_array();
        let prob = match classifier.predict_proba(&row) {
            Ok(p) if p.is_finite() && (0.0..=1.0).contains(&p) => p,
            Ok(p) => {
                warn!("classifier returned out-of-range probability {}", p);
                return LocalInferenceReport::failure(format!(
                    "Inference failed: probability {} outside [0, 1]",
                    p
                ));
            }
            Err(err) => {
                warn!("inference failed: {}", err);
                return LocalInferenceReport::failure(format!("Inference failed: {}", err));
            }
        };

        let impacts = match explainer.explain(&row) {
            Ok(values) if values.len() == FEATURE_NAMES.len() => FeatureImpacts::new(
                FEATURE_NAMES
                    .iter()
                    .zip(values)
                    .map(|(name, v)| (name.to_string(), round_to(v, 4)))
                    .collect(),
            ),
            Ok(values) => {
                return LocalInferenceReport::failure(format!(
                    "Attribution failed: expected {} values, got {}",
                    FEATURE_NAMES.len(),
                    values.len()
                ));
            }
            Err(err) => {
                warn!("attribution failed: {}", err);
                return LocalInferenceReport::failure(format!("Attribution failed: {}", err));
            }
        };

        let verdict = verdict_for_probability(prob);
        debug!("local model: prob={:.4} verdict={:?}", prob, verdict);

        LocalInferenceReport {
            verdict,
            confidence_score: round_to(prob, 4),
            feature_impacts: Some(impacts),
            message: None,
            engine: Some(ENGINE_LABEL.to_string()),
        }
    }
}

pub fn verdict_for_probability(prob: f64) -> LocalVerdict {
    if prob > MALICIOUS_PROBABILITY {
        LocalVerdict::Malicious
    } else if prob > SUSPICIOUS_PROBABILITY {
        LocalVerdict::Suspicious
    } else {
        LocalVerdict::Clean
    }
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
