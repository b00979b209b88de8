//! Local classifier seams: the adapter only ever talks to these traits, so the
//! tree ensemble can be swapped for a stub in tests.

pub mod ensemble;
pub mod explainer;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("cannot read model artifact: {0}")]
    Load(String),
    #[error("malformed model artifact: {0}")]
    Format(String),
    #[error("unsupported model: {0}")]
    Unsupported(String),
    #[error("feature shape mismatch: expected {expected}, got {actual}")]
    Shape { expected: usize, actual: usize },
    #[error("numeric failure: {0}")]
    Numeric(String),
}

/// Binary classifier returning the probability of the positive (phishing) class.
pub trait Classifier: Send + Sync {
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError>;
}

/// Per-feature attribution for a single prediction, one value per input column.
pub trait Explainer: Send + Sync {
    fn explain(&self, features: &[f64]) -> Result<Vec<f64>, ModelError>;
}
