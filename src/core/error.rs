use std::io;

use crate::ml::ModelError;

#[derive(thiserror::Error, Debug)]
pub enum PhishyError {
    #[error("config error: {0}")]
    Config(String),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for PhishyError {
    fn from(err: serde_json::Error) -> Self {
        PhishyError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_keep_their_category() {
        let err: PhishyError = ModelError::Load("model/x.json: not found".into()).into();
        assert!(matches!(err, PhishyError::Model(ModelError::Load(_))));

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(PhishyError::from(json_err), PhishyError::Internal(_)));

        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(PhishyError::from(io_err).to_string(), "gone");
    }
}
