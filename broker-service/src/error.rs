use service_core::error::AppError;
use thiserror::Error;

/// Failures of the broker workflow.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid_request")]
    InvalidRequest(#[from] validator::ValidationErrors),

    #[error("Institution {0} unknown")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No {0} present in the broker session")]
    MissingSessionState(&'static str),

    #[error("Request to {url} failed: {source}")]
    Upstream {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("Session store error: {0}")]
    Session(String),
}

impl BrokerError {
    pub(crate) fn upstream(url: &str) -> impl FnOnce(reqwest::Error) -> Self + '_ {
        move |source| BrokerError::Upstream {
            url: url.to_string(),
            source,
        }
    }
}

impl From<BrokerError> for AppError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::InvalidRequest(errors) => AppError::ValidationError(errors),
            BrokerError::NotFound(_) => AppError::NotFound(anyhow::anyhow!(err.to_string())),
            BrokerError::Configuration(_) => {
                AppError::ConfigError(anyhow::anyhow!(err.to_string()))
            }
            BrokerError::MissingSessionState(_) => {
                AppError::Unauthorized(anyhow::anyhow!(err.to_string()))
            }
            BrokerError::Upstream { .. } | BrokerError::MalformedResponse { .. } => {
                AppError::BadGateway(err.to_string())
            }
            BrokerError::Session(_) => AppError::InternalError(anyhow::Error::new(err)),
        }
    }
}
