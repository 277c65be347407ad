use pushcheck_types::{GatewayApiError, PushReceipt};
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid push gateway endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("access token contains characters that cannot be sent in a header")]
    InvalidAccessToken,
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to encode push messages: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("request to push gateway failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("push gateway returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("could not decode push gateway response: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },
    /// The request was rejected as a whole (top-level `errors`).
    #[error("API error has occurred.")]
    Api(Vec<GatewayApiError>),
    /// A message was accepted but its delivery failed.
    #[error("API error has occurred: {detail}")]
    Receipt { detail: String, receipt: PushReceipt },
}

impl GatewayError {
    pub(crate) fn receipt(receipt: PushReceipt) -> Self {
        let detail = receipt
            .error_code()
            .map(ToString::to_string)
            .or_else(|| receipt.message.clone())
            .unwrap_or_else(|| "unknown error".to_string());
        Self::Receipt { detail, receipt }
    }

    /// The gateway's machine-readable error code, when it sent one.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Receipt { receipt, .. } => receipt.error_code(),
            Self::Api(errors) => errors.iter().find_map(|error| error.code.as_deref()),
            _ => None,
        }
    }
}
