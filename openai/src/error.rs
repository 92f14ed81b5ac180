use std::time::Duration;

/// Errors that can arise when calling a chat completions endpoint.
#[derive(Debug, thiserror::Error)]
pub enum OpenAIError {
    /// Transport failure: connection refused, TLS, DNS.
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),
    /// The request did not finish within the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// HTTP 429.
    #[error("rate limited: {message}")]
    RateLimit {
        /// Error message returned by the endpoint.
        message: String,
        /// Delay suggested by the `Retry-After` header.
        retry_after: Option<Duration>,
    },
    /// HTTP 5xx.
    #[error("server error {status}: {message}")]
    ServerError {
        /// Status code.
        status: u16,
        /// Error message returned by the endpoint.
        message: String,
    },
    /// Any other non-success status, such as a bad key or an unknown model.
    #[error("API error {status}: {message}")]
    Api {
        /// Status code.
        status: u16,
        /// Error message returned by the endpoint.
        message: String,
    },
    /// The response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The completion carried no text.
    #[error("the model returned an empty completion")]
    EmptyResponse,
}

impl OpenAIError {
    /// Whether sending the same request again may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout | Self::RateLimit { .. } | Self::ServerError { .. } => {
                true
            }
            Self::Api { .. } | Self::Json(_) | Self::EmptyResponse => false,
        }
    }
}

impl From<reqwest::Error> for OpenAIError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_retryable_failures() {
        assert!(OpenAIError::Timeout.is_retryable());
        assert!(
            OpenAIError::ServerError {
                status: 503,
                message: "overloaded".into()
            }
            .is_retryable()
        );
        assert!(
            !OpenAIError::Api {
                status: 401,
                message: "bad key".into()
            }
            .is_retryable()
        );
        assert!(!OpenAIError::EmptyResponse.is_retryable());
    }
}
