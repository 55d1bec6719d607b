use thiserror::Error;

/// Failures of a single request against the dashboard service.
///
/// View models never propagate these further; they turn them into a status
/// flag and keep whatever was last displayed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Bad input, caught before sending or against the page count the
    /// service reported
    #[error("invalid input: {0}")]
    Validation(String),
    /// Transport failure, timeout, or non-success HTTP status
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// The body did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::ServiceUnavailable(format!("request timed out: {}", err))
        } else {
            ClientError::ServiceUnavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ClientError::Validation("text is blank".to_string());
        assert_eq!(err.to_string(), "invalid input: text is blank");

        let err = ClientError::ServiceUnavailable("HTTP 503".to_string());
        assert_eq!(err.to_string(), "service unavailable: HTTP 503");

        let err = ClientError::InvalidResponse("missing field `label`".to_string());
        assert!(err.to_string().starts_with("invalid response"));
    }
}
