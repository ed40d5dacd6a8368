//! Error types for the Kraken client

use thiserror::Error;

/// Errors returned by [`KrakenClient`](super::KrakenClient) calls
#[derive(Error, Debug)]
pub enum KrakenError {
    /// Transport failure (connect, timeout, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Kraken answered with a non-empty `error` array
    #[error("{}", .0.join(", "))]
    Api(Vec<String>),

    /// Non-success HTTP status without a decodable envelope
    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// A private endpoint was called without credentials
    #[error("API key and secret are required for private endpoints")]
    MissingCredentials,

    /// The API secret is not valid base64
    #[error("Invalid API secret: {0}")]
    InvalidSecret(#[from] base64::DecodeError),

    /// The decoded secret was rejected as an HMAC key
    #[error("Invalid API secret: {0}")]
    InvalidKey(#[from] hmac::digest::InvalidLength),

    /// The response body is not a Kraken envelope
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request parameters could not be form encoded
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),
}

/// Result type alias for Kraken operations
pub type Result<T> = std::result::Result<T, KrakenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_joins_messages() {
        let err = KrakenError::Api(vec![
            "EGeneral:Invalid arguments".to_string(),
            "EQuery:Unknown asset pair".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "EGeneral:Invalid arguments, EQuery:Unknown asset pair"
        );
        assert!(matches!(err, KrakenError::Api(ref messages) if messages.len() == 2));
    }

    #[test]
    fn test_status_error_message() {
        let err = KrakenError::Status {
            status: 502,
            body: "Bad Gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Unexpected HTTP status 502: Bad Gateway");
    }
}
