//! Error types shared across the catalog.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Failure talking to a metadata provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, DNS or TLS failure before any HTTP status was received
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    #[error("provider rate limited the request")]
    RateLimited,

    /// Any other non-2xx status
    #[error("provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Response arrived but could not be parsed into the expected shape
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl From<ureq::Error> for ProviderError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(429, _) => ProviderError::RateLimited,
            ureq::Error::Status(status, response) => {
                let body = response.into_string().unwrap_or_default();
                ProviderError::Api { status, body }
            }
            ureq::Error::Transport(transport) => ProviderError::Unreachable(transport.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("album not found: {0}")]
    NotFound(String),

    #[error("'{query}' matches {} albums: {}", .candidates.len(), .candidates.join("; "))]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
    },

    #[error("image extraction failed: {0}")]
    Extraction(ProviderError),

    #[error("enrichment failed: {0}")]
    Enrichment(ProviderError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_message_lists_candidates() {
        let err = CatalogError::Ambiguous {
            query: "blue".to_string(),
            candidates: vec!["#1 Kind of Blue".to_string(), "#4 Blue Train".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("matches 2 albums"));
        assert!(message.contains("#4 Blue Train"));
    }

    #[test]
    fn test_provider_error_wraps_into_named_failures() {
        let err = CatalogError::Enrichment(ProviderError::RateLimited);
        assert_eq!(err.to_string(), "enrichment failed: provider rate limited the request");
    }

    #[test]
    fn test_http_status_maps_to_provider_error() {
        let response = ureq::Response::new(429, "Too Many Requests", "").unwrap();
        assert!(matches!(
            ProviderError::from(ureq::Error::Status(429, response)),
            ProviderError::RateLimited
        ));

        let response = ureq::Response::new(500, "Internal Server Error", "model overloaded").unwrap();
        match ProviderError::from(ureq::Error::Status(500, response)) {
            ProviderError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "model overloaded");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_transport_failure_is_unreachable() {
        let err = ureq::get("not a url").call().unwrap_err();
        assert!(matches!(ProviderError::from(err), ProviderError::Unreachable(_)));
    }
}
