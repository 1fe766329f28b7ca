//! Error types shared by providers and the aggregator

use thiserror::Error;

/// Coarse error category, stable across providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    Decode,
    NoResults,
    NoStreamFound,
    NoStreams,
    NotImplemented,
    Config,
}

/// Provider and aggregator errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport failure or non-2xx status
    #[error("{provider}: request failed: {message}")]
    Fetch {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    /// Malformed body from an otherwise successful response
    #[error("{provider}: invalid response: {message}")]
    Decode { provider: String, message: String },

    /// Upstream explicitly reported nothing for this content
    #[error("{0}: no results")]
    NoResults(String),

    /// A scrape adapter found no usable server or file URL
    #[error("{0}: no stream found")]
    NoStreamFound(String),

    /// The merged result set was empty
    #[error("no streams available")]
    NoStreams,

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn status(provider: &str, status: u16) -> Self {
        ProviderError::Fetch {
            provider: provider.to_string(),
            status: Some(status),
            message: format!("HTTP {}", status),
        }
    }

    /// Transport failure; the URL is dropped since addon paths embed tokens
    pub fn transport(provider: &str, err: reqwest::Error) -> Self {
        ProviderError::Fetch {
            provider: provider.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message: err.without_url().to_string(),
        }
    }

    pub fn decode(provider: &str, message: impl Into<String>) -> Self {
        ProviderError::Decode {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Fetch { .. } => ErrorKind::Fetch,
            ProviderError::Decode { .. } => ErrorKind::Decode,
            ProviderError::NoResults(_) => ErrorKind::NoResults,
            ProviderError::NoStreamFound(_) => ErrorKind::NoStreamFound,
            ProviderError::NoStreams => ErrorKind::NoStreams,
            ProviderError::NotImplemented(_) => ErrorKind::NotImplemented,
            ProviderError::Config(_) => ErrorKind::Config,
        }
    }

    /// Transport errors and 429/503 are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Fetch { status: None, .. } => true,
            ProviderError::Fetch {
                status: Some(code), ..
            } => *code == 429 || *code == 503,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(ProviderError::status("x", 429).is_retryable());
        assert!(ProviderError::status("x", 503).is_retryable());
        assert!(!ProviderError::status("x", 500).is_retryable());
        assert!(!ProviderError::status("x", 404).is_retryable());
        assert!(!ProviderError::decode("x", "bad json").is_retryable());
        assert!(!ProviderError::NoResults("x".into()).is_retryable());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ProviderError::status("x", 500).kind(), ErrorKind::Fetch);
        assert_eq!(ProviderError::NoStreams.kind(), ErrorKind::NoStreams);
        assert_eq!(
            ProviderError::NotImplemented("debrid resolution").to_string(),
            "debrid resolution is not implemented"
        );
    }
}
