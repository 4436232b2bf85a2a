//! Error types for the networking module.

use std::fmt;
use std::sync::Arc;

use crate::http::EndpointSummary;

/// Transport-level errors.
///
/// These describe why the transport could not produce a response. They reach
/// callers wrapped in [`HttpServiceError::Unknown`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// HTTP request failed.
    Request(String),
    /// Invalid URL provided.
    InvalidUrl(String),
    /// Request timed out.
    Timeout,
    /// Connection refused or failed.
    Connection(String),
    /// Invalid header name or value.
    InvalidHeader(String),
    /// JSON serialization/deserialization error.
    Json(String),
    /// I/O error.
    Io(String),
    /// HTTP error status (outside 200..=399).
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// Optional error message from the response body.
        message: Option<String>,
    },
    /// Redirect limit exceeded.
    TooManyRedirects,
    /// Proxy configuration error.
    Proxy(String),
    /// The request interceptor rejected the request.
    Interception(String),
    /// No async runtime is available to drive the transport.
    Runtime(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(msg) => write!(f, "HTTP request error: {msg}"),
            Self::InvalidUrl(msg) => write!(f, "Invalid URL: {msg}"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Connection(msg) => write!(f, "Connection error: {msg}"),
            Self::InvalidHeader(msg) => write!(f, "Invalid header: {msg}"),
            Self::Json(msg) => write!(f, "JSON error: {msg}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::HttpStatus { status, message } => {
                if let Some(msg) = message {
                    write!(f, "HTTP {status}: {msg}")
                } else {
                    write!(f, "HTTP {status}")
                }
            }
            Self::TooManyRedirects => write!(f, "Too many redirects"),
            Self::Proxy(msg) => write!(f, "Proxy error: {msg}"),
            Self::Interception(msg) => write!(f, "Request interception failed: {msg}"),
            Self::Runtime(msg) => write!(f, "Runtime error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_redirect() {
            Self::TooManyRedirects
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for TransportError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for TransportError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for TransportError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

/// A specialized Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors delivered by the request and transfer pipelines.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpServiceError {
    /// The server answered with a failure status and a JSON error body.
    #[error("request failed with status {status_code}")]
    RequestFailed {
        /// The HTTP status code.
        status_code: u16,
        /// The decoded error body.
        response: serde_json::Value,
    },

    /// The body arrived but did not have the requested shape.
    #[error("failed to decode response of {endpoint}: {source}")]
    DecodingFailed {
        /// Which call failed.
        endpoint: EndpointSummary,
        /// Why decoding failed.
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// Any other failure: connectivity, timeouts, rejected interception,
    /// a response without metadata, or a failed transfer.
    #[error("{}", unknown_message(.0))]
    Unknown(#[source] Option<TransportError>),

    /// A caller-defined error, usually produced by an endpoint's error mapper.
    #[error(transparent)]
    Custom(Arc<dyn std::error::Error + Send + Sync>),
}

fn unknown_message(cause: &Option<TransportError>) -> String {
    match cause {
        Some(cause) => format!("unknown error: {cause}"),
        None => "unknown error: response carried no metadata".to_string(),
    }
}

impl HttpServiceError {
    /// Wrap a caller-defined error.
    pub fn custom<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(error))
    }

    pub(crate) fn decoding_failed(endpoint: EndpointSummary, source: serde_json::Error) -> Self {
        Self::DecodingFailed {
            endpoint,
            source: Arc::new(source),
        }
    }

    /// The HTTP status behind this error, if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status_code, .. } => Some(*status_code),
            Self::Unknown(Some(TransportError::HttpStatus { status, .. })) => Some(*status),
            _ => None,
        }
    }

    /// The transport error behind an `Unknown` error.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Unknown(cause) => cause.as_ref(),
            _ => None,
        }
    }
}

impl From<TransportError> for HttpServiceError {
    fn from(err: TransportError) -> Self {
        Self::Unknown(Some(err))
    }
}
