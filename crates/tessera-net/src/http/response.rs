//! HTTP response types.

use bytes::Bytes;
use url::Url;

/// Status line and headers of a received response.
#[derive(Clone, Debug)]
pub struct ResponseMetadata {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: http::HeaderMap,
    /// Final URL, after redirects.
    pub url: Url,
}

impl ResponseMetadata {
    /// Create metadata with no headers.
    pub fn new(status: u16, url: Url) -> Self {
        Self {
            status,
            headers: http::HeaderMap::new(),
            url,
        }
    }

    pub(crate) fn from_reqwest(response: &reqwest::Response) -> Self {
        Self {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            url: response.url().clone(),
        }
    }

    /// Check if the status counts as success (200..=399).
    pub fn is_acceptable(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// Get a header value as a string.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// What a transport hands back for a plain request.
///
/// `metadata` is `None` when the transport finished without a response to
/// describe; the request pipeline reports that as an unknown error.
#[derive(Clone, Debug)]
pub struct RawResponse {
    /// Status and headers, if available.
    pub metadata: Option<ResponseMetadata>,
    /// Response body.
    pub body: Bytes,
}

/// Progress information for downloads/uploads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferProgress {
    /// Number of bytes transferred so far.
    pub bytes_transferred: u64,
    /// Total number of bytes, if known.
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Create a progress report.
    pub fn new(bytes_transferred: u64, total_bytes: Option<u64>) -> Self {
        Self {
            bytes_transferred,
            total_bytes,
        }
    }

    /// Get the progress as a fraction (0.0 to 1.0), if total is known.
    pub fn fraction(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                1.0
            } else {
                (self.bytes_transferred as f64 / total as f64).min(1.0)
            }
        })
    }

    /// Get the progress as a percentage (0 to 100), if total is known.
    pub fn percent(&self) -> Option<u8> {
        self.fraction().map(|f| (f * 100.0).min(100.0) as u8)
    }
}
