//! HTTP request types.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use url::Url;

use crate::error::{Result, TransportError};

/// HTTP request methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method.
    #[default]
    Get,
    /// HTTP POST method.
    Post,
    /// HTTP PUT method.
    Put,
    /// HTTP DELETE method.
    Delete,
    /// HTTP PATCH method.
    Patch,
    /// HTTP HEAD method.
    Head,
    /// HTTP OPTIONS method.
    Options,
}

impl HttpMethod {
    /// Convert to reqwest method.
    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Patch => reqwest::Method::PATCH,
            Self::Head => reqwest::Method::HEAD,
            Self::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
            Self::Patch => write!(f, "PATCH"),
            Self::Head => write!(f, "HEAD"),
            Self::Options => write!(f, "OPTIONS"),
        }
    }
}

/// The body of an HTTP request.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
    /// No body.
    #[default]
    None,
    /// Plain text body.
    Text(String),
    /// JSON body (serialized from a value).
    Json(serde_json::Value),
    /// Raw binary body.
    Bytes(Bytes),
}

/// A built HTTP request ready to be handed to a transport.
///
/// Request interceptors receive and return this type, so every field is
/// public and may be changed before the request is sent.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// The HTTP method.
    pub method: HttpMethod,
    /// The request URL, query string included.
    pub url: Url,
    /// Request headers.
    pub headers: http::HeaderMap,
    /// Request body.
    pub body: RequestBody,
    /// Request timeout override.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a request with no headers and no body.
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: http::HeaderMap::new(),
            body: RequestBody::None,
            timeout: None,
        }
    }

    /// Set a header, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = http::HeaderName::from_bytes(name.as_bytes())?;
        let value = http::HeaderValue::from_str(value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Get a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set a bearer token in the `Authorization` header.
    pub fn bearer_auth(&mut self, token: &str) -> Result<()> {
        self.set_header("authorization", &format!("Bearer {token}"))
    }
}

/// One part of a multipart form.
#[derive(Clone, Debug)]
pub struct FormPart {
    /// Form field name.
    pub name: String,
    /// Part payload.
    pub data: Bytes,
    /// File name, for file parts.
    pub file_name: Option<String>,
    /// MIME type, for file parts.
    pub mime_type: Option<String>,
}

/// Multipart form data for uploads.
///
/// Upload endpoints populate a form through a callback. Adding a file that
/// cannot be read does not panic; the error is kept and fails the upload.
///
/// # Example
///
/// ```
/// use tessera_net::http::MultipartForm;
///
/// let mut form = MultipartForm::new();
/// form.append_text("title", "Holiday");
/// form.append_bytes("photo", vec![0u8; 16], "photo.jpg", Some("image/jpeg"));
/// assert_eq!(form.parts().len(), 2);
/// assert_eq!(form.content_length(), 23);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
    error: Option<TransportError>,
}

impl MultipartForm {
    /// Create a new empty multipart form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field to the form.
    pub fn append_text(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.parts.push(FormPart {
            name: name.into(),
            data: Bytes::from(value.into()),
            file_name: None,
            mime_type: None,
        });
        self
    }

    /// Add a file field from bytes.
    pub fn append_bytes(
        &mut self,
        name: impl Into<String>,
        data: impl Into<Bytes>,
        file_name: impl Into<String>,
        mime_type: Option<&str>,
    ) -> &mut Self {
        self.parts.push(FormPart {
            name: name.into(),
            data: data.into(),
            file_name: Some(file_name.into()),
            mime_type: mime_type.map(str::to_string),
        });
        self
    }

    /// Add a file field read from disk.
    ///
    /// The file name sent is the last component of `path`.
    pub fn append_file(
        &mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        mime_type: Option<&str>,
    ) -> &mut Self {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(data) => {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.append_bytes(name, data, file_name, mime_type)
            }
            Err(err) => {
                tracing::warn!(
                    target: "tessera_net::http",
                    path = %path.display(),
                    error = %err,
                    "failed to read upload file"
                );
                if self.error.is_none() {
                    self.error = Some(err.into());
                }
                self
            }
        }
    }

    /// The parts added so far.
    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Total payload size of all parts, excluding multipart framing.
    pub fn content_length(&self) -> u64 {
        self.parts.iter().map(|p| p.data.len() as u64).sum()
    }

    /// Consume the form, failing if a part could not be added.
    pub fn into_parts(self) -> Result<Vec<FormPart>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.parts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_header() {
        let url = Url::parse("https://api.example.com/").unwrap();
        let mut request = HttpRequest::new(HttpMethod::Get, url);
        request.bearer_auth("abc").unwrap();
        assert_eq!(request.header("Authorization"), Some("Bearer abc"));

        assert!(matches!(
            request.set_header("bad header", "x"),
            Err(TransportError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_append_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let mut form = MultipartForm::new();
        form.append_file("notes", &path, Some("text/plain"));

        let parts = form.into_parts().unwrap();
        assert_eq!(parts[0].file_name.as_deref(), Some("notes.txt"));
        assert_eq!(parts[0].data.as_ref(), b"hello");
    }

    #[test]
    fn test_missing_file_fails_form() {
        let dir = tempfile::tempdir().unwrap();
        let mut form = MultipartForm::new();
        form.append_text("a", "b")
            .append_file("missing", dir.path().join("nope.bin"), None);

        assert!(matches!(form.into_parts(), Err(TransportError::Io(_))));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
        assert_eq!(HttpMethod::default(), HttpMethod::Get);
    }
}
