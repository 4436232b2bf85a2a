//! Declarative descriptions of HTTP operations.
//!
//! An [`Endpoint`] describes one call: where it goes, how parameters are
//! encoded, which headers are sent, how often it is retried and how its
//! errors are remapped. [`DownloadEndpoint`] and [`UploadEndpoint`] add what
//! a file transfer needs on top of that.
//!
//! Endpoints are plain values. Defaults are explicit fields set by the
//! constructors and changed with `with_*` builder methods.
//!
//! # Example
//!
//! ```
//! use tessera_net::http::{Endpoint, HttpMethod, ParameterEncoding};
//!
//! let endpoint = Endpoint::new("https://api.example.com", "/users")
//!     .with_method(HttpMethod::Post)
//!     .with_header("X-Client", "tessera")
//!     .with_parameter("name", "Ada")
//!     .with_retries(3);
//!
//! assert_eq!(endpoint.parameter_encoding(), ParameterEncoding::Json);
//! assert_eq!(endpoint.full_url().unwrap().as_str(), "https://api.example.com/users");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use url::Url;

use super::request::{HttpMethod, HttpRequest, MultipartForm, RequestBody};
use crate::error::{HttpServiceError, Result};

/// How an endpoint's parameters are put on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterEncoding {
    /// Appended to the URL query string.
    QueryString,
    /// Sent as a JSON object body.
    Json,
}

impl ParameterEncoding {
    /// The encoding used when an endpoint does not choose one.
    ///
    /// GET requests carry parameters in the query string; every other method
    /// sends them as a JSON body.
    pub fn for_method(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::QueryString,
            _ => Self::Json,
        }
    }
}

/// Transforms a pipeline error before it reaches the caller.
pub type ErrorMapper = Arc<dyn Fn(HttpServiceError) -> HttpServiceError + Send + Sync>;

/// Method and URL of a call, kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointSummary {
    /// The HTTP method.
    pub method: HttpMethod,
    /// The target URL as written, even if it does not parse.
    pub url: String,
}

impl fmt::Display for EndpointSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Description of a single HTTP request.
#[derive(Clone)]
pub struct Endpoint {
    base_url: String,
    path: String,
    method: HttpMethod,
    encoding: Option<ParameterEncoding>,
    should_intercept: bool,
    headers: Option<BTreeMap<String, String>>,
    parameters: Option<serde_json::Map<String, serde_json::Value>>,
    retries: u32,
    error_mapper: Option<ErrorMapper>,
}

impl Endpoint {
    /// Create a GET endpoint with default settings.
    ///
    /// Construction never fails: a base URL that does not parse is reported
    /// when the request is sent.
    pub fn new(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            method: HttpMethod::Get,
            encoding: None,
            should_intercept: false,
            headers: None,
            parameters: None,
            retries: 1,
            error_mapper: None,
        }
    }

    /// Set the HTTP method.
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Override the parameter encoding derived from the method.
    pub fn with_encoding(mut self, encoding: ParameterEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Route this endpoint's requests through the client's interceptor.
    pub fn with_interception(mut self, should_intercept: bool) -> Self {
        self.should_intercept = should_intercept;
        self
    }

    /// Add a header. A later value for the same name replaces the earlier one.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Add a parameter. A later value for the same key replaces the earlier one.
    pub fn with_parameter(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.parameters
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replace all parameters.
    pub fn with_parameters(mut self, parameters: serde_json::Map<String, serde_json::Value>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Set how many extra attempts follow a failed one.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the error transform applied before errors reach the caller.
    pub fn with_error_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(HttpServiceError) -> HttpServiceError + Send + Sync + 'static,
    {
        self.error_mapper = Some(Arc::new(mapper));
        self
    }

    /// The base URL, as given.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The path, as given.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The HTTP method.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The effective parameter encoding.
    pub fn parameter_encoding(&self) -> ParameterEncoding {
        self.encoding
            .unwrap_or_else(|| ParameterEncoding::for_method(self.method))
    }

    /// Whether requests go through the interceptor.
    pub fn should_intercept(&self) -> bool {
        self.should_intercept
    }

    /// Headers, if any were set.
    pub fn headers(&self) -> Option<&BTreeMap<String, String>> {
        self.headers.as_ref()
    }

    /// Parameters, if any were set.
    pub fn parameters(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.parameters.as_ref()
    }

    /// Number of extra attempts after a failure.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// The base URL joined with the path by a single `/`.
    ///
    /// An empty path leaves the base URL unchanged. Fails with
    /// [`TransportError::InvalidUrl`](crate::TransportError::InvalidUrl) if
    /// the result does not parse.
    pub fn full_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.joined_url())?)
    }

    /// Apply the error mapper, or return the error unchanged.
    pub fn map_error(&self, error: HttpServiceError) -> HttpServiceError {
        match &self.error_mapper {
            Some(mapper) => mapper(error),
            None => error,
        }
    }

    /// Method and target URL, for diagnostics.
    pub fn summary(&self) -> EndpointSummary {
        EndpointSummary {
            method: self.method,
            url: self.joined_url(),
        }
    }

    /// Build the transport request: URL, method, headers and parameters.
    pub fn to_request(&self) -> Result<HttpRequest> {
        let mut request = HttpRequest::new(self.method, self.full_url()?);
        self.apply_headers(&mut request)?;

        if let Some(parameters) = &self.parameters {
            match self.parameter_encoding() {
                ParameterEncoding::QueryString => {
                    if !parameters.is_empty() {
                        let mut pairs = request.url.query_pairs_mut();
                        for (key, value) in query_components(parameters) {
                            pairs.append_pair(&key, &value);
                        }
                    }
                }
                ParameterEncoding::Json => {
                    request.body = RequestBody::Json(serde_json::Value::Object(parameters.clone()));
                    if !request.headers.contains_key(http::header::CONTENT_TYPE) {
                        request.headers.insert(
                            http::header::CONTENT_TYPE,
                            http::HeaderValue::from_static("application/json"),
                        );
                    }
                }
            }
        }

        Ok(request)
    }

    fn apply_headers(&self, request: &mut HttpRequest) -> Result<()> {
        if let Some(headers) = &self.headers {
            for (name, value) in headers {
                request.set_header(name, value)?;
            }
        }
        Ok(())
    }

    fn joined_url(&self) -> String {
        let path = self.path.trim_start_matches('/');
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), path)
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("method", &self.method)
            .field("encoding", &self.parameter_encoding())
            .field("should_intercept", &self.should_intercept)
            .field("headers", &self.headers)
            .field("parameters", &self.parameters)
            .field("retries", &self.retries)
            .field("error_mapper", &self.error_mapper.is_some())
            .finish()
    }
}

/// Flatten parameters into query pairs.
///
/// Keys are sorted. Arrays become `key[]` repeated, nested objects become
/// `key[sub]`, booleans are `1`/`0` and nulls are empty values.
fn query_components(parameters: &serde_json::Map<String, serde_json::Value>) -> Vec<(String, String)> {
    let mut keys: Vec<&String> = parameters.keys().collect();
    keys.sort();

    let mut pairs = Vec::new();
    for key in keys {
        push_component(key, &parameters[key], &mut pairs);
    }
    pairs
}

fn push_component(key: &str, value: &serde_json::Value, pairs: &mut Vec<(String, String)>) {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let mut nested: Vec<&String> = map.keys().collect();
            nested.sort();
            for sub in nested {
                push_component(&format!("{key}[{sub}]"), &map[sub], pairs);
            }
        }
        Value::Array(items) => {
            for item in items {
                push_component(&format!("{key}[]"), item, pairs);
            }
        }
        Value::Bool(flag) => pairs.push((key.to_string(), if *flag { "1" } else { "0" }.to_string())),
        Value::Null => pairs.push((key.to_string(), String::new())),
        Value::String(s) => pairs.push((key.to_string(), s.clone())),
        Value::Number(n) => pairs.push((key.to_string(), n.to_string())),
    }
}

/// Description of a file download.
///
/// The payload is fetched with GET from `source_url` and placed at
/// `destination`, replacing any file already there.
#[derive(Clone, Debug)]
pub struct DownloadEndpoint {
    endpoint: Endpoint,
    source_url: Url,
    destination: PathBuf,
}

impl DownloadEndpoint {
    /// Create a download from `source_url` to `destination`.
    pub fn new(source_url: Url, destination: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: Endpoint::new("", ""),
            source_url,
            destination: destination.into(),
        }
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.endpoint = self.endpoint.with_header(name, value);
        self
    }

    /// Route the download request through the client's interceptor.
    pub fn with_interception(mut self, should_intercept: bool) -> Self {
        self.endpoint = self.endpoint.with_interception(should_intercept);
        self
    }

    /// Set the error transform applied before errors reach the caller.
    pub fn with_error_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(HttpServiceError) -> HttpServiceError + Send + Sync + 'static,
    {
        self.endpoint = self.endpoint.with_error_mapper(mapper);
        self
    }

    /// The shared endpoint settings.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Where the payload comes from.
    pub fn source_url(&self) -> &Url {
        &self.source_url
    }

    /// Where the payload is placed.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Build the GET request for the source URL.
    pub fn to_request(&self) -> Result<HttpRequest> {
        let mut request = HttpRequest::new(HttpMethod::Get, self.source_url.clone());
        self.endpoint.apply_headers(&mut request)?;
        Ok(request)
    }

    pub(crate) fn summary(&self) -> EndpointSummary {
        EndpointSummary {
            method: HttpMethod::Get,
            url: self.source_url.to_string(),
        }
    }
}

/// Populates a multipart form for an upload.
pub type FormBuilder = Arc<dyn Fn(&mut MultipartForm) + Send + Sync>;

/// Description of a multipart upload.
///
/// Uses POST unless another method is set.
#[derive(Clone)]
pub struct UploadEndpoint {
    endpoint: Endpoint,
    form: FormBuilder,
}

impl UploadEndpoint {
    /// Create an upload to `base_url` joined with `path`.
    ///
    /// `form` is called once per upload to fill in the multipart body.
    pub fn new<F>(base_url: impl Into<String>, path: impl Into<String>, form: F) -> Self
    where
        F: Fn(&mut MultipartForm) + Send + Sync + 'static,
    {
        Self {
            endpoint: Endpoint::new(base_url, path).with_method(HttpMethod::Post),
            form: Arc::new(form),
        }
    }

    /// Set the HTTP method.
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.endpoint = self.endpoint.with_method(method);
        self
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.endpoint = self.endpoint.with_header(name, value);
        self
    }

    /// Route the upload request through the client's interceptor.
    pub fn with_interception(mut self, should_intercept: bool) -> Self {
        self.endpoint = self.endpoint.with_interception(should_intercept);
        self
    }

    /// Set the error transform applied before errors reach the caller.
    pub fn with_error_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(HttpServiceError) -> HttpServiceError + Send + Sync + 'static,
    {
        self.endpoint = self.endpoint.with_error_mapper(mapper);
        self
    }

    /// The shared endpoint settings.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Build the request without a body; the form is sent separately.
    pub fn to_request(&self) -> Result<HttpRequest> {
        let mut request = HttpRequest::new(self.endpoint.method, self.endpoint.full_url()?);
        self.endpoint.apply_headers(&mut request)?;
        Ok(request)
    }

    /// Run the form callback on a fresh form.
    pub fn build_form(&self) -> MultipartForm {
        let mut form = MultipartForm::new();
        (self.form)(&mut form);
        form
    }
}

impl fmt::Debug for UploadEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadEndpoint")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
