//! The HTTP service: configuration, construction and shared state.

use std::sync::Arc;
use std::time::Duration;

use tessera_core::{Emitter, ImmediateScheduler, Scheduler, Teardown};
use tokio::runtime::Handle;

use super::interceptor::{AdaptCompletion, InterceptorSlot, RequestInterceptor};
use super::request::HttpRequest;
use crate::error::{HttpServiceError, Result, TransportError};
use crate::transport::{HandleSlot, ReqwestTransport, TransferHandle, Transport};

/// Configuration for the default transport.
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    /// Request timeout.
    pub timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Whether to follow redirects.
    pub follow_redirects: bool,
    /// Maximum number of redirects to follow.
    pub max_redirects: usize,
    /// Whether to enable cookie storage.
    pub cookies_enabled: bool,
    /// Default user agent.
    pub user_agent: Option<String>,
    /// Proxy URL.
    pub proxy: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            follow_redirects: true,
            max_redirects: 10,
            cookies_enabled: true,
            user_agent: Some(format!("Tessera/{} (Rust)", env!("CARGO_PKG_VERSION"))),
            proxy: None,
        }
    }
}

/// Builder for an [`HttpService`].
pub struct HttpServiceBuilder {
    config: HttpClientConfig,
    default_headers: http::HeaderMap,
    runtime: Option<Handle>,
    delivery: Option<Arc<dyn Scheduler>>,
    transport: Option<Arc<dyn Transport>>,
}

impl Default for HttpServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpServiceBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
            default_headers: http::HeaderMap::new(),
            runtime: None,
            delivery: None,
            transport: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: HttpClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable request timeout.
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Disable redirect following.
    pub fn no_redirects(mut self) -> Self {
        self.config.follow_redirects = false;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Disable cookie storage.
    pub fn no_cookies(mut self) -> Self {
        self.config.cookies_enabled = false;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Set a proxy URL.
    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.config.proxy = Some(proxy_url.into());
        self
    }

    /// Add a default header that will be sent with every request.
    pub fn default_header(
        mut self,
        name: impl TryInto<http::HeaderName>,
        value: impl TryInto<http::HeaderValue>,
    ) -> Result<Self> {
        let name = name
            .try_into()
            .map_err(|_| TransportError::InvalidHeader("Invalid header name".to_string()))?;
        let value = value
            .try_into()
            .map_err(|_| TransportError::InvalidHeader("Invalid header value".to_string()))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Run transport work on this runtime instead of the ambient one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Deliver results through `scheduler`.
    ///
    /// Defaults to [`ImmediateScheduler`], which delivers on the transport's
    /// worker thread. UI code typically passes a
    /// [`DispatchQueue`](tessera_core::DispatchQueue) drained by its event loop.
    pub fn delivery_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.delivery = Some(scheduler);
        self
    }

    /// Use a custom transport. Transport configuration is then ignored.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the service.
    ///
    /// Without a custom transport this needs a tokio runtime: the one set
    /// with [`runtime`](Self::runtime), or the one the caller runs inside.
    pub fn build(self) -> Result<HttpService> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let runtime = match self.runtime {
                    Some(handle) => handle,
                    None => Handle::try_current().map_err(|_| {
                        TransportError::Runtime(
                            "no tokio runtime available; set one with HttpServiceBuilder::runtime"
                                .to_string(),
                        )
                    })?,
                };
                Arc::new(ReqwestTransport::new(
                    &self.config,
                    self.default_headers,
                    runtime,
                )?)
            }
        };

        Ok(HttpService {
            inner: Arc::new(ServiceInner {
                transport,
                config: self.config,
                interceptor: InterceptorSlot::default(),
                delivery: self
                    .delivery
                    .unwrap_or_else(|| Arc::new(ImmediateScheduler)),
            }),
        })
    }
}

pub(crate) struct ServiceInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) config: HttpClientConfig,
    pub(crate) interceptor: InterceptorSlot,
    pub(crate) delivery: Arc<dyn Scheduler>,
}

/// A reactive HTTP client.
///
/// Every call returns a cold [`Observable`](tessera_core::Observable): nothing
/// is sent until it is subscribed, and disposing the subscription cancels the
/// transfer. The service is cheaply cloneable; clones share one transport,
/// one interceptor slot and one delivery scheduler.
///
/// Create one per process (or per backend) and pass it to the code that
/// needs it.
///
/// # Example
///
/// ```ignore
/// use tessera_core::CancellableBag;
/// use tessera_net::http::{Endpoint, HttpService};
///
/// let service = HttpService::builder().build()?;
/// let bag = CancellableBag::new();
///
/// service
///     .request_decoded::<User>(&Endpoint::new("https://api.example.com", "/users/7"))
///     .subscribe_with(
///         |user| println!("{}", user.name),
///         |error| eprintln!("{error}"),
///         || {},
///     )
///     .store_in(&bag);
/// ```
#[derive(Clone)]
pub struct HttpService {
    pub(crate) inner: Arc<ServiceInner>,
}

impl HttpService {
    /// Create a builder.
    pub fn builder() -> HttpServiceBuilder {
        HttpServiceBuilder::new()
    }

    /// Create a service with default configuration on the ambient runtime.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a service on top of a custom transport, delivering immediately.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                transport,
                config: HttpClientConfig::default(),
                interceptor: InterceptorSlot::default(),
                delivery: Arc::new(ImmediateScheduler),
            }),
        }
    }

    /// Get the service configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.inner.config
    }

    /// Install the request interceptor, replacing any previous one.
    ///
    /// Requests already past interception are not affected.
    pub fn set_request_interceptor<I>(&self, interceptor: I)
    where
        I: RequestInterceptor,
    {
        self.inner.interceptor.set(Arc::new(interceptor));
    }

    /// Remove the request interceptor.
    pub fn clear_request_interceptor(&self) {
        self.inner.interceptor.clear();
    }

    /// Check if a request interceptor is installed.
    pub fn has_request_interceptor(&self) -> bool {
        self.inner.interceptor.is_set()
    }
}

impl HttpService {
    /// Pass `request` through the interceptor, then hand it to `start`.
    ///
    /// Shared by every pipeline. The returned teardown cancels the transfer,
    /// including one that has not reached the transport yet.
    pub(crate) fn dispatch<T, F>(
        &self,
        request: Result<HttpRequest>,
        should_intercept: bool,
        emitter: Emitter<T, HttpServiceError>,
        start: F,
    ) -> Teardown
    where
        T: Send + 'static,
        F: FnOnce(&dyn Transport, HttpRequest, Emitter<T, HttpServiceError>) -> TransferHandle
            + Send
            + 'static,
    {
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(target: "tessera_net::http", error = %err, "request could not be built");
                emitter.emit_error(HttpServiceError::Unknown(Some(err)));
                return Teardown::empty();
            }
        };

        let slot = HandleSlot::new();
        let pending = slot.clone();
        let transport = self.inner.transport.clone();
        let completion = AdaptCompletion::new(move |adapted| match adapted {
            Ok(request) => {
                if pending.is_cancelled() {
                    return;
                }
                tracing::debug!(
                    target: "tessera_net::http",
                    method = %request.method,
                    url = %request.url,
                    "sending request"
                );
                pending.set(start(transport.as_ref(), request, emitter));
            }
            Err(err) => {
                tracing::debug!(target: "tessera_net::http", error = %err, "request rejected by interceptor");
                emitter.emit_error(HttpServiceError::Unknown(Some(err)));
            }
        });
        self.inner
            .interceptor
            .adapt(request, should_intercept, completion);

        Teardown::new(move || slot.cancel())
    }
}

impl std::fmt::Debug for HttpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpService")
            .field("config", &self.inner.config)
            .field("intercepting", &self.inner.interceptor.is_set())
            .finish()
    }
}
