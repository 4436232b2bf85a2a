//! Request interception.
//!
//! An interceptor sees every request of an endpoint that opts in with
//! [`Endpoint::with_interception`](super::Endpoint::with_interception), right
//! before it is sent. It may change the request (typically to attach or
//! refresh an auth token) or reject it. Work may finish later on another
//! thread: the interceptor answers through an [`AdaptCompletion`].
//!
//! # Example
//!
//! ```
//! use tessera_net::http::{AdaptCompletion, HttpRequest};
//!
//! fn attach_token(mut request: HttpRequest, completion: AdaptCompletion) {
//!     match request.bearer_auth("secret-token") {
//!         Ok(()) => completion.proceed(request),
//!         Err(err) => completion.complete(Err(err)),
//!     }
//! }
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

use super::request::HttpRequest;
use crate::error::{Result, TransportError};

/// A hook that adapts requests before they are sent.
pub trait RequestInterceptor: Send + Sync + 'static {
    /// Inspect or change `request`, then answer through `completion`.
    fn adapt(&self, request: HttpRequest, completion: AdaptCompletion);
}

impl<F> RequestInterceptor for F
where
    F: Fn(HttpRequest, AdaptCompletion) + Send + Sync + 'static,
{
    fn adapt(&self, request: HttpRequest, completion: AdaptCompletion) {
        self(request, completion)
    }
}

type AdaptCallback = Box<dyn FnOnce(Result<HttpRequest>) + Send>;

/// The one-shot answer channel handed to a [`RequestInterceptor`].
///
/// Consuming methods make it impossible to answer twice. Dropping it without
/// answering fails the request with [`TransportError::Interception`].
pub struct AdaptCompletion {
    callback: Option<AdaptCallback>,
}

impl AdaptCompletion {
    pub(crate) fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Result<HttpRequest>) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    /// Send `request`.
    pub fn proceed(self, request: HttpRequest) {
        self.complete(Ok(request))
    }

    /// Abort the send with a message.
    pub fn reject(self, message: impl Into<String>) {
        self.complete(Err(TransportError::Interception(message.into())))
    }

    /// Answer with a request to send or an error that aborts the send.
    pub fn complete(mut self, result: Result<HttpRequest>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl Drop for AdaptCompletion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            tracing::warn!(
                target: "tessera_net::http",
                "request interceptor dropped its completion without answering"
            );
            callback(Err(TransportError::Interception(
                "interceptor did not complete the request".to_string(),
            )));
        }
    }
}

impl std::fmt::Debug for AdaptCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptCompletion")
            .field("answered", &self.callback.is_none())
            .finish()
    }
}

/// The client's single interceptor slot. Last write wins.
#[derive(Default)]
pub(crate) struct InterceptorSlot {
    hook: RwLock<Option<Arc<dyn RequestInterceptor>>>,
}

impl InterceptorSlot {
    pub(crate) fn set(&self, interceptor: Arc<dyn RequestInterceptor>) {
        *self.hook.write() = Some(interceptor);
    }

    pub(crate) fn clear(&self) {
        *self.hook.write() = None;
    }

    pub(crate) fn is_set(&self) -> bool {
        self.hook.read().is_some()
    }

    /// Pass `request` through the current hook, or straight to `completion`.
    ///
    /// The hook is read once, at call time.
    pub(crate) fn adapt(&self, request: HttpRequest, should_intercept: bool, completion: AdaptCompletion) {
        let hook = if should_intercept {
            self.hook.read().clone()
        } else {
            None
        };

        match hook {
            Some(hook) => {
                tracing::trace!(target: "tessera_net::http", url = %request.url, "intercepting request");
                hook.adapt(request, completion);
            }
            None => completion.proceed(request),
        }
    }
}
