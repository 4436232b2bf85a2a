//! The download pipeline.

use std::sync::Arc;

use tessera_core::{Emitter, Observable};

use super::client::HttpService;
use super::endpoint::DownloadEndpoint;
use super::response::TransferProgress;
use crate::error::HttpServiceError;

impl HttpService {
    /// Download `endpoint.source_url()` to `endpoint.destination()`.
    ///
    /// Emits progress in the order the transport reports it and completes
    /// once the payload is in place, replacing any previous file. A failed or
    /// disposed download leaves the previous file untouched. Failures are
    /// [`HttpServiceError::Unknown`], passed through the endpoint's error
    /// mapper. Downloads are never retried.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let download = DownloadEndpoint::new(url, "/tmp/report.pdf");
    /// service
    ///     .download(&download)
    ///     .subscribe_with(
    ///         |progress| println!("{:?}%", progress.percent()),
    ///         |error| eprintln!("{error}"),
    ///         || println!("saved"),
    ///     )
    ///     .store_in(&bag);
    /// ```
    pub fn download(
        &self,
        endpoint: &DownloadEndpoint,
    ) -> Observable<TransferProgress, HttpServiceError> {
        let service = self.clone();
        let attempt = endpoint.clone();
        let mapper = endpoint.endpoint().clone();
        let summary = endpoint.summary();

        Observable::create(move |emitter: Emitter<TransferProgress, HttpServiceError>| {
            let destination = attempt.destination().to_path_buf();
            service.dispatch(
                attempt.to_request(),
                attempt.endpoint().should_intercept(),
                emitter,
                move |transport, request, emitter| {
                    let progress = emitter.clone();
                    transport.download(
                        request,
                        destination,
                        Arc::new(move |update| progress.emit_next(update)),
                        Box::new(move |result| match result {
                            Ok(_) => emitter.emit_complete(),
                            Err(err) => emitter.emit_error(HttpServiceError::Unknown(Some(err))),
                        }),
                    )
                },
            )
        })
        .map_err(move |error| {
            tracing::debug!(target: "tessera_net::http", endpoint = %summary, %error, "download failed");
            mapper.map_error(error)
        })
        .observe_on(self.inner.delivery.clone())
    }
}
