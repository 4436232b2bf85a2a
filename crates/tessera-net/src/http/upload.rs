//! The upload pipeline.

use std::sync::Arc;

use tessera_core::{Emitter, Observable};

use super::client::HttpService;
use super::endpoint::UploadEndpoint;
use super::response::{RawResponse, TransferProgress};
use super::rest::status_error;
use crate::error::HttpServiceError;

impl HttpService {
    /// Upload the multipart form built by `endpoint`.
    ///
    /// The form callback runs once per subscription. Emits upload progress
    /// and completes when the server answers with an acceptable status.
    /// Failures are [`HttpServiceError::Unknown`], passed through the
    /// endpoint's error mapper. Uploads are never retried.
    pub fn upload(&self, endpoint: &UploadEndpoint) -> Observable<TransferProgress, HttpServiceError> {
        let service = self.clone();
        let attempt = endpoint.clone();
        let mapper = endpoint.endpoint().clone();

        Observable::create(move |emitter: Emitter<TransferProgress, HttpServiceError>| {
            let form = attempt.build_form();
            service.dispatch(
                attempt.to_request(),
                attempt.endpoint().should_intercept(),
                emitter,
                move |transport, request, emitter| {
                    let progress = emitter.clone();
                    transport.upload(
                        request,
                        form,
                        Arc::new(move |update| progress.emit_next(update)),
                        Box::new(move |result| match result {
                            Ok(RawResponse {
                                metadata: Some(metadata),
                                body,
                            }) => {
                                if metadata.is_acceptable() {
                                    emitter.emit_complete();
                                } else {
                                    emitter.emit_error(HttpServiceError::Unknown(Some(
                                        status_error(&metadata, &body),
                                    )));
                                }
                            }
                            Ok(RawResponse { metadata: None, .. }) => {
                                emitter.emit_error(HttpServiceError::Unknown(None));
                            }
                            Err(err) => emitter.emit_error(HttpServiceError::Unknown(Some(err))),
                        }),
                    )
                },
            )
        })
        .map_err(move |error| {
            tracing::debug!(target: "tessera_net::http", endpoint = %mapper.summary(), %error, "upload failed");
            mapper.map_error(error)
        })
        .observe_on(self.inner.delivery.clone())
    }
}
