//! The request pipeline.
//!
//! Three layers share one implementation of sending, retrying and error
//! mapping:
//!
//! - [`HttpService::request_raw`] emits the response metadata and body bytes
//! - [`HttpService::request_json`] also parses the body as JSON
//! - [`HttpService::request_decoded`] deserializes the body into a type
//!
//! Every layer emits exactly one value and completes, or fails with one
//! [`HttpServiceError`]. Failed sends are retried `endpoint.retries()` times,
//! each retry rebuilding the request and passing the interceptor again.
//! Decoding failures are never retried.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tessera_core::{Emitter, Observable};

use super::client::HttpService;
use super::endpoint::Endpoint;
use super::response::{RawResponse, ResponseMetadata};
use crate::error::{HttpServiceError, TransportError};

type RawOutput = (ResponseMetadata, Bytes);

impl HttpService {
    /// Send `endpoint` and emit the response metadata and raw body.
    pub fn request_raw(
        &self,
        endpoint: &Endpoint,
    ) -> Observable<(ResponseMetadata, Bytes), HttpServiceError> {
        self.raw_pipeline(endpoint)
            .observe_on(self.inner.delivery.clone())
    }

    /// Send `endpoint` and emit the response metadata and JSON body.
    ///
    /// A body that is not valid JSON fails with
    /// [`HttpServiceError::DecodingFailed`].
    pub fn request_json(
        &self,
        endpoint: &Endpoint,
    ) -> Observable<(ResponseMetadata, serde_json::Value), HttpServiceError> {
        let decoder = endpoint.clone();
        self.raw_pipeline(endpoint)
            .try_map(move |(metadata, body)| {
                serde_json::from_slice::<serde_json::Value>(&body)
                    .map(|value| (metadata, value))
                    .map_err(|err| decoding_failed(&decoder, err))
            })
            .observe_on(self.inner.delivery.clone())
    }

    /// Send `endpoint` and emit the body deserialized as `T`.
    ///
    /// A body that does not match `T` fails with
    /// [`HttpServiceError::DecodingFailed`].
    pub fn request_decoded<T>(&self, endpoint: &Endpoint) -> Observable<T, HttpServiceError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let decoder = endpoint.clone();
        self.raw_pipeline(endpoint)
            .try_map(move |(_, body)| {
                serde_json::from_slice::<T>(&body).map_err(|err| decoding_failed(&decoder, err))
            })
            .observe_on(self.inner.delivery.clone())
    }

    /// Send, retry, then map the final error. Runs on the transport's thread.
    fn raw_pipeline(&self, endpoint: &Endpoint) -> Observable<RawOutput, HttpServiceError> {
        let service = self.clone();
        let attempt = endpoint.clone();
        let mapper = endpoint.clone();

        Observable::create(move |emitter: Emitter<RawOutput, HttpServiceError>| {
            service.dispatch(
                attempt.to_request(),
                attempt.should_intercept(),
                emitter,
                |transport, request, emitter| {
                    transport.perform(
                        request,
                        Box::new(move |result| match classify(result) {
                            Ok(output) => {
                                emitter.emit_next(output);
                                emitter.emit_complete();
                            }
                            Err(error) => emitter.emit_error(error),
                        }),
                    )
                },
            )
        })
        .retry(endpoint.retries())
        .map_err(move |error| {
            tracing::debug!(target: "tessera_net::http", endpoint = %mapper.summary(), %error, "request failed");
            mapper.map_error(error)
        })
    }
}

fn decoding_failed(endpoint: &Endpoint, err: serde_json::Error) -> HttpServiceError {
    endpoint.map_error(HttpServiceError::decoding_failed(endpoint.summary(), err))
}

/// Turn a transport outcome into the pipeline's value or error.
///
/// A response with an acceptable status is a success. A failure status with
/// a JSON body becomes [`HttpServiceError::RequestFailed`]; everything else
/// is [`HttpServiceError::Unknown`].
pub(crate) fn classify(
    result: Result<RawResponse, TransportError>,
) -> Result<RawOutput, HttpServiceError> {
    let response = result.map_err(|err| HttpServiceError::Unknown(Some(err)))?;
    let Some(metadata) = response.metadata else {
        return Err(HttpServiceError::Unknown(None));
    };

    if metadata.is_acceptable() {
        return Ok((metadata, response.body));
    }

    match serde_json::from_slice::<serde_json::Value>(&response.body) {
        Ok(body) => Err(HttpServiceError::RequestFailed {
            status_code: metadata.status,
            response: body,
        }),
        Err(_) => Err(HttpServiceError::Unknown(Some(status_error(
            &metadata,
            &response.body,
        )))),
    }
}

pub(crate) fn status_error(metadata: &ResponseMetadata, body: &Bytes) -> TransportError {
    TransportError::HttpStatus {
        status: metadata.status,
        message: (!body.is_empty()).then(|| String::from_utf8_lossy(body).into_owned()),
    }
}
