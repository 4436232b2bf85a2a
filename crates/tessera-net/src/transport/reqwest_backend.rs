//! Transport backed by a shared `reqwest` client.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::redirect::Policy;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use super::{Completion, DownloadSink, ProgressCallback, TransferHandle, Transport};
use crate::error::{Result, TransportError};
use crate::http::{
    FormPart, HttpClientConfig, HttpRequest, MultipartForm, RawResponse, RequestBody,
    ResponseMetadata, TransferProgress,
};

/// Size of the chunks multipart payloads are streamed in.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// A [`Transport`] that drives `reqwest` on a tokio runtime.
///
/// One transport owns one connection pool; every request issued through it
/// shares that pool. Operations are spawned on the runtime given at
/// construction and can be cancelled through their [`TransferHandle`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    runtime: Handle,
}

impl ReqwestTransport {
    /// Build a transport from client configuration.
    pub fn new(
        config: &HttpClientConfig,
        default_headers: http::HeaderMap,
        runtime: Handle,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();

        // Timeout configuration
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        // Redirect policy
        if config.follow_redirects {
            builder = builder.redirect(Policy::limited(config.max_redirects));
        } else {
            builder = builder.redirect(Policy::none());
        }

        if config.cookies_enabled {
            builder = builder.cookie_store(true);
        }

        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua);
        }

        if let Some(ref proxy_url) = config.proxy {
            let proxy =
                reqwest::Proxy::all(proxy_url).map_err(|e| TransportError::Proxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        builder = builder.default_headers(default_headers);

        Ok(Self {
            client: builder.build()?,
            runtime,
        })
    }

    fn prepare(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(request.method.to_reqwest(), request.url)
            .headers(request.headers);

        builder = match request.body {
            RequestBody::None => builder,
            RequestBody::Text(text) => builder.body(text),
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Bytes(bytes) => builder.body(bytes),
        };

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }

    /// Run `work` on the runtime until it finishes or the handle is cancelled.
    fn spawn<F>(&self, work: F) -> TransferHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let handle = TransferHandle::new(move || {
            let _ = cancel_tx.send(());
        });
        let task_handle = handle.clone();

        self.runtime.spawn(async move {
            tokio::select! {
                _ = work => {
                    task_handle.finish();
                }
                _ = cancel_rx => {
                    tracing::trace!(target: "tessera_net::transport", "operation aborted");
                }
            }
        });

        handle
    }
}

impl Transport for ReqwestTransport {
    fn perform(&self, request: HttpRequest, completion: Completion<RawResponse>) -> TransferHandle {
        tracing::debug!(
            target: "tessera_net::transport",
            method = %request.method,
            url = %request.url,
            "performing request"
        );
        let builder = self.prepare(request);
        self.spawn(async move {
            completion(fetch(builder).await);
        })
    }

    fn download(
        &self,
        request: HttpRequest,
        destination: PathBuf,
        progress: ProgressCallback,
        completion: Completion<ResponseMetadata>,
    ) -> TransferHandle {
        tracing::debug!(
            target: "tessera_net::transport",
            url = %request.url,
            destination = %destination.display(),
            "starting download"
        );
        let builder = self.prepare(request);
        self.spawn(async move {
            completion(fetch_to_file(builder, destination, progress).await);
        })
    }

    fn upload(
        &self,
        request: HttpRequest,
        form: MultipartForm,
        progress: ProgressCallback,
        completion: Completion<RawResponse>,
    ) -> TransferHandle {
        tracing::debug!(
            target: "tessera_net::transport",
            method = %request.method,
            url = %request.url,
            "starting upload"
        );
        let form = match form.into_parts().and_then(|parts| tracked_form(parts, progress)) {
            Ok(form) => form,
            Err(err) => {
                completion(Err(err));
                return TransferHandle::finished();
            }
        };
        let builder = self.prepare(request).multipart(form);
        self.spawn(async move {
            completion(fetch(builder).await);
        })
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

async fn fetch(builder: reqwest::RequestBuilder) -> Result<RawResponse> {
    let response = builder.send().await?;
    let metadata = ResponseMetadata::from_reqwest(&response);
    let body = response.bytes().await?;
    Ok(RawResponse {
        metadata: Some(metadata),
        body,
    })
}

async fn fetch_to_file(
    builder: reqwest::RequestBuilder,
    destination: PathBuf,
    progress: ProgressCallback,
) -> Result<ResponseMetadata> {
    let mut response = builder.send().await?;
    let metadata = ResponseMetadata::from_reqwest(&response);

    if !metadata.is_acceptable() {
        let message = response.text().await.ok().filter(|text| !text.is_empty());
        return Err(TransportError::HttpStatus {
            status: metadata.status,
            message,
        });
    }

    let total = response.content_length();
    let mut sink = DownloadSink::create(&destination)?;
    while let Some(chunk) = response.chunk().await? {
        let written = sink.write(&chunk)?;
        progress(TransferProgress::new(written, total));
    }
    sink.commit()?;

    Ok(metadata)
}

/// Build a multipart form whose parts report progress as they are read.
fn tracked_form(parts: Vec<FormPart>, progress: ProgressCallback) -> Result<reqwest::multipart::Form> {
    let total: u64 = parts.iter().map(|p| p.data.len() as u64).sum();
    let sent = Arc::new(AtomicU64::new(0));

    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        let length = part.data.len() as u64;
        let chunks = chunked(part.data);

        let sent = sent.clone();
        let progress = progress.clone();
        let stream = futures_util::stream::iter(chunks).map(move |chunk| {
            let so_far = sent.fetch_add(chunk.len() as u64, Ordering::SeqCst) + chunk.len() as u64;
            progress(TransferProgress::new(so_far, Some(total)));
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let mut body = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(stream),
            length,
        );
        if let Some(file_name) = part.file_name {
            body = body.file_name(file_name);
        }
        if let Some(mime) = part.mime_type {
            body = body
                .mime_str(&mime)
                .map_err(|_| TransportError::InvalidHeader(format!("invalid MIME type '{mime}'")))?;
        }
        form = form.part(part.name, body);
    }
    Ok(form)
}

fn chunked(data: Bytes) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(data.len().div_ceil(UPLOAD_CHUNK_SIZE));
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + UPLOAD_CHUNK_SIZE).min(data.len());
        chunks.push(data.slice(offset..end));
        offset = end;
    }
    chunks
}
