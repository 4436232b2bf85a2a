//! Shared fixtures for the pipeline tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tessera_core::Observer;
use tessera_net::http::{HttpRequest, MultipartForm, RawResponse, ResponseMetadata, TransferProgress};
use tessera_net::transport::{
    Completion, DownloadSink, ProgressCallback, TransferHandle, Transport,
};
use tessera_net::{HttpServiceError, TransportError};

/// What the mock answers to one operation.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Respond with a status and body.
    Status(u16, &'static str),
    /// Fail at the transport level.
    Fail(TransportError),
    /// Fail at the transport level from another thread.
    FailLater(TransportError),
    /// Respond without any metadata.
    Empty,
    /// Never answer; the operation stays pending until cancelled.
    Hold,
}

/// A scripted in-memory transport.
///
/// Replies are consumed in order; the last one repeats once the script runs
/// out. Answers are delivered synchronously from the calling thread.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
    forms: Mutex<Vec<MultipartForm>>,
    held: Mutex<Vec<Completion<RawResponse>>>,
    cancels: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn uploaded_forms(&self) -> usize {
        self.forms.lock().len()
    }

    /// Answer every held `perform` with `status` and `body`.
    pub fn release(&self, status: u16, body: &'static str) {
        let held: Vec<_> = self.held.lock().drain(..).collect();
        let url = self.requests.lock().last().map(|r| r.url.clone());
        for completion in held {
            if let Some(url) = url.clone() {
                completion(Ok(response(status, url, body)));
            }
        }
    }

    fn next_reply(&self, request: &HttpRequest) -> Reply {
        self.requests.lock().push(request.clone());
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front().unwrap_or(Reply::Empty)
        } else {
            script.front().cloned().unwrap_or(Reply::Empty)
        }
    }

    fn pending_handle(&self) -> TransferHandle {
        let cancels = self.cancels.clone();
        TransferHandle::new(move || {
            cancels.fetch_add(1, Ordering::SeqCst);
        })
    }
}

fn response(status: u16, url: url::Url, body: &'static str) -> RawResponse {
    RawResponse {
        metadata: Some(ResponseMetadata::new(status, url)),
        body: Bytes::from_static(body.as_bytes()),
    }
}

impl Transport for MockTransport {
    fn perform(&self, request: HttpRequest, completion: Completion<RawResponse>) -> TransferHandle {
        match self.next_reply(&request) {
            Reply::Status(status, body) => completion(Ok(response(status, request.url, body))),
            Reply::Fail(err) => completion(Err(err)),
            Reply::FailLater(err) => {
                std::thread::spawn(move || completion(Err(err)));
            }
            Reply::Empty => completion(Ok(RawResponse {
                metadata: None,
                body: Bytes::new(),
            })),
            Reply::Hold => {
                self.held.lock().push(completion);
                return self.pending_handle();
            }
        }
        TransferHandle::finished()
    }

    fn download(
        &self,
        request: HttpRequest,
        destination: PathBuf,
        progress: ProgressCallback,
        completion: Completion<ResponseMetadata>,
    ) -> TransferHandle {
        let (status, body) = match self.next_reply(&request) {
            Reply::Status(status, body) => (status, body),
            Reply::Fail(err) | Reply::FailLater(err) => {
                completion(Err(err));
                return TransferHandle::finished();
            }
            Reply::Empty => {
                completion(Err(TransportError::Connection("empty reply".into())));
                return TransferHandle::finished();
            }
            Reply::Hold => return self.pending_handle(),
        };

        let metadata = ResponseMetadata::new(status, request.url);
        if !metadata.is_acceptable() {
            completion(Err(TransportError::HttpStatus {
                status,
                message: Some(body.to_string()),
            }));
            return TransferHandle::finished();
        }

        // Four equal quarters, then commit.
        let result = (|| {
            let mut sink = DownloadSink::create(&destination)?;
            let total = body.len() as u64;
            let bytes = body.as_bytes();
            for quarter in 1..=4 {
                let start = bytes.len() * (quarter - 1) / 4;
                let end = bytes.len() * quarter / 4;
                let written = sink.write(&bytes[start..end])?;
                progress(TransferProgress::new(written, Some(total)));
            }
            sink.commit()
        })();

        completion(result.map(|_| metadata));
        TransferHandle::finished()
    }

    fn upload(
        &self,
        request: HttpRequest,
        form: MultipartForm,
        progress: ProgressCallback,
        completion: Completion<RawResponse>,
    ) -> TransferHandle {
        let reply = self.next_reply(&request);
        let total = form.content_length();
        self.forms.lock().push(form);

        match reply {
            Reply::Status(status, body) => {
                progress(TransferProgress::new(total / 2, Some(total)));
                progress(TransferProgress::new(total, Some(total)));
                completion(Ok(response(status, request.url, body)));
            }
            Reply::Fail(err) | Reply::FailLater(err) => completion(Err(err)),
            Reply::Empty => completion(Ok(RawResponse {
                metadata: None,
                body: Bytes::new(),
            })),
            Reply::Hold => return self.pending_handle(),
        }
        TransferHandle::finished()
    }
}

/// One observed event.
#[derive(Debug)]
pub enum Event<T> {
    Next(T),
    Error(HttpServiceError),
    Completed,
}

/// An observer that records everything it sees.
pub struct Recorder<T> {
    events: Arc<Mutex<Vec<Event<T>>>>,
}

impl<T> Recorder<T> {
    pub fn new() -> (Self, Arc<Mutex<Vec<Event<T>>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: events.clone(),
            },
            events,
        )
    }
}

impl<T: Send + 'static> Observer<T, HttpServiceError> for Recorder<T> {
    fn on_next(&self, value: T) {
        self.events.lock().push(Event::Next(value));
    }

    fn on_error(&self, error: HttpServiceError) {
        self.events.lock().push(Event::Error(error));
    }

    fn on_completed(&self) {
        self.events.lock().push(Event::Completed);
    }
}

/// The single error in `events`, if the stream failed.
pub fn error_of<T>(events: &[Event<T>]) -> Option<&HttpServiceError> {
    events.iter().find_map(|event| match event {
        Event::Error(err) => Some(err),
        _ => None,
    })
}

pub fn completed<T>(events: &[Event<T>]) -> bool {
    matches!(events.last(), Some(Event::Completed))
}
