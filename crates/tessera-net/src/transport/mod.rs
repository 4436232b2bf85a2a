//! The transport boundary.
//!
//! A [`Transport`] performs the physical network and file work. It is
//! callback based: every operation starts immediately, reports progress and
//! its outcome through closures, and hands back a [`TransferHandle`] that
//! aborts it. The pipelines in [`crate::http`] wrap these callbacks as
//! observables.
//!
//! [`ReqwestTransport`] is the default implementation.

mod reqwest_backend;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use crate::error::Result;
use crate::http::{HttpRequest, MultipartForm, RawResponse, ResponseMetadata, TransferProgress};

pub use reqwest_backend::ReqwestTransport;

/// Receives the outcome of a transport operation. Called at most once.
pub type Completion<T> = Box<dyn FnOnce(Result<T>) + Send>;

/// Receives progress reports of a transfer, in order.
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Performs HTTP work on behalf of an [`HttpService`](crate::http::HttpService).
///
/// Implementations must not call `completion` after the returned handle was
/// cancelled, and must not call any callback after `completion`.
pub trait Transport: Send + Sync + 'static {
    /// Send `request` and report the response, whatever its status.
    fn perform(&self, request: HttpRequest, completion: Completion<RawResponse>) -> TransferHandle;

    /// Fetch `request` and place the body at `destination`.
    ///
    /// Fails with [`TransportError::HttpStatus`](crate::TransportError::HttpStatus)
    /// if the status is outside 200..=399, without touching `destination`.
    /// Completes only after the payload is in place.
    fn download(
        &self,
        request: HttpRequest,
        destination: PathBuf,
        progress: ProgressCallback,
        completion: Completion<ResponseMetadata>,
    ) -> TransferHandle;

    /// Send `form` as a multipart body and report the response.
    fn upload(
        &self,
        request: HttpRequest,
        form: MultipartForm,
        progress: ProgressCallback,
        completion: Completion<RawResponse>,
    ) -> TransferHandle;
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// A handle to an in-flight transport operation that can be cancelled.
#[derive(Clone)]
pub struct TransferHandle {
    cancel: Arc<Mutex<Option<CancelFn>>>,
}

impl TransferHandle {
    /// Create a handle that runs `cancel` on the first cancellation.
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Arc::new(Mutex::new(Some(Box::new(cancel)))),
        }
    }

    /// A handle for an operation that already finished.
    pub fn finished() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(None)),
        }
    }

    /// Cancel the operation.
    ///
    /// Returns `true` if the cancellation ran, `false` if the operation had
    /// already finished or was already cancelled.
    pub fn cancel(&self) -> bool {
        let cancel = self.cancel.lock().take();
        match cancel {
            Some(cancel) => {
                cancel();
                true
            }
            None => false,
        }
    }

    /// Mark the operation as finished; later cancellations do nothing.
    pub fn finish(&self) {
        self.cancel.lock().take();
    }

    /// Check if the operation is still pending.
    pub fn is_pending(&self) -> bool {
        self.cancel.lock().is_some()
    }
}

impl std::fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferHandle")
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Holds the handle of an operation that may start after its teardown exists.
///
/// Requests that pass through an asynchronous interceptor reach the transport
/// later than the subscription is created. A cancel that arrives first is
/// remembered and applied to the handle once it is set.
#[derive(Default)]
pub(crate) struct HandleSlot {
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    cancelled: bool,
    handle: Option<TransferHandle>,
}

impl HandleSlot {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    pub(crate) fn set(&self, handle: TransferHandle) {
        let mut state = self.state.lock();
        if state.cancelled {
            drop(state);
            handle.cancel();
        } else {
            state.handle = Some(handle);
        }
    }

    pub(crate) fn cancel(&self) {
        let handle = {
            let mut state = self.state.lock();
            state.cancelled = true;
            state.handle.take()
        };
        if let Some(handle) = handle
            && handle.cancel()
        {
            tracing::debug!(target: "tessera_net::transport", "transfer cancelled");
        }
    }
}

/// Writes a download next to its destination and moves it into place.
///
/// Bytes go to a temporary file in the destination's directory. [`commit`]
/// renames it over the destination, replacing any previous file in one step.
/// Dropping the sink without committing deletes the temporary file and leaves
/// the destination untouched.
///
/// [`commit`]: DownloadSink::commit
pub struct DownloadSink {
    file: NamedTempFile,
    destination: PathBuf,
    written: u64,
}

impl DownloadSink {
    /// Prepare a download to `destination`, creating its directory if needed.
    pub fn create(destination: &Path) -> Result<Self> {
        let directory = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(directory)?;
        let file = NamedTempFile::new_in(directory)?;
        Ok(Self {
            file,
            destination: destination.to_path_buf(),
            written: 0,
        })
    }

    /// Append a chunk. Returns the total number of bytes written.
    pub fn write(&mut self, chunk: &[u8]) -> Result<u64> {
        self.file.write_all(chunk)?;
        self.written += chunk.len() as u64;
        Ok(self.written)
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush to disk and move the file to its destination.
    pub fn commit(mut self) -> Result<PathBuf> {
        self.file.flush()?;
        self.file.as_file().sync_all()?;
        self.file
            .persist(&self.destination)
            .map_err(|err| err.error)?;
        Ok(self.destination)
    }
}

impl std::fmt::Debug for DownloadSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadSink")
            .field("destination", &self.destination)
            .field("written", &self.written)
            .finish()
    }
}
