//! Networking layer for Tessera.
//!
//! This crate turns HTTP work into the reactive primitives of
//! [`tessera_core`]:
//!
//! - **Endpoints**: [`Endpoint`], [`DownloadEndpoint`] and
//!   [`UploadEndpoint`] describe what to send
//! - **Request pipeline**: raw, JSON and typed responses with retries and
//!   per-endpoint error mapping
//! - **Transfers**: downloads and multipart uploads with progress
//! - **Interception**: one client-wide hook that can adapt or reject
//!   requests before they are sent
//! - **Transport**: the [`Transport`](transport::Transport) trait, with a
//!   `reqwest` implementation as the default
//!
//! # Example
//!
//! ```ignore
//! use serde::Deserialize;
//! use tessera_core::CancellableBag;
//! use tessera_net::{Endpoint, HttpService};
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! let service = HttpService::new()?;
//! let bag = CancellableBag::new();
//!
//! service
//!     .request_decoded::<User>(&Endpoint::new("https://api.example.com", "/users/7"))
//!     .subscribe_with(
//!         |user| println!("{} #{}", user.name, user.id),
//!         |error| eprintln!("request failed: {error}"),
//!         || {},
//!     )
//!     .store_in(&bag);
//!
//! // Dropping the bag cancels anything still in flight.
//! drop(bag);
//! ```
//!
//! # Logging
//!
//! Pipelines log on the `tessera_net::http` target and transports on
//! `tessera_net::transport`. See [`tessera_core::logging`].

mod error;
pub mod http;
pub mod transport;

pub use error::{HttpServiceError, Result, TransportError};
pub use http::{
    DownloadEndpoint, Endpoint, HttpMethod, HttpService, HttpServiceBuilder, ResponseMetadata,
    TransferProgress, UploadEndpoint,
};
