//! Reactive HTTP client for Tessera.
//!
//! Requests are described by endpoint values and sent through an
//! [`HttpService`]. Every call returns a cold observable: nothing happens
//! until it is subscribed, and disposing the subscription cancels the work.
//!
//! # Example
//!
//! ```ignore
//! use tessera_core::CancellableBag;
//! use tessera_net::http::{Endpoint, HttpMethod, HttpService};
//!
//! let service = HttpService::new()?;
//! let bag = CancellableBag::new();
//!
//! let create = Endpoint::new("https://api.example.com", "/users")
//!     .with_method(HttpMethod::Post)
//!     .with_parameter("name", "Ada")
//!     .with_retries(2);
//!
//! service
//!     .request_json(&create)
//!     .subscribe_with(
//!         |(metadata, body)| println!("{}: {body}", metadata.status),
//!         |error| eprintln!("{error}"),
//!         || {},
//!     )
//!     .store_in(&bag);
//! ```
//!
//! # Transfers
//!
//! [`HttpService::download`] and [`HttpService::upload`] emit
//! [`TransferProgress`] values and complete once the transfer is done.

mod client;
mod download;
mod endpoint;
mod interceptor;
mod request;
mod response;
mod rest;
mod upload;

pub use client::{HttpClientConfig, HttpService, HttpServiceBuilder};
pub use endpoint::{
    DownloadEndpoint, Endpoint, EndpointSummary, ErrorMapper, FormBuilder, ParameterEncoding,
    UploadEndpoint,
};
pub use interceptor::{AdaptCompletion, RequestInterceptor};
pub use request::{FormPart, HttpMethod, HttpRequest, MultipartForm, RequestBody};
pub use response::{RawResponse, ResponseMetadata, TransferProgress};
