//! Logging targets for Tessera.
//!
//! Tessera uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("tessera_net::http=debug")
//!         .init();
//! }
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Observable bridge and operators.
    pub const OBSERVABLE: &str = "tessera_core::observable";
    /// Cancellable bag bookkeeping.
    pub const BAG: &str = "tessera_core::bag";
    /// Delivery schedulers.
    pub const SCHEDULER: &str = "tessera_core::scheduler";
    /// Request and transfer pipelines.
    pub const HTTP: &str = "tessera_net::http";
    /// Transport implementations.
    pub const TRANSPORT: &str = "tessera_net::transport";
}
