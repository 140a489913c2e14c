//! Native messaging host used by the browser extension.
//!
//! The browser starts the host with the extension connected to its stdio and
//! exchanges length prefixed JSON frames ([`framing`]). Visited URLs and page
//! metadata are recorded through the shared write queue; the domain blocklist
//! is served on request and pushed whenever it changes.

pub mod framing;
mod host;
mod message;

pub use host::{DEFAULT_GUI_ORIGIN, DEFAULT_POLL_INTERVAL, HostConfig, HostError, NativeHost};
pub use message::{MessageError, Request, Response, WebMetadataPayload};
