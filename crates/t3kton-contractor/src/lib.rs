//! Client for the Contractor provisioning system.
//!
//! Contractor speaks CInP, a JSON-over-HTTP protocol where every object is
//! addressed by a locator URI such as `/api/v1/Building/Structure:42:` and
//! methods are invoked by appending `(method)` to the locator.
//!
//! - [`CinpTransport`]: the seam between the typed client and the wire
//! - [`HttpTransport`]: real transport with session login/refresh
//! - [`MemoryTransport`]: in-process Contractor used by tests and dry runs
//! - [`Contractor`]: typed operations used by the reconciler

mod client;
mod error;
mod http;
mod locator;
mod memory;
mod models;
mod transport;

pub use client::Contractor;
pub use error::{ContractorError, ContractorResult};
pub use http::{HttpConfig, HttpTransport};
pub use locator::{Locator, ObjectKind, API_NAMESPACE};
pub use memory::{MemoryTransport, RecordedCall};
pub use models::{RemoteFoundation, RemoteJob, RemoteStructure, StructureUpdate};
pub use transport::{CinpTransport, CinpVerb};
