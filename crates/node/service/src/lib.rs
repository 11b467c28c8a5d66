//! Network service for a cloak node.
//!
//! [`NetworkService`] owns the transport and wires the connectivity monitor,
//! peer directory and discovery around it:
//!
//! - a status check and a discovery tick run on a [`TaskRunner`](cloak_tasks::TaskRunner)
//! - transport notifications are routed by a background event loop
//! - outbound sends go through a lazily opened `default` session
//! - a hard restart pauses scheduled work, restarts the transport and clears peer state

mod error;
mod events;
mod operation;
mod service;
mod sessions;
mod shared;
mod tasks;

pub use error::ServiceError;
pub use operation::{Operation, OperationOutcome};
pub use service::NetworkService;
pub use sessions::DEFAULT_SESSION;
