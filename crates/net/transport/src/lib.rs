//! Transport facade for the anonymizing overlay.
//!
//! The overlay router itself is external. This crate fixes the interface the
//! control layer needs from it ([`TransportProvider`], [`TransportSession`],
//! [`TransportEvent`]), the [`Envelope`] exchanged between nodes, and its
//! JSON [`EnvelopeCodec`].
//!
//! [`memory`] provides an in-process provider for tests and local meshes.

mod codec;
mod envelope;
mod error;
mod facade;
pub mod memory;
mod status;

pub use codec::{EnvelopeCodec, MAX_PAYLOAD_WARN_BYTES};
pub use envelope::{Envelope, Marker, Payload, Route};
pub use error::{CodecError, TransportError};
pub use facade::{SenderIdentity, TransportEvent, TransportProvider, TransportSession};
pub use status::TransportStatus;
