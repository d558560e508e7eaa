//! # lib_overlay
//!
//! The state-synchronization pipeline behind a live telemetry overlay.
//!
//! ```text
//! Transport -> Decoder -> StateStore.compare (DiffEngine) -> RenderDispatcher -> sinks
//! ```
//!
//! Everything except the transport is synchronous and schema-agnostic: what a
//! given overlay shows is decided by its [`bindings::BindingSet`], never by
//! code in this crate.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod bindings;
pub mod decoder;
pub mod diff;
pub mod pipeline;
pub mod render;
pub mod snapshot;
pub mod state_store;
pub mod transport;

// Re-export everything a binary needs to assemble a pipeline.
pub use bindings::{BindingSet, ConfigError, FieldBinding};
pub use decoder::{DecodeError, Decoder};
pub use diff::{BindingError, DiffEngine, DiffRule};
pub use pipeline::{Pipeline, PipelineStats, ReconnectPolicy};
pub use render::{Animator, MemorySink, RenderDispatcher, RenderSink, Tweener};
pub use snapshot::{FieldPath, FieldValue, Snapshot};
pub use state_store::{Change, Delta, StateStore};
pub use transport::{ConnectionState, RawMessage, TransportError, TransportEvent};
