//! # Transport
//!
//! A single logical WebSocket connection to one endpoint that heals itself.
//! The transport never inspects message content; it hands raw frames and
//! connection state transitions to the caller as one ordered event stream.
//!
//! ## Contained Modules:
//! - **`events`**: `ConnectionState`, `RawMessage`, `TransportEvent` and
//!   `TransportError`. Always compiled, so the synchronous pipeline can be
//!   driven by synthetic event sequences without a network stack.
//! - **`endpoint`** (feature `transport`): validated `ws://`/`wss://` URLs.
//! - **`backoff`** (feature `transport`): capped exponential retry delays.
//! - **`client`** (feature `transport`): the tokio-tungstenite connection task
//!   and its `TransportHandle`.

pub mod events;

#[cfg(feature = "transport")]
pub mod backoff;
#[cfg(feature = "transport")]
pub mod client;
#[cfg(feature = "transport")]
pub mod endpoint;

pub use events::{ConnectionState, RawMessage, TransportError, TransportEvent};

#[cfg(feature = "transport")]
pub use backoff::Backoff;
#[cfg(feature = "transport")]
pub use client::{connect, TransportConfig, TransportEvents, TransportHandle};
#[cfg(feature = "transport")]
pub use endpoint::Endpoint;
