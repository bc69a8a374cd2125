//! Reconnecting realtime client for the roadside gateway
//!
//! Keeps one logical connection to the session server alive: authenticates
//! on every open, exposes the latest event, and reconnects with capped
//! exponential backoff until shut down.

pub mod backoff;
pub mod error;
pub mod socket;

pub use backoff::reconnect_delay;
pub use error::ClientError;
pub use socket::{ClientConfig, Identity, ReconnectingSocket};
