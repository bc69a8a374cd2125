//! Shared types for the roadside dispatch services
//!
//! Everything that crosses a process boundary lives here: the WebSocket wire
//! protocol, role and payment-method vocabularies, and the error taxonomy the
//! gateway maps onto HTTP statuses.

pub mod constants;
pub mod errors;
pub mod events;
pub mod types;

pub use constants::*;
pub use errors::*;
pub use events::*;
pub use types::*;
