//! Role and payment vocabularies shared by server and client

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a realtime connection authenticates as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Provider,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Provider => "provider",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment methods a customer may settle a booking with.
///
/// `Stripe` is the card rail and the only method gated by trust tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Cashapp,
    Zelle,
    Stripe,
}

impl PaymentMethod {
    pub const ALL: [Self; 4] = [Self::Cash, Self::Cashapp, Self::Zelle, Self::Stripe];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Cashapp => "cashapp",
            Self::Zelle => "zelle",
            Self::Stripe => "stripe",
        }
    }

    /// Card payments require an unrestricted trust tier
    #[must_use]
    pub const fn is_card(self) -> bool {
        matches!(self, Self::Stripe)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
