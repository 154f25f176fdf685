//! Strongly-typed identifiers for trade groups and their orders.
//!
//! These prevent mixing up a client order id with the broker's id, which
//! matters because lookups must always go through the client id.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(GroupId, "Idempotency token identifying one logical trade.");
define_id!(
    ClientOrderId,
    "Client-assigned order id, the only key used for order lookups."
);
define_id!(BrokerId, "Broker's unique identifier for an order.");

impl GroupId {
    const PREFIX: &'static str = "gid_";

    /// Generate a new group id of the form `gid_<uuid hex>`.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{}{}", Self::PREFIX, uuid::Uuid::new_v4().simple()))
    }

    /// The hex part of the id without the `gid_` prefix.
    #[must_use]
    pub fn hex(&self) -> &str {
        self.0.strip_prefix(Self::PREFIX).unwrap_or(&self.0)
    }
}

impl ClientOrderId {
    /// Derive the client id of one leg of a trade group.
    ///
    /// The id is deterministic so a resubmission after a crash reuses the
    /// same idempotency key: `{prefix}_{group hex}_{leg}`.
    #[must_use]
    pub fn for_leg(prefix: &str, group_id: &GroupId, leg: &str) -> Self {
        if prefix.is_empty() {
            Self(format!("{}_{leg}", group_id.hex()))
        } else {
            Self(format!("{prefix}_{}_{leg}", group_id.hex()))
        }
    }
}
