use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database identifier.
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw database identifier.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of a catalog product.
    ProductId
);

row_id!(
    /// Identifier of a single imported license key.
    LicenseKeyId
);

row_id!(
    /// Internal row identifier of an order.
    ///
    /// Never shown to buyers; the gateway and the poller only ever see the
    /// [`ExternalOrderId`].
    OrderRowId
);

/// Unique identifier for a buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuyerId(Uuid);

impl BuyerId {
    /// Creates a new random buyer ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a buyer ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for BuyerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BuyerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for BuyerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Caller-visible order identifier.
///
/// This is the correlation key shared with the payment gateway: it is sent on
/// create-order, echoed back on webhooks and used by the buyer's poller.
/// Generated identifiers look like `OID1718000000000A1B2C3D4`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalOrderId(String);

impl ExternalOrderId {
    /// Prefix carried by every generated identifier.
    pub const PREFIX: &'static str = "OID";

    /// Generates a fresh, globally unique identifier.
    ///
    /// The millisecond timestamp keeps identifiers roughly sortable; the random
    /// suffix removes collisions between checkouts in the same millisecond.
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        Self(format!("{}{millis}{suffix}", Self::PREFIX))
    }

    /// Wraps an identifier received from outside (webhook, poll, path).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExternalOrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ExternalOrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ExternalOrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ExternalOrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
