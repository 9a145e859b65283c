//! Branded ID newtypes.
//!
//! Every entity the backend tracks gets its own string newtype so a
//! conversation id can never be passed where a user id is expected.
//! All IDs serialize transparently as plain JSON strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw string value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// The raw string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

branded_id!(
    /// Opaque, channel-scoped conversation identifier.
    ConversationId
);
branded_id!(
    /// End-user identifier (phone number, account id, ...).
    UserId
);
branded_id!(
    /// Stable agent descriptor name.
    AgentId
);
branded_id!(
    /// Real-time transport connection identifier.
    ConnectionId
);
branded_id!(
    /// Voice call identifier assigned by the telephony channel.
    CallId
);

impl ConnectionId {
    /// Generate a fresh connection id (`conn_` + UUIDv7).
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }
}

impl CallId {
    /// Generate a fresh call id (`call_` + UUIDv7).
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("call_{}", Uuid::now_v7()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_transparently() {
        let id = ConversationId::new("conv-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"conv-1\"");
        let back: ConversationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn generated_connection_ids_are_unique() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("conn_"));
    }

    #[test]
    fn display_matches_raw_value() {
        let id = UserId::from("user-42");
        assert_eq!(id.to_string(), "user-42");
        assert_eq!(id.as_str(), "user-42");
    }
}
