use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Backend ids are opaque strings (UUIDs in practice).
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

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
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// A user account id.
    UserId
);

string_id!(
    /// A direct-message conversation id.
    ConversationId
);

string_id!(
    /// A chat message id. Optimistic sends carry a temporary id until the
    /// backend returns the canonical one.
    MessageId
);

string_id!(
    /// A notification id.
    NotificationId
);

const TEMP_PREFIX: &str = "temp-";

impl MessageId {
    /// Fresh placeholder id for an optimistic message.
    pub fn temporary() -> Self {
        Self(format!("{TEMP_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_PREFIX)
    }
}
