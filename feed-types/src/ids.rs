//! Identity types for the discussion feed.
//!
//! Server-assigned identifiers are opaque strings. The client never parses
//! them, it only compares them. [`LocalId`] is the one identifier minted on
//! the client, for comments that have not been confirmed yet.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a server-assigned identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

opaque_id!(
    /// Identifier of a discussion post. Also the push topic of its comment stream.
    PostId
);

opaque_id!(
    /// Server-issued identifier of a comment.
    CommentId
);

opaque_id!(
    /// Identifier of a user (author or viewer).
    UserId
);

/// Client-local identifier for a comment awaiting server confirmation.
///
/// UUID v4. Never sent to the backend and never used as a display key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(uuid::Uuid);

impl LocalId {
    /// Create a new random LocalId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalId({})", &self.0.to_string()[..8])
    }
}
