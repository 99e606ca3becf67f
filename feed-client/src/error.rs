//! Error types for feed-client.

use feed_core::MutationKind;
use feed_types::{CommentId, PostId};
use thiserror::Error;

use crate::channel::ChannelError;

/// Failure reported by a backend collaborator (read or mutation service).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Request did not reach the backend or no response came back.
    #[error("network error: {0}")]
    Network(String),

    /// Backend answered with an error status.
    #[error("backend error {status}: {message}")]
    Backend {
        /// Status code.
        status: u16,
        /// Error message from the backend.
        message: String,
    },

    /// Backend refused the action for this viewer.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Entity does not exist on the backend.
    #[error("not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    /// Whether the backend rejected the action on authorization grounds.
    pub fn is_authorization(&self) -> bool {
        match self {
            ServiceError::Unauthorized(_) => true,
            ServiceError::Backend { status, .. } => *status == 401 || *status == 403,
            _ => false,
        }
    }
}

/// Client errors.
///
/// None of these are fatal: each leaves the feed showing consistent (at
/// worst stale) state.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A read failed; whatever was loaded before stays visible.
    #[error("fetch failed: {0}")]
    Fetch(#[source] ServiceError),

    /// A write failed and its optimistic effect was rolled back. A late
    /// authorization failure from the backend lands here too.
    #[error("{action} failed: {source}")]
    Mutation {
        /// The attempted action.
        action: MutationKind,
        /// Backend failure.
        source: ServiceError,
    },

    /// The viewer may not perform the action; nothing was dispatched.
    #[error("not permitted to {action}")]
    AuthorizationDenied {
        /// The refused action.
        action: MutationKind,
    },

    /// The task reconciling a dispatched mutation panicked or was shut
    /// down with the runtime.
    #[error("{action} was interrupted: {reason}")]
    Interrupted {
        /// The attempted action.
        action: MutationKind,
        /// Why the task ended.
        reason: String,
    },

    /// Push channel failure.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// The post is not held by the feed.
    #[error("post not loaded: {0}")]
    NotFound(PostId),

    /// The comment is not in the open discussion's list.
    #[error("comment not loaded: {0}")]
    CommentNotFound(CommentId),

    /// A comment operation needs an open discussion.
    #[error("no discussion is open")]
    NoOpenDiscussion,

    /// Comment text is empty.
    #[error("comment is empty")]
    EmptyComment,
}

impl ClientError {
    pub(crate) fn mutation(action: MutationKind, source: ServiceError) -> Self {
        ClientError::Mutation { action, source }
    }
}
