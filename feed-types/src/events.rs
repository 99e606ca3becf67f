//! Events delivered on a discussion's push topic.
//!
//! The topic of a comment stream is the discussion id. Every event also
//! names its discussion, so a payload that arrives on the wrong topic can be
//! rejected instead of mutating an unrelated list.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Comment, CommentId, DecodeError, PostId};

/// A typed push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    /// A comment was created (possibly an echo of our own).
    CommentCreated {
        /// Owning discussion.
        #[serde(rename = "discussionId")]
        discussion_id: PostId,
        /// The new comment.
        comment: Comment,
    },
    /// A comment body changed.
    CommentUpdated {
        /// Owning discussion.
        #[serde(rename = "discussionId")]
        discussion_id: PostId,
        /// The comment after the change.
        comment: Comment,
    },
    /// A comment was removed.
    CommentDeleted {
        /// Owning discussion.
        #[serde(rename = "discussionId")]
        discussion_id: PostId,
        /// Id of the removed comment.
        #[serde(rename = "commentId")]
        comment_id: CommentId,
    },
}

/// Discriminator of a [`PushEvent`], for logging and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushEventKind {
    /// `comment_created`
    Created,
    /// `comment_updated`
    Updated,
    /// `comment_deleted`
    Deleted,
}

impl fmt::Display for PushEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushEventKind::Created => f.write_str("comment_created"),
            PushEventKind::Updated => f.write_str("comment_updated"),
            PushEventKind::Deleted => f.write_str("comment_deleted"),
        }
    }
}

impl PushEvent {
    /// The discussion this event belongs to.
    pub fn discussion_id(&self) -> &PostId {
        match self {
            PushEvent::CommentCreated { discussion_id, .. }
            | PushEvent::CommentUpdated { discussion_id, .. }
            | PushEvent::CommentDeleted { discussion_id, .. } => discussion_id,
        }
    }

    /// The event discriminator.
    pub fn kind(&self) -> PushEventKind {
        match self {
            PushEvent::CommentCreated { .. } => PushEventKind::Created,
            PushEvent::CommentUpdated { .. } => PushEventKind::Updated,
            PushEvent::CommentDeleted { .. } => PushEventKind::Deleted,
        }
    }

    /// Id of the affected comment.
    pub fn comment_id(&self) -> &CommentId {
        match self {
            PushEvent::CommentCreated { comment, .. }
            | PushEvent::CommentUpdated { comment, .. } => &comment.id,
            PushEvent::CommentDeleted { comment_id, .. } => comment_id,
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DecodeError> {
        serde_json::to_vec(self).map_err(DecodeError::Json)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(bytes).map_err(DecodeError::Json)
    }

    /// Deserialize a payload received on `topic`, rejecting events for other discussions.
    pub fn from_topic_payload(topic: &PostId, bytes: &[u8]) -> Result<Self, DecodeError> {
        let event = Self::from_bytes(bytes)?;
        if event.discussion_id() != topic {
            return Err(DecodeError::TopicMismatch {
                event: event.discussion_id().to_string(),
                topic: topic.to_string(),
            });
        }
        Ok(event)
    }
}
