//! Comments on a discussion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuthorRef, CommentId, PostId};

/// A confirmed comment as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Server-issued identifier.
    pub id: CommentId,
    /// Discussion this comment belongs to.
    pub discussion_id: PostId,
    /// Author of the comment.
    pub author: AuthorRef,
    /// Comment text.
    pub body: String,
    /// Creation time. Display order is ascending on this field.
    pub created_at: DateTime<Utc>,
    /// Whether the body was changed after creation.
    #[serde(default)]
    pub is_edited: bool,
    /// When the body was last changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl Comment {
    /// Apply a new body, marking the comment edited.
    pub fn edit(&mut self, body: impl Into<String>, at: DateTime<Utc>) {
        self.body = body.into();
        self.is_edited = true;
        self.edited_at = Some(at);
    }
}
