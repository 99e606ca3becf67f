//! Backend service abstraction.
//!
//! The feed consumes two request/response collaborators:
//! - [`ReadService`] for paginated reads
//! - [`MutationService`] for writes
//!
//! Wire formats are the implementation's concern. A single backend type
//! usually implements both; [`MockBackend`] does, for tests.

mod mock;

pub use mock::{Call, Gate, MockBackend, Op};

use async_trait::async_trait;
use feed_types::{
    Comment, CommentId, DiscussionPost, LikeState, Page, PinState, PostContent, PostId, SortOrder,
};

use crate::error::ServiceError;

/// Paginated reads.
#[async_trait]
pub trait ReadService: Send + Sync {
    /// One page of the discussion feed, in backend order. Pages start at 1.
    async fn list_discussions(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Page<DiscussionPost>, ServiceError>;

    /// One page of a discussion's comments. Pages start at 1.
    async fn list_comments(
        &self,
        discussion: &PostId,
        page: u32,
        page_size: u32,
        sort: SortOrder,
    ) -> Result<Page<Comment>, ServiceError>;
}

/// Writes. The backend re-validates authorization on every call.
#[async_trait]
pub trait MutationService: Send + Sync {
    /// Toggle the viewer's like; returns the authoritative like state.
    async fn toggle_like(&self, discussion: &PostId) -> Result<LikeState, ServiceError>;

    /// Toggle the pinned flag; returns the authoritative pin state.
    async fn toggle_pin(&self, discussion: &PostId) -> Result<PinState, ServiceError>;

    /// Replace title and body; returns the stored fields.
    async fn update_discussion(
        &self,
        discussion: &PostId,
        content: &PostContent,
    ) -> Result<PostContent, ServiceError>;

    /// Delete a discussion.
    async fn delete_discussion(&self, discussion: &PostId) -> Result<(), ServiceError>;

    /// Create a comment; returns it with its server id.
    async fn create_comment(&self, discussion: &PostId, body: &str)
        -> Result<Comment, ServiceError>;

    /// Replace a comment's body.
    async fn update_comment(&self, comment: &CommentId, body: &str) -> Result<(), ServiceError>;

    /// Delete a comment.
    async fn delete_comment(&self, comment: &CommentId) -> Result<(), ServiceError>;
}
