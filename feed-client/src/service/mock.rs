//! Mock backend for testing.
//!
//! Holds an in-memory feed and comment table, records every call, and lets a
//! test fail the next call of an operation or hold calls in flight behind a
//! [`Gate`].

use super::{MutationService, ReadService};
use crate::error::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use feed_types::{
    AuthorRef, Comment, CommentId, DiscussionPost, LikeState, Page, PinState, PostContent, PostId,
    SortOrder, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

/// Backend operations, for failure injection and gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `list_discussions`
    ListDiscussions,
    /// `list_comments`
    ListComments,
    /// `toggle_like`
    ToggleLike,
    /// `toggle_pin`
    TogglePin,
    /// `update_discussion`
    UpdateDiscussion,
    /// `delete_discussion`
    DeleteDiscussion,
    /// `create_comment`
    CreateComment,
    /// `update_comment`
    UpdateComment,
    /// `delete_comment`
    DeleteComment,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `list_discussions(page, page_size)`
    ListDiscussions {
        /// Page number.
        page: u32,
        /// Page size.
        page_size: u32,
    },
    /// `list_comments(discussion, page, ..)`
    ListComments {
        /// Discussion.
        discussion: PostId,
        /// Page number.
        page: u32,
    },
    /// `toggle_like(discussion)`
    ToggleLike(PostId),
    /// `toggle_pin(discussion)`
    TogglePin(PostId),
    /// `update_discussion(discussion, ..)`
    UpdateDiscussion(PostId),
    /// `delete_discussion(discussion)`
    DeleteDiscussion(PostId),
    /// `create_comment(discussion, body)`
    CreateComment {
        /// Discussion.
        discussion: PostId,
        /// Body.
        body: String,
    },
    /// `update_comment(comment, ..)`
    UpdateComment(CommentId),
    /// `delete_comment(comment)`
    DeleteComment(CommentId),
}

impl Call {
    /// The operation this call belongs to.
    pub fn op(&self) -> Op {
        match self {
            Call::ListDiscussions { .. } => Op::ListDiscussions,
            Call::ListComments { .. } => Op::ListComments,
            Call::ToggleLike(_) => Op::ToggleLike,
            Call::TogglePin(_) => Op::TogglePin,
            Call::UpdateDiscussion(_) => Op::UpdateDiscussion,
            Call::DeleteDiscussion(_) => Op::DeleteDiscussion,
            Call::CreateComment { .. } => Op::CreateComment,
            Call::UpdateComment(_) => Op::UpdateComment,
            Call::DeleteComment(_) => Op::DeleteComment,
        }
    }
}

/// Holds calls of one operation until released.
#[derive(Debug, Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    /// Let one held (or future) call proceed.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }

    async fn pass(&self) {
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

/// Mock backend for testing.
///
/// Clones share state, so a test can keep a handle while the client owns
/// another.
#[derive(Debug, Clone)]
pub struct MockBackend {
    inner: Arc<Mutex<MockBackendInner>>,
}

#[derive(Debug)]
struct MockBackendInner {
    viewer: UserId,
    posts: Vec<DiscussionPost>,
    comments: Vec<Comment>,
    calls: Vec<Call>,
    failures: HashMap<Op, ServiceError>,
    gates: HashMap<Op, Gate>,
    next_comment: u64,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create an empty backend. Comments it creates are authored by `viewer`.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockBackendInner {
                viewer: UserId::new("viewer"),
                posts: Vec::new(),
                comments: Vec::new(),
                calls: Vec::new(),
                failures: HashMap::new(),
                gates: HashMap::new(),
                next_comment: 1,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockBackendInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the user that created comments are attributed to.
    pub fn set_viewer(&self, viewer: UserId) {
        self.lock().viewer = viewer;
    }

    /// Append a post to the backend feed (backend order).
    pub fn add_post(&self, post: DiscussionPost) {
        self.lock().posts.push(post);
    }

    /// Insert a post at the head of the backend feed, as a new post would be.
    pub fn prepend_post(&self, post: DiscussionPost) {
        self.lock().posts.insert(0, post);
    }

    /// Add a comment directly, as another viewer's request would.
    pub fn add_comment(&self, comment: Comment) {
        self.lock().comments.push(comment);
    }

    /// Remove a comment directly.
    pub fn remove_comment(&self, id: &CommentId) {
        self.lock().comments.retain(|c| &c.id != id);
    }

    /// Server-side copy of a post.
    pub fn post(&self, id: &PostId) -> Option<DiscussionPost> {
        self.lock().posts.iter().find(|p| &p.id == id).cloned()
    }

    /// Server-side comments of a discussion, oldest first.
    pub fn comments(&self, discussion: &PostId) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self
            .lock()
            .comments
            .iter()
            .filter(|c| &c.discussion_id == discussion)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);
        comments
    }

    /// All recorded calls.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Number of recorded calls of an operation.
    pub fn call_count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    /// Wait until at least `n` calls of `op` have been made.
    pub async fn wait_for_calls(&self, op: Op, n: usize) {
        while self.call_count(op) < n {
            tokio::task::yield_now().await;
        }
    }

    /// Cause the next call of `op` to fail with `error`.
    pub fn fail_next(&self, op: Op, error: ServiceError) {
        self.lock().failures.insert(op, error);
    }

    /// Hold every subsequent call of `op` until released through the gate.
    pub fn hold(&self, op: Op) -> Gate {
        let gate = Gate::new();
        self.lock().gates.insert(op, gate.clone());
        gate
    }

    /// Stop holding calls of `op`. Calls already waiting keep waiting for
    /// their gate.
    pub fn unhold(&self, op: Op) {
        self.lock().gates.remove(&op);
    }

    /// Clear recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    async fn enter(&self, call: Call) -> Result<(), ServiceError> {
        let op = call.op();
        let (gate, failure) = {
            let mut inner = self.lock();
            inner.calls.push(call);
            (inner.gates.get(&op).cloned(), inner.failures.remove(&op))
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn paginate<T: Clone>(items: &[T], page: u32, page_size: u32) -> Page<T> {
    let size = page_size.max(1) as usize;
    let start = (page.max(1) as usize - 1) * size;
    let end = (start + size).min(items.len());
    if start >= items.len() {
        return Page::last(Vec::new());
    }
    Page::new(items[start..end].to_vec(), end < items.len())
}

fn not_found(kind: &str, id: &str) -> ServiceError {
    ServiceError::NotFound(format!("{kind} {id}"))
}

#[async_trait]
impl ReadService for MockBackend {
    async fn list_discussions(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Page<DiscussionPost>, ServiceError> {
        self.enter(Call::ListDiscussions { page, page_size }).await?;
        let inner = self.lock();
        Ok(paginate(&inner.posts, page, page_size))
    }

    async fn list_comments(
        &self,
        discussion: &PostId,
        page: u32,
        page_size: u32,
        sort: SortOrder,
    ) -> Result<Page<Comment>, ServiceError> {
        self.enter(Call::ListComments {
            discussion: discussion.clone(),
            page,
        })
        .await?;
        let mut comments = self.comments(discussion);
        if sort == SortOrder::Desc {
            comments.reverse();
        }
        Ok(paginate(&comments, page, page_size))
    }
}

#[async_trait]
impl MutationService for MockBackend {
    async fn toggle_like(&self, discussion: &PostId) -> Result<LikeState, ServiceError> {
        self.enter(Call::ToggleLike(discussion.clone())).await?;
        let mut inner = self.lock();
        let post = inner
            .posts
            .iter_mut()
            .find(|p| &p.id == discussion)
            .ok_or_else(|| not_found("discussion", discussion.as_str()))?;
        let state = post.like_state().toggled();
        post.set_like_state(state);
        Ok(state)
    }

    async fn toggle_pin(&self, discussion: &PostId) -> Result<PinState, ServiceError> {
        self.enter(Call::TogglePin(discussion.clone())).await?;
        let mut inner = self.lock();
        let post = inner
            .posts
            .iter_mut()
            .find(|p| &p.id == discussion)
            .ok_or_else(|| not_found("discussion", discussion.as_str()))?;
        post.is_pinned = !post.is_pinned;
        Ok(PinState {
            is_pinned: post.is_pinned,
        })
    }

    async fn update_discussion(
        &self,
        discussion: &PostId,
        content: &PostContent,
    ) -> Result<PostContent, ServiceError> {
        self.enter(Call::UpdateDiscussion(discussion.clone())).await?;
        let mut inner = self.lock();
        let post = inner
            .posts
            .iter_mut()
            .find(|p| &p.id == discussion)
            .ok_or_else(|| not_found("discussion", discussion.as_str()))?;
        post.set_content(content.clone());
        Ok(post.content())
    }

    async fn delete_discussion(&self, discussion: &PostId) -> Result<(), ServiceError> {
        self.enter(Call::DeleteDiscussion(discussion.clone())).await?;
        let mut inner = self.lock();
        let before = inner.posts.len();
        inner.posts.retain(|p| &p.id != discussion);
        if inner.posts.len() == before {
            return Err(not_found("discussion", discussion.as_str()));
        }
        inner.comments.retain(|c| &c.discussion_id != discussion);
        Ok(())
    }

    async fn create_comment(
        &self,
        discussion: &PostId,
        body: &str,
    ) -> Result<Comment, ServiceError> {
        self.enter(Call::CreateComment {
            discussion: discussion.clone(),
            body: body.to_string(),
        })
        .await?;
        let mut inner = self.lock();
        if !inner.posts.iter().any(|p| &p.id == discussion) {
            return Err(not_found("discussion", discussion.as_str()));
        }

        let latest: Option<DateTime<Utc>> = inner
            .comments
            .iter()
            .filter(|c| &c.discussion_id == discussion)
            .map(|c| c.created_at)
            .max();
        let created_at = match latest {
            Some(t) => t + Duration::seconds(1),
            None => Utc
                .timestamp_opt(1_700_000_000, 0)
                .single()
                .unwrap_or_else(Utc::now),
        };

        let id = CommentId::new(format!("srv-{}", inner.next_comment));
        inner.next_comment += 1;
        let comment = Comment {
            id,
            discussion_id: discussion.clone(),
            author: AuthorRef::Id(inner.viewer.clone()),
            body: body.to_string(),
            created_at,
            is_edited: false,
            edited_at: None,
        };
        inner.comments.push(comment.clone());
        if let Some(post) = inner.posts.iter_mut().find(|p| &p.id == discussion) {
            post.comment_count += 1;
        }
        Ok(comment)
    }

    async fn update_comment(&self, comment: &CommentId, body: &str) -> Result<(), ServiceError> {
        self.enter(Call::UpdateComment(comment.clone())).await?;
        let mut inner = self.lock();
        let stored = inner
            .comments
            .iter_mut()
            .find(|c| &c.id == comment)
            .ok_or_else(|| not_found("comment", comment.as_str()))?;
        stored.edit(body, Utc::now());
        Ok(())
    }

    async fn delete_comment(&self, comment: &CommentId) -> Result<(), ServiceError> {
        self.enter(Call::DeleteComment(comment.clone())).await?;
        let mut inner = self.lock();
        let before = inner.comments.len();
        inner.comments.retain(|c| &c.id != comment);
        if inner.comments.len() == before {
            return Err(not_found("comment", comment.as_str()));
        }
        Ok(())
    }
}
