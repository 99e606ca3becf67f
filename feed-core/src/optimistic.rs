//! Optimistic transactions.
//!
//! A mutation is shown to the user before the backend confirms it:
//!
//! 1. [`Transaction::apply`] snapshots the field it owns and writes the
//!    optimistic value.
//! 2. On success, [`Transaction::commit`] overwrites the field with the
//!    server's authoritative value (not the optimistic guess).
//! 3. On failure, [`Transaction::abort`] restores the exact snapshot.
//!
//! The field a transaction owns is described by an [`OptimisticField`]
//! implementation, so like, pin, post edit and comment edit share the same
//! snapshot/restore logic.

use chrono::{DateTime, Utc};
use feed_types::{Comment, DiscussionPost, LikeState, PinState, PostContent};
use std::marker::PhantomData;

/// A slice of an entity's state that a mutation owns.
pub trait OptimisticField<E> {
    /// The value of the slice.
    type Value: Clone;

    /// Read the current value from the entity.
    fn read(entity: &E) -> Self::Value;

    /// Write a value into the entity.
    fn write(entity: &mut E, value: Self::Value);
}

/// Like flag and count of a post.
#[derive(Debug)]
pub enum LikeField {}

impl OptimisticField<DiscussionPost> for LikeField {
    type Value = LikeState;

    fn read(post: &DiscussionPost) -> LikeState {
        post.like_state()
    }

    fn write(post: &mut DiscussionPost, value: LikeState) {
        post.set_like_state(value);
    }
}

/// Pinned flag of a post.
#[derive(Debug)]
pub enum PinField {}

impl OptimisticField<DiscussionPost> for PinField {
    type Value = PinState;

    fn read(post: &DiscussionPost) -> PinState {
        PinState {
            is_pinned: post.is_pinned,
        }
    }

    fn write(post: &mut DiscussionPost, value: PinState) {
        post.is_pinned = value.is_pinned;
    }
}

/// Title and body of a post.
#[derive(Debug)]
pub enum ContentField {}

impl OptimisticField<DiscussionPost> for ContentField {
    type Value = PostContent;

    fn read(post: &DiscussionPost) -> PostContent {
        post.content()
    }

    fn write(post: &mut DiscussionPost, value: PostContent) {
        post.set_content(value);
    }
}

/// Body and edit markers of a comment.
#[derive(Debug)]
pub enum CommentBodyField {}

impl OptimisticField<Comment> for CommentBodyField {
    type Value = (String, bool, Option<DateTime<Utc>>);

    fn read(comment: &Comment) -> Self::Value {
        (comment.body.clone(), comment.is_edited, comment.edited_at)
    }

    fn write(comment: &mut Comment, (body, is_edited, edited_at): Self::Value) {
        comment.body = body;
        comment.is_edited = is_edited;
        comment.edited_at = edited_at;
    }
}

/// An applied, unconfirmed mutation of one field of one entity.
///
/// Must end in exactly one of [`commit`](Self::commit) or
/// [`abort`](Self::abort). The transaction does not borrow the entity, so the
/// caller can release its lock while the backend call is outstanding.
#[must_use = "an optimistic transaction must be committed or aborted"]
pub struct Transaction<F, E>
where
    F: OptimisticField<E>,
{
    snapshot: F::Value,
    applied: F::Value,
    _entity: PhantomData<fn(&mut E)>,
}

impl<F, E> Transaction<F, E>
where
    F: OptimisticField<E>,
{
    /// Snapshot the field, compute the optimistic value and write it.
    pub fn apply(entity: &mut E, delta: impl FnOnce(&F::Value) -> F::Value) -> Self {
        let snapshot = F::read(entity);
        let applied = delta(&snapshot);
        F::write(entity, applied.clone());
        Self {
            snapshot,
            applied,
            _entity: PhantomData,
        }
    }

    /// The pre-mutation value.
    pub fn snapshot(&self) -> &F::Value {
        &self.snapshot
    }

    /// The optimistic value that was written.
    pub fn applied(&self) -> &F::Value {
        &self.applied
    }

    /// Reconcile: the server's value is final.
    pub fn commit(self, entity: &mut E, authoritative: F::Value) {
        F::write(entity, authoritative);
    }

    /// Roll back to the snapshot.
    pub fn abort(self, entity: &mut E) {
        F::write(entity, self.snapshot);
    }

    /// Roll back to the snapshot, unless the field no longer holds the
    /// optimistic value: a newer value landed meanwhile and is kept.
    ///
    /// Returns whether the snapshot was restored.
    pub fn abort_unless_superseded(self, entity: &mut E) -> bool
    where
        F::Value: PartialEq,
    {
        if F::read(entity) != self.applied {
            return false;
        }
        F::write(entity, self.snapshot);
        true
    }
}
