//! Ordered comment list for one discussion.
//!
//! The list merges three sources: a paginated load, this viewer's own
//! request/response results, and push events. Two rules keep it consistent:
//!
//! - **Identity dedup**: a confirmed comment id appears at most once. A
//!   `comment_created` event for an id already held is an echo and is dropped.
//! - **Timestamp order**: entries are kept ascending by creation time, so a
//!   late push event is inserted at its place rather than appended.
//!
//! Comments this viewer submitted but the backend has not confirmed yet are
//! [`PendingComment`]s keyed by a client-local [`LocalId`]. They have no
//! stable display key until [`CommentList::confirm_pending`] swaps in the
//! server's comment.

use chrono::{DateTime, Utc};
use feed_types::{AuthorRef, Comment, CommentId, LocalId, PostId};

use crate::optimistic::{CommentBodyField, Transaction};

/// A comment submitted locally and not yet confirmed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingComment {
    /// Client-local identifier.
    pub local_id: LocalId,
    /// Author (the viewer).
    pub author: AuthorRef,
    /// Submitted text.
    pub body: String,
    /// Local submission time.
    pub created_at: DateTime<Utc>,
}

/// One row of the comment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentEntry {
    /// Awaiting server confirmation.
    Pending(PendingComment),
    /// Confirmed by the backend.
    Confirmed(Comment),
}

impl CommentEntry {
    /// Server id, usable as a display key. `None` while pending.
    pub fn stable_key(&self) -> Option<&CommentId> {
        match self {
            CommentEntry::Pending(_) => None,
            CommentEntry::Confirmed(c) => Some(&c.id),
        }
    }

    /// Whether the backend has not confirmed this entry yet.
    pub fn is_pending(&self) -> bool {
        matches!(self, CommentEntry::Pending(_))
    }

    /// Comment text.
    pub fn body(&self) -> &str {
        match self {
            CommentEntry::Pending(p) => &p.body,
            CommentEntry::Confirmed(c) => &c.body,
        }
    }

    /// Author reference.
    pub fn author(&self) -> &AuthorRef {
        match self {
            CommentEntry::Pending(p) => &p.author,
            CommentEntry::Confirmed(c) => &c.author,
        }
    }

    /// Creation time used for ordering.
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            CommentEntry::Pending(p) => p.created_at,
            CommentEntry::Confirmed(c) => c.created_at,
        }
    }

    /// The confirmed comment, if any.
    pub fn as_confirmed(&self) -> Option<&Comment> {
        match self {
            CommentEntry::Pending(_) => None,
            CommentEntry::Confirmed(c) => Some(c),
        }
    }
}

/// Result of offering a confirmed comment to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Inserted at the given index.
    Inserted(usize),
    /// Already held; discarded.
    Duplicate,
    /// Belongs to another discussion; discarded.
    Foreign,
}

/// Result of confirming a pending comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The pending entry was replaced by the server comment.
    Replaced,
    /// The server comment was already held (its push echo won the race);
    /// the pending entry was dropped.
    AlreadyPresent,
    /// The pending entry was gone (replaced by a full re-fetch); the server
    /// comment was inserted.
    Inserted,
}

/// Ordered, deduplicated comments of one discussion.
#[derive(Debug, Clone)]
pub struct CommentList {
    discussion: PostId,
    entries: Vec<CommentEntry>,
}

impl CommentList {
    /// Create an empty list for a discussion.
    pub fn new(discussion: PostId) -> Self {
        Self {
            discussion,
            entries: Vec::new(),
        }
    }

    /// Create a list from already-fetched comments.
    pub fn from_comments(discussion: PostId, comments: Vec<Comment>) -> Self {
        let mut list = Self::new(discussion);
        list.replace_all(comments);
        list
    }

    /// The discussion this list belongs to.
    pub fn discussion(&self) -> &PostId {
        &self.discussion
    }

    /// All entries in display order.
    pub fn entries(&self) -> &[CommentEntry] {
        &self.entries
    }

    /// Number of entries (pending included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Confirmed comments in display order.
    pub fn confirmed(&self) -> Vec<Comment> {
        self.entries
            .iter()
            .filter_map(|e| e.as_confirmed().cloned())
            .collect()
    }

    /// Check whether a confirmed comment is held.
    pub fn contains(&self, id: &CommentId) -> bool {
        self.position(id).is_some()
    }

    /// Look up a confirmed comment.
    pub fn get(&self, id: &CommentId) -> Option<&Comment> {
        self.entries
            .iter()
            .filter_map(CommentEntry::as_confirmed)
            .find(|c| &c.id == id)
    }

    /// Number of pending entries.
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pending()).count()
    }

    /// Replace every confirmed entry with a freshly fetched list.
    ///
    /// This is the self-healing path: whatever duplication or loss happened
    /// before, the result mirrors the backend. Pending entries still
    /// represent requests in flight and are kept.
    pub fn replace_all(&mut self, comments: Vec<Comment>) {
        let pending: Vec<CommentEntry> = self
            .entries
            .drain(..)
            .filter(CommentEntry::is_pending)
            .collect();

        for comment in comments {
            // Full loads can overlap at page boundaries.
            let _ = self.insert(comment);
        }
        for entry in pending {
            self.insert_entry(entry);
        }
    }

    /// Offer a confirmed comment (push `comment_created` or a load).
    pub fn insert(&mut self, comment: Comment) -> InsertOutcome {
        if comment.discussion_id != self.discussion {
            return InsertOutcome::Foreign;
        }
        if self.contains(&comment.id) {
            return InsertOutcome::Duplicate;
        }
        InsertOutcome::Inserted(self.insert_entry(CommentEntry::Confirmed(comment)))
    }

    /// Add a locally submitted comment awaiting confirmation.
    pub fn push_pending(&mut self, pending: PendingComment) -> usize {
        self.insert_entry(CommentEntry::Pending(pending))
    }

    /// Swap a pending entry for the server's comment.
    pub fn confirm_pending(&mut self, local_id: LocalId, comment: Comment) -> ConfirmOutcome {
        let pending_index = self.pending_position(local_id);

        if self.contains(&comment.id) {
            if let Some(index) = pending_index {
                self.entries.remove(index);
            }
            return ConfirmOutcome::AlreadyPresent;
        }

        match pending_index {
            Some(index) => {
                self.entries.remove(index);
                self.insert_entry(CommentEntry::Confirmed(comment));
                ConfirmOutcome::Replaced
            }
            None => {
                self.insert_entry(CommentEntry::Confirmed(comment));
                ConfirmOutcome::Inserted
            }
        }
    }

    /// Drop a pending entry whose request failed.
    pub fn discard_pending(&mut self, local_id: LocalId) -> Option<PendingComment> {
        let index = self.pending_position(local_id)?;
        match self.entries.remove(index) {
            CommentEntry::Pending(p) => Some(p),
            CommentEntry::Confirmed(_) => None,
        }
    }

    /// Mirror an updated comment (push `comment_updated`).
    ///
    /// Returns `false` if the comment is not held.
    pub fn update(&mut self, comment: Comment) -> bool {
        match self.get_mut(&comment.id) {
            Some(existing) => {
                existing.body = comment.body;
                existing.is_edited = comment.is_edited;
                existing.edited_at = comment.edited_at;
                true
            }
            None => false,
        }
    }

    /// Apply a local edit optimistically. `None` if the comment is not held.
    pub fn begin_edit(
        &mut self,
        id: &CommentId,
        body: &str,
        at: DateTime<Utc>,
    ) -> Option<Transaction<CommentBodyField, Comment>> {
        let comment = self.get_mut(id)?;
        Some(Transaction::apply(comment, |_| {
            (body.to_string(), true, Some(at))
        }))
    }

    /// Finish an optimistic edit. If the comment vanished meanwhile the
    /// transaction is discarded. A failed edit does not roll back over a
    /// newer body delivered while it was in flight.
    pub fn finish_edit(
        &mut self,
        id: &CommentId,
        tx: Transaction<CommentBodyField, Comment>,
        succeeded: bool,
    ) {
        if let Some(comment) = self.get_mut(id) {
            if succeeded {
                let applied = tx.applied().clone();
                tx.commit(comment, applied);
            } else {
                tx.abort_unless_superseded(comment);
            }
        }
    }

    /// Remove a confirmed comment, returning its index and value.
    pub fn remove(&mut self, id: &CommentId) -> Option<(usize, Comment)> {
        let index = self.position(id)?;
        match self.entries.remove(index) {
            CommentEntry::Confirmed(c) => Some((index, c)),
            CommentEntry::Pending(_) => None,
        }
    }

    /// Put back a comment removed by a failed delete, at its old index.
    pub fn restore(&mut self, index: usize, comment: Comment) {
        if self.contains(&comment.id) {
            return;
        }
        let index = index.min(self.entries.len());
        self.entries.insert(index, CommentEntry::Confirmed(comment));
    }

    fn get_mut(&mut self, id: &CommentId) -> Option<&mut Comment> {
        self.entries.iter_mut().find_map(|e| match e {
            CommentEntry::Confirmed(c) if &c.id == id => Some(c),
            _ => None,
        })
    }

    fn position(&self, id: &CommentId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.stable_key() == Some(id))
    }

    fn pending_position(&self, local_id: LocalId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| matches!(e, CommentEntry::Pending(p) if p.local_id == local_id))
    }

    /// Insert after every entry created at or before this one.
    fn insert_entry(&mut self, entry: CommentEntry) -> usize {
        let at = entry.created_at();
        let index = self
            .entries
            .iter()
            .rposition(|e| e.created_at() <= at)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.entries.insert(index, entry);
        index
    }
}
