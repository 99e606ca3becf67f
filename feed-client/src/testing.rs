//! Fixtures for tests built on [`MockBackend`](crate::MockBackend) and
//! [`MockChannel`](crate::MockChannel).
//!
//! Timestamps are seconds after a fixed epoch, so `t = 2` sorts after `t = 1`.

use chrono::{DateTime, TimeZone, Utc};
use feed_types::{AuthorRef, Comment, CommentId, DiscussionPost, PostId, UserId};

const EPOCH: i64 = 1_700_000_000;

/// A fixed timestamp `secs` after the fixture epoch.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(EPOCH + secs, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// An unpinned, unliked post by `author` created at `ts(secs)`.
pub fn post(id: &str, secs: i64) -> DiscussionPost {
    post_by(id, "author", secs)
}

/// An unpinned, unliked post by the given author.
pub fn post_by(id: &str, author: &str, secs: i64) -> DiscussionPost {
    DiscussionPost {
        id: PostId::new(id),
        title: format!("Title {id}"),
        body: format!("Body {id}"),
        author: AuthorRef::Id(UserId::new(author)),
        category: "general".to_string(),
        created_at: ts(secs),
        is_pinned: false,
        likes_count: 0,
        is_liked: false,
        comment_count: 0,
        attachments: Vec::new(),
    }
}

/// A comment by `author` created at `ts(secs)`.
pub fn comment(id: &str, discussion: &str, secs: i64) -> Comment {
    comment_by(id, discussion, "author", secs)
}

/// A comment by the given author.
pub fn comment_by(id: &str, discussion: &str, author: &str, secs: i64) -> Comment {
    Comment {
        id: CommentId::new(id),
        discussion_id: PostId::new(discussion),
        author: AuthorRef::Id(UserId::new(author)),
        body: format!("comment {id}"),
        created_at: ts(secs),
        is_edited: false,
        edited_at: None,
    }
}
