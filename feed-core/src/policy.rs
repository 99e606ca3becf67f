//! Who may do what.
//!
//! The backend enforces authorization; these checks exist so a mutation the
//! server would reject is never shown optimistically.

use feed_types::{AuthorRef, Comment, DiscussionPost, Role, UserId};
use std::fmt;

use crate::profile::Profile;

/// Kinds of user-initiated mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Toggle like on a post.
    Like,
    /// Toggle pin on a post.
    Pin,
    /// Edit a post's title and body.
    EditPost,
    /// Delete a post.
    DeletePost,
    /// Submit a new comment.
    CreateComment,
    /// Edit a comment's body.
    EditComment,
    /// Delete a comment.
    DeleteComment,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::Like => "like",
            MutationKind::Pin => "pin",
            MutationKind::EditPost => "edit post",
            MutationKind::DeletePost => "delete post",
            MutationKind::CreateComment => "create comment",
            MutationKind::EditComment => "edit comment",
            MutationKind::DeleteComment => "delete comment",
        };
        f.write_str(name)
    }
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    /// User id.
    pub id: UserId,
    /// Role used for authorization.
    pub role: Role,
    /// Session profile; always the freshest data for the viewer.
    pub profile: Profile,
}

impl Viewer {
    /// Create a viewer. The profile role is aligned with `role`.
    pub fn new(id: impl Into<UserId>, role: Role, profile: Profile) -> Self {
        Self {
            id: id.into(),
            role,
            profile: profile.with_role(role),
        }
    }

    /// Admin or equivalent.
    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }

    /// Whether `author` refers to this viewer.
    pub fn is_author(&self, author: &AuthorRef) -> bool {
        author.user_id() == Some(&self.id)
    }

    /// Check a post mutation.
    pub fn may_mutate_post(&self, kind: MutationKind, post: &DiscussionPost) -> bool {
        match kind {
            MutationKind::Like | MutationKind::CreateComment => true,
            MutationKind::Pin | MutationKind::DeletePost => self.is_elevated(),
            MutationKind::EditPost => self.is_author(&post.author),
            MutationKind::EditComment | MutationKind::DeleteComment => false,
        }
    }

    /// Check a comment mutation.
    pub fn may_mutate_comment(&self, kind: MutationKind, comment: &Comment) -> bool {
        match kind {
            MutationKind::EditComment => self.is_author(&comment.author),
            MutationKind::DeleteComment => self.is_author(&comment.author) || self.is_elevated(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use feed_types::{CommentId, PostId};

    fn post_by(author: &str) -> DiscussionPost {
        DiscussionPost {
            id: PostId::new("p1"),
            title: "t".into(),
            body: "b".into(),
            author: AuthorRef::Id(UserId::new(author)),
            category: String::new(),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            is_pinned: false,
            likes_count: 0,
            is_liked: false,
            comment_count: 0,
            attachments: vec![],
        }
    }

    fn comment_by(author: &str) -> Comment {
        Comment {
            id: CommentId::new("c1"),
            discussion_id: PostId::new("p1"),
            author: AuthorRef::Id(UserId::new(author)),
            body: "hi".into(),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            is_edited: false,
            edited_at: None,
        }
    }

    fn member(id: &str) -> Viewer {
        Viewer::new(id, Role::Member, Profile::new(id))
    }

    fn admin(id: &str) -> Viewer {
        Viewer::new(id, Role::Admin, Profile::new(id))
    }

    #[test]
    fn anyone_may_like_and_comment() {
        let post = post_by("author");
        assert!(member("x").may_mutate_post(MutationKind::Like, &post));
        assert!(member("x").may_mutate_post(MutationKind::CreateComment, &post));
    }

    #[test]
    fn pin_and_delete_need_elevated_role() {
        let post = post_by("author");
        assert!(!member("author").may_mutate_post(MutationKind::Pin, &post));
        assert!(!member("author").may_mutate_post(MutationKind::DeletePost, &post));
        assert!(admin("root").may_mutate_post(MutationKind::Pin, &post));
        assert!(admin("root").may_mutate_post(MutationKind::DeletePost, &post));
    }

    #[test]
    fn only_author_edits_post() {
        let post = post_by("author");
        assert!(member("author").may_mutate_post(MutationKind::EditPost, &post));
        assert!(!admin("root").may_mutate_post(MutationKind::EditPost, &post));
    }

    #[test]
    fn comment_rules() {
        let comment = comment_by("author");
        assert!(member("author").may_mutate_comment(MutationKind::EditComment, &comment));
        assert!(!admin("root").may_mutate_comment(MutationKind::EditComment, &comment));
        assert!(member("author").may_mutate_comment(MutationKind::DeleteComment, &comment));
        assert!(admin("root").may_mutate_comment(MutationKind::DeleteComment, &comment));
        assert!(!member("other").may_mutate_comment(MutationKind::DeleteComment, &comment));
    }

    #[test]
    fn viewer_profile_carries_role() {
        assert_eq!(admin("root").profile.role, Role::Admin);
    }

    #[test]
    fn kind_display() {
        assert_eq!(MutationKind::DeletePost.to_string(), "delete post");
    }
}
