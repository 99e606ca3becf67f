//! Discussion posts and their authors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PostId, UserId};

/// Role badge attached to a profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Elevated role: may pin and delete any discussion.
    Admin,
    /// Regular member. Unknown role strings decode to this.
    #[default]
    #[serde(other)]
    Member,
}

impl Role {
    /// Whether this role grants elevated permissions.
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Author data embedded directly in a post or comment payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSnapshot {
    /// The user this snapshot describes, when the payload carries it.
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    /// Display name at the time the payload was produced.
    #[serde(default)]
    pub name: String,
    /// Avatar URL. The backend sends `""` for "no avatar".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Role at the time the payload was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl AuthorSnapshot {
    /// Snapshot with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            avatar: None,
            role: None,
        }
    }

    /// Attach the user id.
    pub fn with_id(mut self, id: impl Into<UserId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach an avatar URL.
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Avatar URL with `""` normalized to absent.
    pub fn avatar(&self) -> Option<&str> {
        normalized_avatar(self.avatar.as_deref())
    }
}

/// Authorship of a post or comment.
///
/// Payloads carry either a bare user id or a populated author object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorRef {
    /// Reference to a user entity, resolved through the profile cache.
    Id(UserId),
    /// Inline author snapshot.
    Inline(AuthorSnapshot),
}

impl AuthorRef {
    /// The referenced user id, if the payload carries one.
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            AuthorRef::Id(id) => Some(id),
            AuthorRef::Inline(snapshot) => snapshot.id.as_ref(),
        }
    }

    /// The inline snapshot, if any.
    pub fn snapshot(&self) -> Option<&AuthorSnapshot> {
        match self {
            AuthorRef::Id(_) => None,
            AuthorRef::Inline(snapshot) => Some(snapshot),
        }
    }

    /// Whether this reference points at `user`.
    pub fn is_user(&self, user: &UserId) -> bool {
        self.user_id() == Some(user)
    }
}

impl From<UserId> for AuthorRef {
    fn from(id: UserId) -> Self {
        AuthorRef::Id(id)
    }
}

/// Normalize an avatar URL: empty or whitespace-only means "no avatar".
pub fn normalized_avatar(raw: Option<&str>) -> Option<&str> {
    raw.filter(|url| !url.trim().is_empty())
}

/// Kind of a structured attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Inline image.
    Image,
    /// Video file.
    Video,
    /// Any other document.
    #[serde(other)]
    File,
}

/// A file attached to a discussion post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Attachment type.
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    /// Download URL.
    pub url: String,
    /// Original file name.
    pub filename: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
}

/// A discussion post as held by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionPost {
    /// Server-assigned identifier.
    pub id: PostId,
    /// Title line.
    pub title: String,
    /// Markdown-like body with inline image/attachment references.
    pub body: String,
    /// Author of the post.
    pub author: AuthorRef,
    /// Category tag.
    #[serde(default)]
    pub category: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Pinned posts sort before all unpinned posts.
    #[serde(default)]
    pub is_pinned: bool,
    /// Number of likes.
    #[serde(default)]
    pub likes_count: u32,
    /// Whether the current viewer liked this post.
    #[serde(default)]
    pub is_liked: bool,
    /// Number of comments.
    #[serde(default)]
    pub comment_count: u32,
    /// Structured attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl DiscussionPost {
    /// Current like fields.
    pub fn like_state(&self) -> LikeState {
        LikeState {
            is_liked: self.is_liked,
            likes_count: self.likes_count,
        }
    }

    /// Overwrite like fields.
    pub fn set_like_state(&mut self, state: LikeState) {
        self.is_liked = state.is_liked;
        self.likes_count = state.likes_count;
    }

    /// Current editable content.
    pub fn content(&self) -> PostContent {
        PostContent {
            title: self.title.clone(),
            body: self.body.clone(),
        }
    }

    /// Overwrite editable content.
    pub fn set_content(&mut self, content: PostContent) {
        self.title = content.title;
        self.body = content.body;
    }
}

/// Like fields of a post, as returned by the like toggle endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    /// Whether the viewer likes the post.
    pub is_liked: bool,
    /// Total likes.
    pub likes_count: u32,
}

impl LikeState {
    /// The state after the viewer flips their like. The count never drops below zero.
    pub fn toggled(self) -> Self {
        if self.is_liked {
            Self {
                is_liked: false,
                likes_count: self.likes_count.saturating_sub(1),
            }
        } else {
            Self {
                is_liked: true,
                likes_count: self.likes_count.saturating_add(1),
            }
        }
    }
}

/// Pin field of a post, as returned by the pin toggle endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinState {
    /// Whether the post is pinned.
    pub is_pinned: bool,
}

/// Editable fields of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostContent {
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
}

impl PostContent {
    /// Build from title and body.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_json(author: &str) -> String {
        format!(
            r#"{{
                "id": "p1",
                "title": "Welcome",
                "body": "hello ![img](a.png)",
                "author": {author},
                "category": "general",
                "createdAt": "2024-05-01T10:00:00Z",
                "isPinned": true,
                "likesCount": 3,
                "isLiked": false,
                "commentCount": 2,
                "attachments": [{{"type": "image", "url": "https://cdn/a.png", "filename": "a.png", "size": 120}}]
            }}"#
        )
    }

    #[test]
    fn decodes_post_with_author_id() {
        let post: DiscussionPost = serde_json::from_str(&post_json("\"u1\"")).unwrap();
        assert_eq!(post.author, AuthorRef::Id(UserId::new("u1")));
        assert!(post.is_pinned);
        assert_eq!(post.likes_count, 3);
        assert_eq!(post.attachments[0].kind, AttachmentKind::Image);
    }

    #[test]
    fn decodes_post_with_inline_author() {
        let post: DiscussionPost = serde_json::from_str(&post_json(
            r#"{"_id": "u2", "name": "Ada Lovelace", "avatar": "", "role": "admin"}"#,
        ))
        .unwrap();
        let snapshot = post.author.snapshot().unwrap();
        assert_eq!(snapshot.name, "Ada Lovelace");
        assert_eq!(snapshot.avatar(), None);
        assert_eq!(snapshot.role, Some(Role::Admin));
        assert_eq!(post.author.user_id(), Some(&UserId::new("u2")));
    }

    #[test]
    fn unknown_role_is_member() {
        let role: Role = serde_json::from_str("\"owner\"").unwrap();
        assert_eq!(role, Role::Member);
        assert!(!role.is_elevated());
    }

    #[test]
    fn unlike_floors_at_zero() {
        let state = LikeState {
            is_liked: true,
            likes_count: 0,
        };
        assert_eq!(state.toggled().likes_count, 0);
        assert!(!state.toggled().is_liked);
    }

    #[test]
    fn like_increments() {
        let state = LikeState {
            is_liked: false,
            likes_count: 3,
        };
        assert_eq!(
            state.toggled(),
            LikeState {
                is_liked: true,
                likes_count: 4
            }
        );
    }
}
