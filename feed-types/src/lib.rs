//! # feed-types
//!
//! Wire format types for the Agora discussion feed.
//!
//! This crate provides the foundational types shared by the feed crates:
//! - [`PostId`], [`CommentId`], [`UserId`], [`LocalId`] - Identity types
//! - [`DiscussionPost`], [`Comment`], [`AuthorRef`] - Feed entities
//! - [`Page`], [`SortOrder`] - Pagination
//! - [`PushEvent`] - Events delivered on a discussion's push topic
//! - [`DecodeError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod comment;
mod error;
mod events;
mod ids;
mod page;
mod post;

pub use comment::Comment;
pub use error::DecodeError;
pub use events::{PushEvent, PushEventKind};
pub use ids::{CommentId, LocalId, PostId, UserId};
pub use page::{Page, SortOrder};
pub use post::{
    normalized_avatar, Attachment, AttachmentKind, AuthorRef, AuthorSnapshot, DiscussionPost,
    LikeState, PinState, PostContent, Role,
};
