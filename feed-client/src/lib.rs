//! # feed-client
//!
//! Async client for the Agora discussion feed.
//!
//! This is the layer applications use: it performs the I/O that `feed-core`
//! only describes.
//!
//! ## Features
//!
//! - **Optimistic Mutations**: like, pin, edit and delete apply at once and
//!   roll back exactly on failure
//! - **Live Comment Threads**: a full fetch merged with push events, with
//!   identity dedup and a self-healing fallback re-fetch
//! - **Collaborator Abstraction**: pluggable read/mutation services and push
//!   channel (mocks included)
//! - **Pure State Machine**: uses feed-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use feed_client::{ClientConfig, DiscussionSession};
//!
//! let session = DiscussionSession::new(config, viewer, reader, writer, channel)?;
//! session.feed().load_page(1).await?;
//! session.coordinator().toggle_like(&post_id).await?;
//!
//! session.comments().open(post_id).await;
//! session.comments().set_draft("hello").await;
//! session.comments().submit_comment().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod feed;
pub mod inflight;
pub mod notice;
pub mod service;
pub mod session;
pub mod stream;
pub mod testing;

pub use channel::{ChannelError, MockChannel, PushAdapter, PushChannel, Subscription};
pub use config::{ClientConfig, CommentsConfig, ConfigError, FeedConfig, ViewportConfig};
pub use context::FeedContext;
pub use coordinator::{MutationCoordinator, Outcome};
pub use error::{ClientError, ServiceError};
pub use feed::Feed;
pub use inflight::{InFlight, InFlightGuard};
pub use notice::{Notice, NoticeKind, Notices};
pub use service::{Call, Gate, MockBackend, MutationService, Op, ReadService};
pub use session::DiscussionSession;
pub use stream::{CommentStream, EditBuffer};
