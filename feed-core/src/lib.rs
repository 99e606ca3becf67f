//! # feed-core
//!
//! Pure logic for the Agora discussion feed (no I/O, instant tests).
//!
//! This crate implements the collections, state machines and reconciliation
//! rules of the feed without any network access, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. The discussion lifecycle is a state machine that
//! returns [`Action`]s instead of performing them; optimistic mutations are
//! [`Transaction`]s that the caller commits or aborts.
//!
//! The actual I/O (backend calls, push subscriptions, timers) is performed by
//! `feed-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod comments;
pub mod optimistic;
pub mod policy;
pub mod profile;
pub mod state;
pub mod store;
pub mod viewport;

pub use comments::{CommentEntry, CommentList, ConfirmOutcome, InsertOutcome, PendingComment};
pub use optimistic::{
    CommentBodyField, ContentField, LikeField, OptimisticField, PinField, Transaction,
};
pub use policy::{MutationKind, Viewer};
pub use profile::{initials, Profile, ProfileCache, ProfileResolver, ProfileSource, ResolvedAuthor};
pub use state::{Action, Event, ThreadEvent, ThreadState};
pub use store::FeedStore;
pub use viewport::{ScrollMetrics, ViewportSignal, ViewportTracker, DEFAULT_BOTTOM_THRESHOLD_PX};
