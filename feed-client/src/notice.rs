//! Non-blocking, user-visible notifications.
//!
//! Every caught error is also published here so the UI can show a transient
//! message. Publishing never blocks and never fails: with no receiver the
//! notice is dropped, and a slow receiver only lags.

use feed_core::MutationKind;
use std::fmt;
use tokio::sync::broadcast;

use crate::error::{ClientError, ServiceError};

const CAPACITY: usize = 64;

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// A read failed; stale data stays visible.
    FetchFailed,
    /// A write failed and was rolled back.
    MutationFailed,
    /// The push subscription failed; only the fallback re-fetch is active.
    ChannelDegraded,
    /// An action was refused before dispatch.
    Denied,
}

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Category.
    pub kind: NoticeKind,
    /// Human-readable message.
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Sending side of the notice channel. Clones share the channel.
#[derive(Debug, Clone)]
pub struct Notices {
    tx: broadcast::Sender<Notice>,
}

impl Notices {
    /// Create a notice channel.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        Self { tx }
    }

    /// Publish a notice.
    pub fn publish(&self, kind: NoticeKind, message: impl fmt::Display) {
        let notice = Notice {
            kind,
            message: message.to_string(),
        };
        // No receivers is fine.
        let _ = self.tx.send(notice);
    }

    /// Report a mutation refused before dispatch.
    pub(crate) fn denied(&self, action: MutationKind, entity: &str) -> ClientError {
        tracing::warn!("Refusing {} on {}: not permitted", action, entity);
        let err = ClientError::AuthorizationDenied { action };
        self.publish(NoticeKind::Denied, &err);
        err
    }

    /// Report a mutation the backend failed (its optimistic effect is
    /// already rolled back).
    pub(crate) fn mutation_failed(
        &self,
        action: MutationKind,
        entity: &str,
        source: ServiceError,
    ) -> ClientError {
        if source.is_authorization() {
            tracing::warn!("Backend refused {} on {}: {}", action, entity, source);
        } else {
            tracing::warn!("{} on {} failed, rolled back: {}", action, entity, source);
        }
        let err = ClientError::mutation(action, source);
        self.publish(NoticeKind::MutationFailed, &err);
        err
    }

    /// Receive notices published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl Default for Notices {
    fn default() -> Self {
        Self::new()
    }
}
