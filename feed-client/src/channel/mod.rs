//! Push channel abstraction.
//!
//! The backend publishes comment events on a topic per discussion. This
//! module provides the [`PushChannel`] trait over the raw source and the
//! [`PushAdapter`] that turns raw payloads into typed [`PushEvent`]s.
//!
//! # Design
//!
//! - `subscribe()` returns a receiver of raw payloads for one topic
//! - `unsubscribe()` stops delivery; the receiver then ends
//! - both are idempotent
//!
//! # Example
//!
//! ```ignore
//! let adapter = PushAdapter::new(Arc::new(MockChannel::new()));
//! let mut sub = adapter.subscribe(&discussion).await?;
//! while let Some(event) = sub.next().await {
//!     // apply event
//! }
//! ```

mod mock;

pub use mock::MockChannel;

use async_trait::async_trait;
use dashmap::DashSet;
use feed_types::{DecodeError, PostId, PushEvent};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Push channel errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The subscription could not be established.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// The channel is closed.
    #[error("channel closed")]
    Closed,

    /// A payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Topic-scoped source of raw event payloads.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Start delivery for `topic`. Subscribing again replaces the previous
    /// receiver.
    async fn subscribe(&self, topic: &PostId) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, ChannelError>;

    /// Stop delivery for `topic`. A no-op when not subscribed.
    async fn unsubscribe(&self, topic: &PostId) -> Result<(), ChannelError>;
}

/// Typed, idempotent wrapper around a [`PushChannel`].
#[derive(Clone)]
pub struct PushAdapter {
    channel: Arc<dyn PushChannel>,
    active: Arc<DashSet<PostId>>,
}

impl PushAdapter {
    /// Wrap a channel.
    pub fn new(channel: Arc<dyn PushChannel>) -> Self {
        Self {
            channel,
            active: Arc::new(DashSet::new()),
        }
    }

    /// Subscribe to a discussion's topic.
    pub async fn subscribe(&self, topic: &PostId) -> Result<Subscription, ChannelError> {
        let rx = self.channel.subscribe(topic).await?;
        self.active.insert(topic.clone());
        tracing::info!("Subscribed to {}", topic);
        Ok(Subscription {
            topic: topic.clone(),
            rx,
        })
    }

    /// Unsubscribe from a discussion's topic. A no-op when not subscribed.
    pub async fn unsubscribe(&self, topic: &PostId) -> Result<(), ChannelError> {
        if self.active.remove(topic).is_none() {
            return Ok(());
        }
        self.channel.unsubscribe(topic).await?;
        tracing::info!("Unsubscribed from {}", topic);
        Ok(())
    }

    /// Whether the adapter holds a subscription for `topic`.
    pub fn is_subscribed(&self, topic: &PostId) -> bool {
        self.active.contains(topic)
    }
}

/// Typed event stream of one topic.
#[derive(Debug)]
pub struct Subscription {
    topic: PostId,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Subscription {
    /// The subscribed topic.
    pub fn topic(&self) -> &PostId {
        &self.topic
    }

    /// Next decodable event. Undecodable payloads and events for another
    /// discussion are logged and skipped. `None` once the topic is closed.
    pub async fn next(&mut self) -> Option<PushEvent> {
        loop {
            let bytes = self.rx.recv().await?;
            match PushEvent::from_topic_payload(&self.topic, &bytes) {
                Ok(event) => return Some(event),
                Err(e) => {
                    tracing::warn!("Dropping push payload on {}: {}", self.topic, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::comment;

    fn adapter() -> (PushAdapter, MockChannel) {
        let channel = MockChannel::new();
        (PushAdapter::new(Arc::new(channel.clone())), channel)
    }

    // ===========================================
    // Subscription Lifecycle Tests
    // ===========================================

    #[tokio::test]
    async fn subscribe_delivers_typed_events() {
        let (adapter, channel) = adapter();
        let topic = PostId::new("d1");
        let mut sub = adapter.subscribe(&topic).await.unwrap();

        let event = PushEvent::CommentCreated {
            discussion_id: topic.clone(),
            comment: comment("c1", "d1", 1),
        };
        assert!(channel.publish(&topic, &event));

        assert_eq!(sub.next().await, Some(event));
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let (adapter, channel) = adapter();
        let topic = PostId::new("d1");

        adapter.unsubscribe(&topic).await.unwrap();
        assert_eq!(channel.unsubscribe_count(), 0);

        let _sub = adapter.subscribe(&topic).await.unwrap();
        adapter.unsubscribe(&topic).await.unwrap();
        adapter.unsubscribe(&topic).await.unwrap();
        assert_eq!(channel.unsubscribe_count(), 1);
        assert!(!adapter.is_subscribed(&topic));
    }

    #[tokio::test]
    async fn unsubscribe_ends_stream() {
        let (adapter, _channel) = adapter();
        let topic = PostId::new("d1");
        let mut sub = adapter.subscribe(&topic).await.unwrap();

        adapter.unsubscribe(&topic).await.unwrap();
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn failed_subscribe_is_reported() {
        let (adapter, channel) = adapter();
        channel.fail_next_subscribe("socket down");

        let err = adapter.subscribe(&PostId::new("d1")).await.unwrap_err();
        assert!(matches!(err, ChannelError::SubscribeFailed(_)));
        assert!(!adapter.is_subscribed(&PostId::new("d1")));
    }

    // ===========================================
    // Decoding Tests
    // ===========================================

    #[tokio::test]
    async fn garbage_and_foreign_events_are_skipped() {
        let (adapter, channel) = adapter();
        let topic = PostId::new("d1");
        let mut sub = adapter.subscribe(&topic).await.unwrap();

        channel.publish_raw(&topic, b"not json".to_vec());
        let foreign = PushEvent::CommentDeleted {
            discussion_id: PostId::new("d2"),
            comment_id: "c9".into(),
        };
        channel.publish_raw(&topic, foreign.to_bytes().unwrap());
        let good = PushEvent::CommentDeleted {
            discussion_id: topic.clone(),
            comment_id: "c1".into(),
        };
        channel.publish(&topic, &good);

        assert_eq!(sub.next().await, Some(good));
    }
}
