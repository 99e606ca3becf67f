//! Mock push channel for testing.
//!
//! Lets a test publish events on a topic, fail the next subscribe, and see
//! which topics are subscribed.

use super::{ChannelError, PushChannel};
use async_trait::async_trait;
use feed_types::{PostId, PushEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Mock push channel for testing.
///
/// Clones share state.
#[derive(Debug, Default, Clone)]
pub struct MockChannel {
    inner: Arc<Mutex<MockChannelInner>>,
}

#[derive(Debug, Default)]
struct MockChannelInner {
    senders: HashMap<PostId, mpsc::UnboundedSender<Vec<u8>>>,
    subscribe_calls: Vec<PostId>,
    unsubscribe_calls: Vec<PostId>,
    fail_next_subscribe: Option<String>,
}

impl MockChannel {
    /// Create a new mock channel.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish an event on `topic`. Returns `false` if nobody is subscribed.
    pub fn publish(&self, topic: &PostId, event: &PushEvent) -> bool {
        match event.to_bytes() {
            Ok(bytes) => self.publish_raw(topic, bytes),
            Err(_) => false,
        }
    }

    /// Publish raw bytes on `topic`. Returns `false` if nobody is subscribed.
    pub fn publish_raw(&self, topic: &PostId, bytes: Vec<u8>) -> bool {
        let inner = self.lock();
        match inner.senders.get(topic) {
            Some(tx) => tx.send(bytes).is_ok(),
            None => false,
        }
    }

    /// Whether `topic` currently has a live subscriber.
    pub fn is_subscribed(&self, topic: &PostId) -> bool {
        let inner = self.lock();
        inner
            .senders
            .get(topic)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Topics passed to `subscribe()`, in order.
    pub fn subscribe_calls(&self) -> Vec<PostId> {
        self.lock().subscribe_calls.clone()
    }

    /// Number of `unsubscribe()` calls.
    pub fn unsubscribe_count(&self) -> usize {
        self.lock().unsubscribe_calls.len()
    }

    /// Cause the next subscribe() to fail with the given error.
    pub fn fail_next_subscribe(&self, error: &str) {
        self.lock().fail_next_subscribe = Some(error.to_string());
    }

    /// Drop the server side of `topic`, ending its subscriber's stream.
    pub fn close_topic(&self, topic: &PostId) {
        self.lock().senders.remove(topic);
    }
}

#[async_trait]
impl PushChannel for MockChannel {
    async fn subscribe(
        &self,
        topic: &PostId,
    ) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, ChannelError> {
        let mut inner = self.lock();
        inner.subscribe_calls.push(topic.clone());

        // Check for forced failure
        if let Some(error) = inner.fail_next_subscribe.take() {
            return Err(ChannelError::SubscribeFailed(error));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        inner.senders.insert(topic.clone(), tx);
        Ok(rx)
    }

    async fn unsubscribe(&self, topic: &PostId) -> Result<(), ChannelError> {
        let mut inner = self.lock();
        inner.unsubscribe_calls.push(topic.clone());
        inner.senders.remove(topic);
        Ok(())
    }
}
