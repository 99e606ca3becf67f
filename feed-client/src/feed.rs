//! Feed - the paginated discussion list.
//!
//! [`Feed`] loads pages through a [`ReadService`] into the shared
//! [`FeedStore`]. A failed load leaves whatever was loaded before in place.

use feed_core::{FeedStore, ProfileCache};
use feed_types::{DiscussionPost, PostId};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::context::FeedContext;
use crate::error::ClientError;
use crate::notice::{NoticeKind, Notices};
use crate::service::ReadService;

/// Handle to the discussion feed. Clones share the same store.
#[derive(Clone)]
pub struct Feed {
    store: Arc<Mutex<FeedStore>>,
    reader: Arc<dyn ReadService>,
    profiles: Arc<Mutex<ProfileCache>>,
    notices: Notices,
    page_size: u32,
}

impl Feed {
    /// Create a feed over the shared context.
    pub fn new(reader: Arc<dyn ReadService>, context: &FeedContext, page_size: u32) -> Self {
        Self {
            store: Arc::clone(&context.store),
            reader,
            profiles: Arc::clone(&context.profiles),
            notices: context.notices.clone(),
            page_size: page_size.max(1),
        }
    }

    /// Load a page. Page 1 replaces the held posts, later pages append.
    ///
    /// Returns the number of posts added.
    pub async fn load_page(&self, page: u32) -> Result<usize, ClientError> {
        let page = page.max(1);
        tracing::debug!("Loading feed page {} (size {})", page, self.page_size);

        let fetched = match self.reader.list_discussions(page, self.page_size).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!("Feed page {} failed: {}", page, e);
                self.notices.publish(NoticeKind::FetchFailed, &e);
                return Err(ClientError::Fetch(e));
            }
        };

        {
            let mut profiles = self.profiles.lock().await;
            for post in &fetched.items {
                profiles.harvest(&post.author);
            }
        }

        let added = self.store.lock().await.apply_page(page, fetched);
        tracing::info!("Loaded feed page {} ({} new posts)", page, added);
        Ok(added)
    }

    /// Load the next page if the backend reported one. Returns `Ok(0)` when
    /// there is nothing more to load.
    pub async fn load_more(&self) -> Result<usize, ClientError> {
        let next = {
            let store = self.store.lock().await;
            if store.is_loaded() && !store.has_more() {
                return Ok(0);
            }
            store.next_page()
        };
        self.load_page(next).await
    }

    /// Reload from page 1.
    pub async fn refresh(&self) -> Result<usize, ClientError> {
        self.load_page(1).await
    }

    /// Merge an authoritative post from outside the feed's own loads.
    pub async fn apply_server_post(&self, post: DiscussionPost) {
        self.profiles.lock().await.harvest(&post.author);
        self.store.lock().await.apply_server_post(post);
    }

    /// Posts in display order (pinned first, then newest first).
    pub async fn sorted_view(&self) -> Vec<DiscussionPost> {
        let store = self.store.lock().await;
        store.sorted_view().into_iter().cloned().collect()
    }

    /// Posts in retrieval order.
    pub async fn posts(&self) -> Vec<DiscussionPost> {
        self.store.lock().await.posts().to_vec()
    }

    /// A held post.
    pub async fn post(&self, id: &PostId) -> Option<DiscussionPost> {
        self.store.lock().await.get(id).cloned()
    }

    /// Whether another page is available.
    pub async fn has_more(&self) -> bool {
        self.store.lock().await.has_more()
    }

    /// Number of posts held.
    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    /// Check if no posts are held.
    pub async fn is_empty(&self) -> bool {
        self.store.lock().await.is_empty()
    }
}
