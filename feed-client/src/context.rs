//! State shared by the feed, the coordinator and the comment stream.

use feed_core::{FeedStore, ProfileCache, Viewer};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::inflight::InFlight;
use crate::notice::Notices;

/// Handles to the session-wide state. Clones share everything.
#[derive(Debug, Clone)]
pub struct FeedContext {
    /// The discussion posts.
    pub store: Arc<Mutex<FeedStore>>,
    /// Profiles harvested from payloads.
    pub profiles: Arc<Mutex<ProfileCache>>,
    /// The signed-in user.
    pub viewer: Arc<RwLock<Viewer>>,
    /// Outstanding mutations.
    pub in_flight: InFlight,
    /// User-visible notifications.
    pub notices: Notices,
}

impl FeedContext {
    /// Fresh, empty state for `viewer`.
    pub fn new(viewer: Viewer) -> Self {
        Self {
            store: Arc::new(Mutex::new(FeedStore::new())),
            profiles: Arc::new(Mutex::new(ProfileCache::new())),
            viewer: Arc::new(RwLock::new(viewer)),
            in_flight: InFlight::new(),
            notices: Notices::new(),
        }
    }
}
