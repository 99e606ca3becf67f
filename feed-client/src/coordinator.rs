//! Mutation Coordinator - optimistic post mutations.
//!
//! Each user intent goes through the same envelope:
//!
//! 1. Authorize against the viewer (pure, no network)
//! 2. Refuse if the same kind of mutation is already in flight for the post
//! 3. Apply the optimistic value through a [`Transaction`]
//! 4. Dispatch exactly one backend call
//! 5. Commit the server's value, or abort to the snapshot
//!
//! The in-flight marker is a guard dropped on every path. Delete is the
//! exception to step 3: a post is removed only once the backend confirms.

use feed_core::{
    ContentField, FeedStore, LikeField, MutationKind, OptimisticField, PinField, Transaction,
    Viewer,
};
use feed_types::{DiscussionPost, LikeState, PinState, PostContent, PostId};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::context::FeedContext;
use crate::error::{ClientError, ServiceError};
use crate::inflight::InFlight;
use crate::notice::Notices;
use crate::service::MutationService;

/// Result of a mutation request that passed authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The backend accepted the mutation; carries its authoritative result.
    Committed(T),
    /// The same mutation was already in flight; nothing was dispatched.
    Ignored,
}

impl<T> Outcome<T> {
    /// Whether the request was dropped as a duplicate.
    pub fn is_ignored(&self) -> bool {
        matches!(self, Outcome::Ignored)
    }
}

/// Run the remainder of a dispatched mutation on its own task and wait for it.
///
/// Once an optimistic value is written, reconciliation must happen whether
/// or not the caller keeps polling: dropping the returned future detaches
/// the task instead of cancelling it.
pub(crate) async fn detached<T, Fut>(kind: MutationKind, work: Fut) -> Result<T, ClientError>
where
    T: Send + 'static,
    Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("{} task ended abnormally: {}", kind, e);
            Err(ClientError::Interrupted {
                action: kind,
                reason: e.to_string(),
            })
        }
    }
}

/// Executes optimistic post mutations against the shared feed store.
#[derive(Clone)]
pub struct MutationCoordinator {
    store: Arc<Mutex<FeedStore>>,
    writer: Arc<dyn MutationService>,
    viewer: Arc<RwLock<Viewer>>,
    in_flight: InFlight,
    notices: Notices,
}

impl MutationCoordinator {
    /// Create a coordinator over the shared context.
    pub fn new(writer: Arc<dyn MutationService>, context: &FeedContext) -> Self {
        Self {
            store: Arc::clone(&context.store),
            writer,
            viewer: Arc::clone(&context.viewer),
            in_flight: context.in_flight.clone(),
            notices: context.notices.clone(),
        }
    }

    /// Toggle the viewer's like on a post.
    pub async fn toggle_like(&self, id: &PostId) -> Result<Outcome<LikeState>, ClientError> {
        self.optimistic::<LikeField, _, _>(
            MutationKind::Like,
            id,
            |state| state.toggled(),
            |writer, id| async move { writer.toggle_like(&id).await },
        )
        .await
    }

    /// Toggle a post's pinned flag. Elevated role only.
    pub async fn toggle_pin(&self, id: &PostId) -> Result<Outcome<PinState>, ClientError> {
        self.optimistic::<PinField, _, _>(
            MutationKind::Pin,
            id,
            |state| PinState {
                is_pinned: !state.is_pinned,
            },
            |writer, id| async move { writer.toggle_pin(&id).await },
        )
        .await
    }

    /// Replace a post's title and body. Author only.
    pub async fn edit_post(
        &self,
        id: &PostId,
        content: PostContent,
    ) -> Result<Outcome<PostContent>, ClientError> {
        let sent = content.clone();
        self.optimistic::<ContentField, _, _>(
            MutationKind::EditPost,
            id,
            move |_| content,
            move |writer, id| async move { writer.update_discussion(&id, &sent).await },
        )
        .await
    }

    /// Delete a post. Elevated role only. The post leaves the feed only after
    /// the backend confirms.
    pub async fn delete_post(&self, id: &PostId) -> Result<Outcome<()>, ClientError> {
        let kind = MutationKind::DeletePost;
        self.authorize(kind, id).await?;

        let Some(guard) = self.in_flight.try_acquire(kind, id.as_str()) else {
            tracing::debug!("Ignoring {} on {}: already in flight", kind, id);
            return Ok(Outcome::Ignored);
        };

        let store = Arc::clone(&self.store);
        let writer = Arc::clone(&self.writer);
        let notices = self.notices.clone();
        let id = id.clone();
        detached(kind, async move {
            let _guard = guard;
            tracing::debug!("Dispatching {} on {}", kind, id);
            match writer.delete_discussion(&id).await {
                Ok(()) => {
                    store.lock().await.remove_post(&id);
                    tracing::info!("Deleted discussion {}", id);
                    Ok(Outcome::Committed(()))
                }
                Err(e) => Err(notices.mutation_failed(kind, id.as_str(), e)),
            }
        })
        .await
    }

    /// Whether a mutation of `kind` is outstanding for the post.
    pub fn is_in_flight(&self, kind: MutationKind, id: &PostId) -> bool {
        self.in_flight.is_in_flight(kind, id.as_str())
    }

    async fn optimistic<F, C, Fut>(
        &self,
        kind: MutationKind,
        id: &PostId,
        delta: impl FnOnce(&F::Value) -> F::Value,
        call: C,
    ) -> Result<Outcome<F::Value>, ClientError>
    where
        F: OptimisticField<DiscussionPost> + 'static,
        F::Value: Send + 'static,
        C: FnOnce(Arc<dyn MutationService>, PostId) -> Fut,
        Fut: Future<Output = Result<F::Value, ServiceError>> + Send + 'static,
    {
        self.authorize(kind, id).await?;

        let Some(guard) = self.in_flight.try_acquire(kind, id.as_str()) else {
            tracing::debug!("Ignoring {} on {}: already in flight", kind, id);
            return Ok(Outcome::Ignored);
        };

        let tx = {
            let mut store = self.store.lock().await;
            let post = store
                .get_mut(id)
                .ok_or_else(|| ClientError::NotFound(id.clone()))?;
            Transaction::<F, DiscussionPost>::apply(post, delta)
        };

        // From here on the transaction must end in commit or abort even if
        // the caller stops polling.
        let request = call(Arc::clone(&self.writer), id.clone());
        let store = Arc::clone(&self.store);
        let notices = self.notices.clone();
        let id = id.clone();
        detached(kind, async move {
            let _guard = guard;
            tracing::debug!("Dispatching {} on {}", kind, id);
            let result = request.await;

            let mut store = store.lock().await;
            let post = store.get_mut(&id);
            match result {
                Ok(authoritative) => {
                    match post {
                        Some(post) => tx.commit(post, authoritative.clone()),
                        None => tracing::debug!("{} on {} committed after removal", kind, id),
                    }
                    tracing::debug!("Committed {} on {}", kind, id);
                    Ok(Outcome::Committed(authoritative))
                }
                Err(e) => {
                    if let Some(post) = post {
                        tx.abort(post);
                    }
                    drop(store);
                    Err(notices.mutation_failed(kind, id.as_str(), e))
                }
            }
        })
        .await
    }

    async fn authorize(&self, kind: MutationKind, id: &PostId) -> Result<(), ClientError> {
        let permitted = {
            let store = self.store.lock().await;
            let post = store
                .get(id)
                .ok_or_else(|| ClientError::NotFound(id.clone()))?;
            self.viewer.read().await.may_mutate_post(kind, post)
        };
        if permitted {
            Ok(())
        } else {
            Err(self.notices.denied(kind, id.as_str()))
        }
    }
}
