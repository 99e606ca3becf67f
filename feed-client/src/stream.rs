//! Comment Stream Manager - the open discussion's live comment thread.
//!
//! [`CommentStream`] drives the [`ThreadState`] machine from feed-core and
//! executes the actions it returns against the read service and the push
//! channel.
//!
//! The comment list merges the full fetch, this viewer's own request/response
//! results and push events, deduplicated by comment id. Every successful
//! local comment creation arms a one-shot fallback re-fetch that replaces the
//! list wholesale, so a missed or duplicated push delivery heals on its own.
//!
//! # Generations
//!
//! Each open gets a fresh generation number. Fetch results, subscriptions,
//! push events and timers carry the generation they were started for and are
//! discarded once it is no longer current, so nothing mutates a list that
//! has been closed or switched away from.
//!
//! # Locking
//!
//! The thread lock is never held across a network call, and never together
//! with the feed store lock.

use chrono::Utc;
use feed_core::{
    Action, CommentBodyField, CommentEntry, CommentList, ConfirmOutcome, Event, InsertOutcome,
    MutationKind, PendingComment, ScrollMetrics, ThreadEvent, ThreadState, Transaction, Viewer,
    ViewportSignal, ViewportTracker,
};
use feed_types::{AuthorRef, Comment, CommentId, LocalId, PostId, PushEvent};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::channel::{ChannelError, PushAdapter, PushChannel, Subscription};
use crate::config::{ClientConfig, CommentsConfig};
use crate::context::FeedContext;
use crate::coordinator::{detached, Outcome};
use crate::error::{ClientError, ServiceError};
use crate::notice::NoticeKind;
use crate::service::{MutationService, ReadService};

const EVENT_CAPACITY: usize = 64;

/// The comment being edited and its unsaved text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBuffer {
    /// Comment under edit.
    pub comment_id: CommentId,
    /// Current text.
    pub text: String,
    /// Error from the last failed save or delete, shown inline.
    pub error: Option<String>,
}

/// Handle to the comment thread of the open discussion. Clones share state.
#[derive(Clone)]
pub struct CommentStream {
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,
    reader: Arc<dyn ReadService>,
    writer: Arc<dyn MutationService>,
    push: PushAdapter,
    ctx: FeedContext,
    config: CommentsConfig,
    events: broadcast::Sender<ThreadEvent>,
    signals: broadcast::Sender<ViewportSignal>,
}

struct Inner {
    state: ThreadState,
    list: Option<CommentList>,
    cache: HashMap<PostId, Vec<Comment>>,
    viewport: ViewportTracker,
    draft: String,
    edit: Option<EditBuffer>,
    pump: Option<JoinHandle<()>>,
    refetch: Option<JoinHandle<()>>,
    next_generation: u64,
}

impl Inner {
    fn dispatch(&mut self, event: Event) -> Vec<Action> {
        let (state, actions) = std::mem::take(&mut self.state).on_event(event);
        self.state = state;
        actions
    }

    /// Discussion and generation of the open thread whose list is shown.
    fn open_target(&self) -> Result<(PostId, u64), ClientError> {
        let (Some(discussion), Some(generation)) =
            (self.state.discussion(), self.state.generation())
        else {
            return Err(ClientError::NoOpenDiscussion);
        };
        match &self.list {
            Some(list) if list.discussion() == discussion => Ok((discussion.clone(), generation)),
            _ => Err(ClientError::NoOpenDiscussion),
        }
    }

    fn edit_targets(&self, id: &CommentId) -> bool {
        self.edit.as_ref().is_some_and(|b| &b.comment_id == id)
    }

    fn stop_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    fn stop_refetch(&mut self) {
        if let Some(refetch) = self.refetch.take() {
            refetch.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.stop_pump();
        self.stop_refetch();
    }
}

impl CommentStream {
    /// Create a stream over the shared context.
    pub fn new(
        context: &FeedContext,
        reader: Arc<dyn ReadService>,
        writer: Arc<dyn MutationService>,
        channel: Arc<dyn PushChannel>,
        config: &ClientConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (signals, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Inner {
            state: ThreadState::new(),
            list: None,
            cache: HashMap::new(),
            viewport: ViewportTracker::new(config.viewport.bottom_threshold_px),
            draft: String::new(),
            edit: None,
            pump: None,
            refetch: None,
            next_generation: 0,
        };
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                reader,
                writer,
                push: PushAdapter::new(channel),
                ctx: context.clone(),
                config: config.comments.clone(),
                events,
                signals,
            }),
        }
    }

    // ===========================================
    // Lifecycle
    // ===========================================

    /// Open a discussion. Retained comments show at once, then the full list
    /// is fetched and the push topic subscribed. Opening another discussion
    /// closes the current one first.
    ///
    /// Returns once the load this call started has finished: the thread is
    /// live, or the fetch failed. Opening the discussion that is already
    /// open or still loading is a no-op and returns at once, without
    /// waiting for a load started by an earlier call.
    pub async fn open(&self, discussion: PostId) {
        let actions = {
            let mut inner = self.shared.inner.lock().await;
            inner.next_generation += 1;
            let generation = inner.next_generation;
            inner.dispatch(Event::OpenRequested {
                discussion,
                generation,
            })
        };
        self.shared.run_actions(actions).await;
    }

    /// Close the open discussion: unsubscribe, cancel the pending re-fetch
    /// and keep the comments for the next open.
    pub async fn close(&self) {
        let actions = self
            .shared
            .inner
            .lock()
            .await
            .dispatch(Event::CloseRequested);
        self.shared.run_actions(actions).await;
    }

    /// Re-fetch the full list now, replacing the held one. A no-op unless
    /// the thread is live.
    pub async fn refresh(&self) {
        let actions = {
            let mut inner = self.shared.inner.lock().await;
            let Some(generation) = inner.state.generation() else {
                return;
            };
            inner.dispatch(Event::RefetchRequested { generation })
        };
        self.shared.run_actions(actions).await;
    }

    /// Retry the push subscription of a degraded thread.
    pub async fn resubscribe(&self) -> Result<(), ClientError> {
        let (discussion, generation) = {
            let inner = self.shared.inner.lock().await;
            match &inner.state {
                ThreadState::Closed => return Err(ClientError::NoOpenDiscussion),
                ThreadState::Loading { .. } | ThreadState::Live { subscribed: true, .. } => {
                    return Ok(())
                }
                ThreadState::Live {
                    discussion,
                    generation,
                    ..
                } => (discussion.clone(), *generation),
            }
        };

        tracing::info!("Retrying subscription to {}", discussion);
        match self.shared.push.subscribe(&discussion).await {
            Ok(subscription) => {
                self.shared.attach(generation, subscription).await;
                Ok(())
            }
            Err(e) => {
                self.shared.degrade(generation, e.to_string()).await;
                Err(e.into())
            }
        }
    }

    // ===========================================
    // Observation
    // ===========================================

    /// Current lifecycle state.
    pub async fn state(&self) -> ThreadState {
        self.shared.inner.lock().await.state.clone()
    }

    /// The open discussion.
    pub async fn discussion(&self) -> Option<PostId> {
        self.shared.inner.lock().await.state.discussion().cloned()
    }

    /// Whether the thread is live without a push subscription.
    pub async fn is_degraded(&self) -> bool {
        self.shared.inner.lock().await.state.is_degraded()
    }

    /// The shown comments, oldest first. Empty when nothing is open.
    pub async fn comments(&self) -> Vec<CommentEntry> {
        let inner = self.shared.inner.lock().await;
        inner
            .list
            .as_ref()
            .map(|list| list.entries().to_vec())
            .unwrap_or_default()
    }

    /// Lifecycle events from now on.
    pub fn events(&self) -> broadcast::Receiver<ThreadEvent> {
        self.shared.events.subscribe()
    }

    /// Viewport signals raised by list changes from now on. Signals
    /// answering a direct call (`on_layout`, `on_indicator_clicked`) are
    /// returned instead.
    pub fn viewport_signals(&self) -> broadcast::Receiver<ViewportSignal> {
        self.shared.signals.subscribe()
    }

    // ===========================================
    // Viewport
    // ===========================================

    /// The comment panel was laid out.
    pub async fn on_layout(&self, metrics: ScrollMetrics) -> ViewportSignal {
        self.shared.inner.lock().await.viewport.on_layout(metrics)
    }

    /// The viewer scrolled the comment panel.
    pub async fn on_scroll(&self, metrics: ScrollMetrics) {
        self.shared.inner.lock().await.viewport.on_scroll(metrics);
    }

    /// The viewer clicked the "new messages" indicator.
    pub async fn on_indicator_clicked(&self) -> ViewportSignal {
        self.shared.inner.lock().await.viewport.on_indicator_clicked()
    }

    /// Whether the "new messages" indicator is showing.
    pub async fn indicator_visible(&self) -> bool {
        self.shared.inner.lock().await.viewport.indicator_visible()
    }

    // ===========================================
    // Composer
    // ===========================================

    /// Replace the comment draft.
    pub async fn set_draft(&self, text: impl Into<String>) {
        self.shared.inner.lock().await.draft = text.into();
    }

    /// The comment draft.
    pub async fn draft(&self) -> String {
        self.shared.inner.lock().await.draft.clone()
    }

    /// Submit the draft as a new comment.
    ///
    /// A pending entry shows immediately. On success it is swapped for the
    /// server's comment, the draft is cleared and the fallback re-fetch is
    /// armed. On failure the pending entry goes away and the draft stays
    /// for a retry. Once the pending entry shows, the request settles even
    /// if this future is dropped.
    pub async fn submit_comment(&self) -> Result<Outcome<Comment>, ClientError> {
        let kind = MutationKind::CreateComment;
        let author = AuthorRef::Id(self.viewer().await.id);

        let (discussion, generation, body, local_id, marker) = {
            let mut guard = self.shared.inner.lock().await;
            let inner = &mut *guard;
            let (discussion, generation) = inner.open_target()?;
            let body = inner.draft.trim().to_string();
            if body.is_empty() {
                return Err(ClientError::EmptyComment);
            }
            let Some(marker) = self
                .shared
                .ctx
                .in_flight
                .try_acquire(kind, discussion.as_str())
            else {
                tracing::debug!("Ignoring {} on {}: already in flight", kind, discussion);
                return Ok(Outcome::Ignored);
            };
            let list = inner.list.as_mut().ok_or(ClientError::NoOpenDiscussion)?;

            let local_id = LocalId::new();
            list.push_pending(PendingComment {
                local_id,
                author,
                body: body.clone(),
                created_at: Utc::now(),
            });
            let signal = inner.viewport.on_list_len(list.len());
            self.shared.signal(signal);
            (discussion, generation, body, local_id, marker)
        };

        let shared = Arc::clone(&self.shared);
        detached(kind, async move {
            let _marker = marker;
            shared
                .settle_create(discussion, generation, body, local_id)
                .await
        })
        .await
    }

    // ===========================================
    // Edit and delete
    // ===========================================

    /// Start editing a comment. Author only.
    pub async fn begin_edit(&self, id: &CommentId) -> Result<(), ClientError> {
        let viewer = self.viewer().await;
        let mut inner = self.shared.inner.lock().await;
        let list = inner.list.as_ref().ok_or(ClientError::NoOpenDiscussion)?;
        let comment = list
            .get(id)
            .ok_or_else(|| ClientError::CommentNotFound(id.clone()))?;
        self.shared
            .authorize(&viewer, MutationKind::EditComment, comment)?;

        let buffer = EditBuffer {
            comment_id: id.clone(),
            text: comment.body.clone(),
            error: None,
        };
        inner.edit = Some(buffer);
        Ok(())
    }

    /// Replace the edit buffer's text. Clears a previous error.
    pub async fn set_edit_text(&self, text: impl Into<String>) {
        if let Some(buffer) = self.shared.inner.lock().await.edit.as_mut() {
            buffer.text = text.into();
            buffer.error = None;
        }
    }

    /// Abandon the edit.
    pub async fn cancel_edit(&self) {
        self.shared.inner.lock().await.edit = None;
    }

    /// The edit in progress.
    pub async fn edit_buffer(&self) -> Option<EditBuffer> {
        self.shared.inner.lock().await.edit.clone()
    }

    /// Save the edit buffer. The new text shows immediately; a failure
    /// restores the old text and keeps the buffer with an inline error.
    ///
    /// `Ignored` when there is no edit in progress or the same save is
    /// already in flight.
    pub async fn save_edit(&self) -> Result<Outcome<()>, ClientError> {
        let kind = MutationKind::EditComment;
        let viewer = self.viewer().await;

        let (id, text, generation, tx, marker) = {
            let mut guard = self.shared.inner.lock().await;
            let inner = &mut *guard;
            let (_, generation) = inner.open_target()?;
            let Some(buffer) = inner.edit.as_ref() else {
                return Ok(Outcome::Ignored);
            };
            let id = buffer.comment_id.clone();
            let text = buffer.text.trim().to_string();
            if text.is_empty() {
                return Err(ClientError::EmptyComment);
            }

            let list = inner.list.as_mut().ok_or(ClientError::NoOpenDiscussion)?;
            let comment = list
                .get(&id)
                .ok_or_else(|| ClientError::CommentNotFound(id.clone()))?;
            self.shared.authorize(&viewer, kind, comment)?;

            let Some(marker) = self.shared.ctx.in_flight.try_acquire(kind, id.as_str()) else {
                tracing::debug!("Ignoring {} on {}: already in flight", kind, id);
                return Ok(Outcome::Ignored);
            };
            let tx = list
                .begin_edit(&id, &text, Utc::now())
                .ok_or_else(|| ClientError::CommentNotFound(id.clone()))?;
            (id, text, generation, tx, marker)
        };

        let shared = Arc::clone(&self.shared);
        detached(kind, async move {
            let _marker = marker;
            shared.settle_edit(id, text, generation, tx).await
        })
        .await
    }

    /// Delete a comment. Author or elevated role. The comment leaves the
    /// list at once and returns to its place if the backend refuses.
    pub async fn delete_comment(&self, id: &CommentId) -> Result<Outcome<()>, ClientError> {
        let kind = MutationKind::DeleteComment;
        let viewer = self.viewer().await;

        let (discussion, generation, index, removed, marker) = {
            let mut guard = self.shared.inner.lock().await;
            let inner = &mut *guard;
            let (discussion, generation) = inner.open_target()?;
            let list = inner.list.as_mut().ok_or(ClientError::NoOpenDiscussion)?;
            let comment = list
                .get(id)
                .ok_or_else(|| ClientError::CommentNotFound(id.clone()))?;
            self.shared.authorize(&viewer, kind, comment)?;

            let Some(marker) = self.shared.ctx.in_flight.try_acquire(kind, id.as_str()) else {
                tracing::debug!("Ignoring {} on {}: already in flight", kind, id);
                return Ok(Outcome::Ignored);
            };
            let (index, removed) = list
                .remove(id)
                .ok_or_else(|| ClientError::CommentNotFound(id.clone()))?;
            let len = list.len();
            inner.viewport.note_len(len);
            (discussion, generation, index, removed, marker)
        };

        let shared = Arc::clone(&self.shared);
        detached(kind, async move {
            let _marker = marker;
            shared
                .settle_delete(discussion, generation, index, removed)
                .await
        })
        .await
    }

    async fn viewer(&self) -> Viewer {
        self.shared.ctx.viewer.read().await.clone()
    }
}

impl Shared {
    /// Execute actions in order. Actions may yield further actions.
    async fn run_actions(self: &Arc<Self>, actions: Vec<Action>) {
        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            queue.extend(self.execute(action).await);
        }
    }

    async fn run(self: &Arc<Self>, event: Event) {
        let actions = self.inner.lock().await.dispatch(event);
        self.run_actions(actions).await;
    }

    // ===========================================
    // Settling local mutations
    // ===========================================

    async fn settle_create(
        self: Arc<Self>,
        discussion: PostId,
        generation: u64,
        body: String,
        local_id: LocalId,
    ) -> Result<Outcome<Comment>, ClientError> {
        let kind = MutationKind::CreateComment;
        self.ctx
            .store
            .lock()
            .await
            .adjust_comment_count(&discussion, 1);

        tracing::debug!("Dispatching {} on {}", kind, discussion);
        match self.writer.create_comment(&discussion, &body).await {
            Ok(comment) => {
                self.ctx.profiles.lock().await.harvest(&comment.author);
                let echoed = {
                    let mut guard = self.inner.lock().await;
                    let inner = &mut *guard;
                    let mut echoed = false;
                    if inner.state.is_current(generation) {
                        if let Some(list) = inner.list.as_mut() {
                            echoed = matches!(
                                list.confirm_pending(local_id, comment.clone()),
                                ConfirmOutcome::AlreadyPresent
                            );
                            let len = list.len();
                            let signal = inner.viewport.on_list_len(len);
                            self.signal(signal);
                        }
                        if inner.draft.trim() == body {
                            inner.draft.clear();
                        }
                        self.schedule_refetch(inner, generation);
                    }
                    echoed
                };
                if echoed {
                    // The push delivery already counted it.
                    tracing::debug!("Comment {} arrived by push before its response", comment.id);
                    self.ctx
                        .store
                        .lock()
                        .await
                        .adjust_comment_count(&discussion, -1);
                }
                tracing::info!("Created comment {} on {}", comment.id, discussion);
                Ok(Outcome::Committed(comment))
            }
            Err(e) => {
                {
                    let mut inner = self.inner.lock().await;
                    if let Some(list) = inner.list.as_mut() {
                        list.discard_pending(local_id);
                    }
                    let len = inner.list.as_ref().map_or(0, CommentList::len);
                    inner.viewport.note_len(len);
                }
                self.ctx
                    .store
                    .lock()
                    .await
                    .adjust_comment_count(&discussion, -1);
                Err(self.ctx.notices.mutation_failed(kind, discussion.as_str(), e))
            }
        }
    }

    async fn settle_edit(
        self: Arc<Self>,
        id: CommentId,
        text: String,
        generation: u64,
        tx: Transaction<CommentBodyField, Comment>,
    ) -> Result<Outcome<()>, ClientError> {
        let kind = MutationKind::EditComment;
        tracing::debug!("Dispatching {} on {}", kind, id);
        let result = self.writer.update_comment(&id, &text).await;

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if inner.state.is_current(generation) {
            if let Some(list) = inner.list.as_mut() {
                list.finish_edit(&id, tx, result.is_ok());
            }
        }
        match result {
            Ok(()) => {
                if inner
                    .edit
                    .as_ref()
                    .is_some_and(|b| b.comment_id == id && b.text.trim() == text)
                {
                    inner.edit = None;
                }
                tracing::debug!("Committed {} on {}", kind, id);
                Ok(Outcome::Committed(()))
            }
            Err(e) => {
                let err = self.ctx.notices.mutation_failed(kind, id.as_str(), e);
                if let Some(buffer) = inner.edit.as_mut().filter(|b| b.comment_id == id) {
                    buffer.error = Some(err.to_string());
                }
                Err(err)
            }
        }
    }

    async fn settle_delete(
        self: Arc<Self>,
        discussion: PostId,
        generation: u64,
        index: usize,
        removed: Comment,
    ) -> Result<Outcome<()>, ClientError> {
        let kind = MutationKind::DeleteComment;
        let id = removed.id.clone();
        self.ctx
            .store
            .lock()
            .await
            .adjust_comment_count(&discussion, -1);

        tracing::debug!("Dispatching {} on {}", kind, id);
        match self.writer.delete_comment(&id).await {
            Ok(()) => {
                let refetched = {
                    let mut guard = self.inner.lock().await;
                    let inner = &mut *guard;
                    let mut refetched = false;
                    if inner.state.is_current(generation) {
                        // A re-fetch that landed while the call was out may
                        // have put it back.
                        if let Some(list) = inner.list.as_mut() {
                            if list.remove(&id).is_some() {
                                refetched = true;
                                let len = list.len();
                                inner.viewport.note_len(len);
                            }
                        }
                    }
                    if inner.edit_targets(&id) {
                        inner.edit = None;
                    }
                    refetched
                };
                if refetched {
                    self.ctx
                        .store
                        .lock()
                        .await
                        .adjust_comment_count(&discussion, -1);
                }
                tracing::info!("Deleted comment {}", id);
                Ok(Outcome::Committed(()))
            }
            Err(e) => {
                let err = self.ctx.notices.mutation_failed(kind, id.as_str(), e);
                {
                    let mut guard = self.inner.lock().await;
                    let inner = &mut *guard;
                    if inner.state.is_current(generation) {
                        if let Some(list) = inner.list.as_mut() {
                            list.restore(index, removed);
                            let len = list.len();
                            inner.viewport.note_len(len);
                        }
                    }
                    if let Some(buffer) = inner.edit.as_mut().filter(|b| b.comment_id == id) {
                        buffer.error = Some(err.to_string());
                    }
                }
                self.ctx
                    .store
                    .lock()
                    .await
                    .adjust_comment_count(&discussion, 1);
                Err(err)
            }
        }
    }

    async fn execute(self: &Arc<Self>, action: Action) -> Vec<Action> {
        match action {
            Action::ShowCached { discussion } => {
                self.show_cached(discussion).await;
                vec![]
            }
            Action::Fetch {
                discussion,
                generation,
            } => self.fetch(discussion, generation).await,
            Action::Subscribe {
                discussion,
                generation,
            } => {
                match self.push.subscribe(&discussion).await {
                    Ok(subscription) => self.attach(generation, subscription).await,
                    Err(e) => {
                        tracing::warn!("Subscribing to {} failed: {}", discussion, e);
                        self.degrade(generation, e.to_string()).await;
                    }
                }
                vec![]
            }
            Action::Unsubscribe { discussion } => {
                self.inner.lock().await.stop_pump();
                if let Err(e) = self.push.unsubscribe(&discussion).await {
                    tracing::warn!("Unsubscribing from {} failed: {}", discussion, e);
                }
                vec![]
            }
            Action::RetainCache { discussion } => {
                let mut inner = self.inner.lock().await;
                let retained = inner
                    .list
                    .as_ref()
                    .filter(|list| list.discussion() == &discussion)
                    .map(CommentList::confirmed);
                if let Some(comments) = retained {
                    tracing::debug!("Retaining {} comments of {}", comments.len(), discussion);
                    inner.cache.insert(discussion, comments);
                }
                vec![]
            }
            Action::CancelRefetch => {
                self.inner.lock().await.stop_refetch();
                vec![]
            }
            Action::EmitEvent(event) => {
                let mut inner = self.inner.lock().await;
                self.emit(&mut inner, event);
                vec![]
            }
        }
    }

    async fn show_cached(&self, discussion: PostId) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if inner.state.discussion() != Some(&discussion) {
            return;
        }
        let cached = inner.cache.get(&discussion).cloned().unwrap_or_default();
        if !cached.is_empty() {
            tracing::debug!("Showing {} retained comments of {}", cached.len(), discussion);
        }
        let list = CommentList::from_comments(discussion, cached);
        inner.viewport.on_open();
        let signal = inner.viewport.on_list_len(list.len());
        inner.list = Some(list);
        inner.draft.clear();
        inner.edit = None;
        self.signal(signal);
    }

    async fn fetch(&self, discussion: PostId, generation: u64) -> Vec<Action> {
        tracing::debug!("Fetching comments of {} (generation {})", discussion, generation);
        let (comments, complete) = match self.fetch_all(&discussion).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!("Fetching comments of {} failed: {}", discussion, e);
                return self.inner.lock().await.dispatch(Event::FetchFailed {
                    generation,
                    error: e.to_string(),
                });
            }
        };

        {
            let mut profiles = self.ctx.profiles.lock().await;
            for comment in &comments {
                profiles.harvest(&comment.author);
            }
        }

        let (actions, count) = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            if !inner.state.is_current(generation) {
                tracing::debug!("Discarding comments of {}: no longer open", discussion);
                return vec![];
            }
            let Some(list) = inner.list.as_mut() else {
                return vec![];
            };
            list.replace_all(comments);
            let len = list.len();
            let signal = inner.viewport.on_list_len(len);
            self.signal(signal);
            tracing::info!("Loaded {} comments of {}", len, discussion);
            (
                inner.dispatch(Event::FetchSucceeded { generation }),
                complete.then(|| u32::try_from(len).unwrap_or(u32::MAX)),
            )
        };

        if let Some(count) = count {
            self.ctx
                .store
                .lock()
                .await
                .set_comment_count(&discussion, count);
        }
        actions
    }

    /// Fetch every page of a discussion's comments. The flag is `false` when
    /// the page cap cut the load short.
    async fn fetch_all(&self, discussion: &PostId) -> Result<(Vec<Comment>, bool), ServiceError> {
        let page_size = self.config.page_size.max(1);
        let max_pages = self.config.max_pages.max(1);
        let mut comments = Vec::new();

        for page in 1..=max_pages {
            let fetched = self
                .reader
                .list_comments(discussion, page, page_size, self.config.sort)
                .await?;
            let short = fetched.items.len() < page_size as usize;
            comments.extend(fetched.items);
            if short || !fetched.has_next_page {
                return Ok((comments, true));
            }
        }

        tracing::warn!(
            "Stopped loading comments of {} after {} pages",
            discussion,
            max_pages
        );
        Ok((comments, false))
    }

    /// Start pumping a subscription into the list, unless the thread moved on.
    async fn attach(self: &Arc<Self>, generation: u64, subscription: Subscription) {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_current(generation) {
            let reopened = inner.state.discussion() == Some(subscription.topic());
            drop(inner);
            tracing::debug!(
                "Dropping subscription to {}: no longer open",
                subscription.topic()
            );
            if !reopened {
                if let Err(e) = self.push.unsubscribe(subscription.topic()).await {
                    tracing::warn!("Unsubscribing from {} failed: {}", subscription.topic(), e);
                }
            }
            return;
        }

        inner.stop_pump();
        inner.pump = Some(self.spawn_pump(generation, subscription));
        let actions = inner.dispatch(Event::SubscribeSucceeded { generation });
        self.emit_all(&mut inner, actions);
    }

    fn spawn_pump(
        self: &Arc<Self>,
        generation: u64,
        mut subscription: Subscription,
    ) -> JoinHandle<()> {
        let shared = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                shared.apply_push(generation, event).await;
            }
            if let Some(shared) = shared.upgrade() {
                shared
                    .degrade(generation, ChannelError::Closed.to_string())
                    .await;
            }
        })
    }

    async fn degrade(&self, generation: u64, error: String) {
        let mut inner = self.inner.lock().await;
        let actions = inner.dispatch(Event::SubscribeFailed { generation, error });
        self.emit_all(&mut inner, actions);
    }

    /// Mirror one push event into the list.
    async fn apply_push(&self, generation: u64, event: PushEvent) {
        if let PushEvent::CommentCreated { comment, .. } | PushEvent::CommentUpdated { comment, .. } =
            &event
        {
            self.ctx.profiles.lock().await.harvest(&comment.author);
        }

        let kind = event.kind();
        let discussion = event.discussion_id().clone();
        let delta = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            if !inner.state.is_current(generation) {
                tracing::debug!("Dropping {} for {}: no longer open", kind, discussion);
                return;
            }
            let Some(list) = inner.list.as_mut() else {
                return;
            };

            let mut delta = 0;
            match event {
                PushEvent::CommentCreated { comment, .. } => {
                    let id = comment.id.clone();
                    match list.insert(comment) {
                        InsertOutcome::Inserted(_) => delta = 1,
                        InsertOutcome::Duplicate => {
                            tracing::debug!("Dropping duplicate {} for {}", kind, id)
                        }
                        InsertOutcome::Foreign => {
                            tracing::debug!("Dropping {} for another discussion", kind)
                        }
                    }
                    let len = list.len();
                    let signal = inner.viewport.on_list_len(len);
                    self.signal(signal);
                }
                PushEvent::CommentUpdated { comment, .. } => {
                    let id = comment.id.clone();
                    if !list.update(comment) {
                        tracing::debug!("Ignoring {} for unknown comment {}", kind, id);
                    }
                }
                PushEvent::CommentDeleted { comment_id, .. } => {
                    if list.remove(&comment_id).is_some() {
                        delta = -1;
                        let len = list.len();
                        inner.viewport.note_len(len);
                        if inner.edit_targets(&comment_id) {
                            inner.edit = None;
                        }
                    }
                }
            }
            delta
        };

        if delta != 0 {
            self.ctx
                .store
                .lock()
                .await
                .adjust_comment_count(&discussion, delta);
        }
    }

    /// Arm the one-shot fallback re-fetch, replacing any armed one.
    fn schedule_refetch(self: &Arc<Self>, inner: &mut Inner, generation: u64) {
        inner.stop_refetch();
        let delay = self.config.refetch_delay();
        let shared = Arc::downgrade(self);
        inner.refetch = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                tracing::debug!("Fallback re-fetch (generation {})", generation);
                shared.run(Event::RefetchRequested { generation }).await;
            }
        }));
    }

    fn authorize(
        &self,
        viewer: &Viewer,
        kind: MutationKind,
        comment: &Comment,
    ) -> Result<(), ClientError> {
        if viewer.may_mutate_comment(kind, comment) {
            Ok(())
        } else {
            Err(self.ctx.notices.denied(kind, comment.id.as_str()))
        }
    }

    fn emit_all(&self, inner: &mut Inner, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::EmitEvent(event) => self.emit(inner, event),
                other => tracing::debug!("Dropping unexpected action {:?}", other),
            }
        }
    }

    fn emit(&self, inner: &mut Inner, event: ThreadEvent) {
        match &event {
            ThreadEvent::Opened { discussion } => {
                tracing::info!("Opened discussion {}", discussion);
            }
            ThreadEvent::Live { discussion } => {
                tracing::debug!("Discussion {} is live", discussion);
            }
            ThreadEvent::FetchFailed { discussion, error } => {
                self.ctx.notices.publish(
                    NoticeKind::FetchFailed,
                    format!("could not load comments of {discussion}: {error}"),
                );
            }
            ThreadEvent::Degraded { discussion, error } => {
                tracing::warn!("Live updates for {} unavailable: {}", discussion, error);
                self.ctx.notices.publish(
                    NoticeKind::ChannelDegraded,
                    format!("live updates for {discussion} unavailable: {error}"),
                );
            }
            ThreadEvent::Closed { discussion } => {
                if inner
                    .list
                    .as_ref()
                    .is_some_and(|list| list.discussion() == discussion)
                {
                    inner.list = None;
                }
                inner.viewport.reset();
                inner.draft.clear();
                inner.edit = None;
                tracing::info!("Closed discussion {}", discussion);
            }
        }
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn signal(&self, signal: ViewportSignal) {
        if signal != ViewportSignal::None {
            let _ = self.signals.send(signal);
        }
    }
}
