//! DiscussionSession - the handle an application holds for one signed-in
//! viewer.
//!
//! A session is constructed when the discussion view mounts and dropped when
//! it unmounts. It owns the shared state and hands out the three components
//! built over it:
//!
//! - [`Feed`] for the paginated discussion list
//! - [`MutationCoordinator`] for like, pin, edit and delete on posts
//! - [`CommentStream`] for the open discussion's comment thread

use feed_core::{Profile, ProfileResolver, ResolvedAuthor, Viewer};
use feed_types::AuthorRef;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::channel::PushChannel;
use crate::config::{ClientConfig, ConfigError};
use crate::context::FeedContext;
use crate::coordinator::MutationCoordinator;
use crate::error::ClientError;
use crate::feed::Feed;
use crate::notice::Notice;
use crate::service::{MutationService, ReadService};
use crate::stream::CommentStream;

/// Entry point of the feed client.
pub struct DiscussionSession {
    context: FeedContext,
    config: ClientConfig,
    feed: Feed,
    coordinator: MutationCoordinator,
    comments: CommentStream,
}

impl DiscussionSession {
    /// Create a session for `viewer` over the given collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is out of range.
    pub fn new(
        config: ClientConfig,
        viewer: Viewer,
        reader: Arc<dyn ReadService>,
        writer: Arc<dyn MutationService>,
        channel: Arc<dyn PushChannel>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        tracing::info!("Starting discussion session for {}", viewer.id);
        let context = FeedContext::new(viewer);
        let feed = Feed::new(Arc::clone(&reader), &context, config.feed.page_size);
        let coordinator = MutationCoordinator::new(Arc::clone(&writer), &context);
        let comments = CommentStream::new(&context, reader, writer, channel, &config);

        Ok(Self {
            context,
            config,
            feed,
            coordinator,
            comments,
        })
    }

    /// The discussion feed.
    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    /// Post mutations.
    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    /// The open discussion's comment thread.
    pub fn comments(&self) -> &CommentStream {
        &self.comments
    }

    /// The active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// User-visible notices published from now on.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.context.notices.subscribe()
    }

    /// The signed-in user.
    pub async fn viewer(&self) -> Viewer {
        self.context.viewer.read().await.clone()
    }

    /// A discussion was created elsewhere in the application: reload page 1
    /// so it shows first.
    pub async fn on_post_created(&self) -> Result<usize, ClientError> {
        tracing::debug!("Discussion created, refreshing feed");
        self.feed.refresh().await
    }

    /// Replace the viewer's session profile (e.g. after an avatar upload).
    /// The new profile wins over any cached copy from now on.
    pub async fn update_viewer_profile(&self, profile: Profile) {
        let mut viewer = self.context.viewer.write().await;
        viewer.profile = profile.with_role(viewer.role);
        tracing::debug!("Updated session profile of {}", viewer.id);
    }

    /// Display data for an author.
    pub async fn resolve_author(&self, author: &AuthorRef) -> ResolvedAuthor {
        let viewer = self.context.viewer.read().await;
        let profiles = self.context.profiles.lock().await;
        ProfileResolver::new(Some(&*viewer), &*profiles).resolve(author)
    }

    /// Close the open discussion, if any.
    pub async fn close(&self) {
        self.comments.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockChannel;
    use crate::service::{MockBackend, Op};
    use crate::testing::{comment, post};
    use feed_types::{AuthorSnapshot, Comment, PostId, Role, UserId};

    fn session(
        backend: &MockBackend,
        config: ClientConfig,
    ) -> Result<DiscussionSession, ConfigError> {
        DiscussionSession::new(
            config,
            Viewer::new("me", Role::Member, Profile::new("Mona Lisa")),
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
            Arc::new(MockChannel::new()),
        )
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = ClientConfig::default();
        config.comments.page_size = 0;
        assert!(matches!(
            session(&MockBackend::new(), config),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn post_created_refreshes_feed() {
        let backend = MockBackend::new();
        backend.add_post(post("old", 1));
        let session = session(&backend, ClientConfig::default()).unwrap();
        session.feed().load_page(1).await.unwrap();

        backend.prepend_post(post("new", 9));
        session.on_post_created().await.unwrap();

        let view = session.feed().sorted_view().await;
        assert_eq!(view[0].id, PostId::new("new"));
        assert_eq!(backend.call_count(Op::ListDiscussions), 2);
    }

    #[tokio::test]
    async fn fresh_viewer_profile_wins_over_harvested_copy() {
        let backend = MockBackend::new();
        backend.add_post(post("d1", 1));
        let stale = AuthorSnapshot::named("Mona Lisa")
            .with_id("me")
            .with_avatar("old.png");
        backend.add_comment(Comment {
            author: AuthorRef::Inline(stale),
            ..comment("c1", "d1", 1)
        });
        let session = session(&backend, ClientConfig::default()).unwrap();
        session.comments().open(PostId::new("d1")).await;

        session
            .update_viewer_profile(Profile::new("Mona Lisa").with_avatar("new.png"))
            .await;

        let resolved = session
            .resolve_author(&AuthorRef::Id(UserId::new("me")))
            .await;
        assert_eq!(resolved.avatar_url.as_deref(), Some("new.png"));
        assert_eq!(resolved.initials, "ML");
        assert_eq!(session.viewer().await.profile.role, Role::Member);
    }

    #[tokio::test]
    async fn harvested_profiles_resolve_other_authors() {
        let backend = MockBackend::new();
        backend.add_post(post("d1", 1));
        backend.add_comment(Comment {
            author: AuthorRef::Inline(
                AuthorSnapshot::named("Grace Hopper")
                    .with_id("grace")
                    .with_avatar(""),
            ),
            ..comment("c1", "d1", 1)
        });
        let session = session(&backend, ClientConfig::default()).unwrap();
        session.comments().open(PostId::new("d1")).await;

        let grace = session
            .resolve_author(&AuthorRef::Id(UserId::new("grace")))
            .await;
        assert_eq!(grace.display_name, "Grace Hopper");
        assert_eq!(grace.avatar_url, None);

        let unknown = session
            .resolve_author(&AuthorRef::Id(UserId::new("ghost")))
            .await;
        assert_eq!(unknown.display_name, "Anonymous");
    }
}
