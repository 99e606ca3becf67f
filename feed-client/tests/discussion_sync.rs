//! End-to-end tests over a whole session, with the mock backend and push
//! channel standing in for the real collaborators.

use agora_feed_client::testing::{comment, post, post_by};
use agora_feed_client::{
    ClientConfig, ClientError, DiscussionSession, MockBackend, MockChannel, NoticeKind, Op,
    Outcome, ServiceError,
};
use feed_core::{CommentEntry, MutationKind, Profile, ScrollMetrics, Viewer, ViewportSignal};
use feed_types::{LikeState, PostContent, PostId, PushEvent, Role, UserId};
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct World {
    backend: MockBackend,
    channel: MockChannel,
    session: DiscussionSession,
}

fn world_with(viewer: Viewer, config: ClientConfig) -> World {
    init_tracing();
    let backend = MockBackend::new();
    backend.set_viewer(viewer.id.clone());
    let channel = MockChannel::new();
    let session = DiscussionSession::new(
        config,
        viewer,
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        Arc::new(channel.clone()),
    )
    .unwrap();
    World {
        backend,
        channel,
        session,
    }
}

fn world(viewer: Viewer) -> World {
    world_with(viewer, ClientConfig::default())
}

fn member(id: &str) -> Viewer {
    Viewer::new(id, Role::Member, Profile::new(id))
}

fn admin(id: &str) -> Viewer {
    Viewer::new(id, Role::Admin, Profile::new(id))
}

fn ids(entries: &[CommentEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| match e.stable_key() {
            Some(id) => id.as_str().to_string(),
            None => "pending".to_string(),
        })
        .collect()
}

async fn like_state(world: &World, id: &PostId) -> LikeState {
    world.session.feed().post(id).await.unwrap().like_state()
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ===========================================
// Optimistic post mutations
// ===========================================

#[tokio::test]
async fn like_commits_then_failed_toggle_restores_committed_state() {
    let w = world(member("me"));
    let mut p = post("p", 1);
    p.likes_count = 3;
    w.backend.add_post(p);
    w.session.feed().load_page(1).await.unwrap();
    let id = PostId::new("p");

    let gate = w.backend.hold(Op::ToggleLike);
    let coordinator = w.session.coordinator().clone();
    let target = id.clone();
    let first = tokio::spawn(async move { coordinator.toggle_like(&target).await });
    w.backend.wait_for_calls(Op::ToggleLike, 1).await;
    assert_eq!(
        like_state(&w, &id).await,
        LikeState {
            is_liked: true,
            likes_count: 4
        }
    );
    gate.release();
    assert_eq!(
        first.await.unwrap().unwrap(),
        Outcome::Committed(LikeState {
            is_liked: true,
            likes_count: 4
        })
    );

    let gate = w.backend.hold(Op::ToggleLike);
    w.backend
        .fail_next(Op::ToggleLike, ServiceError::Network("timeout".into()));
    let coordinator = w.session.coordinator().clone();
    let target = id.clone();
    let second = tokio::spawn(async move { coordinator.toggle_like(&target).await });
    w.backend.wait_for_calls(Op::ToggleLike, 2).await;
    assert_eq!(
        like_state(&w, &id).await,
        LikeState {
            is_liked: false,
            likes_count: 3
        }
    );
    gate.release();
    let err = second.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ClientError::Mutation {
            action: MutationKind::Like,
            ..
        }
    ));

    assert_eq!(
        like_state(&w, &id).await,
        LikeState {
            is_liked: true,
            likes_count: 4
        }
    );
}

#[tokio::test]
async fn failed_mutations_leave_posts_exactly_as_before() {
    let w = world(admin("boss"));
    let shapes = [
        (false, 0, false),
        (true, 1, true),
        (false, 7, false),
        (true, 42, true),
    ];
    for (i, (liked, likes, pinned)) in shapes.into_iter().enumerate() {
        let mut p = post_by(&format!("p{i}"), "boss", i as i64);
        p.is_liked = liked;
        p.likes_count = likes;
        p.is_pinned = pinned;
        w.backend.add_post(p);
    }
    w.session.feed().load_page(1).await.unwrap();
    let before = w.session.feed().posts().await;

    for p in &before {
        w.backend
            .fail_next(Op::ToggleLike, ServiceError::Network("reset".into()));
        assert!(w.session.coordinator().toggle_like(&p.id).await.is_err());

        w.backend.fail_next(
            Op::TogglePin,
            ServiceError::Backend {
                status: 500,
                message: "boom".into(),
            },
        );
        assert!(w.session.coordinator().toggle_pin(&p.id).await.is_err());

        w.backend
            .fail_next(Op::UpdateDiscussion, ServiceError::Network("reset".into()));
        assert!(w
            .session
            .coordinator()
            .edit_post(&p.id, PostContent::new("new title", "new body"))
            .await
            .is_err());

        w.backend
            .fail_next(Op::DeleteDiscussion, ServiceError::Network("reset".into()));
        assert!(w.session.coordinator().delete_post(&p.id).await.is_err());
    }

    assert_eq!(w.session.feed().posts().await, before);
}

#[tokio::test]
async fn concurrent_toggles_on_one_post_dispatch_once() {
    let w = world(member("me"));
    w.backend.add_post(post("p", 1));
    w.session.feed().load_page(1).await.unwrap();
    let id = PostId::new("p");

    let gate = w.backend.hold(Op::ToggleLike);
    let coordinator = w.session.coordinator().clone();
    let target = id.clone();
    let first = tokio::spawn(async move { coordinator.toggle_like(&target).await });
    w.backend.wait_for_calls(Op::ToggleLike, 1).await;

    let second = w.session.coordinator().toggle_like(&id).await.unwrap();
    assert!(second.is_ignored());

    gate.release();
    assert!(matches!(
        first.await.unwrap().unwrap(),
        Outcome::Committed(_)
    ));
    assert_eq!(w.backend.call_count(Op::ToggleLike), 1);
    assert_eq!(
        like_state(&w, &id).await,
        LikeState {
            is_liked: true,
            likes_count: 1
        }
    );
}

#[tokio::test]
async fn non_author_edit_is_refused_without_a_request() {
    let w = world(member("me"));
    w.backend.add_post(post_by("p", "someone", 1));
    w.session.feed().load_page(1).await.unwrap();
    let mut notices = w.session.notices();
    let id = PostId::new("p");

    let err = w
        .session
        .coordinator()
        .edit_post(&id, PostContent::new("mine now", "body"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ClientError::AuthorizationDenied {
            action: MutationKind::EditPost
        }
    ));
    assert_eq!(w.backend.call_count(Op::UpdateDiscussion), 0);
    assert_eq!(w.session.feed().post(&id).await.unwrap().title, "Title p");
    assert_eq!(notices.recv().await.unwrap().kind, NoticeKind::Denied);
}

#[tokio::test]
async fn admin_pins_to_top_and_deletes_after_confirmation() {
    let w = world(admin("boss"));
    w.backend.add_post(post("new", 9));
    w.backend.add_post(post("old", 1));
    w.session.feed().load_page(1).await.unwrap();
    let old = PostId::new("old");

    w.session.coordinator().toggle_pin(&old).await.unwrap();
    assert_eq!(w.session.feed().sorted_view().await[0].id, old);

    let gate = w.backend.hold(Op::DeleteDiscussion);
    let coordinator = w.session.coordinator().clone();
    let target = old.clone();
    let delete = tokio::spawn(async move { coordinator.delete_post(&target).await });
    w.backend.wait_for_calls(Op::DeleteDiscussion, 1).await;
    assert!(w.session.feed().post(&old).await.is_some());

    gate.release();
    delete.await.unwrap().unwrap();
    assert!(w.session.feed().post(&old).await.is_none());
    assert_eq!(w.session.feed().len().await, 1);
}

// ===========================================
// Feed pagination
// ===========================================

#[tokio::test]
async fn paged_loading_keeps_retrieval_order() {
    let mut small = ClientConfig::default();
    small.feed.page_size = 3;
    let paged = world_with(member("me"), small);
    let whole = world(member("me"));

    for w in [&paged, &whole] {
        for (i, secs) in [5, 9, 1, 7, 3, 8, 2].into_iter().enumerate() {
            let mut p = post(&format!("p{i}"), secs);
            p.is_pinned = i == 4;
            w.backend.add_post(p);
        }
    }

    paged.session.feed().load_page(1).await.unwrap();
    while paged.session.feed().has_more().await {
        paged.session.feed().load_more().await.unwrap();
    }
    whole.session.feed().load_page(1).await.unwrap();

    let order = |posts: Vec<feed_types::DiscussionPost>| {
        posts
            .into_iter()
            .map(|p| p.id.as_str().to_string())
            .collect::<Vec<_>>()
    };
    let paged_posts = order(paged.session.feed().posts().await);
    assert_eq!(paged_posts, vec!["p0", "p1", "p2", "p3", "p4", "p5", "p6"]);
    assert_eq!(paged_posts, order(whole.session.feed().posts().await));
    assert_eq!(paged.backend.call_count(Op::ListDiscussions), 3);

    assert_eq!(
        order(paged.session.feed().sorted_view().await),
        vec!["p4", "p1", "p5", "p3", "p0", "p6", "p2"]
    );
}

// ===========================================
// Comment threads
// ===========================================

#[tokio::test]
async fn comment_round_trip_with_push_echo() {
    let w = world(member("me"));
    w.backend.add_post(post("d", 0));
    w.backend.add_comment(comment("c1", "d", 1));
    w.backend.add_comment(comment("c2", "d", 2));
    w.session.feed().load_page(1).await.unwrap();
    let d = PostId::new("d");
    let comments = w.session.comments();

    comments.open(d.clone()).await;
    assert_eq!(ids(&comments.comments().await), vec!["c1", "c2"]);
    assert!(w.channel.is_subscribed(&d));
    assert_eq!(
        comments
            .on_layout(ScrollMetrics {
                scroll_top: 0.0,
                viewport_height: 400.0,
                content_height: 900.0,
            })
            .await,
        ViewportSignal::ScrollToBottom
    );

    comments.set_draft("hello").await;
    let Outcome::Committed(created) = comments.submit_comment().await.unwrap() else {
        panic!("submit was ignored");
    };
    assert!(created.author.is_user(&UserId::new("me")));
    assert_eq!(comments.draft().await, "");
    assert_eq!(
        ids(&comments.comments().await),
        vec!["c1", "c2", created.id.as_str()]
    );

    assert!(w.channel.publish(
        &d,
        &PushEvent::CommentCreated {
            discussion_id: d.clone(),
            comment: created.clone(),
        }
    ));
    settle().await;

    let shown = comments.comments().await;
    assert_eq!(shown.len(), 3);
    assert_eq!(shown[2].body(), "hello");
    assert_eq!(
        w.session.feed().post(&d).await.unwrap().comment_count,
        3
    );

    let author = w.session.resolve_author(&created.author).await;
    assert_eq!(author.display_name, "me");
}

#[tokio::test(start_paused = true)]
async fn fallback_refetch_converges_with_backend() {
    let w = world(member("me"));
    w.backend.add_post(post("d", 0));
    w.backend.add_comment(comment("c1", "d", 1));
    w.session.feed().load_page(1).await.unwrap();
    let d = PostId::new("d");
    let comments = w.session.comments();

    comments.open(d.clone()).await;
    comments.set_draft("mine").await;
    comments.submit_comment().await.unwrap();

    // Changes the push channel never delivered.
    w.backend.remove_comment(&feed_types::CommentId::new("c1"));
    w.backend.add_comment(comment("c5", "d", 50));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    settle().await;

    let expected: Vec<String> = w
        .backend
        .comments(&d)
        .into_iter()
        .map(|c| c.id.as_str().to_string())
        .collect();
    assert_eq!(ids(&comments.comments().await), expected);
    assert_eq!(w.backend.call_count(Op::ListComments), 2);
}

#[tokio::test(start_paused = true)]
async fn degraded_thread_still_heals_through_refetch() {
    let w = world(member("me"));
    w.backend.add_post(post("d", 0));
    w.session.feed().load_page(1).await.unwrap();
    w.channel.fail_next_subscribe("unavailable");
    let mut notices = w.session.notices();
    let d = PostId::new("d");
    let comments = w.session.comments();

    comments.open(d.clone()).await;
    assert!(comments.is_degraded().await);
    assert_eq!(
        notices.recv().await.unwrap().kind,
        NoticeKind::ChannelDegraded
    );

    comments.set_draft("anyone there?").await;
    comments.submit_comment().await.unwrap();
    w.backend.add_comment(comment("c9", "d", 100));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    settle().await;

    let shown = ids(&comments.comments().await);
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[1], "c9");

    comments.resubscribe().await.unwrap();
    assert!(!comments.is_degraded().await);
    assert!(w.channel.is_subscribed(&d));
}

#[tokio::test]
async fn closing_the_session_detaches_the_thread() {
    let w = world(member("me"));
    w.backend.add_post(post("d", 0));
    w.backend.add_comment(comment("c1", "d", 1));
    let d = PostId::new("d");

    w.session.comments().open(d.clone()).await;
    assert!(w.channel.is_subscribed(&d));

    w.session.close().await;
    assert!(!w.channel.is_subscribed(&d));
    assert_eq!(w.session.comments().discussion().await, None);

    assert!(!w.channel.publish(
        &d,
        &PushEvent::CommentCreated {
            discussion_id: d.clone(),
            comment: comment("c2", "d", 2),
        }
    ));
    assert!(w.session.comments().comments().await.is_empty());
}
