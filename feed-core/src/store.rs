//! Feed store for the discussion feed.
//!
//! The store holds discussion posts in **retrieval order**: the order in which
//! pages arrived from the backend. Display order (pinned first, then newest
//! first) is a projection computed by [`FeedStore::sorted_view`] on every
//! read, so a "load more" append always lands after what is already held.

use feed_types::{DiscussionPost, Page, PostId};
use std::cmp::Ordering;

/// Paginated collection of discussion posts.
#[derive(Debug, Clone, Default)]
pub struct FeedStore {
    /// Posts in retrieval order.
    posts: Vec<DiscussionPost>,
    /// Highest page number applied (0 = nothing loaded).
    pages_loaded: u32,
    /// Whether the backend reported another page after the last one.
    has_more: bool,
}

impl FeedStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a page fetched from the backend.
    ///
    /// Page 1 (the initial load or a refresh) replaces the held collection.
    /// Any later page is a continuation and is appended; posts already held
    /// are skipped, since the backend may shift page boundaries when new
    /// posts are created between requests.
    ///
    /// Returns the number of posts added.
    pub fn apply_page(&mut self, page_number: u32, page: Page<DiscussionPost>) -> usize {
        let added = if page_number <= 1 {
            self.posts = Vec::with_capacity(page.items.len());
            let mut added = 0;
            for post in page.items {
                if !self.contains(&post.id) {
                    self.posts.push(post);
                    added += 1;
                }
            }
            added
        } else {
            let before = self.posts.len();
            for post in page.items {
                if !self.contains(&post.id) {
                    self.posts.push(post);
                }
            }
            self.posts.len() - before
        };

        self.pages_loaded = page_number.max(1);
        self.has_more = page.has_next_page;
        added
    }

    /// Page number to request for a "load more" continuation.
    pub fn next_page(&self) -> u32 {
        self.pages_loaded + 1
    }

    /// Whether the backend reported more pages.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Whether at least one page has been applied.
    pub fn is_loaded(&self) -> bool {
        self.pages_loaded > 0
    }

    /// Number of posts held.
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Posts in retrieval order.
    pub fn posts(&self) -> &[DiscussionPost] {
        &self.posts
    }

    /// Posts in display order: pinned before unpinned, then newest first.
    ///
    /// Recomputed on every call; the stored order is never touched.
    pub fn sorted_view(&self) -> Vec<&DiscussionPost> {
        let mut view: Vec<&DiscussionPost> = self.posts.iter().collect();
        view.sort_by(|a, b| display_order(a, b));
        view
    }

    /// Check whether a post is held.
    pub fn contains(&self, id: &PostId) -> bool {
        self.posts.iter().any(|p| &p.id == id)
    }

    /// Look up a post.
    pub fn get(&self, id: &PostId) -> Option<&DiscussionPost> {
        self.posts.iter().find(|p| &p.id == id)
    }

    /// Look up a post for mutation.
    pub fn get_mut(&mut self, id: &PostId) -> Option<&mut DiscussionPost> {
        self.posts.iter_mut().find(|p| &p.id == id)
    }

    /// Merge an authoritative post from the backend.
    ///
    /// Replaces the held copy in place, or inserts at the front when the post
    /// is not held yet (a post created after the first page was fetched).
    pub fn apply_server_post(&mut self, post: DiscussionPost) {
        match self.posts.iter_mut().find(|p| p.id == post.id) {
            Some(existing) => *existing = post,
            None => self.posts.insert(0, post),
        }
    }

    /// Remove a post. Returns the removed post, if it was held.
    pub fn remove_post(&mut self, id: &PostId) -> Option<DiscussionPost> {
        let index = self.posts.iter().position(|p| &p.id == id)?;
        Some(self.posts.remove(index))
    }

    /// Provisionally adjust a post's comment count, flooring at zero.
    ///
    /// Returns the new count, or `None` if the post is not held.
    pub fn adjust_comment_count(&mut self, id: &PostId, delta: i64) -> Option<u32> {
        let post = self.get_mut(id)?;
        let next = (i64::from(post.comment_count) + delta).clamp(0, i64::from(u32::MAX));
        post.comment_count = next as u32;
        Some(post.comment_count)
    }

    /// Overwrite a post's comment count with an authoritative value.
    pub fn set_comment_count(&mut self, id: &PostId, count: u32) -> bool {
        match self.get_mut(id) {
            Some(post) => {
                post.comment_count = count;
                true
            }
            None => false,
        }
    }
}

/// Display ordering: pinned desc, then created_at desc.
fn display_order(a: &DiscussionPost, b: &DiscussionPost) -> Ordering {
    b.is_pinned
        .cmp(&a.is_pinned)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use feed_types::{AuthorRef, UserId};
    use proptest::prelude::*;

    fn make_post(id: &str, pinned: bool, secs: i64) -> DiscussionPost {
        DiscussionPost {
            id: PostId::new(id),
            title: format!("title {id}"),
            body: String::new(),
            author: AuthorRef::Id(UserId::new("u1")),
            category: "general".into(),
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            is_pinned: pinned,
            likes_count: 0,
            is_liked: false,
            comment_count: 0,
            attachments: vec![],
        }
    }

    fn ids(posts: &[&DiscussionPost]) -> Vec<String> {
        posts.iter().map(|p| p.id.to_string()).collect()
    }

    // ===========================================
    // Pagination Tests
    // ===========================================

    #[test]
    fn starts_unloaded() {
        let store = FeedStore::new();
        assert!(!store.is_loaded());
        assert!(store.is_empty());
        assert_eq!(store.next_page(), 1);
    }

    #[test]
    fn first_page_replaces() {
        let mut store = FeedStore::new();
        store.apply_page(1, Page::new(vec![make_post("a", false, 1)], true));
        store.apply_page(1, Page::new(vec![make_post("b", false, 2)], false));

        assert_eq!(store.len(), 1);
        assert_eq!(store.posts()[0].id, PostId::new("b"));
        assert!(!store.has_more());
    }

    #[test]
    fn continuation_appends_in_retrieval_order() {
        let mut store = FeedStore::new();
        store.apply_page(1, Page::new(vec![make_post("a", false, 5)], true));
        let added = store.apply_page(2, Page::new(vec![make_post("b", false, 9)], false));

        assert_eq!(added, 1);
        let order: Vec<_> = store.posts().iter().map(|p| p.id.to_string()).collect();
        assert_eq!(order, vec!["a", "b"]);
        assert_eq!(store.next_page(), 3);
    }

    #[test]
    fn continuation_skips_posts_already_held() {
        let mut store = FeedStore::new();
        store.apply_page(
            1,
            Page::new(vec![make_post("a", false, 3), make_post("b", false, 2)], true),
        );
        // A new post shifted the backend's pages by one.
        let added = store.apply_page(
            2,
            Page::new(vec![make_post("b", false, 2), make_post("c", false, 1)], false),
        );

        assert_eq!(added, 1);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn has_more_tracks_last_page() {
        let mut store = FeedStore::new();
        store.apply_page(1, Page::new(vec![make_post("a", false, 1)], true));
        assert!(store.has_more());
        store.apply_page(2, Page::last(vec![]));
        assert!(!store.has_more());
    }

    // ===========================================
    // Sorted View Tests
    // ===========================================

    #[test]
    fn sorted_view_puts_pinned_first_then_newest() {
        let mut store = FeedStore::new();
        store.apply_page(
            1,
            Page::last(vec![
                make_post("old", false, 1),
                make_post("pinned-old", true, 2),
                make_post("new", false, 10),
                make_post("pinned-new", true, 5),
            ]),
        );

        assert_eq!(
            ids(&store.sorted_view()),
            vec!["pinned-new", "pinned-old", "new", "old"]
        );
    }

    #[test]
    fn sorted_view_does_not_mutate_storage() {
        let mut store = FeedStore::new();
        store.apply_page(
            1,
            Page::last(vec![make_post("a", false, 1), make_post("b", true, 2)]),
        );
        let _ = store.sorted_view();

        let order: Vec<_> = store.posts().iter().map(|p| p.id.to_string()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    // ===========================================
    // Merge Tests
    // ===========================================

    #[test]
    fn apply_server_post_replaces_in_place() {
        let mut store = FeedStore::new();
        store.apply_page(
            1,
            Page::last(vec![make_post("a", false, 1), make_post("b", false, 2)]),
        );
        let mut updated = make_post("b", true, 2);
        updated.likes_count = 7;
        store.apply_server_post(updated);

        assert_eq!(store.posts()[1].likes_count, 7);
        assert!(store.posts()[1].is_pinned);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn apply_server_post_inserts_unknown_at_front() {
        let mut store = FeedStore::new();
        store.apply_page(1, Page::last(vec![make_post("a", false, 1)]));
        store.apply_server_post(make_post("z", false, 50));

        assert_eq!(store.posts()[0].id, PostId::new("z"));
    }

    #[test]
    fn remove_post_filters_it_out() {
        let mut store = FeedStore::new();
        store.apply_page(1, Page::last(vec![make_post("a", false, 1)]));

        assert!(store.remove_post(&PostId::new("a")).is_some());
        assert!(store.remove_post(&PostId::new("a")).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn comment_count_floors_at_zero() {
        let mut store = FeedStore::new();
        store.apply_page(1, Page::last(vec![make_post("a", false, 1)]));
        let id = PostId::new("a");

        assert_eq!(store.adjust_comment_count(&id, 1), Some(1));
        assert_eq!(store.adjust_comment_count(&id, -1), Some(0));
        assert_eq!(store.adjust_comment_count(&id, -1), Some(0));
        assert_eq!(store.adjust_comment_count(&PostId::new("x"), 1), None);
    }

    // ===========================================
    // Property Tests
    // ===========================================

    fn arb_posts() -> impl Strategy<Value = Vec<DiscussionPost>> {
        prop::collection::vec((any::<bool>(), 0i64..1_000), 0..40).prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (pinned, secs))| make_post(&format!("p{i}"), pinned, secs))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn sorted_view_orders_pinned_then_descending(posts in arb_posts()) {
            let mut store = FeedStore::new();
            store.apply_page(1, Page::last(posts));
            let view = store.sorted_view();

            for pair in view.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                prop_assert!(a.is_pinned >= b.is_pinned);
                if a.is_pinned == b.is_pinned {
                    prop_assert!(a.created_at >= b.created_at);
                }
            }
        }

        #[test]
        fn paged_load_matches_single_load(posts in arb_posts(), split in 0usize..40) {
            let split = split.min(posts.len());

            let mut paged = FeedStore::new();
            paged.apply_page(1, Page::new(posts[..split].to_vec(), true));
            paged.apply_page(2, Page::last(posts[split..].to_vec()));

            let mut whole = FeedStore::new();
            whole.apply_page(1, Page::last(posts.clone()));

            prop_assert_eq!(paged.posts(), whole.posts());
        }
    }
}
