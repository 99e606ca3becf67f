//! Author profile resolution.
//!
//! Resolution order for an author, most specific first:
//!
//! 1. the viewer's own session profile, when the author is the viewer
//! 2. a profile harvested from earlier discussion/comment payloads
//! 3. the inline author snapshot carried on the payload itself
//! 4. "Anonymous"
//!
//! Initials are always derived from whichever display name won.

use feed_types::{normalized_avatar, AuthorRef, AuthorSnapshot, Role, UserId};
use std::collections::HashMap;

use crate::policy::Viewer;

const ANONYMOUS: &str = "Anonymous";

/// Display data for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Display name.
    pub display_name: String,
    /// Avatar URL, `None` when absent (never `""`).
    pub avatar_url: Option<String>,
    /// Role badge.
    pub role: Role,
}

impl Profile {
    /// Create a member profile with no avatar.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            avatar_url: None,
            role: Role::Member,
        }
    }

    /// Set the avatar, normalizing `""` to absent.
    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.avatar_url = normalized_avatar(Some(&url)).map(str::to_string);
        self
    }

    /// Set the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Build from an inline snapshot. `None` if the snapshot has no name.
    pub fn from_snapshot(snapshot: &AuthorSnapshot) -> Option<Self> {
        let name = snapshot.name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            display_name: name.to_string(),
            avatar_url: snapshot.avatar().map(str::to_string),
            role: snapshot.role.unwrap_or_default(),
        })
    }
}

/// Best-effort lookup from user id to profile.
pub trait ProfileSource {
    /// Look up a profile. `None` is a normal answer.
    fn profile(&self, id: &UserId) -> Option<Profile>;
}

/// Profiles harvested from payloads during this session. Never expires.
#[derive(Debug, Clone, Default)]
pub struct ProfileCache {
    entries: HashMap<UserId, Profile>,
}

impl ProfileCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the inline snapshot of an author, if it names its user.
    ///
    /// Returns `true` when an entry was written.
    pub fn harvest(&mut self, author: &AuthorRef) -> bool {
        let Some(snapshot) = author.snapshot() else {
            return false;
        };
        let (Some(id), Some(profile)) = (snapshot.id.as_ref(), Profile::from_snapshot(snapshot))
        else {
            return false;
        };
        self.entries.insert(id.clone(), profile);
        true
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, id: UserId, profile: Profile) {
        self.entries.insert(id, profile);
    }

    /// Look up an entry.
    pub fn get(&self, id: &UserId) -> Option<&Profile> {
        self.entries.get(id)
    }

    /// Number of cached profiles.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProfileSource for ProfileCache {
    fn profile(&self, id: &UserId) -> Option<Profile> {
        self.entries.get(id).cloned()
    }
}

/// Resolved display data for an author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAuthor {
    /// Avatar URL, `None` when absent.
    pub avatar_url: Option<String>,
    /// Display name.
    pub display_name: String,
    /// Initials for the avatar placeholder.
    pub initials: String,
    /// Role badge.
    pub role: Role,
}

impl ResolvedAuthor {
    fn from_profile(profile: Profile) -> Self {
        let avatar_url = normalized_avatar(profile.avatar_url.as_deref()).map(str::to_string);
        Self {
            initials: initials(&profile.display_name),
            avatar_url,
            display_name: profile.display_name,
            role: profile.role,
        }
    }

    fn anonymous() -> Self {
        Self::from_profile(Profile::new(ANONYMOUS))
    }
}

/// Resolves authors through the fallback chain.
pub struct ProfileResolver<'a> {
    viewer: Option<&'a Viewer>,
    source: &'a dyn ProfileSource,
}

impl<'a> ProfileResolver<'a> {
    /// Create a resolver.
    pub fn new(viewer: Option<&'a Viewer>, source: &'a dyn ProfileSource) -> Self {
        Self { viewer, source }
    }

    /// Resolve display data for an author.
    pub fn resolve(&self, author: &AuthorRef) -> ResolvedAuthor {
        if let Some(id) = author.user_id() {
            if let Some(viewer) = self.viewer.filter(|v| &v.id == id) {
                return ResolvedAuthor::from_profile(viewer.profile.clone());
            }
            if let Some(profile) = self.source.profile(id) {
                return ResolvedAuthor::from_profile(profile);
            }
        }

        author
            .snapshot()
            .and_then(Profile::from_snapshot)
            .map(ResolvedAuthor::from_profile)
            .unwrap_or_else(ResolvedAuthor::anonymous)
    }
}

/// Initials of a display name: first letter of the first and last words.
pub fn initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let first = words.first().and_then(|w| w.chars().next());
    let last = if words.len() > 1 {
        words.last().and_then(|w| w.chars().next())
    } else {
        None
    };

    let out: String = first
        .into_iter()
        .chain(last)
        .flat_map(char::to_uppercase)
        .collect();

    if out.is_empty() {
        "?".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer() -> Viewer {
        Viewer::new("me", Role::Member, Profile::new("Fresh Me").with_avatar("new.png"))
    }

    fn inline(id: Option<&str>, name: &str, avatar: &str) -> AuthorRef {
        let mut snapshot = AuthorSnapshot::named(name).with_avatar(avatar);
        snapshot.id = id.map(UserId::new);
        AuthorRef::Inline(snapshot)
    }

    #[test]
    fn viewer_profile_beats_cache() {
        let mut cache = ProfileCache::new();
        cache.insert(UserId::new("me"), Profile::new("Stale Me").with_avatar("old.png"));
        let viewer = viewer();
        let resolver = ProfileResolver::new(Some(&viewer), &cache);

        let resolved = resolver.resolve(&AuthorRef::Id(UserId::new("me")));
        assert_eq!(resolved.display_name, "Fresh Me");
        assert_eq!(resolved.avatar_url.as_deref(), Some("new.png"));
    }

    #[test]
    fn cache_beats_inline_snapshot() {
        let mut cache = ProfileCache::new();
        cache.insert(UserId::new("u1"), Profile::new("Cached Name"));
        let resolver = ProfileResolver::new(None, &cache);

        let resolved = resolver.resolve(&inline(Some("u1"), "Snapshot Name", "a.png"));
        assert_eq!(resolved.display_name, "Cached Name");
    }

    #[test]
    fn falls_back_to_snapshot() {
        let cache = ProfileCache::new();
        let resolver = ProfileResolver::new(None, &cache);

        let resolved = resolver.resolve(&inline(None, "Grace Hopper", "g.png"));
        assert_eq!(resolved.display_name, "Grace Hopper");
        assert_eq!(resolved.initials, "GH");
        assert_eq!(resolved.avatar_url.as_deref(), Some("g.png"));
    }

    #[test]
    fn unknown_id_is_anonymous() {
        let cache = ProfileCache::new();
        let resolver = ProfileResolver::new(None, &cache);

        let resolved = resolver.resolve(&AuthorRef::Id(UserId::new("ghost")));
        assert_eq!(resolved.display_name, "Anonymous");
        assert_eq!(resolved.initials, "A");
        assert!(resolved.avatar_url.is_none());
    }

    #[test]
    fn empty_avatar_is_absent() {
        let cache = ProfileCache::new();
        let resolver = ProfileResolver::new(None, &cache);

        let resolved = resolver.resolve(&inline(None, "Ada", ""));
        assert!(resolved.avatar_url.is_none());

        let profile = Profile::new("Ada").with_avatar("  ");
        assert!(profile.avatar_url.is_none());
    }

    #[test]
    fn harvest_requires_id_and_name() {
        let mut cache = ProfileCache::new();
        assert!(!cache.harvest(&AuthorRef::Id(UserId::new("u1"))));
        assert!(!cache.harvest(&inline(None, "No Id", "")));
        assert!(!cache.harvest(&inline(Some("u2"), "  ", "")));
        assert!(cache.harvest(&inline(Some("u3"), "Linus", "l.png")));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&UserId::new("u3")).unwrap().display_name, "Linus");
    }

    #[test]
    fn initials_cover_edge_cases() {
        assert_eq!(initials("ada lovelace"), "AL");
        assert_eq!(initials("Plato"), "P");
        assert_eq!(initials("Jean Claude Van Damme"), "JD");
        assert_eq!(initials("   "), "?");
        assert_eq!(initials("émile zola"), "ÉZ");
    }
}
