//! Per-entity mutation lock.
//!
//! At most one mutation of a given kind may be in flight per entity. A second
//! attempt while one is outstanding is refused, not queued. The marker is
//! held by an [`InFlightGuard`] and cleared when the guard drops, whatever
//! the outcome of the call.

use dashmap::DashSet;
use feed_core::MutationKind;
use std::sync::Arc;

type Key = (MutationKind, String);

/// Set of (kind, entity id) pairs with a call outstanding.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    markers: Arc<DashSet<Key>>,
}

impl InFlight {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `(kind, entity)` as in flight. `None` if it already is.
    pub fn try_acquire(&self, kind: MutationKind, entity: &str) -> Option<InFlightGuard> {
        let key = (kind, entity.to_string());
        if !self.markers.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard {
            markers: Arc::clone(&self.markers),
            key,
        })
    }

    /// Whether `(kind, entity)` is in flight.
    pub fn is_in_flight(&self, kind: MutationKind, entity: &str) -> bool {
        self.markers.contains(&(kind, entity.to_string()))
    }

    /// Number of outstanding mutations.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Check if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

/// Clears its in-flight marker on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    markers: Arc<DashSet<Key>>,
    key: Key,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.markers.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused() {
        let in_flight = InFlight::new();
        let guard = in_flight.try_acquire(MutationKind::Like, "p1");
        assert!(guard.is_some());
        assert!(in_flight.try_acquire(MutationKind::Like, "p1").is_none());
    }

    #[test]
    fn kinds_and_entities_are_independent() {
        let in_flight = InFlight::new();
        let _like = in_flight.try_acquire(MutationKind::Like, "p1").unwrap();

        assert!(in_flight.try_acquire(MutationKind::Pin, "p1").is_some());
        assert!(in_flight.try_acquire(MutationKind::Like, "p2").is_some());
    }

    #[test]
    fn drop_clears_marker() {
        let in_flight = InFlight::new();
        {
            let _guard = in_flight.try_acquire(MutationKind::Like, "p1").unwrap();
            assert!(in_flight.is_in_flight(MutationKind::Like, "p1"));
        }
        assert!(in_flight.is_empty());
        assert!(in_flight.try_acquire(MutationKind::Like, "p1").is_some());
    }
}
