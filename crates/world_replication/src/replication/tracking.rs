//! Which client knows which object.

use crate::grid::ClientView;
use crate::types::ObjectGuid;
use std::collections::{HashMap, HashSet};

/// Observer tracking sets of one map, indexed in both directions.
///
/// `observer -> objects` is what a client has in its object cache;
/// `object -> observers` answers who must receive a values or destroy block.
/// Both sides are only ever changed together.
#[derive(Debug, Default)]
pub struct TrackingRegistry {
    known: HashMap<ObjectGuid, HashSet<ObjectGuid>>,
    trackers: HashMap<ObjectGuid, HashSet<ObjectGuid>>,
}

impl TrackingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `observer` received a create block for `object`.
    ///
    /// Returns `false` when the pair was already tracked.
    pub fn track(&mut self, observer: ObjectGuid, object: ObjectGuid) -> bool {
        if !self.known.entry(observer).or_default().insert(object) {
            return false;
        }
        self.trackers.entry(object).or_default().insert(observer);
        true
    }

    /// Forgets the pair; returns `false` when it was not tracked.
    pub fn untrack(&mut self, observer: ObjectGuid, object: ObjectGuid) -> bool {
        let Some(objects) = self.known.get_mut(&observer) else {
            return false;
        };
        let removed = objects.remove(&object);
        if objects.is_empty() {
            self.known.remove(&observer);
        }
        if removed {
            if let Some(observers) = self.trackers.get_mut(&object) {
                observers.remove(&observer);
                if observers.is_empty() {
                    self.trackers.remove(&object);
                }
            }
        }
        removed
    }

    pub fn knows(&self, observer: ObjectGuid, object: ObjectGuid) -> bool {
        self.known.get(&observer).is_some_and(|objects| objects.contains(&object))
    }

    /// Tracking set of `observer`.
    pub fn known_by(&self, observer: ObjectGuid) -> Option<&HashSet<ObjectGuid>> {
        self.known.get(&observer)
    }

    /// Observers tracking `object`.
    pub fn trackers_of(&self, object: ObjectGuid) -> Option<&HashSet<ObjectGuid>> {
        self.trackers.get(&object)
    }

    /// Observers tracking `object`, sorted.
    pub fn sorted_trackers(&self, object: ObjectGuid) -> Vec<ObjectGuid> {
        let mut observers: Vec<ObjectGuid> = self
            .trackers
            .get(&object)
            .map(|observers| observers.iter().copied().collect())
            .unwrap_or_default();
        observers.sort();
        observers
    }

    /// Drops the whole tracking set of an observer leaving the map.
    pub fn remove_observer(&mut self, observer: ObjectGuid) -> Vec<ObjectGuid> {
        let Some(objects) = self.known.remove(&observer) else {
            return Vec::new();
        };
        for object in &objects {
            if let Some(observers) = self.trackers.get_mut(object) {
                observers.remove(&observer);
                if observers.is_empty() {
                    self.trackers.remove(object);
                }
            }
        }
        objects.into_iter().collect()
    }

    /// Removes `object` from every tracking set, returning the former trackers
    /// sorted.
    pub fn remove_object(&mut self, object: ObjectGuid) -> Vec<ObjectGuid> {
        let Some(observers) = self.trackers.remove(&object) else {
            return Vec::new();
        };
        for observer in &observers {
            if let Some(objects) = self.known.get_mut(observer) {
                objects.remove(&object);
                if objects.is_empty() {
                    self.known.remove(observer);
                }
            }
        }
        let mut observers: Vec<ObjectGuid> = observers.into_iter().collect();
        observers.sort();
        observers
    }

    /// Number of observers with a non-empty tracking set.
    pub fn observer_count(&self) -> usize {
        self.known.len()
    }

    /// Number of objects tracked by at least one observer.
    pub fn tracked_object_count(&self) -> usize {
        self.trackers.len()
    }

    /// Number of tracked pairs.
    pub fn pair_count(&self) -> usize {
        self.known.values().map(HashSet::len).sum()
    }
}

impl ClientView for TrackingRegistry {
    fn has_at_client(&self, observer: ObjectGuid, object: ObjectGuid) -> bool {
        self.knows(observer, object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HighGuid;

    fn creature(counter: u64) -> ObjectGuid {
        ObjectGuid::create(HighGuid::Creature, 1, counter)
    }

    #[test]
    fn both_directions_stay_in_step() {
        let mut tracking = TrackingRegistry::new();
        let (a, b) = (ObjectGuid::player(1), ObjectGuid::player(2));
        assert!(tracking.track(a, creature(1)));
        assert!(!tracking.track(a, creature(1)));
        assert!(tracking.track(b, creature(1)));

        assert_eq!(tracking.sorted_trackers(creature(1)), vec![a, b]);
        assert!(tracking.untrack(a, creature(1)));
        assert!(!tracking.untrack(a, creature(1)));
        assert!(!tracking.knows(a, creature(1)));
        assert_eq!(tracking.sorted_trackers(creature(1)), vec![b]);
        assert_eq!(tracking.pair_count(), 1);
        assert_eq!(tracking.observer_count(), 1);
    }

    #[test]
    fn observer_churn_leaves_no_empty_sets() {
        let mut tracking = TrackingRegistry::new();
        let watched = ObjectGuid::player(1);
        for counter in 0..100 {
            let passer_by = creature(counter);
            tracking.track(watched, passer_by);
            tracking.track(passer_by, watched);
            assert!(tracking.untrack(passer_by, watched));
            assert_eq!(tracking.remove_object(passer_by), vec![watched]);
        }
        assert_eq!(tracking.observer_count(), 0);
        assert_eq!(tracking.tracked_object_count(), 0);
        assert!(tracking.known_by(watched).is_none());
    }

    #[test]
    fn removing_an_object_clears_every_set() {
        let mut tracking = TrackingRegistry::new();
        let (a, b) = (ObjectGuid::player(1), ObjectGuid::player(2));
        tracking.track(a, creature(1));
        tracking.track(b, creature(1));
        tracking.track(b, creature(2));

        assert_eq!(tracking.remove_object(creature(1)), vec![a, b]);
        assert!(tracking.trackers_of(creature(1)).is_none());
        assert_eq!(tracking.known_by(b).map(HashSet::len), Some(1));

        let mut forgotten = tracking.remove_observer(b);
        forgotten.sort();
        assert_eq!(forgotten, vec![creature(2)]);
        assert!(tracking.trackers_of(creature(2)).is_none());
        assert_eq!(tracking.pair_count(), 0);
    }
}
