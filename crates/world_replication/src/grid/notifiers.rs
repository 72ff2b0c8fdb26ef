//! Visibility notifiers.
//!
//! Both notifiers compare what a walk finds visible with what is currently
//! tracked and report the difference as a [`VisibilityDiff`]; the caller turns
//! it into create and destroy blocks. Tracked objects the walk never reached
//! are evaluated directly when the notifier is finished, so an object leaving
//! the walked cells is treated like any other visibility loss.

use super::{GridNotifier, TypeMask};
use crate::entity::{EntityKind, ObjectAccessor, WorldObject};
use crate::types::ObjectGuid;
use crate::visibility::{DetectOptions, VisibilityRules};
use std::collections::HashSet;

/// Outcome of a visibility pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityDiff {
    /// Newly visible, in visit order.
    pub appeared: Vec<ObjectGuid>,
    /// No longer visible, sorted by GUID.
    pub vanished: Vec<ObjectGuid>,
    /// Number of visibility decisions taken.
    pub evaluations: u64,
}

impl VisibilityDiff {
    pub fn is_empty(&self) -> bool {
        self.appeared.is_empty() && self.vanished.is_empty()
    }
}

/// Bookkeeping shared by both notifiers.
struct DiffCollector<'a> {
    known: &'a HashSet<ObjectGuid>,
    evaluated: HashSet<ObjectGuid>,
    visible: HashSet<ObjectGuid>,
    appeared: Vec<ObjectGuid>,
    evaluations: u64,
}

impl<'a> DiffCollector<'a> {
    fn new(known: &'a HashSet<ObjectGuid>) -> Self {
        Self {
            known,
            evaluated: HashSet::new(),
            visible: HashSet::new(),
            appeared: Vec::new(),
            evaluations: 0,
        }
    }

    /// Evaluates `guid` once; later calls for the same GUID are ignored.
    fn evaluate(&mut self, guid: ObjectGuid, decide: impl FnOnce() -> bool) {
        if !self.evaluated.insert(guid) {
            return;
        }
        self.evaluations += 1;
        if decide() {
            self.visible.insert(guid);
            if !self.known.contains(&guid) {
                self.appeared.push(guid);
            }
        }
    }

    fn finish(mut self, mut decide: impl FnMut(ObjectGuid) -> bool) -> VisibilityDiff {
        let unvisited: Vec<ObjectGuid> = self
            .known
            .iter()
            .copied()
            .filter(|guid| !self.evaluated.contains(guid))
            .collect();
        for guid in unvisited {
            self.evaluate(guid, || decide(guid));
        }

        let mut vanished: Vec<ObjectGuid> = self
            .known
            .iter()
            .copied()
            .filter(|guid| !self.visible.contains(guid))
            .collect();
        vanished.sort();

        VisibilityDiff {
            appeared: self.appeared,
            vanished,
            evaluations: self.evaluations,
        }
    }
}

/// Recomputes what one player sees after it moved or changed.
///
/// `known` is the player's tracking set. The player itself is never part of
/// the diff.
pub struct PlayerRelocationNotifier<'a> {
    rules: &'a VisibilityRules,
    observer: &'a WorldObject,
    accessor: &'a dyn ObjectAccessor,
    diff: DiffCollector<'a>,
}

impl<'a> PlayerRelocationNotifier<'a> {
    pub fn new(
        rules: &'a VisibilityRules,
        observer: &'a WorldObject,
        accessor: &'a dyn ObjectAccessor,
        known: &'a HashSet<ObjectGuid>,
    ) -> Self {
        let mut diff = DiffCollector::new(known);
        diff.evaluated.insert(observer.guid());
        if known.contains(&observer.guid()) {
            diff.visible.insert(observer.guid());
        }
        Self {
            rules,
            observer,
            accessor,
            diff,
        }
    }

    pub fn finish(self) -> VisibilityDiff {
        let Self {
            rules,
            observer,
            accessor,
            diff,
        } = self;
        diff.finish(|guid| {
            accessor
                .object(guid)
                .is_some_and(|target| rules.can_see_or_detect(observer, target, accessor, DetectOptions::IN_SIGHT))
        })
    }
}

impl GridNotifier for PlayerRelocationNotifier<'_> {
    fn visit(&mut self, _kind: EntityKind, objects: &[&WorldObject]) {
        let (rules, observer, accessor) = (self.rules, self.observer, self.accessor);
        for target in objects {
            self.diff.evaluate(target.guid(), || {
                rules.can_see_or_detect(observer, target, accessor, DetectOptions::IN_SIGHT)
            });
        }
    }
}

/// Recomputes which players see one object after it moved or changed its
/// concealment, phases or GM visibility.
///
/// `trackers` are the players currently tracking the object. Candidates are
/// the players found by the walk, the players sharing the vision of units
/// found by the walk, and casters looking through dynamic objects found by
/// the walk.
pub struct VisibleChangesNotifier<'a> {
    rules: &'a VisibilityRules,
    target: &'a WorldObject,
    accessor: &'a dyn ObjectAccessor,
    diff: DiffCollector<'a>,
}

impl<'a> VisibleChangesNotifier<'a> {
    pub fn new(
        rules: &'a VisibilityRules,
        target: &'a WorldObject,
        accessor: &'a dyn ObjectAccessor,
        trackers: &'a HashSet<ObjectGuid>,
    ) -> Self {
        let mut diff = DiffCollector::new(trackers);
        diff.evaluated.insert(target.guid());
        if trackers.contains(&target.guid()) {
            diff.visible.insert(target.guid());
        }
        Self {
            rules,
            target,
            accessor,
            diff,
        }
    }

    fn consider(&mut self, observer: &WorldObject) {
        if !observer.is_player() {
            return;
        }
        let (rules, target, accessor) = (self.rules, self.target, self.accessor);
        self.diff.evaluate(observer.guid(), || {
            rules.can_see_or_detect(observer, target, accessor, DetectOptions::IN_SIGHT)
        });
    }

    fn consider_shared_vision(&mut self, unit: &WorldObject) {
        let Some(data) = unit.unit() else {
            return;
        };
        let accessor = self.accessor;
        for guid in &data.shared_vision {
            if let Some(viewer) = accessor.object(*guid) {
                self.consider(viewer);
            }
        }
    }

    pub fn finish(self) -> VisibilityDiff {
        let Self {
            rules,
            target,
            accessor,
            diff,
        } = self;
        diff.finish(|guid| {
            accessor
                .object(guid)
                .is_some_and(|observer| rules.can_see_or_detect(observer, target, accessor, DetectOptions::IN_SIGHT))
        })
    }
}

impl GridNotifier for VisibleChangesNotifier<'_> {
    fn type_mask(&self) -> TypeMask {
        TypeMask::PLAYER | TypeMask::CREATURE | TypeMask::DYNAMICOBJECT
    }

    fn visit(&mut self, kind: EntityKind, objects: &[&WorldObject]) {
        let accessor = self.accessor;
        for object in objects {
            match kind {
                EntityKind::Player => {
                    self.consider(object);
                    self.consider_shared_vision(object);
                }
                EntityKind::Creature => self.consider_shared_vision(object),
                EntityKind::DynamicObject => {
                    let caster = object.owner_guid().and_then(|guid| accessor.object(guid));
                    if let Some(caster) = caster {
                        if caster.as_player().and_then(|player| player.viewpoint) == Some(object.guid()) {
                            self.consider(caster);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}
