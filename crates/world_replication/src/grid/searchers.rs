//! Searchers and the predicates they are usually paired with.
//!
//! A searcher is a [`GridNotifier`] that runs an [`ObjectCheck`] over every
//! visited object and remembers matches:
//!
//! * [`FirstSearcher`] keeps the first match and stops the walk.
//! * [`LastSearcher`] keeps overwriting, ending with the last match visited.
//! * [`ListSearcher`] keeps every match in visit order.
//!
//! Paired with a check that narrows its own range on every match (the
//! `Nearest*` checks), [`LastSearcher`] returns the nearest object whatever
//! the visit order, since any later match must be strictly closer. Objects at
//! exactly the same distance keep the one visited first.

use super::{GridNotifier, TypeMask};
use crate::entity::{EntityKind, WorldObject};
use crate::terrain::TerrainProvider;
use crate::types::{MapId, ObjectGuid, PhaseSet, Position, Team};
use std::sync::Arc;

/// Height above the feet used for line-of-sight rays of searchers.
const EYE_HEIGHT: f32 = 2.0;

/// Predicate deciding whether a visited object matches a search.
///
/// Checks take `&mut self` so they can tighten their criteria as they go.
pub trait ObjectCheck {
    fn check(&mut self, object: &WorldObject) -> bool;
}

impl<F> ObjectCheck for F
where
    F: FnMut(&WorldObject) -> bool,
{
    fn check(&mut self, object: &WorldObject) -> bool {
        self(object)
    }
}

/// Visit filter shared by the searchers: category mask plus optional phases.
#[derive(Debug, Clone)]
struct SearchScope {
    mask: TypeMask,
    phases: Option<PhaseSet>,
}

impl SearchScope {
    fn new() -> Self {
        Self {
            mask: TypeMask::all(),
            phases: None,
        }
    }

    fn admits(&self, object: &WorldObject) -> bool {
        self.phases.as_ref().map_or(true, |phases| phases.intersects(&object.phases))
    }
}

macro_rules! scope_builders {
    () => {
        /// Restricts the walk to the given categories.
        pub fn with_mask(mut self, mask: TypeMask) -> Self {
            self.scope.mask = mask;
            self
        }

        /// Skips objects sharing no phase with `phases`.
        pub fn in_phases(mut self, phases: PhaseSet) -> Self {
            self.scope.phases = Some(phases);
            self
        }

        pub fn check(&self) -> &C {
            &self.check
        }
    };
}

/// Keeps the first match and ends the walk.
#[derive(Debug)]
pub struct FirstSearcher<C> {
    check: C,
    scope: SearchScope,
    result: Option<ObjectGuid>,
}

impl<C: ObjectCheck> FirstSearcher<C> {
    pub fn new(check: C) -> Self {
        Self {
            check,
            scope: SearchScope::new(),
            result: None,
        }
    }

    scope_builders!();

    pub fn result(&self) -> Option<ObjectGuid> {
        self.result
    }
}

impl<C: ObjectCheck> GridNotifier for FirstSearcher<C> {
    fn type_mask(&self) -> TypeMask {
        self.scope.mask
    }

    fn visit(&mut self, _kind: EntityKind, objects: &[&WorldObject]) {
        if self.result.is_some() {
            return;
        }
        for object in objects.iter().filter(|object| self.scope.admits(object)) {
            if self.check.check(object) {
                self.result = Some(object.guid());
                return;
            }
        }
    }

    fn is_done(&self) -> bool {
        self.result.is_some()
    }
}

/// Keeps the last match visited.
#[derive(Debug)]
pub struct LastSearcher<C> {
    check: C,
    scope: SearchScope,
    result: Option<ObjectGuid>,
}

impl<C: ObjectCheck> LastSearcher<C> {
    pub fn new(check: C) -> Self {
        Self {
            check,
            scope: SearchScope::new(),
            result: None,
        }
    }

    scope_builders!();

    pub fn result(&self) -> Option<ObjectGuid> {
        self.result
    }
}

impl<C: ObjectCheck> GridNotifier for LastSearcher<C> {
    fn type_mask(&self) -> TypeMask {
        self.scope.mask
    }

    fn visit(&mut self, _kind: EntityKind, objects: &[&WorldObject]) {
        for object in objects.iter().filter(|object| self.scope.admits(object)) {
            if self.check.check(object) {
                self.result = Some(object.guid());
            }
        }
    }
}

/// Collects every match in visit order.
#[derive(Debug)]
pub struct ListSearcher<C> {
    check: C,
    scope: SearchScope,
    results: Vec<ObjectGuid>,
}

impl<C: ObjectCheck> ListSearcher<C> {
    pub fn new(check: C) -> Self {
        Self {
            check,
            scope: SearchScope::new(),
            results: Vec::new(),
        }
    }

    scope_builders!();

    pub fn results(&self) -> &[ObjectGuid] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ObjectGuid> {
        self.results
    }
}

impl<C: ObjectCheck> GridNotifier for ListSearcher<C> {
    fn type_mask(&self) -> TypeMask {
        self.scope.mask
    }

    fn visit(&mut self, _kind: EntityKind, objects: &[&WorldObject]) {
        for object in objects.iter().filter(|object| self.scope.admits(object)) {
            if self.check.check(object) {
                self.results.push(object.guid());
            }
        }
    }
}

/// Runs a closure on every visited object.
pub struct ObjectWorker<F> {
    work: F,
    mask: TypeMask,
}

impl<F: FnMut(&WorldObject)> ObjectWorker<F> {
    pub fn new(work: F) -> Self {
        Self {
            work,
            mask: TypeMask::all(),
        }
    }

    pub fn with_mask(mut self, mask: TypeMask) -> Self {
        self.mask = mask;
        self
    }
}

impl<F: FnMut(&WorldObject)> GridNotifier for ObjectWorker<F> {
    fn type_mask(&self) -> TypeMask {
        self.mask
    }

    fn visit(&mut self, _kind: EntityKind, objects: &[&WorldObject]) {
        for object in objects {
            (self.work)(object);
        }
    }
}

// ============================================================================
// Checks
// ============================================================================

/// Nearest living (or dead) creature of an entry. Narrows its range on
/// every match; pair it with a [`LastSearcher`].
#[derive(Debug, Clone)]
pub struct NearestCreatureEntryCheck {
    source: ObjectGuid,
    center: Position,
    entry: u32,
    alive: bool,
    range: f32,
}

impl NearestCreatureEntryCheck {
    pub fn new(source: &WorldObject, entry: u32, alive: bool, range: f32) -> Self {
        Self {
            source: source.guid(),
            center: *source.position(),
            entry,
            alive,
            range,
        }
    }

    /// Distance of the best match so far, or the initial range.
    pub fn range(&self) -> f32 {
        self.range
    }
}

impl ObjectCheck for NearestCreatureEntryCheck {
    fn check(&mut self, object: &WorldObject) -> bool {
        if !object.is_creature()
            || object.guid() == self.source
            || object.entry() != self.entry
            || object.is_alive() != self.alive
            || !self.center.is_within_dist(object.position(), self.range)
        {
            return false;
        }
        self.range = self.center.exact_distance(object.position());
        true
    }
}

/// Nearest game object of an entry. Narrows its range on every match.
#[derive(Debug, Clone)]
pub struct NearestGameObjectEntryCheck {
    center: Position,
    entry: u32,
    range: f32,
}

impl NearestGameObjectEntryCheck {
    pub fn new(center: Position, entry: u32, range: f32) -> Self {
        Self { center, entry, range }
    }

    pub fn range(&self) -> f32 {
        self.range
    }
}

impl ObjectCheck for NearestGameObjectEntryCheck {
    fn check(&mut self, object: &WorldObject) -> bool {
        if object.kind() != EntityKind::GameObject
            || object.entry() != self.entry
            || !self.center.is_within_dist(object.position(), self.range)
        {
            return false;
        }
        self.range = self.center.exact_distance(object.position());
        true
    }
}

/// Any living unit other than the source within range.
#[derive(Debug, Clone)]
pub struct AnyUnitInRangeCheck {
    source: ObjectGuid,
    center: Position,
    range: f32,
}

impl AnyUnitInRangeCheck {
    pub fn new(source: &WorldObject, range: f32) -> Self {
        Self {
            source: source.guid(),
            center: *source.position(),
            range,
        }
    }
}

impl ObjectCheck for AnyUnitInRangeCheck {
    fn check(&mut self, object: &WorldObject) -> bool {
        object.is_unit()
            && object.guid() != self.source
            && object.is_alive()
            && self.center.is_within_dist(object.position(), self.range)
    }
}

/// Any player within range of a point.
#[derive(Debug, Clone)]
pub struct AnyPlayerInRangeCheck {
    center: Position,
    range: f32,
    require_alive: bool,
}

impl AnyPlayerInRangeCheck {
    pub fn new(center: Position, range: f32, require_alive: bool) -> Self {
        Self {
            center,
            range,
            require_alive,
        }
    }
}

impl ObjectCheck for AnyPlayerInRangeCheck {
    fn check(&mut self, object: &WorldObject) -> bool {
        object.is_player()
            && (!self.require_alive || object.is_alive())
            && self.center.is_within_dist(object.position(), self.range)
    }
}

/// Every creature of an entry within range, dead or alive.
#[derive(Debug, Clone)]
pub struct AllCreaturesOfEntryInRangeCheck {
    center: Position,
    entry: u32,
    range: f32,
}

impl AllCreaturesOfEntryInRangeCheck {
    pub fn new(center: Position, entry: u32, range: f32) -> Self {
        Self { center, entry, range }
    }
}

impl ObjectCheck for AllCreaturesOfEntryInRangeCheck {
    fn check(&mut self, object: &WorldObject) -> bool {
        object.is_creature()
            && object.entry() == self.entry
            && self.center.is_within_dist(object.position(), self.range)
    }
}

/// Living units of another team within range and line of sight of the source.
#[derive(Debug, Clone)]
pub struct AnyUnfriendlyUnitInRangeCheck {
    source: ObjectGuid,
    map: MapId,
    phases: PhaseSet,
    center: Position,
    team: Team,
    range: f32,
    terrain: Arc<dyn TerrainProvider>,
}

impl AnyUnfriendlyUnitInRangeCheck {
    pub fn new(source: &WorldObject, range: f32, terrain: Arc<dyn TerrainProvider>) -> Self {
        Self {
            source: source.guid(),
            map: source.map_id(),
            phases: source.phases.clone(),
            center: *source.position(),
            team: source.team(),
            range,
            terrain,
        }
    }
}

impl ObjectCheck for AnyUnfriendlyUnitInRangeCheck {
    fn check(&mut self, object: &WorldObject) -> bool {
        if !object.is_unit()
            || object.guid() == self.source
            || !object.is_alive()
            || object.team() == self.team
            || !self.center.is_within_dist(object.position(), self.range)
        {
            return false;
        }
        let from = Position::new(self.center.x, self.center.y, self.center.z + EYE_HEIGHT);
        let to = Position::new(object.position().x, object.position().y, object.position().z + EYE_HEIGHT);
        self.terrain.line_of_sight(self.map, &self.phases, &from, &to)
    }
}
