//! # Visibility Rules
//!
//! Decides whether one entity (the seer) can see or detect another (the
//! target). The checks run in a fixed order and the first decisive one wins:
//!
//! 1. same object, never-visible targets and different map or disjoint phases
//! 2. always-visible overrides (owners, casters, viewpoints)
//! 3. private-object ownership
//! 4. optional distance and line-of-sight gate
//! 5. server-side GM visibility
//! 6. ghost visibility
//! 7. pending despawn
//! 8. invisibility and stealth detection
//!
//! All range comparisons are strict and done on squared distances: a target
//! exactly at the sight range is out of sight, and a stealthed target exactly
//! at the detection radius is not detected.

use crate::config::{GhostSightMode, VisibilityConfig};
use crate::entity::concealment::{GHOST_VISIBILITY_GHOST, SERVER_SIDE_GHOST, SERVER_SIDE_GM, STEALTH_TYPE_COUNT};
use crate::entity::{EntityKind, GameObjectType, ObjectAccessor, WorldObject};
use crate::fields::layout::unit;
use crate::terrain::TerrainProvider;
use crate::types::{MapKind, Position};
use std::f32::consts::PI;
use std::sync::Arc;
use tracing::trace;

/// Starting points of a stealth detection roll.
const STEALTH_BASE_DETECTION: i32 = 30;
/// Detection points gained per level above 1.
const STEALTH_POINTS_PER_LEVEL: i32 = 5;
/// Yards of detection radius per detection point.
const STEALTH_YARDS_PER_POINT: f32 = 0.3;

/// Eye height used for line-of-sight rays.
const EYE_HEIGHT: f32 = 2.0;

/// Which optional checks a visibility query runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DetectOptions {
    /// Skip stealth and invisibility detection.
    pub ignore_stealth: bool,
    /// Apply the sight-range (and optional line-of-sight) gate.
    pub distance_check: bool,
    /// Use the inflated aggro radius instead of the plain detection radius.
    pub check_alert: bool,
}

impl DetectOptions {
    /// What the relocation and visibility notifiers ask.
    pub const IN_SIGHT: Self = Self {
        ignore_stealth: false,
        distance_check: true,
        check_alert: false,
    };

    /// Pure detection without the distance gate.
    pub const DETECT: Self = Self {
        ignore_stealth: false,
        distance_check: false,
        check_alert: false,
    };

    /// Aggro check of a creature against a stealthed target.
    pub const ALERT: Self = Self {
        ignore_stealth: false,
        distance_check: false,
        check_alert: true,
    };
}

/// Visibility evaluation for one map.
///
/// Holds its collaborators explicitly: the sight-range configuration and the
/// terrain used for line-of-sight.
#[derive(Debug, Clone)]
pub struct VisibilityRules {
    config: VisibilityConfig,
    map_range: f32,
    terrain: Arc<dyn TerrainProvider>,
}

impl VisibilityRules {
    pub fn new(config: VisibilityConfig, kind: MapKind, terrain: Arc<dyn TerrainProvider>) -> Self {
        let map_range = config.range_for(kind);
        Self {
            config,
            map_range,
            terrain,
        }
    }

    /// Overrides the sight range of the map.
    pub fn with_map_range(mut self, range: f32) -> Self {
        self.map_range = range.min(self.config.max_visibility_distance);
        self
    }

    pub fn map_range(&self) -> f32 {
        self.map_range
    }

    pub fn config(&self) -> &VisibilityConfig {
        &self.config
    }

    pub fn terrain(&self) -> &Arc<dyn TerrainProvider> {
        &self.terrain
    }

    /// Effective sight range of `seer` when looking at `target`.
    pub fn sight_range(&self, seer: &WorldObject, target: Option<&WorldObject>) -> f32 {
        if let Some(player) = seer.as_player() {
            let non_player_target = target.filter(|target| !target.is_player());
            if let Some(range) = non_player_target.and_then(|target| target.visibility_range_override) {
                return range;
            }
            if non_player_target.is_some_and(|target| target.far_visible) {
                return self.config.max_visibility_distance;
            }
            if player.in_cinematic {
                return self.config.cinematic_sight_range;
            }
            return self.map_range;
        }
        if let Some(creature) = seer.as_creature() {
            return creature.sight_distance;
        }
        if seer.is_unit() {
            return self.config.unit_sight_range;
        }
        if seer.kind() == EntityKind::DynamicObject && seer.active {
            return self.map_range;
        }
        0.0
    }

    /// Hard failures no override can lift: other map or no shared phase.
    pub fn can_never_see(&self, seer: &WorldObject, target: &WorldObject) -> bool {
        !seer.location().same_map(target.location()) || !seer.phases.intersects(&target.phases)
    }

    pub fn is_never_visible_for(&self, target: &WorldObject, _seer: &WorldObject) -> bool {
        !target.is_in_world() || target.never_visible
    }

    /// Relationships that make `target` visible no matter what else applies.
    pub fn is_always_visible_for(&self, target: &WorldObject, seer: &WorldObject, accessor: &dyn ObjectAccessor) -> bool {
        let seer_guid = seer.guid();
        if target.is_unit() {
            if target.charmer_or_owner() == Some(seer_guid) {
                return true;
            }
            if seer.is_player() {
                let owner = target
                    .owner_guid()
                    .and_then(|guid| accessor.object(guid))
                    .filter(|owner| owner.is_player());
                if owner.is_some_and(|owner| is_group_visible_for(owner, seer)) {
                    return true;
                }
            }
            return false;
        }

        match target.kind() {
            EntityKind::Corpse => match target.owner_guid() {
                Some(owner) if owner == seer_guid => true,
                Some(owner) => {
                    seer.is_player() && seer.group().is_some() && accessor.group_of(owner) == seer.group()
                }
                None => false,
            },
            EntityKind::DynamicObject | EntityKind::AreaTrigger => {
                target.owner_guid() == Some(seer_guid)
            }
            _ => false,
        }
    }

    /// Things the seer always sees from its own side: what it looks through
    /// and what it controls.
    pub fn can_always_see(&self, seer: &WorldObject, target: &WorldObject) -> bool {
        let Some(player) = seer.as_player() else {
            return false;
        };
        player.viewpoint == Some(target.guid()) || seer.fields.get(unit::CHARM) == target.guid()
    }

    /// Relationships that defeat stealth and invisibility.
    pub fn is_always_detectable_for(&self, target: &WorldObject, seer: &WorldObject, accessor: &dyn ObjectAccessor) -> bool {
        if !target.is_unit() {
            return false;
        }
        let Some(controller) = target.charmer_or_owner() else {
            return false;
        };
        if controller == seer.guid() {
            return true;
        }
        seer.is_player()
            && accessor
                .object(controller)
                .is_some_and(|controller| controller.is_player() && is_group_visible_for(controller, seer))
    }

    /// A private object is only seen by its owner, other private objects of
    /// the same owner and the owner's group.
    pub fn check_private_owner(&self, target: &WorldObject, seer: &WorldObject, accessor: &dyn ObjectAccessor) -> bool {
        let Some(owner) = target.private_owner else {
            return true;
        };
        if owner == seer.guid() || seer.private_owner == Some(owner) {
            return true;
        }
        seer.is_player() && seer.group().is_some() && accessor.group_of(owner) == seer.group()
    }

    fn within_sight(&self, viewpoint: &WorldObject, target: &WorldObject, range: f32) -> bool {
        if !viewpoint.position().is_within_dist(target.position(), range) {
            return false;
        }
        if !self.config.line_of_sight_checks {
            return true;
        }
        self.terrain.line_of_sight(
            viewpoint.map_id(),
            &viewpoint.phases,
            &eye(viewpoint.position()),
            &eye(target.position()),
        )
    }

    /// Full visibility decision of `seer` towards `target`.
    pub fn can_see_or_detect(
        &self,
        seer: &WorldObject,
        target: &WorldObject,
        accessor: &dyn ObjectAccessor,
        options: DetectOptions,
    ) -> bool {
        if seer.guid() == target.guid() {
            return true;
        }
        if self.is_never_visible_for(target, seer) || self.can_never_see(seer, target) {
            return false;
        }
        if self.is_always_visible_for(target, seer, accessor) || self.can_always_see(seer, target) {
            return true;
        }
        if !self.check_private_owner(target, seer, accessor) {
            return false;
        }

        let mut corpse_visibility = false;
        if options.distance_check {
            let range = self.sight_range(seer, Some(target));

            if let Some(player) = seer.as_player() {
                let target_in_ghost_world = target.concealment.server_side.value(SERVER_SIDE_GHOST)
                    & seer.concealment.server_side.value(SERVER_SIDE_GHOST)
                    & GHOST_VISIBILITY_GHOST
                    != 0;
                if !seer.is_alive() && !target_in_ghost_world {
                    if let Some(corpse) = player.corpse_location.filter(|corpse| corpse.same_map(seer.location())) {
                        corpse_visibility = corpse.position.is_within_dist(seer.position(), range)
                            && corpse.position.is_within_dist(target.position(), range);
                    }
                }
            }

            let viewpoint = seer
                .as_player()
                .and_then(|player| player.viewpoint)
                .and_then(|guid| accessor.object(guid))
                .unwrap_or(seer);

            if !corpse_visibility && !self.within_sight(viewpoint, target, range) {
                trace!(seer = %seer.guid(), target = %target.guid(), range, "Target out of sight range");
                return false;
            }
        }

        let gm_level = target.concealment.server_side.value(SERVER_SIDE_GM);
        let gm_detect = seer.concealment.server_side_detect.value(SERVER_SIDE_GM);
        if gm_level == 0 {
            if gm_detect > 0 {
                return true;
            }
        } else {
            return gm_detect >= gm_level;
        }

        let ghost_mask = target.concealment.server_side.value(SERVER_SIDE_GHOST)
            & seer.concealment.server_side_detect.value(SERVER_SIDE_GHOST);
        if !corpse_visibility && ghost_mask == 0 {
            let same_side = match self.config.ghost_sight {
                GhostSightMode::Team => seer.team() == target.team(),
                GhostSightMode::Group => is_group_visible_for(seer, target),
            };
            if !(seer.is_player() && target.is_player() && seer.is_alive() && same_side) {
                return false;
            }
        }

        if target.invisible_due_to_despawn {
            return false;
        }

        self.can_detect(seer, target, accessor, options.ignore_stealth, options.check_alert)
    }

    /// Stealth and invisibility part of the decision.
    ///
    /// A unit possessing another detects with the possessed unit. Pets and
    /// charmed units detect with their controller's capabilities.
    pub fn can_detect(
        &self,
        seer: &WorldObject,
        target: &WorldObject,
        accessor: &dyn ObjectAccessor,
        ignore_stealth: bool,
        check_alert: bool,
    ) -> bool {
        let possessed = seer
            .charm()
            .and_then(|guid| accessor.object(guid))
            .filter(|charmed| charmed.is_possessed());
        let seer = match possessed {
            Some(possessed) => possessed,
            None => seer
                .charmer_or_owner()
                .and_then(|guid| accessor.object(guid))
                .unwrap_or(seer),
        };

        if self.is_always_detectable_for(target, seer, accessor) {
            return true;
        }
        if !ignore_stealth && !self.can_detect_invisibility_of(seer, target) {
            return false;
        }
        if !ignore_stealth && !self.can_detect_stealth_of(seer, target, accessor, check_alert) {
            return false;
        }
        true
    }

    /// Every invisibility type of the target must be detected with at least
    /// the target's magnitude.
    pub fn can_detect_invisibility_of(&self, seer: &WorldObject, target: &WorldObject) -> bool {
        let invisibility = &target.concealment.invisibility;
        let detect = &seer.concealment.invisibility_detect;
        let mask = invisibility.flags() & detect.flags();
        if mask != invisibility.flags() {
            return false;
        }
        invisibility
            .active_types()
            .all(|kind| detect.value(kind) >= invisibility.value(kind))
    }

    pub fn can_detect_stealth_of(
        &self,
        seer: &WorldObject,
        target: &WorldObject,
        accessor: &dyn ObjectAccessor,
        check_alert: bool,
    ) -> bool {
        let stealth = &target.concealment.stealth;
        if stealth.flags() == 0 {
            return true;
        }

        let combat_reach = seer.combat_reach();
        if seer.is_within_dist(target, combat_reach) {
            return true;
        }
        if seer.is_unit() && !seer.has_in_arc(PI, target) {
            return false;
        }
        if seer.as_game_object().is_some_and(|go| go.go_type == GameObjectType::Trap) {
            return true;
        }

        let owner_level = target
            .as_game_object()
            .and_then(|_| target.owner_guid())
            .and_then(|guid| accessor.object(guid))
            .map(WorldObject::level);

        for kind in (0..STEALTH_TYPE_COUNT).filter(|kind| stealth.has_flag(*kind)) {
            let mut detection = STEALTH_BASE_DETECTION;
            detection += (seer.level() as i32 - 1) * STEALTH_POINTS_PER_LEVEL;
            detection += seer.concealment.stealth_detect.value(kind);
            if let Some(level) = owner_level {
                detection -= (level as i32 - 1) * STEALTH_POINTS_PER_LEVEL;
            }
            detection -= stealth.value(kind);

            let mut range = detection as f32 * STEALTH_YARDS_PER_POINT + combat_reach;
            if seer.is_player() && range > self.config.max_player_stealth_detect_range {
                range = self.config.max_player_stealth_detect_range;
            }
            if check_alert {
                range += range * 0.08 + 1.5;
            }
            if check_alert && seer.as_creature().is_some_and(|creature| range >= creature.attack_distance) {
                return false;
            }
            if !seer.is_within_dist(target, range) {
                return false;
            }
        }
        true
    }
}

/// Two units of the same group see each other's hidden state.
fn is_group_visible_for(a: &WorldObject, b: &WorldObject) -> bool {
    match (a.group(), b.group()) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

fn eye(position: &Position) -> Position {
    Position {
        z: position.z + EYE_HEIGHT,
        ..*position
    }
}
