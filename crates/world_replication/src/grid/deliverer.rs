//! Range-limited message delivery.

use super::{GridNotifier, TypeMask};
use crate::entity::{EntityKind, ObjectAccessor, WorldObject};
use crate::types::ObjectGuid;
use bytes::Bytes;
use std::collections::HashSet;
use tracing::trace;

/// What each client currently has in its object cache.
pub trait ClientView {
    /// Whether the client of `observer` knows about `object`.
    fn has_at_client(&self, observer: ObjectGuid, object: ObjectGuid) -> bool;
}

/// Delivers one message to every player within a radius of the source.
///
/// A player receives the message when it is in range and its client knows the
/// source, unless it looks through another object. Players sharing the vision
/// of an in-range unit, and casters looking through an in-range dynamic
/// object, receive it as well. Nobody receives it twice.
pub struct MessageDistDeliverer<'a> {
    source: &'a WorldObject,
    message: Bytes,
    radius_sq: f32,
    own_team_only: bool,
    include_source: bool,
    skipped: Option<ObjectGuid>,
    accessor: &'a dyn ObjectAccessor,
    clients: &'a dyn ClientView,
    delivered: HashSet<ObjectGuid>,
    deliveries: Vec<(ObjectGuid, Bytes)>,
}

impl<'a> MessageDistDeliverer<'a> {
    pub fn new(
        source: &'a WorldObject,
        message: Bytes,
        radius: f32,
        accessor: &'a dyn ObjectAccessor,
        clients: &'a dyn ClientView,
    ) -> Self {
        Self {
            source,
            message,
            radius_sq: radius * radius,
            own_team_only: false,
            include_source: false,
            skipped: None,
            accessor,
            clients,
            delivered: HashSet::new(),
            deliveries: Vec::new(),
        }
    }

    /// Restricts delivery to players of the source's team.
    pub fn own_team_only(mut self, enabled: bool) -> Self {
        self.own_team_only = enabled;
        self
    }

    /// Also delivers to the source when it is a player.
    pub fn include_source(mut self, enabled: bool) -> Self {
        self.include_source = enabled;
        self
    }

    pub fn skip(mut self, receiver: ObjectGuid) -> Self {
        self.skipped = Some(receiver);
        self
    }

    /// Receivers in delivery order with the message each one got.
    pub fn deliveries(&self) -> &[(ObjectGuid, Bytes)] {
        &self.deliveries
    }

    pub fn into_deliveries(self) -> Vec<(ObjectGuid, Bytes)> {
        self.deliveries
    }

    pub fn recipients(&self) -> impl Iterator<Item = ObjectGuid> + '_ {
        self.deliveries.iter().map(|(guid, _)| *guid)
    }

    fn send(&mut self, player: &WorldObject) {
        let guid = player.guid();
        if self.delivered.contains(&guid) {
            return;
        }
        if guid == self.source.guid() {
            if !self.include_source {
                return;
            }
        } else {
            if self.skipped == Some(guid) {
                return;
            }
            if self.own_team_only && player.team() != self.source.team() {
                return;
            }
            if !self.clients.has_at_client(guid, self.source.guid()) {
                trace!(receiver = %guid, source = %self.source.guid(), "Receiver does not know the source");
                return;
            }
        }
        self.delivered.insert(guid);
        self.deliveries.push((guid, self.message.clone()));
    }

    /// Players whose viewpoint is `unit` and who share its vision.
    fn send_to_shared_vision(&mut self, unit: &WorldObject) {
        let Some(data) = unit.unit() else {
            return;
        };
        for guid in &data.shared_vision {
            let Some(viewer) = self.accessor.object(*guid) else {
                continue;
            };
            if viewer.as_player().is_some_and(|player| player.viewpoint == Some(unit.guid())) {
                self.send(viewer);
            }
        }
    }

    fn in_range(&self, object: &WorldObject) -> bool {
        object.phases.intersects(&self.source.phases)
            && object.position().distance_2d_sq(self.source.position()) <= self.radius_sq
    }
}

impl GridNotifier for MessageDistDeliverer<'_> {
    fn type_mask(&self) -> TypeMask {
        TypeMask::PLAYER | TypeMask::CREATURE | TypeMask::DYNAMICOBJECT
    }

    fn visit(&mut self, kind: EntityKind, objects: &[&WorldObject]) {
        for &object in objects {
            if !self.in_range(object) {
                continue;
            }
            match kind {
                EntityKind::Player => {
                    self.send_to_shared_vision(object);
                    let viewpoint = object.as_player().and_then(|player| player.viewpoint);
                    if viewpoint.map_or(true, |viewpoint| viewpoint == object.guid()) {
                        self.send(object);
                    }
                }
                EntityKind::Creature => self.send_to_shared_vision(object),
                EntityKind::DynamicObject => {
                    let caster = object
                        .owner_guid()
                        .and_then(|guid| self.accessor.object(guid))
                        .filter(|caster| caster.is_player());
                    if let Some(caster) = caster {
                        if caster.as_player().and_then(|player| player.viewpoint) == Some(object.guid()) {
                            self.send(caster);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}
