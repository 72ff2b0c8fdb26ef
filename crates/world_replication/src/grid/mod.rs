//! # Spatial Grid
//!
//! Cell-based spatial index of one map and the visitor framework built on it.
//!
//! Entities are bucketed into square cells by category. A query walks every
//! cell overlapping a circle and hands each cell's entity list to a
//! [`GridNotifier`] as one batch per category, restricted to the categories
//! the notifier asks for. Searching, message delivery and visibility updates
//! are all notifiers over the same walk.
//!
//! ## Visit order
//!
//! Cells are visited column by column (x, then y, ascending), categories in
//! [`EntityKind::ALL`] order, and entities in insertion order within a cell.
//! The order is stable for a given world state.

mod deliverer;
mod notifiers;
mod searchers;

pub use deliverer::{ClientView, MessageDistDeliverer};
pub use notifiers::{PlayerRelocationNotifier, VisibleChangesNotifier};
pub use searchers::{
    AllCreaturesOfEntryInRangeCheck, AnyPlayerInRangeCheck, AnyUnfriendlyUnitInRangeCheck, AnyUnitInRangeCheck,
    FirstSearcher, LastSearcher, ListSearcher, NearestCreatureEntryCheck, NearestGameObjectEntryCheck, ObjectCheck,
    ObjectWorker,
};

use crate::config::MAP_HALF_SIZE;
use crate::entity::{EntityKind, ObjectAccessor, WorldObject};
use crate::types::{ObjectGuid, Position};
use bitflags::bitflags;
use std::collections::HashMap;
use tracing::warn;

bitflags! {
    /// Set of entity categories a notifier wants to visit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeMask: u8 {
        const PLAYER = 0x01;
        const CREATURE = 0x02;
        const GAMEOBJECT = 0x04;
        const DYNAMICOBJECT = 0x08;
        const CORPSE = 0x10;
        const AREATRIGGER = 0x20;
        const CONVERSATION = 0x40;
        const UNIT = Self::PLAYER.bits() | Self::CREATURE.bits();
    }
}

impl TypeMask {
    pub fn of(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Player => TypeMask::PLAYER,
            EntityKind::Creature => TypeMask::CREATURE,
            EntityKind::GameObject => TypeMask::GAMEOBJECT,
            EntityKind::DynamicObject => TypeMask::DYNAMICOBJECT,
            EntityKind::Corpse => TypeMask::CORPSE,
            EntityKind::AreaTrigger => TypeMask::AREATRIGGER,
            EntityKind::Conversation => TypeMask::CONVERSATION,
        }
    }

    pub fn accepts(self, kind: EntityKind) -> bool {
        self.contains(Self::of(kind))
    }
}

/// Behaviour run over the entities found by a grid walk.
pub trait GridNotifier {
    /// Categories this notifier wants to see.
    fn type_mask(&self) -> TypeMask {
        TypeMask::all()
    }

    /// Called once per visited cell and category with the cell's entities.
    fn visit(&mut self, kind: EntityKind, objects: &[&WorldObject]);

    /// Stops the walk early once true.
    fn is_done(&self) -> bool {
        false
    }
}

/// Integer coordinates of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub fn from_position(position: &Position, cell_size: f32) -> Self {
        Self {
            x: (position.x / cell_size).floor() as i32,
            y: (position.y / cell_size).floor() as i32,
        }
    }
}

#[derive(Debug, Default)]
struct Cell {
    lists: [Vec<ObjectGuid>; EntityKind::ALL.len()],
}

impl Cell {
    fn list(&self, kind: EntityKind) -> &[ObjectGuid] {
        &self.lists[kind as usize]
    }

    fn list_mut(&mut self, kind: EntityKind) -> &mut Vec<ObjectGuid> {
        &mut self.lists[kind as usize]
    }

    fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }
}

/// Cell index of one map.
#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<CellCoord, Cell>,
    locations: HashMap<ObjectGuid, (CellCoord, EntityKind)>,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            locations: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn contains(&self, guid: ObjectGuid) -> bool {
        self.locations.contains_key(&guid)
    }

    pub fn cell_of(&self, guid: ObjectGuid) -> Option<CellCoord> {
        self.locations.get(&guid).map(|(cell, _)| *cell)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Adds an object to the cell under its position.
    pub fn insert(&mut self, object: &WorldObject) -> bool {
        let guid = object.guid();
        if self.locations.contains_key(&guid) {
            warn!(%guid, "⚠️ Object is already in the grid");
            return false;
        }
        let coord = CellCoord::from_position(object.position(), self.cell_size);
        self.cells.entry(coord).or_default().list_mut(object.kind()).push(guid);
        self.locations.insert(guid, (coord, object.kind()));
        true
    }

    pub fn remove(&mut self, guid: ObjectGuid) -> bool {
        let Some((coord, kind)) = self.locations.remove(&guid) else {
            return false;
        };
        if let Some(cell) = self.cells.get_mut(&coord) {
            cell.list_mut(kind).retain(|other| *other != guid);
            if cell.is_empty() {
                self.cells.remove(&coord);
            }
        }
        true
    }

    /// Moves an object to the cell of its current position.
    ///
    /// Returns `true` when the object changed cells.
    pub fn relocate(&mut self, object: &WorldObject) -> bool {
        let guid = object.guid();
        let coord = CellCoord::from_position(object.position(), self.cell_size);
        match self.locations.get(&guid) {
            Some((current, _)) if *current == coord => false,
            Some(_) => {
                self.remove(guid);
                self.insert(object)
            }
            None => {
                warn!(%guid, "⚠️ Relocating an object that is not in the grid");
                self.insert(object)
            }
        }
    }

    /// Coordinates of cells overlapping the circle, in visit order.
    ///
    /// The query is clipped to the map extent; a NaN radius selects nothing
    /// beyond the centre cell.
    pub fn cells_in_radius(&self, center: &Position, radius: f32) -> Vec<CellCoord> {
        let radius = if radius.is_nan() { 0.0 } else { radius.clamp(0.0, 2.0 * MAP_HALF_SIZE) };
        let corner = |dx: f32, dy: f32| {
            let x = (center.x + dx).clamp(-MAP_HALF_SIZE, MAP_HALF_SIZE);
            let y = (center.y + dy).clamp(-MAP_HALF_SIZE, MAP_HALF_SIZE);
            CellCoord::from_position(&Position::new(x, y, 0.0), self.cell_size)
        };
        let min = corner(-radius, -radius);
        let max = corner(radius, radius);
        let radius_sq = radius * radius;
        let overlaps = |coord: CellCoord| {
            (min.x..=max.x).contains(&coord.x)
                && (min.y..=max.y).contains(&coord.y)
                && self.cell_distance_sq(coord, center) <= radius_sq
        };

        let span = (i64::from(max.x) - i64::from(min.x) + 1) * (i64::from(max.y) - i64::from(min.y) + 1);
        if span > self.cells.len() as i64 {
            let mut coords: Vec<CellCoord> = self.cells.keys().copied().filter(|coord| overlaps(*coord)).collect();
            coords.sort_unstable();
            return coords;
        }

        let mut coords = Vec::new();
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                let coord = CellCoord { x, y };
                if self.cells.contains_key(&coord) && overlaps(coord) {
                    coords.push(coord);
                }
            }
        }
        coords
    }

    /// Squared 2D distance from `point` to the nearest point of the cell.
    fn cell_distance_sq(&self, coord: CellCoord, point: &Position) -> f32 {
        let min_x = coord.x as f32 * self.cell_size;
        let min_y = coord.y as f32 * self.cell_size;
        let dx = (min_x - point.x).max(0.0).max(point.x - (min_x + self.cell_size));
        let dy = (min_y - point.y).max(0.0).max(point.y - (min_y + self.cell_size));
        dx * dx + dy * dy
    }

    /// Walks every cell overlapping the circle and feeds the notifier.
    ///
    /// The notifier receives whole cell lists; range filtering inside a cell
    /// is up to the notifier.
    pub fn visit<N: GridNotifier + ?Sized>(
        &self,
        center: &Position,
        radius: f32,
        accessor: &dyn ObjectAccessor,
        notifier: &mut N,
    ) {
        let mask = notifier.type_mask();
        let mut batch: Vec<&WorldObject> = Vec::new();

        for coord in self.cells_in_radius(center, radius) {
            let Some(cell) = self.cells.get(&coord) else {
                continue;
            };
            for kind in EntityKind::ALL.into_iter().filter(|kind| mask.accepts(*kind)) {
                let guids = cell.list(kind);
                if guids.is_empty() {
                    continue;
                }
                batch.clear();
                batch.extend(guids.iter().filter_map(|guid| accessor.object(*guid)));
                notifier.visit(kind, &batch);
                if notifier.is_done() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{GameObjectType, ObjectRegistry};
    use crate::types::{InstanceId, MapId, WorldLocation};

    fn at(x: f32, y: f32) -> WorldLocation {
        WorldLocation::new(MapId(0), InstanceId(0), Position::new(x, y, 0.0))
    }

    #[derive(Default)]
    struct Recorder {
        mask: Option<TypeMask>,
        batches: Vec<(EntityKind, Vec<ObjectGuid>)>,
    }

    impl GridNotifier for Recorder {
        fn type_mask(&self) -> TypeMask {
            self.mask.unwrap_or(TypeMask::all())
        }

        fn visit(&mut self, kind: EntityKind, objects: &[&WorldObject]) {
            self.batches.push((kind, objects.iter().map(|object| object.guid()).collect()));
        }
    }

    fn populated() -> (SpatialGrid, ObjectRegistry) {
        let mut grid = SpatialGrid::new(10.0);
        let mut registry = ObjectRegistry::new();
        let objects = vec![
            WorldObject::creature(1, 1, at(1.0, 1.0)),
            WorldObject::creature(1, 2, at(2.0, 2.0)),
            WorldObject::game_object(5, 3, at(3.0, 3.0), GameObjectType::Generic),
            WorldObject::creature(1, 4, at(15.0, 1.0)),
            WorldObject::creature(1, 5, at(95.0, 95.0)),
        ];
        for object in objects {
            grid.insert(&object);
            registry.insert(object).unwrap();
        }
        (grid, registry)
    }

    #[test]
    fn visit_batches_by_cell_and_category() {
        let (grid, registry) = populated();
        let mut recorder = Recorder::default();
        grid.visit(&Position::new(5.0, 5.0, 0.0), 12.0, &registry, &mut recorder);

        let kinds: Vec<_> = recorder.batches.iter().map(|(kind, guids)| (*kind, guids.len())).collect();
        assert_eq!(
            kinds,
            vec![(EntityKind::Creature, 2), (EntityKind::GameObject, 1), (EntityKind::Creature, 1)]
        );
    }

    #[test]
    fn type_mask_filters_categories() {
        let (grid, registry) = populated();
        let mut recorder = Recorder {
            mask: Some(TypeMask::GAMEOBJECT),
            ..Recorder::default()
        };
        grid.visit(&Position::new(5.0, 5.0, 0.0), 50.0, &registry, &mut recorder);
        assert_eq!(recorder.batches.len(), 1);
        assert_eq!(recorder.batches[0].0, EntityKind::GameObject);
    }

    #[test]
    fn relocation_moves_between_cells() {
        let (mut grid, mut registry) = populated();
        let guid = registry.iter().find(|object| object.position().x == 95.0).unwrap().guid();
        let before = grid.cell_of(guid).unwrap();

        let object = registry.get_mut(guid).unwrap();
        object.set_position(Position::new(96.0, 95.0, 0.0));
        assert!(!grid.relocate(object));
        object.set_position(Position::new(5.0, 5.0, 0.0));
        assert!(grid.relocate(object));
        assert_ne!(grid.cell_of(guid).unwrap(), before);

        let mut recorder = Recorder::default();
        grid.visit(&Position::new(5.0, 5.0, 0.0), 1.0, &registry, &mut recorder);
        assert!(recorder.batches.iter().any(|(_, guids)| guids.contains(&guid)));
    }

    #[test]
    fn removing_last_object_drops_the_cell() {
        let (mut grid, registry) = populated();
        let cells = grid.cell_count();
        let far = registry.iter().find(|object| object.position().x == 95.0).unwrap().guid();
        assert!(grid.remove(far));
        assert!(!grid.remove(far));
        assert_eq!(grid.cell_count(), cells - 1);
    }

    #[test]
    fn unbounded_radius_is_clipped_to_the_map() {
        let (grid, _registry) = populated();
        let center = Position::new(0.0, 0.0, 0.0);

        let all = grid.cells_in_radius(&center, f32::INFINITY);
        assert_eq!(all.len(), grid.cell_count());
        assert!(all.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(grid.cells_in_radius(&center, 1.0e30), all);
        assert_eq!(grid.cells_in_radius(&center, f32::NAN), vec![CellCoord { x: 0, y: 0 }]);
        assert!(grid.cells_in_radius(&Position::new(1.0e9, 0.0, 0.0), 5.0).is_empty());
    }

    #[test]
    fn negative_coordinates_floor_into_their_own_cell() {
        let coord = CellCoord::from_position(&Position::new(-0.5, 3.0, 0.0), 10.0);
        assert_eq!(coord, CellCoord { x: -1, y: 0 });
    }
}
