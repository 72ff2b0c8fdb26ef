//! Collision capability consumed by visibility and the simulation.
//!
//! Ray-model intersection lives outside this crate. The core only asks the
//! two questions of [`TerrainProvider`]; providers are injected as
//! `Arc<dyn TerrainProvider>` when a map is built.

use crate::types::{MapId, PhaseSet, Position};
use std::collections::HashMap;
use std::fmt::Debug;

/// Height returned when no ground is found below a point.
pub const INVALID_HEIGHT: f32 = -100_000.0;

pub trait TerrainProvider: Send + Sync + Debug {
    /// Whether the straight segment between the two points is unobstructed.
    fn line_of_sight(&self, map: MapId, phases: &PhaseSet, from: &Position, to: &Position) -> bool;

    /// Ground height below `(x, y)` searching down from `z_hint`.
    fn height_at(&self, map: MapId, phases: &PhaseSet, x: f32, y: f32, z_hint: f32) -> f32;
}

/// Flat, obstacle-free ground at a fixed height.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenTerrain {
    pub ground_z: f32,
}

impl TerrainProvider for OpenTerrain {
    fn line_of_sight(&self, _map: MapId, _phases: &PhaseSet, _from: &Position, _to: &Position) -> bool {
        true
    }

    fn height_at(&self, _map: MapId, _phases: &PhaseSet, _x: f32, _y: f32, z_hint: f32) -> f32 {
        if z_hint >= self.ground_z {
            self.ground_z
        } else {
            INVALID_HEIGHT
        }
    }
}

/// Axis-aligned box that blocks sight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub min: [f32; 3],
    pub max: [f32; 3],
    /// Phase the obstacle exists in; `None` blocks every phase.
    pub phase: Option<u32>,
}

impl Obstacle {
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max, phase: None }
    }

    /// Slab test of the segment `from -> to` against the box.
    fn intersects(&self, from: &Position, to: &Position) -> bool {
        let origin = [from.x, from.y, from.z];
        let delta = [to.x - from.x, to.y - from.y, to.z - from.z];
        let (mut t_min, mut t_max) = (0.0f32, 1.0f32);

        for axis in 0..3 {
            if delta[axis].abs() < f32::EPSILON {
                if origin[axis] < self.min[axis] || origin[axis] > self.max[axis] {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / delta[axis];
            let mut t0 = (self.min[axis] - origin[axis]) * inv;
            let mut t1 = (self.max[axis] - origin[axis]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

/// Flat ground plus per-map blocking boxes.
#[derive(Debug, Clone, Default)]
pub struct ObstacleTerrain {
    pub ground_z: f32,
    obstacles: HashMap<MapId, Vec<Obstacle>>,
}

impl ObstacleTerrain {
    pub fn new(ground_z: f32) -> Self {
        Self {
            ground_z,
            obstacles: HashMap::new(),
        }
    }

    pub fn add_obstacle(&mut self, map: MapId, obstacle: Obstacle) {
        self.obstacles.entry(map).or_default().push(obstacle);
    }

    pub fn with_obstacle(mut self, map: MapId, obstacle: Obstacle) -> Self {
        self.add_obstacle(map, obstacle);
        self
    }
}

impl TerrainProvider for ObstacleTerrain {
    fn line_of_sight(&self, map: MapId, phases: &PhaseSet, from: &Position, to: &Position) -> bool {
        let Some(obstacles) = self.obstacles.get(&map) else {
            return true;
        };
        !obstacles
            .iter()
            .filter(|obstacle| obstacle.phase.map_or(true, |phase| phases.contains(phase)))
            .any(|obstacle| obstacle.intersects(from, to))
    }

    fn height_at(&self, map: MapId, phases: &PhaseSet, x: f32, y: f32, z_hint: f32) -> f32 {
        let roof = self
            .obstacles
            .get(&map)
            .into_iter()
            .flatten()
            .filter(|obstacle| obstacle.phase.map_or(true, |phase| phases.contains(phase)))
            .filter(|obstacle| {
                x >= obstacle.min[0] && x <= obstacle.max[0] && y >= obstacle.min[1] && y <= obstacle.max[1]
            })
            .map(|obstacle| obstacle.max[2])
            .filter(|top| *top <= z_hint)
            .fold(f32::MIN, f32::max);

        let ground = if z_hint >= self.ground_z { self.ground_z } else { INVALID_HEIGHT };
        roof.max(ground)
    }
}
