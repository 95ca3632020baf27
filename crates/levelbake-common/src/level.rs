// level.rs — actor roster and reach-spec table around a BSP model

use crate::bsp_model::BspModel;
use crate::common::com_dprintf;
use crate::reach_spec::ReachSpec;
use crate::q_shared::*;

/// Outgoing and upstream reach specs each actor may hold.
pub const MAX_PATHS: usize = 16;

// ============================================================
// Actors
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    Generic,
    PathNode,
    PlayerStart,
    ZoneInfo,
    Light,
    Decoration,
    Scout,
    Pickup,
}

impl ActorKind {
    /// Actors that take part in the navigation graph.
    pub fn is_navigation_point(self) -> bool {
        matches!(self, ActorKind::PathNode | ActorKind::PlayerStart | ActorKind::Pickup)
    }
}

/// Collision cylinder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collision {
    pub radius: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Movement {
    pub can_walk: bool,
    pub can_jump: bool,
    pub can_fly: bool,
    pub jump_z: f32,
    /// Tallest ledge walked up without jumping.
    pub max_step_height: f32,
}

impl Default for Movement {
    fn default() -> Self {
        Self {
            can_walk: true,
            can_jump: false,
            can_fly: false,
            jump_z: 0.0,
            max_step_height: 18.0,
        }
    }
}

/// Navigation point capability: reach-spec indices into `Level::reach_specs`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavPoint {
    pub paths: Vec<usize>,
    pub upstream_paths: Vec<usize>,
    /// Spawned by the path builder rather than placed by a designer.
    pub auto_placed: bool,
}

impl NavPoint {
    pub fn clear_paths(&mut self) {
        self.paths.clear();
        self.upstream_paths.clear();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneMembership {
    pub zone: u8,
    pub leaf: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub kind: ActorKind,
    pub name: String,
    pub location: Vec3,
    pub yaw: f32,
    pub collision: Option<Collision>,
    pub movement: Option<Movement>,
    pub nav: Option<NavPoint>,
    pub region: Option<ZoneMembership>,
    pub deleted: bool,
}

impl Actor {
    pub fn new(kind: ActorKind, location: Vec3) -> Self {
        let nav = if kind.is_navigation_point() { Some(NavPoint::default()) } else { None };
        let (collision, movement) = match kind {
            ActorKind::Scout => (
                Some(Collision { radius: 18.0, height: 39.0 }),
                Some(Movement::default()),
            ),
            ActorKind::PathNode | ActorKind::PlayerStart => {
                (Some(Collision { radius: 18.0, height: 39.0 }), None)
            }
            _ => (None, None),
        };
        Self {
            kind,
            name: String::new(),
            location,
            yaw: 0.0,
            collision,
            movement,
            nav,
            region: None,
            deleted: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.deleted
    }
}

// ============================================================
// Level
// ============================================================

/// Result of `Level::add_reach_spec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPath {
    Added(usize),
    /// Outgoing or upstream list already holds `MAX_PATHS`.
    Overflow,
}

#[derive(Debug, Clone, Default)]
pub struct Level {
    pub model: BspModel,
    pub actors: Vec<Actor>,
    /// Append-only edge table.
    pub reach_specs: Vec<ReachSpec>,
}

impl Level {
    pub fn new(model: BspModel) -> Self {
        Self {
            model,
            actors: Vec::new(),
            reach_specs: Vec::new(),
        }
    }

    pub fn spawn(&mut self, kind: ActorKind, location: Vec3) -> usize {
        let i = self.actors.len();
        let mut actor = Actor::new(kind, location);
        actor.name = format!("{:?}{}", kind, i);
        com_dprintf(&format!("spawn {} at {:?}\n", actor.name, location));
        self.actors.push(actor);
        i
    }

    /// Soft delete; indices held elsewhere stay valid.
    pub fn destroy(&mut self, i: usize) {
        if let Some(actor) = self.actors.get_mut(i) {
            if !actor.deleted {
                com_dprintf(&format!("destroy {}\n", actor.name));
            }
            actor.deleted = true;
            actor.nav = None;
        }
    }

    pub fn alive(&self) -> impl Iterator<Item = (usize, &Actor)> {
        self.actors.iter().enumerate().filter(|(_, a)| !a.deleted)
    }

    pub fn navigation_points(&self) -> Vec<usize> {
        self.alive()
            .filter(|(_, a)| a.kind.is_navigation_point() && a.nav.is_some())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn path_nodes(&self) -> Vec<usize> {
        self.alive().filter(|(_, a)| a.kind == ActorKind::PathNode).map(|(i, _)| i).collect()
    }

    /// Store `spec` and link it into both endpoints, unless either list is full.
    pub fn add_reach_spec(&mut self, spec: ReachSpec) -> AddPath {
        let start_full = self.actors[spec.start].nav.as_ref().map_or(true, |n| n.paths.len() >= MAX_PATHS);
        let end_full =
            self.actors[spec.end].nav.as_ref().map_or(true, |n| n.upstream_paths.len() >= MAX_PATHS);
        if start_full || end_full {
            return AddPath::Overflow;
        }
        let id = self.reach_specs.len();
        self.reach_specs.push(spec);
        if let Some(nav) = self.actors[spec.start].nav.as_mut() {
            nav.paths.push(id);
        }
        if let Some(nav) = self.actors[spec.end].nav.as_mut() {
            nav.upstream_paths.push(id);
        }
        AddPath::Added(id)
    }

    /// Outgoing specs of an actor.
    pub fn paths_from(&self, i: usize) -> Vec<&ReachSpec> {
        match self.actors[i].nav.as_ref() {
            Some(nav) => nav.paths.iter().map(|&id| &self.reach_specs[id]).collect(),
            None => Vec::new(),
        }
    }
}

// ============================================================
// Tests
// ============================================================
