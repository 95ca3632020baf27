// reach_spec.rs — directed traversal envelopes between navigation actors

use std::cmp::Ordering;
use std::ops::Add;

bitflags::bitflags! {
    /// How a reach spec may be traversed.
    ///
    /// WALK and FLY are capabilities: a chain keeps only the modes every leg
    /// allows. The rest are requirements: a chain needs every medium any leg
    /// crosses.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ReachFlags: u32 {
        const WALK  = 0x01;
        const FLY   = 0x02;
        const AIR   = 0x04;
        const WATER = 0x08;
        const LAVA  = 0x10;
        const SLIME = 0x20;
    }
}

impl ReachFlags {
    pub const CAPABILITIES: ReachFlags = ReachFlags::WALK.union(ReachFlags::FLY);
    pub const REQUIREMENTS: ReachFlags = ReachFlags::AIR
        .union(ReachFlags::WATER)
        .union(ReachFlags::LAVA)
        .union(ReachFlags::SLIME);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReachSpec {
    /// Actor index the edge leaves from.
    pub start: usize,
    /// Actor index the edge arrives at.
    pub end: usize,
    pub distance: f32,
    /// Largest collision radius that makes it through.
    pub collision_radius: f32,
    pub collision_height: f32,
    /// Upward jump needed.
    pub jump_z: f32,
    /// Downward drop needed.
    pub drop_z: f32,
    pub reach_flags: ReachFlags,
}

impl Default for ReachSpec {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            distance: 0.0,
            collision_radius: 0.0,
            collision_height: 0.0,
            jump_z: 0.0,
            drop_z: 0.0,
            reach_flags: ReachFlags::empty(),
        }
    }
}

impl ReachSpec {
    /// No harder to use and no longer than `other`. Endpoints are not compared.
    pub fn le(&self, other: &ReachSpec) -> bool {
        self.collision_radius >= other.collision_radius
            && self.collision_height >= other.collision_height
            && self.jump_z <= other.jump_z
            && self.drop_z <= other.drop_z
            && other.reach_flags.contains(self.reach_flags)
            && self.distance <= other.distance
    }

    /// Whether a pawn of the given size and abilities can use this edge.
    pub fn supports(&self, radius: f32, height: f32, max_jump: f32, flags: ReachFlags) -> bool {
        self.collision_radius >= radius
            && self.collision_height >= height
            && self.jump_z <= max_jump
            && flags.intersects(self.reach_flags & ReachFlags::CAPABILITIES)
            && flags.contains(self.reach_flags & ReachFlags::REQUIREMENTS)
    }
}

impl Add for ReachSpec {
    type Output = ReachSpec;

    /// Chain `self` then `other`.
    fn add(self, other: ReachSpec) -> ReachSpec {
        let caps = (self.reach_flags & other.reach_flags) & ReachFlags::CAPABILITIES;
        let reqs = (self.reach_flags | other.reach_flags) & ReachFlags::REQUIREMENTS;
        ReachSpec {
            start: self.start,
            end: other.end,
            distance: self.distance + other.distance,
            collision_radius: self.collision_radius.min(other.collision_radius),
            collision_height: self.collision_height.min(other.collision_height),
            jump_z: self.jump_z.max(other.jump_z),
            drop_z: self.drop_z.max(other.drop_z),
            reach_flags: caps | reqs,
        }
    }
}

impl PartialOrd for ReachSpec {
    fn partial_cmp(&self, other: &ReachSpec) -> Option<Ordering> {
        if self.start != other.start || self.end != other.end {
            return None;
        }
        match (self.le(other), other.le(self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

// ============================================================
// Tests
// ============================================================
