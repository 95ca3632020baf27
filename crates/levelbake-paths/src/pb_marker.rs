// pb_marker.rs — path markers dropped while touring a level
//
// Markers are candidate waypoints. The table holds the persistent part of
// each one; per-pass scratch (reachability marks, search budgets) lives in a
// separate annotation table indexed the same way, so one pass cannot leak
// state into the next.

use levelbake_common::common::{com_dprintf, com_warnf};
use levelbake_common::q_shared::*;

use crate::pb_scout::{HUMAN_HEIGHT, HUMAN_RADIUS};

/// Slots in the marker table.
pub const MAX_MARKERS: usize = 3000;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MarkerFlags: u32 {
        /// Placed at a left turn; becomes a path node unless merged away.
        const LEFT_TURN = 0x01;
        /// Reachability to it must survive merging.
        const BEACON    = 0x02;
        /// Seeded from a designer path node; never moved.
        const PERMANENT = 0x04;
        /// Marks a large vertical offset.
        const STAIR     = 0x08;
        /// Still has to be re-toured by the obstruction pass.
        const MARKED    = 0x20;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathMarker {
    /// Scout center when the marker was dropped.
    pub location: Vec3,
    /// Unit heading of the tour at the marker.
    pub direction: Vec3,
    pub flags: MarkerFlags,
    /// Working radius; grows when the marker is pushed away from its corner.
    pub radius: f32,
}

impl PathMarker {
    pub fn new(location: Vec3, direction: Vec3, flags: MarkerFlags) -> Self {
        Self {
            location,
            direction,
            flags,
            radius: HUMAN_RADIUS,
        }
    }

    pub fn is_left_turn(&self) -> bool {
        self.flags.contains(MarkerFlags::LEFT_TURN)
    }

    pub fn is_beacon(&self) -> bool {
        self.flags.contains(MarkerFlags::BEACON)
    }

    pub fn is_permanent(&self) -> bool {
        self.flags.contains(MarkerFlags::PERMANENT)
    }

    /// Slot may be reclaimed when the table is full.
    pub fn is_removable(&self) -> bool {
        !self
            .flags
            .intersects(MarkerFlags::MARKED | MarkerFlags::BEACON | MarkerFlags::PERMANENT)
    }

    /// Within touching distance of `p`.
    pub fn touches(&self, p: &Vec3) -> bool {
        vector_distance_2d(&self.location, p) < HUMAN_RADIUS
            && (self.location[2] - p[2]).abs() < HUMAN_HEIGHT
    }

    /// Heading not opposed to this marker's.
    pub fn compatible(&self, heading: &Vec3) -> bool {
        dot_product(&self.direction, heading) > -0.5
    }
}

/// Per-pass scratch for one marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerAnnotation {
    /// Reachable at human radius from the current reference points.
    pub visible: bool,
    /// Reachable at the larger working radius.
    pub bigvisible: bool,
    /// Search budget left when the marker was last expanded.
    pub budget: i32,
}

// ============================================================
// Marker table
// ============================================================

#[derive(Debug, Clone, Default)]
pub struct MarkerTable {
    pub markers: Vec<PathMarker>,
    /// Slots reclaimed to make room.
    pub evictions: usize,
    /// Markers lost because nothing could be reclaimed.
    pub dropped: usize,
}

impl MarkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Store a marker, reclaiming a removable slot when the table is full.
    pub fn add(&mut self, marker: PathMarker) -> Option<usize> {
        if self.markers.len() < MAX_MARKERS {
            self.markers.push(marker);
            return Some(self.markers.len() - 1);
        }
        match self.markers.iter().position(|m| m.is_removable()) {
            Some(i) => {
                com_dprintf(&format!("marker table full, reusing slot {}\n", i));
                self.markers[i] = marker;
                self.evictions += 1;
                Some(i)
            }
            None => {
                com_warnf(&format!("marker table full, dropped marker at {:?}\n", marker.location));
                self.dropped += 1;
                None
            }
        }
    }

    /// Seed a permanent beacon for a designer-placed node.
    pub fn add_permanent(&mut self, location: Vec3, yaw: f32) -> Option<usize> {
        let flags = MarkerFlags::LEFT_TURN | MarkerFlags::BEACON | MarkerFlags::PERMANENT;
        self.add(PathMarker::new(location, yaw_vector(yaw), flags))
    }

    pub fn with_flags(&self, flags: MarkerFlags) -> Vec<usize> {
        (0..self.markers.len()).filter(|&i| self.markers[i].flags.contains(flags)).collect()
    }

    pub fn count(&self, flags: MarkerFlags) -> usize {
        self.markers.iter().filter(|m| m.flags.contains(flags)).count()
    }

    pub fn clear_flags(&mut self, flags: MarkerFlags) {
        for m in &mut self.markers {
            m.flags.remove(flags);
        }
    }

    /// First marker touching `p` whose heading is compatible with `heading`.
    pub fn touching(&self, p: &Vec3, heading: &Vec3) -> Option<usize> {
        self.markers.iter().position(|m| m.touches(p) && m.compatible(heading))
    }

    /// Like `touching`, among beacons only.
    pub fn touching_beacon(&self, p: &Vec3, heading: &Vec3) -> Option<usize> {
        self.markers
            .iter()
            .position(|m| m.is_beacon() && m.touches(p) && m.compatible(heading))
    }

    /// Fresh scratch table for a pass.
    pub fn annotations(&self) -> Vec<MarkerAnnotation> {
        vec![MarkerAnnotation::default(); self.markers.len()]
    }
}

impl std::ops::Index<usize> for MarkerTable {
    type Output = PathMarker;

    fn index(&self, i: usize) -> &PathMarker {
        &self.markers[i]
    }
}

impl std::ops::IndexMut<usize> for MarkerTable {
    fn index_mut(&mut self, i: usize) -> &mut PathMarker {
        &mut self.markers[i]
    }
}

// ============================================================
// Tests
// ============================================================
