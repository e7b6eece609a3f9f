//! Data models for placed buildings, their connections and rovers

use std::collections::HashSet;
use std::fmt;

use crate::catalog::BuildingType;

/// Opaque handle for a placed building, issued by the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuildingId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoverId(pub(crate) u64);

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

impl fmt::Display for RoverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Whether a placement request targets the ground or a stack zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementMode {
    #[default]
    Ground,
    Stack,
}

/// Stacking fields computed by the legality check, applied on placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackPlacement {
    pub stack_level: u32,
    pub is_stacked: bool,
}

/// A processing building placed on the grid.
///
/// Geometry is fixed once placed. Depth is one unit for all area and volume
/// math.
#[derive(Debug, Clone)]
pub struct Building {
    pub id: BuildingId,
    pub kind: String,
    pub width: u32,
    pub height: u32,
    pub processing: f64,
    pub x: u32,
    pub y: u32,
    pub is_stacked: bool,
    pub stack_level: u32,
    pub connections: Vec<ConnectionId>,
    pub thermal_efficiency: f64,
}

impl Building {
    pub(crate) fn new(
        id: BuildingId,
        kind: &BuildingType,
        x: u32,
        y: u32,
        stacking: StackPlacement,
    ) -> Self {
        Self {
            id,
            kind: kind.name().to_string(),
            width: kind.width(),
            height: kind.height(),
            processing: kind.processing(),
            x,
            y,
            is_stacked: stacking.is_stacked,
            stack_level: stacking.stack_level,
            connections: Vec::new(),
            thermal_efficiency: 1.0,
        }
    }

    /// Iterate over every `(x, y)` cell covered by the footprint
    pub fn footprint(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y..self.y + self.height)
            .flat_map(move |y| (self.x..self.x + self.width).map(move |x| (x, y)))
    }

    pub fn surface_area(&self) -> f64 {
        let (w, h) = (self.width as f64, self.height as f64);
        2.0 * (w * h) + 2.0 * w + 2.0 * h
    }

    pub fn volume(&self) -> f64 {
        self.width as f64 * self.height as f64
    }

    pub fn surface_area_to_volume_ratio(&self) -> f64 {
        self.surface_area() / self.volume()
    }

    /// Building-local heat estimate.
    ///
    /// Independent of the grid-level thermal map: factors stacking, SA/V
    /// ratio and the connectivity-derived thermal efficiency.
    pub fn heat_output(&self) -> f64 {
        let stacking_factor = if self.is_stacked {
            1.0 + self.stack_level as f64 * 0.2
        } else {
            1.0
        };
        let sav_factor = 1.0 - self.surface_area_to_volume_ratio() * 0.1;

        self.processing * stacking_factor * sav_factor / self.thermal_efficiency
    }

    /// Recompute `thermal_efficiency` from network connectivity and stacking
    pub fn update_thermal_efficiency(
        &mut self,
        connected: &HashSet<BuildingId>,
        total_buildings: usize,
    ) {
        self.thermal_efficiency = if connected.contains(&self.id) {
            let connection_ratio = if total_buildings > 1 {
                self.connections.len() as f64 / (total_buildings - 1) as f64
            } else {
                0.0
            };
            1.0 + connection_ratio * 0.3
        } else {
            1.0
        };

        if self.is_stacked {
            self.thermal_efficiency -= self.stack_level as f64 * 0.1;
        }

        self.thermal_efficiency = self.thermal_efficiency.max(0.5);
    }
}

/// Undirected link between two distinct buildings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: BuildingId,
    pub target: BuildingId,
}

impl Connection {
    /// True if this connection joins `a` and `b` in either direction
    pub fn links(&self, a: BuildingId, b: BuildingId) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }

    pub fn touches(&self, id: BuildingId) -> bool {
        self.source == id || self.target == id
    }
}

/// Progress gained per tick
pub const ROVER_SPEED: f64 = 0.01;

/// Marker travelling along a connection to show data flow
#[derive(Debug, Clone, PartialEq)]
pub struct Rover {
    pub id: RoverId,
    pub source: BuildingId,
    pub target: BuildingId,
    /// Fraction of the trip completed, 0 to 1
    pub progress: f64,
    pub speed: f64,
}

impl Rover {
    pub(crate) fn new(id: RoverId, source: BuildingId, target: BuildingId) -> Self {
        Self {
            id,
            source,
            target,
            progress: 0.0,
            speed: ROVER_SPEED,
        }
    }

    pub fn update(&mut self) {
        self.progress += self.speed;
        if self.progress > 1.0 {
            self.progress = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn building(width: u32, height: u32, processing: f64) -> Building {
        let kind = BuildingType::new("Test", width, height, processing).unwrap();
        Building::new(
            BuildingId(1),
            &kind,
            0,
            0,
            StackPlacement {
                stack_level: 0,
                is_stacked: false,
            },
        )
    }

    #[test]
    fn sav_ratio_for_square_building() {
        let b = building(2, 2, 10.0);
        assert_eq!(b.surface_area(), 16.0);
        assert_eq!(b.volume(), 4.0);
        assert_eq!(b.surface_area_to_volume_ratio(), 4.0);
    }

    #[test]
    fn footprint_covers_every_cell_once() {
        let mut b = building(2, 3, 1.0);
        b.x = 4;
        b.y = 1;
        let cells: Vec<_> = b.footprint().collect();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells.first(), Some(&(4, 1)));
        assert_eq!(cells.last(), Some(&(5, 3)));
        assert!(!cells.contains(&(6, 1)));
    }

    #[test]
    fn unconnected_building_keeps_baseline_efficiency() {
        let mut b = building(2, 2, 10.0);
        b.update_thermal_efficiency(&HashSet::new(), 3);
        assert_eq!(b.thermal_efficiency, 1.0);
    }

    #[test]
    fn connections_raise_efficiency() {
        let mut b = building(2, 2, 10.0);
        b.connections = vec![ConnectionId(1), ConnectionId(2)];
        let connected: HashSet<_> = [BuildingId(1)].into_iter().collect();

        // Two of four other buildings: 1.0 + 0.5 * 0.3
        b.update_thermal_efficiency(&connected, 5);
        assert!((b.thermal_efficiency - 1.15).abs() < 1e-12);
    }

    #[test]
    fn stacking_lowers_efficiency_down_to_floor() {
        let mut b = building(1, 1, 10.0);
        b.is_stacked = true;
        b.stack_level = 2;
        b.update_thermal_efficiency(&HashSet::new(), 1);
        assert!((b.thermal_efficiency - 0.8).abs() < 1e-12);

        b.stack_level = 9;
        b.update_thermal_efficiency(&HashSet::new(), 1);
        assert_eq!(b.thermal_efficiency, 0.5);
    }

    #[test]
    fn heat_output_accounts_for_stacking_and_efficiency() {
        let mut b = building(2, 2, 10.0);
        // sav 4.0 => factor 0.6
        assert!((b.heat_output() - 6.0).abs() < 1e-9);

        b.is_stacked = true;
        b.stack_level = 1;
        b.thermal_efficiency = 0.9;
        assert!((b.heat_output() - 10.0 * 1.2 * 0.6 / 0.9).abs() < 1e-9);
    }

    #[test]
    fn connection_matches_both_directions() {
        let c = Connection {
            id: ConnectionId(1),
            source: BuildingId(1),
            target: BuildingId(2),
        };
        assert!(c.links(BuildingId(1), BuildingId(2)));
        assert!(c.links(BuildingId(2), BuildingId(1)));
        assert!(!c.links(BuildingId(1), BuildingId(3)));
        assert!(c.touches(BuildingId(2)));
    }

    #[test]
    fn rover_wraps_after_full_trip() {
        let mut rover = Rover::new(RoverId(1), BuildingId(1), BuildingId(2));
        rover.speed = 0.4;
        rover.update();
        rover.update();
        assert!((rover.progress - 0.8).abs() < 1e-12);
        rover.update();
        assert_eq!(rover.progress, 0.0);
    }
}
