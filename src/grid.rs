//! Grid placement and stacking engine
//!
//! The grid owns every placed building. Cells only hold `BuildingId`
//! back-references, in placement order across all stack levels.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::catalog::BuildingType;
use crate::models::{
    Building, BuildingId, Connection, ConnectionId, PlacementMode, Rover, RoverId, StackPlacement,
};

#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub is_stack_zone: bool,
    pub occupants: Vec<BuildingId>,
}

#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
    buildings: Vec<Building>,
    index: HashMap<BuildingId, usize>,
    connections: Vec<Connection>,
    rovers: Vec<Rover>,
    next_id: u64,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
            buildings: Vec::new(),
            index: HashMap::new(),
            connections: Vec::new(),
            rovers: Vec::new(),
            next_id: 1,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    fn cell_index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn cell(&self, x: i64, y: i64) -> Option<&Cell> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(&self.cells[self.cell_index(x as u32, y as u32)])
    }

    /// Flag the given cells as stack zones. Out-of-bounds entries are ignored.
    pub fn set_stack_zones(&mut self, zones: &[(i64, i64)]) {
        for &(x, y) in zones {
            if self.in_bounds(x, y) {
                let idx = self.cell_index(x as u32, y as u32);
                self.cells[idx].is_stack_zone = true;
            }
        }
    }

    pub fn is_stack_zone(&self, x: i64, y: i64) -> bool {
        self.cell(x, y).is_some_and(|c| c.is_stack_zone)
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn footprint_cells(
        &self,
        width: u32,
        height: u32,
        x: u32,
        y: u32,
    ) -> impl Iterator<Item = &Cell> + '_ {
        (y..y + height).flat_map(move |cy| {
            (x..x + width).map(move |cx| &self.cells[self.cell_index(cx, cy)])
        })
    }

    /// Pure legality check for a `width x height` footprint at `(x, y)`.
    ///
    /// Returns the stacking fields the building would receive, or `None` if
    /// the placement is illegal.
    pub fn check_placement(
        &self,
        width: u32,
        height: u32,
        x: i64,
        y: i64,
        mode: PlacementMode,
    ) -> Option<StackPlacement> {
        // Subtract on the grid side so huge origins cannot overflow
        if x < 0
            || y < 0
            || x > self.width as i64 - width as i64
            || y > self.height as i64 - height as i64
        {
            return None;
        }
        let (x, y) = (u32::try_from(x).ok()?, u32::try_from(y).ok()?);

        match mode {
            PlacementMode::Stack => {
                if !self
                    .footprint_cells(width, height, x, y)
                    .all(|c| c.is_stack_zone)
                {
                    return None;
                }

                let max_level = self
                    .footprint_cells(width, height, x, y)
                    .flat_map(|c| c.occupants.iter())
                    .filter_map(|id| self.building(*id))
                    .map(|b| b.stack_level)
                    .max();

                Some(StackPlacement {
                    stack_level: max_level.map_or(0, |level| level + 1),
                    is_stacked: true,
                })
            }
            PlacementMode::Ground => {
                let ground_taken = self
                    .footprint_cells(width, height, x, y)
                    .flat_map(|c| c.occupants.iter())
                    .filter_map(|id| self.building(*id))
                    .any(|b| b.stack_level == 0);

                if ground_taken {
                    return None;
                }

                Some(StackPlacement {
                    stack_level: 0,
                    is_stacked: false,
                })
            }
        }
    }

    pub fn can_place_building(
        &self,
        width: u32,
        height: u32,
        x: i64,
        y: i64,
        mode: PlacementMode,
    ) -> bool {
        self.check_placement(width, height, x, y, mode).is_some()
    }

    /// Place a building of `kind` with its origin at `(x, y)`.
    ///
    /// Returns the new building's id, or `None` without touching the grid if
    /// the placement is illegal.
    pub fn place_building(
        &mut self,
        kind: &BuildingType,
        x: i64,
        y: i64,
        mode: PlacementMode,
    ) -> Option<BuildingId> {
        let stacking = self.check_placement(kind.width(), kind.height(), x, y, mode)?;
        let (x, y) = (u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        let id = BuildingId(self.next_id());
        let building = Building::new(id, kind, x, y, stacking);

        let covered: Vec<(u32, u32)> = building.footprint().collect();
        for (cx, cy) in covered {
            let idx = self.cell_index(cx, cy);
            self.cells[idx].occupants.push(id);
        }

        debug!(
            "placed {} '{}' at ({},{}) level {}",
            id, building.kind, x, y, building.stack_level
        );
        self.index.insert(id, self.buildings.len());
        self.buildings.push(building);
        Some(id)
    }

    /// Link two distinct buildings. Fails on self links, unknown ids and
    /// existing pairs in either direction.
    pub fn create_connection(&mut self, source: BuildingId, target: BuildingId) -> bool {
        if source == target {
            return false;
        }
        let (Some(&si), Some(&ti)) = (self.index.get(&source), self.index.get(&target)) else {
            return false;
        };
        if self.connections.iter().any(|c| c.links(source, target)) {
            return false;
        }

        let id = ConnectionId(self.next_id());
        self.connections.push(Connection { id, source, target });
        self.buildings[si].connections.push(id);
        self.buildings[ti].connections.push(id);

        debug!("connected {} -> {} as {}", source, target, id);
        true
    }

    /// Start a rover between two buildings that share a connection
    pub fn add_rover(&mut self, source: BuildingId, target: BuildingId) -> Option<RoverId> {
        if !self.connections.iter().any(|c| c.links(source, target)) {
            return None;
        }
        let id = RoverId(self.next_id());
        self.rovers.push(Rover::new(id, source, target));
        Some(id)
    }

    /// Per-frame tick. Advances every rover; no other state changes.
    pub fn update(&mut self) {
        for rover in &mut self.rovers {
            rover.update();
        }
    }

    /// Topmost building covering `(x, y)`: highest stack level, later
    /// placements winning ties.
    pub fn get_building_at(&self, x: i64, y: i64) -> Option<&Building> {
        self.cell(x, y)?
            .occupants
            .iter()
            .filter_map(|id| self.building(*id))
            .max_by_key(|b| b.stack_level)
    }

    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.index.get(&id).map(|&i| &self.buildings[i])
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn rovers(&self) -> &[Rover] {
        &self.rovers
    }

    /// Every building that appears in at least one connection
    pub fn connected_building_ids(&self) -> HashSet<BuildingId> {
        self.connections
            .iter()
            .flat_map(|c| [c.source, c.target])
            .collect()
    }

    /// Recompute each building's connectivity-based thermal efficiency
    pub fn refresh_thermal_efficiency(&mut self) {
        let connected = self.connected_building_ids();
        let total = self.buildings.len();
        for building in &mut self.buildings {
            building.update_thermal_efficiency(&connected, total);
        }
    }

    /// Remove all buildings, connections and rovers. Stack zones stay.
    pub fn clear(&mut self) {
        self.buildings.clear();
        self.index.clear();
        self.connections.clear();
        self.rovers.clear();
        for cell in &mut self.cells {
            cell.occupants.clear();
        }
        debug!("grid cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(width: u32, height: u32) -> BuildingType {
        BuildingType::new("Block", width, height, 10.0).unwrap()
    }

    fn grid_with_zone() -> Grid {
        let mut grid = Grid::new(10, 8);
        let zones: Vec<(i64, i64)> = (2..=4)
            .flat_map(|y| (2..=4).map(move |x| (x, y)))
            .collect();
        grid.set_stack_zones(&zones);
        grid
    }

    #[test]
    fn ground_placement_on_empty_grid_is_level_zero() {
        let grid = Grid::new(10, 8);
        for (x, y) in [(0, 0), (8, 6), (3, 5)] {
            let placement = grid.check_placement(2, 2, x, y, PlacementMode::Ground);
            assert_eq!(
                placement,
                Some(StackPlacement {
                    stack_level: 0,
                    is_stacked: false
                })
            );
        }
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let grid = Grid::new(10, 8);
        assert!(!grid.can_place_building(2, 2, -1, 0, PlacementMode::Ground));
        assert!(!grid.can_place_building(2, 2, 0, -1, PlacementMode::Ground));
        assert!(!grid.can_place_building(2, 2, 9, 0, PlacementMode::Ground));
        assert!(!grid.can_place_building(2, 2, 0, 7, PlacementMode::Ground));
    }

    #[test]
    fn extreme_origins_are_rejected() {
        let mut grid = grid_with_zone();
        for (x, y) in [
            (i64::MAX, 0),
            (0, i64::MAX),
            (i64::MIN, 0),
            (0, i64::MIN),
            (i64::MAX - 1, i64::MAX - 1),
            (u32::MAX as i64, 0),
        ] {
            for mode in [PlacementMode::Ground, PlacementMode::Stack] {
                assert!(!grid.can_place_building(2, 2, x, y, mode), "({x},{y})");
                assert!(grid.place_building(&kind(2, 2), x, y, mode).is_none());
            }
        }
        assert!(grid.buildings().is_empty());

        // Footprints wider than the grid never fit
        assert!(!grid.can_place_building(u32::MAX, 1, 0, 0, PlacementMode::Ground));
    }

    #[test]
    fn ground_overlap_fails_but_neighbours_fit() {
        let mut grid = Grid::new(10, 8);
        assert!(grid.place_building(&kind(2, 2), 0, 0, PlacementMode::Ground).is_some());
        assert!(grid.place_building(&kind(2, 2), 2, 0, PlacementMode::Ground).is_some());
        assert!(grid.place_building(&kind(2, 2), 1, 1, PlacementMode::Ground).is_none());
        assert_eq!(grid.buildings().len(), 2);
    }

    #[test]
    fn failed_placement_leaves_grid_untouched() {
        let mut grid = Grid::new(4, 4);
        grid.place_building(&kind(2, 2), 0, 0, PlacementMode::Ground);
        assert!(grid.place_building(&kind(2, 2), 1, 1, PlacementMode::Ground).is_none());
        assert_eq!(grid.cell(2, 2).unwrap().occupants.len(), 0);
    }

    #[test]
    fn stacking_outside_zone_fails() {
        let mut grid = grid_with_zone();
        assert!(grid.place_building(&kind(2, 2), 0, 0, PlacementMode::Stack).is_none());
        // Partially inside the zone
        assert!(grid.place_building(&kind(2, 2), 4, 4, PlacementMode::Stack).is_none());
    }

    #[test]
    fn first_stacked_building_gets_level_zero_but_is_stacked() {
        let mut grid = grid_with_zone();
        let id = grid
            .place_building(&kind(2, 2), 2, 2, PlacementMode::Stack)
            .unwrap();
        let b = grid.building(id).unwrap();
        assert_eq!(b.stack_level, 0);
        assert!(b.is_stacked);
    }

    #[test]
    fn stack_levels_climb_over_full_footprint() {
        let mut grid = grid_with_zone();
        grid.place_building(&kind(2, 2), 2, 2, PlacementMode::Ground).unwrap();
        let second = grid
            .place_building(&kind(2, 2), 2, 2, PlacementMode::Stack)
            .unwrap();
        assert_eq!(grid.building(second).unwrap().stack_level, 1);

        // Partial overlap with the level-1 building still lands above it
        let third = grid
            .place_building(&kind(1, 2), 3, 3, PlacementMode::Stack)
            .unwrap();
        assert_eq!(grid.building(third).unwrap().stack_level, 2);

        // Only one covered cell holds the level-2 building
        let fourth = grid
            .place_building(&kind(2, 1), 2, 3, PlacementMode::Stack)
            .unwrap();
        assert_eq!(grid.building(fourth).unwrap().stack_level, 3);
    }

    #[test]
    fn stacked_level_zero_blocks_ground_placement() {
        let mut grid = grid_with_zone();
        grid.place_building(&kind(1, 1), 2, 2, PlacementMode::Stack).unwrap();
        assert!(!grid.can_place_building(1, 1, 2, 2, PlacementMode::Ground));
    }

    #[test]
    fn ground_rule_only_checks_level_zero() {
        let mut grid = grid_with_zone();
        grid.place_building(&kind(1, 1), 2, 2, PlacementMode::Stack).unwrap();
        // Bridges over (3,3) at level 1 with nothing beneath it there
        grid.place_building(&kind(2, 2), 2, 2, PlacementMode::Stack).unwrap();

        let under = grid
            .place_building(&kind(1, 1), 3, 3, PlacementMode::Ground)
            .unwrap();
        assert_eq!(grid.building(under).unwrap().stack_level, 0);
        assert_eq!(grid.get_building_at(3, 3).unwrap().stack_level, 1);
    }

    #[test]
    fn every_covered_cell_references_the_building() {
        let mut grid = Grid::new(6, 6);
        let id = grid
            .place_building(&kind(3, 2), 1, 2, PlacementMode::Ground)
            .unwrap();
        let referencing = (0..6)
            .flat_map(|y| (0..6).map(move |x| (x, y)))
            .filter(|&(x, y)| grid.cell(x, y).unwrap().occupants.contains(&id))
            .count();
        assert_eq!(referencing, 6);
    }

    #[test]
    fn connection_dedup_is_symmetric() {
        let mut grid = Grid::new(10, 8);
        let a = grid
            .place_building(&kind(1, 1), 0, 0, PlacementMode::Ground)
            .unwrap();
        let b = grid
            .place_building(&kind(1, 1), 5, 5, PlacementMode::Ground)
            .unwrap();

        assert!(grid.create_connection(a, b));
        assert!(!grid.create_connection(b, a));
        assert!(!grid.create_connection(a, a));
        assert_eq!(grid.connections().len(), 1);
        assert_eq!(grid.building(a).unwrap().connections.len(), 1);
        assert_eq!(grid.building(b).unwrap().connections.len(), 1);
    }

    #[test]
    fn topmost_building_is_returned() {
        let mut grid = grid_with_zone();
        assert!(grid.get_building_at(3, 3).is_none());
        assert!(grid.get_building_at(-1, 3).is_none());
        assert!(grid.get_building_at(10, 3).is_none());

        grid.place_building(&kind(2, 2), 2, 2, PlacementMode::Ground).unwrap();
        let top = grid
            .place_building(&kind(1, 1), 3, 3, PlacementMode::Stack)
            .unwrap();
        assert_eq!(grid.get_building_at(3, 3).map(|b| b.id), Some(top));
        assert_eq!(grid.get_building_at(2, 2).unwrap().stack_level, 0);
    }

    #[test]
    fn rovers_need_a_connection() {
        let mut grid = Grid::new(10, 8);
        let a = grid
            .place_building(&kind(1, 1), 0, 0, PlacementMode::Ground)
            .unwrap();
        let b = grid
            .place_building(&kind(1, 1), 3, 0, PlacementMode::Ground)
            .unwrap();
        assert!(grid.add_rover(a, b).is_none());

        grid.create_connection(a, b);
        assert!(grid.add_rover(b, a).is_some());

        grid.update();
        grid.update();
        assert!((grid.rovers()[0].progress - 0.02).abs() < 1e-12);
    }

    #[test]
    fn efficiency_feedback_uses_connection_ratio() {
        let mut grid = Grid::new(10, 8);
        let ids: Vec<_> = (0..3)
            .map(|i| {
                grid.place_building(&kind(1, 1), i * 2, 0, PlacementMode::Ground)
                    .unwrap()
            })
            .collect();
        grid.create_connection(ids[0], ids[1]);
        grid.refresh_thermal_efficiency();

        let first = grid.building(ids[0]).unwrap();
        assert!((first.thermal_efficiency - 1.15).abs() < 1e-12);
        assert_eq!(grid.building(ids[2]).unwrap().thermal_efficiency, 1.0);
    }

    #[test]
    fn clear_keeps_stack_zones() {
        let mut grid = grid_with_zone();
        let a = grid
            .place_building(&kind(1, 1), 2, 2, PlacementMode::Stack)
            .unwrap();
        let b = grid
            .place_building(&kind(1, 1), 0, 0, PlacementMode::Ground)
            .unwrap();
        grid.create_connection(a, b);
        grid.add_rover(a, b);

        grid.clear();
        assert!(grid.buildings().is_empty());
        assert!(grid.connections().is_empty());
        assert!(grid.rovers().is_empty());
        assert!(grid.cell(2, 2).unwrap().occupants.is_empty());
        assert!(grid.is_stack_zone(2, 2));
        assert!(grid.building(a).is_none());
    }
}
