//! Layout session: grid, thermal analysis and catalog working together
//!
//! Every successful mutation refreshes connectivity efficiency and the
//! thermal map, so queries always see the current layout.

use log::{debug, warn};

use crate::catalog::{BuildingType, Catalog};
use crate::grid::Grid;
use crate::models::{BuildingId, PlacementMode, RoverId};
use crate::thermal::{
    EfficiencyScore, Severity, ThermalAnalysis, ThermalConfig, ThermalIssue, ThermalReport,
};

pub const DEFAULT_GRID_WIDTH: u32 = 10;
pub const DEFAULT_GRID_HEIGHT: u32 = 8;

/// Minimum number of buildings for a winning layout
pub const WIN_MIN_BUILDINGS: usize = 5;
/// Minimum number of stacked buildings for a winning layout
pub const WIN_MIN_STACKED: usize = 2;
/// Minimum thermal efficiency score for a winning layout
pub const WIN_MIN_SCORE: f64 = 75.0;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub grid_width: u32,
    pub grid_height: u32,
    pub stack_zones: Vec<(i64, i64)>,
    pub thermal: ThermalConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grid_width: DEFAULT_GRID_WIDTH,
            grid_height: DEFAULT_GRID_HEIGHT,
            stack_zones: (2..=4)
                .flat_map(|y| (2..=4).map(move |x| (x, y)))
                .collect(),
            thermal: ThermalConfig::default(),
        }
    }
}

#[derive(Debug)]
pub struct LayoutSession {
    catalog: Catalog,
    grid: Grid,
    thermal: ThermalAnalysis,
}

impl LayoutSession {
    pub fn new(catalog: Catalog, config: SessionConfig) -> Self {
        let mut grid = Grid::new(config.grid_width, config.grid_height);
        grid.set_stack_zones(&config.stack_zones);
        let thermal = ThermalAnalysis::new(config.grid_width, config.grid_height, config.thermal);

        let mut session = Self {
            catalog,
            grid,
            thermal,
        };
        session.refresh();
        session
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn thermal(&self) -> &ThermalAnalysis {
        &self.thermal
    }

    /// Mark extra stack zones. Existing buildings are not affected.
    pub fn add_stack_zones(&mut self, zones: &[(i64, i64)]) {
        self.grid.set_stack_zones(zones);
    }

    /// Recompute connectivity efficiency and the thermal map
    pub fn refresh(&mut self) {
        self.grid.refresh_thermal_efficiency();
        self.thermal.update_thermal_map(&self.grid);
    }

    pub fn place(
        &mut self,
        kind: &BuildingType,
        x: i64,
        y: i64,
        mode: PlacementMode,
    ) -> Option<BuildingId> {
        let Some(id) = self.grid.place_building(kind, x, y, mode) else {
            warn!("cannot place {} at ({},{}) in {:?} mode", kind.name(), x, y, mode);
            return None;
        };
        self.refresh();
        Some(id)
    }

    /// Stack a new building at the origin of an existing one
    pub fn stack_on(&mut self, target: BuildingId, kind: &BuildingType) -> Option<BuildingId> {
        let (x, y) = {
            let b = self.grid.building(target)?;
            (b.x as i64, b.y as i64)
        };
        self.place(kind, x, y, PlacementMode::Stack)
    }

    pub fn connect(&mut self, source: BuildingId, target: BuildingId) -> bool {
        if !self.grid.create_connection(source, target) {
            warn!("cannot connect {} and {}", source, target);
            return false;
        }
        self.refresh();
        true
    }

    /// Connect the topmost buildings under two cells
    pub fn connect_cells(&mut self, from: (i64, i64), to: (i64, i64)) -> bool {
        match self.buildings_at(from, to) {
            Some((source, target)) => self.connect(source, target),
            None => false,
        }
    }

    pub fn add_rover(&mut self, source: BuildingId, target: BuildingId) -> Option<RoverId> {
        let rover = self.grid.add_rover(source, target);
        if rover.is_none() {
            warn!("no connection between {} and {} for a rover", source, target);
        }
        rover
    }

    /// Start a rover between the topmost buildings under two cells
    pub fn add_rover_at(&mut self, from: (i64, i64), to: (i64, i64)) -> Option<RoverId> {
        let (source, target) = self.buildings_at(from, to)?;
        self.add_rover(source, target)
    }

    fn buildings_at(&self, from: (i64, i64), to: (i64, i64)) -> Option<(BuildingId, BuildingId)> {
        let source = self.grid.get_building_at(from.0, from.1)?.id;
        let target = self.grid.get_building_at(to.0, to.1)?.id;
        Some((source, target))
    }

    /// Advance the per-frame animation state
    pub fn tick(&mut self) {
        self.grid.update();
    }

    pub fn clear(&mut self) {
        self.grid.clear();
        self.refresh();
    }

    pub fn issues(&self) -> Vec<ThermalIssue> {
        self.thermal.check_thermal_issues()
    }

    pub fn critical_issues(&self) -> Vec<ThermalIssue> {
        self.issues()
            .into_iter()
            .filter(|issue| issue.severity == Severity::Critical)
            .collect()
    }

    pub fn score(&self) -> EfficiencyScore {
        self.thermal.get_thermal_efficiency_score()
    }

    pub fn report(&self) -> ThermalReport {
        self.thermal.report(&self.grid)
    }

    /// Enough buildings, enough stacking, a cool grid and a fully connected
    /// network
    pub fn check_win_condition(&self) -> bool {
        let buildings = self.grid.buildings();
        if buildings.len() < WIN_MIN_BUILDINGS {
            return false;
        }

        let stacked = buildings.iter().filter(|b| b.is_stacked).count();
        if stacked < WIN_MIN_STACKED {
            return false;
        }

        let score = self.score().score;
        if score < WIN_MIN_SCORE {
            debug!("win check: score {:.1} below {}", score, WIN_MIN_SCORE);
            return false;
        }

        self.grid.connected_building_ids().len() >= buildings.len()
    }
}
