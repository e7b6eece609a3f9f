//! Thermal analysis over the placement grid
//!
//! The thermal map is rebuilt from scratch on every update: heat from each
//! building's footprint, then a single diffusion pass to the four axis
//! neighbours. This is a heuristic model, not a heat-equation solver.

use std::fmt;

use log::debug;

use crate::grid::Grid;
use crate::models::{Building, BuildingId};

/// Thresholds and coefficients for the thermal model
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalConfig {
    /// Ambient temperature in °C, the reset value for every cell
    pub ambient: f64,
    /// Temperatures strictly above this are warnings
    pub heat_threshold: f64,
    /// Temperatures strictly above this are critical
    pub max_temperature: f64,
    /// Fraction of a cell's excess heat spread per diffusion pass
    pub diffusion_rate: f64,
    /// Smallest dissipation used as a divisor when accumulating heat
    pub min_dissipation: f64,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            ambient: 25.0,
            heat_threshold: 85.0,
            max_temperature: 100.0,
            diffusion_rate: 0.1,
            min_dissipation: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalCell {
    pub temperature: f64,
    pub heat_dissipation: f64,
}

/// Per-cell temperatures, same dimensions as the grid, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalMap {
    width: u32,
    height: u32,
    cells: Vec<ThermalCell>,
}

impl ThermalMap {
    fn ambient(width: u32, height: u32, ambient: f64) -> Self {
        Self {
            width,
            height,
            cells: vec![
                ThermalCell {
                    temperature: ambient,
                    heat_dissipation: 0.0,
                };
                width as usize * height as usize
            ],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<&ThermalCell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(y as usize * self.width as usize + x as usize)
    }

    fn get_mut(&mut self, x: u32, y: u32) -> Option<&mut ThermalCell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get_mut(y as usize * self.width as usize + x as usize)
    }

    /// Cells with their coordinates, in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, &ThermalCell)> + '_ {
        let width = self.width.max(1);
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, c)| (i as u32 % width, i as u32 / width, c))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThermalIssue {
    pub x: u32,
    pub y: u32,
    pub temperature: f64,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EfficiencyScore {
    pub average_temperature: f64,
    /// 0 to 100, falling linearly as the mean rises above ambient
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct ThermalAnalysis {
    config: ThermalConfig,
    map: ThermalMap,
}

impl ThermalAnalysis {
    pub fn new(width: u32, height: u32, config: ThermalConfig) -> Self {
        let map = ThermalMap::ambient(width, height, config.ambient);
        Self { config, map }
    }

    pub fn for_grid(grid: &Grid) -> Self {
        Self::new(grid.width(), grid.height(), ThermalConfig::default())
    }

    pub fn thermal_map(&self) -> &ThermalMap {
        &self.map
    }

    pub fn temperature_at(&self, x: u32, y: u32) -> Option<f64> {
        self.map.get(x, y).map(|c| c.temperature)
    }

    /// Surface-area-to-volume ratio of a unit-depth prism
    pub fn calculate_sav_ratio(&self, building: &Building) -> f64 {
        building.surface_area_to_volume_ratio()
    }

    /// Dissipation rate of a building; lower means more heat is retained.
    ///
    /// Can be zero or negative for heavily stacked, compact buildings.
    pub fn calculate_heat_dissipation(&self, building: &Building) -> f64 {
        let ratio = self.calculate_sav_ratio(building);
        let base_heat = building.processing * 0.8;
        let dissipation_efficiency = 0.7 + ratio * 0.1;
        let stack_penalty = if building.is_stacked {
            0.2 * building.stack_level as f64
        } else {
            0.0
        };

        base_heat * (dissipation_efficiency - stack_penalty)
    }

    /// Rebuild the thermal map from the grid's current buildings
    pub fn update_thermal_map(&mut self, grid: &Grid) {
        self.map = ThermalMap::ambient(grid.width(), grid.height(), self.config.ambient);

        for building in grid.buildings() {
            let dissipation = self
                .calculate_heat_dissipation(building)
                .max(self.config.min_dissipation);
            let heat_accumulation = building.processing / dissipation;

            for (x, y) in building.footprint() {
                if let Some(cell) = self.map.get_mut(x, y) {
                    cell.temperature += heat_accumulation;
                    cell.heat_dissipation = dissipation;
                }
            }
        }

        self.simulate_heat_diffusion();
        debug!("thermal map updated for {} buildings", grid.buildings().len());
    }

    /// One diffusion pass. Reads come from a snapshot; heat spread towards
    /// out-of-bounds neighbours is lost.
    pub fn simulate_heat_diffusion(&mut self) {
        let snapshot = self.map.clone();
        let (width, height) = (self.map.width as i64, self.map.height as i64);
        let ambient = self.config.ambient;

        for (x, y, cell) in snapshot.iter() {
            if cell.temperature <= ambient {
                continue;
            }
            let spread = (cell.temperature - ambient) * self.config.diffusion_rate;
            let (x, y) = (x as i64, y as i64);

            for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
                if nx >= 0 && nx < width && ny >= 0 && ny < height {
                    if let Some(neighbour) = self.map.get_mut(nx as u32, ny as u32) {
                        neighbour.temperature += spread / 4.0;
                    }
                }
            }

            if let Some(source) = self.map.get_mut(x as u32, y as u32) {
                source.temperature -= spread;
            }
        }
    }

    /// Cells above the warning threshold, in row-major order
    pub fn check_thermal_issues(&self) -> Vec<ThermalIssue> {
        self.map
            .iter()
            .filter_map(|(x, y, cell)| {
                let t = cell.temperature;
                let (severity, message) = if t > self.config.max_temperature {
                    (
                        Severity::Critical,
                        format!("Critical temperature of {:.1}°C at ({},{})", t, x, y),
                    )
                } else if t > self.config.heat_threshold {
                    (
                        Severity::Warning,
                        format!("High temperature of {:.1}°C at ({},{})", t, x, y),
                    )
                } else {
                    return None;
                };

                Some(ThermalIssue {
                    x,
                    y,
                    temperature: t,
                    severity,
                    message,
                })
            })
            .collect()
    }

    pub fn get_thermal_efficiency_score(&self) -> EfficiencyScore {
        let count = self.map.cells.len();
        let average_temperature = if count == 0 {
            self.config.ambient
        } else {
            self.map.cells.iter().map(|c| c.temperature).sum::<f64>() / count as f64
        };
        let score = (100.0 - (average_temperature - self.config.ambient) * 2.0).clamp(0.0, 100.0);

        EfficiencyScore {
            average_temperature,
            score,
        }
    }

    /// Snapshot of score, issues and per-building geometry figures
    pub fn report(&self, grid: &Grid) -> ThermalReport {
        let efficiency = self.get_thermal_efficiency_score();
        let buildings = grid
            .buildings()
            .iter()
            .map(|b| BuildingThermals {
                id: b.id,
                kind: b.kind.clone(),
                x: b.x,
                y: b.y,
                stack_level: b.stack_level,
                sav_ratio: self.calculate_sav_ratio(b),
                heat_dissipation: self.calculate_heat_dissipation(b),
                heat_output: b.heat_output(),
            })
            .collect();

        ThermalReport {
            average_temperature: efficiency.average_temperature,
            score: efficiency.score,
            issues: self.check_thermal_issues(),
            buildings,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuildingThermals {
    pub id: BuildingId,
    pub kind: String,
    pub x: u32,
    pub y: u32,
    pub stack_level: u32,
    pub sav_ratio: f64,
    pub heat_dissipation: f64,
    pub heat_output: f64,
}

#[derive(Debug, Clone)]
pub struct ThermalReport {
    pub average_temperature: f64,
    pub score: f64,
    pub issues: Vec<ThermalIssue>,
    pub buildings: Vec<BuildingThermals>,
}

const LISTED_ISSUES: usize = 5;

impl fmt::Display for ThermalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Thermal Analysis Report ===")?;
        writeln!(f, "Average temperature: {:.1}°C", self.average_temperature)?;
        writeln!(f, "Thermal efficiency score: {:.1}/100", self.score)?;
        writeln!(f)?;

        if self.issues.is_empty() {
            writeln!(f, "No thermal issues detected.")?;
        } else {
            writeln!(f, "Thermal issues ({}):", self.issues.len())?;
            for issue in self.issues.iter().take(LISTED_ISSUES) {
                writeln!(f, "  [{}] {}", issue.severity, issue.message)?;
            }
            if self.issues.len() > LISTED_ISSUES {
                writeln!(
                    f,
                    "  ...and {} more issues",
                    self.issues.len() - LISTED_ISSUES
                )?;
            }
        }
        writeln!(f)?;

        writeln!(f, "Surface area/volume analysis:")?;
        for b in &self.buildings {
            writeln!(
                f,
                "  {} at ({},{}) L{}: SA/V {:.2}, dissipation {:.2}, heat output {:.2}",
                b.kind, b.x, b.y, b.stack_level, b.sav_ratio, b.heat_dissipation, b.heat_output
            )?;
        }

        Ok(())
    }
}
