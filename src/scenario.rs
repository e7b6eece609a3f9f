//! Scenario scripts: replay layout requests without a UI
//!
//! One command per line, `#` starts a comment:
//!
//! ```text
//! zone 5..6 5..6
//! place "CPU Center" 0 0
//! stack "Memory Mall" 2 2
//! connect 0 0 -> 2 2
//! rover 0 0 -> 2 2
//! tick 30
//! report
//! clear
//! ```

use std::fmt;

use log::info;
use regex::Regex;
use thiserror::Error;

use crate::catalog::{BuildingType, Catalog};
use crate::models::PlacementMode;
use crate::session::LayoutSession;
use crate::thermal::ThermalReport;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("line {line}: unknown building type '{name}'")]
    UnknownType { line: usize, name: String },
    #[error("line {line}: cannot parse '{text}'")]
    Syntax { line: usize, text: String },
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Mark every cell in the inclusive ranges as a stack zone
    Zone {
        xs: (i64, i64),
        ys: (i64, i64),
    },
    Place {
        kind: BuildingType,
        x: i64,
        y: i64,
        mode: PlacementMode,
    },
    Connect {
        from: (i64, i64),
        to: (i64, i64),
    },
    Rover {
        from: (i64, i64),
        to: (i64, i64),
    },
    Tick(u32),
    Clear,
    Report,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub line: usize,
    pub command: Command,
}

#[derive(Debug, Clone, Default)]
pub struct Scenario {
    pub steps: Vec<Step>,
}

struct Patterns {
    zone: Regex,
    place: Regex,
    link: Regex,
    tick: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            zone: Regex::new(r"^zone\s+(-?\d+)(?:\.\.(-?\d+))?\s+(-?\d+)(?:\.\.(-?\d+))?$")?,
            place: Regex::new(r#"^(place|stack)\s+"([^"]+)"\s+(-?\d+)\s+(-?\d+)$"#)?,
            link: Regex::new(r"^(connect|rover)\s+(-?\d+)\s+(-?\d+)\s*->\s*(-?\d+)\s+(-?\d+)$")?,
            tick: Regex::new(r"^tick(?:\s+(\d+))?$")?,
        })
    }
}

fn number<T: std::str::FromStr>(text: &str, line: usize, raw: &str) -> Result<T, ScenarioError> {
    text.parse().map_err(|_| ScenarioError::Syntax {
        line,
        text: raw.to_string(),
    })
}

impl Scenario {
    /// Parse a script, resolving building types against `catalog`
    pub fn parse(source: &str, catalog: &Catalog) -> Result<Self, ScenarioError> {
        let patterns = Patterns::new()?;
        let mut steps = Vec::new();

        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let text = raw.split('#').next().unwrap_or("").trim();
            if text.is_empty() {
                continue;
            }
            let syntax = || ScenarioError::Syntax {
                line,
                text: text.to_string(),
            };

            let command = if text == "clear" {
                Command::Clear
            } else if text == "report" {
                Command::Report
            } else if let Some(cap) = patterns.tick.captures(text) {
                let count = match cap.get(1) {
                    Some(m) => number(m.as_str(), line, text)?,
                    None => 1,
                };
                Command::Tick(count)
            } else if let Some(cap) = patterns.zone.captures(text) {
                let x1: i64 = number(&cap[1], line, text)?;
                let x2 = match cap.get(2) {
                    Some(m) => number(m.as_str(), line, text)?,
                    None => x1,
                };
                let y1: i64 = number(&cap[3], line, text)?;
                let y2 = match cap.get(4) {
                    Some(m) => number(m.as_str(), line, text)?,
                    None => y1,
                };
                Command::Zone {
                    xs: (x1.min(x2), x1.max(x2)),
                    ys: (y1.min(y2), y1.max(y2)),
                }
            } else if let Some(cap) = patterns.place.captures(text) {
                let kind = catalog
                    .get(&cap[2])
                    .ok_or_else(|| ScenarioError::UnknownType {
                        line,
                        name: cap[2].to_string(),
                    })?
                    .clone();
                let mode = if &cap[1] == "stack" {
                    PlacementMode::Stack
                } else {
                    PlacementMode::Ground
                };
                Command::Place {
                    kind,
                    x: number(&cap[3], line, text)?,
                    y: number(&cap[4], line, text)?,
                    mode,
                }
            } else if let Some(cap) = patterns.link.captures(text) {
                let from = (number(&cap[2], line, text)?, number(&cap[3], line, text)?);
                let to = (number(&cap[4], line, text)?, number(&cap[5], line, text)?);
                if &cap[1] == "connect" {
                    Command::Connect { from, to }
                } else {
                    Command::Rover { from, to }
                }
            } else {
                return Err(syntax());
            };

            steps.push(Step { line, command });
        }

        Ok(Self { steps })
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Applied(String),
    Rejected(String),
    Report(ThermalReport),
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub line: usize,
    pub outcome: Outcome,
}

impl StepOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self.outcome, Outcome::Rejected(_))
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Applied(message) => write!(f, "line {}: {}", self.line, message),
            Outcome::Rejected(message) => write!(f, "line {}: rejected: {}", self.line, message),
            Outcome::Report(report) => write!(f, "line {}: report\n{}", self.line, report),
        }
    }
}

fn applied_if(ok: bool, applied: String, rejected: String) -> Outcome {
    if ok {
        Outcome::Applied(applied)
    } else {
        Outcome::Rejected(rejected)
    }
}

/// Run every step against `session`, one outcome per step
pub fn run(session: &mut LayoutSession, scenario: &Scenario) -> Vec<StepOutcome> {
    let mut outcomes = Vec::with_capacity(scenario.steps.len());

    for step in &scenario.steps {
        let outcome = match &step.command {
            Command::Zone { xs, ys } => {
                // Only in-grid cells are collected
                let max_x = session.grid().width() as i64 - 1;
                let max_y = session.grid().height() as i64 - 1;
                let (x1, x2) = (xs.0.max(0), xs.1.min(max_x));
                let (y1, y2) = (ys.0.max(0), ys.1.min(max_y));
                let cells: Vec<(i64, i64)> = (y1..=y2)
                    .flat_map(|y| (x1..=x2).map(move |x| (x, y)))
                    .collect();
                session.add_stack_zones(&cells);
                Outcome::Applied(format!("marked {} stack zone cells", cells.len()))
            }
            Command::Place { kind, x, y, mode } => match session.place(kind, *x, *y, *mode) {
                Some(id) => {
                    let level = session
                        .grid()
                        .building(id)
                        .map_or(0, |b| b.stack_level);
                    let stack_text = match mode {
                        PlacementMode::Stack => format!(" at stack level {}", level),
                        PlacementMode::Ground => String::new(),
                    };
                    Outcome::Applied(format!(
                        "{} placed at ({},{}){}",
                        kind.name(),
                        x,
                        y,
                        stack_text
                    ))
                }
                None => Outcome::Rejected(format!("cannot place {} at ({},{})", kind.name(), x, y)),
            },
            Command::Connect { from, to } => applied_if(
                session.connect_cells(*from, *to),
                format!("connected {:?} to {:?}", from, to),
                format!("cannot connect {:?} to {:?}", from, to),
            ),
            Command::Rover { from, to } => applied_if(
                session.add_rover_at(*from, *to).is_some(),
                format!("rover added between {:?} and {:?}", from, to),
                format!("no connection between {:?} and {:?}", from, to),
            ),
            Command::Tick(count) => {
                for _ in 0..*count {
                    session.tick();
                }
                Outcome::Applied(format!("advanced {} ticks", count))
            }
            Command::Clear => {
                session.clear();
                Outcome::Applied("grid cleared".to_string())
            }
            Command::Report => Outcome::Report(session.report()),
        };

        let step_outcome = StepOutcome {
            line: step.line,
            outcome,
        };
        if !matches!(step_outcome.outcome, Outcome::Report(_)) {
            info!("{}", step_outcome);
        }
        outcomes.push(step_outcome);
    }

    outcomes
}
