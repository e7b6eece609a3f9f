//! Mars base layout
//!
//! Place processing buildings on a grid, stack them in stack zones, link
//! them into a network and analyse the resulting thermal load.

pub mod catalog;
pub mod db;
pub mod grid;
pub mod import;
pub mod models;
pub mod scenario;
pub mod session;
pub mod thermal;

pub use catalog::{BuildingType, Catalog, CatalogError};
pub use grid::Grid;
pub use models::{Building, BuildingId, Connection, ConnectionId, PlacementMode, Rover, RoverId};
pub use session::{LayoutSession, SessionConfig};
pub use thermal::{ThermalAnalysis, ThermalConfig, ThermalReport};
