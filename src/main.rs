//! Mars Base Layout
//!
//! Thermal analysis for stacked processing-building layouts.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use mars_base_layout::scenario::{self, Scenario};
use mars_base_layout::session::{DEFAULT_GRID_HEIGHT, DEFAULT_GRID_WIDTH};
use mars_base_layout::{db, import, Catalog, LayoutSession, SessionConfig};

#[derive(Parser)]
#[command(name = "mars-base-layout")]
#[command(about = "Grid placement and thermal analysis for Mars base buildings")]
struct Cli {
    /// Path to the SQLite catalog database
    #[arg(short, long, default_value = "building_catalog.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty catalog database with schema
    Init,

    /// Store the built-in building types (CPU Center, Memory Mall, IO Market)
    LoadSample,

    /// Import *.building definition files from a directory tree
    Import {
        /// Directory to scan
        source_dir: PathBuf,

        /// Clear existing types before importing
        #[arg(long)]
        clear: bool,
    },

    /// List all building types in the catalog
    ListTypes,

    /// Show details for a specific building type
    Type {
        /// Building type name
        name: String,
    },

    /// Replay a scenario script and print the thermal report
    Run {
        /// Scenario script path
        script: PathBuf,

        /// Grid width in cells
        #[arg(long, default_value_t = DEFAULT_GRID_WIDTH)]
        width: u32,

        /// Grid height in cells
        #[arg(long, default_value_t = DEFAULT_GRID_HEIGHT)]
        height: u32,

        /// Print the outcome of every step
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Catalog database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            db::clear_catalog(&conn)?;
            let count = db::store_catalog(&conn, &Catalog::builtin(), "builtin")?;
            println!("Loaded {} sample building types", count);
        }

        Commands::Import { source_dir, clear } => {
            if clear {
                println!("Clearing existing building types...");
                db::clear_catalog(&conn)?;
            }

            let stats = import::import_to_database(&conn, &source_dir)?;
            println!("{}", stats);
        }

        Commands::ListTypes => {
            let types = db::list_building_types(&conn)?;
            if types.is_empty() {
                println!("No building types in catalog. Run 'import' or 'load-sample' first.");
            } else {
                println!(
                    "{:<24} {:>6} {:>12} {:>8}",
                    "Building type", "Size", "Processing", "SA/V"
                );
                println!("{}", "-".repeat(53));
                for t in types {
                    println!(
                        "{:<24} {:>6} {:>12.1} {:>8.2}",
                        t.name(),
                        format!("{}x{}", t.width(), t.height()),
                        t.processing(),
                        t.surface_area_to_volume_ratio()
                    );
                }
            }
        }

        Commands::Type { name } => match db::get_building_type(&conn, &name)? {
            Some(t) => {
                println!("Building type: {}", t.name());
                println!("  Size: {}x{}", t.width(), t.height());
                println!("  Processing: {}", t.processing());
                println!("  SA/V ratio: {:.2}", t.surface_area_to_volume_ratio());
                if let Some(source) = db::get_type_source(&conn, t.name())? {
                    println!("  Source: {}", source);
                }
            }
            None => println!("Building type '{}' not found", name),
        },

        Commands::Run {
            script,
            width,
            height,
            verbose,
        } => {
            let mut catalog = db::load_catalog(&conn)?;
            if catalog.is_empty() {
                println!("Catalog is empty, using built-in building types.");
                catalog = Catalog::builtin();
            }

            let source = fs::read_to_string(&script)
                .with_context(|| format!("Failed to read {}", script.display()))?;
            let scenario = Scenario::parse(&source, &catalog)
                .with_context(|| format!("Invalid scenario {}", script.display()))?;

            let config = SessionConfig {
                grid_width: width,
                grid_height: height,
                ..SessionConfig::default()
            };
            let mut session = LayoutSession::new(catalog, config);
            let outcomes = scenario::run(&mut session, &scenario);

            let rejected = outcomes.iter().filter(|o| o.is_rejected()).count();
            for outcome in &outcomes {
                if verbose || outcome.is_rejected() {
                    println!("{}", outcome);
                }
            }
            if rejected > 0 {
                println!("{} of {} steps rejected", rejected, outcomes.len());
            }

            println!();
            println!("{}", session.report());

            if let Some(critical) = session.critical_issues().first() {
                println!("Warning: Critical temperature detected! {}", critical.message);
            }
            if session.check_win_condition() {
                println!("Layout meets the stacking, connectivity and thermal goals.");
            }
        }
    }

    Ok(())
}
