//! Building definition import
//!
//! Scans a directory tree for `*.building` files and loads them into the
//! catalog database. A definition looks like:
//!
//! ```text
//! # Compute core
//! name = "CPU Center"
//! size = 2x2
//! processing = 10
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};
use regex::Regex;
use rusqlite::Connection;
use walkdir::WalkDir;

use crate::catalog::{BuildingType, CatalogError};
use crate::db;

pub const DEFINITION_EXTENSION: &str = "building";

/// Find all building definition files under `dir`, sorted by path
pub fn find_definition_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_file()
            && path
                .extension()
                .is_some_and(|ext| ext == DEFINITION_EXTENSION)
        {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Parse one definition. `path` is only used in error messages.
pub fn parse_definition(content: &str, path: &Path) -> Result<BuildingType, CatalogError> {
    let name_re = Regex::new(r#"(?m)^\s*name\s*=\s*"([^"]*)"\s*$"#)?;
    let size_re = Regex::new(r"(?m)^\s*size\s*=\s*(\S+)\s*$")?;
    let dims_re = Regex::new(r"^(\d+)\s*[xX]\s*(\d+)$")?;
    let processing_re = Regex::new(r"(?m)^\s*processing\s*=\s*(\S+)\s*$")?;

    let missing = |field| CatalogError::MissingField {
        path: path.to_path_buf(),
        field,
    };
    let invalid = |field, value: &str| CatalogError::InvalidField {
        path: path.to_path_buf(),
        field,
        value: value.to_string(),
    };

    let name = name_re
        .captures(content)
        .map(|cap| cap[1].to_string())
        .ok_or_else(|| missing("name"))?;

    let size = size_re
        .captures(content)
        .map(|cap| cap[1].to_string())
        .ok_or_else(|| missing("size"))?;
    let dims = dims_re.captures(&size).ok_or_else(|| invalid("size", &size))?;
    let width = dims[1].parse::<u32>().map_err(|_| invalid("size", &size))?;
    let height = dims[2].parse::<u32>().map_err(|_| invalid("size", &size))?;

    let processing_raw = processing_re
        .captures(content)
        .map(|cap| cap[1].to_string())
        .ok_or_else(|| missing("processing"))?;
    let processing = processing_raw
        .parse::<f64>()
        .map_err(|_| invalid("processing", &processing_raw))?;

    BuildingType::new(name, width, height, processing)
}

/// Import every definition under `dir` into the catalog database
pub fn import_to_database(conn: &Connection, dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    info!("Scanning {} for building definitions", dir.display());
    let files = find_definition_files(dir)?;
    info!("Found {} definition files", files.len());

    for path in &files {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        match parse_definition(&content, path) {
            Ok(building_type) => {
                let source = path.display().to_string();
                db::upsert_building_type(conn, &building_type, Some(&source))?;
                info!(
                    "  Imported: {} ({}x{}, processing {})",
                    building_type.name(),
                    building_type.width(),
                    building_type.height(),
                    building_type.processing()
                );
                stats.imported += 1;
            }
            Err(e) => {
                warn!("  Error parsing {}: {}", path.display(), e);
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub imported: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} building types. Errors: {}",
            self.imported, self.errors
        )
    }
}
