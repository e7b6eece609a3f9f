//! Catalog database schema and operations
//!
//! Only building types live here. Grid layouts are never persisted.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::catalog::{BuildingType, Catalog};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Placeable building types (the palette)
        CREATE TABLE IF NOT EXISTS building_types (
            name TEXT PRIMARY KEY,
            width INTEGER NOT NULL,
            height INTEGER NOT NULL,
            processing REAL NOT NULL,
            source TEXT
        );
        "#,
    )?;
    Ok(())
}

/// Insert or replace a building type. `source` records where it came from.
pub fn upsert_building_type(
    conn: &Connection,
    building_type: &BuildingType,
    source: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO building_types (name, width, height, processing, source)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            building_type.name(),
            building_type.width(),
            building_type.height(),
            building_type.processing(),
            source,
        ),
    )?;
    Ok(())
}

/// Clear all building types
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch("DELETE FROM building_types;")?;
    Ok(())
}

fn row_to_type(name: String, width: u32, height: u32, processing: f64) -> Result<BuildingType> {
    BuildingType::new(name.clone(), width, height, processing)
        .with_context(|| format!("invalid building type '{}' in catalog database", name))
}

/// List all building types, validated, ordered by name
pub fn list_building_types(conn: &Connection) -> Result<Vec<BuildingType>> {
    let mut stmt =
        conn.prepare("SELECT name, width, height, processing FROM building_types ORDER BY name")?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, u32>(1)?,
            row.get::<_, u32>(2)?,
            row.get::<_, f64>(3)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (name, width, height, processing) = row?;
        results.push(row_to_type(name, width, height, processing)?);
    }
    Ok(results)
}

/// Get a single building type by exact name
pub fn get_building_type(conn: &Connection, name: &str) -> Result<Option<BuildingType>> {
    let row = conn
        .query_row(
            "SELECT name, width, height, processing FROM building_types WHERE name = ?1",
            [name],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            },
        )
        .optional()?;

    row.map(|(name, width, height, processing)| row_to_type(name, width, height, processing))
        .transpose()
}

/// Where a stored type came from, if recorded
pub fn get_type_source(conn: &Connection, name: &str) -> Result<Option<String>> {
    let source = conn
        .query_row(
            "SELECT source FROM building_types WHERE name = ?1",
            [name],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(source.flatten())
}

/// Load every stored type into a validated catalog
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let types = list_building_types(conn)?;
    Ok(Catalog::new(types)?)
}

/// Store every type of `catalog`, replacing entries with the same name
pub fn store_catalog(conn: &Connection, catalog: &Catalog, source: &str) -> Result<usize> {
    for building_type in catalog.types() {
        upsert_building_type(conn, building_type, Some(source))?;
    }
    Ok(catalog.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn builtin_catalog_round_trips() {
        let conn = memory_db();
        let stored = store_catalog(&conn, &Catalog::builtin(), "builtin").unwrap();
        assert_eq!(stored, 3);

        let catalog = load_catalog(&conn).unwrap();
        assert_eq!(catalog.len(), 3);
        // Ordered by name
        assert_eq!(catalog.types()[0].name(), "CPU Center");

        let io = get_building_type(&conn, "IO Market").unwrap().unwrap();
        assert_eq!((io.width(), io.height(), io.processing()), (2, 1, 7.0));
        assert_eq!(
            get_type_source(&conn, "IO Market").unwrap().as_deref(),
            Some("builtin")
        );
        assert!(get_building_type(&conn, "Reactor").unwrap().is_none());
    }

    #[test]
    fn invalid_rows_fail_validation() {
        let conn = memory_db();
        conn.execute(
            "INSERT INTO building_types (name, width, height, processing) VALUES ('Flat', 0, 3, 1.0)",
            [],
        )
        .unwrap();
        assert!(list_building_types(&conn).is_err());
    }

    #[test]
    fn clear_removes_all_types() {
        let conn = memory_db();
        store_catalog(&conn, &Catalog::builtin(), "builtin").unwrap();
        clear_catalog(&conn).unwrap();
        assert!(list_building_types(&conn).unwrap().is_empty());
    }
}
