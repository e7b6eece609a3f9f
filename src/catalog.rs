//! Building type catalog (the placement palette)
//!
//! Entries are validated when they are built, so the rest of the crate can
//! treat a `BuildingType` as well-formed.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("building type name must not be empty")]
    EmptyName,
    #[error("building type '{name}' has zero-sized footprint {width}x{height}")]
    ZeroDimension { name: String, width: u32, height: u32 },
    #[error("building type '{name}' has invalid processing {processing} (must be finite and >= 0)")]
    InvalidProcessing { name: String, processing: f64 },
    #[error("building type '{0}' is defined more than once")]
    DuplicateName(String),
    #[error("{path}: missing '{field}' entry")]
    MissingField { path: PathBuf, field: &'static str },
    #[error("{path}: could not parse '{field}' from '{value}'")]
    InvalidField {
        path: PathBuf,
        field: &'static str,
        value: String,
    },
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

/// A validated palette entry: name, footprint and processing load
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingType {
    name: String,
    width: u32,
    height: u32,
    processing: f64,
}

impl BuildingType {
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        processing: f64,
    ) -> Result<Self, CatalogError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::EmptyName);
        }
        if width == 0 || height == 0 {
            return Err(CatalogError::ZeroDimension {
                name,
                width,
                height,
            });
        }
        if !processing.is_finite() || processing < 0.0 {
            return Err(CatalogError::InvalidProcessing { name, processing });
        }

        Ok(Self {
            name,
            width,
            height,
            processing,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn processing(&self) -> f64 {
        self.processing
    }

    /// Lowercase, dash-separated form of the name ("CPU Center" -> "cpu-center")
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// SA/V ratio of the footprint at unit depth, shown in the palette
    pub fn surface_area_to_volume_ratio(&self) -> f64 {
        let (w, h) = (self.width as f64, self.height as f64);
        (2.0 * (w * h) + 2.0 * w + 2.0 * h) / (w * h)
    }
}

fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Validated set of building types with unique names
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    types: Vec<BuildingType>,
}

impl Catalog {
    pub fn new(types: Vec<BuildingType>) -> Result<Self, CatalogError> {
        let mut seen = std::collections::HashSet::new();
        for t in &types {
            if !seen.insert(t.slug()) {
                return Err(CatalogError::DuplicateName(t.name.clone()));
            }
        }
        Ok(Self { types })
    }

    /// The stock palette: CPU Center, Memory Mall and IO Market
    pub fn builtin() -> Self {
        let types = [
            ("CPU Center", 2, 2, 10.0),
            ("Memory Mall", 1, 2, 5.0),
            ("IO Market", 2, 1, 7.0),
        ]
        .into_iter()
        .map(|(name, width, height, processing)| BuildingType {
            name: name.to_string(),
            width,
            height,
            processing,
        })
        .collect();

        Self { types }
    }

    /// Look up by exact name or slug, ignoring case
    pub fn get(&self, name: &str) -> Option<&BuildingType> {
        let wanted = slugify(name);
        self.types.iter().find(|t| t.slug() == wanted)
    }

    pub fn types(&self) -> &[BuildingType] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_entries() {
        assert!(matches!(
            BuildingType::new("  ", 1, 1, 1.0),
            Err(CatalogError::EmptyName)
        ));
        assert!(matches!(
            BuildingType::new("Flat", 0, 2, 1.0),
            Err(CatalogError::ZeroDimension { .. })
        ));
        assert!(matches!(
            BuildingType::new("Cold", 1, 1, -3.0),
            Err(CatalogError::InvalidProcessing { .. })
        ));
        assert!(matches!(
            BuildingType::new("Weird", 1, 1, f64::NAN),
            Err(CatalogError::InvalidProcessing { .. })
        ));
    }

    #[test]
    fn builtin_palette_matches_stock_types() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.len(), 3);

        let cpu = catalog.get("CPU Center").unwrap();
        assert_eq!((cpu.width(), cpu.height(), cpu.processing()), (2, 2, 10.0));
        assert_eq!(cpu.surface_area_to_volume_ratio(), 4.0);

        let mall = catalog.get("memory-mall").unwrap();
        assert_eq!((mall.width(), mall.height()), (1, 2));

        assert!(catalog.get("io market").is_some());
        assert!(catalog.get("Reactor").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected_by_slug() {
        let a = BuildingType::new("Data Hub", 1, 1, 1.0).unwrap();
        let b = BuildingType::new("data  hub", 2, 2, 2.0).unwrap();
        let err = Catalog::new(vec![a, b]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName(_)));
    }
}
