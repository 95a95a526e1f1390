use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    pub boundaries: PathBuf,
    pub populations: PathBuf,
    /// Property (GeoJSON) or dBase column (Shapefile) holding the region identifier
    pub id_field: String,
    pub population_columns: PopulationColumns,
}

/// Column names used when the population table is a CSV file.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PopulationColumns {
    pub id: String,
    pub population: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub population_field: String,
    pub pretty: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            boundaries: PathBuf::from("src/counties.json"),
            populations: PathBuf::from("src/county-populations.json"),
            id_field: "id".to_string(),
            population_columns: PopulationColumns::default(),
        }
    }
}

impl Default for PopulationColumns {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            population: "population".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("source.geojson"),
            population_field: "population".to_string(),
            pretty: false,
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    /// Defaults when no file is given, otherwise the file's contents.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}
