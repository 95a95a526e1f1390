use crate::config::OutputConfig;
use crate::error::{JoinError, Result};
use crate::join::RegionIndex;
use crate::types::JoinedRegion;
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, Value};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

/// One feature per region, in index order, carrying the population under
/// `population_field`.
pub fn to_feature_collection(index: &RegionIndex, population_field: &str) -> FeatureCollection {
    let features = index
        .iter()
        .map(|region| to_feature(region, population_field))
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn to_feature(joined: &JoinedRegion, population_field: &str) -> Feature {
    let mut properties = joined.region.properties.clone();
    properties.insert(
        population_field.to_string(),
        serde_json::Value::from(joined.population),
    );

    let id = match &joined.region.feature_id {
        Some(Id::Number(n)) if n.to_string() == joined.region.id => Id::Number(n.clone()),
        _ => Id::String(joined.region.id.clone()),
    };

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::from(&joined.region.geometry))),
        id: Some(id),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Serializes the joined dataset and replaces `config.path` with it.
///
/// The document goes to a temporary file next to the destination and is
/// renamed into place only once fully written and synced, so the
/// destination never holds a truncated document. The temporary file is
/// removed on every failure path.
pub fn write_geojson(index: &RegionIndex, config: &OutputConfig) -> Result<()> {
    let path = config.path.as_path();
    let collection = to_feature_collection(index, &config.population_field);

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| JoinError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| JoinError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        if config.pretty {
            serde_json::to_writer_pretty(&mut writer, &collection)?;
        } else {
            serde_json::to_writer(&mut writer, &collection)?;
        }
        writer.flush().map_err(|e| JoinError::io(path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| JoinError::io(path, e))?;
    if let Some(perms) = target_permissions(path) {
        tmp.as_file()
            .set_permissions(perms)
            .map_err(|e| JoinError::io(path, e))?;
    }
    tmp.persist(path).map_err(|e| JoinError::io(path, e.error))?;

    info!(features = index.len(), path = %path.display(), "wrote GeoJSON");
    Ok(())
}

// Temp files are created owner-only; the document must stay readable by
// whatever serves it. An existing destination keeps its own mode.
fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => default_permissions(),
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}
