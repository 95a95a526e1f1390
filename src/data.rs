use crate::error::{JoinError, Result};
use crate::types::Region;
use geo::{Geometry, MultiPolygon};
use geojson::{feature::Id, GeoJson, JsonObject, Value};
use shapefile::dbase::FieldValue;
use shapefile::Reader;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

/// Loads every region of a boundary dataset, keyed by `id_field`.
///
/// The format is picked from the extension: `.json`/`.geojson` for a GeoJSON
/// FeatureCollection, `.shp` for an ESRI Shapefile with its `.dbf` sidecar.
pub fn load_boundaries(path: &Path, id_field: &str) -> Result<Vec<Region>> {
    fs::metadata(path).map_err(|e| JoinError::io(path, e))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| JoinError::parse(path, "boundary file has no extension"))?;

    let regions = match extension.as_str() {
        "json" | "geojson" => load_geojson(path, id_field)?,
        "shp" => load_shapefile(path, id_field)?,
        _ => {
            return Err(JoinError::parse(
                path,
                format!("unsupported boundary format: {}", extension),
            ))
        }
    };

    info!(count = regions.len(), path = %path.display(), "loaded boundaries");
    Ok(regions)
}

fn load_geojson(path: &Path, id_field: &str) -> Result<Vec<Region>> {
    debug!("Loading GeoJSON from {:?}...", path);
    let file = File::open(path).map_err(|e| JoinError::io(path, e))?;
    let reader = BufReader::new(file);

    let geojson = GeoJson::from_reader(reader).map_err(|e| JoinError::parse(path, e.to_string()))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(JoinError::parse(path, "GeoJSON must be a FeatureCollection")),
    };

    let mut regions = Vec::with_capacity(collection.features.len());

    for (n, feature) in collection.features.into_iter().enumerate() {
        // 1. Identifier: the configured property first, then the feature's own id
        let from_props = feature
            .properties
            .as_ref()
            .and_then(|props| props.get(id_field))
            .filter(|v| !v.is_null());
        let id = match (from_props, &feature.id) {
            (Some(serde_json::Value::String(s)), _) => s.clone(),
            (Some(serde_json::Value::Number(num)), _) => num.to_string(),
            (Some(other), _) => {
                return Err(JoinError::parse(
                    path,
                    format!("feature #{} has a non-scalar '{}' property: {}", n, id_field, other),
                ))
            }
            (None, Some(Id::String(s))) => s.clone(),
            (None, Some(Id::Number(num))) => num.to_string(),
            (None, None) => {
                return Err(JoinError::parse(
                    path,
                    format!("feature #{} has neither a '{}' property nor an id", n, id_field),
                ))
            }
        };

        // 2. Geometry
        let geometry = match feature.geometry {
            Some(geom) => match geom.value {
                Value::Polygon(_) | Value::MultiPolygon(_) => {
                    let converted: Geometry<f64> = geom.value.try_into().map_err(|e: geojson::Error| {
                        JoinError::parse(path, format!("region '{}': {}", id, e))
                    })?;
                    converted
                }
                other => {
                    return Err(JoinError::parse(
                        path,
                        format!(
                            "region '{}' has a {} geometry, expected Polygon or MultiPolygon",
                            id,
                            value_kind(&other)
                        ),
                    ))
                }
            },
            None => return Err(JoinError::parse(path, format!("region '{}' has no geometry", id))),
        };

        let mut properties = feature.properties.unwrap_or_default();
        let slot = properties
            .entry(id_field.to_string())
            .or_insert(serde_json::Value::Null);
        if slot.is_null() {
            *slot = serde_json::Value::String(id.clone());
        }

        regions.push(Region {
            id,
            geometry,
            properties,
            feature_id: feature.id,
        });
    }

    Ok(regions)
}

fn load_shapefile(path: &Path, id_field: &str) -> Result<Vec<Region>> {
    debug!("Loading Shapefile from {:?}...", path);
    let mut reader = Reader::from_path(path).map_err(|e| JoinError::parse(path, e.to_string()))?;

    let mut regions = Vec::new();

    for (n, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result.map_err(|e| JoinError::parse(path, e.to_string()))?;

        let id_value = record.get(id_field).ok_or_else(|| {
            JoinError::parse(path, format!("join column '{}' not found in Shapefile", id_field))
        })?;

        let id = match id_value {
            FieldValue::Character(Some(s)) => s.trim().to_string(),
            FieldValue::Numeric(Some(v)) => format_numeric_id(*v),
            _ => {
                return Err(JoinError::parse(
                    path,
                    format!("record #{} has an empty or non-text '{}' value", n, id_field),
                ))
            }
        };

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon
                .try_into()
                .map_err(|e| JoinError::parse(path, format!("region '{}': {:?}", id, e)))?,
            shapefile::Shape::PolygonM(polygon) => polygon
                .try_into()
                .map_err(|e| JoinError::parse(path, format!("region '{}': {:?}", id, e)))?,
            shapefile::Shape::PolygonZ(polygon) => polygon
                .try_into()
                .map_err(|e| JoinError::parse(path, format!("region '{}': {:?}", id, e)))?,
            other => {
                return Err(JoinError::parse(
                    path,
                    format!("region '{}' has a {:?} shape, expected a polygon", id, other.shapetype()),
                ))
            }
        };

        let mut properties = JsonObject::new();
        properties.insert(id_field.to_string(), serde_json::Value::String(id.clone()));

        regions.push(Region {
            id,
            geometry: Geometry::MultiPolygon(geometry),
            properties,
            feature_id: None,
        });
    }

    Ok(regions)
}

// dBase stores numbers as floats; integral codes must not pick up a ".0"
fn format_numeric_id(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}
