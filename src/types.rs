use geo::Geometry;
use geojson::{feature::Id, JsonObject};

/// One boundary as read from the dataset, before population is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: String,
    // Always a Polygon or MultiPolygon
    pub geometry: Geometry<f64>,
    // Source attributes, including the identifier property
    pub properties: JsonObject,
    // Top-level GeoJSON id as read, so numeric ids are written back as numbers
    pub feature_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRegion {
    pub region: Region,
    pub population: u64,
}

impl JoinedRegion {
    pub fn id(&self) -> &str {
        &self.region.id
    }
}
