use crate::error::{JoinError, Result};
use crate::population::PopulationTable;
use crate::types::{JoinedRegion, Region};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::{Coord, Rect};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Joined regions in dataset order, addressable by identifier.
#[derive(Debug, Clone, Default)]
pub struct RegionIndex {
    regions: Vec<JoinedRegion>,
    by_id: HashMap<String, usize>,
}

impl RegionIndex {
    /// Builds the identifier index; identifiers must be unique.
    pub fn new(regions: Vec<JoinedRegion>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(regions.len());
        for (i, region) in regions.iter().enumerate() {
            if by_id.insert(region.id().to_string(), i).is_some() {
                return Err(JoinError::DuplicateId(region.id().to_string()));
            }
        }
        Ok(Self { regions, by_id })
    }

    pub fn get(&self, id: &str) -> Option<&JoinedRegion> {
        self.by_id.get(id).and_then(|&i| self.regions.get(i))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JoinedRegion> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl<'a> IntoIterator for &'a RegionIndex {
    type Item = &'a JoinedRegion;
    type IntoIter = std::slice::Iter<'a, JoinedRegion>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Attaches a population to every region.
///
/// All or nothing: the first region whose identifier is absent from `table`
/// aborts the join with [`JoinError::KeyNotFound`].
pub fn join_population(regions: Vec<Region>, table: &PopulationTable) -> Result<RegionIndex> {
    debug!("Joining {} regions against {} population entries", regions.len(), table.len());

    let joined = regions
        .into_iter()
        .map(|region| match table.get(&region.id) {
            Some(population) => Ok(JoinedRegion { region, population }),
            None => Err(JoinError::KeyNotFound(region.id)),
        })
        .collect::<Result<Vec<_>>>()?;

    RegionIndex::new(joined)
}

/// Every region identifier without a table entry, in dataset order.
pub fn missing_identifiers(regions: &[Region], table: &PopulationTable) -> Vec<String> {
    let missing: Vec<String> = regions
        .iter()
        .filter(|r| !table.contains(&r.id))
        .map(|r| r.id.clone())
        .collect();
    if !missing.is_empty() {
        warn!(count = missing.len(), "regions without population");
    }
    missing
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinSummary {
    pub regions: usize,
    pub total_population: u64,
    pub bounds: Option<Rect<f64>>,
}

impl JoinSummary {
    pub fn from_index(index: &RegionIndex) -> Self {
        let total_population = index
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.population));

        let bounds = index
            .iter()
            .filter_map(|r| r.region.geometry.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            });

        Self {
            regions: index.len(),
            total_population,
            bounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Geometry};
    use geojson::JsonObject;

    fn region(id: &str, offset: f64) -> Region {
        let poly = polygon![
            (x: offset, y: offset),
            (x: offset + 1.0, y: offset),
            (x: offset + 1.0, y: offset + 1.0),
            (x: offset, y: offset),
        ];
        Region {
            id: id.to_string(),
            geometry: Geometry::Polygon(poly),
            properties: JsonObject::new(),
            feature_id: None,
        }
    }

    fn table(body: &str) -> PopulationTable {
        PopulationTable::from_json_str(body).unwrap()
    }

    #[test]
    fn attaches_population_to_every_region() {
        let regions = vec![region("36", 0.0), region("06", 5.0)];
        let index = join_population(regions, &table(r#"{"36": 19453561, "06": 39512223, "48": 1}"#)).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("36").unwrap().population, 19453561);
        assert_eq!(index.get("06").unwrap().population, 39512223);
        assert!(index.get("48").is_none());
        let order: Vec<&str> = index.iter().map(|r| r.id()).collect();
        assert_eq!(order, ["36", "06"]);
    }

    #[test]
    fn missing_identifier_aborts_whole_join() {
        let regions = vec![region("36", 0.0), region("99", 1.0), region("98", 2.0)];
        let err = join_population(regions, &table(r#"{"36": 1}"#)).unwrap_err();
        assert!(matches!(err, JoinError::KeyNotFound(ref id) if id == "99"));
    }

    #[test]
    fn duplicate_region_identifier_is_rejected() {
        let regions = vec![region("36", 0.0), region("36", 1.0)];
        let err = join_population(regions, &table(r#"{"36": 1}"#)).unwrap_err();
        assert!(matches!(err, JoinError::DuplicateId(ref id) if id == "36"));
    }

    #[test]
    fn lists_all_missing_identifiers_in_order() {
        let regions = vec![region("99", 0.0), region("36", 1.0), region("98", 2.0)];
        let missing = missing_identifiers(&regions, &table(r#"{"36": 1}"#));
        assert_eq!(missing, ["99", "98"]);
    }

    #[test]
    fn empty_dataset_joins_to_empty_index() {
        let index = join_population(Vec::new(), &table("{}")).unwrap();
        assert!(index.is_empty());
        let summary = JoinSummary::from_index(&index);
        assert_eq!(summary.regions, 0);
        assert_eq!(summary.total_population, 0);
        assert!(summary.bounds.is_none());
    }

    #[test]
    fn summary_totals_population_and_spans_all_geometries() {
        let regions = vec![region("a", 0.0), region("b", 5.0)];
        let index = join_population(regions, &table(r#"{"a": 10, "b": 32}"#)).unwrap();
        let summary = JoinSummary::from_index(&index);

        assert_eq!(summary.regions, 2);
        assert_eq!(summary.total_population, 42);
        let bounds = summary.bounds.unwrap();
        assert_eq!(bounds.min(), Coord { x: 0.0, y: 0.0 });
        assert_eq!(bounds.max(), Coord { x: 6.0, y: 6.0 });
    }
}
