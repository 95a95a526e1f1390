use crate::config::PopulationColumns;
use crate::error::{JoinError, Result};
use csv::ReaderBuilder;
use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Region identifier to head count, loaded once and never updated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationTable {
    counts: HashMap<String, u64>,
}

impl PopulationTable {
    pub fn get(&self, id: &str) -> Option<u64> {
        self.counts.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.counts.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Parses a JSON object of `"id": count` pairs.
    ///
    /// Only plain data is accepted: values must be non-negative integers and
    /// every key may appear once.
    pub fn from_json_reader<R: Read>(reader: R) -> serde_json::Result<Self> {
        serde_json::from_reader(reader)
    }

    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    fn insert_unique(&mut self, id: String, population: u64) -> std::result::Result<(), String> {
        if self.counts.contains_key(&id) {
            return Err(format!("duplicate identifier '{}'", id));
        }
        self.counts.insert(id, population);
        Ok(())
    }
}

impl<'de> Deserialize<'de> for PopulationTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = PopulationTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping region identifiers to non-negative integers")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut table = PopulationTable {
                    counts: HashMap::with_capacity(map.size_hint().unwrap_or(0)),
                };
                while let Some((id, population)) = map.next_entry::<String, u64>()? {
                    table.insert_unique(id, population).map_err(de::Error::custom)?;
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Loads the population table. `.csv` files are read with `columns`;
/// anything else must be a JSON object.
pub fn load_population_table(path: &Path, columns: &PopulationColumns) -> Result<PopulationTable> {
    let file = File::open(path).map_err(|e| JoinError::io(path, e))?;

    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    let table = if is_csv {
        load_csv(file, path, columns)?
    } else {
        debug!("Parsing population JSON from {:?}", path);
        PopulationTable::from_json_reader(BufReader::new(file))
            .map_err(|e| JoinError::parse(path, e.to_string()))?
    };

    info!(entries = table.len(), path = %path.display(), "loaded population table");
    Ok(table)
}

fn load_csv(file: File, path: &Path, columns: &PopulationColumns) -> Result<PopulationTable> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let headers = rdr
        .headers()
        .map_err(|e| JoinError::parse(path, e.to_string()))?
        .clone();

    let id_idx = headers.iter().position(|h| h == columns.id).ok_or_else(|| {
        JoinError::parse(path, format!("identifier column '{}' not found in CSV", columns.id))
    })?;
    let pop_idx = headers.iter().position(|h| h == columns.population).ok_or_else(|| {
        JoinError::parse(path, format!("population column '{}' not found in CSV", columns.population))
    })?;

    let mut table = PopulationTable::default();

    for result in rdr.records() {
        let record = result.map_err(|e| JoinError::parse(path, e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let id = record.get(id_idx).unwrap_or("");
        if id.is_empty() {
            continue;
        }

        let raw = record.get(pop_idx).unwrap_or("");
        let population: u64 = raw.parse().map_err(|_| {
            JoinError::parse(
                path,
                format!("line {}: population '{}' for '{}' is not a non-negative integer", line, raw, id),
            )
        })?;

        table
            .insert_unique(id.to_string(), population)
            .map_err(|msg| JoinError::parse(path, format!("line {}: {}", line, msg)))?;
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> PopulationColumns {
        PopulationColumns::default()
    }

    #[test]
    fn parses_identifier_to_count_object() {
        let table = PopulationTable::from_json_str(r#"{"36": 19453561, "06": 39512223}"#).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("36"), Some(19453561));
        assert_eq!(table.get("06"), Some(39512223));
        assert_eq!(table.get("6"), None);
    }

    #[test]
    fn empty_object_is_an_empty_table() {
        let table = PopulationTable::from_json_str("{}").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn rejects_anything_but_plain_integers() {
        for body in [
            r#"{"36": "19453561"}"#,
            r#"{"36": 1.5}"#,
            r#"{"36": -4}"#,
            r#"{"36": {"total": 4}}"#,
            r#"[["36", 4]]"#,
            r#"{'36': 4}"#,
            r#"{"36": 4} trailing"#,
        ] {
            assert!(PopulationTable::from_json_str(body).is_err(), "accepted {}", body);
        }
    }

    #[test]
    fn rejects_duplicate_keys() {
        let err = PopulationTable::from_json_str(r#"{"36": 1, "36": 2}"#).unwrap_err();
        assert!(err.to_string().contains("duplicate identifier '36'"));
    }

    #[test]
    fn loads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("county-populations.json");
        std::fs::write(&path, r#"{"36": 19453561}"#).unwrap();

        let table = load_population_table(&path, &columns()).unwrap();
        assert_eq!(table.get("36"), Some(19453561));
    }

    #[test]
    fn malformed_json_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pop.json");
        std::fs::write(&path, "__import__('os').system('true')").unwrap();

        let err = load_population_table(&path, &columns()).unwrap_err();
        assert!(matches!(err, JoinError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_population_table(&dir.path().join("nope.json"), &columns()).unwrap_err();
        assert!(matches!(err, JoinError::FileNotFound { .. }));
    }

    #[test]
    fn loads_csv_with_configured_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pop.csv");
        std::fs::write(&path, "GEOID,name,total\n36, New York ,19453561\n,blank,0\n06,California,39512223\n").unwrap();

        let cols = PopulationColumns {
            id: "GEOID".to_string(),
            population: "total".to_string(),
        };
        let table = load_population_table(&path, &cols).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("36"), Some(19453561));
        assert_eq!(table.get("06"), Some(39512223));
    }

    #[test]
    fn csv_missing_column_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pop.csv");
        std::fs::write(&path, "id,count\n36,1\n").unwrap();

        let err = load_population_table(&path, &columns()).unwrap_err();
        assert!(err.to_string().contains("population column 'population'"));
    }

    #[test]
    fn csv_non_integer_population_names_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pop.csv");
        std::fs::write(&path, "id,population\n36,1\n06,lots\n").unwrap();

        let err = load_population_table(&path, &columns()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 3"), "{msg}");
        assert!(msg.contains("'06'"), "{msg}");
    }

    #[test]
    fn csv_duplicate_identifier_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pop.csv");
        std::fs::write(&path, "id,population\n36,1\n36,2\n").unwrap();

        let err = load_population_table(&path, &columns()).unwrap_err();
        assert!(err.to_string().contains("duplicate identifier '36'"));
    }
}
