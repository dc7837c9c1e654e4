#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loads transit station CSV files into immutable [`Dataset`] snapshots.
//!
//! The header row is checked once against the required schema before any
//! row is read, so a missing column fails the whole load with a
//! [`SchemaError`] instead of surfacing later as silently empty values.
//! Every load is tagged with a [`DatasetIdentity`] derived from the SHA-256
//! of the raw bytes, which downstream caches use to detect reloads.

use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tod_station_models::{
    Coordinates, Dataset, DatasetIdentity, StationRecord, Typology, ZoneMetrics, required_columns,
};

/// A station dataset is missing one or more required columns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("station dataset is missing required column(s): {}", .missing.join(", "))]
pub struct SchemaError {
    /// Every required column that was absent, in schema order.
    pub missing: Vec<String>,
}

/// Errors that can occur while loading a station dataset.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The file could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The CSV structure could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Required columns are absent.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// One CSV row as written by the upstream buffer-analysis export.
///
/// Numeric cells are read as text so that a stray non-numeric value
/// degrades to a missing metric instead of dropping the whole row.
#[derive(Debug, Deserialize)]
struct RawStationRow {
    #[serde(rename = "StationName")]
    station_name: String,
    #[serde(rename = "line_name")]
    line_name: Option<String>,
    #[serde(rename = "ntd_mode")]
    ntd_mode: Option<String>,
    #[serde(rename = "Typology")]
    typology: Option<String>,
    #[serde(rename = "Latitude", default)]
    latitude: Option<String>,
    #[serde(rename = "Longitude", default)]
    longitude: Option<String>,

    #[serde(rename = "Inner_AvgHeight")]
    inner_avg_height: Option<String>,
    #[serde(rename = "Middle_AvgHeight")]
    middle_avg_height: Option<String>,
    #[serde(rename = "Outer_AvgHeight")]
    outer_avg_height: Option<String>,
    #[serde(rename = "Inner_TotalFootprint")]
    inner_total_footprint: Option<String>,
    #[serde(rename = "Middle_TotalFootprint")]
    middle_total_footprint: Option<String>,
    #[serde(rename = "Outer_TotalFootprint")]
    outer_total_footprint: Option<String>,
    #[serde(rename = "Inner_TotalBuildings")]
    inner_total_buildings: Option<String>,
    #[serde(rename = "Middle_TotalBuildings")]
    middle_total_buildings: Option<String>,
    #[serde(rename = "Outer_TotalBuildings")]
    outer_total_buildings: Option<String>,
}

impl RawStationRow {
    fn into_record(self, invalid_cells: &mut u64) -> StationRecord {
        let mut number = |raw: Option<String>| parse_number(raw.as_deref(), invalid_cells);

        let coordinates = match (number(self.latitude), number(self.longitude)) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };

        let inner = ZoneMetrics {
            total_buildings: number(self.inner_total_buildings),
            total_footprint: number(self.inner_total_footprint),
            avg_height: number(self.inner_avg_height),
        };
        let middle = ZoneMetrics {
            total_buildings: number(self.middle_total_buildings),
            total_footprint: number(self.middle_total_footprint),
            avg_height: number(self.middle_avg_height),
        };
        let outer = ZoneMetrics {
            total_buildings: number(self.outer_total_buildings),
            total_footprint: number(self.outer_total_footprint),
            avg_height: number(self.outer_avg_height),
        };

        StationRecord {
            name: self.station_name,
            line: non_empty(self.line_name),
            mode: non_empty(self.ntd_mode),
            typology: Typology::from(self.typology.unwrap_or_default()),
            coordinates,
            inner,
            middle,
            outer,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Parses a numeric cell. Empty, `NaN`, and infinite values are missing;
/// unparseable text is missing and counted in `invalid_cells`.
fn parse_number(raw: Option<&str>, invalid_cells: &mut u64) -> Option<f64> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        Ok(_) => None,
        Err(_) => {
            log::trace!("Treating unparseable value {raw:?} as missing");
            *invalid_cells += 1;
            None
        }
    }
}

/// Checks that every required column is present.
///
/// # Errors
///
/// Returns a [`SchemaError`] listing every missing column.
pub fn validate_schema(headers: &csv::StringRecord) -> Result<(), SchemaError> {
    let missing: Vec<String> = required_columns()
        .into_iter()
        .filter(|column| !headers.iter().any(|h| h.trim() == column))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaError { missing })
    }
}

/// Computes the identity of a byte buffer read from `source`.
#[must_use]
pub fn identify(source: &str, bytes: &[u8]) -> DatasetIdentity {
    DatasetIdentity {
        source: source.to_owned(),
        content_hash: hex::encode(Sha256::digest(bytes)),
    }
}

/// Parses station CSV bytes into a dataset tagged with `source`.
///
/// # Errors
///
/// * [`IngestError::Schema`] if a required column is missing.
/// * [`IngestError::Csv`] if the CSV is structurally malformed.
pub fn parse_dataset(source: &str, bytes: &[u8]) -> Result<Dataset, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    validate_schema(reader.headers()?)?;

    let mut records = Vec::new();
    let mut invalid_cells = 0u64;
    for result in reader.deserialize::<RawStationRow>() {
        records.push(result?.into_record(&mut invalid_cells));
    }

    if invalid_cells > 0 {
        log::warn!("{invalid_cells} non-numeric metric value(s) in {source} treated as missing");
    }

    let identity = identify(source, bytes);
    log::info!("Loaded {} stations from {identity}", records.len());

    Ok(Dataset { identity, records })
}

/// Reads and parses a station CSV file.
///
/// # Errors
///
/// * [`IngestError::Io`] if the file cannot be read.
/// * Any error from [`parse_dataset`].
pub fn load_dataset(path: &Path) -> Result<Dataset, IngestError> {
    let display = path.display().to_string();
    log::debug!("Reading station dataset from {display}");

    let bytes = std::fs::read(path).map_err(|e| IngestError::Io {
        path: display.clone(),
        source: e,
    })?;

    parse_dataset(&display, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "StationName,line_name,ntd_mode,Typology,Latitude,Longitude,\
Inner_AvgHeight,Middle_AvgHeight,Outer_AvgHeight,\
Inner_TotalFootprint,Middle_TotalFootprint,Outer_TotalFootprint,\
Inner_TotalBuildings,Middle_TotalBuildings,Outer_TotalBuildings";

    fn csv(rows: &[&str]) -> String {
        let mut text = HEADER.to_owned();
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text.push('\n');
        text
    }

    #[test]
    fn parses_complete_rows() {
        let text = csv(&[
            "Union,Blue,LR,Classic,41.88,-87.64,10,12,5,100,400,1000,2,5,10.0",
            "Lake,Red,HR,Donut,,,,,20,,,3000,,,50",
        ]);
        let dataset = parse_dataset("fixture", text.as_bytes()).unwrap();

        assert_eq!(dataset.len(), 2);
        let union = &dataset.records[0];
        assert_eq!(union.name, "Union");
        assert_eq!(union.mode.as_deref(), Some("LR"));
        assert_eq!(union.typology, Typology::Classic);
        assert_eq!(union.outer.total_buildings, Some(10.0));
        assert_eq!(union.inner.avg_height, Some(10.0));
        assert_eq!(union.coordinates.unwrap().latitude, 41.88);

        let lake = &dataset.records[1];
        assert!(lake.coordinates.is_none());
        assert!(lake.outer.is_complete());
        assert_eq!(lake.inner.total_footprint, None);
    }

    #[test]
    fn missing_and_invalid_values_become_none() {
        let text = csv(&["A,,,Other,x,1,,,NaN,,,abc,,,7"]);
        let dataset = parse_dataset("fixture", text.as_bytes()).unwrap();
        let record = &dataset.records[0];
        assert_eq!(record.outer.avg_height, None);
        assert_eq!(record.outer.total_footprint, None);
        assert_eq!(record.outer.total_buildings, Some(7.0));
        assert_eq!(record.line, None);
        assert_eq!(record.mode, None);
        assert!(record.coordinates.is_none());
    }

    #[test]
    fn coordinates_are_optional_columns() {
        let text = "StationName,line_name,ntd_mode,Typology,\
Inner_AvgHeight,Middle_AvgHeight,Outer_AvgHeight,\
Inner_TotalFootprint,Middle_TotalFootprint,Outer_TotalFootprint,\
Inner_TotalBuildings,Middle_TotalBuildings,Outer_TotalBuildings\n\
A,L1,LR,Monoculture,1,2,3,4,5,6,7,8,9\n";
        let dataset = parse_dataset("fixture", text.as_bytes()).unwrap();
        assert!(dataset.records[0].coordinates.is_none());
        assert_eq!(dataset.records[0].typology, Typology::Monoculture);
    }

    #[test]
    fn missing_columns_are_a_schema_error() {
        let text = "StationName,line_name,Typology,Outer_AvgHeight\nA,L1,Classic,3\n";
        match parse_dataset("fixture", text.as_bytes()) {
            Err(IngestError::Schema(e)) => {
                assert!(e.missing.contains(&"ntd_mode".to_owned()));
                assert!(e.missing.contains(&"Outer_TotalBuildings".to_owned()));
                assert!(!e.missing.contains(&"Outer_AvgHeight".to_owned()));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn column_names_are_case_sensitive() {
        let text = csv(&[]).replace("StationName", "stationname");
        let err = parse_dataset("fixture", text.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::Schema(ref e) if e.missing == vec!["StationName"]));
    }

    #[test]
    fn unlisted_typologies_survive_ingestion() {
        let text = csv(&["A,L1,LR,Hub,,,1,1,1,1,1,1,1,1,1"]);
        let dataset = parse_dataset("fixture", text.as_bytes()).unwrap();
        assert_eq!(
            dataset.records[0].typology,
            Typology::Unlisted("Hub".to_owned())
        );
    }

    #[test]
    fn blank_typology_cells_are_blank() {
        let text = csv(&[
            "A,L1,LR,,,,1,1,1,1,1,1,1,1,1",
            "B,L1,LR,  ,,,1,1,1,1,1,1,1,1,1",
        ]);
        let dataset = parse_dataset("fixture", text.as_bytes()).unwrap();
        assert!(dataset.records.iter().all(|r| r.typology.is_blank()));
        assert_eq!(dataset.records[1].typology.label(), "");
    }

    #[test]
    fn identity_tracks_content() {
        let a = csv(&["A,L1,LR,Classic,,,1,1,1,1,1,1,1,1,1"]);
        let b = csv(&["A,L1,LR,Classic,,,1,1,1,1,1,1,1,1,2"]);
        let first = parse_dataset("s.csv", a.as_bytes()).unwrap().identity;
        let again = parse_dataset("s.csv", a.as_bytes()).unwrap().identity;
        let changed = parse_dataset("s.csv", b.as_bytes()).unwrap().identity;
        assert_eq!(first, again);
        assert_ne!(first, changed);
        assert_eq!(first.content_hash.len(), 64);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_dataset(Path::new("/nonexistent/stations.csv")).unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
