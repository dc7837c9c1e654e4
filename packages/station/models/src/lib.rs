#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Transit station record types.
//!
//! A [`StationRecord`] is one row of the station dataset: identity and
//! categorical labels (line, transit mode, pre-existing [`Typology`]),
//! optional coordinates, and building metrics for each of the three
//! concentric [`BufferZone`]s around the station.
//!
//! Records are validated once at ingestion and are immutable afterwards.
//! Every downstream view (filtered, classified, aggregated) borrows or
//! derives from them rather than mutating them.

use std::convert::Infallible;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

// ── Column names ─────────────────────────────────────────────────────────

/// Input column holding the station name.
pub const COL_STATION_NAME: &str = "StationName";
/// Input column holding the line identifier.
pub const COL_LINE_NAME: &str = "line_name";
/// Input column holding the NTD transit-mode identifier.
pub const COL_NTD_MODE: &str = "ntd_mode";
/// Input column holding the pre-existing typology label.
pub const COL_TYPOLOGY: &str = "Typology";
/// Optional input column holding the WGS84 latitude.
pub const COL_LATITUDE: &str = "Latitude";
/// Optional input column holding the WGS84 longitude.
pub const COL_LONGITUDE: &str = "Longitude";

/// Returns every column a station dataset must provide, in display order.
///
/// Coordinates are optional and therefore not listed.
#[must_use]
pub fn required_columns() -> Vec<String> {
    let mut columns = vec![
        COL_STATION_NAME.to_owned(),
        COL_LINE_NAME.to_owned(),
        COL_NTD_MODE.to_owned(),
        COL_TYPOLOGY.to_owned(),
    ];
    for field in ZoneField::all() {
        for zone in BufferZone::all() {
            columns.push(field.column_name(*zone));
        }
    }
    columns
}

// ── Buffer zones ─────────────────────────────────────────────────────────

/// One of the three concentric rings around a station over which building
/// metrics are aggregated.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum BufferZone {
    /// Ring closest to the station (200 m).
    Inner,
    /// Intermediate ring (400 m).
    Middle,
    /// Outermost ring (800 m). The only zone used for classification.
    Outer,
}

impl BufferZone {
    /// Returns the outer radius of this ring in meters.
    #[must_use]
    pub const fn radius_m(self) -> u32 {
        match self {
            Self::Inner => 200,
            Self::Middle => 400,
            Self::Outer => 800,
        }
    }

    /// Returns all variants of this enum, innermost first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Inner, Self::Middle, Self::Outer]
    }
}

/// A metric measured within a [`BufferZone`].
///
/// The `Display` form is the column suffix used by the input schema, so
/// `Outer` + `TotalBuildings` maps to the `Outer_TotalBuildings` column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum ZoneField {
    /// Average building height.
    AvgHeight,
    /// Total building footprint area.
    TotalFootprint,
    /// Total building count.
    TotalBuildings,
}

impl ZoneField {
    /// Returns the input column name for this field in the given zone.
    #[must_use]
    pub fn column_name(self, zone: BufferZone) -> String {
        format!("{zone}_{self}")
    }

    /// Returns all variants of this enum in input-schema order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::AvgHeight, Self::TotalFootprint, Self::TotalBuildings]
    }
}

/// Building metrics for one buffer zone. Any value may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneMetrics {
    /// Total number of buildings in the zone.
    pub total_buildings: Option<f64>,
    /// Total building footprint area in the zone.
    pub total_footprint: Option<f64>,
    /// Average building height in the zone.
    pub avg_height: Option<f64>,
}

impl ZoneMetrics {
    /// Returns the value of a single field.
    #[must_use]
    pub const fn get(&self, field: ZoneField) -> Option<f64> {
        match field {
            ZoneField::AvgHeight => self.avg_height,
            ZoneField::TotalFootprint => self.total_footprint,
            ZoneField::TotalBuildings => self.total_buildings,
        }
    }

    /// Whether all three metrics are present.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.total_buildings.is_some() && self.total_footprint.is_some() && self.avg_height.is_some()
    }
}

// ── Typology ─────────────────────────────────────────────────────────────

/// Pre-existing TOD typology label attached to each station.
///
/// The four canonical labels are modelled as unit variants. Any other label
/// found in the data is kept verbatim as [`Typology::Unlisted`] so that the
/// row survives ingestion and can be excluded by a display filter instead.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Typology {
    /// Taller, denser, and fewer buildings near the station.
    Classic,
    /// Irregular patterns across the buffer zones.
    Donut,
    /// Uniform form across all distances.
    Monoculture,
    /// Not yet characterized.
    Other,
    /// A label outside the canonical set.
    Unlisted(String),
}

/// The canonical typology labels, in display order.
pub static CANONICAL_TYPOLOGIES: [Typology; 4] = [
    Typology::Classic,
    Typology::Donut,
    Typology::Monoculture,
    Typology::Other,
];

impl Typology {
    /// Returns the label as it appears in the input data.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Classic => "Classic",
            Self::Donut => "Donut",
            Self::Monoculture => "Monoculture",
            Self::Other => "Other",
            Self::Unlisted(label) => label,
        }
    }

    /// Whether this is one of the four canonical labels.
    #[must_use]
    pub const fn is_canonical(&self) -> bool {
        !matches!(self, Self::Unlisted(_))
    }

    /// Whether the typology cell was blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Unlisted(label) if label.trim().is_empty())
    }

    /// Returns the canonical labels.
    #[must_use]
    pub fn canonical() -> &'static [Self] {
        &CANONICAL_TYPOLOGIES
    }
}

impl std::fmt::Display for Typology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Typology {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "Classic" => Self::Classic,
            "Donut" => Self::Donut,
            "Monoculture" => Self::Monoculture,
            "Other" => Self::Other,
            other => Self::Unlisted(other.to_owned()),
        })
    }
}

impl From<String> for Typology {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(typology) => typology,
            Err(e) => match e {},
        }
    }
}

impl From<Typology> for String {
    fn from(value: Typology) -> Self {
        match value {
            Typology::Unlisted(label) => label,
            other => other.label().to_owned(),
        }
    }
}

// ── Station record ───────────────────────────────────────────────────────

/// WGS84 point location of a station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// One transit station with its labels and per-zone building metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    /// Station name.
    pub name: String,
    /// Line identifier, if known.
    pub line: Option<String>,
    /// NTD transit-mode identifier (e.g. `"LR"`, `"HR"`), if known.
    pub mode: Option<String>,
    /// Pre-existing typology label.
    pub typology: Typology,
    /// Station location, when both coordinates are present.
    pub coordinates: Option<Coordinates>,
    /// Metrics for the 200 m ring.
    pub inner: ZoneMetrics,
    /// Metrics for the 400 m ring.
    pub middle: ZoneMetrics,
    /// Metrics for the 800 m ring.
    pub outer: ZoneMetrics,
}

impl StationRecord {
    /// Returns the metrics for a buffer zone.
    #[must_use]
    pub const fn zone(&self, zone: BufferZone) -> &ZoneMetrics {
        match zone {
            BufferZone::Inner => &self.inner,
            BufferZone::Middle => &self.middle,
            BufferZone::Outer => &self.outer,
        }
    }
}

// ── Dataset snapshot ─────────────────────────────────────────────────────

/// Identifies the content a [`Dataset`] was loaded from.
///
/// Two loads of byte-identical input share an identity regardless of when
/// they happened; any edit to the file produces a new one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetIdentity {
    /// Where the data came from (file path or a caller-supplied label).
    pub source: String,
    /// Lowercase hex SHA-256 of the raw input bytes.
    pub content_hash: String,
}

impl std::fmt::Display for DatasetIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short = self.content_hash.get(..12).unwrap_or(&self.content_hash);
        write!(f, "{} ({short})", self.source)
    }
}

/// An immutable snapshot of every station row in one input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Identity of the input the records were read from.
    pub identity: DatasetIdentity,
    /// All station rows, in input order.
    pub records: Vec<StationRecord>,
}

impl Dataset {
    /// Number of station rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
