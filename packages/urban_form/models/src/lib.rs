#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Urban form taxonomy and result types.
//!
//! Three Outer-zone metrics ([`Metric`]) are each compared against a
//! population median ([`ThresholdSet`]). The three "strictly greater" bits
//! form a 3-bit code that indexes one of eight [`OctantCategory`] values.
//! Counts of categories, optionally grouped by station labels
//! ([`GroupKey`]), are reported as a dense [`AggregationResult`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tod_station_models::{
    COL_LINE_NAME, COL_NTD_MODE, COL_TYPOLOGY, DatasetIdentity, StationRecord, ZoneField,
};

/// Row label used for stations with no value for a grouping key.
pub const MISSING_GROUP_LABEL: &str = "(none)";

// ── Metrics ──────────────────────────────────────────────────────────────

/// One of the three Outer-zone metrics that drive classification, in bit
/// order (most significant first).
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Metric {
    /// Total building count.
    Buildings,
    /// Total building footprint area.
    Footprint,
    /// Average building height.
    Height,
}

impl Metric {
    /// Returns the zone field this metric reads.
    #[must_use]
    pub const fn field(self) -> ZoneField {
        match self {
            Self::Buildings => ZoneField::TotalBuildings,
            Self::Footprint => ZoneField::TotalFootprint,
            Self::Height => ZoneField::AvgHeight,
        }
    }

    /// Returns the metric's Outer-zone value for a station.
    #[must_use]
    pub const fn outer_value(self, record: &StationRecord) -> Option<f64> {
        record.outer.get(self.field())
    }

    /// Noun used in bit-pattern descriptions ("Higher Building Count").
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Buildings => "Building Count",
            Self::Footprint => "Footprint",
            Self::Height => "Height",
        }
    }

    /// Axis title for charts of this metric.
    #[must_use]
    pub const fn axis_label(self) -> &'static str {
        match self {
            Self::Buildings => "Total Buildings",
            Self::Footprint => "Total Footprint",
            Self::Height => "Average Height",
        }
    }

    /// Bit value this metric contributes to an octant code when "Higher".
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Buildings => 0b100,
            Self::Footprint => 0b010,
            Self::Height => 0b001,
        }
    }

    /// Returns all variants of this enum in bit order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Buildings, Self::Footprint, Self::Height]
    }
}

/// One value per [`Metric`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerMetric<T> {
    /// Value for [`Metric::Buildings`].
    pub buildings: T,
    /// Value for [`Metric::Footprint`].
    pub footprint: T,
    /// Value for [`Metric::Height`].
    pub height: T,
}

impl<T: Copy> PerMetric<T> {
    /// Returns the value for one metric.
    #[must_use]
    pub const fn get(&self, metric: Metric) -> T {
        match metric {
            Metric::Buildings => self.buildings,
            Metric::Footprint => self.footprint,
            Metric::Height => self.height,
        }
    }
}

// ── Thresholds ───────────────────────────────────────────────────────────

/// Per-metric medians of a reference population, used as classification
/// boundaries.
///
/// Computed once from a specific population and never mutated; a different
/// population yields a different set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdSet {
    /// Dataset the medians were computed over. `None` for an ad hoc set of
    /// records with no dataset behind them.
    #[serde(default)]
    pub population: Option<DatasetIdentity>,
    /// Median of each metric.
    pub medians: PerMetric<f64>,
    /// Number of non-null values each median was computed from.
    pub sample_sizes: PerMetric<usize>,
}

impl ThresholdSet {
    /// Returns the threshold for one metric.
    #[must_use]
    pub const fn threshold(&self, metric: Metric) -> f64 {
        self.medians.get(metric)
    }

    /// Whether these thresholds were computed over the dataset `identity`.
    #[must_use]
    pub fn computed_over(&self, identity: &DatasetIdentity) -> bool {
        self.population.as_ref() == Some(identity)
    }
}

// ── Octant categories ────────────────────────────────────────────────────

/// Whether a metric is strictly above ("Higher") or at/below ("Lower") its
/// threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Level {
    /// At or below the median.
    Lower,
    /// Strictly above the median.
    Higher,
}

/// One of the eight urban form categories.
///
/// The discriminant is the 3-bit code (buildings, footprint, height), so
/// the derived ordering is the canonical display order 1-8.
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
#[repr(u8)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OctantCategory {
    /// Lower buildings, lower footprint, lower height.
    #[strum(serialize = "Underbuilt")]
    Underbuilt = 0b000,
    /// Lower buildings, lower footprint, higher height.
    #[strum(serialize = "Vertical Outliers")]
    VerticalOutliers = 0b001,
    /// Lower buildings, higher footprint, lower height.
    #[strum(serialize = "Spread-Low Density")]
    SpreadLowDensity = 0b010,
    /// Lower buildings, higher footprint, higher height.
    #[strum(serialize = "Vertical Campuses")]
    VerticalCampuses = 0b011,
    /// Higher buildings, lower footprint, lower height.
    #[strum(serialize = "Compact Low-Rise")]
    CompactLowRise = 0b100,
    /// Higher buildings, lower footprint, higher height.
    #[strum(serialize = "Compact Vertical")]
    CompactVertical = 0b101,
    /// Higher buildings, higher footprint, lower height.
    #[strum(serialize = "Sprawling Mid-Density")]
    SprawlingMidDensity = 0b110,
    /// Higher buildings, higher footprint, higher height.
    #[strum(serialize = "Urban Core")]
    UrbanCore = 0b111,
}

/// Number of octant categories.
pub const CATEGORY_COUNT: usize = 8;

impl OctantCategory {
    /// Returns the category for a 3-bit code, or `None` if the code is out
    /// of range.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0b000 => Some(Self::Underbuilt),
            0b001 => Some(Self::VerticalOutliers),
            0b010 => Some(Self::SpreadLowDensity),
            0b011 => Some(Self::VerticalCampuses),
            0b100 => Some(Self::CompactLowRise),
            0b101 => Some(Self::CompactVertical),
            0b110 => Some(Self::SprawlingMidDensity),
            0b111 => Some(Self::UrbanCore),
            _ => None,
        }
    }

    /// Returns the 3-bit code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Returns the 1-based display ordinal.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self.code() + 1
    }

    /// Returns the level of one metric encoded in this category.
    #[must_use]
    pub const fn level(self, metric: Metric) -> Level {
        if self.code() & metric.bit() == 0 {
            Level::Lower
        } else {
            Level::Higher
        }
    }

    /// Full display label, e.g. `"Category 4 – Vertical Campuses"`.
    #[must_use]
    pub fn label(self) -> String {
        format!("Category {} \u{2013} {self}", self.ordinal())
    }

    /// Bit pattern in words, e.g.
    /// `"Lower Building Count, Higher Footprint, Higher Height"`.
    #[must_use]
    pub fn pattern(self) -> String {
        Metric::all()
            .iter()
            .map(|m| format!("{} {}", self.level(*m), m.label()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// What this form typically looks like on the ground.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Underbuilt => {
                "Underutilized station areas with few small, low-rise structures. \
                 May reflect zoning constraints, disinvestment, or undeveloped land."
            }
            Self::VerticalOutliers => {
                "Mostly single-use vertical developments such as hospitals, universities, \
                 or legacy towers surrounded by open space or parking."
            }
            Self::SpreadLowDensity => {
                "Big-box retail, surface parking, or single-story industrial uses; \
                 land used inefficiently in a high-value location."
            }
            Self::VerticalCampuses => {
                "Institutional or corporate campuses with tall, bulky buildings and \
                 limited surrounding density."
            }
            Self::CompactLowRise => {
                "Dense clusters of small-scale, fine-grain structures, often historic \
                 or neighborhood-serving."
            }
            Self::CompactVertical => {
                "High-rise TOD nodes: efficient land use with walkable density."
            }
            Self::SprawlingMidDensity => {
                "Horizontal spread of 1-3 story structures: light industrial, aging \
                 commercial, or suburban TOD with limited vertical investment."
            }
            Self::UrbanCore => {
                "Fully built-out urban cores: dense, tall, and walkable, often with \
                 high land values and demand."
            }
        }
    }

    /// Returns all variants in canonical code order.
    #[must_use]
    pub const fn all() -> &'static [Self; CATEGORY_COUNT] {
        &[
            Self::Underbuilt,
            Self::VerticalOutliers,
            Self::SpreadLowDensity,
            Self::VerticalCampuses,
            Self::CompactLowRise,
            Self::CompactVertical,
            Self::SprawlingMidDensity,
            Self::UrbanCore,
        ]
    }
}

// ── Aggregation ──────────────────────────────────────────────────────────

/// A categorical station attribute that aggregations can be grouped by.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GroupKey {
    /// Group by NTD transit mode.
    Mode,
    /// Group by line identifier.
    Line,
    /// Group by pre-existing typology label.
    Typology,
}

impl GroupKey {
    /// Returns the station's value for this key. A blank typology counts
    /// as missing.
    #[must_use]
    pub fn value(self, record: &StationRecord) -> Option<String> {
        match self {
            Self::Mode => record.mode.clone(),
            Self::Line => record.line.clone(),
            Self::Typology => Some(&record.typology)
                .filter(|t| !t.is_blank())
                .map(|t| t.label().to_owned()),
        }
    }

    /// Input column this key reads, used as the export header.
    #[must_use]
    pub const fn column_name(self) -> &'static str {
        match self {
            Self::Mode => COL_NTD_MODE,
            Self::Line => COL_LINE_NAME,
            Self::Typology => COL_TYPOLOGY,
        }
    }
}

/// Station counts for all eight categories, indexed by code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts([u64; CATEGORY_COUNT]);

impl CategoryCounts {
    /// Returns the count for one category.
    #[must_use]
    pub const fn get(&self, category: OctantCategory) -> u64 {
        self.0[category.code() as usize]
    }

    /// Adds one station to a category.
    pub const fn increment(&mut self, category: OctantCategory) {
        self.0[category.code() as usize] += 1;
    }

    /// Adds another set of counts cell by cell.
    pub fn add(&mut self, other: &Self) {
        for (cell, value) in self.0.iter_mut().zip(other.0) {
            *cell += value;
        }
    }

    /// Sum over all categories.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// Iterates `(category, count)` in canonical order, zeros included.
    pub fn iter(&self) -> impl Iterator<Item = (OctantCategory, u64)> + '_ {
        OctantCategory::all().iter().map(|c| (*c, self.get(*c)))
    }
}

/// One row of an [`AggregationResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationRow {
    /// Value of each group key, in the same order as
    /// [`AggregationResult::group_keys`]. Empty when ungrouped.
    pub key: Vec<Option<String>>,
    /// Counts for all eight categories.
    pub counts: CategoryCounts,
}

impl AggregationRow {
    /// Group values as display strings, with missing values shown as
    /// [`MISSING_GROUP_LABEL`].
    #[must_use]
    pub fn key_labels(&self) -> Vec<&str> {
        self.key
            .iter()
            .map(|v| v.as_deref().unwrap_or(MISSING_GROUP_LABEL))
            .collect()
    }
}

/// Dense cross-tabulation of group-key values × [`OctantCategory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    /// Keys the rows are grouped by. Empty for an ungrouped result.
    pub group_keys: Vec<GroupKey>,
    /// One row per observed key tuple, sorted by key.
    pub rows: Vec<AggregationRow>,
    /// Records left out because one or more Outer metrics were missing.
    pub excluded: usize,
}

/// Error returned when merging results grouped by different keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKeyMismatchError {
    /// Keys of the left-hand result.
    pub left: Vec<GroupKey>,
    /// Keys of the right-hand result.
    pub right: Vec<GroupKey>,
}

impl std::fmt::Display for GroupKeyMismatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot merge aggregations grouped by {:?} and {:?}",
            self.left, self.right
        )
    }
}

impl std::error::Error for GroupKeyMismatchError {}

impl AggregationResult {
    /// Builds a result from a key → counts map. An ungrouped result always
    /// has exactly one row, even when no stations were counted.
    #[must_use]
    pub fn from_map(
        group_keys: Vec<GroupKey>,
        mut map: BTreeMap<Vec<Option<String>>, CategoryCounts>,
        excluded: usize,
    ) -> Self {
        if group_keys.is_empty() {
            map.entry(Vec::new()).or_default();
        }
        let rows = map
            .into_iter()
            .map(|(key, counts)| AggregationRow { key, counts })
            .collect();
        Self {
            group_keys,
            rows,
            excluded,
        }
    }

    /// Total number of stations counted across all rows.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.rows.iter().map(|r| r.counts.total()).sum()
    }

    /// Column totals across all rows.
    #[must_use]
    pub fn category_totals(&self) -> CategoryCounts {
        let mut totals = CategoryCounts::default();
        for row in &self.rows {
            totals.add(&row.counts);
        }
        totals
    }

    /// Finds the row for a key tuple.
    #[must_use]
    pub fn row(&self, key: &[Option<&str>]) -> Option<&AggregationRow> {
        self.rows.iter().find(|r| {
            r.key.len() == key.len() && r.key.iter().zip(key).all(|(a, b)| a.as_deref() == *b)
        })
    }

    /// Combines two partial aggregations over disjoint record sets.
    ///
    /// Counts and exclusions add up; the operation is commutative and
    /// associative.
    ///
    /// # Errors
    ///
    /// Returns [`GroupKeyMismatchError`] if the two results are grouped by
    /// different keys.
    pub fn merge(self, other: Self) -> Result<Self, GroupKeyMismatchError> {
        if self.group_keys != other.group_keys {
            return Err(GroupKeyMismatchError {
                left: self.group_keys,
                right: other.group_keys,
            });
        }

        let mut map: BTreeMap<Vec<Option<String>>, CategoryCounts> = BTreeMap::new();
        for row in self.rows.into_iter().chain(other.rows) {
            map.entry(row.key).or_default().add(&row.counts);
        }

        Ok(Self::from_map(
            self.group_keys,
            map,
            self.excluded + other.excluded,
        ))
    }
}
