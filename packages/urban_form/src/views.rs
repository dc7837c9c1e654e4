//! Summaries that sit alongside the category tables: station counts per
//! pre-existing typology, pairwise quadrant plots, and the map centre.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tod_station_models::{Coordinates, StationRecord, Typology};
use tod_urban_form_models::{Metric, OctantCategory, ThresholdSet};

use crate::classify::Classification;

// ── Typology counts ──────────────────────────────────────────────────────

/// Number of stations carrying one pre-existing typology label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypologyCount {
    /// The label.
    pub typology: Typology,
    /// Stations with that label.
    pub count: u64,
}

/// Counts stations per typology label, most common first. Ties are broken
/// by label so the order is stable.
pub fn count_by_typology<'a, I>(records: I) -> Vec<TypologyCount>
where
    I: IntoIterator<Item = &'a StationRecord>,
{
    let mut counts: BTreeMap<&Typology, u64> = BTreeMap::new();
    for record in records {
        *counts.entry(&record.typology).or_default() += 1;
    }

    let mut summary: Vec<TypologyCount> = counts
        .into_iter()
        .map(|(typology, count)| TypologyCount {
            typology: typology.clone(),
            count,
        })
        .collect();
    summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.typology.cmp(&b.typology)));
    summary
}

// ── Quadrant plots ───────────────────────────────────────────────────────

/// A pair of metrics plotted against each other with median reference lines.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum QuadrantPair {
    /// Building count (x) against average height (y).
    BuildingsVsHeight,
    /// Building count (x) against total footprint (y).
    BuildingsVsFootprint,
    /// Total footprint (x) against average height (y).
    FootprintVsHeight,
}

impl QuadrantPair {
    /// Metric on the horizontal axis.
    #[must_use]
    pub const fn x(self) -> Metric {
        match self {
            Self::BuildingsVsHeight | Self::BuildingsVsFootprint => Metric::Buildings,
            Self::FootprintVsHeight => Metric::Footprint,
        }
    }

    /// Metric on the vertical axis.
    #[must_use]
    pub const fn y(self) -> Metric {
        match self {
            Self::BuildingsVsHeight | Self::FootprintVsHeight => Metric::Height,
            Self::BuildingsVsFootprint => Metric::Footprint,
        }
    }

    /// Chart title, e.g. `"Total Buildings vs Average Height"`.
    #[must_use]
    pub fn title(self) -> String {
        format!("{} vs {}", self.x().axis_label(), self.y().axis_label())
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::BuildingsVsHeight,
            Self::BuildingsVsFootprint,
            Self::FootprintVsHeight,
        ]
    }
}

/// One station in a quadrant plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuadrantPoint {
    /// Station name.
    pub station: String,
    /// Transit mode, used for colouring by mode.
    pub mode: Option<String>,
    /// Horizontal value.
    pub x: f64,
    /// Vertical value.
    pub y: f64,
    /// Station category.
    pub category: OctantCategory,
}

/// Data for one pairwise quadrant plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuadrantView {
    /// Which metrics are plotted.
    pub pair: QuadrantPair,
    /// Vertical reference line (median of the x metric).
    pub x_median: f64,
    /// Horizontal reference line (median of the y metric).
    pub y_median: f64,
    /// One point per classified station.
    pub points: Vec<QuadrantPoint>,
}

/// Builds the quadrant plot for `pair` from classified stations.
#[must_use]
pub fn quadrant_view(
    classification: &Classification<'_>,
    thresholds: &ThresholdSet,
    pair: QuadrantPair,
) -> QuadrantView {
    let points = classification
        .stations
        .iter()
        .filter_map(|s| {
            Some(QuadrantPoint {
                station: s.record.name.clone(),
                mode: s.record.mode.clone(),
                x: pair.x().outer_value(s.record)?,
                y: pair.y().outer_value(s.record)?,
                category: s.category,
            })
        })
        .collect();

    QuadrantView {
        pair,
        x_median: thresholds.threshold(pair.x()),
        y_median: thresholds.threshold(pair.y()),
        points,
    }
}

// ── Map ──────────────────────────────────────────────────────────────────

/// Mean position of every station with coordinates, or `None` if none
/// have any.
#[allow(clippy::cast_precision_loss)]
pub fn map_center<'a, I>(records: I) -> Option<Coordinates>
where
    I: IntoIterator<Item = &'a StationRecord>,
{
    let (count, lat, lon) = records
        .into_iter()
        .filter_map(|r| r.coordinates)
        .fold((0usize, 0.0, 0.0), |(n, lat, lon), c| {
            (n + 1, lat + c.latitude, lon + c.longitude)
        });

    (count > 0).then(|| Coordinates {
        latitude: lat / count as f64,
        longitude: lon / count as f64,
    })
}
