#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Urban form analysis over transit station datasets.
//!
//! The pipeline runs in a fixed order:
//!
//! 1. [`thresholds::compute_thresholds`] takes per-metric medians over the
//!    full, unfiltered population. This is a barrier: nothing is classified
//!    until it completes.
//! 2. [`classify::classify_all`] maps every complete record to an
//!    [`OctantCategory`](tod_urban_form_models::OctantCategory) and counts
//!    the incomplete ones it had to leave out.
//! 3. [`aggregate::aggregate`] cross-tabulates categories against zero or
//!    more [`GroupKey`](tod_urban_form_models::GroupKey)s.
//!
//! [`filter`] narrows raw records for display and never feeds back into
//! thresholds. [`session`] memoizes steps 1-2 per dataset identity, and
//! [`views`] derives the typology, quadrant, and map summaries.

pub mod aggregate;
pub mod classify;
pub mod filter;
pub mod session;
pub mod thresholds;
pub mod views;

pub use aggregate::aggregate;
pub use classify::{Classification, ClassifiedStation, classify, classify_all};
pub use filter::{FilterOptions, Selection, StationFilter, filter_records};
pub use session::{AnalysisSession, SessionCache};
pub use thresholds::compute_thresholds;

use tod_urban_form_models::Metric;

/// Errors raised by the urban form pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UrbanFormError {
    /// No non-null values were available to take a median of.
    #[error("cannot compute a {metric} threshold: no station has a value for it")]
    EmptyPopulation {
        /// The metric with no values.
        metric: Metric,
    },

    /// A station lacks one or more Outer metrics and cannot be classified.
    #[error("station {station:?} is missing Outer metrics: {}", join_metrics(.missing))]
    IncompleteRecord {
        /// Name of the station.
        station: String,
        /// Every metric that was missing.
        missing: Vec<Metric>,
    },

    /// The classifier produced a code with no category. Indicates a defect.
    #[error("octant code {code:#05b} does not map to a category")]
    InvariantViolation {
        /// The offending code.
        code: u8,
    },
}

fn join_metrics(metrics: &[Metric]) -> String {
    metrics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
pub(crate) mod test_support {
    use tod_station_models::{
        Coordinates, Dataset, DatasetIdentity, StationRecord, Typology, ZoneMetrics,
    };

    /// Builds a station with the given Outer metrics and no other data.
    pub fn station(
        name: &str,
        buildings: Option<f64>,
        footprint: Option<f64>,
        height: Option<f64>,
    ) -> StationRecord {
        StationRecord {
            name: name.to_owned(),
            line: None,
            mode: None,
            typology: Typology::Other,
            coordinates: None,
            inner: ZoneMetrics::default(),
            middle: ZoneMetrics::default(),
            outer: ZoneMetrics {
                total_buildings: buildings,
                total_footprint: footprint,
                avg_height: height,
            },
        }
    }

    /// Builds a fully populated station with labels.
    pub fn labelled(
        name: &str,
        mode: &str,
        line: &str,
        typology: Typology,
        outer: (f64, f64, f64),
    ) -> StationRecord {
        StationRecord {
            line: Some(line.to_owned()),
            mode: Some(mode.to_owned()),
            typology,
            coordinates: Some(Coordinates {
                latitude: 41.0,
                longitude: -87.0,
            }),
            ..station(name, Some(outer.0), Some(outer.1), Some(outer.2))
        }
    }

    /// The four-station population whose medians are (50, 1000, 12.5).
    pub fn scenario() -> Vec<StationRecord> {
        vec![
            labelled("One", "LR", "Blue", Typology::Classic, (10.0, 1000.0, 5.0)),
            labelled("Two", "LR", "Red", Typology::Donut, (50.0, 1000.0, 5.0)),
            labelled("Three", "HR", "Red", Typology::Classic, (50.0, 3000.0, 20.0)),
            labelled("Four", "CR", "Green", Typology::Other, (90.0, 500.0, 30.0)),
        ]
    }

    pub fn dataset(records: Vec<StationRecord>, hash: &str) -> Dataset {
        Dataset {
            identity: DatasetIdentity {
                source: "stations.csv".to_owned(),
                content_hash: hash.to_owned(),
            },
            records,
        }
    }
}
