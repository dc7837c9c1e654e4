//! Octant classification.
//!
//! Each Outer metric is compared against its threshold with a strict
//! `value > threshold`; a value equal to the median counts as Lower. The
//! three bits (buildings, footprint, height) form the category code.

use serde::Serialize;
use tod_station_models::StationRecord;
use tod_urban_form_models::{Metric, OctantCategory, ThresholdSet};

use crate::UrbanFormError;

/// A station paired with its derived category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedStation<'a> {
    /// The source record.
    pub record: &'a StationRecord,
    /// Its urban form category.
    pub category: OctantCategory,
}

/// Outcome of classifying a population.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification<'a> {
    /// Every complete record with its category, in input order.
    pub stations: Vec<ClassifiedStation<'a>>,
    /// Records that were left out because an Outer metric was missing.
    pub excluded: usize,
}

impl Classification<'_> {
    /// Number of records that were offered for classification.
    #[must_use]
    pub fn input_len(&self) -> usize {
        self.stations.len() + self.excluded
    }
}

/// Classifies one station.
///
/// # Errors
///
/// * [`UrbanFormError::IncompleteRecord`] if any Outer metric is missing
///   or non-finite.
/// * [`UrbanFormError::InvariantViolation`] if the computed code has no
///   category.
pub fn classify(
    record: &StationRecord,
    thresholds: &ThresholdSet,
) -> Result<OctantCategory, UrbanFormError> {
    let mut code = 0u8;
    let mut missing = Vec::new();

    for metric in Metric::all() {
        match metric.outer_value(record).filter(|v| v.is_finite()) {
            Some(value) if value > thresholds.threshold(*metric) => code |= metric.bit(),
            Some(_) => {}
            None => missing.push(*metric),
        }
    }

    if !missing.is_empty() {
        return Err(UrbanFormError::IncompleteRecord {
            station: record.name.clone(),
            missing,
        });
    }

    OctantCategory::from_code(code).ok_or(UrbanFormError::InvariantViolation { code })
}

/// Classifies one station, mapping an incomplete record to `None`.
fn classify_or_exclude<'a>(
    record: &'a StationRecord,
    thresholds: &ThresholdSet,
) -> Result<Option<ClassifiedStation<'a>>, UrbanFormError> {
    match classify(record, thresholds) {
        Ok(category) => Ok(Some(ClassifiedStation { record, category })),
        Err(UrbanFormError::IncompleteRecord { station, missing }) => {
            log::trace!("Excluding {station:?}: missing {missing:?}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn log_exclusions(excluded: usize) {
    if excluded > 0 {
        log::warn!("{excluded} records excluded due to missing data");
    }
}

/// Classifies every record against the same thresholds.
///
/// Incomplete records are counted in [`Classification::excluded`] rather
/// than failing the whole run.
///
/// # Errors
///
/// Returns [`UrbanFormError::InvariantViolation`] if any record produces a
/// code with no category.
pub fn classify_all<'a, I>(
    records: I,
    thresholds: &ThresholdSet,
) -> Result<Classification<'a>, UrbanFormError>
where
    I: IntoIterator<Item = &'a StationRecord>,
{
    let mut classification = Classification::default();

    for record in records {
        match classify_or_exclude(record, thresholds)? {
            Some(station) => classification.stations.push(station),
            None => classification.excluded += 1,
        }
    }

    log::debug!(
        "Classified {} stations ({} excluded)",
        classification.stations.len(),
        classification.excluded
    );
    log_exclusions(classification.excluded);

    Ok(classification)
}

/// Same as [`classify_all`], spread across the rayon thread pool.
///
/// Output order and counts are identical to the sequential version.
///
/// # Errors
///
/// Returns [`UrbanFormError::InvariantViolation`] if any record produces a
/// code with no category.
#[cfg(feature = "parallel")]
pub fn classify_all_parallel<'a>(
    records: &'a [StationRecord],
    thresholds: &ThresholdSet,
) -> Result<Classification<'a>, UrbanFormError> {
    use rayon::prelude::*;

    let outcomes = records
        .par_iter()
        .map(|record| classify_or_exclude(record, thresholds))
        .collect::<Result<Vec<_>, _>>()?;

    let excluded = outcomes.iter().filter(|o| o.is_none()).count();
    let stations: Vec<_> = outcomes.into_iter().flatten().collect();
    log_exclusions(excluded);

    Ok(Classification { stations, excluded })
}
