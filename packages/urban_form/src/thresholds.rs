//! Per-metric median thresholds.

use tod_station_models::StationRecord;
use tod_urban_form_models::{Metric, PerMetric, ThresholdSet};

use crate::UrbanFormError;

/// Computes the median of each Outer metric independently.
///
/// A record missing one metric still contributes to the other two.
/// Non-finite values are treated as missing. The result does not depend on
/// the order of `records`.
///
/// # Errors
///
/// Returns [`UrbanFormError::EmptyPopulation`] for the first metric (in bit
/// order) that has no values at all.
pub fn compute_thresholds<'a, I>(records: I) -> Result<ThresholdSet, UrbanFormError>
where
    I: IntoIterator<Item = &'a StationRecord>,
{
    let mut buildings = Vec::new();
    let mut footprint = Vec::new();
    let mut height = Vec::new();

    for record in records {
        for metric in Metric::all() {
            let Some(value) = metric.outer_value(record).filter(|v| v.is_finite()) else {
                continue;
            };
            match metric {
                Metric::Buildings => buildings.push(value),
                Metric::Footprint => footprint.push(value),
                Metric::Height => height.push(value),
            }
        }
    }

    let sample_sizes = PerMetric {
        buildings: buildings.len(),
        footprint: footprint.len(),
        height: height.len(),
    };

    let medians = PerMetric {
        buildings: median(&mut buildings).ok_or(UrbanFormError::EmptyPopulation {
            metric: Metric::Buildings,
        })?,
        footprint: median(&mut footprint).ok_or(UrbanFormError::EmptyPopulation {
            metric: Metric::Footprint,
        })?,
        height: median(&mut height).ok_or(UrbanFormError::EmptyPopulation {
            metric: Metric::Height,
        })?,
    };

    log::debug!(
        "Computed thresholds: buildings={} (n={}), footprint={} (n={}), height={} (n={})",
        medians.buildings,
        sample_sizes.buildings,
        medians.footprint,
        sample_sizes.footprint,
        medians.height,
        sample_sizes.height,
    );

    Ok(ThresholdSet {
        population: None,
        medians,
        sample_sizes,
    })
}

/// Order-statistic median: the middle value for an odd count, the midpoint
/// of the two middle values for an even count. Sorts `values` in place.
///
/// Returns `None` for an empty slice.
#[must_use]
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some(values[mid - 1] + (values[mid] - values[mid - 1]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{scenario, station};

    #[test]
    fn median_of_odd_and_even_counts() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&mut [7.0]), Some(7.0));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn median_of_huge_values_stays_finite() {
        assert_eq!(median(&mut [f64::MAX, f64::MAX]), Some(f64::MAX));
        assert_eq!(median(&mut [-f64::MAX, -f64::MAX]), Some(-f64::MAX));
    }

    #[test]
    fn scenario_medians() {
        let records = scenario();
        let thresholds = compute_thresholds(&records).unwrap();
        assert_eq!(thresholds.threshold(Metric::Buildings), 50.0);
        assert_eq!(thresholds.threshold(Metric::Footprint), 1000.0);
        assert!((thresholds.threshold(Metric::Height) - 12.5).abs() < f64::EPSILON);
        assert_eq!(thresholds.sample_sizes.height, 4);
    }

    #[test]
    fn order_does_not_change_thresholds() {
        let records = scenario();
        let expected = compute_thresholds(&records).unwrap();

        let mut reversed = records.clone();
        reversed.reverse();
        assert_eq!(compute_thresholds(&reversed).unwrap(), expected);

        let mut rotated = records;
        rotated.rotate_left(1);
        assert_eq!(compute_thresholds(&rotated).unwrap(), expected);
    }

    #[test]
    fn missing_values_only_drop_out_of_their_own_metric() {
        let records = vec![
            station("a", Some(1.0), Some(10.0), None),
            station("b", Some(3.0), None, Some(7.0)),
            station("c", None, Some(30.0), Some(9.0)),
        ];
        let thresholds = compute_thresholds(&records).unwrap();
        assert_eq!(thresholds.medians.buildings, 2.0);
        assert_eq!(thresholds.medians.footprint, 20.0);
        assert_eq!(thresholds.medians.height, 8.0);
        assert_eq!(thresholds.sample_sizes.buildings, 2);
    }

    #[test]
    fn non_finite_values_are_ignored() {
        let records = vec![
            station("a", Some(f64::NAN), Some(1.0), Some(1.0)),
            station("b", Some(4.0), Some(1.0), Some(1.0)),
        ];
        let thresholds = compute_thresholds(&records).unwrap();
        assert_eq!(thresholds.medians.buildings, 4.0);
        assert_eq!(thresholds.sample_sizes.buildings, 1);
    }

    #[test]
    fn empty_metric_fails() {
        let records = vec![station("a", Some(1.0), Some(1.0), None)];
        assert_eq!(
            compute_thresholds(&records),
            Err(UrbanFormError::EmptyPopulation {
                metric: Metric::Height
            })
        );
        assert_eq!(
            compute_thresholds(std::iter::empty()),
            Err(UrbanFormError::EmptyPopulation {
                metric: Metric::Buildings
            })
        );
    }
}
