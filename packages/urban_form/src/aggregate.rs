//! Category counts, optionally grouped by station labels.

use std::collections::BTreeMap;

use tod_urban_form_models::{AggregationResult, CategoryCounts, GroupKey};

use crate::classify::{Classification, ClassifiedStation};

/// Cross-tabulates classified stations against zero or more group keys.
///
/// With no keys the result is a single row over the whole population. Every
/// row has all eight category cells, and the classification's exclusion
/// count is carried into [`AggregationResult::excluded`].
#[must_use]
pub fn aggregate(classification: &Classification<'_>, group_by: &[GroupKey]) -> AggregationResult {
    let result = AggregationResult::from_map(
        group_by.to_vec(),
        tally(&classification.stations, group_by),
        classification.excluded,
    );

    log::debug!(
        "Aggregated {} stations into {} row(s) grouped by {group_by:?}",
        result.total(),
        result.rows.len()
    );

    result
}

type Tally = BTreeMap<Vec<Option<String>>, CategoryCounts>;

fn tally(stations: &[ClassifiedStation<'_>], group_by: &[GroupKey]) -> Tally {
    let mut map = Tally::new();
    for station in stations {
        let key = group_by.iter().map(|k| k.value(station.record)).collect();
        map.entry(key).or_default().increment(station.category);
    }
    map
}

/// Same as [`aggregate`], tallying chunks on the rayon thread pool and
/// adding the partial tables together.
#[cfg(feature = "parallel")]
#[must_use]
pub fn aggregate_parallel(
    classification: &Classification<'_>,
    group_by: &[GroupKey],
) -> AggregationResult {
    use rayon::prelude::*;

    const CHUNK: usize = 1024;

    let map = classification
        .stations
        .par_chunks(CHUNK)
        .map(|chunk| tally(chunk, group_by))
        .reduce(Tally::new, |mut a, b| {
            for (key, counts) in b {
                a.entry(key).or_default().add(&counts);
            }
            a
        });

    AggregationResult::from_map(group_by.to_vec(), map, classification.excluded)
}

#[cfg(test)]
mod tests {
    use tod_station_models::Typology;
    use tod_urban_form_models::{CATEGORY_COUNT, OctantCategory};

    use super::*;
    use crate::test_support::{labelled, scenario, station};
    use crate::{classify_all, compute_thresholds};

    #[test]
    fn ungrouped_scenario_counts() {
        let records = scenario();
        let t = compute_thresholds(&records).unwrap();
        let classification = classify_all(&records, &t).unwrap();
        let result = aggregate(&classification, &[]);

        assert_eq!(result.rows.len(), 1);
        let counts: Vec<u64> = result.rows[0].counts.iter().map(|(_, n)| n).collect();
        assert_eq!(counts, vec![2, 0, 0, 1, 0, 1, 0, 0]);
        assert_eq!(result.total(), 4);
    }

    #[test]
    fn grouped_rows_are_dense_and_conserve_counts() {
        let mut records = scenario();
        records.push(station("no metrics", None, None, None));
        let t = compute_thresholds(&records).unwrap();
        let classification = classify_all(&records, &t).unwrap();

        for keys in [
            vec![],
            vec![GroupKey::Mode],
            vec![GroupKey::Line],
            vec![GroupKey::Typology],
            vec![GroupKey::Mode, GroupKey::Line],
        ] {
            let result = aggregate(&classification, &keys);
            assert_eq!(
                result.total(),
                classification.stations.len() as u64,
                "count conservation for {keys:?}"
            );
            assert_eq!(result.excluded, 1);
            for row in &result.rows {
                assert_eq!(row.key.len(), keys.len());
                assert_eq!(row.counts.iter().count(), CATEGORY_COUNT);
            }
        }
    }

    #[test]
    fn grouped_by_mode() {
        let records = scenario();
        let t = compute_thresholds(&records).unwrap();
        let classification = classify_all(&records, &t).unwrap();
        let result = aggregate(&classification, &[GroupKey::Mode]);

        let modes: Vec<_> = result.rows.iter().map(|r| r.key_labels()[0]).collect();
        assert_eq!(modes, vec!["CR", "HR", "LR"]);

        let lr = result.row(&[Some("LR")]).unwrap();
        assert_eq!(lr.counts.get(OctantCategory::Underbuilt), 2);
        assert_eq!(lr.counts.get(OctantCategory::UrbanCore), 0);
    }

    #[test]
    fn missing_group_values_form_their_own_row() {
        let mut records = vec![labelled(
            "labelled",
            "LR",
            "Blue",
            Typology::Classic,
            (1.0, 1.0, 1.0),
        )];
        records.push(station("unlabelled", Some(2.0), Some(2.0), Some(2.0)));
        let t = compute_thresholds(&records).unwrap();
        let classification = classify_all(&records, &t).unwrap();
        let result = aggregate(&classification, &[GroupKey::Line]);

        assert_eq!(result.rows.len(), 2);
        let none = result.row(&[None]).unwrap();
        assert_eq!(none.counts.get(OctantCategory::UrbanCore), 1);
    }

    #[test]
    fn blank_typologies_group_as_missing() {
        let records = vec![
            labelled("a", "LR", "Blue", Typology::Classic, (1.0, 1.0, 1.0)),
            labelled("b", "LR", "Blue", Typology::Unlisted(String::new()), (2.0, 2.0, 2.0)),
        ];
        let t = compute_thresholds(&records).unwrap();
        let classification = classify_all(&records, &t).unwrap();
        let result = aggregate(&classification, &[GroupKey::Typology]);

        let labels: Vec<_> = result.rows.iter().map(|r| r.key_labels()[0]).collect();
        assert_eq!(labels, vec!["(none)", "Classic"]);
        assert!(result.row(&[Some("")]).is_none());
    }

    #[test]
    fn empty_classification_still_has_a_row() {
        let result = aggregate(&Classification::default(), &[]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn partial_aggregations_merge_to_the_whole() {
        let records = scenario();
        let t = compute_thresholds(&records).unwrap();
        let whole = classify_all(&records, &t).unwrap();
        let (left, right) = records.split_at(1);
        let a = aggregate(&classify_all(left, &t).unwrap(), &[GroupKey::Line]);
        let b = aggregate(&classify_all(right, &t).unwrap(), &[GroupKey::Line]);

        assert_eq!(
            b.merge(a).unwrap(),
            aggregate(&whole, &[GroupKey::Line])
        );
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_matches_sequential() {
        let records = scenario();
        let t = compute_thresholds(&records).unwrap();
        let classification = classify_all(&records, &t).unwrap();
        assert_eq!(
            aggregate_parallel(&classification, &[GroupKey::Mode]),
            aggregate(&classification, &[GroupKey::Mode])
        );
    }
}
