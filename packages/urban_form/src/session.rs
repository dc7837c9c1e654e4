//! Per-dataset analysis state and its memoization cache.
//!
//! An [`AnalysisSession`] owns one immutable [`Dataset`] snapshot, the
//! [`ThresholdSet`] computed over all of it, and each record's category.
//! Every grouping, filter, or view in the session reuses those results, so
//! category semantics stay comparable across views.

use std::collections::BTreeMap;
use std::sync::Arc;

use tod_station_models::{Dataset, DatasetIdentity};
use tod_urban_form_models::{AggregationResult, GroupKey, OctantCategory, ThresholdSet};

use crate::classify::{Classification, ClassifiedStation, classify_all};
use crate::filter::StationFilter;
use crate::thresholds::compute_thresholds;
use crate::{UrbanFormError, aggregate};

/// Thresholds and categories for one dataset snapshot.
#[derive(Debug)]
pub struct AnalysisSession {
    dataset: Arc<Dataset>,
    thresholds: ThresholdSet,
    /// Category of each record by index, `None` when excluded.
    categories: Vec<Option<OctantCategory>>,
}

impl AnalysisSession {
    /// Computes thresholds over the full dataset, then classifies every
    /// record against them.
    ///
    /// # Errors
    ///
    /// * [`UrbanFormError::EmptyPopulation`] if a metric has no values.
    /// * [`UrbanFormError::InvariantViolation`] on a classifier defect.
    pub fn compute(dataset: Arc<Dataset>) -> Result<Self, UrbanFormError> {
        log::info!(
            "Computing thresholds for {} ({} stations)",
            dataset.identity,
            dataset.len()
        );

        let thresholds = ThresholdSet {
            population: Some(dataset.identity.clone()),
            ..compute_thresholds(&dataset.records)?
        };
        let categories = {
            let classification = classify_all(&dataset.records, &thresholds)?;
            let mut classified = classification.stations.iter().peekable();
            dataset
                .records
                .iter()
                .map(|record| {
                    classified
                        .next_if(|s| std::ptr::eq(s.record, record))
                        .map(|s| s.category)
                })
                .collect()
        };

        Ok(Self {
            dataset,
            thresholds,
            categories,
        })
    }

    /// Identity of the dataset this session was computed from.
    #[must_use]
    pub fn identity(&self) -> &DatasetIdentity {
        &self.dataset.identity
    }

    /// The dataset snapshot.
    #[must_use]
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Thresholds computed over the full dataset, tagged with its identity.
    #[must_use]
    pub const fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    /// Category of the record at `index`, or `None` if it was excluded or
    /// the index is out of range.
    #[must_use]
    pub fn category_of(&self, index: usize) -> Option<OctantCategory> {
        self.categories.get(index).copied().flatten()
    }

    /// Classification of the full dataset.
    #[must_use]
    pub fn classification(&self) -> Classification<'_> {
        self.classification_where(&StationFilter::all())
    }

    /// Classification restricted to the records passing `filter`.
    ///
    /// Categories are still those computed against the full-population
    /// thresholds; `excluded` counts only filtered records.
    #[must_use]
    pub fn classification_where(&self, filter: &StationFilter) -> Classification<'_> {
        let mut classification = Classification::default();
        for (record, category) in self.dataset.records.iter().zip(&self.categories) {
            if !filter.matches(record) {
                continue;
            }
            match category {
                Some(category) => classification.stations.push(ClassifiedStation {
                    record,
                    category: *category,
                }),
                None => classification.excluded += 1,
            }
        }
        classification
    }

    /// Aggregates the records passing `filter` by `group_by`.
    #[must_use]
    pub fn aggregate(&self, filter: &StationFilter, group_by: &[GroupKey]) -> AggregationResult {
        aggregate(&self.classification_where(filter), group_by)
    }
}

/// Memoizes one [`AnalysisSession`] per data source.
///
/// A source whose content changes (a new [`DatasetIdentity`] for the same
/// `source`) replaces the stale session on the next lookup.
#[derive(Debug, Default)]
pub struct SessionCache {
    sessions: BTreeMap<String, Arc<AnalysisSession>>,
    hits: u64,
    misses: u64,
}

impl SessionCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached session for `dataset`, computing it if the source
    /// is new or its content changed.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`AnalysisSession::compute`]. A failed
    /// computation leaves no entry behind for the source.
    pub fn get_or_compute(
        &mut self,
        dataset: Arc<Dataset>,
    ) -> Result<Arc<AnalysisSession>, UrbanFormError> {
        let source = dataset.identity.source.clone();

        if let Some(session) = self.sessions.get(&source)
            && *session.identity() == dataset.identity
        {
            self.hits += 1;
            log::debug!("Session cache hit for {}", dataset.identity);
            return Ok(Arc::clone(session));
        }

        self.misses += 1;
        if self.sessions.remove(&source).is_some() {
            log::info!("Dataset {source} changed, recomputing thresholds");
        }

        let session = Arc::new(AnalysisSession::compute(dataset)?);
        self.sessions.insert(source, Arc::clone(&session));
        Ok(session)
    }

    /// Returns the cached session for an identity without computing.
    #[must_use]
    pub fn get(&self, identity: &DatasetIdentity) -> Option<Arc<AnalysisSession>> {
        self.sessions
            .get(&identity.source)
            .filter(|s| s.identity() == identity)
            .cloned()
    }

    /// Drops the session for a source. Returns whether one was cached.
    pub fn invalidate(&mut self, source: &str) -> bool {
        self.sessions.remove(source).is_some()
    }

    /// Drops every cached session.
    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// Number of cached sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Lookups served from the cache.
    #[must_use]
    pub const fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that had to compute a session.
    #[must_use]
    pub const fn misses(&self) -> u64 {
        self.misses
    }
}
