//! Display filters over raw station records.
//!
//! Filters narrow what is shown. They never change thresholds or
//! categories, which are always computed over the full population.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tod_station_models::{StationRecord, Typology};

/// Selector text meaning "no constraint on this dimension".
pub const ALL_SENTINEL: &str = "All";

/// Either no constraint, or a constraint on one filter dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection<T> {
    /// Every value passes.
    #[default]
    All,
    /// Only matching values pass.
    Only(T),
}

impl<T> Selection<T> {
    /// Whether this selection constrains nothing.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl Selection<String> {
    /// Interprets a selector choice. `"All"` (and an empty choice) becomes
    /// [`Selection::All`] instead of a literal match on the text.
    #[must_use]
    pub fn from_choice(choice: &str) -> Self {
        let choice = choice.trim();
        if choice.is_empty() || choice == ALL_SENTINEL {
            Self::All
        } else {
            Self::Only(choice.to_owned())
        }
    }

    fn admits(&self, value: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => value == Some(wanted.as_str()),
        }
    }
}

impl Selection<BTreeSet<Typology>> {
    /// Interprets a list of typology choices. Any `"All"` entry, or an empty
    /// list, yields [`Selection::All`].
    #[must_use]
    pub fn from_choices<S: AsRef<str>>(choices: &[S]) -> Self {
        if choices.is_empty() || choices.iter().any(|c| c.as_ref().trim() == ALL_SENTINEL) {
            return Self::All;
        }
        Self::Only(
            choices
                .iter()
                .filter_map(|c| c.as_ref().parse().ok())
                .collect(),
        )
    }

    fn admits(&self, typology: &Typology) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(typology),
        }
    }
}

/// Conjunction of per-dimension constraints.
///
/// Dimensions are independent, so the order filters are applied in does
/// not matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationFilter {
    /// Transit mode equality constraint.
    pub mode: Selection<String>,
    /// Line equality constraint.
    pub line: Selection<String>,
    /// Typology set-membership constraint.
    pub typologies: Selection<BTreeSet<Typology>>,
}

impl StationFilter {
    /// A filter that passes every record.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Keeps only stations with the given transit mode.
    #[must_use]
    pub fn with_mode(mut self, mode: Selection<String>) -> Self {
        self.mode = mode;
        self
    }

    /// Keeps only stations on the given line.
    #[must_use]
    pub fn with_line(mut self, line: Selection<String>) -> Self {
        self.line = line;
        self
    }

    /// Keeps only stations whose typology is in the set.
    #[must_use]
    pub fn with_typologies(mut self, typologies: Selection<BTreeSet<Typology>>) -> Self {
        self.typologies = typologies;
        self
    }

    /// Keeps only the canonical typologies (`Classic`, `Donut`,
    /// `Monoculture`, `Other`).
    #[must_use]
    pub fn canonical_typologies() -> Self {
        Self::all().with_typologies(Selection::Only(
            Typology::canonical().iter().cloned().collect(),
        ))
    }

    /// Whether every dimension is [`Selection::All`].
    #[must_use]
    pub const fn is_unconstrained(&self) -> bool {
        self.mode.is_all() && self.line.is_all() && self.typologies.is_all()
    }

    /// Whether a record passes every constraint.
    #[must_use]
    pub fn matches(&self, record: &StationRecord) -> bool {
        self.mode.admits(record.mode.as_deref())
            && self.line.admits(record.line.as_deref())
            && self.typologies.admits(&record.typology)
    }
}

/// Returns the records that pass `filter`, in input order.
///
/// The output borrows from the input, so filters compose by feeding one
/// call's output into the next.
pub fn filter_records<'a, I>(records: I, filter: &StationFilter) -> Vec<&'a StationRecord>
where
    I: IntoIterator<Item = &'a StationRecord>,
{
    if filter.is_unconstrained() {
        return records.into_iter().collect();
    }
    records.into_iter().filter(|r| filter.matches(r)).collect()
}

/// Distinct values available for each filter dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    /// Distinct transit modes, sorted.
    pub modes: Vec<String>,
    /// Distinct lines, sorted.
    pub lines: Vec<String>,
    /// Distinct non-blank typologies, sorted.
    pub typologies: Vec<Typology>,
}

impl FilterOptions {
    /// Collects the distinct non-missing values of each dimension.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a StationRecord>,
    {
        let mut modes = BTreeSet::new();
        let mut lines = BTreeSet::new();
        let mut typologies = BTreeSet::new();

        for record in records {
            if let Some(mode) = &record.mode {
                modes.insert(mode.clone());
            }
            if let Some(line) = &record.line {
                lines.insert(line.clone());
            }
            if !record.typology.is_blank() {
                typologies.insert(record.typology.clone());
            }
        }

        Self {
            modes: modes.into_iter().collect(),
            lines: lines.into_iter().collect(),
            typologies: typologies.into_iter().collect(),
        }
    }

    /// Mode choices for a selector, with [`ALL_SENTINEL`] first.
    #[must_use]
    pub fn mode_choices(&self) -> Vec<String> {
        with_all(&self.modes)
    }

    /// Line choices for a selector, with [`ALL_SENTINEL`] first.
    #[must_use]
    pub fn line_choices(&self) -> Vec<String> {
        with_all(&self.lines)
    }

    /// Typology labels for a selector, with [`ALL_SENTINEL`] first.
    #[must_use]
    pub fn typology_choices(&self) -> Vec<String> {
        let labels: Vec<String> = self.typologies.iter().map(ToString::to_string).collect();
        with_all(&labels)
    }
}

fn with_all(values: &[String]) -> Vec<String> {
    std::iter::once(ALL_SENTINEL.to_owned())
        .chain(values.iter().cloned())
        .collect()
}
