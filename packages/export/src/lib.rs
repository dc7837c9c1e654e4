#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Writers for the derived tables of an urban form analysis.
//!
//! Exports are views over an in-memory analysis and are never read back.
//! Tables are UTF-8, comma separated, with a single header row.

pub mod map;

use std::io::Write;

use tod_station_models::{
    BufferZone, COL_LINE_NAME, COL_NTD_MODE, COL_STATION_NAME, COL_TYPOLOGY, StationRecord,
    ZoneField, required_columns,
};
use tod_urban_form::Classification;
use tod_urban_form::views::{QuadrantView, TypologyCount};
use tod_urban_form_models::{AggregationResult, MISSING_GROUP_LABEL, OctantCategory};

pub use map::{session_layer, station_layer, write_geojson};

/// Header of the label column in single-dimension count tables.
pub const LABEL_HEADER: &str = "Urban Form Typology";

/// Header of the count column in single-dimension count tables.
pub const COUNT_HEADER: &str = "Station Count";

/// Header of the category column in per-station tables.
pub const CATEGORY_HEADER: &str = "Category";

/// Errors that can occur while writing an export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The underlying writer failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes an aggregation as CSV.
///
/// An ungrouped result becomes a two-column table with one row per
/// category in canonical order. A grouped result becomes a pivot with one
/// column per group key followed by one column per category label.
///
/// # Errors
///
/// Returns [`ExportError`] if writing fails.
pub fn write_summary<W: Write>(result: &AggregationResult, writer: W) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);

    if result.group_keys.is_empty() {
        let totals = result.category_totals();
        csv.write_record([LABEL_HEADER, COUNT_HEADER])?;
        for (category, count) in totals.iter() {
            csv.write_record([category.label(), count.to_string()])?;
        }
    } else {
        let header: Vec<String> = result
            .group_keys
            .iter()
            .map(|k| k.column_name().to_owned())
            .chain(OctantCategory::all().iter().map(|c| c.label()))
            .collect();
        csv.write_record(&header)?;

        for row in &result.rows {
            let record: Vec<String> = row
                .key_labels()
                .into_iter()
                .map(str::to_owned)
                .chain(row.counts.iter().map(|(_, n)| n.to_string()))
                .collect();
            csv.write_record(&record)?;
        }
    }

    csv.flush()?;
    log::debug!("Wrote summary with {} row(s)", result.rows.len());
    Ok(())
}

/// Writes station counts per pre-existing typology label. Stations with a
/// blank label are counted under [`MISSING_GROUP_LABEL`].
///
/// # Errors
///
/// Returns [`ExportError`] if writing fails.
pub fn write_typology_counts<W: Write>(
    counts: &[TypologyCount],
    writer: W,
) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([LABEL_HEADER, COUNT_HEADER])?;
    for entry in counts {
        let label = if entry.typology.is_blank() {
            MISSING_GROUP_LABEL
        } else {
            entry.typology.label()
        };
        csv.write_record([label, entry.count.to_string().as_str()])?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes station records with the label columns and all nine zone
/// metrics. Missing values are written as empty cells.
///
/// # Errors
///
/// Returns [`ExportError`] if writing fails.
pub fn write_station_table<'a, I, W>(records: I, writer: W) -> Result<(), ExportError>
where
    I: IntoIterator<Item = &'a StationRecord>,
    W: Write,
{
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(required_columns())?;

    let mut written = 0usize;
    for record in records {
        let mut row = vec![
            record.name.clone(),
            record.line.clone().unwrap_or_default(),
            record.mode.clone().unwrap_or_default(),
            record.typology.label().to_owned(),
        ];
        for field in ZoneField::all() {
            for zone in BufferZone::all() {
                row.push(
                    record
                        .zone(*zone)
                        .get(*field)
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                );
            }
        }
        csv.write_record(&row)?;
        written += 1;
    }

    csv.flush()?;
    log::debug!("Wrote {written} station row(s)");
    Ok(())
}

/// Writes one row per classified station with its category label.
///
/// # Errors
///
/// Returns [`ExportError`] if writing fails.
pub fn write_classification<W: Write>(
    classification: &Classification<'_>,
    writer: W,
) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        COL_STATION_NAME,
        COL_LINE_NAME,
        COL_NTD_MODE,
        COL_TYPOLOGY,
        CATEGORY_HEADER,
    ])?;
    for station in &classification.stations {
        let record = station.record;
        csv.write_record([
            record.name.as_str(),
            record.line.as_deref().unwrap_or_default(),
            record.mode.as_deref().unwrap_or_default(),
            record.typology.label(),
            station.category.label().as_str(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes the eight categories in canonical order with their
/// Higher/Lower pattern and a short description of the built form.
///
/// # Errors
///
/// Returns [`ExportError`] if writing fails.
pub fn write_categories<W: Write>(writer: W) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([CATEGORY_HEADER, "Pattern", "Description"])?;
    for category in OctantCategory::all() {
        csv.write_record([
            category.label(),
            category.pattern(),
            category.description().to_owned(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes the points of a quadrant plot, one row per station.
///
/// # Errors
///
/// Returns [`ExportError`] if writing fails.
pub fn write_quadrant<W: Write>(view: &QuadrantView, writer: W) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        COL_STATION_NAME,
        COL_NTD_MODE,
        view.pair.x().axis_label(),
        view.pair.y().axis_label(),
        CATEGORY_HEADER,
    ])?;
    for point in &view.points {
        csv.write_record([
            point.station.clone(),
            point.mode.clone().unwrap_or_default(),
            point.x.to_string(),
            point.y.to_string(),
            point.category.label(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}
