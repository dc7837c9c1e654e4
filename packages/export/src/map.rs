//! `GeoJSON` station layer for map rendering.

use std::io::Write;

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use tod_station_models::{BufferZone, StationRecord, ZoneField};
use tod_urban_form::AnalysisSession;
use tod_urban_form::filter::StationFilter;
use tod_urban_form::views::map_center;
use tod_urban_form_models::OctantCategory;

use crate::ExportError;

fn properties(record: &StationRecord, category: Option<OctantCategory>) -> JsonObject {
    let mut props = JsonObject::new();
    props.insert("name".to_string(), JsonValue::from(record.name.as_str()));
    props.insert("line".to_string(), JsonValue::from(record.line.clone()));
    props.insert("mode".to_string(), JsonValue::from(record.mode.clone()));
    props.insert(
        "typology".to_string(),
        JsonValue::from(record.typology.label()),
    );
    for field in ZoneField::all() {
        props.insert(
            field.column_name(BufferZone::Outer),
            JsonValue::from(record.outer.get(*field)),
        );
    }
    props.insert(
        "category".to_string(),
        JsonValue::from(category.map(OctantCategory::label)),
    );
    props
}

/// Builds a point feature per station that has coordinates.
///
/// The collection carries the mean station position as a `center` foreign
/// member (`[longitude, latitude]`) so a renderer can frame the map.
pub fn station_layer<'a, I>(stations: I) -> FeatureCollection
where
    I: IntoIterator<Item = (&'a StationRecord, Option<OctantCategory>)>,
{
    let stations: Vec<_> = stations.into_iter().collect();
    let center = map_center(stations.iter().map(|(r, _)| *r));

    let features: Vec<Feature> = stations
        .iter()
        .filter_map(|(record, category)| {
            let coords = record.coordinates?;
            Some(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![
                    coords.longitude,
                    coords.latitude,
                ]))),
                id: None,
                properties: Some(properties(record, *category)),
                foreign_members: None,
            })
        })
        .collect();

    let skipped = stations.len() - features.len();
    if skipped > 0 {
        log::debug!("{skipped} station(s) without coordinates left off the map");
    }

    let foreign_members = center.map(|c| {
        let mut members = JsonObject::new();
        members.insert(
            "center".to_string(),
            JsonValue::from(vec![c.longitude, c.latitude]),
        );
        members
    });

    FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    }
}

/// Builds the station layer for the records of a session that pass
/// `filter`, tagging each with its category.
#[must_use]
pub fn session_layer(session: &AnalysisSession, filter: &StationFilter) -> FeatureCollection {
    station_layer(
        session
            .dataset()
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| filter.matches(record))
            .map(|(idx, record)| (record, session.category_of(idx))),
    )
}

/// Serializes a feature collection as pretty-printed `GeoJSON`.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization or the writer fails.
pub fn write_geojson<W: Write>(
    collection: &FeatureCollection,
    writer: W,
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, collection)?;
    Ok(())
}
