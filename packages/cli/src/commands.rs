//! Subcommand implementations shared by the flag-driven CLI and the
//! interactive menu.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tod_urban_form::views::{QuadrantPair, count_by_typology, quadrant_view};
use tod_urban_form::{AnalysisSession, Selection, SessionCache, StationFilter, filter_records};
use tod_station_models::BufferZone;
use tod_urban_form_models::{GroupKey, Metric};

use crate::config::Config;

/// Filter as given on the command line or picked in the menu.
///
/// Display views (typology counts, station table, map) fall back to the
/// configured typology set. Category counts only narrow by what was chosen
/// explicitly, so they cover every classified station by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChoice {
    /// Mode choice, `"All"` for no constraint.
    pub mode: String,
    /// Line choice, `"All"` for no constraint.
    pub line: String,
    /// Typology choices. Empty means no explicit choice.
    pub typologies: Vec<String>,
}

impl Default for FilterChoice {
    fn default() -> Self {
        Self {
            mode: tod_urban_form::filter::ALL_SENTINEL.to_owned(),
            line: tod_urban_form::filter::ALL_SENTINEL.to_owned(),
            typologies: Vec::new(),
        }
    }
}

impl FilterChoice {
    /// Filter for display views. Falls back to the configured typology set
    /// when no typologies were chosen.
    #[must_use]
    pub fn display_filter(&self, config: &Config) -> StationFilter {
        if self.typologies.is_empty() {
            self.filter_with(&config.typologies)
        } else {
            self.filter_with(&self.typologies)
        }
    }

    /// Filter for category counts and per-station categories. Only the
    /// explicit choices constrain it.
    #[must_use]
    pub fn analysis_filter(&self) -> StationFilter {
        self.filter_with(&self.typologies)
    }

    fn filter_with(&self, typologies: &[String]) -> StationFilter {
        StationFilter::all()
            .with_mode(Selection::from_choice(&self.mode))
            .with_line(Selection::from_choice(&self.line))
            .with_typologies(Selection::from_choices(typologies))
    }

    /// One-line description for menu headers.
    #[must_use]
    pub fn describe(&self) -> String {
        let typologies = if self.typologies.is_empty() {
            "default".to_owned()
        } else {
            self.typologies.join(", ")
        };
        format!(
            "mode = {}, line = {}, typology = {typologies}",
            self.mode, self.line
        )
    }
}

/// Resolved configuration plus the session cache for one CLI run.
pub struct Context {
    pub config: Config,
    cache: SessionCache,
}

impl Context {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cache: SessionCache::new(),
        }
    }

    /// Loads the configured dataset and returns its analysis session,
    /// reusing the cached one when the file content is unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset cannot be loaded or a metric has no
    /// values to take a median of.
    pub fn session(&mut self) -> Result<Arc<AnalysisSession>, Box<dyn std::error::Error>> {
        let dataset = tod_ingest::load_dataset(&self.config.dataset)?;
        Ok(self.cache.get_or_compute(Arc::new(dataset))?)
    }

    /// Drops every cached session so the next lookup recomputes.
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    fn writer(&self, output: Option<&Path>) -> io::Result<Box<dyn Write>> {
        Ok(match output {
            Some(path) => {
                let path = self.config.output_path(path);
                log::info!("Writing {}", path.display());
                Box::new(BufWriter::new(File::create(path)?))
            }
            None => Box::new(io::stdout().lock()),
        })
    }
}

/// Writes the session-wide medians as a table, or as JSON including the
/// identity of the dataset they were computed over.
///
/// # Errors
///
/// Returns an error if the session cannot be computed or output fails.
pub fn thresholds(
    ctx: &mut Context,
    output: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = ctx.session()?;
    let mut writer = ctx.writer(output)?;

    if json {
        serde_json::to_writer_pretty(&mut writer, session.thresholds())?;
        writeln!(writer)?;
    } else {
        write_threshold_table(&session, &mut writer)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_threshold_table(session: &AnalysisSession, out: &mut dyn Write) -> io::Result<()> {
    let t = session.thresholds();
    let zone = BufferZone::Outer;

    writeln!(out, "Thresholds for {}", session.identity())?;
    writeln!(out, "Medians over the {zone} ring ({} m)", zone.radius_m())?;
    writeln!(
        out,
        "{:<16} {:<22} {:>14} {:>8}",
        "METRIC", "COLUMN", "MEDIAN", "N"
    )?;
    writeln!(out, "{}", "-".repeat(63))?;
    for metric in Metric::all() {
        writeln!(
            out,
            "{:<16} {:<22} {:>14.3} {:>8}",
            metric.label(),
            metric.field().column_name(zone),
            t.threshold(*metric),
            t.sample_sizes.get(*metric)
        )?;
    }
    Ok(())
}

/// Writes the eight categories with their patterns and descriptions.
///
/// # Errors
///
/// Returns an error if output fails.
pub fn categories(ctx: &Context, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    tod_export::write_categories(ctx.writer(output)?)?;
    Ok(())
}

/// Writes each filtered station with its category.
///
/// # Errors
///
/// Returns an error if the session cannot be computed or output fails.
pub fn classify(
    ctx: &mut Context,
    filter: &FilterChoice,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = ctx.session()?;
    let classification = session.classification_where(&filter.analysis_filter());
    log_excluded(classification.excluded);
    tod_export::write_classification(&classification, ctx.writer(output)?)?;
    Ok(())
}

/// Writes the category summary, optionally grouped.
///
/// # Errors
///
/// Returns an error if the session cannot be computed or output fails.
pub fn summary(
    ctx: &mut Context,
    filter: &FilterChoice,
    group_by: &[GroupKey],
    output: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = ctx.session()?;
    let result = session.aggregate(&filter.analysis_filter(), group_by);
    log_excluded(result.excluded);

    if json {
        let mut writer = ctx.writer(output)?;
        serde_json::to_writer_pretty(&mut writer, &result)?;
        writeln!(writer)?;
        writer.flush()?;
        return Ok(());
    }

    tod_export::write_summary(&result, ctx.writer(output)?)?;
    Ok(())
}

/// Writes station counts per pre-existing typology label for the display
/// filter.
///
/// # Errors
///
/// Returns an error if the session cannot be computed or output fails.
pub fn typologies(
    ctx: &mut Context,
    filter: &FilterChoice,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = ctx.session()?;
    let filter = filter.display_filter(&ctx.config);
    let records = filter_records(&session.dataset().records, &filter);
    let counts = count_by_typology(records);
    tod_export::write_typology_counts(&counts, ctx.writer(output)?)?;
    Ok(())
}

/// Writes the station table for the display filter.
///
/// # Errors
///
/// Returns an error if the session cannot be computed or output fails.
pub fn stations(
    ctx: &mut Context,
    filter: &FilterChoice,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = ctx.session()?;
    let filter = filter.display_filter(&ctx.config);
    let records = filter_records(&session.dataset().records, &filter);
    tod_export::write_station_table(records, ctx.writer(output)?)?;
    Ok(())
}

/// Writes quadrant plot data for one metric pair, or for every pair when
/// `pair` is `None`.
///
/// # Errors
///
/// Returns an error if the session cannot be computed or output fails.
pub fn quadrant(
    ctx: &mut Context,
    filter: &FilterChoice,
    pair: Option<QuadrantPair>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = ctx.session()?;
    let classification = session.classification_where(&filter.analysis_filter());
    let pairs = pair.map_or_else(|| QuadrantPair::all().to_vec(), |p| vec![p]);

    let views: Vec<_> = pairs
        .into_iter()
        .map(|p| quadrant_view(&classification, session.thresholds(), p))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    for view in &views {
        println!(
            "# {} (median x = {}, median y = {})",
            view.pair.title(),
            view.x_median,
            view.y_median
        );
        tod_export::write_quadrant(view, io::stdout().lock())?;
        println!();
    }
    Ok(())
}

/// Writes the `GeoJSON` station layer for the display filter.
///
/// # Errors
///
/// Returns an error if the session cannot be computed or output fails.
pub fn map(
    ctx: &mut Context,
    filter: &FilterChoice,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = ctx.session()?;
    let layer = tod_export::session_layer(&session, &filter.display_filter(&ctx.config));
    log::info!("Map layer has {} station(s)", layer.features.len());

    let mut writer = ctx.writer(output)?;
    tod_export::write_geojson(&layer, &mut writer)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Default file name for an export when the user asked to save one.
#[must_use]
pub fn default_output(name: &str) -> PathBuf {
    PathBuf::from(format!("{name}.csv"))
}

fn log_excluded(excluded: usize) {
    if excluded > 0 {
        log::info!("{excluded} shown record(s) left out for missing Outer metrics");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::fs;

    use tod_station_models::Typology;

    use super::*;

    const HEADER: &str = "StationName,line_name,ntd_mode,Typology,Latitude,Longitude,\
Inner_AvgHeight,Middle_AvgHeight,Outer_AvgHeight,\
Inner_TotalFootprint,Middle_TotalFootprint,Outer_TotalFootprint,\
Inner_TotalBuildings,Middle_TotalBuildings,Outer_TotalBuildings";

    /// Four canonical stations plus two `Hub` stations, all with complete
    /// Outer metrics, and one station missing its Outer height.
    const ROWS: &[&str] = &[
        "One,Blue,LR,Classic,41.88,-87.63,,,5,,,1000,,,10",
        "Two,Red,LR,Donut,41.89,-87.62,,,5,,,1000,,,50",
        "Three,Red,HR,Classic,41.90,-87.61,,,20,,,3000,,,50",
        "Four,Green,CR,Other,41.91,-87.60,,,30,,,500,,,90",
        "Five,Blue,LR,Hub,41.92,-87.59,,,40,,,4000,,,100",
        "Six,Red,HR,Hub,,,,,1,,,100,,,1",
        "Seven,Green,CR,Classic,,,,,,,,200,,,3",
    ];

    /// Writes the fixture dataset into a fresh directory that also serves
    /// as the export directory.
    fn context(name: &str) -> Context {
        let dir = std::env::temp_dir().join(format!("tod_cli_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let dataset = dir.join("stations.csv");
        fs::write(&dataset, format!("{HEADER}\n{}\n", ROWS.join("\n"))).unwrap();

        Context::new(Config {
            dataset,
            export_dir: dir,
            ..Config::default()
        })
    }

    fn read_output(ctx: &Context, name: &str) -> String {
        fs::read_to_string(ctx.config.output_path(Path::new(name))).unwrap()
    }

    #[test]
    fn display_filter_uses_configured_typologies() {
        let config = Config {
            typologies: vec!["Donut".to_owned()],
            ..Config::default()
        };
        let filter = FilterChoice::default().display_filter(&config);
        assert!(filter.mode.is_all());
        assert!(filter.line.is_all());
        assert_eq!(
            filter.typologies,
            Selection::Only(BTreeSet::from([Typology::Donut]))
        );
    }

    #[test]
    fn analysis_filter_ignores_configured_typologies() {
        assert!(FilterChoice::default().analysis_filter().is_unconstrained());

        let choice = FilterChoice {
            line: "Red".to_owned(),
            typologies: vec!["Classic".to_owned()],
            ..FilterChoice::default()
        };
        let filter = choice.analysis_filter();
        assert_eq!(filter.line, Selection::Only("Red".to_owned()));
        assert_eq!(
            filter.typologies,
            Selection::Only(BTreeSet::from([Typology::Classic]))
        );
    }

    #[test]
    fn explicit_all_overrides_configured_typologies() {
        let choice = FilterChoice {
            mode: "LR".to_owned(),
            typologies: vec!["All".to_owned()],
            ..FilterChoice::default()
        };
        let filter = choice.display_filter(&Config::default());
        assert_eq!(filter.mode, Selection::Only("LR".to_owned()));
        assert!(filter.typologies.is_all());
    }

    #[test]
    fn default_summary_accounts_for_every_row() {
        let mut ctx = context("accounting");
        let session = ctx.session().unwrap();
        let rows = session.dataset().len();

        let result = session.aggregate(&FilterChoice::default().analysis_filter(), &[]);
        assert_eq!(usize::try_from(result.total()).unwrap() + result.excluded, rows);
        assert_eq!(result.excluded, 1);

        let displayed = filter_records(
            &session.dataset().records,
            &FilterChoice::default().display_filter(&ctx.config),
        );
        assert_eq!(displayed.len(), 5);
    }

    #[test]
    fn summary_csv_covers_unlisted_typologies() {
        let mut ctx = context("summary_csv");
        summary(
            &mut ctx,
            &FilterChoice::default(),
            &[],
            Some(Path::new("summary.csv")),
            false,
        )
        .unwrap();

        let text = read_output(&ctx, "summary.csv");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Urban Form Typology,Station Count");
        assert_eq!(lines.len(), 9);
        let total: u64 = lines[1..]
            .iter()
            .map(|l| l.rsplit(',').next().unwrap().parse::<u64>().unwrap())
            .sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn summary_json_is_grouped_and_filtered() {
        let mut ctx = context("summary_json");
        let choice = FilterChoice {
            typologies: vec!["Hub".to_owned()],
            ..FilterChoice::default()
        };
        summary(
            &mut ctx,
            &choice,
            &[GroupKey::Mode],
            Some(Path::new("summary.json")),
            true,
        )
        .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&read_output(&ctx, "summary.json")).unwrap();
        assert_eq!(json["groupKeys"], serde_json::json!(["mode"]));
        let modes: Vec<&str> = json["rows"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["key"][0].as_str().unwrap())
            .collect();
        assert_eq!(modes, vec!["HR", "LR"]);
        assert_eq!(json["excluded"], 0);
    }

    #[test]
    fn classify_writes_one_row_per_classified_station() {
        let mut ctx = context("classify");
        let choice = FilterChoice {
            mode: "HR".to_owned(),
            ..FilterChoice::default()
        };
        classify(&mut ctx, &choice, Some(Path::new("classified.csv"))).unwrap();

        let text = read_output(&ctx, "classified.csv");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "StationName,line_name,ntd_mode,Typology,Category");
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("Six,Red,HR,Hub,Category 1"));
    }

    #[test]
    fn display_views_keep_to_configured_typologies() {
        let mut ctx = context("display");
        let choice = FilterChoice::default();
        typologies(&mut ctx, &choice, Some(Path::new("typologies.csv"))).unwrap();
        stations(&mut ctx, &choice, Some(Path::new("stations_out.csv"))).unwrap();

        let counts = read_output(&ctx, "typologies.csv");
        assert_eq!(
            counts,
            "Urban Form Typology,Station Count\nClassic,3\nDonut,1\nOther,1\n"
        );
        let table = read_output(&ctx, "stations_out.csv");
        assert_eq!(table.lines().count(), 6);
        assert!(!table.contains("Hub"));
    }

    #[test]
    fn map_layer_lists_located_stations() {
        let mut ctx = context("map");
        map(&mut ctx, &FilterChoice::default(), Some(Path::new("map.geojson"))).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&read_output(&ctx, "map.geojson")).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn thresholds_report_their_population() {
        let mut ctx = context("thresholds");
        thresholds(&mut ctx, Some(Path::new("thresholds.json")), true).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&read_output(&ctx, "thresholds.json")).unwrap();
        assert!(
            json["population"]["source"]
                .as_str()
                .unwrap()
                .ends_with("stations.csv")
        );
        assert_eq!(json["population"]["contentHash"].as_str().unwrap().len(), 64);
        assert_eq!(json["sampleSizes"]["height"], 6);

        thresholds(&mut ctx, Some(Path::new("thresholds.txt")), false).unwrap();
        let text = read_output(&ctx, "thresholds.txt");
        assert!(text.contains("Outer ring (800 m)"));
        assert!(text.contains("Outer_TotalBuildings"));
    }

    #[test]
    fn categories_table_has_every_description() {
        let ctx = context("categories");
        categories(&ctx, Some(Path::new("categories.csv"))).unwrap();

        let text = read_output(&ctx, "categories.csv");
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 8);
        assert_eq!(
            &rows[7][2],
            tod_urban_form_models::OctantCategory::UrbanCore.description()
        );
    }

    #[test]
    fn describe_names_every_dimension() {
        let choice = FilterChoice {
            typologies: vec!["Classic".to_owned(), "Donut".to_owned()],
            ..FilterChoice::default()
        };
        assert_eq!(
            choice.describe(),
            "mode = All, line = All, typology = Classic, Donut"
        );
        assert!(FilterChoice::default().describe().ends_with("typology = default"));
    }

    #[test]
    fn default_output_names() {
        assert_eq!(default_output("summary"), PathBuf::from("summary.csv"));
    }
}
