//! Interactive menu for exploring a station dataset.
//!
//! Mirrors the subcommands with `dialoguer` prompts. The mode, line, and
//! typology filters persist across actions until changed, and the session
//! cache means repeated actions on an unchanged file skip recomputation.

use std::path::Path;

use dialoguer::{Confirm, Input, Select};
use tod_cli_utils::{select_choice, select_many};
use tod_urban_form::FilterOptions;
use tod_urban_form::views::QuadrantPair;
use tod_urban_form_models::GroupKey;

use crate::commands::{self, Context, FilterChoice, default_output};

/// Top-level actions available in the interactive menu.
enum Action {
    Thresholds,
    Categories,
    Summary,
    SummaryByMode,
    SummaryByLine,
    SummaryByTypology,
    Classify,
    Stations,
    Typologies,
    Quadrant,
    Map,
    SetMode,
    SetLine,
    SetTypologies,
    Reload,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Thresholds,
        Self::Categories,
        Self::Summary,
        Self::SummaryByMode,
        Self::SummaryByLine,
        Self::SummaryByTypology,
        Self::Classify,
        Self::Stations,
        Self::Typologies,
        Self::Quadrant,
        Self::Map,
        Self::SetMode,
        Self::SetLine,
        Self::SetTypologies,
        Self::Reload,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Thresholds => "Show thresholds",
            Self::Categories => "Describe categories",
            Self::Summary => "Category summary",
            Self::SummaryByMode => "Category summary by mode",
            Self::SummaryByLine => "Category summary by line",
            Self::SummaryByTypology => "Category summary by typology",
            Self::Classify => "Station categories",
            Self::Stations => "Station table",
            Self::Typologies => "Typology counts",
            Self::Quadrant => "Quadrant plot data",
            Self::Map => "Export map layer",
            Self::SetMode => "Set mode filter",
            Self::SetLine => "Set line filter",
            Self::SetTypologies => "Set typology filter",
            Self::Reload => "Reload dataset",
            Self::Quit => "Quit",
        }
    }
}

/// Runs the interactive menu loop until the user quits.
///
/// # Errors
///
/// Returns an error if the dataset cannot be analysed or the terminal
/// cannot be read.
pub fn run(ctx: &mut Context) -> Result<(), Box<dyn std::error::Error>> {
    let session = ctx.session()?;
    println!("Transit Urban Form Analysis");
    println!("{} stations in {}", session.dataset().len(), session.identity());
    println!();

    let mut filter = FilterChoice::default();
    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    loop {
        println!("Filters: {}", filter.describe());
        let idx = Select::new()
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(0)
            .interact()?;

        match Action::ALL[idx] {
            Action::Thresholds => commands::thresholds(ctx, None, false)?,
            Action::Categories => commands::categories(ctx, None)?,
            Action::Summary => summary(ctx, &filter, &[])?,
            Action::SummaryByMode => summary(ctx, &filter, &[GroupKey::Mode])?,
            Action::SummaryByLine => summary(ctx, &filter, &[GroupKey::Line])?,
            Action::SummaryByTypology => summary(ctx, &filter, &[GroupKey::Typology])?,
            Action::Classify => {
                commands::classify(ctx, &filter, None)?;
                if confirm_save()? {
                    let output = default_output("station_categories");
                    commands::classify(ctx, &filter, Some(output.as_path()))?;
                }
            }
            Action::Stations => {
                commands::stations(ctx, &filter, None)?;
                if confirm_save()? {
                    let output = default_output("stations_filtered");
                    commands::stations(ctx, &filter, Some(output.as_path()))?;
                }
            }
            Action::Typologies => commands::typologies(ctx, &filter, None)?,
            Action::Quadrant => {
                let pairs: Vec<String> = QuadrantPair::all().iter().map(|p| p.title()).collect();
                let idx = Select::new()
                    .with_prompt("Which pair?")
                    .items(&pairs)
                    .default(0)
                    .interact()?;
                commands::quadrant(ctx, &filter, Some(QuadrantPair::all()[idx]), false)?;
            }
            Action::Map => {
                let path: String = Input::new()
                    .with_prompt("Output file")
                    .default("stations.geojson".to_string())
                    .interact_text()?;
                commands::map(ctx, &filter, Some(Path::new(&path)))?;
            }
            Action::SetMode => {
                let options = FilterOptions::from_records(&ctx.session()?.dataset().records);
                filter.mode = select_choice("Mode", &options.mode_choices(), &filter.mode)?;
            }
            Action::SetLine => {
                let options = FilterOptions::from_records(&ctx.session()?.dataset().records);
                filter.line = select_choice("Line", &options.line_choices(), &filter.line)?;
            }
            Action::SetTypologies => {
                let options = FilterOptions::from_records(&ctx.session()?.dataset().records);
                filter.typologies = select_many(
                    "Typologies (space to toggle, none for the default)",
                    &options.typology_choices(),
                    &filter.typologies,
                )?;
            }
            Action::Reload => {
                ctx.reset();
                let session = ctx.session()?;
                println!(
                    "Reloaded {} stations from {}",
                    session.dataset().len(),
                    session.identity()
                );
            }
            Action::Quit => break,
        }
        println!();
    }

    Ok(())
}

/// Prints a summary and optionally saves it as CSV.
fn summary(
    ctx: &mut Context,
    filter: &FilterChoice,
    group_by: &[GroupKey],
) -> Result<(), Box<dyn std::error::Error>> {
    commands::summary(ctx, filter, group_by, None, false)?;

    if confirm_save()? {
        let name = group_by
            .first()
            .map_or_else(|| "summary".to_string(), |k| format!("summary_by_{k}"));
        let output = default_output(&name);
        commands::summary(ctx, filter, group_by, Some(output.as_path()), false)?;
    }
    Ok(())
}

fn confirm_save() -> Result<bool, dialoguer::Error> {
    Confirm::new()
        .with_prompt("Save as CSV?")
        .default(false)
        .interact()
}
