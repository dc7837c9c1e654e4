#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for transit station urban form analysis.
//!
//! Every subcommand loads the configured station CSV and computes medians
//! over the full dataset. Category counts cover every classified station
//! unless narrowed by flags; display views default to the configured
//! typology set. With no subcommand an interactive menu is shown instead.

mod commands;
mod config;
mod interactive;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tod_urban_form::views::QuadrantPair;
use tod_urban_form_models::GroupKey;

use crate::commands::{Context, FilterChoice};
use crate::config::Config;

#[derive(Parser)]
#[command(name = "tod", about = "Transit station urban form analysis")]
struct Cli {
    /// Config file (overrides `TOD_CONFIG`; default `tod.toml`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Station CSV (overrides the config file and `TOD_DATASET`)
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct FilterArgs {
    /// Transit mode to show, or "All"
    #[arg(long, default_value = "All")]
    mode: String,
    /// Line to show, or "All"
    #[arg(long, default_value = "All")]
    line: String,
    /// Comma-separated typology labels to show, or "All". Display views
    /// default to the configured set; category counts default to all.
    #[arg(long = "typology", value_delimiter = ',')]
    typologies: Vec<String>,
}

impl From<FilterArgs> for FilterChoice {
    fn from(args: FilterArgs) -> Self {
        Self {
            mode: args.mode,
            line: args.line,
            typologies: args.typologies,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the per-metric medians over the full dataset
    Thresholds {
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print JSON, including the dataset identity, instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Describe the eight urban form categories
    Categories {
        /// Write CSV to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List each station with its urban form category
    Classify {
        #[command(flatten)]
        filter: FilterArgs,
        /// Write CSV to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Count stations per urban form category
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
        /// Group rows by these keys (mode, line, typology)
        #[arg(long = "group-by", value_delimiter = ',', value_parser = parse_group_key)]
        group_by: Vec<GroupKey>,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write JSON instead of CSV
        #[arg(long)]
        json: bool,
    },
    /// Count stations per pre-existing typology label
    Typologies {
        #[command(flatten)]
        filter: FilterArgs,
        /// Write CSV to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write the station table with all zone metrics
    Stations {
        #[command(flatten)]
        filter: FilterArgs,
        /// Write CSV to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print quadrant plot data (buildings-vs-height, buildings-vs-footprint,
    /// footprint-vs-height). All pairs when none is given.
    Quadrant {
        #[arg(value_parser = parse_quadrant_pair)]
        pair: Option<QuadrantPair>,
        #[command(flatten)]
        filter: FilterArgs,
        /// Print JSON instead of CSV
        #[arg(long)]
        json: bool,
    },
    /// Write stations with coordinates as a `GeoJSON` layer
    Map {
        #[command(flatten)]
        filter: FilterArgs,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn parse_group_key(value: &str) -> Result<GroupKey, String> {
    value
        .parse()
        .map_err(|_| format!("unknown group key '{value}' (expected mode, line, or typology)"))
}

fn parse_quadrant_pair(value: &str) -> Result<QuadrantPair, String> {
    value.parse().map_err(|_| {
        let pairs: Vec<String> = QuadrantPair::all().iter().map(ToString::to_string).collect();
        format!("unknown quadrant pair '{value}' (expected {})", pairs.join(", "))
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tod_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dataset) = cli.dataset {
        config.dataset = dataset;
    }
    let mut ctx = Context::new(config);

    let Some(command) = cli.command else {
        return interactive::run(&mut ctx);
    };

    match command {
        Commands::Thresholds { output, json } => {
            commands::thresholds(&mut ctx, output.as_deref(), json)?;
        }
        Commands::Categories { output } => commands::categories(&ctx, output.as_deref())?,
        Commands::Classify { filter, output } => {
            commands::classify(&mut ctx, &filter.into(), output.as_deref())?;
        }
        Commands::Summary {
            filter,
            group_by,
            output,
            json,
        } => commands::summary(&mut ctx, &filter.into(), &group_by, output.as_deref(), json)?,
        Commands::Typologies { filter, output } => {
            commands::typologies(&mut ctx, &filter.into(), output.as_deref())?;
        }
        Commands::Stations { filter, output } => {
            commands::stations(&mut ctx, &filter.into(), output.as_deref())?;
        }
        Commands::Quadrant { pair, filter, json } => {
            commands::quadrant(&mut ctx, &filter.into(), pair, json)?;
        }
        Commands::Map { filter, output } => {
            commands::map(&mut ctx, &filter.into(), output.as_deref())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_summary_flags() {
        let cli = Cli::try_parse_from([
            "tod",
            "--dataset",
            "s.csv",
            "summary",
            "--group-by",
            "mode,line",
            "--mode",
            "LR",
            "--typology",
            "Classic,Donut",
        ])
        .unwrap();
        assert_eq!(cli.dataset, Some(PathBuf::from("s.csv")));
        let Some(Commands::Summary {
            filter, group_by, ..
        }) = cli.command
        else {
            panic!("expected summary");
        };
        assert_eq!(group_by, vec![GroupKey::Mode, GroupKey::Line]);
        assert_eq!(filter.mode, "LR");
        assert_eq!(filter.line, "All");
        assert_eq!(filter.typologies, vec!["Classic", "Donut"]);
    }

    #[test]
    fn parses_quadrant_pair() {
        let cli = Cli::try_parse_from(["tod", "quadrant", "footprint-vs-height"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Quadrant {
                pair: Some(QuadrantPair::FootprintVsHeight),
                ..
            })
        ));
    }

    #[test]
    fn rejects_unknown_group_key() {
        assert!(Cli::try_parse_from(["tod", "summary", "--group-by", "station"]).is_err());
    }

    #[test]
    fn parses_categories_and_thresholds_output() {
        let cli = Cli::try_parse_from(["tod", "categories", "--output", "c.csv"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Categories { output: Some(ref p) }) if p == &PathBuf::from("c.csv")
        ));

        let cli = Cli::try_parse_from(["tod", "thresholds", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Thresholds {
                output: None,
                json: true
            })
        ));
    }

    #[test]
    fn no_subcommand_is_interactive() {
        let cli = Cli::try_parse_from(["tod"]).unwrap();
        assert!(cli.command.is_none());
    }
}
