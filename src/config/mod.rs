use std::{collections::HashSet, path::PathBuf};

use chrono::{Local, NaiveDate};
use clap::Parser;
use itertools::Itertools;
use rust_decimal::Decimal;

use crate::{
    domain::flow::{DateWindow, FlowOptions},
    error::Result,
    render::{ImageOptions, RenderOptions},
};

/// Draw a Sankey diagram of income and expenses from a transaction export.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// CSV export with Date, Category and Amount columns
    #[arg(env = "CASHFLOW_INPUT")]
    pub input: PathBuf,

    /// Length of the trailing window in days
    #[arg(long, default_value_t = 365, env = "CASHFLOW_DAYS")]
    pub days: u64,

    /// Use every transaction regardless of its date, ignoring any window
    #[arg(long)]
    pub all: bool,

    /// Last day of the window (defaults to today)
    #[arg(long, env = "CASHFLOW_END")]
    pub end: Option<NaiveDate>,

    /// First day of the window, overrides --days
    #[arg(long, env = "CASHFLOW_START")]
    pub start: Option<NaiveDate>,

    /// Balance carried into the period, added to total income
    #[arg(long, env = "CASHFLOW_STARTING_BALANCE", allow_hyphen_values = true)]
    pub starting_balance: Option<Decimal>,

    /// Top-level category reported as a separate total instead of a flow
    #[arg(
        long = "exclude",
        default_values_t = [String::from("Debt")],
        env = "CASHFLOW_EXCLUDE",
        value_delimiter = ','
    )]
    pub excluded: Vec<String>,

    /// Where to write the interactive diagram
    #[arg(long, default_value = "sankey.html", env = "CASHFLOW_HTML")]
    pub html: PathBuf,

    /// Also render the diagram to this image file
    #[arg(long, env = "CASHFLOW_IMAGE")]
    pub image: Option<PathBuf>,

    #[arg(long, default_value_t = 1920, env = "CASHFLOW_WIDTH")]
    pub width: u32,

    #[arg(long, default_value_t = 1080, env = "CASHFLOW_HEIGHT")]
    pub height: u32,

    /// orca compatible program used for image export
    #[arg(long, default_value = "orca", env = "CASHFLOW_RENDERER")]
    pub renderer: String,

    #[arg(long, default_value = "Cash Flow", env = "CASHFLOW_TITLE")]
    pub title: String,

    /// Label nodes with names only
    #[arg(long)]
    pub no_dollar_labels: bool,

    /// Do not open the diagram in a browser
    #[arg(long)]
    pub no_open: bool,
}

/// Everything a run needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub input: PathBuf,
    pub flow: FlowOptions,
    pub render: RenderOptions,
    pub html: PathBuf,
    pub image: Option<ImageOptions>,
    pub open: bool,
}

impl Settings {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        Self::resolve(cli, Local::now().date_naive())
    }

    fn resolve(cli: Cli, today: NaiveDate) -> Result<Self> {
        let window = if cli.all {
            None
        } else {
            let end = cli.end.unwrap_or(today);
            Some(match cli.start {
                Some(start) => DateWindow::new(start, end)?,
                None => DateWindow::trailing(end, cli.days),
            })
        };

        let excluded: HashSet<String> = cli
            .excluded
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect();

        let mut title = cli.title;
        if let Some(window) = window {
            title.push_str(&format!(" ({} to {})", window.start(), window.end()));
        }

        Ok(Settings {
            render: RenderOptions {
                title,
                dollar_labels: !cli.no_dollar_labels,
                excluded_label: excluded.iter().sorted().join(" + "),
            },
            flow: FlowOptions {
                window,
                excluded,
                starting_balance: cli.starting_balance,
            },
            image: cli.image.map(|path| ImageOptions {
                path,
                width: cli.width,
                height: cli.height,
                renderer: cli.renderer,
            }),
            input: cli.input,
            html: cli.html,
            open: !cli.no_open,
        })
    }
}
