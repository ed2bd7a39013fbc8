use std::{io, io::Write, process};

use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use crate::{
    config::{Cli, Settings},
    domain::flow::{Flow, FlowSummary},
    error::{Error, Result},
    render::{format_dollars, Figure},
};

mod config;
mod csv;
mod domain;
mod error;
mod render;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Cli::parse()) {
        report(&err, io::stderr());
        process::exit(1);
    }
}

/// Fatal errors go straight to stderr so they show up whatever the log level.
fn report(err: &Error, mut out: impl Write) {
    let _ = writeln!(out, "error: {err}");
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_cli(cli)?;
    let txns = crate::csv::read_path(&settings.input)?;

    let flow = Flow::from_transactions(&txns, &settings.flow)?;
    info!(
        "{} transactions in {} categories",
        flow.summary.transactions_used,
        flow.categories.len()
    );
    if flow.summary.transactions_skipped > 0 {
        info!(
            "{} transactions had no readable date or fell outside the window",
            flow.summary.transactions_skipped
        );
    }

    let figure = Figure::from_flow(&flow, &settings.render);
    render::write_html(&figure, &settings.html)?;

    if let Some(image) = &settings.image {
        if let Err(err) = render::export_image(&figure, image) {
            warn!("{err}");
        }
    }

    if settings.open {
        if let Err(err) = render::open_in_browser(&settings.html) {
            warn!("{err}");
        }
    }

    print_summary(&flow.summary, &settings);
    Ok(())
}

fn print_summary(summary: &FlowSummary, settings: &Settings) {
    let excluded_label = (!settings.flow.excluded.is_empty())
        .then_some(settings.render.excluded_label.as_str());

    for line in summary_lines(summary, excluded_label) {
        println!("{line}");
    }
}

fn summary_lines(summary: &FlowSummary, excluded_label: Option<&str>) -> Vec<String> {
    let mut rows = vec![
        ("Total income".to_owned(), summary.total_income),
        ("Total expenses".to_owned(), summary.total_expenses),
    ];
    if let Some(label) = excluded_label {
        rows.push((format!("Total {label}"), summary.total_excluded));
    }
    if let Some(grand_total) = summary.grand_total {
        rows.push(("Grand total".to_owned(), grand_total));
    }

    let width = rows.iter().map(|(label, _)| label.len() + 1).max().unwrap_or(0);
    rows.into_iter()
        .map(|(label, amount)| {
            format!("{:<width$} {:>16}", format!("{label}:"), format_dollars(amount))
        })
        .collect()
}
