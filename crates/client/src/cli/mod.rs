//! CLI command definitions.

pub mod events;
pub mod query;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use daywise_core::period::{index, Interval, Period, PeriodError};
use daywise_core::query::{LabelSelection, QueryFilter};

/// CLI client for a calendar events API, backed by the daywise cache.
#[derive(Debug, Parser)]
#[command(name = "daywise-client")]
#[command(
    about = "CLI client for calendar events backed by the daywise cache",
    long_about = None
)]
pub struct Cli {
    /// Server base URL.
    #[arg(long, env = "DAYWISE_URL", default_value = "http://localhost:3000")]
    pub base_url: String,

    /// Output format.
    #[arg(long, default_value = "pretty")]
    pub format: OutputFormat,

    /// Suppress non-essential output.
    #[arg(long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Raw JSON output.
    Json,
    /// Human-readable output.
    #[default]
    Pretty,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load, inspect and label events.
    Events(events::EventsCommand),
    /// Inspect how filters are keyed and sent.
    Query(query::QueryCommand),
}

/// A calendar period given as dates.
#[derive(Debug, Clone, Args)]
pub struct PeriodArgs {
    /// Period granularity (day, week, month, quarter).
    #[arg(long, default_value = "day")]
    pub interval: Interval,
    /// First date (YYYY-MM-DD).
    #[arg(long)]
    pub start: NaiveDate,
    /// Last date (YYYY-MM-DD). Defaults to the start date.
    #[arg(long)]
    pub end: Option<NaiveDate>,
    /// Load at most this many days from the start.
    #[arg(long)]
    pub max_days: Option<usize>,
}

impl PeriodArgs {
    /// Converts the dates into interval indices.
    pub fn to_period(&self) -> Result<Period, PeriodError> {
        let end = self.end.unwrap_or(self.start);
        let period = Period::new(
            self.interval,
            index(self.start, self.interval),
            index(end, self.interval),
        )?;
        Ok(match self.max_days {
            Some(max_days) => period.with_day_limit(max_days),
            None => period,
        })
    }
}

/// Event filter options.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Only events carrying this label (repeatable).
    #[arg(long = "label")]
    pub labels: Vec<String>,
    /// Include unlabeled events.
    #[arg(long)]
    pub unlabeled: bool,
    /// Only events whose title contains this text.
    #[arg(long)]
    pub contains: Option<String>,
    /// Only events with this participant (repeatable).
    #[arg(long = "participant")]
    pub participants: Vec<String>,
    /// Only events costing at least this much.
    #[arg(long)]
    pub min_cost: Option<f64>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> QueryFilter {
        let mut filter = QueryFilter::new();
        let labels = match (self.labels.is_empty(), self.unlabeled) {
            (true, false) => None,
            (true, true) => Some(LabelSelection::unlabeled()),
            (false, unlabeled) => {
                let selection = LabelSelection::some(self.labels.iter().cloned());
                Some(if unlabeled {
                    selection.with_unlabeled()
                } else {
                    selection
                })
            }
        };
        if let Some(labels) = labels {
            filter = filter.with_labels(labels);
        }
        if let Some(text) = &self.contains {
            filter = filter.with_contains(text.clone());
        }
        if !self.participants.is_empty() {
            filter = filter.with_participants(self.participants.iter().cloned());
        }
        if let Some(cost) = self.min_cost {
            filter = filter.with_min_cost(cost);
        }
        filter
    }
}
