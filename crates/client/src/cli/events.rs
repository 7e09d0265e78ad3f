//! Events CLI commands.

use clap::{Args, Parser, Subcommand};

use super::{FilterArgs, PeriodArgs};

/// Events commands.
#[derive(Debug, Parser)]
pub struct EventsCommand {
    #[command(subcommand)]
    pub action: EventsAction,
}

/// Available events actions.
#[derive(Debug, Subcommand)]
pub enum EventsAction {
    /// Load the events of a calendar group for a period.
    List {
        /// Calendar group ID.
        group: String,
        #[command(flatten)]
        period: PeriodArgs,
        #[command(flatten)]
        filter: FilterArgs,
        /// Queue priority; higher runs first.
        #[arg(long, default_value = "0")]
        priority: i32,
    },
    /// Get a single event.
    Get {
        /// Calendar group ID.
        group: String,
        /// Event ID.
        id: String,
    },
    /// Change the labels of one or more events.
    Label {
        /// Calendar group ID.
        group: String,
        /// Event IDs.
        #[arg(required = true)]
        ids: Vec<String>,
        #[command(flatten)]
        change: LabelChangeArgs,
    },
}

/// Exactly one label change.
#[derive(Debug, Clone, Args)]
#[group(required = true, multiple = false)]
pub struct LabelChangeArgs {
    /// Labels to add.
    #[arg(long, num_args = 1..)]
    pub add: Vec<String>,
    /// Labels to remove.
    #[arg(long, num_args = 1..)]
    pub remove: Vec<String>,
    /// Hide the events.
    #[arg(long)]
    pub hide: bool,
}
