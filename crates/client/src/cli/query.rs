//! Query inspection commands.

use clap::{Parser, Subcommand};

use super::{FilterArgs, PeriodArgs};

/// Query inspection commands.
#[derive(Debug, Parser)]
pub struct QueryCommand {
    #[command(subcommand)]
    pub action: QueryAction,
}

/// Available query actions.
#[derive(Debug, Subcommand)]
pub enum QueryAction {
    /// Print the cache key of a filter.
    Key {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print the request body sent for a period and filter.
    Wire {
        #[command(flatten)]
        period: PeriodArgs,
        #[command(flatten)]
        filter: FilterArgs,
    },
}
