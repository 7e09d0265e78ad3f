//! daywise-client CLI entry point.

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use daywise::{EventStore, StoreConfig};
use daywise_client::cli::events::{EventsAction, LabelChangeArgs};
use daywise_client::cli::query::QueryAction;
use daywise_client::cli::{Cli, Commands, OutputFormat};
use daywise_client::output::{format_output, pretty};
use daywise_client::HttpEventsClient;
use daywise_core::cache::{EventChange, EventEdit};
use daywise_core::event::{CalendarGroupId, EventEntity, EventId};
use daywise_core::query::{query_key, WireRequest};
use daywise_core::queue::FetchRequest;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daywise=debug,daywise_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let store = EventStore::new(
        HttpEventsClient::new(&cli.base_url),
        StoreConfig::from_env(),
    );

    match cli.command {
        Commands::Events(events_cmd) => match events_cmd.action {
            EventsAction::List {
                group,
                period,
                filter,
                priority,
            } => {
                let period = period.to_period().context("invalid period")?;
                let request = FetchRequest::new(group, period, filter.to_filter())
                    .with_priority(priority);
                let events = store.load(request).await?;
                print_events(&events, cli.format)?;
            }
            EventsAction::Get { group, id } => {
                let group = CalendarGroupId::from(group);
                let id = EventId::from(id);
                store.request_event(&group, &id).await.wait().await?;
                let event = store
                    .event(&group, &id)
                    .await
                    .with_context(|| format!("event {id} is not loaded"))?;
                match cli.format {
                    OutputFormat::Json => println!("{}", format_output(&event, cli.format)?),
                    OutputFormat::Pretty => println!("{}", pretty::format_event(&event)),
                }
            }
            EventsAction::Label { group, ids, change } => {
                let group = CalendarGroupId::from(group);
                let ids: Vec<EventId> = ids.into_iter().map(EventId::from).collect();
                for id in &ids {
                    store.request_event(&group, id).await.wait().await?;
                }
                let edit = EventEdit::events(ids.iter().cloned(), label_change(change));
                store.push_labels(&group, edit).await.wait().await?;

                let mut events = Vec::with_capacity(ids.len());
                for id in &ids {
                    events.extend(store.event(&group, id).await);
                }
                if !cli.quiet {
                    print_events(&events, cli.format)?;
                }
            }
        },
        Commands::Query(query_cmd) => match query_cmd.action {
            QueryAction::Key { filter } => {
                let filter = filter.to_filter();
                let key = query_key(&filter);
                match cli.format {
                    OutputFormat::Json => println!("{}", format_output(&key, cli.format)?),
                    OutputFormat::Pretty => println!("{}", pretty::format_query(&filter, &key)),
                }
            }
            QueryAction::Wire { period, filter } => {
                let period = period.to_period().context("invalid period")?;
                let request = WireRequest::for_period(&period, &filter.to_filter())?;
                println!("{}", format_output(&request, cli.format)?);
            }
        },
    }

    Ok(())
}

fn label_change(change: LabelChangeArgs) -> EventChange {
    if change.hide {
        EventChange::Hide
    } else if !change.add.is_empty() {
        EventChange::add_labels(change.add)
    } else {
        EventChange::remove_labels(change.remove)
    }
}

fn print_events(events: &[EventEntity], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", format_output(&events, format)?),
        OutputFormat::Pretty => println!("{}", pretty::format_events(events)),
    }
    Ok(())
}
