//! Pretty output formatting.

use daywise_core::event::EventEntity;
use daywise_core::query::{QueryFilter, QueryKey};

/// Format an event for display.
pub fn format_event(event: &EventEntity) -> String {
    let title = if event.title.is_empty() {
        "(untitled)"
    } else {
        event.title.as_str()
    };
    let mut output = format!(
        "{}\n  ID: {}\n  When: {} -> {}",
        title, event.id, event.start, event.end
    );
    if !event.labels.is_empty() {
        let labels: Vec<&str> = event.labels.iter().map(String::as_str).collect();
        let state = if event.labels_confirmed {
            "confirmed"
        } else if event.labels_predicted {
            "predicted"
        } else {
            "unconfirmed"
        };
        output.push_str(&format!("\n  Labels: {} ({})", labels.join(", "), state));
    }
    if let Some(recurring) = &event.recurring_event_id {
        output.push_str(&format!("\n  Recurring: {}", recurring));
    }
    if !event.participants.is_empty() {
        let participants = event.participants.join(", ");
        output.push_str(&format!("\n  Participants: {}", participants));
    }
    if let Some(cost) = event.cost {
        output.push_str(&format!("\n  Cost: {:.2}", cost));
    }
    if event.hidden {
        output.push_str("\n  Hidden");
    }
    output
}

/// Format events for display.
pub fn format_events(events: &[EventEntity]) -> String {
    if events.is_empty() {
        return "No events found.".to_string();
    }
    let mut output = format!("EVENTS ({})\n", events.len());
    output.push_str(&"-".repeat(40));
    for event in events {
        output.push_str(&format!("\n{}", format_event(event)));
        output.push('\n');
    }
    output
}

/// Format a filter and its cache key.
pub fn format_query(filter: &QueryFilter, key: &QueryKey) -> String {
    let mut output = format!("Key: {}", key);
    if filter.labels.is_none()
        && filter.contains.is_none()
        && filter.participant.is_none()
        && filter.min_cost.is_none()
    {
        output.push_str("\n  (no filter)");
    }
    output
}
