mod ids;
mod types;

pub use ids::{CalendarGroupId, EventId, RecurringId};
pub use types::{
    normalize_label_key, EventEntity, LabelKey, LabelPush, LabelUpdate, TimebombState,
};
