//! Day-bucketed event cache.
//!
//! Pure state transitions: actions go in through [`CacheState::apply`] or
//! [`next_state`], reads come out through [`plan_fetch`] and
//! [`iter_events`]. Nothing here performs I/O.

mod actions;
mod edit;
mod invalidate;
mod iter;
mod merge;
mod planner;
mod state;

pub use actions::{next_state, Action, Applied};
pub use edit::{label_push, EventChange, EventEdit};
pub use iter::{collect_events, iter_events};
pub use planner::{day_status, plan_fetch, DayStatus, FetchPlan, PlanOptions};
pub use state::{
    CacheState, DayBucket, EntityState, FetchState, GroupCache, MergePolicy, QueryResult,
    RecurringIndex, RequestId,
};
