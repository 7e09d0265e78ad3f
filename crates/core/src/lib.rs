//! Pure core of the daywise event cache: period arithmetic, query keys,
//! the day-bucketed cache with its planner and invalidation rules, and the
//! request queue. No I/O happens in this crate.

pub mod api;
pub mod cache;
pub mod event;
pub mod period;
pub mod query;
pub mod queue;
pub mod serde;
