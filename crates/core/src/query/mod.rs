mod normalize;
mod types;
mod wire;

pub use normalize::{query_key, reduce, stringify};
pub use types::{LabelSelection, QueryFilter, QueryKey};
pub use wire::{to_api, Clause, WireRequest};
