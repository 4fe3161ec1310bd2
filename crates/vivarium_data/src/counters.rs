use serde::{Deserialize, Serialize};

/// World-level counters exposed through `World::counters()`.
///
/// `food_count` and `item_count` are maintained incrementally by tile
/// mutation and always equal a full-grid recount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub tick: u64,
    pub food_count: u32,
    pub item_count: u32,
    pub food_spawned: u64,
    pub trade_count: u64,
    pub teach_count: u64,
}
