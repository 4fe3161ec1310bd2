//! Aggregate population statistics for drivers and tests.

use serde::{Deserialize, Serialize};
use vivarium_data::{Agent, ItemKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationStats {
    pub population: usize,
    pub avg_energy: f64,
    pub avg_health: f64,
    pub avg_stress: f64,
    pub avg_fitness: f64,
    pub best_fitness: i64,
    pub avg_age: f64,
    pub total_gold: i64,
    pub item_holders: usize,
    pub total_food_eaten: u64,
    pub total_crafts: u64,
}

impl PopulationStats {
    #[must_use]
    pub fn collect(agents: &[Agent]) -> Self {
        if agents.is_empty() {
            return Self::default();
        }
        let n = agents.len() as f64;
        Self {
            population: agents.len(),
            avg_energy: agents.iter().map(|a| a.energy as f64).sum::<f64>() / n,
            avg_health: agents.iter().map(|a| a.health as f64).sum::<f64>() / n,
            avg_stress: agents.iter().map(|a| a.stress as f64).sum::<f64>() / n,
            avg_fitness: agents.iter().map(|a| a.fitness as f64).sum::<f64>() / n,
            best_fitness: agents.iter().map(|a| a.fitness).max().unwrap_or(0),
            avg_age: agents.iter().map(|a| a.age as f64).sum::<f64>() / n,
            total_gold: agents.iter().map(|a| a.gold as i64).sum(),
            item_holders: agents.iter().filter(|a| a.item != ItemKind::None).count(),
            total_food_eaten: agents.iter().map(|a| a.food_eaten as u64).sum(),
            total_crafts: agents.iter().map(|a| a.craft_count as u64).sum(),
        }
    }
}
