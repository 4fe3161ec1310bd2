//! Configuration for world construction.
//!
//! Strongly-typed options that map onto an optional `config.toml`. The
//! hierarchy is: hardcoded defaults, overridden by the TOML file,
//! overridden by whatever the driver sets explicitly.
//!
//! ## Example `config.toml`
//!
//! ```toml
//! n_agents = 40
//! seed = 7
//! gas_budget = 200
//! evolve_every = 100
//!
//! forager_fraction = 0.25
//! trader_fraction = 0.15
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Recognized constructor options (spec keys, 1:1).
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct WorldOptions {
    /// Initial population size. Must be at least 1.
    pub n_agents: usize,
    /// Grid side; 0 auto-sizes from the population.
    pub world_size: usize,
    /// World PRNG seed.
    pub seed: u64,
    /// Per-brain base gas per tick.
    pub gas_budget: u32,
    /// GA cadence in ticks; 0 disables evolution.
    pub evolve_every: u64,
    pub forager_fraction: f64,
    pub trader_fraction: f64,
    pub crafter_fraction: f64,
    pub teacher_fraction: f64,
    /// Overrides for the population-scaled resource caps.
    pub max_food: Option<u32>,
    pub food_rate: Option<f64>,
    pub max_items: Option<u32>,
    pub item_rate: Option<f64>,
}

impl Default for WorldOptions {
    fn default() -> Self {
        Self {
            n_agents: 32,
            world_size: 0,
            seed: 0,
            gas_budget: 200,
            evolve_every: 100,
            forager_fraction: 0.25,
            trader_fraction: 0.15,
            crafter_fraction: 0.15,
            teacher_fraction: 0.15,
            max_food: None,
            food_rate: None,
            max_items: None,
            item_rate: None,
        }
    }
}

impl WorldOptions {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_agents == 0 {
            return Err(ConfigError::InvalidArgument("n_agents must be at least 1".into()));
        }
        let fractions = [
            ("forager_fraction", self.forager_fraction),
            ("trader_fraction", self.trader_fraction),
            ("crafter_fraction", self.crafter_fraction),
            ("teacher_fraction", self.teacher_fraction),
        ];
        for (name, f) in fractions {
            if !(0.0..=1.0).contains(&f) {
                return Err(ConfigError::InvalidArgument(format!("{name} must be in [0, 1]")));
            }
        }
        let sum: f64 = fractions.iter().map(|(_, f)| f).sum();
        if sum > 1.0 {
            return Err(ConfigError::InvalidArgument(
                "seed genome fractions must sum to at most 1".into(),
            ));
        }
        if let Some(rate) = self.food_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::InvalidArgument("food_rate must be in [0, 1]".into()));
            }
        }
        if let Some(rate) = self.item_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::InvalidArgument("item_rate must be in [0, 1]".into()));
            }
        }
        Ok(())
    }

    /// Resource caps scale with population unless pinned.
    #[must_use]
    pub fn resolved_max_food(&self) -> u32 {
        self.max_food.unwrap_or(3 * self.n_agents as u32)
    }

    #[must_use]
    pub fn resolved_food_rate(&self) -> f64 {
        self.food_rate.unwrap_or(0.3)
    }

    #[must_use]
    pub fn resolved_max_items(&self) -> u32 {
        self.max_items.unwrap_or(((self.n_agents / 2) as u32).max(4))
    }

    #[must_use]
    pub fn resolved_item_rate(&self) -> f64 {
        self.item_rate.unwrap_or(0.05)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        WorldOptions::default().validate().unwrap();
    }

    #[test]
    fn zero_agents_rejected() {
        let opts = WorldOptions { n_agents: 0, ..Default::default() };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn fraction_sum_rejected() {
        let opts = WorldOptions {
            forager_fraction: 0.6,
            trader_fraction: 0.6,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn caps_scale_with_population() {
        let opts = WorldOptions { n_agents: 10, ..Default::default() };
        assert_eq!(opts.resolved_max_food(), 30);
        assert_eq!(opts.resolved_max_items(), 5);
        let small = WorldOptions { n_agents: 2, ..Default::default() };
        assert_eq!(small.resolved_max_items(), 4);
    }

    #[test]
    fn toml_overrides_defaults() {
        let opts = WorldOptions::from_toml_str("n_agents = 5\nseed = 99\nmax_food = 7").unwrap();
        assert_eq!(opts.n_agents, 5);
        assert_eq!(opts.seed, 99);
        assert_eq!(opts.resolved_max_food(), 7);
        assert_eq!(opts.gas_budget, 200);
    }
}
