//! The agent record: identity, position, vitals, genome, and effect slots.

use crate::modifier::ModifierSet;
use crate::tile::ItemKind;
use serde::{Deserialize, Serialize};

pub const MAX_HEALTH: i16 = 100;
pub const MAX_ENERGY: i16 = 200;
pub const MAX_STRESS: i16 = 100;
pub const MAX_AGE: u32 = 5000;

pub const GENOME_MIN: usize = 16;
pub const GENOME_MAX: usize = 128;

/// Everything the world tracks per agent. The world exclusively owns these;
/// consumers refer to agents by id, never by reference across ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: u16,
    pub x: u16,
    pub y: u16,
    pub health: i16,
    pub energy: i16,
    pub age: u32,
    pub hunger: u32,
    pub genome: Vec<u8>,
    pub food_eaten: u32,
    pub craft_count: u32,
    pub teach_count: u32,
    pub taught: u32,
    pub gold: i32,
    pub item: ItemKind,
    pub prng_state: [u8; 3],
    pub mods: ModifierSet,
    pub stress: i16,
    pub fitness: i64,
    /// Lifetime fitness credit from actions (crafting, teaching), kept on
    /// top of the end-of-tick fitness recomputation.
    pub fitness_bonus: i64,
    pub last_emotion: i16,
}

impl Agent {
    #[must_use]
    pub fn spawn(id: u16, x: u16, y: u16, genome: Vec<u8>, tick: u64) -> Self {
        Self {
            id,
            x,
            y,
            health: MAX_HEALTH,
            energy: 100,
            age: 0,
            hunger: 0,
            genome,
            food_eaten: 0,
            craft_count: 0,
            teach_count: 0,
            taught: 0,
            gold: 0,
            item: ItemKind::None,
            prng_state: seed_tribonacci(id, tick),
            mods: ModifierSet::default(),
            stress: 0,
            fitness: 0,
            fitness_bonus: 0,
            last_emotion: 0,
        }
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn damage(&mut self, amount: i16) {
        self.health = (self.health - amount).clamp(0, MAX_HEALTH);
    }

    pub fn heal(&mut self, amount: i16) {
        self.health = (self.health + amount).clamp(0, MAX_HEALTH);
    }

    pub fn add_energy(&mut self, amount: i16) {
        self.energy = (self.energy + amount).clamp(0, MAX_ENERGY);
    }

    /// Positive amounts raise stress, negative relieve it. Always clamped.
    pub fn add_stress(&mut self, amount: i16) {
        self.stress = (self.stress + amount).clamp(0, MAX_STRESS);
    }

    pub fn add_gold(&mut self, amount: i32) {
        self.gold = (self.gold + amount).max(0);
    }

    /// Credit fitness earned by an action. Visible immediately and carried
    /// through every later fitness recomputation.
    pub fn award_fitness(&mut self, amount: i64) {
        self.fitness += amount;
        self.fitness_bonus += amount;
    }

    /// One step of the 3-byte tribonacci generator, 5-bit output.
    pub fn prng_next(&mut self) -> u8 {
        let [a, b, c] = self.prng_state;
        let t = a.wrapping_add(b).wrapping_add(c);
        self.prng_state = [b, c, t];
        t >> 3
    }

    pub fn reseed_prng(&mut self, id: u16, tick: u64) {
        self.prng_state = seed_tribonacci(id, tick);
    }

    #[must_use]
    pub fn genome_hex(&self) -> String {
        hex::encode(&self.genome)
    }

    pub fn genome_from_hex(hex_str: &str) -> anyhow::Result<Vec<u8>> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| anyhow::anyhow!("invalid genome hex: {}", e))?;
        if bytes.is_empty() {
            return Err(anyhow::anyhow!("empty genome hex"));
        }
        Ok(bytes)
    }
}

/// Tribonacci state seeded from `(id, spawn tick)`. The low bit of the third
/// byte is forced on so the state can never be all zero.
#[must_use]
pub fn seed_tribonacci(id: u16, tick: u64) -> [u8; 3] {
    [
        (id & 0xFF) as u8,
        ((id >> 8) as u8) ^ (tick as u8),
        ((tick >> 8) as u8) | 1,
    ]
}
