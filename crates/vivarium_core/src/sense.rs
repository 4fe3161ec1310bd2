//! Ring0 sensor materialization: the world's view written into the VM's
//! read bank before each brain runs.

use crate::world::{World, DAY_CYCLE};
use vivarium_data::{ModKind, Tile};

/// Hard ceiling on the effective per-brain gas budget.
pub const GAS_CAP: u32 = 500;

/// Ring0 slot assignments. Slots not listed here read as zero.
pub mod slot {
    pub const SELF_X: usize = 0;
    pub const SELF_Y: usize = 1;
    pub const HEALTH: usize = 2;
    pub const ENERGY: usize = 3;
    pub const AGE: usize = 4;
    pub const HUNGER: usize = 5;
    pub const GOLD: usize = 6;
    pub const ITEM: usize = 7;
    pub const STRESS: usize = 8;
    pub const FITNESS: usize = 9;
    pub const TICK: usize = 10;
    pub const RANDOM: usize = 11;
    pub const FOOD_DIST: usize = 12;
    pub const FOOD_DIR: usize = 13;
    pub const NPC_DIST: usize = 14;
    pub const NPC_ID: usize = 15;
    pub const NPC_DIR: usize = 16;
    pub const ITEM_DIST: usize = 17;
    pub const ITEM_DIR: usize = 18;
    pub const WATER_DIST: usize = 19;
    pub const WATER_DIR: usize = 20;
    pub const FORGE_DIST: usize = 21;
    pub const FORGE_DIR: usize = 22;
    pub const ON_FORGE: usize = 23;
    pub const TILE: usize = 24;
    pub const GAS: usize = 25;
    pub const FOOD_COUNT: usize = 26;
    pub const POPULATION: usize = 27;
    pub const DAY_PHASE: usize = 28;
    pub const POISON_DIST: usize = 29;
    pub const MARKET_VALUE: usize = 30;
}

fn clamp_word(v: i64) -> i16 {
    v.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

impl World {
    /// Effective gas for this agent: the base budget plus the Gas-modifier
    /// bonus with diminishing returns (each further slot contributes half),
    /// capped at [`GAS_CAP`].
    pub(crate) fn effective_gas(&self, idx: usize) -> u32 {
        let mut bonus: i32 = 0;
        for (i, mag) in self.agents[idx]
            .mods
            .magnitudes(ModKind::Gas)
            .into_iter()
            .enumerate()
        {
            bonus += (mag as i32) >> i;
        }
        ((self.gas_budget as i32 + bonus).max(0) as u32).min(GAS_CAP)
    }

    /// Write the canonical sensor layout into Ring0 and return this
    /// agent's effective gas budget. All memory (rings and locals) is
    /// cleared first.
    pub(crate) fn sense_phase(&mut self, idx: usize) -> u32 {
        let rand5 = self.agents[idx].prng_next();
        let gas = self.effective_gas(idx);

        let a = &self.agents[idx];
        let (cx, cy) = (a.x as i32, a.y as i32);

        let (food_d, food_dir) = self.grid.nearest_tile(cx, cy, Tile::Food);
        let (npc_d, npc_id, npc_dir) = self.grid.nearest_npc_full(cx, cy, a.id);
        let (item_d, item_dir) = self.grid.nearest_item(cx, cy);
        let (water_d, water_dir) = self.grid.nearest_tile(cx, cy, Tile::Water);
        let (forge_d, forge_dir) = self.grid.nearest_tile(cx, cy, Tile::Forge);
        let (poison_d, _) = self.grid.nearest_tile(cx, cy, Tile::Poison);
        let here = self.grid.tile_at(cx, cy);

        let values: [(usize, i16); 31] = [
            (slot::SELF_X, a.x as i16),
            (slot::SELF_Y, a.y as i16),
            (slot::HEALTH, a.health),
            (slot::ENERGY, a.energy),
            (slot::AGE, clamp_word(a.age as i64)),
            (slot::HUNGER, clamp_word(a.hunger as i64)),
            (slot::GOLD, clamp_word(a.gold as i64)),
            (slot::ITEM, a.item as u8 as i16),
            (slot::STRESS, a.stress),
            (slot::FITNESS, clamp_word(a.fitness)),
            (slot::TICK, (self.tick & 0x7FFF) as i16),
            (slot::RANDOM, rand5 as i16),
            (slot::FOOD_DIST, food_d),
            (slot::FOOD_DIR, food_dir as u8 as i16),
            (slot::NPC_DIST, npc_d),
            (slot::NPC_ID, npc_id as i16),
            (slot::NPC_DIR, npc_dir as u8 as i16),
            (slot::ITEM_DIST, item_d),
            (slot::ITEM_DIR, item_dir as u8 as i16),
            (slot::WATER_DIST, water_d),
            (slot::WATER_DIR, water_dir as u8 as i16),
            (slot::FORGE_DIST, forge_d),
            (slot::FORGE_DIR, forge_dir as u8 as i16),
            (slot::ON_FORGE, (here == Tile::Forge) as i16),
            (slot::TILE, here as u8 as i16),
            (slot::GAS, gas.min(i16::MAX as u32) as i16),
            (slot::FOOD_COUNT, clamp_word(self.grid.food_count() as i64)),
            (slot::POPULATION, clamp_word(self.agents.len() as i64)),
            (slot::DAY_PHASE, (self.tick % DAY_CYCLE) as i16),
            (slot::POISON_DIST, poison_d),
            (
                slot::MARKET_VALUE,
                clamp_word(self.market_values[a.item as usize] as i64),
            ),
        ];

        self.vm.clear_memory();
        for (slot, value) in values {
            self.vm.mem_write(slot, value);
        }
        gas
    }

    /// Run the genome: muted output, fresh gas, fresh stack.
    pub(crate) fn think_phase(&mut self, idx: usize, gas: u32) {
        self.vm.reset();
        self.vm.set_muted(true);
        self.vm.set_gas(gas);
        let genome = self.agents[idx].genome.clone();
        self.vm.load(&genome);
        self.vm.run();
    }

    #[cfg(test)]
    pub(crate) fn ring0_debug(&self, s: usize) -> i16 {
        self.vm.mem_read(s)
    }
}
