//! Ring1 readout and world effects: movement, actions, auto-actions,
//! modifier application, and vitals decay.

use crate::meme;
use crate::vm::RING1_BASE;
use crate::world::World;
use vivarium_data::agent::MAX_AGE;
use vivarium_data::{held_modifier, Direction, ItemKind, ModKind, Modifier, Tile};

/// Ring1 slot assignments (relative to the Ring1 base).
pub mod slot {
    pub const MOVE: usize = 0;
    pub const ACTION: usize = 1;
    pub const TARGET: usize = 2;
    pub const EMOTION: usize = 3;
}

/// Action codes accepted in Ring1 slot 1.
pub mod action {
    pub const EAT: i16 = 1;
    pub const ATTACK: i16 = 2;
    pub const SHARE: i16 = 3;
    pub const TRADE: i16 = 4;
    pub const CRAFT: i16 = 5;
    pub const TEACH: i16 = 6;
}

/// Stress starts overriding intent above this threshold.
pub const STRESS_CALM_LIMIT: i16 = 30;
const FORAGE_RADIUS_CAP: i16 = 5;
const CRAFT_ENERGY_COST: i16 = 20;

impl World {
    /// Read Ring1, apply the stress override, then materialize movement
    /// and the chosen action into world effects.
    pub(crate) fn act_phase(&mut self, idx: usize) {
        let mut mv = self.vm.mem_read(RING1_BASE + slot::MOVE);
        let mut act = self.vm.mem_read(RING1_BASE + slot::ACTION);
        let target = self.vm.mem_read(RING1_BASE + slot::TARGET);
        let emotion = self.vm.mem_read(RING1_BASE + slot::EMOTION);

        {
            let a = &mut self.agents[idx];
            a.last_emotion = emotion;
            // Above the calm limit intent gets scrambled with probability
            // (stress - 30)%, realized as a 10-bit agent-PRNG draw. The
            // PRNG is not consumed at or below the limit.
            if a.stress > STRESS_CALM_LIMIT {
                let r = ((a.prng_next() as u32) << 5) | a.prng_next() as u32;
                if r * 100 < (a.stress - STRESS_CALM_LIMIT) as u32 * 1024 {
                    mv = (a.prng_next() % 5) as i16;
                    act = (a.prng_next() % 7) as i16;
                }
            }
        }

        // Values outside the move range are inert rather than wrapped.
        let dir = if (0..=4).contains(&mv) {
            Direction::from_byte(mv as u8)
        } else {
            Direction::None
        };
        self.apply_move(idx, dir);

        match act {
            action::EAT => self.action_eat(idx),
            action::ATTACK => self.action_attack(idx, target),
            action::SHARE => self.action_share(idx, target),
            action::TRADE => self.action_trade(idx, target),
            action::CRAFT => self.try_craft(idx),
            action::TEACH => self.action_teach(idx, target),
            _ => {}
        }
    }

    /// Move one step if the destination is in-bounds, not a wall, and
    /// unoccupied, then resolve contact with whatever lies there. Forges
    /// are never disturbed by traffic.
    fn apply_move(&mut self, idx: usize, dir: Direction) {
        let (dx, dy) = dir.offset();
        if dx == 0 && dy == 0 {
            return;
        }
        let (x, y) = (self.agents[idx].x as i32, self.agents[idx].y as i32);
        let (nx, ny) = (x + dx, y + dy);
        if self.grid.tile_at(nx, ny) == Tile::Wall || self.grid.occ_at(nx, ny) != 0 {
            return;
        }
        let id = self.agents[idx].id;
        self.grid.clear_occ(x, y);
        self.agents[idx].x = nx as u16;
        self.agents[idx].y = ny as u16;
        self.grid.set_occ(nx, ny, id);

        match self.grid.tile_at(nx, ny) {
            Tile::Poison => {
                self.agents[idx].damage(15);
                self.agents[idx].add_stress(10);
                self.grid.set_tile(nx, ny, Tile::Empty);
                let key = ny as usize * self.grid.size() + nx as usize;
                self.poison_ledger.remove(&key);
            }
            Tile::Crystal => {
                self.agents[idx].mods.add(Modifier::permanent(
                    ModKind::Gas,
                    50,
                    ItemKind::Crystal,
                ));
                self.grid.set_tile(nx, ny, Tile::Empty);
            }
            tile => {
                if let Some(kind) = tile.pickup_item() {
                    if self.agents[idx].item == ItemKind::None {
                        self.agents[idx].item = kind;
                        if let Some(m) = held_modifier(kind) {
                            self.agents[idx].mods.add(m);
                        }
                        self.grid.set_tile(nx, ny, Tile::Empty);
                    }
                }
            }
        }
    }

    fn consume_food_at(&mut self, idx: usize, x: i32, y: i32) {
        self.grid.set_tile(x, y, Tile::Empty);
        let a = &mut self.agents[idx];
        a.add_energy(30);
        a.heal(5);
        a.hunger = 0;
        a.add_stress(-2);
        a.food_eaten += 1;
    }

    /// Eat from the current cell or one of the four neighbors.
    fn action_eat(&mut self, idx: usize) {
        let (x, y) = (self.agents[idx].x as i32, self.agents[idx].y as i32);
        let cells = [(x, y), (x, y - 1), (x + 1, y), (x, y + 1), (x - 1, y)];
        for (fx, fy) in cells {
            if self.grid.tile_at(fx, fy) == Tile::Food {
                self.consume_food_at(idx, fx, fy);
                return;
            }
        }
    }

    fn adjacent_living_target(&self, idx: usize, target: i16) -> Option<usize> {
        if target <= 0 {
            return None;
        }
        let tid = target as u16;
        let j = self.agents.iter().position(|a| a.id == tid)?;
        if j == idx || !self.agents[j].is_alive() {
            return None;
        }
        let (ax, ay) = (self.agents[idx].x as i32, self.agents[idx].y as i32);
        let (bx, by) = (self.agents[j].x as i32, self.agents[j].y as i32);
        ((ax - bx).abs() + (ay - by).abs() == 1).then_some(j)
    }

    fn action_attack(&mut self, idx: usize, target: i16) {
        let Some(j) = self.adjacent_living_target(idx, target) else {
            return;
        };
        let attack = self.agents[idx].mods.sum(ModKind::Attack);
        let defense = self.agents[j].mods.sum(ModKind::Defense);
        let damage = (10 + attack - defense).max(1);
        self.agents[idx].add_energy(-5);
        self.agents[j].damage(damage);
        self.agents[j].add_stress(15);
    }

    fn action_share(&mut self, idx: usize, target: i16) {
        let Some(j) = self.adjacent_living_target(idx, target) else {
            return;
        };
        if self.agents[idx].energy <= 20 {
            return;
        }
        self.agents[idx].add_energy(-10);
        self.agents[j].add_energy(10);
    }

    /// Trading is an intent; resolution happens after the per-agent loop
    /// so both halves of a bilateral trade come from the same tick.
    fn action_trade(&mut self, idx: usize, target: i16) {
        if self.agents[idx].item == ItemKind::None || target <= 0 {
            return;
        }
        let pair = (self.agents[idx].id, target as u16);
        self.trade_intents.push(pair);
    }

    /// Craft the held item's product: free on a forge, otherwise at an
    /// energy cost.
    fn try_craft(&mut self, idx: usize) {
        let item = self.agents[idx].item;
        let Some(product) = item.craft_product() else {
            return;
        };
        let (x, y) = (self.agents[idx].x as i32, self.agents[idx].y as i32);
        let on_forge = self.grid.tile_at(x, y) == Tile::Forge;
        if !on_forge {
            if self.agents[idx].energy < CRAFT_ENERGY_COST {
                return;
            }
            self.agents[idx].add_energy(-CRAFT_ENERGY_COST);
        }
        let a = &mut self.agents[idx];
        a.mods.remove_source(item);
        a.item = product;
        if let Some(m) = held_modifier(product) {
            a.mods.add(m);
        }
        a.award_fitness(50);
        a.craft_count += 1;
    }

    fn action_teach(&mut self, idx: usize, target: i16) {
        let Some(j) = self.adjacent_living_target(idx, target) else {
            return;
        };
        if self.agents[idx].energy < 10 {
            return;
        }
        self.agents[idx].add_energy(-10);
        let (lo, hi) = (idx.min(j), idx.max(j));
        let (left, right) = self.agents.split_at_mut(hi);
        let (teacher, student) = if idx < j {
            (&mut left[lo], &mut right[0])
        } else {
            (&mut right[0], &mut left[lo])
        };
        if meme::transfer(teacher, student, self.rng.stream()) {
            self.teach_events += 1;
        }
    }

    /// Auto-actions: a passive eat scan whose radius grows with Forage
    /// modifiers, and free crafting when parked on a forge.
    pub(crate) fn auto_phase(&mut self, idx: usize) {
        let forage = self.agents[idx].mods.sum(ModKind::Forage);
        let radius = (1 + forage).clamp(0, FORAGE_RADIUS_CAP);
        let (x, y) = (self.agents[idx].x as i32, self.agents[idx].y as i32);
        if let Some((_, fx, fy)) =
            self.grid
                .nearest_where(x, y, radius, |g, cx, cy| g.tile_at(cx, cy) == Tile::Food)
        {
            self.consume_food_at(idx, fx, fy);
        }

        if self.grid.tile_at(x, y) == Tile::Forge
            && self.agents[idx].item.craft_product().is_some()
        {
            self.try_craft(idx);
        }
    }

    /// Apply per-tick modifier kinds to vitals, then decay durations.
    pub(crate) fn modifier_phase(&mut self, idx: usize) {
        let a = &mut self.agents[idx];
        let energy = a.mods.sum(ModKind::Energy);
        let health = a.mods.sum(ModKind::Health);
        let stress = a.mods.sum(ModKind::Stress);
        if energy != 0 {
            a.add_energy(energy);
        }
        if health != 0 {
            a.heal(health);
        }
        if stress != 0 {
            a.add_stress(stress);
        }
        a.mods.decay();
    }

    /// Metabolic drain, aging, and the stress feedback loop.
    pub(crate) fn vitals_phase(&mut self, idx: usize) {
        let a = &mut self.agents[idx];
        a.energy -= 1;
        if a.energy <= 0 {
            a.energy = 0;
            a.damage(5);
        }
        a.age += 1;
        a.hunger += 1;
        if a.age >= MAX_AGE {
            a.health = 0;
        }
        if a.energy < 50 {
            a.add_stress(5);
        } else if a.energy > 150 {
            a.add_stress(-1);
        }
    }
}
