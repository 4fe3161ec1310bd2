//! The world: construction, the per-tick scheduler, and inspection.
//!
//! `tick()` is infallible and strictly single-threaded. Per agent, in
//! insertion order: sense → think → act → auto-actions → modifier
//! apply/decay → vitals decay. After the loop: reap, trade resolution,
//! respawn/hazards, fitness, evolution cadence, tick advance. One agent's
//! movement is therefore visible to the next agent's senses within the
//! same tick.

use crate::config::{ConfigError, WorldOptions};
use crate::grid::WorldGrid;
use crate::rng::WorldRng;
use crate::vm::Vm;
use crate::{evolve, seeds};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use vivarium_data::agent::MAX_AGE;
use vivarium_data::{Agent, Counters, ItemKind, Tile};

/// Day cycle length in ticks; food respawns during the first three
/// quarters of each cycle.
pub const DAY_CYCLE: u64 = 256;
const DAY_ACTIVE: u64 = 192;
/// Poison tiles revert to empty after this many ticks.
pub const POISON_TTL: u64 = 200;
const BLIGHT_EVERY: u64 = 1024;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    InvalidArgument(#[from] ConfigError),
}

pub struct World {
    pub(crate) grid: WorldGrid,
    pub(crate) agents: Vec<Agent>,
    pub(crate) vm: Vm,
    pub(crate) rng: WorldRng,
    pub(crate) tick: u64,
    pub(crate) next_id: u32,
    pub(crate) gas_budget: u32,
    pub(crate) evolve_every: u64,
    pub(crate) max_food: u32,
    pub(crate) food_rate: f64,
    pub(crate) max_items: u32,
    pub(crate) item_rate: f64,
    pub(crate) poison_ledger: HashMap<usize, u64>,
    pub(crate) trade_intents: Vec<(u16, u16)>,
    pub(crate) food_spawned: u64,
    pub(crate) trade_count: u64,
    pub(crate) teach_events: u64,
    /// Tick-start market value per item kind, so the sensor read is O(1).
    pub(crate) market_values: [i32; 8],
}

impl World {
    pub fn new(opts: WorldOptions) -> Result<Self, WorldError> {
        opts.validate()?;
        let size = if opts.world_size == 0 {
            WorldGrid::auto_size(opts.n_agents)
        } else {
            opts.world_size
        };
        if size * size < opts.n_agents {
            return Err(ConfigError::InvalidArgument(format!(
                "world of side {size} cannot hold {} agents",
                opts.n_agents
            ))
            .into());
        }

        let mut world = Self {
            grid: WorldGrid::new(size),
            agents: Vec::with_capacity(opts.n_agents),
            vm: Vm::new(),
            rng: WorldRng::new(opts.seed),
            tick: 0,
            next_id: 1,
            gas_budget: opts.gas_budget,
            evolve_every: opts.evolve_every,
            max_food: opts.resolved_max_food(),
            food_rate: opts.resolved_food_rate(),
            max_items: opts.resolved_max_items(),
            item_rate: opts.resolved_item_rate(),
            poison_ledger: HashMap::new(),
            trade_intents: Vec::new(),
            food_spawned: 0,
            trade_count: 0,
            teach_events: 0,
            market_values: [0; 8],
        };

        world.place_terrain();
        world.spawn_population(&opts);
        tracing::debug!(
            size,
            agents = world.agents.len(),
            seed = opts.seed,
            "world constructed"
        );
        Ok(world)
    }

    fn place_terrain(&mut self) {
        let size = self.grid.size();
        let forges = (size / 8).max(3);
        for _ in 0..forges {
            if let Some((x, y)) = self.random_free_cell() {
                self.grid.set_tile(x, y, Tile::Forge);
            }
        }
        for _ in 0..size / 6 {
            if let Some((x, y)) = self.random_free_cell() {
                self.grid.set_tile(x, y, Tile::Water);
            }
        }
        for _ in 0..self.max_food / 2 {
            self.place_food();
        }
    }

    fn spawn_population(&mut self, opts: &WorldOptions) {
        let n = opts.n_agents;
        let count = |fraction: f64| (n as f64 * fraction).floor() as usize;
        let mut roles = Vec::with_capacity(n);
        roles.extend(std::iter::repeat(Some(seeds::SeedRole::Forager)).take(count(opts.forager_fraction)));
        roles.extend(std::iter::repeat(Some(seeds::SeedRole::Trader)).take(count(opts.trader_fraction)));
        roles.extend(std::iter::repeat(Some(seeds::SeedRole::Crafter)).take(count(opts.crafter_fraction)));
        roles.extend(std::iter::repeat(Some(seeds::SeedRole::Teacher)).take(count(opts.teacher_fraction)));
        while roles.len() < n {
            roles.push(None);
        }

        for role in roles {
            let genome = match role {
                Some(role) => seeds::seed_genome(role),
                None => seeds::random_seed(self.rng.stream()),
            };
            let Some((x, y)) = self.random_free_cell() else {
                tracing::warn!("no free cell for spawn; population truncated");
                break;
            };
            let Some(id) = self.issue_id() else { break };
            let agent = Agent::spawn(id, x as u16, y as u16, genome, self.tick);
            self.grid.set_occ(x, y, id);
            self.agents.push(agent);
        }
    }

    pub(crate) fn issue_id(&mut self) -> Option<u16> {
        if self.next_id > u16::MAX as u32 {
            tracing::warn!("agent id space exhausted");
            return None;
        }
        let id = self.next_id as u16;
        self.next_id += 1;
        Some(id)
    }

    /// Random empty, unoccupied cell; falls back to a deterministic scan
    /// when random probing keeps missing.
    fn random_free_cell(&mut self) -> Option<(i32, i32)> {
        let size = self.grid.size();
        for _ in 0..64 {
            let x = self.rng.below_usize(size) as i32;
            let y = self.rng.below_usize(size) as i32;
            if self.grid.tile_at(x, y) == Tile::Empty && self.grid.occ_at(x, y) == 0 {
                return Some((x, y));
            }
        }
        for y in 0..size as i32 {
            for x in 0..size as i32 {
                if self.grid.tile_at(x, y) == Tile::Empty && self.grid.occ_at(x, y) == 0 {
                    return Some((x, y));
                }
            }
        }
        None
    }

    fn place_food(&mut self) -> bool {
        if let Some((x, y)) = self.random_free_cell() {
            self.grid.set_tile(x, y, Tile::Food);
            self.food_spawned += 1;
            true
        } else {
            false
        }
    }

    /// Advance the simulation one tick.
    pub fn tick(&mut self) {
        self.refresh_market();
        for idx in 0..self.agents.len() {
            if !self.agents[idx].is_alive() {
                continue;
            }
            let gas = self.sense_phase(idx);
            self.think_phase(idx, gas);
            self.act_phase(idx);
            self.auto_phase(idx);
            self.modifier_phase(idx);
            self.vitals_phase(idx);
        }

        self.reap();
        self.resolve_trades();
        self.respawn_and_hazards();
        self.update_fitness();

        if self.evolve_every > 0 && (self.tick + 1) % self.evolve_every == 0 {
            self.run_evolution();
        }

        self.tick += 1;

        #[cfg(debug_assertions)]
        self.assert_invariants();
    }

    fn reap(&mut self) {
        let mut drops: Vec<(i32, i32, Option<Tile>)> = Vec::new();
        for agent in &self.agents {
            if !agent.is_alive() || agent.age >= MAX_AGE {
                drops.push((agent.x as i32, agent.y as i32, agent.item.drop_tile()));
            }
        }
        for (x, y, drop) in drops {
            self.grid.clear_occ(x, y);
            if let Some(tile) = drop {
                // Forges are permanent and never overwritten by death.
                if self.grid.tile_at(x, y) != Tile::Forge {
                    self.grid.set_tile(x, y, tile);
                }
            }
        }
        self.agents.retain(|a| a.is_alive() && a.age < MAX_AGE);
    }

    fn index_of(&self, id: u16) -> Option<usize> {
        self.agents.iter().position(|a| a.id == id)
    }

    /// Item census: per-kind counts (live-held plus item tiles) and total.
    fn market_counts(&self) -> ([i32; 8], i32) {
        let mut counts = [0i32; 8];
        for agent in &self.agents {
            counts[agent.item as usize] += 1;
        }
        counts[ItemKind::None as usize] = 0;
        counts[ItemKind::Tool as usize] += self.grid.tile_count(Tile::Tool) as i32;
        counts[ItemKind::Weapon as usize] += self.grid.tile_count(Tile::Weapon) as i32;
        counts[ItemKind::Treasure as usize] += self.grid.tile_count(Tile::Treasure) as i32;
        counts[ItemKind::Crystal as usize] += self.grid.tile_count(Tile::Crystal) as i32;
        let total = counts.iter().sum();
        (counts, total)
    }

    /// `10 * total / count(kind)`, with absent kinds priced as extremely
    /// rare. Totals cover live-held items plus item tiles.
    #[must_use]
    pub fn market_value(&self, kind: ItemKind) -> i32 {
        if kind == ItemKind::None {
            return 0;
        }
        let (counts, total) = self.market_counts();
        let of_kind = counts[kind as usize];
        if of_kind == 0 {
            total * 10
        } else {
            10 * total / of_kind
        }
    }

    /// Refresh the tick-start market snapshot read by the Ring0 sensor.
    fn refresh_market(&mut self) {
        let (counts, total) = self.market_counts();
        for kind in 1..8usize {
            self.market_values[kind] = if counts[kind] == 0 {
                total * 10
            } else {
                10 * total / counts[kind]
            };
        }
        self.market_values[0] = 0;
    }

    /// Trades resolve only when both intents exist, both parties survived
    /// the tick, and they are still Manhattan-adjacent. The swap, the
    /// modifier exchange, and the gold transfer are atomic.
    fn resolve_trades(&mut self) {
        let intents = std::mem::take(&mut self.trade_intents);
        let mut settled: HashSet<(u16, u16)> = HashSet::new();
        for &(a_id, b_id) in &intents {
            let key = (a_id.min(b_id), a_id.max(b_id));
            if a_id == b_id || settled.contains(&key) {
                continue;
            }
            if !intents.contains(&(b_id, a_id)) {
                continue;
            }
            let (Some(ia), Some(ib)) = (self.index_of(a_id), self.index_of(b_id)) else {
                continue;
            };
            let (ax, ay) = (self.agents[ia].x as i32, self.agents[ia].y as i32);
            let (bx, by) = (self.agents[ib].x as i32, self.agents[ib].y as i32);
            if (ax - bx).abs() + (ay - by).abs() != 1 {
                continue;
            }
            settled.insert(key);

            let item_a = self.agents[ia].item;
            let item_b = self.agents[ib].item;
            // Totals are unchanged by a swap, so post-swap market values
            // can be computed up front.
            let val_a = self.market_value(item_b);
            let val_b = self.market_value(item_a);
            let spread = (val_a - val_b) / 2;

            let (first, second) = if ia < ib { (ia, ib) } else { (ib, ia) };
            let (left, right) = self.agents.split_at_mut(second);
            let (a, b) = if ia < ib {
                (&mut left[first], &mut right[0])
            } else {
                (&mut right[0], &mut left[first])
            };

            a.mods.remove_source(item_a);
            b.mods.remove_source(item_b);
            a.item = item_b;
            b.item = item_a;
            if let Some(m) = vivarium_data::held_modifier(item_b) {
                a.mods.add(m);
            }
            if let Some(m) = vivarium_data::held_modifier(item_a) {
                b.mods.add(m);
            }
            let base_a = 3 + a.mods.sum(vivarium_data::ModKind::Trade) as i32;
            let base_b = 3 + b.mods.sum(vivarium_data::ModKind::Trade) as i32;
            a.add_gold(base_a - spread);
            b.add_gold(base_b + spread);
            a.add_stress(-5);
            b.add_stress(-5);
            self.trade_count += 1;
            tracing::trace!(a = a_id, b = b_id, "trade settled");
        }
    }

    fn respawn_and_hazards(&mut self) {
        // Food respawn during the first three quarters of the day cycle.
        if self.tick % DAY_CYCLE < DAY_ACTIVE
            && self.grid.food_count() < self.max_food
            && self.rng.chance(self.food_rate)
        {
            let batch = 1 + self.rng.below(3);
            for _ in 0..batch {
                if self.grid.food_count() >= self.max_food {
                    break;
                }
                self.place_food();
            }
        }

        // Item respawn; one in ten placements is poison, and one in twenty
        // of the rest is a crystal.
        if self.grid.item_count() < self.max_items && self.rng.chance(self.item_rate) {
            if let Some((x, y)) = self.random_free_cell() {
                if self.rng.below(10) == 0 {
                    self.grid.set_tile(x, y, Tile::Poison);
                    let idx = y as usize * self.grid.size() + x as usize;
                    self.poison_ledger.insert(idx, self.tick);
                } else if self.rng.below(20) == 0 {
                    self.grid.set_tile(x, y, Tile::Crystal);
                } else {
                    let tile = match self.rng.below(3) {
                        0 => Tile::Tool,
                        1 => Tile::Weapon,
                        _ => Tile::Treasure,
                    };
                    self.grid.set_tile(x, y, tile);
                }
            }
        }

        // Poison decay.
        let size = self.grid.size();
        let expired: Vec<usize> = self
            .poison_ledger
            .iter()
            .filter(|(_, &placed)| self.tick.saturating_sub(placed) > POISON_TTL)
            .map(|(&idx, _)| idx)
            .collect();
        for idx in expired {
            self.poison_ledger.remove(&idx);
            let (x, y) = ((idx % size) as i32, (idx / size) as i32);
            if self.grid.tile_at(x, y) == Tile::Poison {
                self.grid.set_tile(x, y, Tile::Empty);
            }
        }

        // Seasonal blight: every 1024 ticks, each food tile dies with
        // probability one half, in row-major order.
        if self.tick > 0 && self.tick % BLIGHT_EVERY == 0 {
            let mut destroyed = 0u32;
            for y in 0..size as i32 {
                for x in 0..size as i32 {
                    if self.grid.tile_at(x, y) == Tile::Food && self.rng.chance(0.5) {
                        self.grid.set_tile(x, y, Tile::Empty);
                        destroyed += 1;
                    }
                }
            }
            tracing::debug!(tick = self.tick, destroyed, "blight swept the food supply");
        }
    }

    fn update_fitness(&mut self) {
        for a in &mut self.agents {
            a.fitness = a.age as i64
                + 10 * a.food_eaten as i64
                + a.health as i64
                + 20 * a.gold as i64
                + 30 * a.craft_count as i64
                + 15 * a.teach_count as i64
                - (a.stress / 5) as i64
                + a.fitness_bonus;
        }
    }

    fn run_evolution(&mut self) {
        let mut counter = self.next_id;
        let mut next = move || {
            if counter > u16::MAX as u32 {
                return None;
            }
            let id = counter as u16;
            counter += 1;
            Some(id)
        };
        let replacements =
            evolve::evolve(&mut self.agents, self.tick, &mut next, self.rng.stream());
        self.next_id += replacements.len() as u32;
        for r in &replacements {
            let a = &self.agents[r.index];
            self.grid.set_occ(a.x as i32, a.y as i32, r.new_id);
        }
        if !replacements.is_empty() {
            tracing::debug!(
                tick = self.tick,
                replaced = replacements.len(),
                "evolution round"
            );
        }
    }

    #[cfg(debug_assertions)]
    fn assert_invariants(&self) {
        let (food, items) = self.grid.recount();
        debug_assert_eq!(food, self.grid.food_count(), "food count drifted");
        debug_assert_eq!(items, self.grid.item_count(), "item count drifted");
        for a in &self.agents {
            debug_assert_eq!(
                self.grid.occ_at(a.x as i32, a.y as i32),
                a.id,
                "occupancy incoherent for agent {}",
                a.id
            );
            debug_assert!(crate::opcode::is_well_formed(&a.genome));
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    #[must_use]
    pub fn agent_by_id(&self, id: u16) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    #[must_use]
    pub fn tile_at(&self, x: i32, y: i32) -> Tile {
        self.grid.tile_at(x, y)
    }

    #[must_use]
    pub fn occ_at(&self, x: i32, y: i32) -> u16 {
        self.grid.occ_at(x, y)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.grid.size()
    }

    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub fn counters(&self) -> Counters {
        Counters {
            tick: self.tick,
            food_count: self.grid.food_count(),
            item_count: self.grid.item_count(),
            food_spawned: self.food_spawned,
            trade_count: self.trade_count,
            teach_count: self.teach_events,
        }
    }

    // Test-support mutators: scenario setup pokes the grid directly.

    pub fn set_tile(&mut self, x: i32, y: i32, t: Tile) {
        self.grid.set_tile(x, y, t);
    }

    pub fn place_poison(&mut self, x: i32, y: i32) {
        self.grid.set_tile(x, y, Tile::Poison);
        let idx = y as usize * self.grid.size() + x as usize;
        self.poison_ledger.insert(idx, self.tick);
    }

    pub fn agent_mut_for_setup(&mut self, id: u16) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    /// Move an agent directly, keeping occupancy coherent.
    pub fn relocate_for_setup(&mut self, id: u16, x: i32, y: i32) {
        let Some(idx) = self.index_of(id) else { return };
        let (ox, oy) = (self.agents[idx].x as i32, self.agents[idx].y as i32);
        self.grid.clear_occ(ox, oy);
        self.agents[idx].x = x as u16;
        self.agents[idx].y = y as u16;
        self.grid.set_occ(x, y, id);
    }

    /// Replace an agent's genome, nop-padding up to the length minimum.
    pub fn set_genome_for_setup(&mut self, id: u16, genome: Vec<u8>) {
        if let Some(a) = self.agents.iter_mut().find(|a| a.id == id) {
            a.genome = seeds::pad_genome(genome);
        }
    }

    /// Hand an agent an item together with the modifier it grants.
    pub fn give_item_for_setup(&mut self, id: u16, item: ItemKind) {
        if let Some(a) = self.agents.iter_mut().find(|a| a.id == id) {
            a.item = item;
            if let Some(m) = vivarium_data::held_modifier(item) {
                a.mods.add(m);
            }
        }
    }
}
