//! The genetic algorithm: selection, instruction-aligned crossover, and
//! the six mutation operators.
//!
//! All genome surgery happens at instruction boundaries so every child is
//! well-formed by construction, and lengths are forced back into the
//! `[GENOME_MIN, GENOME_MAX]` interval after every edit.

use crate::opcode::{self, OpClass, OP_NOP};
use rand::Rng;
use vivarium_data::agent::{Agent, GENOME_MAX, GENOME_MIN, MAX_AGE, MAX_HEALTH};
use vivarium_data::ItemKind;

pub const MUTATION_PROBABILITY: f64 = 0.8;
const SWAP_RETRIES: usize = 8;

/// One victim replaced during an evolution round.
#[derive(Debug, Clone, Copy)]
pub struct Replacement {
    pub index: usize,
    pub old_id: u16,
    pub new_id: u16,
}

/// Run one evolution round over the live population.
///
/// The bottom quartile by fitness plus every agent at or past `MAX_AGE`
/// is replaced by a child of two tournament-selected parents from the top
/// half. `next_id` issues fresh monotonic ids; when it returns `None`
/// (u16 space exhausted) the victim is left unchanged.
pub fn evolve<R: Rng>(
    agents: &mut [Agent],
    tick: u64,
    next_id: &mut dyn FnMut() -> Option<u16>,
    rng: &mut R,
) -> Vec<Replacement> {
    let n = agents.len();
    if n < 2 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| agents[b].fitness.cmp(&agents[a].fitness).then(a.cmp(&b)));

    let mut victims: std::collections::BTreeSet<usize> = order[n - n / 4..].iter().copied().collect();
    for (i, agent) in agents.iter().enumerate() {
        if agent.age >= MAX_AGE {
            victims.insert(i);
        }
    }

    let pool: Vec<usize> = order[..(n / 2).max(1)].to_vec();
    // Parents are drawn from a snapshot so resets inside this round cannot
    // feed freshly written genomes back into it.
    let snapshot: Vec<(Vec<u8>, i32, i64)> = agents
        .iter()
        .map(|a| (a.genome.clone(), a.gold, a.fitness))
        .collect();

    let mut replacements = Vec::new();
    for idx in victims {
        let pa = tournament3(&pool, &snapshot, rng);
        let pb = tournament3(&pool, &snapshot, rng);
        let mut child = crossover(&snapshot[pa].0, &snapshot[pb].0, rng);
        if rng.gen::<f64>() < MUTATION_PROBABILITY {
            mutate(&mut child, rng);
        }
        debug_assert!(opcode::is_well_formed(&child));
        debug_assert!(child.len() >= GENOME_MIN && child.len() <= GENOME_MAX);

        let Some(new_id) = next_id() else {
            tracing::warn!("agent id space exhausted; victim kept");
            continue;
        };
        let old_id = agents[idx].id;
        let inherited_gold = (snapshot[pa].1 + snapshot[pb].1) / 4;
        reset_victim(&mut agents[idx], new_id, child, inherited_gold, tick);
        replacements.push(Replacement { index: idx, old_id, new_id });
    }
    replacements
}

fn tournament3<R: Rng>(pool: &[usize], snapshot: &[(Vec<u8>, i32, i64)], rng: &mut R) -> usize {
    let mut best = pool[rng.gen_range(0..pool.len())];
    for _ in 0..2 {
        let candidate = pool[rng.gen_range(0..pool.len())];
        if snapshot[candidate].2 > snapshot[best].2 {
            best = candidate;
        }
    }
    best
}

fn reset_victim(agent: &mut Agent, new_id: u16, genome: Vec<u8>, gold: i32, tick: u64) {
    agent.id = new_id;
    agent.genome = genome;
    agent.health = MAX_HEALTH;
    agent.energy = 100;
    agent.age = 0;
    agent.hunger = 0;
    agent.food_eaten = 0;
    agent.craft_count = 0;
    agent.teach_count = 0;
    agent.taught = 0;
    agent.item = ItemKind::None;
    agent.mods.clear();
    agent.stress = 0;
    agent.fitness = 0;
    agent.fitness_bonus = 0;
    agent.last_emotion = 0;
    agent.gold = gold.max(0);
    agent.reseed_prng(new_id, tick);
}

/// Instruction-aligned single-point crossover: `A[0..sA] ++ B[sB..]`,
/// then the length interval is re-established.
pub fn crossover<R: Rng>(a: &[u8], b: &[u8], rng: &mut R) -> Vec<u8> {
    let ba = opcode::boundaries(a);
    let bb = opcode::boundaries(b);
    if ba.len() < 2 || bb.len() < 2 {
        return enforce_bounds(a.to_vec());
    }
    let sa = ba[rng.gen_range(0..ba.len())];
    let sb = bb[rng.gen_range(0..bb.len())];
    let mut child = a[..sa].to_vec();
    child.extend_from_slice(&b[sb..]);
    enforce_bounds(child)
}

/// Truncate at the last instruction boundary within the maximum, then pad
/// with nop up to the minimum.
fn enforce_bounds(mut genome: Vec<u8>) -> Vec<u8> {
    if genome.len() > GENOME_MAX {
        let mut end = 0;
        let mut pos = 0;
        while pos < genome.len() {
            match opcode::opcode_size(&genome, pos) {
                Some(size) if pos + size <= GENOME_MAX => {
                    pos += size;
                    end = pos;
                }
                _ => break,
            }
        }
        genome.truncate(end);
    }
    while genome.len() < GENOME_MIN {
        genome.push(OP_NOP);
    }
    genome
}

/// Apply exactly one of the six operators, chosen uniformly.
pub fn mutate<R: Rng>(genome: &mut Vec<u8>, rng: &mut R) {
    match rng.gen_range(0..6u8) {
        0 => point_replace(genome, rng),
        1 => insert_instruction(genome, rng),
        2 => delete_instruction(genome, rng),
        3 => tweak_constant(genome, rng),
        4 => block_swap(genome, rng),
        _ => block_duplicate(genome, rng),
    }
    while genome.len() < GENOME_MIN {
        genome.push(OP_NOP);
    }
    debug_assert!(opcode::is_well_formed(genome));
}

/// Replace one instruction with a freshly drawn weighted instruction.
fn point_replace<R: Rng>(genome: &mut Vec<u8>, rng: &mut R) {
    let bounds = opcode::boundaries(genome);
    if bounds.is_empty() {
        return;
    }
    let pos = bounds[rng.gen_range(0..bounds.len())];
    let width = opcode::opcode_size(genome, pos).unwrap_or(1);
    let instr = opcode::random_instruction(rng);
    if genome.len() - width + instr.len() > GENOME_MAX {
        return;
    }
    genome.splice(pos..pos + width, instr);
}

fn insert_instruction<R: Rng>(genome: &mut Vec<u8>, rng: &mut R) {
    if genome.len() >= GENOME_MAX {
        return;
    }
    let instr = opcode::random_instruction(rng);
    if genome.len() + instr.len() > GENOME_MAX {
        return;
    }
    let mut bounds = opcode::boundaries(genome);
    bounds.push(genome.len());
    let pos = bounds[rng.gen_range(0..bounds.len())];
    genome.splice(pos..pos, instr);
}

fn delete_instruction<R: Rng>(genome: &mut Vec<u8>, rng: &mut R) {
    let bounds = opcode::boundaries(genome);
    if bounds.is_empty() {
        return;
    }
    let pos = bounds[rng.gen_range(0..bounds.len())];
    let width = opcode::opcode_size(genome, pos).unwrap_or(1);
    if genome.len() - width < GENOME_MIN {
        return;
    }
    genome.drain(pos..pos + width);
}

/// Nudge a small literal or a two-byte operand by ±1 within its range.
fn tweak_constant<R: Rng>(genome: &mut Vec<u8>, rng: &mut R) {
    enum Spot {
        Literal(usize),
        Operand(usize),
    }
    let mut spots = Vec::new();
    for pos in opcode::boundaries(genome) {
        match opcode::classify(genome[pos]) {
            OpClass::SmallLiteral => spots.push(Spot::Literal(pos)),
            OpClass::TwoByte => spots.push(Spot::Operand(pos + 1)),
            _ => {}
        }
    }
    if spots.is_empty() {
        return;
    }
    let delta_up = rng.gen_bool(0.5);
    match spots[rng.gen_range(0..spots.len())] {
        Spot::Literal(pos) => {
            let value = genome[pos];
            genome[pos] = if delta_up {
                value.saturating_add(1).min(0x3F)
            } else {
                value.saturating_sub(1).max(0x20)
            };
        }
        Spot::Operand(pos) => {
            genome[pos] = if delta_up {
                genome[pos].wrapping_add(1)
            } else {
                genome[pos].wrapping_sub(1)
            };
        }
    }
}

/// Swap two whole instructions of equal width; length and alignment are
/// preserved by construction. Width mismatches re-pick a bounded number
/// of times, then give up for this draw.
fn block_swap<R: Rng>(genome: &mut Vec<u8>, rng: &mut R) {
    let bounds = opcode::boundaries(genome);
    if bounds.len() < 2 {
        return;
    }
    for _ in 0..SWAP_RETRIES {
        let i = bounds[rng.gen_range(0..bounds.len())];
        let j = bounds[rng.gen_range(0..bounds.len())];
        if i == j {
            continue;
        }
        let wi = opcode::opcode_size(genome, i).unwrap_or(1);
        let wj = opcode::opcode_size(genome, j).unwrap_or(1);
        if wi != wj {
            continue;
        }
        for k in 0..wi {
            genome.swap(i + k, j + k);
        }
        return;
    }
}

fn block_duplicate<R: Rng>(genome: &mut Vec<u8>, rng: &mut R) {
    let bounds = opcode::boundaries(genome);
    if bounds.is_empty() {
        return;
    }
    let src = bounds[rng.gen_range(0..bounds.len())];
    let width = opcode::opcode_size(genome, src).unwrap_or(1);
    if genome.len() + width > GENOME_MAX {
        return;
    }
    let copy: Vec<u8> = genome[src..src + width].to_vec();
    let mut targets = opcode::boundaries(genome);
    targets.push(genome.len());
    let at = targets[rng.gen_range(0..targets.len())];
    genome.splice(at..at, copy);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn population(rng: &mut ChaCha8Rng, n: usize) -> Vec<Agent> {
        (0..n)
            .map(|i| {
                let mut a =
                    Agent::spawn(i as u16 + 1, i as u16, 0, crate::seeds::random_seed(rng), 0);
                a.fitness = (i as i64) * 10;
                a
            })
            .collect()
    }

    #[test]
    fn crossover_children_stay_well_formed() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..300 {
            let a = crate::seeds::random_seed(&mut rng);
            let b = crate::seeds::random_seed(&mut rng);
            let child = crossover(&a, &b, &mut rng);
            assert!(opcode::is_well_formed(&child));
            assert!(child.len() >= GENOME_MIN && child.len() <= GENOME_MAX);
        }
    }

    #[test]
    fn crossover_single_instruction_parent_copies_a() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let a = vec![0xE0, 14, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(opcode::boundaries(&a).len(), 1);
        let b = crate::seeds::random_seed(&mut rng);
        let child = crossover(&a, &b, &mut rng);
        assert_eq!(child, a);
    }

    #[test]
    fn mutation_operators_preserve_invariants() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        for _ in 0..500 {
            let mut g = crate::seeds::random_seed(&mut rng);
            mutate(&mut g, &mut rng);
            assert!(opcode::is_well_formed(&g));
            assert!(g.len() >= GENOME_MIN && g.len() <= GENOME_MAX);
        }
    }

    #[test]
    fn block_swap_keeps_length() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..100 {
            let mut g = crate::seeds::random_seed(&mut rng);
            let before = g.len();
            block_swap(&mut g, &mut rng);
            assert_eq!(g.len(), before);
            assert!(opcode::is_well_formed(&g));
        }
    }

    #[test]
    fn evolve_replaces_bottom_quartile_with_fresh_ids() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut agents = population(&mut rng, 8);
        let mut counter = 8u16;
        let mut next_id = move || {
            counter += 1;
            Some(counter)
        };
        let replacements = evolve(&mut agents, 100, &mut next_id, &mut rng);
        assert_eq!(replacements.len(), 2); // 8 / 4
        for r in &replacements {
            let a = &agents[r.index];
            assert!(r.new_id > 8);
            assert_eq!(a.id, r.new_id);
            assert_eq!(a.age, 0);
            assert_eq!(a.health, MAX_HEALTH);
            assert_eq!(a.fitness, 0);
            assert_eq!(a.fitness_bonus, 0);
            assert_eq!(a.item, ItemKind::None);
            assert!(opcode::is_well_formed(&a.genome));
        }
        // The two lowest-fitness agents were the victims.
        let replaced: Vec<usize> = replacements.iter().map(|r| r.index).collect();
        assert!(replaced.contains(&0) && replaced.contains(&1));
    }

    #[test]
    fn aged_out_top_performer_is_still_a_victim() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut agents = population(&mut rng, 8);
        agents[7].age = MAX_AGE; // highest fitness, but too old
        let mut counter = 8u16;
        let mut next_id = move || {
            counter += 1;
            Some(counter)
        };
        let replacements = evolve(&mut agents, 0, &mut next_id, &mut rng);
        assert!(replacements.iter().any(|r| r.index == 7));
        assert_eq!(agents[7].age, 0);
    }

    #[test]
    fn gold_is_inherited_quartered() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut agents = population(&mut rng, 4);
        for a in agents.iter_mut() {
            a.gold = 40;
        }
        let mut counter = 4u16;
        let mut next_id = move || {
            counter += 1;
            Some(counter)
        };
        let replacements = evolve(&mut agents, 0, &mut next_id, &mut rng);
        assert_eq!(replacements.len(), 1);
        assert_eq!(agents[replacements[0].index].gold, 20); // (40 + 40) / 4
    }

    #[test]
    fn id_exhaustion_keeps_victim() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut agents = population(&mut rng, 8);
        let mut next_id = || None::<u16>;
        let before: Vec<u16> = agents.iter().map(|a| a.id).collect();
        let replacements = evolve(&mut agents, 0, &mut next_id, &mut rng);
        assert!(replacements.is_empty());
        let after: Vec<u16> = agents.iter().map(|a| a.id).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn enforce_bounds_truncates_on_instruction_boundary() {
        // 127 one-byte nops then a two-byte op straddling the limit.
        let mut g = vec![OP_NOP; 127];
        g.extend_from_slice(&[0x8A, 0x05]);
        let out = enforce_bounds(g);
        assert_eq!(out.len(), 127);
        assert!(opcode::is_well_formed(&out));
    }
}
