//! End-to-end scheduler scenarios: single agents with pinned genomes and
//! hand-placed tiles, observed through public accessors only.

use vivarium_core::config::WorldOptions;
use vivarium_core::world::World;
use vivarium_data::{ItemKind, ModKind, Tile};

/// A world with all spawners silenced so scenarios control the board.
fn quiet_world(n_agents: usize, seed: u64) -> World {
    World::new(WorldOptions {
        n_agents,
        world_size: 16,
        seed,
        evolve_every: 0,
        forager_fraction: 0.0,
        trader_fraction: 0.0,
        crafter_fraction: 0.0,
        teacher_fraction: 0.0,
        max_food: Some(0),
        food_rate: Some(0.0),
        max_items: Some(0),
        item_rate: Some(0.0),
        ..Default::default()
    })
    .unwrap()
}

const FORAGER: [u8; 8] = [0x8A, 0x0D, 0x8C, 0x00, 0x21, 0x8C, 0x01, 0xF1];
const WALKER: [u8; 12] =
    [0x8A, 0x0A, 0x24, 0x0A, 0x21, 0x06, 0x8C, 0x00, 0x21, 0x8C, 0x01, 0xF1];

#[test]
fn forager_walks_to_food_and_eats() {
    let mut w = quiet_world(1, 41);
    let id = w.agents()[0].id;
    w.set_genome_for_setup(id, FORAGER.to_vec());
    w.relocate_for_setup(id, 5, 5);
    w.set_tile(5, 4, Tile::Food);
    let energy_before = w.agent_by_id(id).unwrap().energy;

    w.tick();

    let a = w.agent_by_id(id).unwrap();
    assert_eq!((a.x, a.y), (5, 4), "moved onto the food cell");
    assert!(a.food_eaten >= 1);
    assert!(a.energy > energy_before, "energy strictly increased");
    assert_eq!(w.tile_at(5, 4), Tile::Empty);
}

#[test]
fn nine_byte_forager_spelling_behaves_identically() {
    let mut long = FORAGER.to_vec();
    long.push(0xF1);

    let run = |genome: Vec<u8>| {
        let mut w = quiet_world(1, 41);
        let id = w.agents()[0].id;
        w.set_genome_for_setup(id, genome);
        w.relocate_for_setup(id, 5, 5);
        w.set_tile(5, 4, Tile::Food);
        w.tick();
        let a = w.agent_by_id(id).unwrap();
        (a.x, a.y, a.food_eaten, a.energy, a.health)
    };

    assert_eq!(run(FORAGER.to_vec()), run(long));
}

#[test]
fn random_walker_heads_west_on_tick_seven() {
    let mut w = quiet_world(1, 42);
    let id = w.agents()[0].id;
    w.set_genome_for_setup(id, WALKER.to_vec());
    w.relocate_for_setup(id, 8, 8);

    // Directions cycle N E S W with the tick counter; seven ticks of
    // wandering leave the walker one step east of home.
    for _ in 0..7 {
        w.tick();
    }
    let before = w.agent_by_id(id).unwrap();
    let (bx, by) = (before.x as i32, before.y as i32);
    assert_eq!((bx, by), (9, 8));

    w.tick(); // tick counter 7: (7 mod 4) + 1 = 4 = west
    let a = w.agent_by_id(id).unwrap();
    assert_eq!((a.x as i32, a.y as i32), (bx - 1, by));
}

#[test]
fn poison_on_the_path_burns_and_clears() {
    let mut w = quiet_world(1, 43);
    let id = w.agents()[0].id;
    // March north unconditionally.
    let genome = vivarium_core::assemble("1 r1! 0 yield").unwrap();
    w.set_genome_for_setup(id, genome);
    w.relocate_for_setup(id, 5, 5);
    w.place_poison(5, 4);

    w.tick();

    let a = w.agent_by_id(id).unwrap();
    assert_eq!((a.x, a.y), (5, 4));
    assert_eq!(a.health, 85);
    assert_eq!(a.stress, 10);
    assert_eq!(w.tile_at(5, 4), Tile::Empty);
}

#[test]
fn bilateral_trade_swaps_items_and_modifiers() {
    let mut w = quiet_world(2, 44);
    let a_id = w.agents()[0].id;
    let b_id = w.agents()[1].id;
    w.relocate_for_setup(a_id, 5, 5);
    w.relocate_for_setup(b_id, 6, 5);
    w.give_item_for_setup(a_id, ItemKind::Tool);
    w.give_item_for_setup(b_id, ItemKind::Weapon);
    w.agent_mut_for_setup(a_id).unwrap().stress = 20;
    w.agent_mut_for_setup(b_id).unwrap().stress = 20;

    let trade_toward = |target: u16| format!("0 r1! 0  4 r1! 1  {target} r1! 2  yield");
    let a_genome = vivarium_core::assemble(&trade_toward(b_id)).unwrap();
    let b_genome = vivarium_core::assemble(&trade_toward(a_id)).unwrap();
    w.set_genome_for_setup(a_id, a_genome);
    w.set_genome_for_setup(b_id, b_genome);

    w.tick();

    let a = w.agent_by_id(a_id).unwrap();
    let b = w.agent_by_id(b_id).unwrap();
    assert_eq!(a.item, ItemKind::Weapon);
    assert_eq!(b.item, ItemKind::Tool);
    assert_eq!(a.mods.sum(ModKind::Attack), 5);
    assert_eq!(a.mods.sum(ModKind::Forage), 0);
    assert_eq!(b.mods.sum(ModKind::Forage), 1);
    assert_eq!(b.mods.sum(ModKind::Defense), 0);
    assert_eq!(w.counters().trade_count, 1);
    // Both relieved by the deal: 20 - 5 = 15.
    assert_eq!(a.stress, 15);
    assert_eq!(b.stress, 15);
    // Identical market values: the +3 bases only, zero-sum spread.
    assert_eq!(a.gold, 3);
    assert_eq!(b.gold, 3);
}

#[test]
fn one_sided_trade_intent_changes_nothing() {
    let mut w = quiet_world(2, 45);
    let a_id = w.agents()[0].id;
    let b_id = w.agents()[1].id;
    w.relocate_for_setup(a_id, 5, 5);
    w.relocate_for_setup(b_id, 6, 5);
    w.give_item_for_setup(a_id, ItemKind::Tool);
    w.give_item_for_setup(b_id, ItemKind::Weapon);

    let genome = vivarium_core::assemble(&format!("0 r1! 0 4 r1! 1 {b_id} r1! 2 yield")).unwrap();
    w.set_genome_for_setup(a_id, genome);
    let idle = vivarium_core::assemble("yield").unwrap();
    w.set_genome_for_setup(b_id, idle);

    w.tick();

    assert_eq!(w.agent_by_id(a_id).unwrap().item, ItemKind::Tool);
    assert_eq!(w.agent_by_id(b_id).unwrap().item, ItemKind::Weapon);
    assert_eq!(w.counters().trade_count, 0);
    assert_eq!(w.agent_by_id(a_id).unwrap().gold, 0);
}

#[test]
fn crafting_on_a_forge_upgrades_the_tool() {
    let mut w = quiet_world(1, 46);
    let id = w.agents()[0].id;
    w.relocate_for_setup(id, 5, 5);
    w.set_tile(5, 5, Tile::Forge);
    w.give_item_for_setup(id, ItemKind::Tool);
    let genome = vivarium_core::assemble("0 r1! 0 5 r1! 1 yield").unwrap();
    w.set_genome_for_setup(id, genome);
    let forage_before = w.agent_by_id(id).unwrap().mods.sum(ModKind::Forage);

    w.tick();

    let a = w.agent_by_id(id).unwrap();
    assert_eq!(a.item, ItemKind::Compass);
    assert_eq!(a.craft_count, 1);
    assert_eq!(a.mods.sum(ModKind::Forage), forage_before + 2);
    assert_eq!(a.energy, 99, "forge crafting is free; only decay applies");
    // The 50-point crafting award survives the end-of-tick recomputation,
    // on top of the formula terms (age 1, health 100, craft_count 30).
    assert_eq!(a.fitness_bonus, 50);
    let expected = a.age as i64 + a.health as i64 + 30 - (a.stress / 5) as i64 + 50;
    assert_eq!(a.fitness, expected);
}

#[test]
fn crafting_award_is_worth_fifty_fitness() {
    // Crafting on a forge vs holding still off one (an idle twin on the
    // forge would auto-craft): the one-tick fitness gap is the 50-point
    // award plus the craft-counter term.
    let mut crafted = quiet_world(1, 46);
    let id = crafted.agents()[0].id;
    crafted.relocate_for_setup(id, 5, 5);
    crafted.set_tile(5, 5, Tile::Forge);
    crafted.give_item_for_setup(id, ItemKind::Tool);
    let genome = vivarium_core::assemble("0 r1! 0 5 r1! 1 yield").unwrap();
    crafted.set_genome_for_setup(id, genome);
    crafted.tick();
    let with_craft = crafted.agent_by_id(id).unwrap().fitness;

    let mut idle = quiet_world(1, 46);
    let id = idle.agents()[0].id;
    idle.relocate_for_setup(id, 5, 5);
    idle.give_item_for_setup(id, ItemKind::Tool);
    idle.set_genome_for_setup(id, vivarium_core::assemble("yield").unwrap());
    idle.tick();
    let without_craft = idle.agent_by_id(id).unwrap().fitness;

    assert_eq!(with_craft - without_craft, 50 + 30);
}

#[test]
fn unequal_market_values_skew_the_gold_spread() {
    let mut w = quiet_world(2, 48);
    let a_id = w.agents()[0].id;
    let b_id = w.agents()[1].id;
    w.relocate_for_setup(a_id, 5, 5);
    w.relocate_for_setup(b_id, 6, 5);
    w.give_item_for_setup(a_id, ItemKind::Tool);
    w.give_item_for_setup(b_id, ItemKind::Weapon);
    // Flood the board with weapons so the lone tool prices high.
    for x in 0..3 {
        w.set_tile(x, 0, Tile::Weapon);
    }

    let trade_toward = |target: u16| format!("0 r1! 0  4 r1! 1  {target} r1! 2  yield");
    let a_genome = vivarium_core::assemble(&trade_toward(b_id)).unwrap();
    let b_genome = vivarium_core::assemble(&trade_toward(a_id)).unwrap();
    w.set_genome_for_setup(a_id, a_genome);
    w.set_genome_for_setup(b_id, b_genome);

    w.tick();

    // 5 items total: 1 tool, 4 weapons. val(weapon) = 12, val(tool) = 50.
    // A receives the weapon: spread = (12 - 50) / 2 = -19.
    let a = w.agent_by_id(a_id).unwrap();
    let b = w.agent_by_id(b_id).unwrap();
    assert_eq!(a.item, ItemKind::Weapon);
    assert_eq!(b.item, ItemKind::Tool);
    assert_eq!(a.gold, 3 + 19);
    assert_eq!(b.gold, 0); // 3 - 19 clamps at zero
    assert_eq!(w.counters().trade_count, 1);
}

#[test]
fn death_drops_the_held_item_as_a_tile() {
    let mut w = quiet_world(1, 49);
    let id = w.agents()[0].id;
    w.relocate_for_setup(id, 5, 5);
    w.set_genome_for_setup(id, vivarium_core::assemble("yield").unwrap());
    w.give_item_for_setup(id, ItemKind::Tool);
    {
        let a = w.agent_mut_for_setup(id).unwrap();
        a.health = 3;
        a.energy = 0;
    }

    // Starvation damage (5) kills this tick; reaping drops the tool.
    w.tick();

    assert!(w.agent_by_id(id).is_none());
    assert_eq!(w.occ_at(5, 5), 0);
    assert_eq!(w.tile_at(5, 5), Tile::Tool);
}

#[test]
fn death_on_a_forge_preserves_the_forge() {
    let mut w = quiet_world(1, 50);
    let id = w.agents()[0].id;
    w.relocate_for_setup(id, 5, 5);
    w.set_tile(5, 5, Tile::Forge);
    w.set_genome_for_setup(id, vivarium_core::assemble("yield").unwrap());
    w.give_item_for_setup(id, ItemKind::Treasure);
    {
        let a = w.agent_mut_for_setup(id).unwrap();
        a.health = 3;
        a.energy = 0;
    }

    w.tick();

    assert!(w.agent_by_id(id).is_none());
    assert_eq!(w.tile_at(5, 5), Tile::Forge, "forges are permanent");
}

#[test]
fn a_brain_that_exhausts_gas_does_nothing() {
    let mut w = quiet_world(1, 51);
    let id = w.agents()[0].id;
    w.relocate_for_setup(id, 5, 5);
    // Spin forever; Ring1 stays zeroed, so the agent neither moves nor acts.
    let genome = vivarium_core::assemble("top: nop jmp top").unwrap();
    w.set_genome_for_setup(id, genome);

    w.tick();

    let a = w.agent_by_id(id).unwrap();
    assert_eq!((a.x, a.y), (5, 5));
    assert_eq!(a.food_eaten, 0);
    assert_eq!(a.energy, 99, "only metabolic decay applied");
}

#[test]
fn a_crashing_brain_is_absorbed() {
    let mut w = quiet_world(1, 52);
    let id = w.agents()[0].id;
    w.relocate_for_setup(id, 5, 5);
    // Immediate stack underflow; the fault never reaches the caller.
    let genome = vivarium_core::assemble("drop drop yield").unwrap();
    w.set_genome_for_setup(id, genome);

    w.tick();

    let a = w.agent_by_id(id).unwrap();
    assert_eq!((a.x, a.y), (5, 5));
    assert_eq!(w.counters().tick, 1);
}

#[test]
fn teaching_transfers_an_aligned_fragment() {
    let mut w = quiet_world(2, 47);
    let t_id = w.agents()[0].id;
    let s_id = w.agents()[1].id;
    w.relocate_for_setup(t_id, 5, 5);
    w.relocate_for_setup(s_id, 6, 5);
    w.set_genome_for_setup(s_id, vec![0x00; 16]);

    let teach = vivarium_core::assemble(&format!("0 r1! 0 6 r1! 1 {s_id} r1! 2 yield")).unwrap();
    w.set_genome_for_setup(t_id, teach);
    // Pad the teacher's tail with recognizable push-7 literals and make
    // acceptance near-certain on the first attempt.
    {
        let t = w.agent_mut_for_setup(t_id).unwrap();
        let len = t.genome.len();
        for b in &mut t.genome[len - 4..] {
            *b = 0x27;
        }
        t.fitness = 100_000;
    }

    let mut taught = 0;
    for _ in 0..50 {
        w.tick();
        taught = w.agent_by_id(s_id).map(|s| s.taught).unwrap_or(0);
        if taught > 0 {
            break;
        }
    }
    assert!(taught > 0, "transfer never accepted across 50 attempts");
    let s = w.agent_by_id(s_id).unwrap();
    assert_eq!(s.genome.len(), 16);
    assert!(vivarium_core::is_well_formed(&s.genome));
    assert_eq!(w.counters().teach_count as u32, taught);
}
