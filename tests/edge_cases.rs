//! Boundary behaviors: tiny populations, board corners, constructor
//! rejection, and option edge values.

use vivarium_core::config::WorldOptions;
use vivarium_core::world::World;
use vivarium_core::WorldError;

#[test]
fn lone_agent_survives_ticks() {
    let mut w = World::new(WorldOptions {
        n_agents: 1,
        world_size: 16,
        seed: 3,
        ..Default::default()
    })
    .unwrap();
    for _ in 0..300 {
        w.tick();
    }
    assert_eq!(w.counters().tick, 300);
}

#[test]
fn corner_agent_is_walled_in() {
    let mut w = World::new(WorldOptions {
        n_agents: 1,
        world_size: 16,
        seed: 4,
        max_food: Some(0),
        food_rate: Some(0.0),
        max_items: Some(0),
        item_rate: Some(0.0),
        ..Default::default()
    })
    .unwrap();
    let id = w.agents()[0].id;
    w.relocate_for_setup(id, 0, 0);
    // March north forever; the border is solid.
    let genome = vivarium_core::assemble("1 r1! 0 yield").unwrap();
    w.set_genome_for_setup(id, genome);
    w.tick();
    let a = w.agent_by_id(id).unwrap();
    assert_eq!((a.x, a.y), (0, 0));

    // And west likewise.
    let genome = vivarium_core::assemble("4 r1! 0 yield").unwrap();
    w.set_genome_for_setup(id, genome);
    w.tick();
    let a = w.agent_by_id(id).unwrap();
    assert_eq!((a.x, a.y), (0, 0));
}

#[test]
fn zero_population_is_an_invalid_argument() {
    let err = World::new(WorldOptions { n_agents: 0, ..Default::default() });
    assert!(matches!(err, Err(WorldError::InvalidArgument(_))));
}

#[test]
fn overfull_world_is_rejected() {
    let err = World::new(WorldOptions {
        n_agents: 100,
        world_size: 8,
        ..Default::default()
    });
    assert!(matches!(err, Err(WorldError::InvalidArgument(_))));
}

#[test]
fn auto_sizing_accommodates_large_populations() {
    let w = World::new(WorldOptions {
        n_agents: 500,
        world_size: 0,
        seed: 1,
        ..Default::default()
    })
    .unwrap();
    // floor(sqrt(500)) * 4 = 88
    assert_eq!(w.size(), 88);
    assert_eq!(w.agents().len(), 500);
}

#[test]
fn evolution_disabled_never_replaces() {
    let mut w = World::new(WorldOptions {
        n_agents: 8,
        world_size: 16,
        seed: 9,
        evolve_every: 0,
        ..Default::default()
    })
    .unwrap();
    let ids: Vec<u16> = w.agents().iter().map(|a| a.id).collect();
    for _ in 0..150 {
        w.tick();
    }
    // Agents may die, but nobody was replaced with a fresh id.
    for a in w.agents() {
        assert!(ids.contains(&a.id));
    }
}

#[test]
fn counters_start_clean() {
    let w = World::new(WorldOptions {
        n_agents: 2,
        world_size: 16,
        seed: 11,
        max_food: Some(0),
        max_items: Some(0),
        ..Default::default()
    })
    .unwrap();
    let c = w.counters();
    assert_eq!(c.tick, 0);
    assert_eq!(c.food_count, 0);
    assert_eq!(c.trade_count, 0);
    assert_eq!(c.teach_count, 0);
}
