//! # Vivarium Core
//!
//! The simulation kernel for Vivarium, an evolving-agent world in which
//! each agent's behavior is a byte-array genome executed every tick on a
//! small stack virtual machine.
//!
//! Three coupled subsystems:
//! - A concatenative bytecode VM with a tagged value stack, gas-metered
//!   execution, and memory-mapped sensor/action banks (Ring0/Ring1).
//! - A tick scheduler that materializes sensors, runs each genome, and
//!   turns Ring1 writes into world effects (movement, eating, trading,
//!   crafting, teaching, combat) plus derived world state.
//! - A genetic algorithm (tournament selection, instruction-aligned
//!   crossover, six mutation operators) and horizontal memetic transfer,
//!   both operating on the same bytes the VM executes.
//!
//! The kernel is strictly single-threaded and deterministic: a seed plus
//! an identical call sequence reproduces byte-identical state.
//!
//! ## Example
//!
//! ```
//! use vivarium_core::config::WorldOptions;
//! use vivarium_core::world::World;
//!
//! let mut world = World::new(WorldOptions {
//!     n_agents: 8,
//!     seed: 42,
//!     ..Default::default()
//! })
//! .unwrap();
//! for _ in 0..100 {
//!     world.tick();
//! }
//! assert_eq!(world.counters().tick, 100);
//! ```

/// Ring1 readout and world effects per agent
pub mod act;
/// Textual assembler / disassembler for seed genomes and tests
pub mod asm;
/// World construction options
pub mod config;
/// Genetic algorithm over byte genomes
pub mod evolve;
/// Tile grid, occupancy, and bounded ring search
pub mod grid;
/// Horizontal (memetic) genome transfer
pub mod meme;
/// Opcode set, instruction sizing, weighted emission
pub mod opcode;
/// Deterministic world-level RNG
pub mod rng;
/// Seed genomes for the initial population
pub mod seeds;
/// Ring0 sensor materialization
pub mod sense;
/// Aggregate population statistics
pub mod stats;
/// The stack virtual machine
pub mod vm;
/// The world and its tick scheduler
pub mod world;

pub use asm::{assemble, disassemble, AsmError};
pub use config::{ConfigError, WorldOptions};
pub use opcode::{is_well_formed, opcode_size};
pub use vm::{Vm, VmError};
pub use world::{World, WorldError};
