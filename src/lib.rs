//! Vivarium: an evolving-agent simulation kernel.
//!
//! Thin facade over the workspace crates; the simulation itself lives in
//! [`vivarium_core`], its plain data types in [`vivarium_data`].

pub use vivarium_core::{assemble, disassemble, World, WorldOptions};
pub use vivarium_data::{Agent, Counters, Direction, ItemKind, Modifier, Tile};
