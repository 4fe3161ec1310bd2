//! Seed genomes for the initial population.
//!
//! The forager and random-walker byte sequences are normative and pinned
//! byte-for-byte; the remaining roles are authored in the assembler. All
//! seeds are nop-padded up to the genome length minimum at spawn time.

use crate::asm;
use crate::opcode::{self, OP_NOP};
use rand::Rng;
use vivarium_data::agent::{GENOME_MAX, GENOME_MIN};

/// Read the food direction sensor, move that way, eat.
pub const FORAGER: [u8; 8] = [0x8A, 0x0D, 0x8C, 0x00, 0x21, 0x8C, 0x01, 0xF1];

/// The forager is also published with a trailing redundant yield; both
/// spellings are accepted and behave identically.
pub const FORAGER_LONG: [u8; 9] = [0x8A, 0x0D, 0x8C, 0x00, 0x21, 0x8C, 0x01, 0xF1, 0xF1];

/// Derive a move direction from the tick sensor, then eat.
pub const WALKER: [u8; 12] =
    [0x8A, 0x0A, 0x24, 0x0A, 0x21, 0x06, 0x8C, 0x00, 0x21, 0x8C, 0x01, 0xF1];

const TRADER_SRC: &str = "
    r0@ 16  r1! 0       ; close in on the nearest agent
    4       r1! 1       ; offer a trade
    r0@ 15  r1! 2       ; at them
    yield
";

const CRAFTER_SRC: &str = "
    r0@ 7               ; holding anything?
    jnz have
    r0@ 18  r1! 0       ; chase the nearest item tile
    jmp fin
    have:
    r0@ 22  r1! 0       ; head for a forge
    5  r1! 1            ; craft
    fin:
    yield
";

const TEACHER_SRC: &str = "
    r0@ 16  r1! 0       ; close in on the nearest agent
    6       r1! 1       ; teach
    r0@ 15  r1! 2       ; them
    yield
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedRole {
    Forager,
    Walker,
    Trader,
    Crafter,
    Teacher,
}

/// Pad with nop up to the genome minimum. Genomes above the maximum are
/// a construction error and are debug-asserted against.
#[must_use]
pub fn pad_genome(mut genome: Vec<u8>) -> Vec<u8> {
    while genome.len() < GENOME_MIN {
        genome.push(OP_NOP);
    }
    debug_assert!(genome.len() <= GENOME_MAX);
    debug_assert!(opcode::is_well_formed(&genome));
    genome
}

#[must_use]
pub fn seed_genome(role: SeedRole) -> Vec<u8> {
    let bytes = match role {
        SeedRole::Forager => FORAGER.to_vec(),
        SeedRole::Walker => WALKER.to_vec(),
        SeedRole::Trader => asm::assemble(TRADER_SRC).expect("trader seed assembles"),
        SeedRole::Crafter => asm::assemble(CRAFTER_SRC).expect("crafter seed assembles"),
        SeedRole::Teacher => asm::assemble(TEACHER_SRC).expect("teacher seed assembles"),
    };
    pad_genome(bytes)
}

/// Weighted-random genome for the unseeded remainder of the population.
#[must_use]
pub fn random_seed<R: Rng>(rng: &mut R) -> Vec<u8> {
    let instructions = rng.gen_range(8..=24);
    opcode::random_genome(rng, instructions, GENOME_MIN, GENOME_MAX)
}
