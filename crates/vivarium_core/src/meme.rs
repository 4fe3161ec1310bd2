//! Horizontal (memetic) transmission between adjacent agents.
//!
//! A successful Teach action copies a 4-byte instruction-aligned fragment
//! from the teacher's genome over the student's, without changing the
//! student's length. Acceptance is fitness-weighted; a rejected transfer
//! leaves the student untouched.

use crate::opcode::{self, OP_NOP};
use rand::Rng;
use vivarium_data::Agent;

pub const FRAGMENT_LEN: usize = 4;

/// Attempt a memetic transfer. Returns whether the student accepted.
///
/// Acceptance probability is `(tf + 1) / (tf + sf + 2)` with fitnesses
/// floored at zero; the draw comes from the world PRNG stream.
pub fn transfer<R: Rng>(teacher: &mut Agent, student: &mut Agent, rng: &mut R) -> bool {
    let t_bounds = opcode::boundaries(&teacher.genome);
    if t_bounds.is_empty() || student.genome.is_empty() {
        return false;
    }

    let tf = teacher.fitness.max(0) as f64;
    let sf = student.fitness.max(0) as f64;
    let p = (tf + 1.0) / (tf + sf + 2.0);
    if rng.gen::<f64>() >= p {
        return false;
    }

    let start = t_bounds[rng.gen_range(0..t_bounds.len())];
    let end = (start + FRAGMENT_LEN).min(teacher.genome.len());
    let fragment: Vec<u8> = teacher.genome[start..end].to_vec();

    let s_bounds = opcode::boundaries(&student.genome);
    if s_bounds.is_empty() {
        return false;
    }
    let at = s_bounds[rng.gen_range(0..s_bounds.len())];
    let writable = fragment.len().min(student.genome.len() - at);
    student.genome[at..at + writable].copy_from_slice(&fragment[..writable]);
    repair_tail(&mut student.genome);

    student.taught += 1;
    teacher.teach_count += 1;
    teacher.award_fitness(10);
    teacher.add_stress(-3);
    true
}

/// Re-walk the genome after an overwrite; if decoding would run past the
/// buffer end, nop out everything from the last in-bounds boundary. Length
/// never changes.
fn repair_tail(genome: &mut [u8]) {
    let mut pos = 0;
    while pos < genome.len() {
        match opcode::opcode_size(genome, pos) {
            Some(size) if pos + size <= genome.len() => pos += size,
            _ => {
                for b in &mut genome[pos..] {
                    *b = OP_NOP;
                }
                return;
            }
        }
    }
}
