//! Tile storage, the parallel occupancy grid, and bounded spatial queries.
//!
//! Two linear row-major buffers of length `size * size`: terrain bytes and
//! 16-bit occupancy words (0 = unoccupied). Cached food/item counts are
//! maintained incrementally by `set_tile` and always equal a full recount.
//! Out-of-bounds reads return `Wall` terrain and occupancy 0, which is what
//! makes the world border solid without storing border cells.

use serde::{Deserialize, Serialize};
use vivarium_data::{Direction, Tile};

/// Nearest-X searches walk rings 0, 1, 2, … up to this distance; a result
/// of `RING_CAP` means "none found".
pub const RING_CAP: i16 = 31;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldGrid {
    size: usize,
    tiles: Vec<Tile>,
    occ: Vec<u16>,
    /// Cached tile counts indexed by tile byte; food/item counters derive
    /// from this and always equal a full recount.
    tile_counts: [u32; 10],
}

impl WorldGrid {
    #[must_use]
    pub fn new(size: usize) -> Self {
        let mut tile_counts = [0; 10];
        tile_counts[Tile::Empty as usize] = (size * size) as u32;
        Self {
            size,
            tiles: vec![Tile::Empty; size * size],
            occ: vec![0; size * size],
            tile_counts,
        }
    }

    /// `max(32, floor(sqrt(n)) * 4)`, used when the caller does not pin a
    /// world size.
    #[must_use]
    pub fn auto_size(n_agents: usize) -> usize {
        let root = (n_agents as f64).sqrt().floor() as usize;
        (root * 4).max(32)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline(always)]
    fn index(&self, x: usize, y: usize) -> usize {
        y * self.size + x
    }

    #[must_use]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.size && (y as usize) < self.size
    }

    #[must_use]
    pub fn tile_at(&self, x: i32, y: i32) -> Tile {
        if self.in_bounds(x, y) {
            self.tiles[self.index(x as usize, y as usize)]
        } else {
            Tile::Wall
        }
    }

    #[must_use]
    pub fn occ_at(&self, x: i32, y: i32) -> u16 {
        if self.in_bounds(x, y) {
            self.occ[self.index(x as usize, y as usize)]
        } else {
            0
        }
    }

    /// Write a tile, updating the cached counts by diffing the old and new
    /// types. Out-of-bounds writes are ignored.
    pub fn set_tile(&mut self, x: i32, y: i32, t: Tile) {
        if !self.in_bounds(x, y) {
            return;
        }
        let idx = self.index(x as usize, y as usize);
        let old = self.tiles[idx];
        self.tile_counts[old as usize] -= 1;
        self.tile_counts[t as usize] += 1;
        self.tiles[idx] = t;
    }

    pub fn set_occ(&mut self, x: i32, y: i32, id: u16) {
        if self.in_bounds(x, y) {
            let idx = self.index(x as usize, y as usize);
            self.occ[idx] = id;
        }
    }

    pub fn clear_occ(&mut self, x: i32, y: i32) {
        self.set_occ(x, y, 0);
    }

    #[must_use]
    pub fn tile_count(&self, t: Tile) -> u32 {
        self.tile_counts[t as usize]
    }

    #[must_use]
    pub fn food_count(&self) -> u32 {
        self.tile_counts[Tile::Food as usize]
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.tile_counts[Tile::Tool as usize]
            + self.tile_counts[Tile::Weapon as usize]
            + self.tile_counts[Tile::Treasure as usize]
            + self.tile_counts[Tile::Crystal as usize]
    }

    /// Full-grid recount of the cached counters, for invariant checks.
    #[must_use]
    pub fn recount(&self) -> (u32, u32) {
        let food = self.tiles.iter().filter(|t| **t == Tile::Food).count() as u32;
        let items = self.tiles.iter().filter(|t| t.is_item()).count() as u32;
        (food, items)
    }

    /// Visit the exact perimeter of the Manhattan diamond at distance `d`
    /// (the four edges, corners visited once) and return the first cell
    /// satisfying `pred`. `d == 0` visits only the center.
    pub fn scan_ring<F>(&self, cx: i32, cy: i32, d: i32, mut pred: F) -> Option<(i32, i32)>
    where
        F: FnMut(&Self, i32, i32) -> bool,
    {
        if d == 0 {
            return pred(self, cx, cy).then_some((cx, cy));
        }
        for i in 0..d {
            let candidates = [
                (cx + i, cy - d + i),
                (cx + d - i, cy + i),
                (cx - i, cy + d - i),
                (cx - d + i, cy - i),
            ];
            for (x, y) in candidates {
                if pred(self, x, y) {
                    return Some((x, y));
                }
            }
        }
        None
    }

    /// Walk rings outward from distance 0 up to `cap` and return
    /// `(distance, x, y)` of the first matching cell.
    pub fn nearest_where<F>(&self, cx: i32, cy: i32, cap: i16, mut pred: F) -> Option<(i16, i32, i32)>
    where
        F: FnMut(&Self, i32, i32) -> bool,
    {
        for d in 0..=cap {
            if let Some((x, y)) = self.scan_ring(cx, cy, d as i32, &mut pred) {
                return Some((d, x, y));
            }
        }
        None
    }

    /// Nearest tile of the given type: `(distance, direction)`, with
    /// `(RING_CAP, None)` when nothing is found within the cap.
    #[must_use]
    pub fn nearest_tile(&self, cx: i32, cy: i32, t: Tile) -> (i16, Direction) {
        match self.nearest_where(cx, cy, RING_CAP, |g, x, y| g.tile_at(x, y) == t) {
            Some((d, x, y)) => (d, Direction::toward(cx, cy, x, y)),
            None => (RING_CAP, Direction::None),
        }
    }

    /// Nearest item tile (tool/weapon/treasure/crystal).
    #[must_use]
    pub fn nearest_item(&self, cx: i32, cy: i32) -> (i16, Direction) {
        match self.nearest_where(cx, cy, RING_CAP, |g, x, y| g.tile_at(x, y).is_item()) {
            Some((d, x, y)) => (d, Direction::toward(cx, cy, x, y)),
            None => (RING_CAP, Direction::None),
        }
    }

    /// Nearest occupied cell excluding `exclude`, in a single outward walk:
    /// `(distance, id, direction)`; `(RING_CAP, 0, None)` when alone.
    #[must_use]
    pub fn nearest_npc_full(&self, cx: i32, cy: i32, exclude: u16) -> (i16, u16, Direction) {
        let hit = self.nearest_where(cx, cy, RING_CAP, |g, x, y| {
            let id = g.occ_at(x, y);
            id != 0 && id != exclude
        });
        match hit {
            Some((d, x, y)) => (d, self.occ_at(x, y), Direction::toward(cx, cy, x, y)),
            None => (RING_CAP, 0, Direction::None),
        }
    }
}
