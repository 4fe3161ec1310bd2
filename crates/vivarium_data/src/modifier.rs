//! Fixed-capacity per-agent effect slots.
//!
//! Each agent carries four modifier slots. A slot with `duration == 0` is
//! empty; `-1` is permanent; positive values count down one per tick.
//! Energy/Health/Stress modifiers apply their magnitude to vitals every
//! tick; the remaining kinds are read at their point of use (gas budget,
//! forage radius, attack/defense arithmetic, trade bonus).

use crate::tile::ItemKind;
use serde::{Deserialize, Serialize};

pub const MOD_SLOTS: usize = 4;

/// Permanent-duration sentinel.
pub const PERMANENT: i16 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModKind {
    Gas,
    Forage,
    Attack,
    Defense,
    Energy,
    Health,
    Stealth,
    Trade,
    Stress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    pub kind: ModKind,
    pub magnitude: i16,
    pub duration: i16,
    pub source: ItemKind,
}

impl Modifier {
    #[must_use]
    pub fn permanent(kind: ModKind, magnitude: i16, source: ItemKind) -> Self {
        Self { kind, magnitude, duration: PERMANENT, source }
    }

    #[must_use]
    pub fn timed(kind: ModKind, magnitude: i16, duration: i16) -> Self {
        Self { kind, magnitude, duration, source: ItemKind::None }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.duration == 0
    }
}

const EMPTY_SLOT: Modifier = Modifier {
    kind: ModKind::Gas,
    magnitude: 0,
    duration: 0,
    source: ItemKind::None,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierSet {
    slots: [Modifier; MOD_SLOTS],
}

impl Default for ModifierSet {
    fn default() -> Self {
        Self { slots: [EMPTY_SLOT; MOD_SLOTS] }
    }
}

impl ModifierSet {
    /// Insert into the first empty slot. When full, evict the non-permanent
    /// slot with the smallest positive duration; if every slot is permanent,
    /// evict slot 0.
    pub fn add(&mut self, m: Modifier) {
        if m.is_empty() {
            return;
        }
        if let Some(slot) = self.slots.iter_mut().find(|s| s.is_empty()) {
            *slot = m;
            return;
        }
        let victim = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.duration > 0)
            .min_by_key(|(_, s)| s.duration)
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.slots[victim] = m;
    }

    /// Sum of magnitudes over non-empty slots of the given kind.
    #[must_use]
    pub fn sum(&self, kind: ModKind) -> i16 {
        self.slots
            .iter()
            .filter(|s| !s.is_empty() && s.kind == kind)
            .map(|s| s.magnitude)
            .sum()
    }

    /// Number of non-empty slots of the given kind, in slot order.
    #[must_use]
    pub fn count(&self, kind: ModKind) -> usize {
        self.slots.iter().filter(|s| !s.is_empty() && s.kind == kind).count()
    }

    /// Clear every slot whose originating item matches `source`.
    pub fn remove_source(&mut self, source: ItemKind) {
        if source == ItemKind::None {
            return;
        }
        for slot in &mut self.slots {
            if !slot.is_empty() && slot.source == source {
                *slot = EMPTY_SLOT;
            }
        }
    }

    /// Decrement every positive duration by one. Permanent slots are skipped.
    pub fn decay(&mut self) {
        for slot in &mut self.slots {
            if slot.duration > 0 {
                slot.duration -= 1;
            }
        }
    }

    pub fn clear(&mut self) {
        self.slots = [EMPTY_SLOT; MOD_SLOTS];
    }

    pub fn active(&self) -> impl Iterator<Item = &Modifier> {
        self.slots.iter().filter(|s| !s.is_empty())
    }

    /// Magnitudes of the given kind in slot order, for diminishing-returns
    /// arithmetic at the point of use.
    #[must_use]
    pub fn magnitudes(&self, kind: ModKind) -> Vec<i16> {
        self.slots
            .iter()
            .filter(|s| !s.is_empty() && s.kind == kind)
            .map(|s| s.magnitude)
            .collect()
    }
}

/// The modifier an item grants while held. Removal happens by source when
/// the item leaves the agent (trade, craft, death).
#[must_use]
pub fn held_modifier(item: ItemKind) -> Option<Modifier> {
    match item {
        ItemKind::Tool => Some(Modifier::permanent(ModKind::Forage, 1, ItemKind::Tool)),
        ItemKind::Weapon => Some(Modifier::permanent(ModKind::Attack, 5, ItemKind::Weapon)),
        ItemKind::Treasure => Some(Modifier::permanent(ModKind::Trade, 2, ItemKind::Treasure)),
        ItemKind::Shield => Some(Modifier::permanent(ModKind::Defense, 5, ItemKind::Shield)),
        ItemKind::Compass => Some(Modifier::permanent(ModKind::Forage, 3, ItemKind::Compass)),
        _ => None,
    }
}
