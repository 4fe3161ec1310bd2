use serde::{Deserialize, Serialize};

/// Terrain type for a single grid cell. Terrain is pure: occupancy lives in
/// a parallel grid and is never packed into the tile byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tile {
    #[default]
    Empty = 0,
    Wall = 1,
    Food = 2,
    Water = 3,
    Tool = 4,
    Weapon = 5,
    Treasure = 6,
    Crystal = 7,
    Forge = 8,
    Poison = 9,
}

impl Tile {
    #[must_use]
    pub fn from_byte(b: u8) -> Tile {
        match b {
            1 => Tile::Wall,
            2 => Tile::Food,
            3 => Tile::Water,
            4 => Tile::Tool,
            5 => Tile::Weapon,
            6 => Tile::Treasure,
            7 => Tile::Crystal,
            8 => Tile::Forge,
            9 => Tile::Poison,
            _ => Tile::Empty,
        }
    }

    /// Tiles counted by the cached item counter.
    #[must_use]
    pub fn is_item(&self) -> bool {
        matches!(self, Tile::Tool | Tile::Weapon | Tile::Treasure | Tile::Crystal)
    }

    /// Item tiles an empty-handed agent picks up by walking onto them.
    /// Crystal is excluded: it is consumed on contact instead.
    #[must_use]
    pub fn pickup_item(&self) -> Option<ItemKind> {
        match self {
            Tile::Tool => Some(ItemKind::Tool),
            Tile::Weapon => Some(ItemKind::Weapon),
            Tile::Treasure => Some(ItemKind::Treasure),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Tile::Empty => ' ',
            Tile::Wall => '█',
            Tile::Food => '·',
            Tile::Water => '≈',
            Tile::Tool => 't',
            Tile::Weapon => 'w',
            Tile::Treasure => '$',
            Tile::Crystal => '◆',
            Tile::Forge => 'Ω',
            Tile::Poison => '☠',
        }
    }
}

/// Item an agent may hold. At most one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ItemKind {
    #[default]
    None = 0,
    FoodPack = 1,
    Tool = 2,
    Weapon = 3,
    Treasure = 4,
    Crystal = 5,
    Shield = 6,
    Compass = 7,
}

impl ItemKind {
    /// Standard items drop back onto the grid when their holder dies.
    #[must_use]
    pub fn drop_tile(&self) -> Option<Tile> {
        match self {
            ItemKind::Tool => Some(Tile::Tool),
            ItemKind::Weapon => Some(Tile::Weapon),
            ItemKind::Treasure => Some(Tile::Treasure),
            _ => None,
        }
    }

    /// Crafting recipe table. Crafting swaps the held item for its product.
    #[must_use]
    pub fn craft_product(&self) -> Option<ItemKind> {
        match self {
            ItemKind::Tool => Some(ItemKind::Compass),
            ItemKind::Weapon => Some(ItemKind::Shield),
            _ => None,
        }
    }
}

/// Cardinal direction, encoded for the Ring0/Ring1 ports:
/// 0 = stay, 1 = N, 2 = E, 3 = S, 4 = W.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    #[default]
    None = 0,
    North = 1,
    East = 2,
    South = 3,
    West = 4,
}

impl Direction {
    #[must_use]
    pub fn from_byte(b: u8) -> Direction {
        match b {
            1 => Direction::North,
            2 => Direction::East,
            3 => Direction::South,
            4 => Direction::West,
            _ => Direction::None,
        }
    }

    /// Unit offset in grid coordinates (y grows southward).
    #[must_use]
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::None => (0, 0),
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    /// Direction from source toward target: the axis with the larger
    /// absolute delta wins, ties go vertical.
    #[must_use]
    pub fn toward(sx: i32, sy: i32, tx: i32, ty: i32) -> Direction {
        let dx = tx - sx;
        let dy = ty - sy;
        if dx == 0 && dy == 0 {
            return Direction::None;
        }
        if dy.abs() >= dx.abs() {
            if dy < 0 {
                Direction::North
            } else {
                Direction::South
            }
        } else if dx > 0 {
            Direction::East
        } else {
            Direction::West
        }
    }
}
