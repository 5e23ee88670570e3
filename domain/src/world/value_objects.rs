//! World value objects - positions, block coordinates and resource tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A continuous position in the world (entity feet position).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Position {
        Position::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The block cell containing this position.
    pub fn block(&self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> BlockPos {
        BlockPos::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Center of the block cell at its floor level.
    pub fn center(&self) -> Position {
        Position::new(self.x as f64 + 0.5, self.y as f64, self.z as f64 + 0.5)
    }

    /// Chebyshev distance, the radius metric used for neighbourhood scans.
    pub fn chebyshev(&self, other: &BlockPos) -> i32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }

    /// The 26 cells surrounding this one.
    pub fn neighbors(&self) -> impl Iterator<Item = BlockPos> + '_ {
        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).filter_map(move |dz| {
                    if dx == 0 && dy == 0 && dz == 0 {
                        None
                    } else {
                        Some(self.offset(dx, dy, dz))
                    }
                })
            })
        })
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

/// Face of a reference block against which a new block is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Face {
    Up,
    Down,
    North,
    South,
    East,
    West,
}

impl Face {
    /// Unit offset from the reference block to the placed block.
    pub fn vector(&self) -> (i32, i32, i32) {
        match self {
            Face::Up => (0, 1, 0),
            Face::Down => (0, -1, 0),
            Face::North => (0, 0, -1),
            Face::South => (0, 0, 1),
            Face::East => (1, 0, 0),
            Face::West => (-1, 0, 0),
        }
    }

    /// Cell that a placement against `reference` on this face fills.
    pub fn target_of(&self, reference: BlockPos) -> BlockPos {
        let (dx, dy, dz) = self.vector();
        reference.offset(dx, dy, dz)
    }
}

/// Identifier for an item/block type (e.g. `oak_log`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceTag(String);

impl ResourceTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceTag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for ResourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A placed block in the world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    pub position: BlockPos,
    pub kind: ResourceTag,
}

impl Block {
    pub fn new(position: BlockPos, kind: impl Into<ResourceTag>) -> Self {
        Self {
            position,
            kind: kind.into(),
        }
    }

    pub fn is(&self, kind: &ResourceTag) -> bool {
        &self.kind == kind
    }
}

/// An item entity lying on the ground.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedItem {
    pub id: u64,
    pub resource: ResourceTag,
    pub count: u32,
    pub position: Position,
}
