use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    pub struct ScreenKey;
}

/// Index of an area inside the [`AreaRegistry`](crate::AreaRegistry).
///
/// Areas are registered once and never removed, so the index is stable for
/// the whole session and small enough to embed in exit records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaId(pub u8);

/// Packed grid coordinate: `(row << 4) | col`.
///
/// Rows count interior rows only; the grid's backing array keeps one empty
/// sentinel row above and below, so neighbor lookups from any interior `Pos`
/// stay in bounds without branching.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pos(pub u8);

impl Pos {
    pub fn new(y: u8, x: u8) -> Self {
        debug_assert!(x < 16);
        Pos(y << 4 | x)
    }

    pub fn y(self) -> u8 {
        self.0 >> 4
    }

    pub fn x(self) -> u8 {
        self.0 & 0xf
    }

    /// Neighbor coordinate, or `None` when the step leaves the representable
    /// 16x16 coordinate square (the grid itself does border checks through
    /// its sentinel ring instead).
    pub fn step(self, dir: Dir) -> Option<Pos> {
        match dir {
            Dir::North => self.0.checked_sub(16).map(Pos),
            Dir::West => {
                if self.x() == 0 {
                    None
                } else {
                    Some(Pos(self.0 - 1))
                }
            }
            Dir::South => {
                if self.y() == 15 {
                    None
                } else {
                    Some(Pos(self.0 + 16))
                }
            }
            Dir::East => {
                if self.x() == 15 {
                    None
                } else {
                    Some(Pos(self.0 + 1))
                }
            }
        }
    }
}

impl fmt::Debug for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({:02x})", self.0)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

/// Grid direction, ordered to match edge-signature slots (top, left,
/// bottom, right).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dir {
    North = 0,
    West = 1,
    South = 2,
    East = 3,
}

impl Dir {
    pub const ALL: [Dir; 4] = [Dir::North, Dir::West, Dir::South, Dir::East];

    pub fn opposite(self) -> Dir {
        match self {
            Dir::North => Dir::South,
            Dir::West => Dir::East,
            Dir::South => Dir::North,
            Dir::East => Dir::West,
        }
    }

    /// Offset within the 16-column backing array.
    pub fn delta(self) -> isize {
        match self {
            Dir::North => -16,
            Dir::West => -1,
            Dir::South => 16,
            Dir::East => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dir::North => "above",
            Dir::West => "left of",
            Dir::South => "below",
            Dir::East => "right of",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos_packs_row_and_column() {
        let pos = Pos::new(3, 7);
        assert_eq!(pos.0, 0x37);
        assert_eq!(pos.y(), 3);
        assert_eq!(pos.x(), 7);
    }

    #[test]
    fn step_stops_at_coordinate_boundaries() {
        assert_eq!(Pos::new(0, 4).step(Dir::North), None);
        assert_eq!(Pos::new(2, 0).step(Dir::West), None);
        assert_eq!(Pos::new(2, 4).step(Dir::South), Some(Pos::new(3, 4)));
        assert_eq!(Pos::new(2, 4).step(Dir::East), Some(Pos::new(2, 5)));
    }

    #[test]
    fn opposite_pairs_up_directions() {
        for dir in Dir::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
        }
        assert_eq!(Dir::North.opposite(), Dir::South);
        assert_eq!(Dir::West.opposite(), Dir::East);
    }
}
