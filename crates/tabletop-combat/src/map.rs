//! The battle grid: coordinates, tiles, and who stands where.
//!
//! The map is authored elsewhere (the DM's editor) and handed to the
//! engine. The engine only reads tiles and writes their `occupant` field.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A grid position, `(row, col)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub row: i32,
    pub col: i32,
}

impl Coord {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Grid-step distance: `|dr| + |dc|`.
    pub fn manhattan(self, other: Coord) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl From<(i32, i32)> for Coord {
    fn from((row, col): (i32, i32)) -> Self {
        Self { row, col }
    }
}

/// One square of the map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    #[serde(default)]
    pub terrain: String,
    #[serde(default)]
    pub occupant: Option<String>,
}

/// The grid, keyed by coordinate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PlacedTile>", into = "Vec<PlacedTile>")]
pub struct BattleMap {
    tiles: BTreeMap<Coord, Tile>,
}

impl BattleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `rows × cols` map of plain floor.
    pub fn rectangle(rows: i32, cols: i32) -> Self {
        let tiles = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| Coord::new(r, c)))
            .map(|coord| {
                (
                    coord,
                    Tile {
                        terrain: "floor".into(),
                        occupant: None,
                    },
                )
            })
            .collect();
        Self { tiles }
    }

    pub fn insert(&mut self, coord: Coord, tile: Tile) {
        self.tiles.insert(coord, tile);
    }

    pub fn tile(&self, coord: Coord) -> Option<&Tile> {
        self.tiles.get(&coord)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Finds the tile `name` is standing on.
    pub fn locate(&self, name: &str) -> Option<Coord> {
        self.tiles
            .iter()
            .find(|(_, t)| t.occupant.as_deref() == Some(name))
            .map(|(c, _)| *c)
    }

    /// Puts `name` on `coord`, removing it from wherever it was.
    ///
    /// Returns `false` (and changes nothing) if the tile doesn't exist.
    pub fn place(&mut self, name: &str, coord: Coord) -> bool {
        if !self.tiles.contains_key(&coord) {
            return false;
        }
        self.clear_occupant(name);
        if let Some(tile) = self.tiles.get_mut(&coord) {
            tile.occupant = Some(name.to_string());
        }
        true
    }

    /// Clears every tile occupied by `name`. Returns how many were cleared.
    pub fn clear_occupant(&mut self, name: &str) -> usize {
        let mut cleared = 0;
        for tile in self.tiles.values_mut() {
            if tile.occupant.as_deref() == Some(name) {
                tile.occupant = None;
                cleared += 1;
            }
        }
        cleared
    }

    /// Every occupied tile, in coordinate order.
    pub fn occupants(&self) -> impl Iterator<Item = (Coord, &str)> {
        self.tiles
            .iter()
            .filter_map(|(c, t)| t.occupant.as_deref().map(|o| (*c, o)))
    }
}

/// Flat tile record used on the wire (`MAP_DATA`) and in saves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedTile {
    pub row: i32,
    pub col: i32,
    #[serde(flatten)]
    pub tile: Tile,
}

impl From<Vec<PlacedTile>> for BattleMap {
    fn from(tiles: Vec<PlacedTile>) -> Self {
        Self {
            tiles: tiles
                .into_iter()
                .map(|p| (Coord::new(p.row, p.col), p.tile))
                .collect(),
        }
    }
}

impl From<BattleMap> for Vec<PlacedTile> {
    fn from(map: BattleMap) -> Self {
        map.tiles
            .into_iter()
            .map(|(c, tile)| PlacedTile {
                row: c.row,
                col: c.col,
                tile,
            })
            .collect()
    }
}
