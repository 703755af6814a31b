//! Boundary types shared with the raw-format reader and the serializer.
//!
//! A `RawArea` is the external, tileset-agnostic description of one area:
//! a rectangle of raw screen ids plus exit, entrance, flag, and spawn
//! records. The engine parses these into live grids and writes them back
//! out; it never touches the binary format itself.

use std::rc::Rc;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::failure::Failure;
use crate::screen::{ConnectionKind, FlagRule};
use crate::types::{AreaId, Pos, ScreenKey};

use super::exits::{AreaRegistry, ExitSpec};
use super::grid::AreaGrid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExit {
    /// Packed source position of the exit tile's screen.
    pub screen: u8,
    /// In-screen tile (Yx nibbles).
    pub tile: u8,
    pub dest_area: u8,
    /// Entrance index on the destination side; `0x20` marks seamless.
    pub dest_entrance: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntrance {
    pub screen: u8,
    /// Sub-tile pixel coordinate (YyXx).
    pub coord: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFlag {
    pub screen: u8,
    pub flag: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSpawn {
    pub screen: u8,
    pub tile: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArea {
    pub id: u8,
    pub tileset: String,
    pub width: u8,
    pub height: u8,
    /// Row-major raw screen ids, `height` rows of `width` columns.
    pub screens: Vec<Vec<u8>>,
    #[serde(default)]
    pub exits: Vec<RawExit>,
    #[serde(default)]
    pub entrances: Vec<RawEntrance>,
    #[serde(default)]
    pub flags: Vec<RawFlag>,
    #[serde(default)]
    pub spawns: Vec<RawSpawn>,
}

/// Marker bit on `dest_entrance` identifying a seamless exit record.
pub(super) const SEAMLESS_ENTRANCE: u8 = 0x20;

impl AreaRegistry {
    /// Parse a session's areas. Area ids must match their position in the
    /// slice, since exit records cross-reference areas by id.
    pub fn from_raw(catalog: Rc<Catalog>, raws: &[RawArea]) -> Result<AreaRegistry, Failure> {
        let mut registry = AreaRegistry::new();
        for (i, raw) in raws.iter().enumerate() {
            if usize::from(raw.id) != i {
                return Err(Failure::of(format!("area id {:02x} out of order (slot {i})", raw.id)));
            }
            let grid = parse_grid(&catalog, AreaId(raw.id), raw)?;
            registry.register(grid);
        }
        // Exits are resolved in a second pass so destination grids exist.
        for raw in raws {
            let id = AreaId(raw.id);
            for exit in &raw.exits {
                if let Some((pos, kind, spec)) = resolve_exit(&registry, id, raw, raws, exit) {
                    registry.area_mut(id).set_exit_one_way(pos, kind, spec);
                }
            }
            infer_entrance0(registry.area_mut(id), raw);
        }
        Ok(registry)
    }
}

fn parse_grid(catalog: &Rc<Catalog>, id: AreaId, raw: &RawArea) -> Result<AreaGrid, Failure> {
    if raw.screens.len() != usize::from(raw.height)
        || raw.screens.iter().any(|row| row.len() != usize::from(raw.width))
    {
        return Err(Failure::of(format!("area {:02x}: screen rows do not match {}x{}", raw.id, raw.height, raw.width)));
    }
    let mut grid = AreaGrid::new(id, Rc::clone(catalog), raw.height, raw.width);
    for (y, row) in raw.screens.iter().enumerate() {
        for (x, &sid) in row.iter().enumerate() {
            let pos = Pos::new(y as u8, x as u8);
            let key = choose_screen(catalog, sid, raw, pos).ok_or_else(|| {
                Failure::of(format!("area {:02x}: no screen for raw id {sid:02x} at {pos}", raw.id))
            })?;
            grid.set(pos, key);
        }
    }
    grid.validate().map_err(|failure| {
        Failure::all(vec![failure], format!("area {:02x}: raw grid is not valid", raw.id))
    })?;
    for flag in &raw.flags {
        let pos = Pos(flag.screen);
        match grid.screen(pos).flag {
            Some(FlagRule::Custom) => grid.set_custom_flag(pos, flag.flag),
            Some(FlagRule::Always) => {}
            None => {
                grid.free_flags.insert(flag.flag);
            }
        }
    }
    Ok(grid)
}

/// Pick among the catalog screens sharing a raw id. Entries differ in flag
/// requirements and wall variants; prefer the one matching whether a flag
/// record actually sits on this position.
fn choose_screen(catalog: &Catalog, sid: u8, raw: &RawArea, pos: Pos) -> Option<ScreenKey> {
    let candidates = catalog.by_sid(sid);
    match candidates {
        [] => None,
        [only] => Some(*only),
        _ => {
            let flagged = raw.flags.iter().any(|f| f.screen == pos.0);
            candidates
                .iter()
                .find(|&&key| {
                    let screen = catalog.screen(key);
                    screen.flag.is_some() == flagged
                })
                .or_else(|| candidates.first())
                .copied()
        }
    }
}

fn resolve_exit(
    registry: &AreaRegistry,
    id: AreaId,
    raw: &RawArea,
    raws: &[RawArea],
    exit: &RawExit,
) -> Option<(Pos, ConnectionKind, ExitSpec)> {
    let src_pos = Pos(exit.screen);
    let src_screen = registry.area(id).screen(src_pos);
    let Some(connection) = src_screen.connection_at_exit_tile(exit.tile) else {
        warn!(
            "unknown exit tile {:02x} on {} in area {:02x} @ {src_pos}",
            exit.tile, src_screen.name, raw.id,
        );
        return None;
    };
    let src_kind = connection.kind;
    if registry.area(id).exit(src_pos, src_kind).is_some() {
        return None; // several hitbox tiles of one connection
    }
    let dest = AreaId(exit.dest_area);
    if let Some(partner) = src_kind.seamless_partner() {
        // A seamless pair straddles one screen: same position, other area.
        return Some((src_pos, src_kind, ExitSpec { area: dest, pos: src_pos, kind: partner }));
    }
    let dest_raw = raws.get(usize::from(exit.dest_area))?;
    let Some(entrance) = dest_raw.entrances.get(usize::from(exit.dest_entrance & 0x1f)) else {
        warn!("bad entrance index {:02x} into area {:02x}", exit.dest_entrance, exit.dest_area);
        return None;
    };
    let dest_pos = Pos(entrance.screen);
    let dest_screen = registry.area(dest).screen(dest_pos);
    let Some(dest_connection) = dest_screen.connection_at_entrance(entrance.coord) else {
        warn!(
            "bad entrance {:04x} on {} in area {:02x} @ {dest_pos}",
            entrance.coord, dest_screen.name, exit.dest_area,
        );
        return None;
    };
    Some((
        src_pos,
        src_kind,
        ExitSpec { area: dest, pos: dest_pos, kind: dest_connection.kind },
    ))
}

/// Remember which connection kind the area's primary entrance uses, so the
/// serializer can put it back at entrance index 0.
fn infer_entrance0(grid: &mut AreaGrid, raw: &RawArea) {
    let Some(first) = raw.entrances.first() else { return };
    let pos = Pos(first.screen);
    let kinds: Vec<ConnectionKind> =
        grid.exits().filter(|(p, _, _)| *p == pos).map(|(_, kind, _)| kind).collect();
    for kind in kinds {
        let Some(connection) = grid.screen(pos).find_connection(kind) else { continue };
        let dy = i32::from(connection.entrance >> 8) - i32::from(first.coord >> 8);
        let dx = i32::from(connection.entrance & 0xff) - i32::from(first.coord & 0xff);
        if dy * dy + dx * dx <= 0x400 {
            grid.entrance0 = Some(kind);
            return;
        }
    }
}
