//! Serializer boundary: emit every area back into its external description.

use crate::failure::Failure;
use crate::screen::{Features, FlagRule};
use crate::types::Pos;

use super::exits::AreaRegistry;
use super::raw::{RawArea, RawEntrance, RawExit, RawFlag, SEAMLESS_ENTRANCE};

/// Flag id emitted for screens whose requirement is "always set".
pub const ALWAYS_SET_FLAG: u16 = 0x2f0;

/// Pool of world-state flag ids the serializer may hand out to screens that
/// need one but have none assigned.
pub struct FlagAllocator {
    pool: Vec<u16>,
}

impl FlagAllocator {
    pub fn new(mut pool: Vec<u16>) -> FlagAllocator {
        // Pop from the back; sort descending so low ids go out first.
        pool.sort_unstable_by(|a, b| b.cmp(a));
        FlagAllocator { pool }
    }

    pub fn alloc(&mut self) -> Result<u16, Failure> {
        self.pool.pop().ok_or_else(|| Failure::of("free-flag pool exhausted"))
    }

    pub fn remaining(&self) -> usize {
        self.pool.len()
    }
}

impl AreaRegistry {
    /// Serialize every area: screen-id grids, flag records derived from
    /// each screen's flag rule, and exit records resolved through the
    /// declared connections, finding-or-creating entrance indices on the
    /// destination side.
    pub fn write(&self, flags: &mut FlagAllocator) -> Result<Vec<RawArea>, Failure> {
        let mut out: Vec<RawArea> = self
            .areas()
            .map(|area| RawArea {
                id: area.id().0,
                tileset: area.catalog().name().to_string(),
                width: area.width(),
                height: area.height(),
                screens: (0..area.height())
                    .map(|y| (0..area.width()).map(|x| area.screen(Pos::new(y, x)).sid).collect())
                    .collect(),
                exits: Vec::new(),
                entrances: Vec::new(),
                flags: Vec::new(),
                spawns: Vec::new(),
            })
            .collect();

        // Primary entrances first, so they land at index 0 before exit
        // records start referencing entrance indices.
        for area in self.areas() {
            let Some(kind) = area.entrance0() else { continue };
            let Some((pos, _, _)) = area.exits().find(|(_, k, _)| *k == kind) else { continue };
            let Some(connection) = area.screen(pos).find_connection(kind) else { continue };
            out[usize::from(area.id().0)]
                .entrances
                .push(RawEntrance { screen: pos.0, coord: connection.entrance });
        }

        for area in self.areas() {
            let slot = usize::from(area.id().0);
            let mut free: Vec<u16> = area.free_flags().iter().rev().copied().collect();
            for pos in area.all_pos() {
                let screen = area.screen(pos);
                let flag = if screen.has_feature(Features::WALL)
                    || screen.has_feature(Features::BRIDGE)
                {
                    Some(match free.pop() {
                        Some(id) => id,
                        None => flags.alloc()?,
                    })
                } else {
                    match screen.flag {
                        Some(FlagRule::Always) => Some(ALWAYS_SET_FLAG),
                        Some(FlagRule::Custom) => Some(match area.custom_flag(pos) {
                            Some(id) => id,
                            None => flags.alloc()?,
                        }),
                        None => None,
                    }
                };
                if let Some(flag) = flag {
                    out[slot].flags.push(RawFlag { screen: pos.0, flag });
                }
            }
        }

        for area in self.areas() {
            let slot = usize::from(area.id().0);
            for (pos, kind, spec) in area.exits() {
                let src_screen = area.screen(pos);
                let Some(src_connection) = src_screen.find_connection(kind) else {
                    return Err(Failure::of(format!(
                        "missing source exit: {} has no {kind} at area {:02x} @ {pos}",
                        src_screen.name,
                        area.id().0,
                    )));
                };
                let dest_entrance = if kind.is_seamless() {
                    SEAMLESS_ENTRANCE
                } else {
                    let dest_screen = self.area(spec.area).screen(spec.pos);
                    let Some(dest_connection) = dest_screen.find_connection(spec.kind) else {
                        return Err(Failure::of(format!(
                            "missing dest exit: {} has no {} at area {:02x} @ {}",
                            dest_screen.name,
                            spec.kind,
                            spec.area.0,
                            spec.pos,
                        )));
                    };
                    let entrance =
                        RawEntrance { screen: spec.pos.0, coord: dest_connection.entrance };
                    let dest_slot = usize::from(spec.area.0);
                    let index = match out[dest_slot].entrances.iter().position(|e| *e == entrance) {
                        Some(index) => index,
                        None => {
                            out[dest_slot].entrances.push(entrance);
                            out[dest_slot].entrances.len() - 1
                        }
                    };
                    index as u8
                };
                for &tile in &src_connection.exits {
                    // Bottom-edge hitboxes spill onto the screen beneath.
                    let (screen, tile) = if tile & 0xf0 == 0xf0 {
                        (pos.0 + 0x10, tile & 0xf)
                    } else {
                        (pos.0, tile)
                    };
                    out[slot].exits.push(RawExit {
                        screen,
                        tile,
                        dest_area: spec.area.0,
                        dest_entrance,
                    });
                }
            }
        }

        Ok(out)
    }
}
