//! Cross-area exit linkage.
//!
//! Every exit is co-owned by two areas, so all linkage operations go through
//! the registry that owns every area, taking explicit indices for both
//! sides. Invariant: a non-seamless entry `(pos, kind) -> spec` in one area
//! has a reciprocal entry in `spec.area` pointing back. The operations here
//! preserve that invariant procedurally; nothing enforces it structurally.

use std::rc::Rc;

use crate::catalog::Catalog;
use crate::failure::{Check, Failure};
use crate::screen::ConnectionKind;
use crate::types::{AreaId, Pos, ScreenKey};

use super::grid::AreaGrid;
use super::raw::RawArea;

/// Far end of an exit: which area, which position, which connection kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExitSpec {
    pub area: AreaId,
    pub pos: Pos,
    pub kind: ConnectionKind,
}

/// One re-key in a `move_exits` batch.
#[derive(Clone, Copy, Debug)]
pub struct ExitMove {
    pub old_pos: Pos,
    pub old_kind: ConnectionKind,
    pub new_pos: Pos,
    pub new_kind: ConnectionKind,
}

impl AreaGrid {
    pub fn exit(&self, pos: Pos, kind: ConnectionKind) -> Option<&ExitSpec> {
        self.exits.get(&(pos, kind))
    }

    pub fn exits(&self) -> impl Iterator<Item = (Pos, ConnectionKind, &ExitSpec)> {
        self.exits.iter().map(|(&(pos, kind), spec)| (pos, kind, spec))
    }

    /// One-way write into this area's table. Callers are responsible for
    /// the reciprocal entry; prefer the registry operations.
    pub fn set_exit_one_way(&mut self, pos: Pos, kind: ConnectionKind, spec: ExitSpec) {
        self.exits.insert((pos, kind), spec);
    }

    pub fn delete_exit(&mut self, pos: Pos, kind: ConnectionKind) {
        self.exits.remove(&(pos, kind));
    }

    /// Exit kinds present at a position.
    pub fn exit_kinds_at(&self, pos: Pos) -> Vec<ConnectionKind> {
        self.exits.keys().filter(|(p, _)| *p == pos).map(|&(_, kind)| kind).collect()
    }

    /// Infer the connection kind at a position: from the exit table first,
    /// then from the occupying screen's declared connections. More than one
    /// untyped candidate is a hard failure.
    pub fn pick_kind(&self, pos: Pos) -> Result<ConnectionKind, Failure> {
        let from_exits = self.exit_kinds_at(pos);
        match from_exits.as_slice() {
            [kind] => return Ok(*kind),
            [] => {}
            kinds => {
                return Err(Failure::of(format!(
                    "no single exit kind at {pos}: {}",
                    join_kinds(kinds),
                )));
            }
        }
        let declared: Vec<ConnectionKind> =
            self.screen(pos).connections.iter().map(|c| c.kind).collect();
        match declared.as_slice() {
            [kind] => Ok(*kind),
            kinds => Err(Failure::of(format!(
                "no single connection kind on {} at {pos}: {}",
                self.screen(pos).name,
                join_kinds(kinds),
            ))),
        }
    }
}

fn join_kinds(kinds: &[ConnectionKind]) -> String {
    let names: Vec<String> = kinds.iter().map(ConnectionKind::to_string).collect();
    format!("[{}]", names.join(", "))
}

/// Arena owning every area of a session by stable index. All cross-area
/// operations live here and take the indices of both sides explicitly.
#[derive(Default)]
pub struct AreaRegistry {
    areas: Vec<AreaGrid>,
}

impl AreaRegistry {
    pub fn new() -> AreaRegistry {
        AreaRegistry::default()
    }

    /// Next id that `register` will accept.
    pub fn next_id(&self) -> AreaId {
        AreaId(self.areas.len() as u8)
    }

    /// Register a parsed or freshly-built area. The grid's id must match
    /// its slot; a mismatch is an engine bug, not a driver mistake.
    pub fn register(&mut self, area: AreaGrid) -> AreaId {
        let id = self.next_id();
        assert_eq!(area.id(), id, "area registered out of order");
        self.areas.push(area);
        id
    }

    pub fn create(&mut self, catalog: Rc<Catalog>, height: u8, width: u8) -> AreaId {
        let id = self.next_id();
        self.areas.push(AreaGrid::new(id, catalog, height, width));
        id
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn area(&self, id: AreaId) -> &AreaGrid {
        &self.areas[usize::from(id.0)]
    }

    pub fn area_mut(&mut self, id: AreaId) -> &mut AreaGrid {
        &mut self.areas[usize::from(id.0)]
    }

    pub fn areas(&self) -> impl Iterator<Item = &AreaGrid> {
        self.areas.iter()
    }

    /// Attach an exit/entrance pair in both directions.
    ///
    /// If either endpoint already had a different exit, the previous far
    /// ends of both old links are re-linked to each other, so rewiring one
    /// edge of a two-edge swap does not orphan the other edge. A single
    /// stale one-sided link is deleted instead of resurrected.
    pub fn attach(
        &mut self,
        src: AreaId,
        src_pos: Pos,
        dest: AreaId,
        dest_pos: Pos,
        src_kind: Option<ConnectionKind>,
        dest_kind: Option<ConnectionKind>,
    ) -> Check {
        let src_kind = match src_kind {
            Some(kind) => kind,
            None => self.area(src).pick_kind(src_pos)?,
        };
        let dest_kind = match dest_kind {
            Some(kind) => kind,
            None => self.area(dest).pick_kind(dest_pos)?,
        };
        let src_spec = ExitSpec { area: src, pos: src_pos, kind: src_kind };
        let dest_spec = ExitSpec { area: dest, pos: dest_pos, kind: dest_kind };
        let prev_dest = self.area(src).exit(src_pos, src_kind).copied();
        let prev_src = self.area(dest).exit(dest_pos, dest_kind).copied();
        if prev_dest == Some(dest_spec) && prev_src == Some(src_spec) {
            return Ok(()); // already linked exactly like this
        }
        self.area_mut(src).set_exit_one_way(src_pos, src_kind, dest_spec);
        self.area_mut(dest).set_exit_one_way(dest_pos, dest_kind, src_spec);
        match (prev_src, prev_dest) {
            (Some(prev_src), Some(prev_dest)) => {
                self.area_mut(prev_src.area).set_exit_one_way(
                    prev_src.pos,
                    prev_src.kind,
                    prev_dest,
                );
                self.area_mut(prev_dest.area).set_exit_one_way(
                    prev_dest.pos,
                    prev_dest.kind,
                    prev_src,
                );
            }
            (Some(stale), None) | (None, Some(stale)) => {
                // Keep the reverse half of a deliberate one-way patch.
                if stale != src_spec && stale != dest_spec {
                    self.area_mut(stale.area).delete_exit(stale.pos, stale.kind);
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// Convenience for joining two known exit specs directly.
    pub fn connect(&mut self, a: ExitSpec, b: ExitSpec) -> Check {
        self.attach(a.area, a.pos, b.area, b.pos, Some(a.kind), Some(b.kind))
    }

    /// Batch re-key of one area's exit entries. Each move rewrites the far
    /// side's reciprocal entry before touching the local table, so exit
    /// symmetry holds at every intermediate step.
    pub fn move_exits(&mut self, id: AreaId, moves: &[ExitMove]) -> Check {
        let mut staged = Vec::with_capacity(moves.len());
        for mv in moves {
            let far = self
                .area(id)
                .exit(mv.old_pos, mv.old_kind)
                .copied()
                .ok_or_else(|| {
                    Failure::of(format!("no exit to move at {} {}", mv.old_pos, mv.old_kind))
                })?;
            self.area_mut(far.area).set_exit_one_way(
                far.pos,
                far.kind,
                ExitSpec { area: id, pos: mv.new_pos, kind: mv.new_kind },
            );
            staged.push((mv.new_pos, mv.new_kind, far));
            self.area_mut(id).delete_exit(mv.old_pos, mv.old_kind);
        }
        for (pos, kind, far) in staged {
            self.area_mut(id).set_exit_one_way(pos, kind, far);
        }
        Ok(())
    }

    /// For a seamlessly-paired area couple, copy every symmetric
    /// non-seamless exit over to the partner and delete asymmetric
    /// leftovers. Used after bulk structural edits.
    pub fn reconcile_exits(&mut self, a: AreaId, b: AreaId) {
        let mut add: Vec<(AreaId, Pos, ConnectionKind, ExitSpec)> = Vec::new();
        let mut del: Vec<(AreaId, Pos, ConnectionKind)> = Vec::new();
        for &(this, other) in &[(a, b), (b, a)] {
            for (pos, kind, spec) in self.area(this).exits() {
                if spec.kind.is_seamless() {
                    continue;
                }
                let reverse = self.area(spec.area).exit(spec.pos, spec.kind);
                let symmetric = reverse
                    .is_some_and(|rev| rev.area == this && rev.pos == pos && rev.kind == kind);
                if symmetric {
                    add.push((other, pos, kind, *spec));
                } else {
                    del.push((this, pos, kind));
                }
            }
        }
        for (id, pos, kind) in del {
            self.area_mut(id).delete_exit(pos, kind);
        }
        for (id, pos, kind, spec) in add {
            self.area_mut(id).set_exit_one_way(pos, kind, spec);
        }
    }

    /// Column splice across the whole protocol: the grid half runs in one
    /// excursion, then exits re-key (reciprocals first), and spawn/flag
    /// records in the externally-owned source description shift with the
    /// surviving columns.
    pub fn splice_columns(
        &mut self,
        id: AreaId,
        left: u8,
        deleted: u8,
        inserted: u8,
        rows: &[Vec<ScreenKey>],
        source: &mut RawArea,
    ) -> Check {
        self.area_mut(id).splice_columns(left, deleted, inserted, rows)?;
        let delta = i16::from(inserted) - i16::from(deleted);
        let mut moves = Vec::new();
        let mut dropped = Vec::new();
        for (pos, kind, _) in self.area(id).exits() {
            let x = pos.x();
            if x < left + deleted {
                if x >= left {
                    dropped.push((pos, kind));
                }
                continue;
            }
            let new_pos = Pos::new(pos.y(), (i16::from(x) + delta) as u8);
            moves.push(ExitMove { old_pos: pos, old_kind: kind, new_pos, new_kind: kind });
        }
        for (pos, kind) in dropped {
            self.area_mut(id).delete_exit(pos, kind);
        }
        self.move_exits(id, &moves)?;

        source.spawns.retain(|spawn| {
            let x = Pos(spawn.screen).x();
            x < left || x >= left + deleted
        });
        for spawn in &mut source.spawns {
            let pos = Pos(spawn.screen);
            if pos.x() >= left + deleted {
                spawn.screen = Pos::new(pos.y(), (i16::from(pos.x()) + delta) as u8).0;
            }
        }
        source.flags.retain(|flag| {
            let x = Pos(flag.screen).x();
            x < left || x >= left + deleted
        });
        for flag in &mut source.flags {
            let pos = Pos(flag.screen);
            if pos.x() >= left + deleted {
                flag.screen = Pos::new(pos.y(), (i16::from(pos.x()) + delta) as u8).0;
            }
        }
        Ok(())
    }
}
