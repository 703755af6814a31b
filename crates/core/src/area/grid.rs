//! The mutable per-area grid and its transactional edit machinery.
//!
//! The backing array is `(height + 2) * 16` cells: one empty sentinel row
//! above and below the interior, and unused columns on the right of rows
//! narrower than 16. Every neighbor lookup lands inside the array, so the
//! compatibility checks never branch on bounds.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use xxhash_rust::xxh3::xxh3_64;

use crate::catalog::Catalog;
use crate::failure::{Check, Failure, panic_message};
use crate::screen::{ConnectionKind, Features, Screen};
use crate::types::{AreaId, Dir, Pos, ScreenKey};

use super::exits::ExitSpec;

/// Everything `save_excursion` snapshots, as one value. Restoring a failed
/// excursion is a single struct assignment, so partial rollback is
/// impossible by construction.
#[derive(Clone)]
pub(super) struct GridState {
    pub(super) screens: Vec<ScreenKey>,
    pub(super) features: BTreeMap<Pos, Features>,
    pub(super) dirty: BTreeSet<Pos>,
    pub(super) filled: u16,
    /// Count of consolidate-flagged screens by raw id, when the tileset
    /// opts in. Opaque to the engine beyond counting.
    pub(super) counts: Option<BTreeMap<u8, u32>>,
    pub(super) invalid: bool,
}

pub struct AreaGrid {
    id: AreaId,
    catalog: Rc<Catalog>,
    height: u8,
    width: u8,
    pub(super) state: GridState,
    pub(super) exits: BTreeMap<(Pos, ConnectionKind), ExitSpec>,
    pub(super) custom_flags: BTreeMap<Pos, u16>,
    pub(super) free_flags: BTreeSet<u16>,
    pub(super) entrance0: Option<ConnectionKind>,
}

impl AreaGrid {
    pub fn new(id: AreaId, catalog: Rc<Catalog>, height: u8, width: u8) -> AreaGrid {
        assert!(height <= 14 && width <= 15, "grid of {height}x{width} does not fit");
        let cells = (usize::from(height) + 2) * 16;
        let counts = catalog.consolidated().then(BTreeMap::new);
        AreaGrid {
            id,
            catalog: Rc::clone(&catalog),
            height,
            width,
            state: GridState {
                screens: vec![catalog.empty(); cells],
                features: BTreeMap::new(),
                dirty: BTreeSet::new(),
                filled: 0,
                counts,
                invalid: false,
            },
            exits: BTreeMap::new(),
            custom_flags: BTreeMap::new(),
            free_flags: BTreeSet::new(),
            entrance0: None,
        }
    }

    pub fn id(&self) -> AreaId {
        self.id
    }

    pub fn catalog(&self) -> &Rc<Catalog> {
        &self.catalog
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    /// Occupied (non-sentinel) cell count.
    pub fn filled(&self) -> u16 {
        self.state.filled
    }

    pub fn is_invalid(&self) -> bool {
        self.state.invalid
    }

    /// Consolidation multiset, when the tileset tracks one.
    pub fn consolidation_counts(&self) -> Option<&BTreeMap<u8, u32>> {
        self.state.counts.as_ref()
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.y() < self.height && pos.x() < self.width
    }

    pub fn all_pos(&self) -> impl Iterator<Item = Pos> + use<> {
        let (height, width) = (self.height, self.width);
        (0..height).flat_map(move |y| (0..width).map(move |x| Pos::new(y, x)))
    }

    /// Interior positions along one border of the grid.
    pub fn edge_positions(&self, dir: Dir) -> Vec<Pos> {
        match dir {
            Dir::North => (0..self.width).map(|x| Pos::new(0, x)).collect(),
            Dir::South => (0..self.width).map(|x| Pos::new(self.height - 1, x)).collect(),
            Dir::West => (0..self.height).map(|y| Pos::new(y, 0)).collect(),
            Dir::East => (0..self.height).map(|y| Pos::new(y, self.width - 1)).collect(),
        }
    }

    fn cell(pos: Pos) -> usize {
        usize::from(pos.0) + 16
    }

    fn neighbor_cell(pos: Pos, dir: Dir) -> usize {
        (Self::cell(pos) as isize + dir.delta()) as usize
    }

    pub fn get(&self, pos: Pos) -> ScreenKey {
        self.state.screens[Self::cell(pos)]
    }

    pub fn screen(&self, pos: Pos) -> &Screen {
        self.catalog.screen(self.get(pos))
    }

    /// Required feature mask at a position (empty when unconstrained).
    pub fn required_features(&self, pos: Pos) -> Features {
        self.state.features.get(&pos).copied().unwrap_or_default()
    }

    pub fn feature_map(&self) -> &BTreeMap<Pos, Features> {
        &self.state.features
    }

    /// OR a requirement into the position's feature mask. The occupying
    /// screen is not re-checked here; `validate` will catch a mismatch.
    pub fn add_required_feature(&mut self, pos: Pos, feature: Features) {
        let entry = self.state.features.entry(pos).or_default();
        *entry |= feature;
        self.state.dirty.insert(pos);
    }

    /// Direct write. Adjusts the filled count and consolidation multiset and
    /// marks the position's edges for the next `validate`, but performs no
    /// compatibility checking itself.
    pub fn set(&mut self, pos: Pos, key: ScreenKey) {
        let cell = Self::cell(pos);
        let prev = self.state.screens[cell];
        let empty = self.catalog.empty();
        if prev != empty && key == empty {
            self.state.filled -= 1;
        } else if prev == empty && key != empty {
            self.state.filled += 1;
        }
        if let Some(counts) = &mut self.state.counts {
            let prev_screen = self.catalog.screen(prev);
            if prev_screen.has_feature(Features::CONSOLIDATE) {
                if let Some(n) = counts.get_mut(&prev_screen.sid) {
                    *n -= 1;
                    if *n == 0 {
                        counts.remove(&prev_screen.sid);
                    }
                }
            }
            let next_screen = self.catalog.screen(key);
            if next_screen.has_feature(Features::CONSOLIDATE) {
                *counts.entry(next_screen.sid).or_insert(0) += 1;
            }
        }
        self.state.screens[cell] = key;
        self.state.dirty.insert(pos);
    }

    /// Clear a position back to the empty sentinel.
    pub fn clear(&mut self, pos: Pos) {
        self.set(pos, self.catalog.empty());
    }

    /// Checked write: the candidate must satisfy the position's required
    /// features and abut all four live neighbors. On failure the grid is
    /// untouched and the failure names the violated constraint.
    pub fn try_set(&mut self, pos: Pos, key: ScreenKey) -> Check {
        let screen = self.catalog.screen(key);
        let required = self.required_features(pos);
        if !screen.features.contains(required) {
            return Err(Failure::of(format!(
                "{} at {pos} lacks required features {:?}",
                screen.name,
                required.difference(screen.features),
            )));
        }
        for dir in Dir::ALL {
            let neighbor = self.state.screens[Self::neighbor_cell(pos, dir)];
            if !self.catalog.check_neighbor(key, neighbor, dir) {
                return Err(Failure::of(format!(
                    "bad neighbor {} {} {} ({pos})",
                    self.catalog.screen(neighbor).name,
                    dir.name(),
                    screen.name,
                )));
            }
        }
        self.set(pos, key);
        Ok(())
    }

    /// Commit the first candidate that passes `try_set`. Candidates are
    /// expected to be pre-shuffled by the caller.
    pub fn try_add_one_of(&mut self, pos: Pos, candidates: &[ScreenKey]) -> Check {
        let mut failures = Vec::new();
        for &candidate in candidates {
            match self.try_set(pos, candidate) {
                Ok(()) => return Ok(()),
                Err(failure) => failures.push(failure),
            }
        }
        Err(Failure::all(failures, format!("no candidate fits at {pos}")))
    }

    /// Re-check every edge marked dirty since the last validation. All
    /// violations found are aggregated into a single failure; on success the
    /// dirty set is drained and the grid is marked valid.
    pub fn validate(&mut self) -> Check {
        let dirty = std::mem::take(&mut self.state.dirty);
        let mut violations = Vec::new();
        let mut checked_edges = BTreeSet::new();
        for pos in dirty {
            if !self.in_bounds(pos) {
                continue;
            }
            let key = self.get(pos);
            let screen = self.catalog.screen(key);
            let required = self.required_features(pos);
            if !screen.features.contains(required) {
                violations.push(Failure::of(format!(
                    "{} at {pos} lacks required features {:?}",
                    screen.name,
                    required.difference(screen.features),
                )));
            }
            for dir in Dir::ALL {
                let cell = Self::cell(pos);
                let neighbor_cell = Self::neighbor_cell(pos, dir);
                let edge = (cell.min(neighbor_cell), cell.max(neighbor_cell));
                if !checked_edges.insert(edge) {
                    continue;
                }
                let neighbor = self.state.screens[neighbor_cell];
                if !self.catalog.check_neighbor(key, neighbor, dir) {
                    violations.push(Failure::of(format!(
                        "bad neighbor {} ({}) {} {} ({pos})",
                        self.catalog.screen(neighbor).name,
                        pos.step(dir).map(|p| p.to_string()).unwrap_or_else(|| "--".into()),
                        dir.name(),
                        screen.name,
                    )));
                }
            }
        }
        if violations.is_empty() {
            self.state.invalid = false;
            Ok(())
        } else {
            self.state.invalid = true;
            let count = violations.len();
            Err(Failure::all(violations, format!("validation found {count} problem(s)")))
        }
    }

    /// Run a multi-step edit atomically: on any failure (or panic) inside
    /// `f`, the snapshotted grid state is restored wholesale and the failure
    /// is returned. This is the only sanctioned way to compose partial
    /// edits; exit tables are cross-area state and are deliberately not part
    /// of the snapshot.
    pub fn save_excursion<T>(
        &mut self,
        f: impl FnOnce(&mut AreaGrid) -> Result<T, Failure>,
    ) -> Result<T, Failure> {
        let snapshot = self.state.clone();
        match catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(failure)) => {
                self.state = snapshot;
                Err(failure)
            }
            Err(payload) => {
                self.state = snapshot;
                Err(Failure::of(format!(
                    "fault during excursion: {}",
                    panic_message(payload.as_ref()),
                )))
            }
        }
    }

    /// Bulk-replace a rectangle of screens in one excursion, validating once
    /// at the end. `None` cells leave the existing screen in place.
    pub fn set_2d(&mut self, pos: Pos, rows: &[Vec<Option<ScreenKey>>]) -> Check {
        self.save_excursion(|grid| {
            for (dy, row) in rows.iter().enumerate() {
                for (dx, cell) in row.iter().enumerate() {
                    if let Some(key) = cell {
                        let target = Pos::new(pos.y() + dy as u8, pos.x() + dx as u8);
                        if !grid.in_bounds(target) {
                            return Err(Failure::of(format!("set_2d out of bounds at {target}")));
                        }
                        grid.set(target, *key);
                    }
                }
            }
            grid.validate()
        })?;
        self.bookkeep();
        Ok(())
    }

    /// Replace `deleted` columns starting at `left` with `inserted` fresh
    /// columns (`rows[y]` holds the new screens of interior row `y`).
    /// Feature requirements shift with the surviving columns; everything is
    /// re-validated before the edit commits. Exit rekeying is the
    /// registry's half of this operation.
    pub fn splice_columns(
        &mut self,
        left: u8,
        deleted: u8,
        inserted: u8,
        rows: &[Vec<ScreenKey>],
    ) -> Check {
        let old_width = self.width;
        let new_width = (i16::from(old_width) - i16::from(deleted) + i16::from(inserted)) as u8;
        assert!(new_width <= 15, "splice would widen grid past 15 columns");
        let empty = self.catalog.empty();
        let result = self.save_excursion(|grid| {
            let delta = i16::from(inserted) - i16::from(deleted);
            for row in 0..usize::from(grid.height) + 2 {
                let base = row * 16;
                let old_row = grid.state.screens[base..base + 16].to_vec();
                let mut new_row = Vec::with_capacity(16);
                new_row.extend_from_slice(&old_row[..usize::from(left)]);
                if row == 0 || row > usize::from(grid.height) {
                    new_row.extend(std::iter::repeat_n(empty, usize::from(inserted)));
                } else {
                    let fresh = &rows[row - 1];
                    if fresh.len() != usize::from(inserted) {
                        return Err(Failure::of(format!(
                            "splice row {} has {} screens, expected {inserted}",
                            row - 1,
                            fresh.len(),
                        )));
                    }
                    new_row.extend_from_slice(fresh);
                }
                new_row.extend_from_slice(&old_row[usize::from(left + deleted)..]);
                new_row.truncate(16);
                while new_row.len() < 16 {
                    new_row.push(empty);
                }
                grid.state.screens[base..base + 16].copy_from_slice(&new_row);
            }
            grid.width = new_width;
            grid.state.features = shift_columns(&grid.state.features, left, deleted, delta);
            for pos in grid.all_pos().collect::<Vec<_>>() {
                grid.state.dirty.insert(pos);
            }
            grid.validate()
        });
        if result.is_err() {
            self.width = old_width;
        } else {
            self.custom_flags = shift_columns(&self.custom_flags, left, deleted, i16::from(inserted) - i16::from(deleted));
            self.bookkeep();
        }
        result
    }

    /// Recompute the derived caches (filled count, consolidation multiset)
    /// from the screens array.
    pub fn bookkeep(&mut self) {
        self.state.filled = 0;
        let mut counts = self.state.counts.as_ref().map(|_| BTreeMap::new());
        let empty = self.catalog.empty();
        for pos in self.all_pos().collect::<Vec<_>>() {
            let key = self.get(pos);
            if key == empty {
                continue;
            }
            self.state.filled += 1;
            if let Some(counts) = &mut counts {
                let screen = self.catalog.screen(key);
                if screen.has_feature(Features::CONSOLIDATE) {
                    *counts.entry(screen.sid).or_insert(0) += 1;
                }
            }
        }
        self.state.counts = counts;
    }

    /// Stable byte encoding of the snapshot-relevant state, for hashing and
    /// the atomicity tests.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.push(self.id.0);
        bytes.push(self.width);
        bytes.push(self.height);
        for pos in self.all_pos() {
            let screen = self.screen(pos);
            bytes.push(screen.sid);
            bytes.extend(screen.features.bits().to_le_bytes());
        }
        for (pos, features) in &self.state.features {
            bytes.push(pos.0);
            bytes.extend(features.bits().to_le_bytes());
        }
        for pos in &self.state.dirty {
            bytes.push(pos.0);
        }
        bytes.extend(self.state.filled.to_le_bytes());
        bytes.push(u8::from(self.state.invalid));
        bytes
    }

    pub fn snapshot_hash(&self) -> u64 {
        xxh3_64(&self.canonical_bytes())
    }

    /// Compact ASCII rendering for diagnostics: one character per cell.
    pub fn show(&self) -> String {
        let mut lines = Vec::new();
        let header: String = (0..self.width).map(|x| char::from_digit(u32::from(x), 16).unwrap()).collect();
        lines.push(format!("  {header}"));
        for y in 0..self.height {
            let row: String = (0..self.width)
                .map(|x| {
                    let screen = self.screen(Pos::new(y, x));
                    if screen.is_empty() { '.' } else { screen.name.chars().next().unwrap_or('?') }
                })
                .collect();
            lines.push(format!("{y:x} {row}"));
        }
        lines.join("\n")
    }

    pub fn screen_names(&self) -> String {
        let mut lines = Vec::new();
        for y in 0..self.height {
            let row: Vec<&str> =
                (0..self.width).map(|x| self.screen(Pos::new(y, x)).name.as_str()).collect();
            lines.push(row.join(" "));
        }
        lines.join("\n")
    }

    pub fn custom_flag(&self, pos: Pos) -> Option<u16> {
        self.custom_flags.get(&pos).copied()
    }

    pub fn set_custom_flag(&mut self, pos: Pos, flag: u16) {
        self.custom_flags.insert(pos, flag);
    }

    pub fn free_flags(&self) -> &BTreeSet<u16> {
        &self.free_flags
    }

    pub fn entrance0(&self) -> Option<ConnectionKind> {
        self.entrance0
    }
}

/// Re-key a Pos-keyed map across a column splice: keys in the deleted range
/// drop out, keys at-or-past it shift by the width delta.
fn shift_columns<V: Copy>(
    map: &BTreeMap<Pos, V>,
    left: u8,
    deleted: u8,
    delta: i16,
) -> BTreeMap<Pos, V> {
    let mut out = BTreeMap::new();
    for (&pos, &value) in map {
        let x = i16::from(pos.x());
        if x < i16::from(left) {
            out.insert(pos, value);
        } else if x < i16::from(left + deleted) {
            // deleted along with its column
        } else {
            out.insert(Pos::new(pos.y(), (x + delta) as u8), value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogData;
    use crate::catalog::test_support::{cave_catalog, screen};

    fn catalog_from(data: &CatalogData) -> Rc<Catalog> {
        Rc::new(Catalog::from_data(data).unwrap())
    }

    #[test]
    fn filled_count_tracks_sets_and_clears() {
        let catalog = catalog_from(&cave_catalog());
        let mut area = AreaGrid::new(AreaId(0), Rc::clone(&catalog), 3, 3);
        assert_eq!(area.filled(), 0);
        let hall = catalog.by_sid(0b1111)[0];
        area.set(Pos::new(1, 1), hall);
        area.set(Pos::new(1, 1), hall); // overwrite is not a second fill
        assert_eq!(area.filled(), 1);
        area.clear(Pos::new(1, 1));
        assert_eq!(area.filled(), 0);
    }

    #[test]
    fn consolidation_counts_follow_flagged_screens() {
        let mut data = cave_catalog();
        data.consolidated = true;
        data.screens.push(screen("spur", 0x22, "c   ", &["consolidate", "deadend"]));
        let catalog = catalog_from(&data);
        let spur = catalog.by_sid(0x22)[0];
        let mut area = AreaGrid::new(AreaId(0), Rc::clone(&catalog), 3, 3);
        area.set(Pos::new(1, 1), spur);
        area.set(Pos::new(2, 1), spur);
        assert_eq!(area.consolidation_counts().unwrap().get(&0x22), Some(&2));
        area.clear(Pos::new(1, 1));
        assert_eq!(area.consolidation_counts().unwrap().get(&0x22), Some(&1));
        area.bookkeep();
        assert_eq!(area.consolidation_counts().unwrap().get(&0x22), Some(&1));
    }

    #[test]
    fn validate_clears_the_dirty_set_on_success() {
        let catalog = catalog_from(&cave_catalog());
        let mut area = AreaGrid::new(AreaId(0), Rc::clone(&catalog), 3, 3);
        area.set(Pos::new(0, 0), catalog.by_sid(0b0100)[0]);
        area.set(Pos::new(1, 0), catalog.by_sid(0b0001)[0]);
        area.validate().unwrap();
        assert!(area.state.dirty.is_empty());
        // A second validate with nothing dirty is trivially fine.
        area.validate().unwrap();
    }

    #[test]
    fn show_renders_one_character_per_cell() {
        let catalog = catalog_from(&cave_catalog());
        let mut area = AreaGrid::new(AreaId(0), Rc::clone(&catalog), 2, 3);
        area.set(Pos::new(0, 1), catalog.by_sid(0b0100)[0]);
        let rendered = area.show();
        assert_eq!(rendered.lines().count(), 3);
        assert!(rendered.contains("0 .c."));
        assert!(rendered.contains("1 ..."));
    }

    #[test]
    fn edge_positions_walk_each_border() {
        let catalog = catalog_from(&cave_catalog());
        let area = AreaGrid::new(AreaId(0), Rc::clone(&catalog), 3, 4);
        assert_eq!(area.edge_positions(Dir::North).len(), 4);
        assert_eq!(area.edge_positions(Dir::East), vec![Pos::new(0, 3), Pos::new(1, 3), Pos::new(2, 3)]);
    }
}
