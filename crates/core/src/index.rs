//! Replacement-search index over a catalog's screens.
//!
//! Screens with a declared edge signature over the indexing alphabet get a
//! packed 4-nibble edge index (top, left, bottom, right). Screens with no
//! feature beyond the declared "basic" set live in `basics[index]`; the
//! rest live in `variants[index][features]`. The try-operations search
//! these tables for replacements that keep a grid position's neighbors
//! legal; all of them leave rollback to the caller's `save_excursion`.

use std::collections::BTreeMap;
use std::rc::Rc;

use rand_chacha::rand_core::RngCore;

use crate::area::AreaGrid;
use crate::catalog::Catalog;
use crate::failure::{Check, Failure};
use crate::rng::{pick, shuffled};
use crate::screen::{EdgeSignature, Features};
use crate::types::{Dir, Pos, ScreenKey};

pub type EdgeIndex = u16;

fn nibble_shift(dir: Dir) -> u16 {
    12 - 4 * (dir as u16)
}

pub struct ScreenIndex {
    catalog: Rc<Catalog>,
    /// Alphabet position + 1 per indexed edge-class byte; blank is 0.
    classes: BTreeMap<u8, u16>,
    index: BTreeMap<ScreenKey, EdgeIndex>,
    basics: BTreeMap<EdgeIndex, Vec<ScreenKey>>,
    empties: BTreeMap<EdgeIndex, ScreenKey>,
    variants: BTreeMap<EdgeIndex, BTreeMap<Features, Vec<ScreenKey>>>,
}

impl ScreenIndex {
    /// Index every screen whose signature uses only `edge_classes` (and
    /// blanks). Features in `basic` do not push a screen out of the basics
    /// table.
    pub fn new(catalog: Rc<Catalog>, edge_classes: &str, basic: Features) -> ScreenIndex {
        assert!(edge_classes.len() < 16, "edge index nibbles can hold 15 classes");
        let mut classes = BTreeMap::new();
        for (i, byte) in edge_classes.bytes().enumerate() {
            classes.insert(byte, i as u16 + 1);
        }
        let mut this = ScreenIndex {
            catalog: Rc::clone(&catalog),
            classes,
            index: BTreeMap::new(),
            basics: BTreeMap::new(),
            empties: BTreeMap::new(),
            variants: BTreeMap::new(),
        };
        for (key, screen) in catalog.screens() {
            let Some(signature) = screen.edges else { continue };
            let Some(edge_index) = this.pack(signature) else { continue };
            this.index.insert(key, edge_index);
            let non_basic = screen.features.difference(basic);
            if non_basic.is_empty() {
                this.basics.entry(edge_index).or_default().push(key);
            } else {
                this.variants
                    .entry(edge_index)
                    .or_default()
                    .entry(non_basic)
                    .or_default()
                    .push(key);
            }
            if screen.is_empty() {
                this.empties.entry(edge_index).or_insert(key);
            }
        }
        this
    }

    /// Pack a signature into 4 nibbles, or `None` if it uses a class
    /// outside the indexing alphabet.
    pub fn pack(&self, signature: EdgeSignature) -> Option<EdgeIndex> {
        let mut packed = 0;
        for dir in Dir::ALL {
            let class = signature.slot(dir);
            let nibble = if class.is_blank() { 0 } else { *self.classes.get(&class.0)? };
            packed |= nibble << nibble_shift(dir);
        }
        Some(packed)
    }

    pub fn edge_index(&self, key: ScreenKey) -> Option<EdgeIndex> {
        self.index.get(&key).copied()
    }

    /// Drop a screen from every table, e.g. after the driver decides a
    /// variant must never be placed again.
    pub fn remove_screen(&mut self, key: ScreenKey) {
        self.index.remove(&key);
        for list in self.basics.values_mut() {
            list.retain(|&k| k != key);
        }
        for by_features in self.variants.values_mut() {
            for list in by_features.values_mut() {
                list.retain(|&k| k != key);
            }
        }
        self.empties.retain(|_, &mut k| k != key);
    }

    /// Uniform choice among the screens carrying exactly `features` at the
    /// given edge index (basics when `features` is empty).
    pub fn pick_screen(
        &self,
        rng: &mut impl RngCore,
        features: Features,
        edge_index: EdgeIndex,
    ) -> Option<ScreenKey> {
        pick(rng, self.candidates(features, edge_index)).copied()
    }

    fn candidates(&self, features: Features, edge_index: EdgeIndex) -> &[ScreenKey] {
        let list = if features.is_empty() {
            self.basics.get(&edge_index)
        } else {
            self.variants.get(&edge_index).and_then(|m| m.get(&features))
        };
        list.map(Vec::as_slice).unwrap_or(&[])
    }

    /// Screens whose feature mask is a superset of `required` at the index.
    fn superset_candidates(&self, required: Features, edge_index: EdgeIndex) -> Vec<ScreenKey> {
        let Some(by_features) = self.variants.get(&edge_index) else { return Vec::new() };
        by_features
            .iter()
            .filter(|(mask, _)| mask.contains(required))
            .flat_map(|(_, keys)| keys.iter().copied())
            .collect()
    }

    /// Replacement pool for re-picking a screen at `edge_index` with its
    /// required features unchanged. When nothing is required, the empty
    /// variant at that index (the sentinel, for index 0) is an acceptable
    /// replacement too: clearing a screen's last edge blanks it entirely.
    fn replacements(&self, required: Features, edge_index: EdgeIndex) -> Vec<ScreenKey> {
        if required.is_empty() {
            let mut pool = self.candidates(Features::empty(), edge_index).to_vec();
            if let Some(&empty_variant) = self.empties.get(&edge_index) {
                if !pool.contains(&empty_variant) {
                    pool.push(empty_variant);
                }
            }
            pool
        } else {
            self.superset_candidates(required, edge_index)
        }
    }

    /// Blank out a position while keeping all neighbors legal.
    ///
    /// First preference is an empty variant with the very same edge index,
    /// so only the center changes. Failing that, the center goes fully
    /// blank and every neighbor that connected to it is re-picked with the
    /// facing edge bit cleared from its own index, required features
    /// unchanged. Every touched position is left dirty, so the follow-up
    /// `validate` re-checks the patched neighbors' other edges too. Callers
    /// wrap this in `save_excursion`; a failure here leaves partial edits.
    pub fn try_clear(&self, area: &mut AreaGrid, pos: Pos, rng: &mut impl RngCore) -> Check {
        if area.screen(pos).is_empty() {
            return Ok(()); // already blank
        }
        let middle = area.get(pos);
        let Some(middle_index) = self.edge_index(middle) else {
            return Err(Failure::of(format!(
                "cannot clear unindexed screen {} at {pos}",
                area.screen(pos).name,
            )));
        };
        let required = area.required_features(pos);
        let same_edges = self.candidates(required | Features::EMPTY, middle_index);
        for candidate in shuffled(rng, same_edges) {
            if area.try_set(pos, candidate).is_ok() {
                return Ok(());
            }
        }

        area.clear(pos);
        for dir in Dir::ALL {
            let Some(neighbor) = pos.step(dir) else { continue };
            if !area.in_bounds(neighbor) || area.screen(neighbor).is_empty() {
                continue;
            }
            let Some(neighbor_index) = self.edge_index(area.get(neighbor)) else { continue };
            let facing = dir.opposite();
            if neighbor_index & (0xf << nibble_shift(facing)) == 0 {
                continue; // never connected to the cleared center
            }
            let cleared = neighbor_index & !(0xf << nibble_shift(facing));
            let neighbor_required = area.required_features(neighbor);
            let replacements = self.replacements(neighbor_required, cleared);
            let mut replaced = false;
            for candidate in shuffled(rng, &replacements) {
                if area.try_set(neighbor, candidate).is_ok() {
                    replaced = true;
                    break;
                }
            }
            if !replaced {
                return Err(Failure::of(format!(
                    "clearing {pos}: no legal replacement for neighbor {} at {neighbor}",
                    area.screen(neighbor).name,
                )));
            }
        }
        Ok(())
    }

    /// Remove just the single shared edge between `pos` and its `dir`
    /// neighbor, re-picking each side with that one edge bit cleared and
    /// its own required features unchanged.
    pub fn try_clear_edge(
        &self,
        area: &mut AreaGrid,
        pos: Pos,
        dir: Dir,
        rng: &mut impl RngCore,
    ) -> Check {
        let Some(other) = pos.step(dir) else {
            return Err(Failure::of(format!("no neighbor {} of {pos}", dir.name())));
        };
        if !area.in_bounds(other) {
            return Err(Failure::of(format!("no neighbor {} of {pos}", dir.name())));
        }
        let mut picks = Vec::new();
        for (side, side_dir) in [(pos, dir), (other, dir.opposite())] {
            let Some(side_index) = self.edge_index(area.get(side)) else {
                return Err(Failure::of(format!(
                    "cannot re-pick unindexed screen {} at {side}",
                    area.screen(side).name,
                )));
            };
            if side_index & (0xf << nibble_shift(side_dir)) == 0 {
                continue; // this side already has no such edge
            }
            let cleared = side_index & !(0xf << nibble_shift(side_dir));
            let required = area.required_features(side);
            let candidate = pick(rng, &self.replacements(required, cleared)).copied();
            match candidate {
                Some(key) => picks.push((side, key)),
                None => {
                    return Err(Failure::of(format!(
                        "clearing edge {pos}/{other}: no replacement for {side}",
                    )));
                }
            }
        }
        // Both sides have a replacement; apply together so neither check
        // sees the half-updated edge.
        for (side, key) in picks {
            area.set(side, key);
        }
        Ok(())
    }

    /// OR a feature into the position's requirements and re-pick a screen
    /// at the same edge index supporting the combined mask.
    pub fn try_add_feature(
        &self,
        area: &mut AreaGrid,
        pos: Pos,
        feature: Features,
        rng: &mut impl RngCore,
    ) -> Check {
        let Some(edge_index) = self.edge_index(area.get(pos)) else {
            return Err(Failure::of(format!(
                "cannot add feature to unindexed screen {} at {pos}",
                area.screen(pos).name,
            )));
        };
        let combined = area.required_features(pos) | feature;
        let candidates = self.superset_candidates(combined, edge_index);
        let mut failures = Vec::new();
        for candidate in shuffled(rng, &candidates) {
            match area.try_set(pos, candidate) {
                Ok(()) => {
                    area.add_required_feature(pos, feature);
                    return Ok(());
                }
                Err(failure) => failures.push(failure),
            }
        }
        Err(Failure::all(
            failures,
            format!("no screen supporting {combined:?} fits at {pos}"),
        ))
    }

    /// Cheap 2x2-loop heuristic: does the square with `pos` at its bottom
    /// right close into a tight cycle? Only the two diagonal screens are
    /// inspected, so this may rarely report a false positive.
    pub fn is_tight_cycle(&self, area: &AreaGrid, pos: Pos) -> bool {
        let Some(up_left) = pos.step(Dir::North).and_then(|p| p.step(Dir::West)) else {
            return false;
        };
        let (Some(ul), Some(dr)) =
            (self.edge_index(area.get(up_left)), self.edge_index(area.get(pos)))
        else {
            return false;
        };
        let south = 0xf << nibble_shift(Dir::South);
        let east = 0xf << nibble_shift(Dir::East);
        let north = 0xf << nibble_shift(Dir::North);
        let west = 0xf << nibble_shift(Dir::West);
        ul & south != 0 && ul & east != 0 && dr & north != 0 && dr & west != 0
    }

    pub fn catalog(&self) -> &Rc<Catalog> {
        &self.catalog
    }
}
