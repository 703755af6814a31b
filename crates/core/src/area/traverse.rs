//! Reachability over intra-screen connection segments.
//!
//! Each occupied position contributes its screen's pre-declared point
//! groups for the requested movement mode; unioning the groups yields the
//! connected components of the whole area. Facing edge points of adjacent
//! screens share a key (see [`point_key`]), which is what stitches
//! neighboring screens together.

use std::collections::{BTreeMap, BTreeSet};

use crate::screen::point_key;
use crate::types::Pos;

use super::grid::AreaGrid;

#[derive(Clone, Debug, Default)]
pub struct TraverseOpts {
    /// Assume flight: water segments no longer separate points.
    pub flight: bool,
    /// Assume no flags: walls stay shut and bridges stay out.
    pub no_flagged: bool,
    /// Positions to treat as absent, without mutating the grid.
    pub without: Vec<Pos>,
}

/// Result of a traversal: connected point sets, queryable by point key.
pub struct Traversal {
    root_of: BTreeMap<u32, u32>,
    sets: BTreeMap<u32, BTreeSet<u32>>,
}

impl Traversal {
    pub fn connected(&self, a: u32, b: u32) -> bool {
        match (self.root_of.get(&a), self.root_of.get(&b)) {
            (Some(ra), Some(rb)) => ra == rb,
            _ => false,
        }
    }

    /// The full reachable set containing the given point, if it exists.
    pub fn set_containing(&self, key: u32) -> Option<&BTreeSet<u32>> {
        self.sets.get(self.root_of.get(&key)?)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &BTreeSet<u32>> {
        self.sets.values()
    }

    pub fn partition_count(&self) -> usize {
        self.sets.len()
    }

    /// Total number of points seen.
    pub fn len(&self) -> usize {
        self.root_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root_of.is_empty()
    }
}

impl AreaGrid {
    pub fn traverse(&self, opts: &TraverseOpts) -> Traversal {
        let without: BTreeSet<Pos> = opts.without.iter().copied().collect();
        let mut uf = UnionFind::new();
        for pos in self.all_pos() {
            if without.contains(&pos) {
                continue;
            }
            for segment in self.screen(pos).segments(opts.flight, opts.no_flagged) {
                let keys: Vec<u32> = segment.iter().map(|&d| point_key(pos, d)).collect();
                uf.union_all(&keys);
            }
        }
        uf.into_traversal()
    }
}

struct UnionFind {
    parent: BTreeMap<u32, u32>,
}

impl UnionFind {
    fn new() -> UnionFind {
        UnionFind { parent: BTreeMap::new() }
    }

    fn find(&mut self, key: u32) -> u32 {
        let mut root = key;
        while let Some(&next) = self.parent.get(&root) {
            if next == root {
                break;
            }
            root = next;
        }
        // Path compression.
        let mut walk = key;
        while let Some(&next) = self.parent.get(&walk) {
            if next == root {
                break;
            }
            self.parent.insert(walk, root);
            walk = next;
        }
        self.parent.entry(key).or_insert(root);
        root
    }

    fn union_all(&mut self, keys: &[u32]) {
        let Some(&first) = keys.first() else { return };
        let mut root = self.find(first);
        for &key in &keys[1..] {
            let other = self.find(key);
            if other != root {
                // Smaller root wins, keeping results deterministic.
                let (winner, loser) = (root.min(other), root.max(other));
                self.parent.insert(loser, winner);
                root = winner;
            }
        }
    }

    fn into_traversal(mut self) -> Traversal {
        let keys: Vec<u32> = self.parent.keys().copied().collect();
        let mut root_of = BTreeMap::new();
        let mut sets: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
        for key in keys {
            let root = self.find(key);
            root_of.insert(key, root);
            sets.entry(root).or_default().insert(key);
        }
        Traversal { root_of, sets }
    }
}
