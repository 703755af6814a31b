//! Screen catalog for one tileset: the immutable set of screens an area of
//! that tileset may use, plus the edge-compatibility relation between them.
//!
//! A catalog is constructed once from data, then shared by reference across
//! every area grid of the tileset. Nothing here is mutable afterwards.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::failure::Failure;
use crate::screen::{ConnectionKind, EdgeClass, Features, Screen, ScreenData};
use crate::types::{Dir, ScreenKey};

/// Serde mirror of a full tileset catalog file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogData {
    pub name: String,
    /// Whether areas of this tileset track the consolidation multiset.
    #[serde(default)]
    pub consolidated: bool,
    /// Extra edge-class pairs declared compatible besides plain equality.
    #[serde(default)]
    pub compatible: Vec<(char, char)>,
    pub screens: Vec<ScreenData>,
}

pub struct Catalog {
    name: String,
    consolidated: bool,
    screens: SlotMap<ScreenKey, Screen>,
    by_sid: BTreeMap<u8, Vec<ScreenKey>>,
    empty: ScreenKey,
    compat: BTreeSet<(u8, u8)>,
}

impl Catalog {
    pub fn from_data(data: &CatalogData) -> Result<Catalog, Failure> {
        let mut screens = SlotMap::with_key();
        let mut by_sid: BTreeMap<u8, Vec<ScreenKey>> = BTreeMap::new();
        let mut empty = None;
        for screen_data in &data.screens {
            let screen = Screen::from_data(screen_data)?;
            let all_blank = screen.edges.is_some_and(|sig| sig.is_all_blank());
            let is_sentinel = all_blank
                && screen.is_empty()
                && screen.connections.is_empty()
                && !screen.has_feature(Features::MANUAL);
            let key = screens.insert(screen);
            by_sid.entry(screen_data.sid).or_default().push(key);
            if is_sentinel && empty.is_none() {
                empty = Some(key);
            }
        }
        let empty = empty.ok_or_else(|| {
            Failure::of(format!("catalog {:?} has no all-blank empty screen", data.name))
        })?;
        let mut compat = BTreeSet::new();
        for &(a, b) in &data.compatible {
            let (a, b) = (a as u8, b as u8);
            compat.insert((a.min(b), a.max(b)));
        }
        Ok(Catalog {
            name: data.name.clone(),
            consolidated: data.consolidated,
            screens,
            by_sid,
            empty,
            compat,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn consolidated(&self) -> bool {
        self.consolidated
    }

    pub fn screen(&self, key: ScreenKey) -> &Screen {
        &self.screens[key]
    }

    pub fn screens(&self) -> impl Iterator<Item = (ScreenKey, &Screen)> {
        self.screens.iter()
    }

    /// The designated all-blank sentinel every unfilled cell points at.
    pub fn empty(&self) -> ScreenKey {
        self.empty
    }

    /// Screens sharing a tileset-local raw id (the same id can map to
    /// several catalog entries differing in flags or features).
    pub fn by_sid(&self, sid: u8) -> &[ScreenKey] {
        self.by_sid.get(&sid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_compatible(&self, a: EdgeClass, b: EdgeClass) -> bool {
        if a == b {
            return true;
        }
        let (lo, hi) = (a.0.min(b.0), a.0.max(b.0));
        self.compat.contains(&(lo, hi))
    }

    /// Whether `b` may sit in direction `dir` from `a`. The empty sentinel
    /// (or any fully-empty screen) abuts anything.
    pub fn check_neighbor(&self, a: ScreenKey, b: ScreenKey, dir: Dir) -> bool {
        let left = &self.screens[a];
        let right = &self.screens[b];
        if left.is_empty() || right.is_empty() {
            return true;
        }
        match (left.edges, right.edges) {
            (Some(a_sig), Some(b_sig)) => {
                self.edge_compatible(a_sig.slot(dir), b_sig.slot(dir.opposite()))
            }
            _ => false,
        }
    }

    /// All screens declaring a connection of the given kind.
    pub fn exit_candidates(&self, kind: ConnectionKind) -> Vec<ScreenKey> {
        self.screens
            .iter()
            .filter(|(_, screen)| screen.find_connection(kind).is_some())
            .map(|(key, _)| key)
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn screen(name: &str, sid: u8, edges: &str, features: &[&str]) -> ScreenData {
        ScreenData {
            name: name.into(),
            sid,
            edges: Some(edges.into()),
            features: features.iter().map(|s| (*s).to_string()).collect(),
            flag: None,
            connect: None,
            exits: Vec::new(),
        }
    }

    /// Small cave-flavored catalog: the empty sentinel, corridors in every
    /// open-edge combination that the tests need, and a few variants.
    pub fn cave_catalog() -> CatalogData {
        let mut screens = vec![screen("empty", 0x00, "    ", &["empty"])];
        // One screen per edge combination over the 'c' class, sid = bitmask
        // of open dirs (N=1, W=2, S=4, E=8), skipping the fully closed one.
        for bits in 1u8..16 {
            let sig: String = [1u8, 2, 4, 8]
                .iter()
                .map(|&bit| if bits & bit != 0 { 'c' } else { ' ' })
                .collect();
            let name = format!("cave_{bits:x}");
            let connect: String = [(1u8, '2'), (2, '6'), (4, 'a'), (8, 'e')]
                .iter()
                .filter(|(bit, _)| bits & bit != 0)
                .map(|&(_, point)| point)
                .collect();
            let mut data = screen(&name, bits, &sig, &[]);
            data.connect = Some(connect);
            screens.push(data);
        }
        CatalogData {
            name: "cave".into(),
            consolidated: false,
            compatible: Vec::new(),
            screens,
        }
    }
}
