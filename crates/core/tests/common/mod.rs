//! Shared fixtures: a small cave-flavored catalog exercised by every
//! integration test.
#![allow(dead_code)]

use std::rc::Rc;

use map_core::{
    Catalog, CatalogData, Connection, ConnectionKind, Dir, Features, ScreenData, ScreenKey,
};

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

pub fn door(entrance: u16, tile: u8) -> Connection {
    Connection { kind: ConnectionKind::Door, dir: Dir::South, entrance, exits: vec![tile] }
}

/// Signature over the 'c' class with open sides given as a 4-bit mask
/// (N=1, W=2, S=4, E=8).
pub fn cave_sig(bits: u8) -> String {
    [1u8, 2, 4, 8].iter().map(|&bit| if bits & bit != 0 { 'c' } else { ' ' }).collect()
}

/// The cave catalog: an all-blank empty sentinel plus one corridor screen
/// per open-edge combination, each with a door connection so exit tests can
/// link areas anywhere.
pub fn cave_catalog_data() -> CatalogData {
    let mut screens = vec![screen("empty", 0x00, "    ", &["empty"])];
    for bits in 1u8..16 {
        let connect: String = [(1u8, '2'), (2, '6'), (4, 'a'), (8, 'e')]
            .iter()
            .filter(|(bit, _)| bits & bit != 0)
            .map(|&(_, point)| point)
            .collect();
        let mut data = screen(&format!("cave_{bits:x}"), bits, &cave_sig(bits), &[]);
        data.connect = Some(connect);
        data.exits.push(door(0xaf50, 0xb5));
        screens.push(data);
    }
    CatalogData { name: "cave".into(), consolidated: false, compatible: Vec::new(), screens }
}

pub fn cave_catalog() -> Rc<Catalog> {
    Rc::new(Catalog::from_data(&cave_catalog_data()).unwrap())
}

/// Key of the corridor screen with the given open-edge mask.
pub fn corridor(catalog: &Catalog, bits: u8) -> ScreenKey {
    catalog.by_sid(bits)[0]
}

pub fn with_screen(mut data: CatalogData, extra: ScreenData) -> CatalogData {
    data.screens.push(extra);
    data
}

pub fn features(names: &[&str]) -> Features {
    names.iter().map(|n| Features::parse(n).unwrap()).fold(Features::empty(), |a, b| a | b)
}
