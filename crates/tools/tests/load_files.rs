use std::fs;
use std::rc::Rc;

use map_core::{
    AreaId, AreaRegistry, Catalog, CatalogData, Connection, ConnectionKind, Dir, Pos, RawArea,
    RawEntrance, RawExit, ScreenData,
};

fn catalog_json() -> String {
    let screens = vec![
        ScreenData {
            name: "empty".into(),
            sid: 0x00,
            edges: Some("    ".into()),
            features: vec!["empty".into()],
            flag: None,
            connect: None,
            exits: vec![],
        },
        ScreenData {
            name: "hall".into(),
            sid: 0x01,
            edges: Some(" c c".into()),
            features: vec![],
            flag: None,
            connect: Some("6e".into()),
            exits: vec![Connection {
                kind: ConnectionKind::Door,
                dir: Dir::South,
                entrance: 0xaf50,
                exits: vec![0xb5],
            }],
        },
        ScreenData {
            name: "dead end".into(),
            sid: 0x02,
            edges: Some(" c  ".into()),
            features: vec!["deadend".into()],
            flag: None,
            connect: Some("6".into()),
            exits: vec![],
        },
    ];
    let data =
        CatalogData { name: "cave".into(), consolidated: false, compatible: vec![], screens };
    serde_json::to_string_pretty(&data).unwrap()
}

fn areas_json() -> String {
    let area = |id: u8, dest: u8| RawArea {
        id,
        tileset: "cave".into(),
        width: 2,
        height: 1,
        screens: vec![vec![0x01, 0x02]],
        exits: vec![RawExit { screen: 0x00, tile: 0xb5, dest_area: dest, dest_entrance: 0 }],
        entrances: vec![RawEntrance { screen: 0x00, coord: 0xaf50 }],
        flags: vec![],
        spawns: vec![],
    };
    serde_json::to_string_pretty(&vec![area(0, 1), area(1, 0)]).unwrap()
}

#[test]
fn catalog_and_areas_round_trip_through_json_files() {
    let dir = tempfile::tempdir().unwrap();
    let catalog_path = dir.path().join("catalog.json");
    let areas_path = dir.path().join("areas.json");
    fs::write(&catalog_path, catalog_json()).unwrap();
    fs::write(&areas_path, areas_json()).unwrap();

    let catalog_data: CatalogData =
        serde_json::from_str(&fs::read_to_string(&catalog_path).unwrap()).unwrap();
    let catalog = Rc::new(Catalog::from_data(&catalog_data).unwrap());
    let raws: Vec<RawArea> =
        serde_json::from_str(&fs::read_to_string(&areas_path).unwrap()).unwrap();

    let registry = AreaRegistry::from_raw(Rc::clone(&catalog), &raws).unwrap();
    assert_eq!(registry.len(), 2);
    let a = registry.area(AreaId(0));
    assert_eq!(a.filled(), 2);
    assert!(a.exit(Pos(0x00), ConnectionKind::Door).is_some());
    assert_eq!(a.screen(Pos(0x01)).name, "dead end");
}

#[test]
fn connection_kinds_serialize_with_their_wire_names() {
    let json = catalog_json();
    assert!(json.contains("\"door\""));
    assert!(json.contains("\"south\""));
    let reparsed: CatalogData = serde_json::from_str(&json).unwrap();
    assert_eq!(reparsed.screens[1].exits[0].kind, ConnectionKind::Door);
}
