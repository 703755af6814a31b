mod common;

use std::rc::Rc;

use map_core::{
    AreaRegistry, Catalog, Connection, ConnectionKind, Dir, ExitSpec, Features, Pos, RawArea,
    RawFlag, RawSpawn,
};

use common::{cave_catalog, cave_catalog_data, corridor, screen, with_screen};

#[test]
fn attach_infers_a_single_declared_connection_kind() {
    let catalog = cave_catalog();
    let mut registry = AreaRegistry::new();
    let a = registry.create(Rc::clone(&catalog), 4, 4);
    let b = registry.create(Rc::clone(&catalog), 4, 4);
    registry.area_mut(a).set(Pos(0x12), corridor(&catalog, 0b1111));
    registry.area_mut(b).set(Pos(0x21), corridor(&catalog, 0b1111));

    // Every corridor declares exactly one door connection, so no explicit
    // kinds are needed.
    registry.attach(a, Pos(0x12), b, Pos(0x21), None, None).unwrap();

    assert_eq!(
        registry.area(a).exit(Pos(0x12), ConnectionKind::Door),
        Some(&ExitSpec { area: b, pos: Pos(0x21), kind: ConnectionKind::Door }),
    );
    assert_eq!(
        registry.area(b).exit(Pos(0x21), ConnectionKind::Door),
        Some(&ExitSpec { area: a, pos: Pos(0x12), kind: ConnectionKind::Door }),
    );
}

#[test]
fn attach_fails_on_ambiguous_untyped_connections() {
    let data = with_screen(cave_catalog_data(), {
        let mut busy = screen("busy hall", 0x31, "cccc", &[]);
        busy.exits = vec![
            Connection { kind: ConnectionKind::Door, dir: Dir::South, entrance: 0xaf50, exits: vec![0xb5] },
            Connection { kind: ConnectionKind::Cave, dir: Dir::South, entrance: 0xdf80, exits: vec![0xd8] },
        ];
        busy
    });
    let catalog = Rc::new(Catalog::from_data(&data).unwrap());
    let mut registry = AreaRegistry::new();
    let a = registry.create(Rc::clone(&catalog), 4, 4);
    let b = registry.create(Rc::clone(&catalog), 4, 4);
    let busy = catalog.by_sid(0x31)[0];
    registry.area_mut(a).set(Pos(0x11), busy);
    registry.area_mut(b).set(Pos(0x11), corridor(&catalog, 0b1111));

    let failure = registry.attach(a, Pos(0x11), b, Pos(0x11), None, None).unwrap_err();
    assert!(failure.to_string().contains("no single"), "got: {failure}");
}

#[test]
fn exit_symmetry_holds_after_attach_chains() {
    let catalog = cave_catalog();
    let mut registry = AreaRegistry::new();
    let a = registry.create(Rc::clone(&catalog), 4, 4);
    let b = registry.create(Rc::clone(&catalog), 4, 4);
    let c = registry.create(Rc::clone(&catalog), 4, 4);
    for (id, pos) in [(a, Pos(0x12)), (a, Pos(0x13)), (b, Pos(0x21)), (c, Pos(0x31))] {
        registry.area_mut(id).set(pos, corridor(&catalog, 0b1111));
    }
    let door = ConnectionKind::Door;
    registry.attach(a, Pos(0x12), b, Pos(0x21), Some(door), Some(door)).unwrap();
    registry.attach(a, Pos(0x13), c, Pos(0x31), Some(door), Some(door)).unwrap();
    // Rewire a:12 to c:31; the stale far ends (b:21 and a:13) pair up.
    registry.attach(a, Pos(0x12), c, Pos(0x31), Some(door), Some(door)).unwrap();

    // Every non-seamless exit in every area must have a reciprocal.
    for id in [a, b, c] {
        for (pos, kind, spec) in registry.area(id).exits() {
            let reverse = registry.area(spec.area).exit(spec.pos, spec.kind).copied();
            assert_eq!(
                reverse,
                Some(ExitSpec { area: id, pos, kind }),
                "asymmetric exit at area {:?} {pos} {kind}",
                id,
            );
        }
    }
}

#[test]
fn splice_columns_shifts_exits_features_and_source_records() {
    let data = with_screen(cave_catalog_data(), {
        let mut arena = screen("arena_we", 0x2a, " c c", &["arena"]);
        arena.connect = Some("6e".into());
        arena.exits.push(common::door(0xaf50, 0xb5));
        arena
    });
    let catalog = Rc::new(Catalog::from_data(&data).unwrap());
    let mut registry = AreaRegistry::new();
    let a = registry.create(Rc::clone(&catalog), 1, 6);
    let b = registry.create(Rc::clone(&catalog), 1, 2);

    let we = corridor(&catalog, 0b1010);
    for x in 0..6 {
        registry.area_mut(a).set(Pos::new(0, x), we);
    }
    let arena_key = catalog.by_sid(0x2a)[0];
    registry.area_mut(a).set(Pos::new(0, 5), arena_key);
    registry.area_mut(a).add_required_feature(Pos::new(0, 5), Features::ARENA);
    registry.area_mut(b).set(Pos::new(0, 0), we);
    registry.area_mut(b).set(Pos::new(0, 1), we);
    registry.area_mut(a).validate().unwrap();
    registry.area_mut(b).validate().unwrap();

    let door = ConnectionKind::Door;
    registry.attach(a, Pos::new(0, 1), b, Pos::new(0, 0), Some(door), Some(door)).unwrap();
    registry.attach(a, Pos::new(0, 5), b, Pos::new(0, 1), Some(door), Some(door)).unwrap();

    let mut source = RawArea {
        id: 0,
        tileset: "cave".into(),
        width: 6,
        height: 1,
        screens: vec![vec![0x0a; 6]],
        exits: vec![],
        entrances: vec![],
        flags: vec![RawFlag { screen: 0x05, flag: 0x210 }],
        spawns: vec![RawSpawn { screen: 0x03, tile: 0x55 }, RawSpawn { screen: 0x05, tile: 0x66 }],
    };

    // Insert two blank columns at index 4.
    let empty = catalog.empty();
    registry
        .splice_columns(a, 4, 0, 2, &[vec![empty, empty]], &mut source)
        .unwrap();

    let area = registry.area(a);
    assert_eq!(area.width(), 8);
    // The exit left of the insertion point stays; the one at column 5 moved
    // to column 7, and its reciprocal in B follows.
    assert_eq!(
        area.exit(Pos::new(0, 1), door),
        Some(&ExitSpec { area: b, pos: Pos::new(0, 0), kind: door }),
    );
    assert_eq!(area.exit(Pos::new(0, 5), door), None);
    assert_eq!(
        area.exit(Pos::new(0, 7), door),
        Some(&ExitSpec { area: b, pos: Pos::new(0, 1), kind: door }),
    );
    assert_eq!(
        registry.area(b).exit(Pos::new(0, 1), door),
        Some(&ExitSpec { area: a, pos: Pos::new(0, 7), kind: door }),
    );
    // Feature requirements moved with their column.
    assert_eq!(registry.area(a).required_features(Pos::new(0, 7)), Features::ARENA);
    assert_eq!(registry.area(a).required_features(Pos::new(0, 5)), Features::empty());
    // Spawn and flag records in the external source shifted too.
    assert_eq!(source.spawns[0].screen, 0x03);
    assert_eq!(source.spawns[1].screen, 0x07);
    assert_eq!(source.flags[0].screen, 0x07);
    // A valid grid before the splice with all-blank inserted columns is
    // still valid afterwards.
    registry.area_mut(a).validate().unwrap();
}

#[test]
fn splice_columns_rolls_back_when_the_result_is_invalid() {
    let catalog = cave_catalog();
    let mut registry = AreaRegistry::new();
    let a = registry.create(Rc::clone(&catalog), 1, 4);
    let we = corridor(&catalog, 0b1010);
    for x in 0..4 {
        registry.area_mut(a).set(Pos::new(0, x), we);
    }
    registry.area_mut(a).validate().unwrap();
    let before = registry.area(a).canonical_bytes();

    let mut source = RawArea {
        id: 0,
        tileset: "cave".into(),
        width: 4,
        height: 1,
        screens: vec![vec![0x0a; 4]],
        exits: vec![],
        entrances: vec![],
        flags: vec![],
        spawns: vec![],
    };
    // Inserting a south dead end between two W-E corridors blanks edges
    // both neighbors still open into.
    let bad = corridor(&catalog, 0b0100);
    let result = registry.splice_columns(a, 2, 0, 1, &[vec![bad]], &mut source);
    assert!(result.is_err());
    assert_eq!(registry.area(a).canonical_bytes(), before);
    assert_eq!(registry.area(a).width(), 4);
}
