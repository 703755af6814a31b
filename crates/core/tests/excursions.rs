mod common;

use std::rc::Rc;

use map_core::{AreaGrid, AreaId, Failure, Pos};

use common::{cave_catalog, corridor};

fn corridor_row() -> (AreaGrid, Pos, Pos) {
    let catalog = cave_catalog();
    let mut area = AreaGrid::new(AreaId(0), Rc::clone(&catalog), 1, 4);
    area.set(Pos::new(0, 0), corridor(&catalog, 0b1000));
    area.set(Pos::new(0, 1), corridor(&catalog, 0b1010));
    area.set(Pos::new(0, 2), corridor(&catalog, 0b1010));
    area.set(Pos::new(0, 3), corridor(&catalog, 0b0010));
    area.validate().unwrap();
    (area, Pos::new(0, 1), Pos::new(0, 2))
}

#[test]
fn failed_excursion_restores_state_bit_for_bit() {
    let (mut area, a, b) = corridor_row();
    let catalog = Rc::clone(area.catalog());
    let before = area.canonical_bytes();
    let hash_before = area.snapshot_hash();

    let result: Result<(), Failure> = area.save_excursion(|grid| {
        grid.set(a, corridor(&catalog, 0b1111));
        grid.set(b, catalog.empty());
        grid.add_required_feature(a, map_core::Features::ARENA);
        Err(Failure::of("driver changed its mind"))
    });

    assert!(result.is_err());
    assert_eq!(area.canonical_bytes(), before);
    assert_eq!(area.snapshot_hash(), hash_before);
    assert!(!area.is_invalid());
}

#[test]
fn successful_excursion_keeps_mutations() {
    let (mut area, a, _) = corridor_row();
    let catalog = Rc::clone(area.catalog());

    area.save_excursion(|grid| {
        grid.try_set(a, corridor(&catalog, 0b1011))?;
        grid.validate()
    })
    .unwrap();

    assert_eq!(area.get(a), corridor(&catalog, 0b1011));
}

#[test]
fn inner_failure_is_invisible_to_a_committing_outer_excursion() {
    let (mut area, a, b) = corridor_row();
    let catalog = Rc::clone(area.catalog());

    area.save_excursion(|grid| {
        grid.try_set(a, corridor(&catalog, 0b1011))?;
        let snapshot_mid = grid.canonical_bytes();
        let inner: Result<(), Failure> = grid.save_excursion(|inner_grid| {
            inner_grid.set(b, corridor(&catalog, 0b1111));
            Err(Failure::of("inner step failed"))
        });
        assert!(inner.is_err());
        assert_eq!(grid.canonical_bytes(), snapshot_mid, "inner rollback must not leak");
        grid.validate()
    })
    .unwrap();

    assert_eq!(area.get(a), corridor(&catalog, 0b1011));
    assert_eq!(area.get(b), corridor(&catalog, 0b1010), "inner edit must not survive");
}

#[test]
fn outer_failure_discards_a_committed_inner_excursion() {
    let (mut area, a, b) = corridor_row();
    let catalog = Rc::clone(area.catalog());
    let before = area.canonical_bytes();

    let result: Result<(), Failure> = area.save_excursion(|grid| {
        grid.save_excursion(|inner_grid| {
            inner_grid.try_set(b, corridor(&catalog, 0b1011))?;
            inner_grid.validate()
        })?;
        grid.set(a, catalog.empty());
        Err(Failure::of("outer step failed after inner commit"))
    });

    assert!(result.is_err());
    assert_eq!(area.canonical_bytes(), before);
}

#[test]
fn panics_inside_an_excursion_become_failures_after_rollback() {
    let (mut area, a, _) = corridor_row();
    let catalog = Rc::clone(area.catalog());
    let before = area.canonical_bytes();

    let result: Result<(), Failure> = area.save_excursion(|grid| {
        grid.set(a, catalog.empty());
        panic!("index invariant broken");
    });

    let failure = result.unwrap_err();
    assert!(
        failure.to_string().contains("index invariant broken"),
        "panic payload should surface in the diagnostic: {failure}",
    );
    assert_eq!(area.canonical_bytes(), before);
}

#[test]
fn validate_failure_marks_invalid_and_rollback_clears_it() {
    let (mut area, a, _) = corridor_row();
    let catalog = Rc::clone(area.catalog());

    let result = area.save_excursion(|grid| {
        // Unchecked write: a south dead end blanks the edge its west
        // neighbor still opens into.
        grid.set(a, corridor(&catalog, 0b0100));
        grid.validate()
    });

    assert!(result.is_err());
    assert!(!area.is_invalid(), "rollback must restore the pre-excursion flag");
    area.validate().unwrap();
}

#[test]
fn set_2d_is_atomic() {
    let (mut area, a, b) = corridor_row();
    let catalog = Rc::clone(area.catalog());
    let before = area.canonical_bytes();

    // The second patch cell closes an edge its east neighbor still opens
    // into, so the whole patch must vanish.
    let bad_patch = vec![vec![Some(corridor(&catalog, 0b1010)), Some(corridor(&catalog, 0b0010))]];
    assert!(area.set_2d(a, &bad_patch).is_err());
    assert_eq!(area.canonical_bytes(), before);

    let good_patch = vec![vec![Some(corridor(&catalog, 0b1010)), Some(corridor(&catalog, 0b1010))]];
    area.set_2d(a, &good_patch).unwrap();
    assert_eq!(area.get(b), corridor(&catalog, 0b1010));
}
