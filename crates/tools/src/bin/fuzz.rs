use std::fs;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use map_core::{AreaGrid, AreaId, Catalog, CatalogData, Dir, Features, Pos, ScreenIndex};
use rand_chacha::{
    ChaCha8Rng,
    rand_core::{Rng, SeedableRng},
};

/// Random-edit fuzz harness: fill a grid, then hammer it with clears, edge
/// removals, and feature additions, checking that failed edits roll back
/// exactly and successful ones keep the grid valid.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the tileset catalog JSON file
    #[arg(short, long)]
    catalog: String,

    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    #[arg(short = 'n', long, default_value_t = 1000)]
    steps: u32,

    #[arg(long, default_value_t = 8)]
    width: u8,

    #[arg(long, default_value_t = 8)]
    height: u8,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let catalog_data = fs::read_to_string(&args.catalog)
        .with_context(|| format!("Failed to read catalog file: {}", args.catalog))?;
    let catalog_data: CatalogData =
        serde_json::from_str(&catalog_data).context("Failed to deserialize catalog JSON")?;
    let catalog =
        Rc::new(Catalog::from_data(&catalog_data).map_err(|e| anyhow::anyhow!("Bad catalog: {e}"))?);
    let index = ScreenIndex::new(Rc::clone(&catalog), "c", Features::empty());
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

    println!("Fuzzing {}x{} grid on seed {} for {} steps...", args.width, args.height, args.seed, args.steps);

    let mut area = AreaGrid::new(AreaId(0), Rc::clone(&catalog), args.height, args.width);
    let candidates: Vec<_> = catalog
        .screens()
        .filter(|(_, s)| !s.is_empty() && s.edges.is_some())
        .map(|(key, _)| key)
        .collect();
    for pos in area.all_pos().collect::<Vec<_>>() {
        let shuffled = map_core::rng::shuffled(&mut rng, &candidates);
        let _ = area.try_add_one_of(pos, &shuffled);
    }
    area.validate().map_err(|e| anyhow::anyhow!("initial fill invalid:\n{e}"))?;
    println!("{}", area.show());

    let mut cleared = 0u32;
    let mut edges_removed = 0u32;
    let mut rolled_back = 0u32;
    for step in 0..args.steps {
        let y = (rng.next_u32() % u32::from(args.height)) as u8;
        let x = (rng.next_u32() % u32::from(args.width)) as u8;
        let pos = Pos::new(y, x);
        let before = area.snapshot_hash();
        let result = match step % 3 {
            0 => area.save_excursion(|grid| {
                index.try_clear(grid, pos, &mut rng)?;
                grid.validate()
            }),
            1 => area.save_excursion(|grid| {
                index.try_clear_edge(grid, pos, Dir::East, &mut rng)?;
                grid.validate()
            }),
            _ => area.save_excursion(|grid| {
                index.try_add_feature(grid, pos, Features::ARENA, &mut rng)?;
                grid.validate()
            }),
        };
        match result {
            Ok(()) => match step % 3 {
                0 => cleared += 1,
                1 => edges_removed += 1,
                _ => {}
            },
            Err(_) => {
                rolled_back += 1;
                assert_eq!(area.snapshot_hash(), before, "rollback must restore state exactly");
            }
        }
    }

    println!("{}", area.show());
    println!("cleared: {cleared}, edges removed: {edges_removed}, rolled back: {rolled_back}");
    println!("final filled: {}, valid: {}", area.filled(), !area.is_invalid());

    Ok(())
}
