use std::fs;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use map_core::{AreaId, AreaRegistry, Catalog, CatalogData, RawArea, TraverseOpts};

/// Load a catalog and a set of area descriptions, validate every area, and
/// report grids and reachability partitions.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the tileset catalog JSON file
    #[arg(short, long)]
    catalog: String,

    /// Path to the areas JSON file (an array of area descriptions)
    #[arg(short, long)]
    areas: String,

    /// Traverse assuming flight
    #[arg(long)]
    flight: bool,

    /// Traverse without assuming breakable walls or bridges
    #[arg(long)]
    no_flagged: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let catalog_data = fs::read_to_string(&args.catalog)
        .with_context(|| format!("Failed to read catalog file: {}", args.catalog))?;
    let catalog_data: CatalogData =
        serde_json::from_str(&catalog_data).context("Failed to deserialize catalog JSON")?;
    let catalog = Catalog::from_data(&catalog_data)
        .map_err(|e| anyhow::anyhow!("Bad catalog: {e}"))?;

    let area_data = fs::read_to_string(&args.areas)
        .with_context(|| format!("Failed to read areas file: {}", args.areas))?;
    let raws: Vec<RawArea> =
        serde_json::from_str(&area_data).context("Failed to deserialize areas JSON")?;

    let registry = match AreaRegistry::from_raw(Rc::new(catalog), &raws) {
        Ok(registry) => registry,
        Err(failure) => bail!("Parse failed:\n{failure}"),
    };

    let opts = TraverseOpts { flight: args.flight, no_flagged: args.no_flagged, without: vec![] };
    for i in 0..registry.len() {
        let area = registry.area(AreaId(i as u8));
        println!("Area {:02x} ({}x{}, {} filled)", i, area.width(), area.height(), area.filled());
        println!("{}", area.show());
        let traversal = area.traverse(&opts);
        let sizes: Vec<usize> = traversal.partitions().map(|set| set.len()).collect();
        println!("Partitions: {} {:?}", traversal.partition_count(), sizes);
        let exits: usize = area.exits().count();
        println!("Exits: {exits}");
        println!();
    }

    Ok(())
}
