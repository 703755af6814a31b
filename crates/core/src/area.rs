//! Per-area mutable grid, exit linkage, and reachability.

mod exits;
mod grid;
mod raw;
mod traverse;
mod write;

pub use exits::{AreaRegistry, ExitMove, ExitSpec};
pub use grid::AreaGrid;
pub use raw::{RawArea, RawEntrance, RawExit, RawFlag, RawSpawn};
pub use traverse::{Traversal, TraverseOpts};
pub use write::{ALWAYS_SET_FLAG, FlagAllocator};
