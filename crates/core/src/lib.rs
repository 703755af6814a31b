pub mod area;
pub mod catalog;
pub mod failure;
pub mod index;
pub mod rng;
pub mod screen;
pub mod types;

pub use area::{
    ALWAYS_SET_FLAG, AreaGrid, AreaRegistry, ExitMove, ExitSpec, FlagAllocator, RawArea,
    RawEntrance, RawExit, RawFlag, RawSpawn, Traversal, TraverseOpts,
};
pub use catalog::{Catalog, CatalogData};
pub use failure::{Check, Failure};
pub use index::{EdgeIndex, ScreenIndex};
pub use screen::{
    Connection, ConnectionKind, EdgeClass, EdgeSignature, Features, FlagRule, Screen, ScreenData,
    mode_index, parse_segments, point_key,
};
pub use types::{AreaId, Dir, Pos, ScreenKey};
