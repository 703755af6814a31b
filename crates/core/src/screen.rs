//! Connection model: edge signatures, feature masks, and the typed
//! connection anchors a screen exposes to its neighbors and to other areas.
//!
//! Everything here is immutable catalog data. The area grid consults these
//! values for compatibility checks but never mutates them.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::failure::Failure;
use crate::types::{Dir, Pos};

/// Opaque edge-class token, one per screen side. Stored as the raw byte of
/// the catalog's signature character; `b' '` is the blank (closed) class.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeClass(pub u8);

impl EdgeClass {
    pub const BLANK: EdgeClass = EdgeClass(b' ');

    pub fn is_blank(self) -> bool {
        self == EdgeClass::BLANK
    }
}

impl fmt::Debug for EdgeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeClass({:?})", self.0 as char)
    }
}

impl fmt::Display for EdgeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0 as char)
    }
}

/// Four edge-class slots: top, left, bottom, right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeSignature([EdgeClass; 4]);

impl EdgeSignature {
    pub const ALL_BLANK: EdgeSignature = EdgeSignature([EdgeClass::BLANK; 4]);

    pub fn parse(spec: &str) -> Result<EdgeSignature, Failure> {
        let bytes = spec.as_bytes();
        if bytes.len() != 4 {
            return Err(Failure::of(format!("edge signature must have 4 slots: {spec:?}")));
        }
        Ok(EdgeSignature([
            EdgeClass(bytes[0]),
            EdgeClass(bytes[1]),
            EdgeClass(bytes[2]),
            EdgeClass(bytes[3]),
        ]))
    }

    pub fn slot(&self, dir: Dir) -> EdgeClass {
        self.0[dir as usize]
    }

    pub fn is_all_blank(&self) -> bool {
        self.0.iter().all(|class| class.is_blank())
    }
}

impl fmt::Display for EdgeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for class in self.0 {
            write!(f, "{class}")?;
        }
        Ok(())
    }
}

bitflags! {
    /// Capabilities a screen provides, or a grid position requires.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct Features: u32 {
        const EMPTY       = 1 << 0;
        const PIT         = 1 << 1;
        const ARENA       = 1 << 2;
        const SPIKES      = 1 << 3;
        const WIDE        = 1 << 4;
        const RIVER       = 1 << 5;
        const BRIDGE      = 1 << 6;
        const WALL        = 1 << 7;
        const RAMP        = 1 << 8;
        const OVERPASS    = 1 << 9;
        const UNDERPASS   = 1 << 10;
        const WHIRLPOOL   = 1 << 11;
        const DEAD_END    = 1 << 12;
        const STAIRS      = 1 << 13;
        const STAIR_UP    = 1 << 16;
        const STAIR_DOWN  = 1 << 17;
        const MANUAL      = 1 << 30;
        const CONSOLIDATE = 1 << 31;
    }
}

impl Features {
    pub fn parse(name: &str) -> Option<Features> {
        Some(match name {
            "empty" => Features::EMPTY,
            "pit" => Features::PIT,
            "arena" => Features::ARENA,
            "spikes" => Features::SPIKES,
            "wide" => Features::WIDE,
            "river" => Features::RIVER,
            "bridge" => Features::BRIDGE,
            "wall" => Features::WALL,
            "ramp" => Features::RAMP,
            "overpass" => Features::OVERPASS,
            "underpass" => Features::UNDERPASS,
            "whirlpool" => Features::WHIRLPOOL,
            "deadend" => Features::DEAD_END,
            "stairs" => Features::STAIRS,
            "stair:up" => Features::STAIR_UP,
            "stair:down" => Features::STAIR_DOWN,
            "manual" => Features::MANUAL,
            "consolidate" => Features::CONSOLIDATE,
            _ => return None,
        })
    }
}

/// Closed set of connection kinds. Matching on this is exhaustive, so a new
/// kind cannot be added without updating every consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConnectionKind {
    #[serde(rename = "stair:up")]
    StairUp,
    #[serde(rename = "stair:down")]
    StairDown,
    #[serde(rename = "edge:top")]
    EdgeTop,
    #[serde(rename = "edge:bottom")]
    EdgeBottom,
    #[serde(rename = "edge:left")]
    EdgeLeft,
    #[serde(rename = "edge:right")]
    EdgeRight,
    #[serde(rename = "seamless:up")]
    SeamlessUp,
    #[serde(rename = "seamless:down")]
    SeamlessDown,
    #[serde(rename = "cave")]
    Cave,
    #[serde(rename = "door")]
    Door,
    #[serde(rename = "gate")]
    Gate,
    #[serde(rename = "swamp")]
    Swamp,
    #[serde(rename = "fortress")]
    Fortress,
}

impl ConnectionKind {
    pub fn is_seamless(self) -> bool {
        matches!(self, ConnectionKind::SeamlessUp | ConnectionKind::SeamlessDown)
    }

    /// The kind a seamless exit's partner must declare.
    pub fn seamless_partner(self) -> Option<ConnectionKind> {
        match self {
            ConnectionKind::SeamlessUp => Some(ConnectionKind::SeamlessDown),
            ConnectionKind::SeamlessDown => Some(ConnectionKind::SeamlessUp),
            _ => None,
        }
    }

    pub fn edge_dir(self) -> Option<Dir> {
        match self {
            ConnectionKind::EdgeTop => Some(Dir::North),
            ConnectionKind::EdgeLeft => Some(Dir::West),
            ConnectionKind::EdgeBottom => Some(Dir::South),
            ConnectionKind::EdgeRight => Some(Dir::East),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionKind::StairUp => "stair:up",
            ConnectionKind::StairDown => "stair:down",
            ConnectionKind::EdgeTop => "edge:top",
            ConnectionKind::EdgeBottom => "edge:bottom",
            ConnectionKind::EdgeLeft => "edge:left",
            ConnectionKind::EdgeRight => "edge:right",
            ConnectionKind::SeamlessUp => "seamless:up",
            ConnectionKind::SeamlessDown => "seamless:down",
            ConnectionKind::Cave => "cave",
            ConnectionKind::Door => "door",
            ConnectionKind::Gate => "gate",
            ConnectionKind::Swamp => "swamp",
            ConnectionKind::Fortress => "fortress",
        };
        f.write_str(name)
    }
}

/// Typed anchor on a screen usable as an inter-area link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub kind: ConnectionKind,
    pub dir: Dir,
    /// Sub-tile pixel coordinate (YyXx) where something entering through
    /// this connection spawns.
    pub entrance: u16,
    /// In-screen tile coordinates (Yx nibbles) that act as the exit hitbox.
    pub exits: Vec<u8>,
}

/// Whether a screen needs a world-state flag to be open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagRule {
    /// The flag is hardwired set; emit the shared always-set flag id.
    Always,
    /// A per-position custom flag toggles this screen.
    Custom,
}

/// Serde mirror of one catalog screen entry, as stored in data files.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScreenData {
    pub name: String,
    /// Tileset-local raw screen id, as stored in the external format.
    pub sid: u8,
    #[serde(default)]
    pub edges: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub flag: Option<FlagRule>,
    /// Intra-screen routing spec; see [`parse_segments`].
    #[serde(default)]
    pub connect: Option<String>,
    #[serde(default)]
    pub exits: Vec<Connection>,
}

/// One immutable catalog entry.
#[derive(Clone, Debug)]
pub struct Screen {
    pub name: String,
    pub sid: u8,
    pub edges: Option<EdgeSignature>,
    pub features: Features,
    pub flag: Option<FlagRule>,
    pub connections: Vec<Connection>,
    /// Connection segments per movement mode; see [`mode_index`].
    segments: [Vec<Vec<u8>>; 4],
}

impl Screen {
    pub fn from_data(data: &ScreenData) -> Result<Screen, Failure> {
        let edges = match &data.edges {
            Some(spec) => Some(EdgeSignature::parse(spec)?),
            None => None,
        };
        let mut features = Features::empty();
        for name in &data.features {
            let flag = Features::parse(name)
                .ok_or_else(|| Failure::of(format!("unknown feature {name:?} on {}", data.name)))?;
            features |= flag;
        }
        for connection in &data.exits {
            match connection.kind {
                ConnectionKind::StairUp => features |= Features::STAIR_UP,
                ConnectionKind::StairDown => features |= Features::STAIR_DOWN,
                _ => {}
            }
        }
        let segments = match &data.connect {
            Some(spec) => parse_segments(spec)
                .map_err(|f| Failure::all(vec![f], format!("bad connect spec on {}", data.name)))?,
            None => [Vec::new(), Vec::new(), Vec::new(), Vec::new()],
        };
        Ok(Screen {
            name: data.name.clone(),
            sid: data.sid,
            edges,
            features,
            flag: data.flag,
            connections: data.exits.clone(),
            segments,
        })
    }

    pub fn has_feature(&self, feature: Features) -> bool {
        self.features.contains(feature)
    }

    pub fn is_empty(&self) -> bool {
        self.features.contains(Features::EMPTY)
    }

    /// Mutually-reachable point groups under the given movement mode.
    pub fn segments(&self, flight: bool, no_flagged: bool) -> &[Vec<u8>] {
        &self.segments[mode_index(flight, no_flagged)]
    }

    pub fn find_connection(&self, kind: ConnectionKind) -> Option<&Connection> {
        self.connections.iter().find(|c| c.kind == kind)
    }

    /// Connection whose exit hitbox covers the given tile.
    pub fn connection_at_exit_tile(&self, tile: u8) -> Option<&Connection> {
        self.connections.iter().find(|c| c.exits.contains(&tile))
    }

    /// Non-seamless connection whose entrance anchor matches the coordinate.
    pub fn connection_at_entrance(&self, coord: u16) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| !c.kind.is_seamless() && c.entrance == coord)
    }
}

pub fn mode_index(flight: bool, no_flagged: bool) -> usize {
    (usize::from(flight) << 1) | usize::from(no_flagged)
}

/// Parse a routing spec into segments for all four movement modes.
///
/// Hex digits are access points: 1-3 on the top edge, 5-7 left, 9-b bottom,
/// d-f right. Separator characters close the current segment depending on
/// mode: `|` always blocks, `:` is water (blocks unless flying), `=` is a
/// breakable wall (blocks when flags are off the table), `-` is a flagged
/// bridge (blocks without flags, flyable).
pub fn parse_segments(spec: &str) -> Result<[Vec<Vec<u8>>; 4], Failure> {
    let mut out: [Vec<Vec<u8>>; 4] = [Vec::new(), Vec::new(), Vec::new(), Vec::new()];
    for (mode, segments) in out.iter_mut().enumerate() {
        let flight = mode & 2 != 0;
        let no_flagged = mode & 1 != 0;
        let mut current: Vec<u8> = Vec::new();
        for ch in spec.chars() {
            match ch {
                '0'..='9' | 'a'..='f' => {
                    current.push(ch.to_digit(16).expect("hex digit") as u8);
                }
                '|' | ':' | '=' | '-' => {
                    let blocks = match ch {
                        '|' => true,
                        ':' => !flight,
                        '=' => no_flagged,
                        '-' => no_flagged && !flight,
                        _ => unreachable!(),
                    };
                    if blocks && !current.is_empty() {
                        segments.push(std::mem::take(&mut current));
                    }
                }
                _ => return Err(Failure::of(format!("bad connect char {ch:?} in {spec:?}"))),
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
    }
    Ok(out)
}

/// Canonical key for an intra-screen access point: `(pos << 8) | channel`.
///
/// Points on a shared edge are given the same key from both sides: digits
/// with the 8-bit set refer to the corresponding edge of the neighbor below
/// (bottom edge) or to the right (right edge), folding the two half-edges
/// onto one key.
pub fn point_key(pos: Pos, digit: u8) -> u32 {
    let channel = u32::from(digit & 3) << (digit & 4);
    let offset = if digit & 8 != 0 {
        if digit & 4 != 0 { 0x0100 } else { 0x1000 }
    } else {
        0
    };
    (u32::from(pos.0) << 8) + channel + offset
}
