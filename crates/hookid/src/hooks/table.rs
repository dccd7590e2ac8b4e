//! Known builds and their hook sites
//!
//! Each supported executable build is one row. Adding support for a new
//! patch of the target means adding rows here, nothing else.

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

use crate::version::VersionQuad;

/// Which of the two executables is being identified. Their tables are
/// disjoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetKind {
    Runtime,
    Editor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HookEntry {
    pub target: TargetKind,
    pub version: VersionQuad,
    pub region_locked: bool,
    /// Call site redirected into the loader thunk
    pub hook_call_addr: u32,
    /// Import slot / thunk used to load the payload library
    pub load_library_addr: u32,
    /// Build label, also the payload library suffix
    pub label: &'static str,
}

pub static HOOK_TABLE: &[HookEntry] = &[
    HookEntry {
        target: TargetKind::Editor,
        version: VersionQuad::new(1, 4, 0, 518),
        region_locked: false,
        hook_call_addr: 0x00C6_2BC1,
        load_library_addr: 0x00D2_318C,
        label: "1_4",
    },
    HookEntry {
        target: TargetKind::Runtime,
        version: VersionQuad::new(1, 4, 0, 525),
        region_locked: false,
        hook_call_addr: 0x00EC_C46B,
        load_library_addr: 0x00FD_F0B0,
        label: "1_4",
    },
    HookEntry {
        target: TargetKind::Runtime,
        version: VersionQuad::new(1, 4, 0, 525),
        region_locked: true,
        hook_call_addr: 0x00EC_C3FB,
        load_library_addr: 0x00FD_F0B0,
        label: "1_4ng",
    },
];

/// Rows for one target kind, in table order
pub fn entries_for(
    table: &[HookEntry],
    target: TargetKind,
) -> impl Iterator<Item = &HookEntry> + '_ {
    table.iter().filter(move |entry| entry.target == target)
}
