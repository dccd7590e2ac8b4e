use thiserror::Error;

use super::table::{HOOK_TABLE, HookEntry, TargetKind, entries_for};
use crate::error::{Error, Result};
use crate::variant::VariantFlags;
use crate::version::VersionQuad;

/// Why a version has no table row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnknownVersion {
    #[error("Please update to the latest version of the executable (oldest supported is {oldest})")]
    Outdated { oldest: VersionQuad },

    #[error(
        "You are using a newer version of the executable than this build supports \
         (newest supported is {newest}). If the patch just came out, please be patient \
         while the address table is updated"
    )]
    Newer { newest: VersionQuad },

    #[error("You have an unknown version of the executable")]
    UnknownBuild,
}

/// Variants that are recognised but refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BlockReason {
    #[error("Packed versions of the executable are not supported")]
    Packed,

    #[error(
        "The region-locked build of the executable is not supported. Obtain an unlocked \
         executable from your distributor"
    )]
    RegionLocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'t> {
    Resolved(&'t HookEntry),
    Unknown(UnknownVersion),
    Blocked(BlockReason),
}

impl<'t> Resolution<'t> {
    pub fn into_result(self, version: VersionQuad) -> Result<&'t HookEntry> {
        match self {
            Resolution::Resolved(entry) => Ok(entry),
            Resolution::Unknown(kind) => Err(Error::UnknownVersion { version, kind }),
            Resolution::Blocked(reason) => Err(Error::Blocked { version, reason }),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// Look `version` up in the built-in table.
pub fn resolve(
    version: VersionQuad,
    flags: VariantFlags,
    target: TargetKind,
) -> Resolution<'static> {
    resolve_in(HOOK_TABLE, version, flags, target)
}

/// Look `version` up in `table`.
///
/// Packed images are refused before the version is even considered. A
/// region-locked image only resolves to a row explicitly marked
/// region-locked and is blocked otherwise, whatever its version.
pub fn resolve_in<'t>(
    table: &'t [HookEntry],
    version: VersionQuad,
    flags: VariantFlags,
    target: TargetKind,
) -> Resolution<'t> {
    if flags.packed {
        return Resolution::Blocked(BlockReason::Packed);
    }

    if let Some(entry) = entries_for(table, target)
        .find(|entry| entry.version == version && entry.region_locked == flags.region_locked)
    {
        return Resolution::Resolved(entry);
    }

    if flags.region_locked {
        return Resolution::Blocked(BlockReason::RegionLocked);
    }

    let oldest = entries_for(table, target).map(|entry| entry.version).min();
    let newest = entries_for(table, target).map(|entry| entry.version).max();
    match (oldest, newest) {
        (Some(oldest), _) if version < oldest => {
            Resolution::Unknown(UnknownVersion::Outdated { oldest })
        }
        (_, Some(newest)) if version >= newest => {
            Resolution::Unknown(UnknownVersion::Newer { newest })
        }
        _ => Resolution::Unknown(UnknownVersion::UnknownBuild),
    }
}
