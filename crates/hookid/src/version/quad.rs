use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};

/// File version packed as `major.minor.build.revision`, 16 bits each.
///
/// The packing puts `major` in the top 16 bits, so comparing the raw `u64`
/// gives the same order as comparing dotted versions field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct VersionQuad(u64);

impl VersionQuad {
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self(
            (major as u64) << 48 | (minor as u64) << 32 | (build as u64) << 16 | revision as u64,
        )
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Build from the `dwFileVersionMS` / `dwFileVersionLS` pair of a
    /// `VS_FIXEDFILEINFO`.
    pub const fn from_ms_ls(ms: u32, ls: u32) -> Self {
        Self((ms as u64) << 32 | ls as u64)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn major(self) -> u16 {
        (self.0 >> 48) as u16
    }

    pub const fn minor(self) -> u16 {
        (self.0 >> 32) as u16
    }

    pub const fn build(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub const fn revision(self) -> u16 {
        self.0 as u16
    }
}

impl fmt::Display for VersionQuad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major(),
            self.minor(),
            self.build(),
            self.revision()
        )
    }
}

impl fmt::UpperHex for VersionQuad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

impl FromStr for VersionQuad {
    type Err = Error;

    /// Parse `1.4.0.525`; missing trailing fields are zero.
    fn from_str(s: &str) -> Result<Self> {
        let mut fields = [0u16; 4];
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(Error::Config(format!("Invalid version '{}'", s)));
        }
        for (slot, part) in fields.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|e| Error::Config(format!("Invalid version '{}': {}", s, e)))?;
        }
        Ok(Self::new(fields[0], fields[1], fields[2], fields[3]))
    }
}
