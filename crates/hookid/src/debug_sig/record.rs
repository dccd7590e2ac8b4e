//! CodeView `RSDS` records
//!
//! A record is a 24-byte header followed by a NUL-terminated PDB path. The
//! path is not length-prefixed, so [`CodeViewRecord`] keeps a borrowed view
//! that runs to the end of the scanned buffer and only reads the path under a
//! fixed bound.

use memchr::memmem;
use uguid::Guid;

use crate::image::read_u32;

pub const CODEVIEW_MAGIC: &[u8; 4] = b"RSDS";

/// Magic + GUID + age
pub const RECORD_HEADER_SIZE: usize = 24;

/// Longest path accepted before the record is considered garbage
pub const MAX_PATH_LEN: usize = 0x80;

/// Outcome of validating a record's path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCheck<'a> {
    /// Bad magic, missing drive prefix, unprintable byte or unterminated
    /// within [`MAX_PATH_LEN`]
    Rejected,
    /// The path runs past the end of the buffer before a verdict was reached
    OutOfBounds,
    /// Structurally valid record
    Probable { path: &'a [u8], region_locked: bool },
}

/// Borrowed view of a record starting at some offset of a larger buffer.
#[derive(Debug, Clone, Copy)]
pub struct CodeViewRecord<'a> {
    bytes: &'a [u8],
}

impl<'a> CodeViewRecord<'a> {
    /// View `bytes` as a record. `None` if the fixed header doesn't fit.
    pub fn new(bytes: &'a [u8]) -> Option<Self> {
        (bytes.len() >= RECORD_HEADER_SIZE).then_some(Self { bytes })
    }

    pub fn magic_valid(&self) -> bool {
        self.bytes.starts_with(CODEVIEW_MAGIC)
    }

    pub fn guid(&self) -> Guid {
        let mut raw = [0u8; 16];
        raw.copy_from_slice(&self.bytes[4..20]);
        Guid::from_bytes(raw)
    }

    pub fn age(&self) -> u32 {
        read_u32(self.bytes, 20).unwrap_or_default()
    }

    /// Everything after the fixed header, up to the end of the buffer
    pub fn trailing(&self) -> &'a [u8] {
        &self.bytes[RECORD_HEADER_SIZE..]
    }

    /// Validate the path and look for `marker` in it.
    ///
    /// The path must start with `<letter>:\` and consist of printable 7-bit
    /// bytes up to a NUL within [`MAX_PATH_LEN`] bytes. The marker search is a
    /// case-sensitive substring match.
    pub fn check(&self, marker: &str) -> PathCheck<'a> {
        if !self.magic_valid() {
            return PathCheck::Rejected;
        }

        let path = self.trailing();
        let Some(prefix) = path.get(..3) else {
            return PathCheck::OutOfBounds;
        };
        if !prefix[0].is_ascii_alphabetic() || prefix[1] != b':' || prefix[2] != b'\\' {
            return PathCheck::Rejected;
        }

        for index in 0..MAX_PATH_LEN {
            let Some(&byte) = path.get(index) else {
                return PathCheck::OutOfBounds;
            };
            if byte == 0 {
                let path = &path[..index];
                let region_locked = memmem::find(path, marker.as_bytes()).is_some();
                return PathCheck::Probable {
                    path,
                    region_locked,
                };
            }
            if !is_print(byte) {
                return PathCheck::Rejected;
            }
        }

        PathCheck::Rejected
    }
}

/// Printable 7-bit ASCII, space included
fn is_print(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte)
}

/// Owned copy of a record that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSignature {
    /// Offset of the record within the mapped image
    pub offset: usize,
    pub guid: Guid,
    pub age: u32,
    pub path: String,
}

impl DebugSignature {
    pub(crate) fn from_record(offset: usize, record: &CodeViewRecord<'_>, path: &[u8]) -> Self {
        Self {
            offset,
            guid: record.guid(),
            age: record.age(),
            // Validated as printable ASCII, so this never replaces anything
            path: String::from_utf8_lossy(path).into_owned(),
        }
    }
}
