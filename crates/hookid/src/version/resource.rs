//! `RT_VERSION` resource lookup
//!
//! Walks the three-level resource tree (type → name → language) to the
//! `VS_VERSIONINFO` blob and decodes its `VS_FIXEDFILEINFO`.

use std::path::Path;

use tracing::debug;

use super::VersionQuad;
use crate::error::{Error, Result};
use crate::image::{IMAGE_DIRECTORY_ENTRY_RESOURCE, MappedImage, PeImage, read_u16, read_u32};

pub const RT_VERSION: u32 = 16;
pub const VS_FIXEDFILEINFO_SIGNATURE: u32 = 0xFEEF_04BD;

const VS_VERSION_INFO_KEY: &str = "VS_VERSION_INFO";
const FIXED_FILE_INFO_SIZE: usize = 52;
const SUBDIRECTORY_FLAG: u32 = 0x8000_0000;

/// `VS_FIXEDFILEINFO`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFileInfo {
    pub signature: u32,
    pub struc_version: u32,
    pub file_version_ms: u32,
    pub file_version_ls: u32,
    pub product_version_ms: u32,
    pub product_version_ls: u32,
    pub file_flags_mask: u32,
    pub file_flags: u32,
    pub file_os: u32,
    pub file_type: u32,
    pub file_subtype: u32,
    pub file_date_ms: u32,
    pub file_date_ls: u32,
}

impl FixedFileInfo {
    fn parse(bytes: &[u8]) -> Option<Self> {
        let word = |index: usize| read_u32(bytes, index * 4);
        Some(Self {
            signature: word(0)?,
            struc_version: word(1)?,
            file_version_ms: word(2)?,
            file_version_ls: word(3)?,
            product_version_ms: word(4)?,
            product_version_ls: word(5)?,
            file_flags_mask: word(6)?,
            file_flags: word(7)?,
            file_os: word(8)?,
            file_type: word(9)?,
            file_subtype: word(10)?,
            file_date_ms: word(11)?,
            file_date_ls: word(12)?,
        })
    }

    pub fn file_version(&self) -> VersionQuad {
        VersionQuad::from_ms_ls(self.file_version_ms, self.file_version_ls)
    }

    pub fn product_version(&self) -> VersionQuad {
        VersionQuad::from_ms_ls(self.product_version_ms, self.product_version_ls)
    }
}

/// Read the file version of the executable at `path`.
///
/// The file is mapped only for the duration of the call.
pub fn probe_version<P: AsRef<Path>>(path: P) -> Result<VersionQuad> {
    let mapped = MappedImage::open(path)?;
    let pe = PeImage::parse(mapped.bytes()).map_err(|e| unavailable(&e.to_string()))?;
    let info = fixed_file_info(&pe)?;

    debug!("dwSignature = {:08X}", info.signature);
    debug!("dwStrucVersion = {:08X}", info.struc_version);
    debug!("dwFileVersionMS = {:08X}", info.file_version_ms);
    debug!("dwFileVersionLS = {:08X}", info.file_version_ls);
    debug!("dwProductVersionMS = {:08X}", info.product_version_ms);
    debug!("dwProductVersionLS = {:08X}", info.product_version_ls);
    debug!("dwFileFlagsMask = {:08X}", info.file_flags_mask);
    debug!("dwFileFlags = {:08X}", info.file_flags);
    debug!("dwFileOS = {:08X}", info.file_os);
    debug!("dwFileType = {:08X}", info.file_type);
    debug!("dwFileSubtype = {:08X}", info.file_subtype);
    debug!("dwFileDateMS = {:08X}", info.file_date_ms);
    debug!("dwFileDateLS = {:08X}", info.file_date_ls);

    Ok(info.file_version())
}

/// Locate and decode the `VS_FIXEDFILEINFO` of a parsed image.
pub fn fixed_file_info(pe: &PeImage<'_>) -> Result<FixedFileInfo> {
    let blob = version_blob(pe)?;
    parse_version_info(blob)
}

fn version_blob<'a>(pe: &PeImage<'a>) -> Result<&'a [u8]> {
    let directory = pe
        .data_directory(IMAGE_DIRECTORY_ENTRY_RESOURCE)
        .filter(|dir| dir.virtual_address != 0)
        .ok_or_else(|| unavailable("image has no resource directory"))?;
    let base = pe
        .translate_rva(directory.virtual_address)
        .ok_or_else(|| unavailable("resource directory lies outside every section"))?;
    let rsrc = pe
        .tail_from(base)
        .ok_or_else(|| unavailable("resource directory lies outside the image"))?;

    let by_name = subdirectory(find_entry(rsrc, 0, Some(RT_VERSION))?)?;
    let by_language = subdirectory(find_entry(rsrc, by_name, None)?)?;
    let data_entry = find_entry(rsrc, by_language, None)?;
    if data_entry & SUBDIRECTORY_FLAG != 0 {
        return Err(unavailable("version resource tree is deeper than expected"));
    }

    let data_entry = data_entry as usize;
    let (data_rva, size) = match (read_u32(rsrc, data_entry), read_u32(rsrc, data_entry + 4)) {
        (Some(rva), Some(size)) => (rva, size),
        _ => return Err(unavailable("truncated resource data entry")),
    };
    let offset = pe
        .translate_rva(data_rva)
        .ok_or_else(|| unavailable("version resource data lies outside every section"))?;
    pe.bytes_at(offset, size as usize)
        .ok_or_else(|| unavailable("version resource data extends past end of file"))
}

/// Return the raw `OffsetToData` of the entry with `id`, or of the first
/// entry when `id` is `None`.
fn find_entry(rsrc: &[u8], directory: usize, id: Option<u32>) -> Result<u32> {
    let named = read_u16(rsrc, directory + 12);
    let ids = read_u16(rsrc, directory + 14);
    let (named, ids) = match (named, ids) {
        (Some(named), Some(ids)) => (named as usize, ids as usize),
        _ => return Err(unavailable("truncated resource directory")),
    };

    for index in 0..named + ids {
        let entry = directory + 16 + index * 8;
        let (name, offset) = match (read_u32(rsrc, entry), read_u32(rsrc, entry + 4)) {
            (Some(name), Some(offset)) => (name, offset),
            _ => return Err(unavailable("truncated resource directory entry")),
        };
        match id {
            None => return Ok(offset),
            Some(wanted) if name & SUBDIRECTORY_FLAG == 0 && name == wanted => return Ok(offset),
            Some(_) => {}
        }
    }

    Err(unavailable("no version resource"))
}

fn subdirectory(offset: u32) -> Result<usize> {
    if offset & SUBDIRECTORY_FLAG == 0 {
        return Err(unavailable("expected a resource subdirectory"));
    }
    Ok((offset & !SUBDIRECTORY_FLAG) as usize)
}

/// Decode the fixed info from a `VS_VERSIONINFO` blob.
pub fn parse_version_info(blob: &[u8]) -> Result<FixedFileInfo> {
    let value_length =
        read_u16(blob, 2).ok_or_else(|| unavailable("truncated VS_VERSIONINFO"))? as usize;

    let key: Option<Vec<u16>> = (0..=VS_VERSION_INFO_KEY.len())
        .map(|i| read_u16(blob, 6 + i * 2))
        .collect();
    let expected: Vec<u16> = VS_VERSION_INFO_KEY
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect();
    if key.as_ref() != Some(&expected) {
        return Err(unavailable("VS_VERSIONINFO key mismatch"));
    }

    if value_length < FIXED_FILE_INFO_SIZE {
        return Err(unavailable("VS_VERSIONINFO has no fixed file info"));
    }

    // Value follows the key, aligned to 32 bits from the start of the block
    let key_end = 6 + expected.len() * 2;
    let value_offset = (key_end + 3) & !3;
    let info = blob
        .get(value_offset..value_offset + FIXED_FILE_INFO_SIZE)
        .and_then(FixedFileInfo::parse)
        .ok_or_else(|| unavailable("truncated VS_FIXEDFILEINFO"))?;

    if info.signature != VS_FIXEDFILEINFO_SIGNATURE {
        return Err(unavailable(&format!(
            "bad VS_FIXEDFILEINFO signature {:08X}",
            info.signature
        )));
    }

    Ok(info)
}

fn unavailable(message: &str) -> Error {
    Error::VersionUnavailable(message.to_string())
}
