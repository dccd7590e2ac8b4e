//! Section table entries and RVA translation
//!
//! Lookups operate on a plain slice of [`SectionDescriptor`] so they can be
//! exercised against synthetic tables without a full image.

use super::bytes::read_u32;

/// Size of one `IMAGE_SECTION_HEADER` on disk
pub const SECTION_HEADER_SIZE: usize = 40;

/// Width of the fixed section name field
pub const SECTION_NAME_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionDescriptor {
    /// Raw name field, NUL-padded but not necessarily NUL-terminated
    pub name: [u8; SECTION_NAME_LEN],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub characteristics: u32,
}

impl SectionDescriptor {
    pub(crate) fn parse(header: &[u8]) -> Option<Self> {
        let mut name = [0u8; SECTION_NAME_LEN];
        name.copy_from_slice(header.get(..SECTION_NAME_LEN)?);
        Some(Self {
            name,
            virtual_size: read_u32(header, 8)?,
            virtual_address: read_u32(header, 12)?,
            size_of_raw_data: read_u32(header, 16)?,
            pointer_to_raw_data: read_u32(header, 20)?,
            characteristics: read_u32(header, 36)?,
        })
    }

    /// Section name up to the first NUL, lossily decoded
    pub fn name_str(&self) -> String {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(SECTION_NAME_LEN);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Exact comparison against the full 8-byte name field.
    ///
    /// `name` is NUL-padded to the field width; names longer than the field
    /// never match.
    pub fn matches_name(&self, name: &[u8]) -> bool {
        if name.len() > SECTION_NAME_LEN {
            return false;
        }
        let mut padded = [0u8; SECTION_NAME_LEN];
        padded[..name.len()].copy_from_slice(name);
        self.name == padded
    }

    /// Whether `rva` falls in `[VirtualAddress, VirtualAddress + SizeOfRawData]`.
    ///
    /// The upper bound is inclusive. Hook addresses were derived against
    /// tooling with this behaviour, so the end address of one section
    /// resolves into this section rather than the next.
    pub fn contains_rva(&self, rva: u32) -> bool {
        let start = u64::from(self.virtual_address);
        let end = start + u64::from(self.size_of_raw_data);
        (start..=end).contains(&u64::from(rva))
    }

    pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        if !self.contains_rva(rva) {
            return None;
        }
        let delta = rva - self.virtual_address;
        (self.pointer_to_raw_data as usize).checked_add(delta as usize)
    }

    /// End of the raw data range in the file (exclusive)
    pub fn raw_end(&self) -> u64 {
        u64::from(self.pointer_to_raw_data) + u64::from(self.size_of_raw_data)
    }
}

/// First section whose name matches exactly, in on-disk order.
pub fn find_section_by_name<'s>(
    sections: &'s [SectionDescriptor],
    name: &str,
) -> Option<&'s SectionDescriptor> {
    sections
        .iter()
        .find(|section| section.matches_name(name.as_bytes()))
}

/// File offset for `rva`, using the first section that contains it.
pub fn translate_virtual_address(sections: &[SectionDescriptor], rva: u32) -> Option<usize> {
    sections
        .iter()
        .find(|section| section.contains_rva(rva))
        .and_then(|section| section.rva_to_offset(rva))
}
