//! PE header parsing over a borrowed byte view
//!
//! Only the pieces identification needs are decoded: the section table and
//! the optional header's data directories. Every read is bounds-checked, so a
//! truncated or hostile file yields [`Error::MalformedImage`] instead of a
//! panic.

use tracing::debug;

use super::bytes::{read_u16, read_u32};
use super::section::{
    SECTION_HEADER_SIZE, SectionDescriptor, find_section_by_name, translate_virtual_address,
};
use crate::error::{Error, Result};

pub const IMAGE_DIRECTORY_ENTRY_RESOURCE: usize = 2;
pub const IMAGE_DIRECTORY_ENTRY_DEBUG: usize = 6;

const DOS_MAGIC: &[u8; 2] = b"MZ";
const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";
const E_LFANEW_OFFSET: usize = 0x3C;
const FILE_HEADER_SIZE: usize = 20;

const OPTIONAL_MAGIC_PE32: u16 = 0x10B;
const OPTIONAL_MAGIC_PE32_PLUS: u16 = 0x20B;

/// `IMAGE_DATA_DIRECTORY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

/// Parsed view of a PE file's headers.
///
/// Borrows the raw file bytes; nothing is copied except the small section and
/// directory tables.
#[derive(Debug)]
pub struct PeImage<'a> {
    data: &'a [u8],
    sections: Vec<SectionDescriptor>,
    data_directories: Vec<DataDirectory>,
}

impl<'a> PeImage<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.get(..2) != Some(DOS_MAGIC.as_slice()) {
            return Err(malformed("missing MZ signature"));
        }

        let nt_offset = read_u32(data, E_LFANEW_OFFSET)
            .ok_or_else(|| malformed("truncated DOS header"))? as usize;
        if data.get(nt_offset..nt_offset.saturating_add(4)) != Some(PE_SIGNATURE.as_slice()) {
            return Err(malformed("missing PE signature"));
        }

        let file_header = nt_offset + 4;
        let section_count = read_u16(data, file_header + 2)
            .ok_or_else(|| malformed("truncated file header"))?;
        let optional_size = read_u16(data, file_header + 16)
            .ok_or_else(|| malformed("truncated file header"))? as usize;

        let optional_header = file_header + FILE_HEADER_SIZE;
        let data_directories = Self::parse_data_directories(data, optional_header, optional_size)?;

        let table_start = optional_header + optional_size;
        let mut sections = Vec::with_capacity(section_count as usize);
        for index in 0..section_count as usize {
            let start = table_start + index * SECTION_HEADER_SIZE;
            let section = data
                .get(start..start + SECTION_HEADER_SIZE)
                .and_then(SectionDescriptor::parse)
                .ok_or_else(|| malformed("section table extends past end of file"))?;

            if section.size_of_raw_data > 0 && section.raw_end() > data.len() as u64 {
                return Err(malformed(&format!(
                    "section {} raw data [{:#x}, {:#x}) lies outside the {:#x}-byte image",
                    section.name_str(),
                    section.pointer_to_raw_data,
                    section.raw_end(),
                    data.len()
                )));
            }
            sections.push(section);
        }

        debug!(
            "Parsed PE image: {} sections, {} data directories",
            sections.len(),
            data_directories.len()
        );

        Ok(Self {
            data,
            sections,
            data_directories,
        })
    }

    fn parse_data_directories(
        data: &[u8],
        optional_header: usize,
        optional_size: usize,
    ) -> Result<Vec<DataDirectory>> {
        let magic =
            read_u16(data, optional_header).ok_or_else(|| malformed("truncated optional header"))?;
        let (count_offset, directories_offset) = match magic {
            OPTIONAL_MAGIC_PE32 => (92, 96),
            OPTIONAL_MAGIC_PE32_PLUS => (108, 112),
            other => {
                return Err(malformed(&format!(
                    "unknown optional header magic {:#06x}",
                    other
                )));
            }
        };
        if optional_size < directories_offset {
            return Err(malformed("optional header too small for data directories"));
        }

        let declared = read_u32(data, optional_header + count_offset)
            .ok_or_else(|| malformed("truncated optional header"))? as usize;
        // Never trust the declared count beyond what the header size allows
        let fits = (optional_size - directories_offset) / 8;
        let count = declared.min(fits);

        (0..count)
            .map(|index| {
                let entry = optional_header + directories_offset + index * 8;
                match (read_u32(data, entry), read_u32(data, entry + 4)) {
                    (Some(virtual_address), Some(size)) => Ok(DataDirectory {
                        virtual_address,
                        size,
                    }),
                    _ => Err(malformed("data directory table extends past end of file")),
                }
            })
            .collect()
    }

    /// The whole mapped file
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Address of the first byte of the view in this process
    pub fn base_address(&self) -> usize {
        self.data.as_ptr() as usize
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sections(&self) -> &[SectionDescriptor] {
        &self.sections
    }

    pub fn find_section(&self, name: &str) -> Option<&SectionDescriptor> {
        find_section_by_name(&self.sections, name)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.find_section(name).is_some()
    }

    pub fn translate_rva(&self, rva: u32) -> Option<usize> {
        translate_virtual_address(&self.sections, rva)
    }

    pub fn data_directory(&self, index: usize) -> Option<DataDirectory> {
        self.data_directories.get(index).copied()
    }

    /// Raw bytes of a section (empty for sections without file data)
    pub fn section_data(&self, section: &SectionDescriptor) -> &'a [u8] {
        let start = section.pointer_to_raw_data as usize;
        let end = start + section.size_of_raw_data as usize;
        self.data.get(start..end).unwrap_or(&[])
    }

    /// `len` bytes at a file offset, if they lie inside the image
    pub fn bytes_at(&self, offset: usize, len: usize) -> Option<&'a [u8]> {
        self.data.get(offset..offset.checked_add(len)?)
    }

    /// Everything from a file offset to the end of the image
    pub fn tail_from(&self, offset: usize) -> Option<&'a [u8]> {
        self.data.get(offset..)
    }
}

fn malformed(message: &str) -> Error {
    Error::MalformedImage(message.to_string())
}
