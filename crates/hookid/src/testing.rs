//! Synthetic PE32 images for tests
//!
//! Layout is fixed so tests can compute offsets up front: headers occupy the
//! first 0x400 bytes, section `i` is mapped at RVA `0x1000 * (i + 1)` and
//! stored at file offset `0x400 + 0x1000 * i`, each with 0x1000 bytes of raw
//! data.

use std::io::Write;

use tempfile::NamedTempFile;

const E_LFANEW: usize = 0x40;
const OPTIONAL_HEADER_SIZE: usize = 0xE0;
const HEADERS_SIZE: usize = 0x400;
const SECTION_SIZE: usize = 0x1000;

pub(crate) struct PeBuilder {
    sections: Vec<([u8; 8], Vec<u8>)>,
    directories: [(u32, u32); 16],
}

impl PeBuilder {
    pub const OPTIONAL_HEADER_OFFSET: usize = E_LFANEW + 4 + 20;

    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
            directories: [(0, 0); 16],
        }
    }

    pub fn section(mut self, name: &str, data: Vec<u8>) -> Self {
        assert!(name.len() <= 8 && data.len() <= SECTION_SIZE);
        let mut raw_name = [0u8; 8];
        raw_name[..name.len()].copy_from_slice(name.as_bytes());
        self.sections.push((raw_name, data));
        self
    }

    pub fn data_directory(mut self, index: usize, rva: u32, size: u32) -> Self {
        self.directories[index] = (rva, size);
        self
    }

    pub const fn section_rva(index: usize) -> u32 {
        (SECTION_SIZE * (index + 1)) as u32
    }

    pub const fn section_raw_offset(index: usize) -> u32 {
        (HEADERS_SIZE + SECTION_SIZE * index) as u32
    }

    pub fn build(self) -> Vec<u8> {
        let mut image = vec![0u8; HEADERS_SIZE + SECTION_SIZE * self.sections.len()];

        image[..2].copy_from_slice(b"MZ");
        put_u32(&mut image, 0x3C, E_LFANEW as u32);
        image[E_LFANEW..E_LFANEW + 4].copy_from_slice(b"PE\0\0");

        let file_header = E_LFANEW + 4;
        put_u16(&mut image, file_header, 0x014C);
        put_u16(&mut image, file_header + 2, self.sections.len() as u16);
        put_u16(&mut image, file_header + 16, OPTIONAL_HEADER_SIZE as u16);
        put_u16(&mut image, file_header + 18, 0x0102);

        let optional = Self::OPTIONAL_HEADER_OFFSET;
        put_u16(&mut image, optional, 0x10B);
        put_u32(&mut image, optional + 28, 0x0040_0000);
        put_u32(&mut image, optional + 92, 16);
        for (index, (rva, size)) in self.directories.iter().enumerate() {
            put_u32(&mut image, optional + 96 + index * 8, *rva);
            put_u32(&mut image, optional + 100 + index * 8, *size);
        }

        let table = optional + OPTIONAL_HEADER_SIZE;
        for (index, (name, data)) in self.sections.iter().enumerate() {
            let header = table + index * 40;
            image[header..header + 8].copy_from_slice(name);
            put_u32(&mut image, header + 8, data.len() as u32);
            put_u32(&mut image, header + 12, Self::section_rva(index));
            put_u32(&mut image, header + 16, SECTION_SIZE as u32);
            put_u32(&mut image, header + 20, Self::section_raw_offset(index));
            put_u32(&mut image, header + 36, 0x4000_0040);

            let raw = Self::section_raw_offset(index) as usize;
            image[raw..raw + data.len()].copy_from_slice(data);
        }

        image
    }
}

/// `RSDS` record: magic, GUID, age, NUL-terminated path
pub(crate) fn codeview_record(path: &str) -> Vec<u8> {
    let mut record = Vec::with_capacity(24 + path.len() + 1);
    record.extend_from_slice(b"RSDS");
    record.extend_from_slice(&[
        0x5D, 0x6A, 0x0E, 0x2B, 0x71, 0x3C, 0x4F, 0x41, 0x9A, 0x10, 0x33, 0x82, 0x6B, 0xE4, 0x07,
        0xC1,
    ]);
    record.extend_from_slice(&1u32.to_le_bytes());
    record.extend_from_slice(path.as_bytes());
    record.push(0);
    record
}

/// `IMAGE_DEBUG_DIRECTORY` of type CodeView
pub(crate) fn debug_directory(
    address_of_raw_data: u32,
    pointer_to_raw_data: u32,
    size: u32,
) -> Vec<u8> {
    let mut dir = vec![0u8; 28];
    put_u32(&mut dir, 4, 0x4C8E_F2A1);
    put_u32(&mut dir, 12, 2);
    put_u32(&mut dir, 16, size);
    put_u32(&mut dir, 20, address_of_raw_data);
    put_u32(&mut dir, 24, pointer_to_raw_data);
    dir
}

/// Resource tree holding a single `RT_VERSION` entry, for a `.rsrc`
/// section mapped at `section_rva`.
pub(crate) fn version_resource(
    section_rva: u32,
    file_version_ms: u32,
    file_version_ls: u32,
) -> Vec<u8> {
    let mut rsrc = vec![0u8; 0x58];

    // Root directory: one id entry, RT_VERSION -> name directory
    put_u16(&mut rsrc, 14, 1);
    put_u32(&mut rsrc, 0x10, 16);
    put_u32(&mut rsrc, 0x14, 0x8000_0000 | 0x18);
    // Name directory: id 1 -> language directory
    put_u16(&mut rsrc, 0x18 + 14, 1);
    put_u32(&mut rsrc, 0x28, 1);
    put_u32(&mut rsrc, 0x2C, 0x8000_0000 | 0x30);
    // Language directory: 0x409 -> data entry
    put_u16(&mut rsrc, 0x30 + 14, 1);
    put_u32(&mut rsrc, 0x40, 0x409);
    put_u32(&mut rsrc, 0x44, 0x48);

    let info = vs_version_info(file_version_ms, file_version_ls);
    put_u32(&mut rsrc, 0x48, section_rva + 0x58);
    put_u32(&mut rsrc, 0x4C, info.len() as u32);
    rsrc.extend_from_slice(&info);
    rsrc
}

/// `VS_VERSIONINFO` with only the fixed file info populated
pub(crate) fn vs_version_info(file_version_ms: u32, file_version_ls: u32) -> Vec<u8> {
    let mut info = Vec::new();
    info.extend_from_slice(&0u16.to_le_bytes());
    info.extend_from_slice(&52u16.to_le_bytes());
    info.extend_from_slice(&0u16.to_le_bytes());
    for unit in "VS_VERSION_INFO\0".encode_utf16() {
        info.extend_from_slice(&unit.to_le_bytes());
    }
    // Key ends at 38; pad the value to a 32-bit boundary
    info.extend_from_slice(&[0, 0]);

    let fixed = [
        0xFEEF_04BD,
        0x0001_0000,
        file_version_ms,
        file_version_ls,
        file_version_ms,
        file_version_ls,
        0x3F,
        0,
        0x0004_0004,
        1,
        0,
        0,
        0,
    ];
    for word in fixed {
        info.extend_from_slice(&u32::to_le_bytes(word));
    }
    let len = info.len() as u16;
    info[..2].copy_from_slice(&len.to_le_bytes());
    info
}

/// Copy `bytes` into `buffer` at `offset`, growing it if needed
pub(crate) fn place(buffer: &mut Vec<u8>, offset: usize, bytes: &[u8]) {
    if buffer.len() < offset + bytes.len() {
        buffer.resize(offset + bytes.len(), 0);
    }
    buffer[offset..offset + bytes.len()].copy_from_slice(bytes);
}

pub(crate) fn write_temp(image: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(image).unwrap();
    file.flush().unwrap();
    file
}

fn put_u16(buffer: &mut [u8], offset: usize, value: u16) {
    buffer[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buffer: &mut [u8], offset: usize, value: u32) {
    buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
