//! Debug signature scan
//!
//! Two tiers: trust the debug directory when it looks sane, otherwise walk a
//! section looking for an `RSDS` record at every 4-byte boundary. The
//! directory of some distribution builds points at the wrong place, which is
//! why the fallback exists.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::record::{CodeViewRecord, DebugSignature, PathCheck, RECORD_HEADER_SIZE};
use crate::config::IdentifyConfig;
use crate::image::{IMAGE_DIRECTORY_ENTRY_DEBUG, PeImage, read_u32};

pub const IMAGE_DEBUG_TYPE_CODEVIEW: u32 = 2;

const DEBUG_DIRECTORY_SIZE: usize = 28;
/// Upper bound for a believable `SizeOfData`
const MAX_DEBUG_DATA_SIZE: u32 = 0x100;
/// Upper bound for believable raw data addresses/pointers
const MAX_DEBUG_DATA_POINTER: u32 = 0x1000_0000;
const SCAN_ALIGNMENT: usize = 4;

/// Which tier produced the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSource {
    DebugDirectory,
    SectionScan,
}

/// Result of the debug-directory tier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryScan {
    /// Directory passed the sanity checks
    pub plausible: bool,
    /// The record it points at has a valid magic
    pub probable: bool,
    pub region_locked: bool,
    pub signature: Option<DebugSignature>,
}

/// Result of the brute-force tier over one region
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionScan {
    /// Offset of the first structurally valid record, relative to the region
    pub offset: Option<usize>,
    pub probable: bool,
    pub region_locked: bool,
    pub signature: Option<DebugSignature>,
    /// Candidates discarded because their path ran off the buffer
    pub discarded: usize,
}

/// Combined outcome of both tiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureScan {
    pub region_locked: bool,
    /// A structurally valid record was seen; diagnostics only
    pub probable: bool,
    pub source: Option<ScanSource>,
    pub signature: Option<DebugSignature>,
}

/// Scanner configured with the marker and fallback section to use
#[derive(Debug, Clone, Copy)]
pub struct DebugSignatureScanner<'c> {
    marker: &'c str,
    section: &'c str,
    slow_scan: bool,
}

impl<'c> DebugSignatureScanner<'c> {
    pub fn new(config: &'c IdentifyConfig) -> Self {
        Self {
            marker: &config.region_marker,
            section: &config.signature_section,
            slow_scan: config.slow_scan,
        }
    }

    pub fn scan(&self, pe: &PeImage<'_>) -> SignatureScan {
        let fast = self.scan_directory(pe);
        if fast.probable {
            debug!(
                "Debug directory: probable={}, region_locked={}",
                fast.probable, fast.region_locked
            );
            return SignatureScan {
                region_locked: fast.region_locked,
                probable: fast.probable,
                source: Some(ScanSource::DebugDirectory),
                signature: fast.signature,
            };
        }

        if !self.slow_scan {
            debug!(
                "No debug record via directory (plausible={}) and slow scan disabled",
                fast.plausible
            );
            return SignatureScan::default();
        }

        info!("Using slow signature check over {}", self.section);
        let Some(section) = pe.find_section(self.section) else {
            debug!("No {} section to scan", self.section);
            return SignatureScan::default();
        };

        let start = section.pointer_to_raw_data as usize;
        let slow = self.scan_region(pe.data(), start, section.size_of_raw_data as usize);
        SignatureScan {
            region_locked: slow.region_locked,
            probable: slow.probable,
            source: slow.offset.map(|_| ScanSource::SectionScan),
            signature: slow.signature,
        }
    }

    /// Check the record the debug directory points at.
    pub fn scan_directory(&self, pe: &PeImage<'_>) -> DirectoryScan {
        let mut result = DirectoryScan::default();

        let Some(directory) = pe
            .data_directory(IMAGE_DIRECTORY_ENTRY_DEBUG)
            .filter(|dir| dir.virtual_address != 0)
        else {
            return result;
        };
        let Some(entry) = pe
            .translate_rva(directory.virtual_address)
            .and_then(|offset| pe.bytes_at(offset, DEBUG_DIRECTORY_SIZE))
        else {
            return result;
        };

        let field = |offset: usize| read_u32(entry, offset).unwrap_or(u32::MAX);
        let characteristics = field(0);
        let kind = field(12);
        let size_of_data = field(16);
        let address_of_raw_data = field(20);
        let pointer_to_raw_data = field(24);

        if characteristics != 0
            || kind != IMAGE_DEBUG_TYPE_CODEVIEW
            || size_of_data >= MAX_DEBUG_DATA_SIZE
            || address_of_raw_data >= MAX_DEBUG_DATA_POINTER
            || pointer_to_raw_data >= MAX_DEBUG_DATA_POINTER
        {
            debug!(
                "Implausible debug directory: type={}, size={:#x}, address={:#x}, pointer={:#x}",
                kind, size_of_data, address_of_raw_data, pointer_to_raw_data
            );
            return result;
        }
        result.plausible = true;

        let offset = pointer_to_raw_data as usize;
        let Some(record) = pe.tail_from(offset).and_then(CodeViewRecord::new) else {
            return result;
        };
        if !record.magic_valid() {
            return result;
        }
        result.probable = true;

        match record.check(self.marker) {
            PathCheck::Probable {
                path,
                region_locked,
            } => {
                result.region_locked = region_locked;
                result.signature = Some(DebugSignature::from_record(offset, &record, path));
            }
            PathCheck::OutOfBounds => {
                warn!("Debug record at {:#x} runs past end of image", offset);
            }
            PathCheck::Rejected => {}
        }
        result
    }

    /// Walk `buffer[start..start + len]` at 4-byte steps for a record.
    ///
    /// Stops at the first structurally valid record. A candidate whose path
    /// would be read beyond `buffer` is discarded and the walk goes on.
    pub fn scan_region(&self, buffer: &[u8], start: usize, len: usize) -> RegionScan {
        let mut result = RegionScan::default();
        let end = start.saturating_add(len).min(buffer.len());
        if start >= end {
            return result;
        }
        let region_len = end - start;

        let mut index = 0;
        while index + RECORD_HEADER_SIZE <= region_len {
            let at = start + index;
            let Some(record) = CodeViewRecord::new(&buffer[at..]) else {
                break;
            };

            match record.check(self.marker) {
                PathCheck::Probable {
                    path,
                    region_locked,
                } => {
                    debug!(
                        "Found debug record at {:#x}: {}",
                        at,
                        String::from_utf8_lossy(path)
                    );
                    result.offset = Some(index);
                    result.probable = true;
                    result.region_locked = region_locked;
                    result.signature = Some(DebugSignature::from_record(at, &record, path));
                    return result;
                }
                PathCheck::OutOfBounds => {
                    warn!("Exception while scanning for debug record at {:#x}", at);
                    result.discarded += 1;
                }
                PathCheck::Rejected => {}
            }
            index += SCAN_ALIGNMENT;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PeBuilder, codeview_record, debug_directory, place};

    const NG_PATH: &str = r"c:\_Fallout\FalloutNVng.pdb";
    const STOCK_PATH: &str = r"c:\_Fallout\FalloutNV.pdb";

    fn scan_config() -> IdentifyConfig {
        IdentifyConfig::default()
    }

    /// `.rdata` holding a debug directory at 0x10 and a record at 0x40
    fn image_with_directory(path: &str) -> Vec<u8> {
        let record_raw = PeBuilder::section_raw_offset(0) + 0x40;
        let record_rva = PeBuilder::section_rva(0) + 0x40;
        let record = codeview_record(path);

        let mut rdata = Vec::new();
        place(
            &mut rdata,
            0x10,
            &debug_directory(record_rva, record_raw, record.len() as u32),
        );
        place(&mut rdata, 0x40, &record);

        PeBuilder::new()
            .section(".rdata", rdata)
            .data_directory(IMAGE_DIRECTORY_ENTRY_DEBUG, PeBuilder::section_rva(0) + 0x10, 28)
            .build()
    }

    #[test]
    fn test_directory_path_region_locked() {
        let image = image_with_directory(NG_PATH);
        let pe = PeImage::parse(&image).unwrap();
        let config = scan_config();
        let scanner = DebugSignatureScanner::new(&config);

        let fast = scanner.scan_directory(&pe);
        assert!(fast.plausible && fast.probable && fast.region_locked);
        let signature = fast.signature.unwrap();
        assert_eq!(signature.path, NG_PATH);
        assert_eq!(
            signature.offset,
            PeBuilder::section_raw_offset(0) as usize + 0x40
        );

        let scan = scanner.scan(&pe);
        assert!(scan.region_locked);
        assert_eq!(scan.source, Some(ScanSource::DebugDirectory));
    }

    #[test]
    fn test_directory_path_stock_build() {
        let image = image_with_directory(STOCK_PATH);
        let pe = PeImage::parse(&image).unwrap();
        let config = scan_config();
        let scan = DebugSignatureScanner::new(&config).scan(&pe);
        assert!(scan.probable);
        assert!(!scan.region_locked);
    }

    #[test]
    fn test_plausible_directory_without_record_falls_back() {
        let mut image = image_with_directory(NG_PATH);
        // Directory passes the sanity checks but points at zeroed bytes
        let record = PeBuilder::section_raw_offset(0) as usize + 0x40;
        image[record..record + 4].fill(0);
        let slow_at = PeBuilder::section_raw_offset(0) as usize + 0x200;
        let ng = codeview_record(NG_PATH);
        image[slow_at..slow_at + ng.len()].copy_from_slice(&ng);

        let pe = PeImage::parse(&image).unwrap();
        let config = scan_config();
        let scanner = DebugSignatureScanner::new(&config);
        let fast = scanner.scan_directory(&pe);
        assert!(fast.plausible && !fast.probable);

        let scan = scanner.scan(&pe);
        assert!(scan.probable);
        assert!(scan.region_locked);
        assert_eq!(scan.source, Some(ScanSource::SectionScan));
        assert_eq!(scan.signature.unwrap().offset, slow_at);
    }

    #[test]
    fn test_plausible_directory_without_record_and_no_slow_scan() {
        let mut image = image_with_directory(NG_PATH);
        let record = PeBuilder::section_raw_offset(0) as usize + 0x40;
        image[record..record + 4].fill(0);

        let pe = PeImage::parse(&image).unwrap();
        let config = IdentifyConfig::builder().slow_scan(false).build();
        let scan = DebugSignatureScanner::new(&config).scan(&pe);
        assert_eq!(scan, SignatureScan::default());
    }

    #[test]
    fn test_implausible_directory_falls_back_to_section_scan() {
        let mut image = image_with_directory(STOCK_PATH);
        // Corrupt the directory's type field
        let dir = PeBuilder::section_raw_offset(0) as usize + 0x10;
        image[dir + 12..dir + 16].copy_from_slice(&7u32.to_le_bytes());
        // The real record lives elsewhere
        let slow_at = PeBuilder::section_raw_offset(0) as usize + 0x300;
        let ng = codeview_record(NG_PATH);
        image[slow_at..slow_at + ng.len()].copy_from_slice(&ng);

        let pe = PeImage::parse(&image).unwrap();
        let config = scan_config();
        let scanner = DebugSignatureScanner::new(&config);
        assert!(!scanner.scan_directory(&pe).plausible);

        // The stock record at 0x40 is the first valid one, so the scan stops there
        let scan = scanner.scan(&pe);
        assert!(scan.probable);
        assert!(!scan.region_locked);
        assert_eq!(scan.source, Some(ScanSource::SectionScan));
        assert_eq!(
            scan.signature.unwrap().offset,
            PeBuilder::section_raw_offset(0) as usize + 0x40
        );
    }

    #[test]
    fn test_sanity_bounds() {
        for (field, value) in [(0usize, 1u32), (16, 0x100), (20, 0x1000_0000), (24, 0x1000_0000)] {
            let mut image = image_with_directory(NG_PATH);
            let dir = PeBuilder::section_raw_offset(0) as usize + 0x10;
            image[dir + field..dir + field + 4].copy_from_slice(&value.to_le_bytes());
            let pe = PeImage::parse(&image).unwrap();
            let config = IdentifyConfig::builder().slow_scan(false).build();
            let scan = DebugSignatureScanner::new(&config).scan_directory(&pe);
            assert!(!scan.plausible, "field {} = {:#x}", field, value);
        }
    }

    #[test]
    fn test_no_directory_and_slow_scan_disabled() {
        let mut rdata = vec![0u8; 0x100];
        place(&mut rdata, 0x20, &codeview_record(NG_PATH));
        let image = PeBuilder::new().section(".rdata", rdata).build();
        let pe = PeImage::parse(&image).unwrap();

        let config = IdentifyConfig::builder().slow_scan(false).build();
        assert_eq!(
            DebugSignatureScanner::new(&config).scan(&pe),
            SignatureScan::default()
        );

        let config = scan_config();
        let scan = DebugSignatureScanner::new(&config).scan(&pe);
        assert!(scan.region_locked);
        assert_eq!(scan.source, Some(ScanSource::SectionScan));
    }

    #[test]
    fn test_region_scan_finds_record_at_aligned_offset() {
        let config = scan_config();
        let scanner = DebugSignatureScanner::new(&config);
        for k in [0usize, 4, 0x24, 0x1F0] {
            let mut buffer = vec![0u8; 0x400];
            // Noise with the magic but no drive prefix before k
            if k >= 0x24 {
                place(&mut buffer, 0x8, b"RSDS");
            }
            place(&mut buffer, k, &codeview_record(NG_PATH));
            let scan = scanner.scan_region(&buffer, 0, buffer.len());
            assert_eq!(scan.offset, Some(k));
            assert!(scan.probable && scan.region_locked);
        }
    }

    #[test]
    fn test_region_scan_relative_to_start() {
        let config = scan_config();
        let scanner = DebugSignatureScanner::new(&config);
        let mut buffer = vec![0u8; 0x400];
        place(&mut buffer, 0x108, &codeview_record(STOCK_PATH));
        let scan = scanner.scan_region(&buffer, 0x100, 0x200);
        assert_eq!(scan.offset, Some(8));
        assert!(scan.probable);
        assert!(!scan.region_locked);
        assert_eq!(scan.signature.unwrap().offset, 0x108);
    }

    #[test]
    fn test_region_scan_skips_unaligned_records() {
        let config = scan_config();
        let scanner = DebugSignatureScanner::new(&config);
        let mut buffer = vec![0u8; 0x200];
        place(&mut buffer, 0x22, &codeview_record(NG_PATH));
        let scan = scanner.scan_region(&buffer, 0, buffer.len());
        assert_eq!(scan.offset, None);
        assert!(!scan.probable);
    }

    #[test]
    fn test_region_scan_without_record() {
        let config = scan_config();
        let scanner = DebugSignatureScanner::new(&config);
        let buffer: Vec<u8> = (0..0x400u32).map(|i| (i * 7) as u8).collect();
        let scan = scanner.scan_region(&buffer, 0, buffer.len());
        assert_eq!(scan, RegionScan::default());
        assert!(!scan.probable);
    }

    #[test]
    fn test_region_scan_rejects_malformed_then_finds_valid() {
        let config = scan_config();
        let scanner = DebugSignatureScanner::new(&config);
        let mut buffer = vec![0u8; 0x300];
        // Magic but overlong path
        let mut bad = codeview_record(&format!(r"c:\{}", "x".repeat(0x90)));
        bad.pop();
        bad.push(b'y');
        place(&mut buffer, 0x10, &bad);
        let good_at = 0x10 + ((bad.len() + 4) & !3);
        place(&mut buffer, good_at, &codeview_record(NG_PATH));

        let scan = scanner.scan_region(&buffer, 0, buffer.len());
        assert_eq!(scan.offset, Some(good_at));
        assert!(scan.region_locked);
    }

    #[test]
    fn test_region_scan_discards_candidate_running_off_buffer() {
        let config = scan_config();
        let scanner = DebugSignatureScanner::new(&config);
        let mut buffer = vec![0u8; 0x100];
        let record = codeview_record(NG_PATH);
        let at = 0x100 - RECORD_HEADER_SIZE - 8;
        // Only the header and the first 8 path bytes fit
        buffer[at..].copy_from_slice(&record[..RECORD_HEADER_SIZE + 8]);

        let scan = scanner.scan_region(&buffer, 0, buffer.len());
        assert_eq!(scan.offset, None);
        assert_eq!(scan.discarded, 1);
        assert!(!scan.region_locked);
    }

    #[test]
    fn test_region_scan_clamps_to_buffer() {
        let config = scan_config();
        let scanner = DebugSignatureScanner::new(&config);
        let buffer = vec![0u8; 0x40];
        assert_eq!(scanner.scan_region(&buffer, 0x20, 0x1000), RegionScan::default());
        assert_eq!(scanner.scan_region(&buffer, 0x80, 0x10), RegionScan::default());
    }
}
