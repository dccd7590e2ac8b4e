//! Sections command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use hookid::image::{MappedImage, PeImage};
use hookid::version::fixed_file_info;

const IMAGE_SCN_MEM_EXECUTE: u32 = 0x2000_0000;
const IMAGE_SCN_MEM_READ: u32 = 0x4000_0000;
const IMAGE_SCN_MEM_WRITE: u32 = 0x8000_0000;

/// Run the sections command
pub fn run(exe: &Path) -> Result<()> {
    let mapped =
        MappedImage::open(exe).with_context(|| format!("Failed to open {}", exe.display()))?;
    let pe = PeImage::parse(mapped.bytes())
        .with_context(|| format!("{} is not a PE image", exe.display()))?;

    println!("=== {} ===", exe.display());
    match fixed_file_info(&pe) {
        Ok(info) => println!("File version: {}", info.file_version()),
        Err(e) => println!("File version: unavailable ({})", e),
    }
    println!();
    println!(
        "{:<8}  {:>10}  {:>10}  {:>10}  {:>10}  {:>4}",
        "Name", "VA", "VSize", "RawPtr", "RawSize", "Mode"
    );
    for section in pe.sections() {
        println!(
            "{:<8}  0x{:08X}  0x{:08X}  0x{:08X}  0x{:08X}  {:>4}",
            section.name_str(),
            section.virtual_address,
            section.virtual_size,
            section.pointer_to_raw_data,
            section.size_of_raw_data,
            access_mode(section.characteristics)
        );
    }
    println!();
    println!("{} section(s)", pe.sections().len());

    Ok(())
}

/// `RWX`-style summary of the memory characteristics
fn access_mode(characteristics: u32) -> String {
    [
        (IMAGE_SCN_MEM_READ, 'R'),
        (IMAGE_SCN_MEM_WRITE, 'W'),
        (IMAGE_SCN_MEM_EXECUTE, 'X'),
    ]
    .iter()
    .map(|&(flag, c)| if characteristics & flag != 0 { c } else { '-' })
    .collect()
}
