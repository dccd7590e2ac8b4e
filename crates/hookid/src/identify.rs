//! Startup identification pipeline
//!
//! Probe the file version, map the image to classify its variant, release the
//! mapping, then look the build up in the hook table.

use std::path::Path;

use serde::Serialize;
use tracing::{error, info};

use crate::config::IdentifyConfig;
use crate::debug_sig::ScanSource;
use crate::error::Result;
use crate::hooks::{HookEntry, TargetKind, resolve};
use crate::image::{MappedImage, PeImage};
use crate::variant::{Classification, ProcType, VariantFlags, classify};
use crate::version::{VersionQuad, probe_version};

/// Everything learned about an executable short of resolving it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageScan {
    pub version: VersionQuad,
    pub proc_type: ProcType,
    pub flags: VariantFlags,
    pub signature_probable: bool,
    pub signature_source: Option<ScanSource>,
    pub pdb_path: Option<String>,
    pub pdb_guid: Option<String>,
    pub pdb_age: Option<u32>,
}

impl ImageScan {
    fn new(version: VersionQuad, classification: Classification) -> Self {
        let Classification { flags, signature } = classification;
        let found = signature.signature.as_ref();
        Self {
            version,
            proc_type: flags.proc_type(),
            flags,
            signature_probable: signature.probable,
            signature_source: signature.source,
            pdb_path: found.map(|s| s.path.clone()),
            pdb_guid: found.map(|s| s.guid.to_string()),
            pdb_age: found.map(|s| s.age),
        }
    }
}

/// Where to hook a supported build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookInfo {
    pub target: TargetKind,
    pub version: VersionQuad,
    pub proc_type: ProcType,
    pub region_locked: bool,
    pub hook_call_addr: u32,
    pub load_library_addr: u32,
    pub label: &'static str,
}

impl HookInfo {
    fn new(scan: &ImageScan, entry: &HookEntry) -> Self {
        Self {
            target: entry.target,
            version: scan.version,
            proc_type: scan.proc_type,
            region_locked: entry.region_locked,
            hook_call_addr: entry.hook_call_addr,
            load_library_addr: entry.load_library_addr,
            label: entry.label,
        }
    }

    /// Payload library to load, e.g. `nvse_1_4.dll`
    pub fn library_name(&self, stem: &str) -> String {
        format!("{}_{}.dll", stem, self.label)
    }
}

/// Version and variant of the executable at `path`.
pub fn scan<P: AsRef<Path>>(path: P, config: &IdentifyConfig) -> Result<ImageScan> {
    config.validate()?;
    let path = path.as_ref();

    let version = probe_version(path)?;
    info!("version = {:016X} ({})", version, version);

    let classification = {
        let mapped = MappedImage::open(path)?;
        let pe = PeImage::parse(mapped.bytes())?;
        classify(&pe, config)
    };

    Ok(ImageScan::new(version, classification))
}

/// Identify the executable at `path` and find its hook sites.
pub fn identify<P: AsRef<Path>>(
    path: P,
    target: TargetKind,
    config: &IdentifyConfig,
) -> Result<HookInfo> {
    let scan = scan(path, config)?;
    resolve_scan(&scan, target, config)
}

/// Look an already scanned executable up in the hook table.
pub fn resolve_scan(
    scan: &ImageScan,
    target: TargetKind,
    config: &IdentifyConfig,
) -> Result<HookInfo> {
    match resolve(scan.version, scan.flags, target).into_result(scan.version) {
        Ok(entry) => {
            let info = HookInfo::new(scan, entry);
            info!(
                "Resolved {} {} (hook call {:#010x}, load library {:#010x}) -> {}",
                target,
                info.label,
                info.hook_call_addr,
                info.load_library_addr,
                info.library_name(&config.library_stem)
            );
            Ok(info)
        }
        Err(e) => {
            error!("{}", e);
            Err(e)
        }
    }
}
