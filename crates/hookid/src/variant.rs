//! Distribution / packing / region variant detection

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};
use tracing::info;

use crate::config::IdentifyConfig;
use crate::debug_sig::{DebugSignatureScanner, SignatureScan};
use crate::image::PeImage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct VariantFlags {
    /// Distribution platform loader stub present
    pub distribution: bool,
    /// Packer stub present; code sections are compressed on disk
    pub packed: bool,
    /// Debug record names the region-locked build
    pub region_locked: bool,
}

impl VariantFlags {
    pub fn proc_type(&self) -> ProcType {
        if self.packed {
            ProcType::Packed
        } else if self.distribution {
            ProcType::Distribution
        } else {
            ProcType::Normal
        }
    }
}

/// How the executable was shipped, as far as installers care
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcType {
    Normal,
    Distribution,
    Packed,
}

/// Flags plus the signature scan they were derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub flags: VariantFlags,
    pub signature: SignatureScan,
}

pub fn classify(pe: &PeImage<'_>, config: &IdentifyConfig) -> Classification {
    let distribution = pe.has_section(&config.distribution_section);
    let packed = pe.has_section(&config.packer_section);
    let signature = DebugSignatureScanner::new(config).scan(pe);

    let flags = VariantFlags {
        distribution,
        packed,
        region_locked: signature.region_locked,
    };

    info!(
        "{} exe (distribution={}, packed={}, region_locked={}, signature_probable={})",
        flags.proc_type(),
        flags.distribution,
        flags.packed,
        flags.region_locked,
        signature.probable
    );
    if let Some(found) = &signature.signature {
        info!("pdb path = {}", found.path);
    }

    Classification { flags, signature }
}
