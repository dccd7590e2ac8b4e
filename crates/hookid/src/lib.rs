//! # hookid
//!
//! Build identification and code patching for a script-extender loader.
//!
//! This crate provides:
//! - PE image mapping and section / RVA helpers
//! - File version probing from the `RT_VERSION` resource
//! - Variant detection (distribution stub, packer, region-locked build)
//! - Hook address resolution against a table of supported builds
//! - Patch writing into executable memory with rollback

pub mod config;
pub mod debug_sig;
pub mod error;
pub mod hooks;
pub mod identify;
pub mod image;
pub mod patch;
pub mod variant;
pub mod version;

#[cfg(test)]
mod testing;

pub use config::{IdentifyConfig, IdentifyConfigBuilder};
pub use debug_sig::{DebugSignature, DebugSignatureScanner, ScanSource, SignatureScan};
pub use error::{Error, Result};
pub use hooks::{
    BlockReason, HOOK_TABLE, HookEntry, Resolution, TargetKind, UnknownVersion, resolve,
};
pub use identify::{HookInfo, ImageScan, identify, resolve_scan, scan};
pub use image::{MappedImage, PeImage, SectionDescriptor};
pub use patch::{Branch, CodeMemory, Condition, PatchOp, PatchWidth, PatchWriter, ProcessMemory};
pub use variant::{Classification, ProcType, VariantFlags, classify};
pub use version::{FixedFileInfo, VersionQuad, probe_version};
