//! Identification settings
//!
//! Passed explicitly into every stage instead of living in globals. The
//! defaults describe the stock target; a CLI or host can override them from a
//! config file since the struct deserializes with per-field defaults.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::image::SECTION_NAME_LEN;

/// Configuration for [`crate::identify`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyConfig {
    /// Section added by the distribution platform's loader stub
    pub distribution_section: String,
    /// Section added by the packer's unpacking stub
    pub packer_section: String,
    /// Section brute-force scanned for a debug signature record
    pub signature_section: String,
    /// Substring of the PDB path that marks the region-locked build
    pub region_marker: String,
    /// Fall back to scanning `signature_section` when the debug directory
    /// is implausible
    pub slow_scan: bool,
    /// Prefix of the payload library name (`<stem>_<label>.dll`)
    pub library_stem: String,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            distribution_section: ".bind".to_string(),
            packer_section: "UPX0".to_string(),
            signature_section: ".rdata".to_string(),
            region_marker: "FalloutNVng.pdb".to_string(),
            slow_scan: true,
            library_stem: "nvse".to_string(),
        }
    }
}

impl IdentifyConfig {
    /// Create a new configuration builder
    pub fn builder() -> IdentifyConfigBuilder {
        IdentifyConfigBuilder::default()
    }

    /// Reject settings that could never match anything
    pub fn validate(&self) -> Result<()> {
        for (field, name) in [
            ("distribution_section", &self.distribution_section),
            ("packer_section", &self.packer_section),
            ("signature_section", &self.signature_section),
        ] {
            if name.is_empty() || name.len() > SECTION_NAME_LEN {
                return Err(Error::Config(format!(
                    "{} must be 1-{} bytes, got '{}'",
                    field, SECTION_NAME_LEN, name
                )));
            }
        }
        if self.region_marker.is_empty() {
            return Err(Error::Config("region_marker must not be empty".to_string()));
        }
        if self.library_stem.is_empty() {
            return Err(Error::Config("library_stem must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for IdentifyConfig
#[derive(Debug, Clone, Default)]
pub struct IdentifyConfigBuilder {
    distribution_section: Option<String>,
    packer_section: Option<String>,
    signature_section: Option<String>,
    region_marker: Option<String>,
    slow_scan: Option<bool>,
    library_stem: Option<String>,
}

impl IdentifyConfigBuilder {
    pub fn distribution_section<S: Into<String>>(mut self, name: S) -> Self {
        self.distribution_section = Some(name.into());
        self
    }

    pub fn packer_section<S: Into<String>>(mut self, name: S) -> Self {
        self.packer_section = Some(name.into());
        self
    }

    pub fn signature_section<S: Into<String>>(mut self, name: S) -> Self {
        self.signature_section = Some(name.into());
        self
    }

    pub fn region_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.region_marker = Some(marker.into());
        self
    }

    /// Enable or disable the brute-force signature scan
    pub fn slow_scan(mut self, enabled: bool) -> Self {
        self.slow_scan = Some(enabled);
        self
    }

    pub fn library_stem<S: Into<String>>(mut self, stem: S) -> Self {
        self.library_stem = Some(stem.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> IdentifyConfig {
        let default = IdentifyConfig::default();
        IdentifyConfig {
            distribution_section: self
                .distribution_section
                .unwrap_or(default.distribution_section),
            packer_section: self.packer_section.unwrap_or(default.packer_section),
            signature_section: self.signature_section.unwrap_or(default.signature_section),
            region_marker: self.region_marker.unwrap_or(default.region_marker),
            slow_scan: self.slow_scan.unwrap_or(default.slow_scan),
            library_stem: self.library_stem.unwrap_or(default.library_stem),
        }
    }
}
