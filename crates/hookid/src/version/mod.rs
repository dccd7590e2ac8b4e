mod quad;
mod resource;

pub use quad::VersionQuad;
pub use resource::{
    FixedFileInfo, RT_VERSION, VS_FIXEDFILEINFO_SIGNATURE, fixed_file_info, parse_version_info,
    probe_version,
};
