mod record;
mod scanner;

pub use record::{
    CODEVIEW_MAGIC, CodeViewRecord, DebugSignature, MAX_PATH_LEN, PathCheck, RECORD_HEADER_SIZE,
};
pub use scanner::{
    DebugSignatureScanner, DirectoryScan, IMAGE_DEBUG_TYPE_CODEVIEW, RegionScan, ScanSource,
    SignatureScan,
};
