//! Read-only memory mapping of an executable on disk

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::{debug, error};

use crate::error::{Error, Result};

/// A read-only view of a whole file.
///
/// The mapping (and the file handle behind it) is released when the value is
/// dropped, so any early return in the identification pipeline unmaps it.
#[derive(Debug)]
pub struct MappedImage {
    path: PathBuf,
    map: Mmap,
}

impl MappedImage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            error!("Couldn't open {:?}: {}", path, e);
            Error::Io(e)
        })?;

        let len = file.metadata()?.len();
        if len == 0 {
            return Err(Error::Mapping {
                path: path.to_path_buf(),
                message: "file is empty".to_string(),
            });
        }

        // SAFETY: the mapping is read-only and never outlives `self`. Another
        // process truncating the file while it is mapped is outside what the
        // loader guards against, same as any other memory-mapped reader.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| {
            error!("Couldn't map {:?}: {}", path, e);
            Error::Mapping {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        debug!("Mapped {:?} ({} bytes at {:#x})", path, map.len(), map.as_ptr() as usize);

        Ok(Self {
            path: path.to_path_buf(),
            map,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn base_address(&self) -> usize {
        self.map.as_ptr() as usize
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
