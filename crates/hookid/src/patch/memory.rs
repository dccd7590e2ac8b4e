//! Access to executable memory
//!
//! [`CodeMemory`] is the seam between the patch bookkeeping in
//! [`PatchWriter`](super::PatchWriter) and the platform calls that actually
//! touch page protections. Tests plug in an in-memory implementation.

use crate::error::{Error, Result};

pub trait CodeMemory {
    /// Read `len` bytes starting at `address`.
    fn read(&self, address: usize, len: usize) -> Result<Vec<u8>>;

    /// Make `[address, address + len)` writable and executable, returning the
    /// previous protection so it can be handed back to [`Self::reprotect`].
    fn unprotect(&mut self, address: usize, len: usize) -> Result<u32>;

    fn reprotect(&mut self, address: usize, len: usize, previous: u32) -> Result<()>;

    /// Copy `bytes` to `address`. The range must have been unprotected.
    fn copy_in(&mut self, address: usize, bytes: &[u8]) -> Result<()>;

    fn flush_instruction_cache(&mut self, address: usize, len: usize) -> Result<()>;
}

/// Code pages of the current process
#[derive(Debug)]
pub struct ProcessMemory {
    _private: (),
}

impl ProcessMemory {
    /// # Safety
    ///
    /// Every address later handed to this value must lie in a mapped region
    /// of the current process, and no other thread may be executing the bytes
    /// being replaced while a write is in progress.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

fn patch_failed(address: usize, message: impl Into<String>) -> Error {
    Error::PatchFailed {
        address,
        message: message.into(),
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use std::ffi::c_void;

    use windows::Win32::System::Diagnostics::Debug::FlushInstructionCache;
    use windows::Win32::System::Memory::{
        PAGE_EXECUTE_READWRITE, PAGE_PROTECTION_FLAGS, VirtualProtect,
    };
    use windows::Win32::System::Threading::GetCurrentProcess;

    use super::{CodeMemory, ProcessMemory, patch_failed};
    use crate::error::Result;

    impl CodeMemory for ProcessMemory {
        fn read(&self, address: usize, len: usize) -> Result<Vec<u8>> {
            // SAFETY: the caller of `ProcessMemory::new` guarantees the range is mapped
            let bytes = unsafe { std::slice::from_raw_parts(address as *const u8, len) };
            Ok(bytes.to_vec())
        }

        fn unprotect(&mut self, address: usize, len: usize) -> Result<u32> {
            let mut previous = PAGE_PROTECTION_FLAGS(0);
            // SAFETY: VirtualProtect validates the range itself and fails on unmapped pages
            unsafe {
                VirtualProtect(
                    address as *const c_void,
                    len,
                    PAGE_EXECUTE_READWRITE,
                    &mut previous,
                )
            }
            .map_err(|e| patch_failed(address, format!("VirtualProtect failed: {}", e)))?;
            Ok(previous.0)
        }

        fn reprotect(&mut self, address: usize, len: usize, previous: u32) -> Result<()> {
            let mut replaced = PAGE_PROTECTION_FLAGS(0);
            // SAFETY: as above
            unsafe {
                VirtualProtect(
                    address as *const c_void,
                    len,
                    PAGE_PROTECTION_FLAGS(previous),
                    &mut replaced,
                )
            }
            .map_err(|e| patch_failed(address, format!("VirtualProtect restore failed: {}", e)))
        }

        fn copy_in(&mut self, address: usize, bytes: &[u8]) -> Result<()> {
            // SAFETY: the range is mapped and was made writable by `unprotect`
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), address as *mut u8, bytes.len());
            }
            Ok(())
        }

        fn flush_instruction_cache(&mut self, address: usize, len: usize) -> Result<()> {
            // SAFETY: flushing has no memory-safety preconditions beyond a valid process handle
            unsafe {
                FlushInstructionCache(GetCurrentProcess(), Some(address as *const c_void), len)
            }
            .map_err(|e| patch_failed(address, format!("FlushInstructionCache failed: {}", e)))
        }
    }
}

#[cfg(not(target_os = "windows"))]
impl CodeMemory for ProcessMemory {
    fn read(&self, address: usize, _len: usize) -> Result<Vec<u8>> {
        Err(unsupported(address))
    }

    fn unprotect(&mut self, address: usize, _len: usize) -> Result<u32> {
        Err(unsupported(address))
    }

    fn reprotect(&mut self, address: usize, _len: usize, _previous: u32) -> Result<()> {
        Err(unsupported(address))
    }

    fn copy_in(&mut self, address: usize, _bytes: &[u8]) -> Result<()> {
        Err(unsupported(address))
    }

    fn flush_instruction_cache(&mut self, address: usize, _len: usize) -> Result<()> {
        Err(unsupported(address))
    }
}

#[cfg(not(target_os = "windows"))]
fn unsupported(address: usize) -> Error {
    patch_failed(address, "live code patching is only supported on Windows")
}
