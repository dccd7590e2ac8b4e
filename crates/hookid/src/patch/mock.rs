//! In-memory code pages for patch tests

use std::collections::HashSet;

use super::memory::CodeMemory;
use crate::error::{Error, Result};

pub const PAGE_EXECUTE_READ: u32 = 0x20;
pub const PAGE_EXECUTE_READWRITE: u32 = 0x40;

/// In-memory stand-in for a process's code pages
///
/// Protection is tracked per byte. Writes to bytes that are not currently
/// writable fail the way an access violation would.
#[derive(Debug, Clone)]
pub struct MockCodeMemory {
    base: usize,
    bytes: Vec<u8>,
    protection: Vec<u32>,
    locked: Vec<(usize, usize)>,
    fail_flush: bool,
    flushed: Vec<(usize, usize)>,
    writes: usize,
}

impl MockCodeMemory {
    pub fn builder(base: usize, size: usize) -> MockCodeMemoryBuilder {
        MockCodeMemoryBuilder {
            memory: MockCodeMemory {
                base,
                bytes: vec![0xCC; size],
                protection: vec![PAGE_EXECUTE_READ; size],
                locked: Vec::new(),
                fail_flush: false,
                flushed: Vec::new(),
                writes: 0,
            },
        }
    }

    pub fn bytes_at(&self, address: usize, len: usize) -> &[u8] {
        let start = address - self.base;
        &self.bytes[start..start + len]
    }

    pub fn protection_at(&self, address: usize) -> u32 {
        self.protection[address - self.base]
    }

    /// Distinct protections currently in effect
    pub fn protections(&self) -> HashSet<u32> {
        self.protection.iter().copied().collect()
    }

    pub fn flushed(&self) -> &[(usize, usize)] {
        &self.flushed
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    fn range(&self, address: usize, len: usize) -> Result<std::ops::Range<usize>> {
        let start = address
            .checked_sub(self.base)
            .filter(|start| start + len <= self.bytes.len())
            .ok_or_else(|| fault(address, "address not mapped"))?;
        Ok(start..start + len)
    }
}

fn fault(address: usize, message: &str) -> Error {
    Error::PatchFailed {
        address,
        message: message.to_string(),
    }
}

impl CodeMemory for MockCodeMemory {
    fn read(&self, address: usize, len: usize) -> Result<Vec<u8>> {
        let range = self.range(address, len)?;
        Ok(self.bytes[range].to_vec())
    }

    fn unprotect(&mut self, address: usize, len: usize) -> Result<u32> {
        let range = self.range(address, len)?;
        let end = address + len;
        if self
            .locked
            .iter()
            .any(|&(start, stop)| address < stop && start < end)
        {
            return Err(fault(address, "VirtualProtect failed: access denied"));
        }
        let previous = self.protection[range.start];
        self.protection[range].fill(PAGE_EXECUTE_READWRITE);
        Ok(previous)
    }

    fn reprotect(&mut self, address: usize, len: usize, previous: u32) -> Result<()> {
        let range = self.range(address, len)?;
        self.protection[range].fill(previous);
        Ok(())
    }

    fn copy_in(&mut self, address: usize, bytes: &[u8]) -> Result<()> {
        let range = self.range(address, bytes.len())?;
        if self.protection[range.clone()]
            .iter()
            .any(|&p| p != PAGE_EXECUTE_READWRITE)
        {
            return Err(fault(address, "access violation"));
        }
        self.bytes[range].copy_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }

    fn flush_instruction_cache(&mut self, address: usize, len: usize) -> Result<()> {
        if self.fail_flush {
            return Err(fault(address, "FlushInstructionCache failed"));
        }
        self.flushed.push((address, len));
        Ok(())
    }
}

pub struct MockCodeMemoryBuilder {
    memory: MockCodeMemory,
}

impl MockCodeMemoryBuilder {
    pub fn with_bytes(mut self, address: usize, bytes: &[u8]) -> Self {
        let start = address - self.memory.base;
        self.memory.bytes[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    /// Refuse protection changes for `[address, address + len)`
    pub fn locked(mut self, address: usize, len: usize) -> Self {
        self.memory.locked.push((address, address + len));
        self
    }

    pub fn failing_flush(mut self) -> Self {
        self.memory.fail_flush = true;
        self
    }

    pub fn build(self) -> MockCodeMemory {
        self.memory
    }
}
