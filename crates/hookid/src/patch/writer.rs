//! Patch bookkeeping over code memory, with rollback

use serde::Serialize;
use strum::Display;
use tracing::{debug, error, warn};

use super::encode::{Condition, encode_rel_call, encode_rel_jcc, encode_rel_jump, nop_fill};
use super::memory::CodeMemory;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PatchWidth {
    Byte,
    Word,
    Dword,
    Instruction,
    Bytes,
}

/// One write to code memory
///
/// `original` is empty until the op has been applied, then holds the bytes
/// it replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOp {
    pub address: usize,
    pub bytes: Vec<u8>,
    pub original: Vec<u8>,
    pub width: PatchWidth,
}

impl PatchOp {
    pub fn new(address: usize, bytes: Vec<u8>, width: PatchWidth) -> Self {
        Self {
            address,
            bytes,
            original: Vec::new(),
            width,
        }
    }

    pub fn u8(address: usize, value: u8) -> Self {
        Self::new(address, vec![value], PatchWidth::Byte)
    }

    pub fn u16(address: usize, value: u16) -> Self {
        Self::new(address, value.to_le_bytes().to_vec(), PatchWidth::Word)
    }

    pub fn u32(address: usize, value: u32) -> Self {
        Self::new(address, value.to_le_bytes().to_vec(), PatchWidth::Dword)
    }

    pub fn bytes(address: usize, bytes: &[u8]) -> Self {
        Self::new(address, bytes.to_vec(), PatchWidth::Bytes)
    }

    pub fn rel_jump(source: u32, target: u32) -> Self {
        Self::instruction(source, encode_rel_jump(source, target).to_vec())
    }

    pub fn rel_call(source: u32, target: u32) -> Self {
        Self::instruction(source, encode_rel_call(source, target).to_vec())
    }

    pub fn rel_jcc(condition: Condition, source: u32, target: u32) -> Self {
        Self::instruction(source, encode_rel_jcc(condition, source, target).to_vec())
    }

    pub fn nop(address: usize, len: usize) -> Self {
        Self::new(address, nop_fill(len), PatchWidth::Bytes)
    }

    fn instruction(source: u32, bytes: Vec<u8>) -> Self {
        Self::new(source as usize, bytes, PatchWidth::Instruction)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Applies patches to code memory and remembers how to undo them
///
/// Every write unprotects the target range, copies the new bytes in,
/// restores the previous protection and flushes the instruction cache for
/// the range before returning.
#[derive(Debug)]
pub struct PatchWriter<M: CodeMemory> {
    memory: M,
    applied: Vec<PatchOp>,
}

impl<M: CodeMemory> PatchWriter<M> {
    pub fn new(memory: M) -> Self {
        Self {
            memory,
            applied: Vec::new(),
        }
    }

    pub fn write_u8(&mut self, address: usize, value: u8) -> Result<()> {
        self.apply(PatchOp::u8(address, value))
    }

    pub fn write_u16(&mut self, address: usize, value: u16) -> Result<()> {
        self.apply(PatchOp::u16(address, value))
    }

    pub fn write_u32(&mut self, address: usize, value: u32) -> Result<()> {
        self.apply(PatchOp::u32(address, value))
    }

    pub fn write_bytes(&mut self, address: usize, bytes: &[u8]) -> Result<()> {
        self.apply(PatchOp::bytes(address, bytes))
    }

    /// `jmp rel32` at `source`
    pub fn write_rel_jump(&mut self, source: u32, target: u32) -> Result<()> {
        self.apply(PatchOp::rel_jump(source, target))
    }

    /// `call rel32` at `source`
    pub fn write_rel_call(&mut self, source: u32, target: u32) -> Result<()> {
        self.apply(PatchOp::rel_call(source, target))
    }

    pub fn write_rel_jcc(&mut self, condition: Condition, source: u32, target: u32) -> Result<()> {
        self.apply(PatchOp::rel_jcc(condition, source, target))
    }

    pub fn write_rel_jnz(&mut self, source: u32, target: u32) -> Result<()> {
        self.write_rel_jcc(Condition::Jnz, source, target)
    }

    pub fn write_rel_jle(&mut self, source: u32, target: u32) -> Result<()> {
        self.write_rel_jcc(Condition::Jle, source, target)
    }

    pub fn fill_nop(&mut self, address: usize, len: usize) -> Result<()> {
        self.apply(PatchOp::nop(address, len))
    }

    /// Apply a single op and record it for [`Self::revert_all`].
    pub fn apply(&mut self, mut op: PatchOp) -> Result<()> {
        if op.is_empty() {
            return Ok(());
        }
        op.original = self.write_raw(op.address, &op.bytes)?;
        debug!(
            "Patched {} ({} bytes) at {:#010x}",
            op.width,
            op.len(),
            op.address
        );
        self.applied.push(op);
        Ok(())
    }

    /// Apply `ops` in order. If any of them fails, the ones already written
    /// by this call are reverted before the error is returned.
    pub fn apply_batch(&mut self, ops: impl IntoIterator<Item = PatchOp>) -> Result<()> {
        let checkpoint = self.applied.len();
        for op in ops {
            if let Err(e) = self.apply(op) {
                error!(
                    "{}; rolling back {} applied patch(es)",
                    e,
                    self.applied.len() - checkpoint
                );
                if let Err(rollback) = self.revert_to(checkpoint) {
                    error!("Rollback incomplete: {}", rollback);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Undo every recorded patch, most recent first.
    pub fn revert_all(&mut self) -> Result<()> {
        self.revert_to(0)
    }

    pub fn applied(&self) -> &[PatchOp] {
        &self.applied
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn into_inner(self) -> M {
        self.memory
    }

    fn revert_to(&mut self, checkpoint: usize) -> Result<()> {
        while self.applied.len() > checkpoint {
            let Some(op) = self.applied.pop() else {
                break;
            };
            if let Err(e) = self.store(op.address, &op.original) {
                self.applied.push(op);
                return Err(e);
            }
            debug!("Reverted {} bytes at {:#010x}", op.len(), op.address);
        }
        Ok(())
    }

    /// Write `bytes` and return what was there before.
    fn write_raw(&mut self, address: usize, bytes: &[u8]) -> Result<Vec<u8>> {
        let original = self.memory.read(address, bytes.len())?;
        if let Err(e) = self.store(address, bytes) {
            // Put the site back if the copy went through but a later step failed
            if self.memory.read(address, bytes.len()).ok().as_deref() != Some(original.as_slice())
                && self.store(address, &original).is_err()
            {
                warn!("Could not restore {} bytes at {:#010x}", bytes.len(), address);
            }
            return Err(e);
        }
        Ok(original)
    }

    fn store(&mut self, address: usize, bytes: &[u8]) -> Result<()> {
        let len = bytes.len();
        let previous = self.memory.unprotect(address, len)?;
        let copied = self.memory.copy_in(address, bytes);
        self.memory.reprotect(address, len, previous)?;
        copied?;
        self.memory.flush_instruction_cache(address, len)
    }
}
