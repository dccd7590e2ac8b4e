//! Runtime code patching
//!
//! Small writes into the code of a loaded image: scalar values, raw byte
//! runs, relative branches and NOP fills. See [`PatchWriter`].

pub mod encode;
mod memory;
mod writer;

#[cfg(test)]
pub mod mock;

pub use encode::{
    Branch, Condition, REL_BRANCH_LEN, REL_JCC_LEN, encode_rel_call, encode_rel_jcc,
    encode_rel_jump, nop_fill, rel32,
};
pub use memory::{CodeMemory, ProcessMemory};
pub use writer::{PatchOp, PatchWidth, PatchWriter};
