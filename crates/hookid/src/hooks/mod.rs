mod resolver;
mod table;

pub use resolver::{BlockReason, Resolution, UnknownVersion, resolve, resolve_in};
pub use table::{HOOK_TABLE, HookEntry, TargetKind, entries_for};
