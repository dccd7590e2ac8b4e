//! Table command implementation.

use anyhow::Result;
use hookid::{HOOK_TABLE, HookEntry};

/// Run the table command
pub fn run(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(HOOK_TABLE)?);
        return Ok(());
    }

    println!(
        "{:<8}  {:<12}  {:<6}  {:<6}  {:>10}  {:>10}",
        "Target", "Version", "Locked", "Label", "HookCall", "LoadLib"
    );
    for entry in HOOK_TABLE {
        println!("{}", format_row(entry));
    }
    Ok(())
}

fn format_row(entry: &HookEntry) -> String {
    format!(
        "{:<8}  {:<12}  {:<6}  {:<6}  0x{:08X}  0x{:08X}",
        entry.target.to_string(),
        entry.version.to_string(),
        if entry.region_locked { "yes" } else { "no" },
        entry.label,
        entry.hook_call_addr,
        entry.load_library_addr
    )
}
