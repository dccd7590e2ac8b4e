//! Encode command implementation.

use anyhow::Result;
use hookid::Branch;

use super::hex_utils::{format_bytes, parse_hex_u32};

/// Run the encode command
pub fn run(branch: Branch, from: &str, to: &str) -> Result<()> {
    let source = parse_hex_u32(from)?;
    let target = parse_hex_u32(to)?;

    println!("From:  0x{:08X}", source);
    println!("To:    0x{:08X}", target);
    println!("Bytes: {}", encode(branch, source, target));

    Ok(())
}

fn encode(branch: Branch, source: u32, target: u32) -> String {
    format_bytes(&branch.encode(source, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookid::Condition;

    #[test]
    fn test_encode_hook_jump() {
        assert_eq!(
            encode(Branch::Jump, 0x00EC_C46B, 0x00FD_F0B0),
            "E9 40 2C 11 00"
        );
    }

    #[test]
    fn test_encode_conditional() {
        assert_eq!(
            encode(Branch::Conditional(Condition::Jz), 0x1000, 0x1006),
            "0F 84 00 00 00 00"
        );
    }

    #[test]
    fn test_run_rejects_wide_address() {
        assert!(run(Branch::Call, "0x100000000", "0x0").is_err());
    }
}
