//! Cheat Engine disassembly listing lines.
//!
//! Shape: `module.exe+OFFSET - BYTES - MNEMONIC OPERANDS`, dash-separated
//! with module-relative addressing. The module base is folded to zero, so
//! the offset becomes the instruction address.

use super::RawLine;

/// True when the line has the Cheat Engine dash-separated shape.
pub(crate) fn matches_line(line: &str) -> bool {
    parse_line(line).is_some()
}

/// Split one Cheat Engine line into its fields.
pub(crate) fn parse_line(line: &str) -> Option<RawLine> {
    let parts: Vec<&str> = line.splitn(4, " - ").map(str::trim).collect();
    if parts.len() < 3 {
        return None;
    }

    let (module, address) = split_address(parts[0])?;

    let byte_field = parts[1];
    if !super::is_hex_field(byte_field) {
        return None;
    }

    let mut it = parts[2].splitn(2, char::is_whitespace);
    let mnemonic = it.next().unwrap_or("").to_string();
    let operands = it.next().unwrap_or("").trim().to_string();

    let label = parts.get(3).map(|t| t.trim()).filter(|t| !t.is_empty());

    Some(RawLine {
        address: address.to_string(),
        byte_field: byte_field.to_string(),
        mnemonic,
        operands,
        label: label.map(str::to_string),
        module,
    })
}

/// Split `module.exe+OFFSET` (or a bare hex address) into module and offset.
fn split_address(field: &str) -> Option<(Option<String>, &str)> {
    if let Some((module, offset)) = field.rsplit_once('+') {
        if !module.is_empty() && is_offset(offset) {
            return Some((Some(module.to_string()), offset));
        }
        return None;
    }
    if is_offset(field) {
        return Some((None, field));
    }
    None
}

fn is_offset(field: &str) -> bool {
    !field.is_empty() && field.len() <= 8 && field.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_relative_line() {
        let raw =
            parse_line("Apr24.2020.exe+46751D - 0F84 85020000 - je Apr24.2020.exe+4677A8").unwrap();
        assert_eq!(raw.module.as_deref(), Some("Apr24.2020.exe"));
        assert_eq!(raw.address, "46751D");
        assert_eq!(raw.byte_field, "0F84 85020000");
        assert_eq!(raw.mnemonic, "je");
        assert_eq!(raw.operands, "Apr24.2020.exe+4677A8");
    }

    #[test]
    fn test_bare_address_line() {
        let raw = parse_line("0046751D - 90 - nop").unwrap();
        assert!(raw.module.is_none());
        assert_eq!(raw.address, "0046751D");
    }

    #[test]
    fn test_operand_dashes_survive() {
        // The displacement dash is inside the operand field, not a delimiter.
        let raw = parse_line("game.exe+1000 - 8B8D 2CFEFFFF - mov ecx,[ebp-000001D4]").unwrap();
        assert_eq!(raw.operands, "ecx,[ebp-000001D4]");
    }

    #[test]
    fn test_rejects_non_listing_lines() {
        assert!(parse_line("just some text - with - dashes").is_none());
        assert!(parse_line("game.exe+ZZZ - 90 - nop").is_none());
        assert!(parse_line("game.exe+1000 - 90").is_none());
    }
}
