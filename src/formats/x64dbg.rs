//! x64dbg copy-paste listing lines.
//!
//! Shape: `ADDRESS | BYTES | MNEMONIC OPERANDS [| LABEL]` with pipe
//! separators. The trailing field, when present and not an operand
//! continuation, is harvested as a label.

use super::RawLine;

/// True when the line has the x64dbg pipe-separated shape.
pub(crate) fn matches_line(line: &str) -> bool {
    parse_line(line).is_some()
}

/// Split one x64dbg line into its fields.
pub(crate) fn parse_line(line: &str) -> Option<RawLine> {
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();
    if parts.len() < 3 {
        return None;
    }

    let address = parts[0];
    if !is_address(address) {
        return None;
    }

    let byte_field = parts[1];
    if !super::is_hex_field(byte_field) {
        return None;
    }

    let (mnemonic, operands) = split_instruction(parts[2]);
    let label = parts.get(3).and_then(|t| clean_label(t));

    Some(RawLine {
        address: address.to_string(),
        byte_field: byte_field.to_string(),
        mnemonic,
        operands,
        label,
        module: None,
    })
}

/// A 32-bit address: 1 to 8 hex digits.
fn is_address(field: &str) -> bool {
    !field.is_empty() && field.len() <= 8 && field.chars().all(|c| c.is_ascii_hexdigit())
}

/// First whitespace-delimited token is the mnemonic, the rest is operands.
fn split_instruction(field: &str) -> (String, String) {
    let mut it = field.splitn(2, char::is_whitespace);
    let mnemonic = it.next().unwrap_or("").to_string();
    let operands = it.next().unwrap_or("").trim().to_string();
    (mnemonic, operands)
}

/// Accept a trailing field as a label unless it reads like an operand
/// continuation.
fn clean_label(field: &str) -> Option<String> {
    let cleaned = field.trim_start_matches(';').trim();
    if cleaned.is_empty() || cleaned.starts_with('[') || cleaned.starts_with(',') {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_line() {
        let raw =
            parse_line("00B27AB0 | 0F84 79050000 | je apr24.2020.B2802F | Lawnmower_A").unwrap();
        assert_eq!(raw.address, "00B27AB0");
        assert_eq!(raw.byte_field, "0F84 79050000");
        assert_eq!(raw.mnemonic, "je");
        assert_eq!(raw.operands, "apr24.2020.B2802F");
        assert_eq!(raw.label.as_deref(), Some("Lawnmower_A"));
    }

    #[test]
    fn test_line_without_label() {
        let raw = parse_line("00B27AB6 | 8B8D 2CFEFFFF | mov ecx,dword ptr ss:[ebp-1D4]").unwrap();
        assert_eq!(raw.mnemonic, "mov");
        assert_eq!(raw.operands, "ecx,dword ptr ss:[ebp-1D4]");
        assert!(raw.label.is_none());
    }

    #[test]
    fn test_comment_label_stripped() {
        let raw = parse_line("00401000 | 90 | nop | ; alignment pad").unwrap();
        assert_eq!(raw.label.as_deref(), Some("alignment pad"));
    }

    #[test]
    fn test_operand_continuation_not_label() {
        let raw = parse_line("00401000 | FF15 10204000 | call dword ptr | [0x402010]").unwrap();
        assert!(raw.label.is_none());
    }

    #[test]
    fn test_rejects_non_listing_lines() {
        assert!(parse_line("not a listing line").is_none());
        assert!(parse_line("00401000 | nothex | nop").is_none());
        assert!(parse_line("zz401000 | 90 | nop").is_none());
        assert!(parse_line("00401000 | 90").is_none());
    }
}
