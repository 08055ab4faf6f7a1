//! Disassembly listing parsers.
//!
//! This module ingests free-form text blocks copied out of disassemblers
//! and recovers an ordered instruction stream with raw bytes:
//! - x64dbg copy-paste (`ADDR | BYTES | MNEMONIC OPERANDS [| LABEL]`)
//! - Cheat Engine (`module.exe+OFF - BYTES - MNEMONIC OPERANDS`)
//! - Raw hex streams (disassembled with the built-in 32-bit decoder)
//!
//! Detection scans the first lines of the input and scores each format by
//! the fraction of lines matching its shape. Parsing is lenient: lines that
//! do not match are skipped and counted, and only a fully unrecognizable
//! input is an error.

pub mod cheatengine;
pub mod rawhex;
pub mod x64dbg;

use std::collections::HashSet;

use crate::error::{Result, SigforgeError};
use crate::types::{DumpFormat, Instruction, ParseResult, ParseStats};

/// Lines scanned for format detection.
const DETECT_SCAN_LINES: usize = 20;

/// Minimum fraction of scanned lines that must match the winning format.
const DETECT_MIN_RATIO: f64 = 0.30;

/// One listing line split into its logical fields.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawLine {
    pub address: String,
    pub byte_field: String,
    pub mnemonic: String,
    pub operands: String,
    pub label: Option<String>,
    pub module: Option<String>,
}

/// Detect the listing format by scoring the first non-empty lines.
///
/// Returns `None` when no format reaches the acceptance ratio.
pub fn detect_format(text: &str) -> Option<DumpFormat> {
    let (best, matched, scanned) = detection_scores(text);
    if scanned == 0 {
        return None;
    }
    let ratio = matched as f64 / scanned as f64;
    if ratio >= DETECT_MIN_RATIO {
        Some(best)
    } else {
        None
    }
}

/// Score all formats over the first [`DETECT_SCAN_LINES`] non-empty lines.
///
/// Returns the best format, its match count, and the number of lines
/// scanned. Structured formats win ties over raw hex.
fn detection_scores(text: &str) -> (DumpFormat, usize, usize) {
    let mut scanned = 0;
    let mut counts = [0usize; 3]; // x64dbg, cheatengine, hex

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if scanned >= DETECT_SCAN_LINES {
            break;
        }
        scanned += 1;
        if x64dbg::matches_line(line) {
            counts[0] += 1;
        }
        if cheatengine::matches_line(line) {
            counts[1] += 1;
        }
        if rawhex::matches_line(line) {
            counts[2] += 1;
        }
    }

    // Tie-break prefers the structured formats.
    let order = [
        (DumpFormat::X64dbg, counts[0]),
        (DumpFormat::CheatEngine, counts[1]),
        (DumpFormat::RawHex, counts[2]),
    ];
    let (best, matched) = order
        .iter()
        .copied()
        .max_by_key(|(_, n)| *n)
        .unwrap_or((DumpFormat::X64dbg, 0));
    // max_by_key returns the last maximum; rescan in priority order.
    let (best, matched) = order
        .iter()
        .copied()
        .find(|(_, n)| *n == matched)
        .unwrap_or((best, matched));

    (best, matched, scanned)
}

/// Parse a listing with addresses taken from the input.
///
/// `hint` forces a format; `None` auto-detects. Fails only when no line of
/// the input can be recognized.
pub fn parse(text: &str, hint: Option<DumpFormat>) -> Result<ParseResult> {
    parse_with_base(text, hint, 0)
}

/// Parse a listing; raw hex streams have addresses synthesized from `base`.
pub fn parse_with_base(text: &str, hint: Option<DumpFormat>, base: u32) -> Result<ParseResult> {
    let format = match hint {
        Some(format) => format,
        None => {
            let (best, matched, scanned) = detection_scores(text);
            if scanned == 0 || (matched as f64 / scanned as f64) < DETECT_MIN_RATIO {
                return Err(SigforgeError::UnrecognizedListing {
                    best_guess: best.name().to_string(),
                    matched,
                    scanned,
                });
            }
            best
        }
    };

    let result = match format {
        DumpFormat::X64dbg => parse_lines(text, format, x64dbg::parse_line),
        DumpFormat::CheatEngine => parse_lines(text, format, cheatengine::parse_line),
        DumpFormat::RawHex => rawhex::parse(text, base),
    }?;

    if result.instructions.is_empty() {
        return Err(SigforgeError::UnrecognizedListing {
            best_guess: format.name().to_string(),
            matched: 0,
            scanned: result.stats.total_lines,
        });
    }

    Ok(result)
}

/// Drive a per-line parser over the whole input, collecting instructions,
/// labels, and statistics.
fn parse_lines(
    text: &str,
    format: DumpFormat,
    line_parser: fn(&str) -> Option<RawLine>,
) -> Result<ParseResult> {
    let mut stats = ParseStats::default();
    let mut instructions = Vec::new();
    let mut labels = Vec::new();
    let mut seen_labels = HashSet::new();
    let mut seen_addresses = HashSet::new();
    let mut module = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        stats.total_lines += 1;

        let Some(raw) = line_parser(line) else {
            stats.dropped += 1;
            continue;
        };

        let bytes = match parse_byte_field(&raw.byte_field) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ => {
                // A mnemonic without bytes cannot be analyzed.
                stats.dropped += 1;
                continue;
            }
        };

        let address = Instruction::normalize_address(&raw.address);
        if !seen_addresses.insert(address.clone()) {
            stats.dropped += 1;
            continue;
        }

        let mnemonic = if raw.mnemonic.is_empty() {
            "db".to_string()
        } else {
            raw.mnemonic
        };

        let mut instruction = Instruction::new(address, bytes, mnemonic, raw.operands);
        if let Some(label) = raw.label {
            if seen_labels.insert(label.clone()) {
                labels.push(label.clone());
            }
            instruction = instruction.with_label(label);
        }
        if module.is_none() {
            module = raw.module;
        }

        instructions.push(instruction);
        stats.parsed += 1;
    }

    Ok(ParseResult {
        instructions,
        labels,
        format,
        module,
        stats,
    })
}

/// Decode a textual byte field into raw bytes.
///
/// Intra-byte spaces are stripped; the result must be a valid hex sequence
/// of at most 15 bytes.
pub(crate) fn parse_byte_field(field: &str) -> Result<Vec<u8>> {
    let compact: String = field.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() || compact.len() % 2 != 0 {
        return Err(SigforgeError::InvalidBytes {
            field: field.to_string(),
            reason: "odd or empty hex sequence".to_string(),
        });
    }
    let bytes = hex::decode(&compact).map_err(|e| SigforgeError::InvalidBytes {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    if bytes.len() > crate::x86::decoder::MAX_INSTRUCTION_LEN {
        return Err(SigforgeError::InvalidBytes {
            field: field.to_string(),
            reason: format!("{} bytes exceeds the x86 limit", bytes.len()),
        });
    }
    Ok(bytes)
}

/// True when every character is a hex digit or whitespace, with at least
/// one full byte present.
pub(crate) fn is_hex_field(field: &str) -> bool {
    let mut digits = 0;
    for c in field.chars() {
        if c.is_ascii_hexdigit() {
            digits += 1;
        } else if !c.is_whitespace() {
            return false;
        }
    }
    digits >= 2 && digits % 2 == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InstructionType;
    use pretty_assertions::assert_eq;

    const X64DBG_LINE: &str = "00B27AB0 | 0F84 79050000 | je apr24.2020.B2802F | Lawnmower_A";

    #[test]
    fn test_detect_x64dbg() {
        assert_eq!(detect_format(X64DBG_LINE), Some(DumpFormat::X64dbg));
    }

    #[test]
    fn test_detect_cheatengine() {
        let text = "Apr24.2020.exe+46751D - 0F84 85020000 - je Apr24.2020.exe+4677A8";
        assert_eq!(detect_format(text), Some(DumpFormat::CheatEngine));
    }

    #[test]
    fn test_detect_hex() {
        let text = "0F 84 79 05 00 00 8B 8D 2C FE FF FF";
        assert_eq!(detect_format(text), Some(DumpFormat::RawHex));
    }

    #[test]
    fn test_detect_garbage() {
        assert_eq!(detect_format("once upon a midnight dreary"), None);
        assert_eq!(detect_format(""), None);
    }

    #[test]
    fn test_parse_x64dbg_line() {
        let result = parse(X64DBG_LINE, None).unwrap();
        assert_eq!(result.format, DumpFormat::X64dbg);
        assert_eq!(result.instructions.len(), 1);

        let insn = &result.instructions[0];
        assert_eq!(insn.address, "00B27AB0");
        assert_eq!(insn.bytes, vec![0x0F, 0x84, 0x79, 0x05, 0x00, 0x00]);
        assert_eq!(insn.size, 6);
        assert_eq!(insn.mnemonic, "je");
        assert_eq!(insn.kind, InstructionType::ConditionalJump);
        assert_eq!(insn.label.as_deref(), Some("Lawnmower_A"));
        assert_eq!(result.labels, vec!["Lawnmower_A".to_string()]);
    }

    #[test]
    fn test_parse_cheatengine_line() {
        let text = "Apr24.2020.exe+46751D - 0F84 85020000 - je Apr24.2020.exe+4677A8";
        let result = parse(text, None).unwrap();
        assert_eq!(result.format, DumpFormat::CheatEngine);
        assert_eq!(result.module.as_deref(), Some("Apr24.2020.exe"));

        let insn = &result.instructions[0];
        assert_eq!(insn.address, "0046751D");
        assert_eq!(insn.kind, InstructionType::ConditionalJump);
    }

    #[test]
    fn test_parse_raw_hex() {
        let text = "0F 84 79 05 00 00 8B 8D 2C FE FF FF";
        let result = parse(text, None).unwrap();
        assert_eq!(result.format, DumpFormat::RawHex);
        assert_eq!(result.instructions.len(), 2);
        assert_eq!(result.instructions[0].address, "00000000");
        assert_eq!(result.instructions[0].mnemonic, "je");
        assert_eq!(result.instructions[1].address, "00000006");
        assert_eq!(result.instructions[1].mnemonic, "mov");
    }

    #[test]
    fn test_parse_raw_hex_with_base() {
        let text = "55 8B EC";
        let result = parse_with_base(text, Some(DumpFormat::RawHex), 0x0040_1000).unwrap();
        assert_eq!(result.instructions[0].address, "00401000");
        assert_eq!(result.instructions[1].address, "00401001");
    }

    #[test]
    fn test_unrecognized_input_is_error() {
        let err = parse("completely unrelated prose, no hex here!", None).unwrap_err();
        assert!(matches!(err, SigforgeError::UnrecognizedListing { .. }));
    }

    #[test]
    fn test_bad_lines_are_dropped() {
        let text = "\
00B27AB0 | 0F84 79050000 | je apr24.2020.B2802F | Lawnmower_A
this line is noise
00B27AB6 | ZZZZ | bad bytes
00B27AB8 | 90 | nop";
        let result = parse(text, None).unwrap();
        assert_eq!(result.stats.total_lines, 4);
        assert_eq!(result.stats.parsed, 2);
        assert_eq!(result.stats.dropped, 2);
    }

    #[test]
    fn test_duplicate_addresses_dropped() {
        let text = "\
00B27AB0 | 90 | nop
00B27AB0 | 90 | nop";
        let result = parse(text, None).unwrap();
        assert_eq!(result.instructions.len(), 1);
        assert_eq!(result.stats.dropped, 1);
    }

    #[test]
    fn test_byte_field_limits() {
        assert!(parse_byte_field("0F 84").is_ok());
        assert!(parse_byte_field("0F845").is_err());
        assert!(parse_byte_field("").is_err());
        // 16 bytes exceeds the x86 limit
        assert!(parse_byte_field(&"90".repeat(16)).is_err());
    }

    #[test]
    fn test_round_trip_bytes() {
        // Re-encoding the parsed bytes must reproduce the byte field up to
        // whitespace and case.
        let result = parse(X64DBG_LINE, None).unwrap();
        let encoded = hex::encode_upper(&result.instructions[0].bytes);
        assert_eq!(encoded, "0F8479050000");
    }
}
