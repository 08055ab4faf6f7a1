//! Raw hex byte streams.
//!
//! A bare sequence of hex pairs (spaced or glued) with no mnemonics.
//! All pairs are coalesced into one buffer and disassembled with the
//! built-in 32-bit decoder to synthesize instruction boundaries; unknown
//! opcodes fall out as single `db` bytes. Addresses are sequential from a
//! caller-supplied base (default zero).

use crate::error::Result;
use crate::types::{DumpFormat, Instruction, ParseResult, ParseStats};
use crate::x86;

/// True when the line is nothing but hex pairs and whitespace.
pub(crate) fn matches_line(line: &str) -> bool {
    super::is_hex_field(line)
}

/// Coalesce all hex lines and disassemble the resulting buffer.
pub(crate) fn parse(text: &str, base: u32) -> Result<ParseResult> {
    let mut stats = ParseStats::default();
    let mut buffer = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        stats.total_lines += 1;
        if !matches_line(line) {
            stats.dropped += 1;
            continue;
        }
        let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        match hex::decode(&compact) {
            Ok(bytes) => {
                buffer.extend(bytes);
                stats.parsed += 1;
            }
            Err(_) => stats.dropped += 1,
        }
    }

    let instructions = disassemble(&buffer, base);

    Ok(ParseResult {
        instructions,
        labels: Vec::new(),
        format: DumpFormat::RawHex,
        module: None,
        stats,
    })
}

/// Walk the buffer, emitting one instruction per decoded encoding.
fn disassemble(buffer: &[u8], base: u32) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut offset = 0usize;

    while offset < buffer.len() {
        let addr = base.wrapping_add(offset as u32);
        let address = format!("{addr:08X}");
        match x86::decode(&buffer[offset..], addr) {
            Some(decoded) => {
                let bytes = buffer[offset..offset + decoded.len].to_vec();
                instructions.push(Instruction::new(
                    address,
                    bytes,
                    decoded.mnemonic,
                    decoded.operands,
                ));
                offset += decoded.len;
            }
            None => {
                let byte = buffer[offset];
                instructions.push(Instruction::new(
                    address,
                    vec![byte],
                    "db",
                    format!("0x{byte:02x}"),
                ));
                offset += 1;
            }
        }
    }

    instructions
}
