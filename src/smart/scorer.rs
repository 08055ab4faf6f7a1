//! Per-instruction anchor scoring.
//!
//! Each instruction receives three sub-scores in [0, 100]: byte stability
//! (volatility with penalties for leaf returns, trivial encodings, and
//! out-of-window branch targets), opcode rarity (a static frequency table
//! of common compiler-emitted first bytes, paired across adjacent
//! instructions), and neighborhood context. The weighted total drives
//! anchor selection.

use crate::types::{Instruction, InstructionType, VolatilityLevel};
use crate::x86::{self, opcodes};

/// Weight of the stability sub-score.
pub const STABILITY_WEIGHT: f64 = 0.45;
/// Weight of the uniqueness sub-score.
pub const UNIQUENESS_WEIGHT: f64 = 0.35;
/// Weight of the context sub-score.
pub const CONTEXT_WEIGHT: f64 = 0.20;

/// Sub-scores for one instruction.
#[derive(Debug, Clone, Copy)]
pub struct InstructionScore {
    pub stability: f64,
    pub uniqueness: f64,
    pub context: f64,
    pub total: f64,
}

/// Score every instruction in the stream.
///
/// Instructions must already be analyzed (volatility filled in).
pub fn score_all(instructions: &[Instruction]) -> Vec<InstructionScore> {
    let bounds = address_bounds(instructions);
    (0..instructions.len())
        .map(|i| score_instruction(instructions, i, bounds))
        .collect()
}

fn score_instruction(
    instructions: &[Instruction],
    index: usize,
    bounds: (u32, u32),
) -> InstructionScore {
    let stability = stability_score(instructions, index, bounds);
    let uniqueness = uniqueness_score(instructions, index);
    let context = context_score(instructions, index);
    let total = STABILITY_WEIGHT * stability + UNIQUENESS_WEIGHT * uniqueness
        + CONTEXT_WEIGHT * context;
    InstructionScore {
        stability,
        uniqueness,
        context,
        total,
    }
}

/// Byte-stability sub-score.
fn stability_score(instructions: &[Instruction], index: usize, bounds: (u32, u32)) -> f64 {
    let insn = &instructions[index];
    let mut score: f64 = 100.0;

    score -= match insn.volatility.operand {
        VolatilityLevel::Low => 0.0,
        VolatilityLevel::Medium => 20.0,
        VolatilityLevel::High => 40.0,
    };
    score -= match insn.volatility.opcode {
        VolatilityLevel::Low => 0.0,
        VolatilityLevel::Medium => 15.0,
        VolatilityLevel::High => 30.0,
    };

    // Leaf returns make terrible anchors: every function ends in one.
    if insn.kind == InstructionType::Return {
        score -= 45.0;
    }

    // Trivial one-byte encodings are everywhere in compiled code.
    if insn.size == 1 && insn.bytes.first().is_some_and(|b| x86::is_trivial_single_byte(*b)) {
        score -= 25.0;
    }

    // A branch whose target lies outside the parsed window will be
    // relocated independently of this code.
    if (insn.kind.is_jump() || insn.kind.is_call()) && branch_escapes_window(insn, bounds) {
        score -= 20.0;
    }

    // Function prologues are strong, recognizable anchors.
    if is_prologue_site(instructions, index) {
        score += 10.0;
    }

    score.clamp(0.0, 100.0)
}

/// Does the branch target fall outside the parsed address range?
fn branch_escapes_window(insn: &Instruction, (min_addr, max_addr): (u32, u32)) -> bool {
    let address = u32::from_str_radix(&insn.address, 16).unwrap_or(0);
    let Some(decoded) = x86::decode(&insn.bytes, address) else {
        return false;
    };
    let Some(rel) = decoded.layout.rel else {
        return false;
    };
    let value = match rel.len() {
        1 => i64::from(insn.bytes[rel.start] as i8),
        4 => {
            let b = &insn.bytes[rel.clone()];
            i64::from(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        }
        _ => return false,
    };
    let target = (i64::from(address) + decoded.len as i64 + value) as u32;
    target < min_addr || target > max_addr
}

/// Address range of the parsed stream.
fn address_bounds(instructions: &[Instruction]) -> (u32, u32) {
    let mut min_addr = u32::MAX;
    let mut max_addr = 0;
    for insn in instructions {
        let addr = u32::from_str_radix(&insn.address, 16).unwrap_or(0);
        min_addr = min_addr.min(addr);
        max_addr = max_addr.max(addr.saturating_add(insn.size as u32));
    }
    if instructions.is_empty() {
        (0, 0)
    } else {
        (min_addr, max_addr)
    }
}

/// `push ebp; mov ebp, esp` starting here.
fn is_prologue_site(instructions: &[Instruction], index: usize) -> bool {
    let mut window = instructions[index].bytes.clone();
    if let Some(next) = instructions.get(index + 1) {
        window.extend_from_slice(&next.bytes);
    }
    x86::is_prologue(&window)
}

/// Common compiler-emitted opcode bigrams, keyed on the first opcode byte
/// of an instruction and the first opcode byte of its successor. Higher
/// weight means more common; pairs not listed fall back to the average of
/// the single-byte weights below.
const COMMON_BIGRAMS: &[(u8, u8, u32)] = &[
    (opcodes::PUSH_EBP, 0x8B, 98), // push ebp; mov ebp,esp
    (opcodes::PUSH_EBP, 0x89, 96),
    (opcodes::POP_EBP, opcodes::RET, 96), // pop ebp; ret
    (opcodes::LEAVE, opcodes::RET, 95),   // leave; ret
    (opcodes::RET, opcodes::PUSH_EBP, 90), // function boundary
    (0x8B, 0x8B, 95),
    (0x89, 0x8B, 88),
    (0x8B, 0x89, 88),
    (0x85, 0x74, 92), // test; je
    (0x85, 0x75, 92), // test; jne
    (0x3B, 0x74, 85),
    (0x3B, 0x75, 85),
    (0x83, 0x8B, 82),
    (0x6A, opcodes::CALL_REL32, 86), // push imm8; call
    (0x68, opcodes::CALL_REL32, 84),
    (0x50, opcodes::CALL_REL32, 82),
    (opcodes::CALL_REL32, 0x83, 88), // call; add esp
    (opcodes::CALL_REL32, 0x8B, 80),
    (opcodes::RET, 0x8B, 70),
    (0x33, 0x8B, 72), // xor; mov
    (opcodes::NOP, opcodes::NOP, 90), // padding runs
];

/// Frequency weight of one opcode bigram.
fn bigram_frequency(first: u8, second: u8) -> u32 {
    COMMON_BIGRAMS
        .iter()
        .find(|(a, b, _)| *a == first && *b == second)
        .map_or_else(
            || (opcode_frequency(first) + opcode_frequency(second)) / 2,
            |(_, _, weight)| *weight,
        )
}

/// Static frequency weights for first opcode bytes, measured against
/// common compiler output. Higher means more common. Used as the fallback
/// for bigrams outside [`COMMON_BIGRAMS`] and for the final instruction.
fn opcode_frequency(opcode: u8) -> u32 {
    match opcode {
        0x8B => 95,
        0x89 => 90,
        0xFF => 85,
        0xE8 => 85,
        0x55 => 80,
        0x83 => 80,
        0xC3 => 75,
        0x50..=0x57 => 70,
        0x8D => 70,
        0x85 => 65,
        0x74 | 0x75 => 65,
        0x5D => 60,
        0x33 => 60,
        0x58..=0x5F => 55,
        0x31 => 55,
        0x6A => 55,
        0xB8..=0xBF => 50,
        0x68 => 50,
        0x90 => 45,
        0x3B | 0x39 => 45,
        0xE9 | 0xEB => 40,
        0xC7 => 40,
        0x01 | 0x03 | 0x2B | 0x29 => 40,
        0x66 => 35,
        0x81 => 35,
        0xA1 | 0xA3 => 35,
        0x0F => 30,
        0xF7 => 30,
        0x84 => 30,
        0xC2 => 25,
        0x38 | 0x3A => 20,
        _ => 15,
    }
}

/// Opcode-rarity sub-score from the bigram of this instruction's first
/// opcode byte and the next instruction's.
fn uniqueness_score(instructions: &[Instruction], index: usize) -> f64 {
    let first = |i: usize| -> Option<u8> {
        instructions
            .get(i)
            .and_then(|insn| x86::first_opcode_byte(&insn.bytes))
    };
    let Some(own) = first(index) else {
        return 0.0;
    };
    let combined = match first(index + 1) {
        Some(next) => bigram_frequency(own, next),
        None => opcode_frequency(own),
    };
    f64::from(100u32.saturating_sub(combined))
}

/// Neighborhood sub-score: full marks with at least three medium-or-better
/// instructions on each side, scaled linearly below.
fn context_score(instructions: &[Instruction], index: usize) -> f64 {
    let qualifies = |insn: &Instruction| -> bool {
        insn.volatility.operand != VolatilityLevel::High
            && !(insn.size == 1
                && insn.bytes.first().is_some_and(|b| x86::is_trivial_single_byte(*b)))
    };

    let left = instructions[..index]
        .iter()
        .rev()
        .take(3)
        .filter(|i| qualifies(i))
        .count();
    let right = instructions[index + 1..]
        .iter()
        .take(3)
        .filter(|i| qualifies(i))
        .count();

    (left + right) as f64 / 6.0 * 100.0
}
