//! Per-byte volatility analysis.
//!
//! Enriches parsed instructions with a complete byte classification
//! (opcode/ModRM/SIB/displacement/immediate/relative), the set of wildcard
//! candidate positions with their reason classes, and an opcode/operand
//! volatility pair.
//!
//! Two sources of truth are combined: the structural view comes from the
//! 32-bit decoder run over the instruction's own bytes; the textual view
//! pattern-matches the operand string the source disassembler wrote. When
//! they agree the classification is accepted as-is; when they disagree the
//! structural view wins and the operand volatility is lowered one step.

use std::ops::Range;

use crate::types::{
    ByteCategory, Instruction, ReasonCode, Volatility, VolatilityLevel, WildcardCandidate,
};
use crate::x86::{self, decoder::MAX_INSTRUCTION_LEN, DispBase};

/// Analyze a whole instruction stream, in order.
pub fn analyze_all(instructions: Vec<Instruction>) -> Vec<Instruction> {
    instructions.into_iter().map(analyze).collect()
}

/// Enrich one instruction with byte categories, wildcard candidates, and
/// volatility.
pub fn analyze(instruction: Instruction) -> Instruction {
    let text = TextView::scan(&instruction.operands_normalized);
    let structure = StructView::derive(&instruction, &text);

    let byte_map = structure.byte_map(instruction.size);
    let candidates = structure.candidates(&instruction);
    let wildcard_positions: Vec<usize> = candidates.iter().map(|c| c.offset).collect();
    let volatility = rate_volatility(&instruction, &text, &structure);

    Instruction {
        byte_map,
        candidates,
        wildcard_positions,
        volatility,
        ..instruction
    }
}

/// Base-register family predicted from operand text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextBase {
    Ebp,
    Esp,
    OtherReg,
    Absolute,
}

/// What the operand text claims about the encoding.
#[derive(Debug, Clone, Copy, Default)]
struct TextView {
    mem_base: Option<TextBase>,
    /// Predicted displacement size in bytes (1 or 4).
    disp_size: Option<usize>,
    /// A trailing immediate literal is present.
    has_immediate: bool,
}

impl TextView {
    /// Pattern-match `[ebp±X]`, `[esp±X]`, `[reg+X]`, bare `[0xADDR]`, and
    /// trailing immediates out of normalized operand text.
    fn scan(operands: &str) -> Self {
        let mut view = TextView::default();

        if let Some(open) = operands.find('[') {
            if let Some(close) = operands[open..].find(']') {
                let inner = &operands[open + 1..open + close];
                view.scan_memory(inner);
            }
        }

        // A bare numeric literal after the last comma (outside brackets)
        // reads as an immediate.
        let tail = operands.rsplit(',').next().unwrap_or("").trim();
        if !tail.is_empty() && !tail.contains('[') && is_numeric_literal(tail) {
            view.has_immediate = true;
        }

        view
    }

    fn scan_memory(&mut self, inner: &str) {
        let inner = inner.trim();
        if inner.starts_with("ebp") {
            self.mem_base = Some(TextBase::Ebp);
        } else if inner.starts_with("esp") {
            self.mem_base = Some(TextBase::Esp);
        } else if is_numeric_literal(inner) {
            self.mem_base = Some(TextBase::Absolute);
            self.disp_size = Some(4);
            return;
        } else if inner.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.mem_base = Some(TextBase::OtherReg);
        } else {
            return;
        }

        // Displacement literal after the base expression.
        if let Some(pos) = inner.rfind(['+', '-']) {
            let literal = inner[pos + 1..].trim();
            if let Some(value) = parse_hex_literal(literal) {
                self.disp_size = Some(if value <= 0x7F { 1 } else { 4 });
            }
        }
    }
}

fn is_numeric_literal(s: &str) -> bool {
    let s = s.strip_prefix("0x").unwrap_or(s);
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn parse_hex_literal(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).ok()
}

/// The structural layout settled on for an instruction.
#[derive(Debug, Clone, Default)]
struct StructView {
    prefix_count: usize,
    two_byte_opcode: Option<u8>,
    modrm: Option<usize>,
    sib: Option<usize>,
    disp: Option<Range<usize>>,
    disp_base: Option<DispBase>,
    imm: Option<Range<usize>>,
    rel: Option<Range<usize>>,
    /// The decoder accepted the bytes as-is.
    decoded: bool,
}

impl StructView {
    /// Derive the layout: decoder first, text-guided tail fallback when the
    /// decoder rejects the encoding.
    fn derive(instruction: &Instruction, text: &TextView) -> Self {
        let address = u32::from_str_radix(&instruction.address, 16).unwrap_or(0);
        if let Some(decoded) = x86::decode(&instruction.bytes, address) {
            if decoded.len == instruction.size {
                let layout = decoded.layout;
                let two_byte = (layout.opcode.len() == 2)
                    .then(|| instruction.bytes[layout.opcode.start + 1]);
                return Self {
                    prefix_count: layout.prefix_count,
                    two_byte_opcode: two_byte,
                    modrm: layout.modrm,
                    sib: layout.sib,
                    disp: layout.disp,
                    disp_base: layout.disp_base,
                    imm: layout.imm,
                    rel: layout.rel,
                    decoded: true,
                };
            }
        }
        Self::fallback(instruction, text)
    }

    /// Work backwards from the end of the bytes using textual size
    /// predictions: immediate last, displacement before it, opcode head.
    fn fallback(instruction: &Instruction, text: &TextView) -> Self {
        let size = instruction.size.min(MAX_INSTRUCTION_LEN);
        let bytes = &instruction.bytes[..size];

        let prefix_count = bytes.iter().take_while(|b| x86::is_legacy_prefix(**b)).count();
        let opcode_len = if bytes.get(prefix_count) == Some(&x86::opcodes::TWO_BYTE) {
            2
        } else {
            1
        };
        let head_end = (prefix_count + opcode_len).min(size);

        let mut view = Self {
            prefix_count,
            two_byte_opcode: if opcode_len == 2 {
                bytes.get(prefix_count + 1).copied()
            } else {
                None
            },
            ..Self::default()
        };

        // Relative branches put the offset at the tail.
        if instruction.kind.is_jump() || instruction.kind.is_call() {
            let rel_size = if size <= head_end + 1 { 1 } else { 4 };
            if size >= head_end + rel_size {
                view.rel = Some(size - rel_size..size);
            }
            return view;
        }

        let mut tail_start = size;

        if text.has_immediate && size > head_end {
            let imm_size = (size - head_end).min(4);
            view.imm = Some(size - imm_size..size);
            tail_start = size - imm_size;
        }

        if let (Some(base), Some(disp_size)) = (text.mem_base, text.disp_size) {
            if tail_start >= head_end + 1 && tail_start > disp_size {
                let start = tail_start - disp_size;
                if start >= head_end {
                    view.disp = Some(start..tail_start);
                    view.disp_base = Some(match base {
                        TextBase::Ebp => DispBase::Ebp,
                        TextBase::Esp => DispBase::Esp,
                        TextBase::OtherReg => DispBase::Other,
                        TextBase::Absolute => DispBase::Absolute,
                    });
                    tail_start = start;
                }
            }
        }

        // Whatever sits between head and tail starts with ModRM, then SIB.
        if tail_start > head_end {
            view.modrm = Some(head_end);
            if tail_start > head_end + 1 {
                view.sib = Some(head_end + 1);
            }
        }

        view
    }

    /// Assign exactly one category per byte.
    fn byte_map(&self, size: usize) -> Vec<ByteCategory> {
        let mut map = vec![ByteCategory::Opcode; size];
        if let Some(idx) = self.modrm {
            if idx < size {
                map[idx] = ByteCategory::ModRm;
            }
        }
        if let Some(idx) = self.sib {
            if idx < size {
                map[idx] = ByteCategory::Sib;
            }
        }
        if let Some(range) = &self.disp {
            for i in range.clone().filter(|i| *i < size) {
                map[i] = ByteCategory::Displacement;
            }
        }
        if let Some(range) = &self.imm {
            for i in range.clone().filter(|i| *i < size) {
                map[i] = ByteCategory::Immediate;
            }
        }
        if let Some(range) = &self.rel {
            for i in range.clone().filter(|i| *i < size) {
                map[i] = ByteCategory::RelativeOffset;
            }
        }
        map
    }

    /// All candidate wildcard positions with their reason classes.
    fn candidates(&self, instruction: &Instruction) -> Vec<WildcardCandidate> {
        let mut out = Vec::new();

        if let Some(range) = &self.rel {
            let class = if instruction.kind.is_call() {
                ReasonCode::RelativeCall
            } else {
                ReasonCode::RelativeJump
            };
            for offset in range.clone() {
                out.push(WildcardCandidate { offset, class });
            }
        }

        if let (Some(range), Some(base)) = (&self.disp, self.disp_base) {
            let class = match base {
                DispBase::Absolute => ReasonCode::GlobalAddress,
                DispBase::Ebp | DispBase::Esp => ReasonCode::StackOffset,
                DispBase::Other => {
                    if range.len() == 1 {
                        ReasonCode::StructOffset
                    } else {
                        ReasonCode::MemoryDisplacement
                    }
                }
            };
            for offset in range.clone() {
                out.push(WildcardCandidate { offset, class });
            }
        }

        if let Some(range) = &self.imm {
            for offset in range.clone() {
                out.push(WildcardCandidate {
                    offset,
                    class: ReasonCode::Immediate,
                });
            }
        }

        out.sort_by_key(|c| c.offset);
        out
    }

    /// True when the textual predictions match the structural layout.
    fn agrees_with(&self, text: &TextView) -> bool {
        let base_matches = match (text.mem_base, self.disp_base) {
            (Some(TextBase::Ebp), Some(DispBase::Ebp))
            | (Some(TextBase::Esp), Some(DispBase::Esp))
            | (Some(TextBase::OtherReg), Some(DispBase::Other))
            | (Some(TextBase::Absolute), Some(DispBase::Absolute))
            | (None, None) => true,
            // Text saw a register operand without displacement bytes; the
            // encoding simply has none (mod=11 or mod=00).
            (Some(_), None) => text.disp_size.is_none(),
            _ => false,
        };
        let disp_matches = match (text.disp_size, &self.disp) {
            (Some(predicted), Some(actual)) => predicted == actual.len(),
            (None, _) | (_, None) => true,
        };
        let imm_matches = text.has_immediate == self.imm.is_some();
        base_matches && disp_matches && imm_matches
    }
}

/// Common `0F`-page encodings compilers emit constantly.
fn is_common_two_byte(opcode: u8) -> bool {
    matches!(
        opcode,
        0x1F | 0x40..=0x4F | 0x80..=0x8F | 0x90..=0x9F | 0xAF | 0xB6 | 0xB7 | 0xBE | 0xBF
    )
}

/// Rate opcode and operand volatility for one instruction.
fn rate_volatility(instruction: &Instruction, text: &TextView, structure: &StructView) -> Volatility {
    let opcode = if !structure.decoded {
        VolatilityLevel::Medium
    } else if structure.prefix_count > 0 {
        VolatilityLevel::Medium
    } else {
        match structure.two_byte_opcode {
            None => VolatilityLevel::Low,
            Some(op2) if is_common_two_byte(op2) => VolatilityLevel::Low,
            Some(_) => VolatilityLevel::Medium,
        }
    };

    let mut operand = if structure.rel.is_some()
        || structure.disp_base == Some(DispBase::Absolute)
    {
        VolatilityLevel::High
    } else if matches!(
        structure.disp_base,
        Some(DispBase::Ebp | DispBase::Esp | DispBase::Other)
    ) {
        VolatilityLevel::Medium
    } else {
        VolatilityLevel::Low
    };

    if !structure.agrees_with(text) {
        operand = operand.lowered();
    }

    Volatility { opcode, operand }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InstructionType;

    fn analyzed(address: &str, bytes: &[u8], mnemonic: &str, operands: &str) -> Instruction {
        analyze(Instruction::new(address, bytes.to_vec(), mnemonic, operands))
    }

    #[test]
    fn test_jcc_rel32_candidates() {
        let insn = analyzed(
            "00B27AB0",
            &[0x0F, 0x84, 0x79, 0x05, 0x00, 0x00],
            "je",
            "apr24.2020.B2802F",
        );
        assert_eq!(insn.kind, InstructionType::ConditionalJump);
        assert_eq!(insn.wildcard_positions, vec![2, 3, 4, 5]);
        assert!(insn
            .candidates
            .iter()
            .all(|c| c.class == ReasonCode::RelativeJump));
        assert_eq!(insn.volatility.operand, VolatilityLevel::High);
        assert_eq!(insn.volatility.opcode, VolatilityLevel::Low);
    }

    #[test]
    fn test_stack_displacement() {
        let insn = analyzed(
            "00B27AB6",
            &[0x8B, 0x8D, 0x2C, 0xFE, 0xFF, 0xFF],
            "mov",
            "ecx,dword ptr ss:[ebp-1D4]",
        );
        assert_eq!(insn.wildcard_positions, vec![2, 3, 4, 5]);
        assert!(insn
            .candidates
            .iter()
            .all(|c| c.class == ReasonCode::StackOffset));
        assert_eq!(insn.volatility.operand, VolatilityLevel::Medium);
        assert_eq!(
            insn.byte_map,
            vec![
                ByteCategory::Opcode,
                ByteCategory::ModRm,
                ByteCategory::Displacement,
                ByteCategory::Displacement,
                ByteCategory::Displacement,
                ByteCategory::Displacement,
            ]
        );
    }

    #[test]
    fn test_global_address() {
        // mov eax, [0x11223344]
        let insn = analyzed("00401000", &[0xA1, 0x44, 0x33, 0x22, 0x11], "mov", "eax,[11223344]");
        assert!(insn
            .candidates
            .iter()
            .all(|c| c.class == ReasonCode::GlobalAddress));
        assert_eq!(insn.volatility.operand, VolatilityLevel::High);
    }

    #[test]
    fn test_struct_offset_disp8() {
        // mov edx, [eax+0x4]
        let insn = analyzed("00401000", &[0x8B, 0x50, 0x04], "mov", "edx,[eax+04]");
        assert_eq!(insn.wildcard_positions, vec![2]);
        assert_eq!(insn.candidates[0].class, ReasonCode::StructOffset);
    }

    #[test]
    fn test_immediate_candidates() {
        // mov eax, 0x10
        let insn = analyzed("00401000", &[0xB8, 0x10, 0x00, 0x00, 0x00], "mov", "eax,10");
        assert_eq!(insn.wildcard_positions, vec![1, 2, 3, 4]);
        assert!(insn
            .candidates
            .iter()
            .all(|c| c.class == ReasonCode::Immediate));
        assert_eq!(insn.volatility.operand, VolatilityLevel::Low);
    }

    #[test]
    fn test_no_candidates_for_plain_push() {
        let insn = analyzed("00401000", &[0x55], "push", "ebp");
        assert!(insn.wildcard_positions.is_empty());
        assert_eq!(insn.byte_map, vec![ByteCategory::Opcode]);
        assert_eq!(insn.volatility.opcode, VolatilityLevel::Low);
        assert_eq!(insn.volatility.operand, VolatilityLevel::Low);
    }

    #[test]
    fn test_byte_accounting_is_total() {
        let cases: Vec<Instruction> = vec![
            analyzed("0", &[0x0F, 0x84, 0x79, 0x05, 0x00, 0x00], "je", "target"),
            analyzed("1", &[0x8B, 0x44, 0x24, 0x08], "mov", "eax,[esp+8]"),
            analyzed("2", &[0xC3], "ret", ""),
            analyzed("3", &[0x83, 0xC4, 0x08], "add", "esp,8"),
            analyzed("4", &[0xE8, 0x10, 0x00, 0x00, 0x00], "call", "sub_401000"),
        ];
        for insn in cases {
            assert_eq!(insn.byte_map.len(), insn.size, "{insn}");
            assert!(insn.wildcard_positions.iter().all(|p| *p < insn.size));
        }
    }

    #[test]
    fn test_fallback_for_unknown_encoding() {
        // movss xmm0, [ebp+8] — the decoder does not cover SSE, so the
        // textual view drives a tail displacement.
        let insn = analyzed(
            "00401000",
            &[0xF3, 0x0F, 0x10, 0x45, 0x08],
            "movss",
            "xmm0,dword ptr ss:[ebp+8]",
        );
        assert_eq!(insn.byte_map.len(), 5);
        assert_eq!(insn.byte_map[4], ByteCategory::Displacement);
        assert_eq!(insn.candidates.last().map(|c| c.class), Some(ReasonCode::StackOffset));
    }

    #[test]
    fn test_disagreement_lowers_operand_volatility() {
        // Text claims an EBP displacement the encoding does not have.
        let insn = analyzed("00401000", &[0x89, 0xE5], "mov", "ebp,[ebp-10]");
        assert_eq!(insn.volatility.operand, VolatilityLevel::Low);
        assert!(insn.wildcard_positions.is_empty());
    }
}
