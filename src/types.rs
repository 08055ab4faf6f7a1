//! Core types for sigforge.
//!
//! This module defines all fundamental types used to represent parsed
//! instructions, byte classifications, wildcard rules, generated
//! signatures, and analysis results.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Recognized disassembly listing formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DumpFormat {
    /// x64dbg copy-paste: `ADDR | BYTES | MNEMONIC OPERANDS [| LABEL]`
    #[serde(rename = "x64dbg")]
    X64dbg,
    /// Cheat Engine: `module.exe+OFF - BYTES - MNEMONIC OPERANDS`
    #[serde(rename = "cheatengine")]
    CheatEngine,
    /// A bare stream of hex byte pairs with no mnemonics.
    #[serde(rename = "hex")]
    RawHex,
}

impl DumpFormat {
    /// Returns the canonical lowercase tag for this format.
    pub fn name(&self) -> &'static str {
        match self {
            DumpFormat::X64dbg => "x64dbg",
            DumpFormat::CheatEngine => "cheatengine",
            DumpFormat::RawHex => "hex",
        }
    }
}

impl fmt::Display for DumpFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DumpFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x64dbg" | "x32dbg" => Ok(DumpFormat::X64dbg),
            "cheatengine" | "cheat_engine" | "ce" => Ok(DumpFormat::CheatEngine),
            "hex" | "raw" | "rawhex" => Ok(DumpFormat::RawHex),
            other => Err(format!("unknown dump format: {other}")),
        }
    }
}

/// Instruction categories used for targeting and anchor scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionType {
    ConditionalJump,
    UnconditionalJump,
    Call,
    Return,
    Mov,
    Arithmetic,
    Logic,
    Compare,
    Stack,
    Float,
    String,
    Other,
}

impl InstructionType {
    /// Classify a lowercase mnemonic by table lookup.
    pub fn from_mnemonic(mnemonic: &str) -> Self {
        match mnemonic {
            "jmp" => InstructionType::UnconditionalJump,
            "call" => InstructionType::Call,
            "ret" | "retn" | "retf" | "iret" | "iretd" => InstructionType::Return,
            "mov" | "movzx" | "movsx" | "lea" | "xchg" => InstructionType::Mov,
            "add" | "sub" | "mul" | "imul" | "div" | "idiv" | "inc" | "dec" | "neg" | "adc"
            | "sbb" => InstructionType::Arithmetic,
            "and" | "or" | "xor" | "not" | "shl" | "shr" | "sal" | "sar" | "rol" | "ror"
            | "rcl" | "rcr" => InstructionType::Logic,
            "cmp" | "test" => InstructionType::Compare,
            "push" | "pop" | "pushad" | "popad" | "pushfd" | "popfd" | "enter" | "leave" => {
                InstructionType::Stack
            }
            "movsb" | "movsw" | "movsd" | "lodsb" | "lodsw" | "lodsd" | "stosb" | "stosw"
            | "stosd" | "scasb" | "scasw" | "scasd" | "cmpsb" | "cmpsw" | "cmpsd" | "rep"
            | "repe" | "repz" | "repne" | "repnz" => InstructionType::String,
            m if m.starts_with("cmov") || m.starts_with("set") => InstructionType::Mov,
            m if is_conditional_jump(m) => InstructionType::ConditionalJump,
            m if m.len() > 1 && m.starts_with('f') => InstructionType::Float,
            _ => InstructionType::Other,
        }
    }

    /// Returns the snake_case tag for this type.
    pub fn name(&self) -> &'static str {
        match self {
            InstructionType::ConditionalJump => "conditional_jump",
            InstructionType::UnconditionalJump => "unconditional_jump",
            InstructionType::Call => "call",
            InstructionType::Return => "return",
            InstructionType::Mov => "mov",
            InstructionType::Arithmetic => "arithmetic",
            InstructionType::Logic => "logic",
            InstructionType::Compare => "compare",
            InstructionType::Stack => "stack",
            InstructionType::Float => "float",
            InstructionType::String => "string",
            InstructionType::Other => "other",
        }
    }

    /// True for conditional and unconditional jumps.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            InstructionType::ConditionalJump | InstructionType::UnconditionalJump
        )
    }

    /// True for near calls.
    pub fn is_call(&self) -> bool {
        matches!(self, InstructionType::Call)
    }
}

impl fmt::Display for InstructionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn is_conditional_jump(m: &str) -> bool {
    matches!(
        m,
        "ja" | "jae"
            | "jb"
            | "jbe"
            | "jc"
            | "je"
            | "jz"
            | "jg"
            | "jge"
            | "jl"
            | "jle"
            | "jna"
            | "jnae"
            | "jnb"
            | "jnbe"
            | "jnc"
            | "jne"
            | "jng"
            | "jnge"
            | "jnl"
            | "jnle"
            | "jno"
            | "jnp"
            | "jns"
            | "jnz"
            | "jo"
            | "jp"
            | "jpe"
            | "jpo"
            | "js"
            | "jcxz"
            | "jecxz"
            | "loop"
            | "loope"
            | "loopne"
    )
}

/// How likely a byte or field is to change across recompilations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl VolatilityLevel {
    /// Returns the lowercase tag for this level.
    pub fn name(&self) -> &'static str {
        match self {
            VolatilityLevel::Low => "low",
            VolatilityLevel::Medium => "medium",
            VolatilityLevel::High => "high",
        }
    }

    /// One step lower, saturating at `Low`.
    pub fn lowered(self) -> Self {
        match self {
            VolatilityLevel::High => VolatilityLevel::Medium,
            _ => VolatilityLevel::Low,
        }
    }
}

impl fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-instruction volatility rating: opcode encoding vs operand material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Volatility {
    /// Volatility of the opcode encoding itself.
    pub opcode: VolatilityLevel,
    /// Volatility of the operand bytes (displacements, immediates, offsets).
    pub operand: VolatilityLevel,
}

/// Semantic category of a single instruction byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteCategory {
    /// Opcode bytes, including legacy prefixes and the 0x0F escape.
    Opcode,
    ModRm,
    Sib,
    Displacement,
    Immediate,
    RelativeOffset,
}

impl ByteCategory {
    /// Returns the snake_case tag for this category.
    pub fn name(&self) -> &'static str {
        match self {
            ByteCategory::Opcode => "opcode",
            ByteCategory::ModRm => "modrm",
            ByteCategory::Sib => "sib",
            ByteCategory::Displacement => "displacement",
            ByteCategory::Immediate => "immediate",
            ByteCategory::RelativeOffset => "relative_offset",
        }
    }
}

/// Why a byte position is a wildcard candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    RelativeJump,
    RelativeCall,
    StackOffset,
    GlobalAddress,
    Immediate,
    StructOffset,
    MemoryDisplacement,
}

impl ReasonCode {
    /// True for every memory-displacement class (the
    /// `memory_displacements` superset).
    pub fn is_memory(&self) -> bool {
        matches!(
            self,
            ReasonCode::StackOffset
                | ReasonCode::GlobalAddress
                | ReasonCode::StructOffset
                | ReasonCode::MemoryDisplacement
        )
    }

    /// Returns the snake_case tag for this reason.
    pub fn name(&self) -> &'static str {
        match self {
            ReasonCode::RelativeJump => "relative_jump",
            ReasonCode::RelativeCall => "relative_call",
            ReasonCode::StackOffset => "stack_offset",
            ReasonCode::GlobalAddress => "global_address",
            ReasonCode::Immediate => "immediate",
            ReasonCode::StructOffset => "struct_offset",
            ReasonCode::MemoryDisplacement => "memory_displacement",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A candidate wildcard position within one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WildcardCandidate {
    /// Byte offset within the instruction.
    pub offset: usize,
    /// The candidate class used by strategy masks.
    pub class: ReasonCode,
}

bitflags! {
    /// The seven configurable wildcard candidate classes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WildcardRules: u8 {
        /// rel8/rel32 displacements of conditional + unconditional jumps.
        const RELATIVE_JUMPS = 1 << 0;
        /// rel32 displacement of near call.
        const RELATIVE_CALLS = 1 << 1;
        /// Displacement in `[ebp±X]` / `[esp±X]` operands.
        const STACK_OFFSETS = 1 << 2;
        /// 4-byte absolute displacement with no base register.
        const GLOBAL_ADDRESSES = 1 << 3;
        /// Trailing immediate operand bytes.
        const IMMEDIATES = 1 << 4;
        /// Non-stack `[reg+X]` 1-byte displacement.
        const STRUCT_OFFSETS = 1 << 5;
        /// Every memory displacement byte (superset).
        const MEMORY_DISPLACEMENTS = 1 << 6;
    }
}

impl Default for WildcardRules {
    fn default() -> Self {
        WildcardRules::RELATIVE_JUMPS
            | WildcardRules::RELATIVE_CALLS
            | WildcardRules::STACK_OFFSETS
            | WildcardRules::GLOBAL_ADDRESSES
    }
}

impl WildcardRules {
    /// True when the rule set enables candidates of the given class.
    ///
    /// `MEMORY_DISPLACEMENTS` is a superset flag: it admits every memory
    /// displacement class.
    pub fn admits(&self, class: ReasonCode) -> bool {
        if class.is_memory() && self.contains(WildcardRules::MEMORY_DISPLACEMENTS) {
            return true;
        }
        match class {
            ReasonCode::RelativeJump => self.contains(WildcardRules::RELATIVE_JUMPS),
            ReasonCode::RelativeCall => self.contains(WildcardRules::RELATIVE_CALLS),
            ReasonCode::StackOffset => self.contains(WildcardRules::STACK_OFFSETS),
            ReasonCode::GlobalAddress => self.contains(WildcardRules::GLOBAL_ADDRESSES),
            ReasonCode::Immediate => self.contains(WildcardRules::IMMEDIATES),
            ReasonCode::StructOffset => self.contains(WildcardRules::STRUCT_OFFSETS),
            ReasonCode::MemoryDisplacement => self.contains(WildcardRules::MEMORY_DISPLACEMENTS),
        }
    }
}

/// A single disassembled instruction with recovered bytes.
///
/// Created by the parser, enriched once by the analyzer, then read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    /// 8-hex-digit uppercase address, unique within a parsed batch.
    pub address: String,
    /// Raw machine bytes.
    pub bytes: Vec<u8>,
    /// Length of `bytes` (1–15).
    pub size: usize,
    /// Lowercase mnemonic.
    pub mnemonic: String,
    /// Raw operand text as written by the source disassembler.
    pub operands: String,
    /// Lowercased, whitespace-collapsed operand text.
    pub operands_normalized: String,
    /// Optional human tag harvested from the input.
    pub label: Option<String>,
    /// Mnemonic-table category.
    #[serde(rename = "type")]
    pub kind: InstructionType,
    /// Opcode/operand volatility pair (filled by the analyzer).
    pub volatility: Volatility,
    /// One category per byte (filled by the analyzer).
    pub byte_map: Vec<ByteCategory>,
    /// Classed candidate wildcard positions (filled by the analyzer).
    pub candidates: Vec<WildcardCandidate>,
    /// Flat candidate byte offsets (filled by the analyzer).
    pub wildcard_positions: Vec<usize>,
}

impl Instruction {
    /// Create a parsed (not yet analyzed) instruction.
    pub fn new(
        address: impl Into<String>,
        bytes: Vec<u8>,
        mnemonic: impl Into<String>,
        operands: impl Into<String>,
    ) -> Self {
        let mnemonic = mnemonic.into().to_ascii_lowercase();
        let operands = operands.into();
        let size = bytes.len();
        Self {
            address: Self::normalize_address(&address.into()),
            bytes,
            size,
            operands_normalized: normalize_operands(&operands),
            kind: InstructionType::from_mnemonic(&mnemonic),
            mnemonic,
            operands,
            label: None,
            volatility: Volatility::default(),
            byte_map: Vec::new(),
            candidates: Vec::new(),
            wildcard_positions: Vec::new(),
        }
    }

    /// Attach a label harvested from the input.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Normalize an address to 8 uppercase hex characters.
    ///
    /// Shorter addresses are left-padded with zero; a `0x` prefix is
    /// stripped.
    pub fn normalize_address(address: &str) -> String {
        let trimmed = address
            .trim()
            .trim_start_matches("0x")
            .trim_start_matches("0X");
        format!("{:0>8}", trimmed.to_ascii_uppercase())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.address, self.mnemonic)?;
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands)?;
        }
        Ok(())
    }
}

/// Lowercase and collapse runs of whitespace to single spaces.
pub fn normalize_operands(operands: &str) -> String {
    operands
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

/// Signature stability rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    High,
    Medium,
    Low,
}

impl Stability {
    /// Rank for sorting: higher is more stable.
    pub fn rank(&self) -> u8 {
        match self {
            Stability::High => 2,
            Stability::Medium => 1,
            Stability::Low => 0,
        }
    }

    /// Returns the lowercase tag for this rating.
    pub fn name(&self) -> &'static str {
        match self {
            Stability::High => "high",
            Stability::Medium => "medium",
            Stability::Low => "low",
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Per-wildcard explanation attached to a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WildcardReason {
    /// Byte position within the signature.
    pub position: usize,
    /// Reason class.
    pub code: ReasonCode,
    /// Originating instruction, as `ADDRESS mnemonic`.
    pub detail: String,
}

/// A ranked wildcarded byte pattern.
///
/// Immutable after construction; `pattern`, `mask`, and `bytes` always
/// agree position-for-position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// Space-separated tokens, each two uppercase hex digits or `??`.
    pub pattern: String,
    /// Companion string: `x` marks a concrete byte, `?` a wildcard.
    pub mask: String,
    /// Byte values, `None` at wildcard positions.
    pub bytes: Vec<Option<u8>>,
    /// Total byte count.
    pub length: usize,
    /// Number of wildcarded positions.
    pub wildcard_count: usize,
    /// Wildcard byte positions relative to the signature.
    pub wildcard_positions: Vec<usize>,
    /// Uniqueness estimate in `[0, 1]`.
    pub uniqueness_score: f64,
    /// Stability rating.
    pub stability: Stability,
    /// Strategy tag that produced this variant.
    pub strategy: String,
    /// Per-wildcard explanations.
    pub wildcard_reasons: Vec<WildcardReason>,
    /// Degradation warnings (short stream, truncated window).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {:.3} ({})",
            self.pattern, self.strategy, self.uniqueness_score, self.stability
        )
    }
}

/// Aggregate statistics from one parse call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    /// Non-empty lines seen.
    pub total_lines: usize,
    /// Lines that contributed instruction bytes.
    pub parsed: usize,
    /// Lines dropped (bad bytes, no bytes, unrecognized shape).
    pub dropped: usize,
}

/// Output of the parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResult {
    /// Instructions in input order.
    pub instructions: Vec<Instruction>,
    /// Deduplicated labels in insertion order.
    pub labels: Vec<String>,
    /// The recognized format.
    pub format: DumpFormat,
    /// Module name, when the listing is module-relative.
    pub module: Option<String>,
    /// Aggregate statistics.
    pub stats: ParseStats,
}

/// Target selection for signature generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSelection {
    /// Explicit target identifiers: labels, `jump@ADDR`, `call@ADDR`,
    /// `auto@ADDR`, or decimal instruction indices.
    Explicit(Vec<String>),
    /// Every labeled, jump, and call instruction.
    All,
    /// Every labeled instruction.
    AllLabeled,
    /// Every jump instruction.
    AllJumps,
    /// Every call instruction.
    AllCalls,
}

impl TargetSelection {
    /// Build an explicit selection from identifier strings.
    pub fn explicit<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TargetSelection::Explicit(ids.into_iter().map(Into::into).collect())
    }

    /// Parse one of the special tokens, or fall back to a single explicit id.
    pub fn from_token(token: &str) -> Self {
        match token {
            "all" => TargetSelection::All,
            "all_labeled" => TargetSelection::AllLabeled,
            "all_jumps" => TargetSelection::AllJumps,
            "all_calls" => TargetSelection::AllCalls,
            other => TargetSelection::Explicit(vec![other.to_string()]),
        }
    }
}

/// Options for signature generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Minimum signature length in bytes.
    pub min_length: usize,
    /// Maximum signature length in bytes.
    pub max_length: usize,
    /// Hard cap on variants per target after dedup.
    pub variants: usize,
    /// Instructions to include before the anchor.
    pub context_before: usize,
    /// Instructions to consume after the anchor.
    pub context_after: usize,
    /// Enabled wildcard candidate classes.
    pub rules: WildcardRules,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            min_length: 20,
            max_length: 50,
            variants: 10,
            context_before: 0,
            context_after: 10,
            rules: WildcardRules::default(),
        }
    }

    /// Create options for thorough generation (longer windows, more variants).
    pub fn thorough() -> Self {
        Self {
            min_length: 20,
            max_length: 80,
            variants: 16,
            context_before: 2,
            context_after: 14,
            rules: WildcardRules::default(),
        }
    }

    /// Create options for fast generation (short windows, few variants).
    pub fn fast() -> Self {
        Self {
            min_length: 12,
            max_length: 32,
            variants: 4,
            context_before: 0,
            context_after: 6,
            rules: WildcardRules::default(),
        }
    }

    /// Replace the wildcard rule set.
    pub fn with_rules(mut self, rules: WildcardRules) -> Self {
        self.rules = rules;
        self
    }

    /// Validate option consistency.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.min_length > self.max_length {
            return Err(crate::error::SigforgeError::InvalidOptions {
                message: format!(
                    "min_length {} exceeds max_length {}",
                    self.min_length, self.max_length
                ),
            });
        }
        if self.max_length == 0 {
            return Err(crate::error::SigforgeError::InvalidOptions {
                message: "max_length must be nonzero".to_string(),
            });
        }
        if self.variants == 0 {
            return Err(crate::error::SigforgeError::InvalidOptions {
                message: "variants must be nonzero".to_string(),
            });
        }
        Ok(())
    }
}

/// Output of one `generate` call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    /// Ranked variants per resolved target id.
    pub signatures: BTreeMap<String, Vec<Signature>>,
    /// Targets that did not resolve.
    pub unresolved: Vec<String>,
    /// False when any requested target was skipped.
    pub complete: bool,
}

impl GenerationResult {
    /// True when no target produced any variant.
    pub fn is_empty(&self) -> bool {
        self.signatures.values().all(Vec::is_empty)
    }

    /// Total variants across all targets.
    pub fn variant_count(&self) -> usize {
        self.signatures.values().map(Vec::len).sum()
    }
}

/// A scored anchor candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartTarget {
    /// Instruction index in the parsed stream.
    pub index: usize,
    /// Instruction address.
    pub address: String,
    /// Instruction mnemonic.
    pub mnemonic: String,
    /// Label, when the instruction carries one.
    pub label: Option<String>,
    /// Weighted total score in `[0, 100]`.
    pub score: f64,
    /// Byte-stability sub-score in `[0, 100]`.
    pub stability_score: f64,
    /// Opcode-rarity sub-score in `[0, 100]`.
    pub uniqueness_score: f64,
    /// Neighborhood sub-score in `[0, 100]`.
    pub context_score: f64,
}

impl SmartTarget {
    /// The identifier this target resolves under in `generate`.
    pub fn target_id(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("auto@{}", self.address),
        }
    }
}

/// A maximal contiguous run of stable instructions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StableRegion {
    /// Index of the first instruction in the run.
    pub start_index: usize,
    /// Index of the last instruction in the run.
    pub end_index: usize,
    /// Address of the first instruction.
    pub start_address: String,
    /// Address of the last instruction.
    pub end_address: String,
    /// Instructions in the run.
    pub instruction_count: usize,
    /// Total bytes covered by the run.
    pub byte_count: usize,
}

/// Output of smart analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartAnalysisResult {
    /// Top anchor candidates, best first.
    pub targets: Vec<SmartTarget>,
    /// Stable regions in stream order.
    pub regions: Vec<StableRegion>,
    /// Instructions analyzed.
    pub instruction_count: usize,
    /// Mean stability sub-score across the stream.
    pub average_stability: f64,
    /// Human-readable one-line summary.
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mnemonic_classification() {
        assert_eq!(
            InstructionType::from_mnemonic("je"),
            InstructionType::ConditionalJump
        );
        assert_eq!(
            InstructionType::from_mnemonic("jmp"),
            InstructionType::UnconditionalJump
        );
        assert_eq!(InstructionType::from_mnemonic("call"), InstructionType::Call);
        assert_eq!(InstructionType::from_mnemonic("ret"), InstructionType::Return);
        assert_eq!(InstructionType::from_mnemonic("lea"), InstructionType::Mov);
        assert_eq!(
            InstructionType::from_mnemonic("xor"),
            InstructionType::Logic
        );
        assert_eq!(
            InstructionType::from_mnemonic("fmul"),
            InstructionType::Float
        );
        assert_eq!(
            InstructionType::from_mnemonic("movsd"),
            InstructionType::String
        );
        assert_eq!(
            InstructionType::from_mnemonic("int3"),
            InstructionType::Other
        );
    }

    #[test]
    fn test_address_normalization() {
        assert_eq!(Instruction::normalize_address("b27ab0"), "00B27AB0");
        assert_eq!(Instruction::normalize_address("0x401000"), "00401000");
        assert_eq!(Instruction::normalize_address("0046751D"), "0046751D");
    }

    #[test]
    fn test_operand_normalization() {
        assert_eq!(
            normalize_operands("ECX,  dword ptr [EBP - 1D4]"),
            "ecx, dword ptr [ebp - 1d4]"
        );
    }

    #[test]
    fn test_default_rules() {
        let rules = WildcardRules::default();
        assert!(rules.admits(ReasonCode::RelativeJump));
        assert!(rules.admits(ReasonCode::RelativeCall));
        assert!(rules.admits(ReasonCode::StackOffset));
        assert!(rules.admits(ReasonCode::GlobalAddress));
        assert!(!rules.admits(ReasonCode::Immediate));
        assert!(!rules.admits(ReasonCode::StructOffset));
        assert!(!rules.admits(ReasonCode::MemoryDisplacement));
    }

    #[test]
    fn test_options_validation() {
        assert!(GeneratorOptions::new().validate().is_ok());

        let mut opts = GeneratorOptions::new();
        opts.min_length = 60;
        assert!(opts.validate().is_err());

        let mut opts = GeneratorOptions::new();
        opts.variants = 0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_stability_ordering() {
        assert!(Stability::High.rank() > Stability::Medium.rank());
        assert!(Stability::Medium.rank() > Stability::Low.rank());
    }

    #[test]
    fn test_dump_format_round_trip() {
        for fmt in [DumpFormat::X64dbg, DumpFormat::CheatEngine, DumpFormat::RawHex] {
            assert_eq!(fmt.name().parse::<DumpFormat>().unwrap(), fmt);
        }
        assert!("auto".parse::<DumpFormat>().is_err());
    }

    #[test]
    fn test_target_selection_tokens() {
        assert_eq!(TargetSelection::from_token("all"), TargetSelection::All);
        assert_eq!(
            TargetSelection::from_token("all_jumps"),
            TargetSelection::AllJumps
        );
        assert_eq!(
            TargetSelection::from_token("Lawnmower_A"),
            TargetSelection::Explicit(vec!["Lawnmower_A".to_string()])
        );
    }

    #[test]
    fn test_volatility_lowering() {
        assert_eq!(VolatilityLevel::High.lowered(), VolatilityLevel::Medium);
        assert_eq!(VolatilityLevel::Medium.lowered(), VolatilityLevel::Low);
        assert_eq!(VolatilityLevel::Low.lowered(), VolatilityLevel::Low);
    }
}
