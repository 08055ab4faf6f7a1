//! sigforge - Byte-Signature Generation for 32-bit x86
//!
//! This library turns disassembly listings into ranked byte signatures
//! with wildcards (`??`) that survive rebuilds of the same program.
//!
//! # Features
//!
//! - **Multi-format parsing**: Auto-detects x64dbg, Cheat Engine, and raw
//!   hex listings and reconstructs instruction bytes
//! - **Volatility analysis**: Classifies every instruction byte (opcode,
//!   ModRM, SIB, displacement, immediate, relative offset) and flags the
//!   positions likely to change across recompilations
//! - **Nine wildcarding strategies**: From minimal (relative branches
//!   only) to aggressive, each scored for uniqueness and stability
//! - **Smart anchors**: Scores instructions as signature starting points
//!   and detects stable regions, so good anchors are picked automatically
//!
//! # Quick Start
//!
//! ```rust
//! use sigforge::{parse, generate_targeted, GeneratorOptions};
//!
//! fn main() -> sigforge::Result<()> {
//!     let listing = "00B27AB0 | 0F84 79050000 | je apr24.2020.B2802F";
//!     let parsed = parse(listing, None)?;
//!     let result = generate_targeted(&parsed.instructions, &GeneratorOptions::new())?;
//!     for (target, variants) in &result.signatures {
//!         for sig in variants {
//!             println!("{target}: {}", sig.pattern);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Pipeline
//!
//! The core is a pure pipeline: `parse` produces immutable [`Instruction`]
//! records, the analyzer enriches them once, and the generator and smart
//! analyzer only read. Repeated invocations with identical inputs produce
//! identical outputs; no global state exists anywhere in the crate.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]

pub mod analysis;
pub mod error;
pub mod formats;
pub mod formatter;
pub mod generator;
pub mod smart;
pub mod types;
pub mod x86;

pub use error::{Result, SigforgeError};
pub use formatter::{export, ExportFormat};
pub use generator::Strategy;
pub use types::{
    ByteCategory, DumpFormat, GenerationResult, GeneratorOptions, Instruction, InstructionType,
    ParseResult, ParseStats, ReasonCode, Signature, SmartAnalysisResult, SmartTarget,
    Stability, StableRegion, TargetSelection, Volatility, VolatilityLevel, WildcardCandidate,
    WildcardReason, WildcardRules,
};

/// Parse a disassembly listing into an instruction stream.
///
/// `hint` forces a format; `None` auto-detects by scoring the input's
/// leading lines. Individual unparseable lines are skipped and counted;
/// only a fully unrecognizable listing fails.
///
/// # Errors
///
/// [`SigforgeError::UnrecognizedListing`] when no line matches any format.
pub fn parse(text: &str, hint: Option<DumpFormat>) -> Result<ParseResult> {
    formats::parse(text, hint)
}

/// [`parse`] with a base address for raw hex streams.
///
/// Addresses of disassembled instructions are synthesized sequentially
/// starting at `base`.
///
/// # Errors
///
/// [`SigforgeError::UnrecognizedListing`] when no line matches any format.
pub fn parse_with_base(text: &str, hint: Option<DumpFormat>, base: u32) -> Result<ParseResult> {
    formats::parse_with_base(text, hint, base)
}

/// Generate ranked signature variants for each requested target.
///
/// Targets may be labels, `jump@ADDR` / `call@ADDR` / `auto@ADDR` forms,
/// instruction indices, or one of the `all*` selections. Unresolved
/// targets are skipped and recorded in the result; `complete` is false
/// when any were.
///
/// # Errors
///
/// [`SigforgeError::InvalidOptions`] for inconsistent option values
/// (e.g. `min_length > max_length`).
pub fn generate(
    instructions: &[Instruction],
    targets: &TargetSelection,
    options: &GeneratorOptions,
) -> Result<GenerationResult> {
    generator::generate(instructions, targets, options)
}

/// Generate against the first instruction, keyed `auto@<first-address>`.
///
/// # Errors
///
/// [`SigforgeError::InvalidOptions`] for inconsistent option values.
pub fn generate_targeted(
    instructions: &[Instruction],
    options: &GeneratorOptions,
) -> Result<GenerationResult> {
    generator::generate_targeted(instructions, options)
}

/// Score every instruction as an anchor candidate and detect stable
/// regions, returning the top `max_targets` candidates with aggregate
/// metrics.
pub fn smart_analyze(instructions: &[Instruction], max_targets: usize) -> SmartAnalysisResult {
    smart::analyze(instructions, max_targets)
}

/// [`smart_analyze`] followed by [`generate`] against the top `top_n`
/// anchors.
///
/// # Errors
///
/// [`SigforgeError::InvalidOptions`] for inconsistent option values.
pub fn smart_generate(
    instructions: &[Instruction],
    options: &GeneratorOptions,
    top_n: usize,
) -> Result<GenerationResult> {
    smart::smart_generate(instructions, options, top_n)
}

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_end_to_end_x64dbg() {
        let listing = "\
00B27AA6 | 8B45 08 | mov eax,dword ptr ss:[ebp+8]
00B27AA9 | 85C0 | test eax,eax
00B27AB0 | 0F84 79050000 | je apr24.2020.B2802F | Lawnmower_A
00B27AB6 | 8B8D 2CFEFFFF | mov ecx,dword ptr ss:[ebp-1D4]
00B27ABC | E8 3F010000 | call apr24.2020.B27C00
00B27AC1 | A1 A0C4B200 | mov eax,dword ptr ds:[B2C4A0]
00B27AC6 | 83C4 10 | add esp,10
00B27AC9 | C3 | ret";
        let parsed = parse(listing, None).unwrap();
        assert_eq!(parsed.format, DumpFormat::X64dbg);

        let result = generate(
            &parsed.instructions,
            &TargetSelection::explicit(["Lawnmower_A"]),
            &GeneratorOptions::new(),
        )
        .unwrap();
        assert!(result.complete);

        let variants = &result.signatures["Lawnmower_A"];
        assert!(!variants.is_empty());
        let best = &variants[0];
        assert!(best.uniqueness_score > 0.0 && best.uniqueness_score <= 1.0);
        assert_eq!(best.pattern.split(' ').count(), best.length);
    }

    #[test]
    fn test_end_to_end_raw_hex() {
        let parsed = parse("0F 84 79 05 00 00 8B 8D 2C FE FF FF", None).unwrap();
        assert_eq!(parsed.format, DumpFormat::RawHex);
        assert_eq!(parsed.instructions.len(), 2);

        let result = generate_targeted(&parsed.instructions, &GeneratorOptions::new()).unwrap();
        let variants = &result.signatures["auto@00000000"];
        // Twelve bytes of stream: every variant degrades below min_length.
        for sig in variants {
            assert_eq!(sig.stability, Stability::Low);
        }
    }

    #[test]
    fn test_end_to_end_smart() {
        let listing = "\
00401000 | 55 | push ebp
00401001 | 8BEC | mov ebp,esp
00401003 | 8B45 08 | mov eax,dword ptr ss:[ebp+8]
00401006 | 0FB6 C8 | movzx ecx,al
00401009 | 33D2 | xor edx,edx
0040100B | 03CA | add ecx,edx
0040100D | 8BC1 | mov eax,ecx
0040100F | 5D | pop ebp
00401010 | C3 | ret";
        let parsed = parse(listing, None).unwrap();
        let analysis = smart_analyze(&parsed.instructions, 3);
        assert_eq!(analysis.targets.len(), 3);

        let generated = smart_generate(&parsed.instructions, &GeneratorOptions::new(), 2).unwrap();
        assert_eq!(generated.signatures.len(), 2);
    }

    #[test]
    fn test_determinism_across_calls() {
        let listing = "0F 84 79 05 00 00 8B 8D 2C FE FF FF E8 3F 01 00 00 C3";
        let a = parse(listing, None).unwrap();
        let b = parse(listing, None).unwrap();
        let gen_a = generate_targeted(&a.instructions, &GeneratorOptions::new()).unwrap();
        let gen_b = generate_targeted(&b.instructions, &GeneratorOptions::new()).unwrap();
        assert_eq!(
            serde_json::to_string(&gen_a).unwrap(),
            serde_json::to_string(&gen_b).unwrap()
        );
    }

    #[test]
    fn test_export_of_generated_signature() {
        let parsed = parse("0F 84 79 05 00 00 C3", None).unwrap();
        let result = generate_targeted(&parsed.instructions, &GeneratorOptions::new()).unwrap();
        let variants = result.signatures.values().next().unwrap();
        let sig = &variants[0];
        let aob = export(sig, ExportFormat::Aob).unwrap();
        assert_eq!(aob, sig.pattern);
    }
}
