//! Export formatters for generated signatures.
//!
//! Stateless text transforms over a [`Signature`] for the scanners people
//! actually paste these into: plain AOB strings, byte+mask pairs, IDA-style
//! single-`?` patterns, Cheat Engine `aobscan` lines, C++ arrays, x64dbg
//! find-pattern strings, and JSON.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SigforgeError};
use crate::types::Signature;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    /// Space-separated pattern with `??` wildcards.
    Aob,
    /// Escaped byte string plus `x`/`?` mask.
    Mask,
    /// IDA-style pattern with single `?` wildcards.
    Ida,
    /// Cheat Engine `aobscan` line.
    CheatEngine,
    /// C++ byte array plus mask string literal.
    Cpp,
    /// x64dbg find-pattern string (compact hex).
    X64dbg,
    /// Pretty-printed JSON of the full signature.
    Json,
}

impl ExportFormat {
    /// All formats, in display order.
    pub const ALL: [ExportFormat; 7] = [
        ExportFormat::Aob,
        ExportFormat::Mask,
        ExportFormat::Ida,
        ExportFormat::CheatEngine,
        ExportFormat::Cpp,
        ExportFormat::X64dbg,
        ExportFormat::Json,
    ];

    /// The format's canonical lowercase tag.
    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Aob => "aob",
            ExportFormat::Mask => "mask",
            ExportFormat::Ida => "ida",
            ExportFormat::CheatEngine => "cheatengine",
            ExportFormat::Cpp => "cpp",
            ExportFormat::X64dbg => "x64dbg",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ExportFormat {
    type Err = SigforgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aob" => Ok(ExportFormat::Aob),
            "mask" => Ok(ExportFormat::Mask),
            "ida" => Ok(ExportFormat::Ida),
            "cheatengine" | "ce" => Ok(ExportFormat::CheatEngine),
            "cpp" | "c++" => Ok(ExportFormat::Cpp),
            "x64dbg" => Ok(ExportFormat::X64dbg),
            "json" => Ok(ExportFormat::Json),
            other => Err(SigforgeError::UnknownExportFormat {
                name: other.to_string(),
            }),
        }
    }
}

/// Render a signature in the requested format.
pub fn export(signature: &Signature, format: ExportFormat) -> Result<String> {
    let text = match format {
        ExportFormat::Aob => signature.pattern.clone(),
        ExportFormat::Mask => format!("{}\n{}", escaped_bytes(signature), signature.mask),
        ExportFormat::Ida => signature.pattern.replace("??", "?"),
        ExportFormat::CheatEngine => format!("aobscan(signature, {})", signature.pattern),
        ExportFormat::Cpp => format!(
            "const unsigned char kPattern[] = {{{}}};\nconst char kMask[] = \"{}\";",
            byte_array(signature),
            signature.mask
        ),
        ExportFormat::X64dbg => signature.pattern.replace(' ', ""),
        ExportFormat::Json => serde_json::to_string_pretty(signature)?,
    };
    Ok(text)
}

/// `\x0F\x84\x00...` with wildcards as zero bytes.
fn escaped_bytes(signature: &Signature) -> String {
    signature
        .bytes
        .iter()
        .map(|b| format!("\\x{:02X}", b.unwrap_or(0)))
        .collect()
}

/// `0x0F, 0x84, 0x00, ...` with wildcards as zero bytes.
fn byte_array(signature: &Signature) -> String {
    signature
        .bytes
        .iter()
        .map(|b| format!("0x{:02X}", b.unwrap_or(0)))
        .collect::<Vec<_>>()
        .join(", ")
}
