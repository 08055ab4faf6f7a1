//! Signature generation.
//!
//! Builds byte windows around anchor instructions, realizes wildcards under
//! each of the nine strategies across a set of context variations, scores
//! the resulting variants, and returns a deduplicated, ranked list per
//! target. Generation is fail-soft: unresolved targets are recorded and
//! skipped, and streams shorter than `min_length` degrade to low-stability
//! variants instead of failing.

pub mod strategy;

pub use strategy::Strategy;

use std::collections::BTreeMap;

use crate::analysis;
use crate::error::Result;
use crate::types::{
    GenerationResult, GeneratorOptions, Instruction, ReasonCode, Signature, Stability,
    TargetSelection, VolatilityLevel, WildcardReason,
};

/// Mask similarity above which a lower-ranked variant is dropped.
const SIMILARITY_THRESHOLD: f64 = 0.75;

/// Absolute uniqueness difference that lets a similar variant survive.
const UNIQUENESS_ESCAPE: f64 = 0.10;

/// The `(context_before, context_after)` variation table; `ToNextRet`
/// extends to the next `ret` in the stream.
const CONTEXT_PAIRS: [(usize, AfterSpec); 10] = [
    (0, AfterSpec::Count(4)),
    (0, AfterSpec::Count(6)),
    (0, AfterSpec::Count(8)),
    (0, AfterSpec::Count(10)),
    (0, AfterSpec::ToNextRet),
    (1, AfterSpec::Count(6)),
    (1, AfterSpec::Count(8)),
    (1, AfterSpec::Count(10)),
    (2, AfterSpec::Count(8)),
    (2, AfterSpec::Count(10)),
];

#[derive(Debug, Clone, Copy)]
enum AfterSpec {
    Count(usize),
    ToNextRet,
}

/// Generate ranked signature variants for each requested target.
///
/// Instructions are (re-)analyzed internally, so both raw parser output and
/// already-analyzed streams are accepted. Unresolvable targets are skipped
/// and recorded in the result.
pub fn generate(
    instructions: &[Instruction],
    targets: &TargetSelection,
    options: &GeneratorOptions,
) -> Result<GenerationResult> {
    options.validate()?;
    let analyzed = analysis::analyze_all(instructions.to_vec());
    let (resolved, unresolved) = resolve_selection(&analyzed, targets);

    let mut signatures = BTreeMap::new();
    for (id, anchor) in resolved {
        let variants = generate_for_anchor(&analyzed, anchor, options);
        signatures.insert(id, variants);
    }

    let complete = unresolved.is_empty();
    Ok(GenerationResult {
        signatures,
        unresolved,
        complete,
    })
}

/// Generate against the first instruction, keyed `auto@<first-address>`.
pub fn generate_targeted(
    instructions: &[Instruction],
    options: &GeneratorOptions,
) -> Result<GenerationResult> {
    let id = instructions
        .first()
        .map(|insn| format!("auto@{}", Instruction::normalize_address(&insn.address)));
    match id {
        Some(id) => generate(instructions, &TargetSelection::explicit([id]), options),
        None => {
            options.validate()?;
            Ok(GenerationResult {
                signatures: BTreeMap::new(),
                unresolved: Vec::new(),
                complete: true,
            })
        }
    }
}

/// Resolve one target identifier to an instruction index.
///
/// Accepted forms: a literal label, `jump@ADDR`, `call@ADDR`, `auto@ADDR`,
/// or a decimal instruction index.
pub(crate) fn resolve_target(instructions: &[Instruction], id: &str) -> Option<usize> {
    if let Some(idx) = instructions
        .iter()
        .position(|i| i.label.as_deref() == Some(id))
    {
        return Some(idx);
    }
    if let Some(addr) = id.strip_prefix("jump@") {
        let addr = Instruction::normalize_address(addr);
        return instructions
            .iter()
            .position(|i| i.kind.is_jump() && i.address == addr);
    }
    if let Some(addr) = id.strip_prefix("call@") {
        let addr = Instruction::normalize_address(addr);
        return instructions
            .iter()
            .position(|i| i.kind.is_call() && i.address == addr);
    }
    if let Some(addr) = id.strip_prefix("auto@") {
        let addr = Instruction::normalize_address(addr);
        return instructions.iter().position(|i| i.address == addr);
    }
    if let Ok(index) = id.parse::<usize>() {
        if index < instructions.len() {
            return Some(index);
        }
    }
    None
}

/// Expand a selection into `(id, anchor index)` pairs plus unresolved ids.
fn resolve_selection(
    instructions: &[Instruction],
    selection: &TargetSelection,
) -> (Vec<(String, usize)>, Vec<String>) {
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();

    match selection {
        TargetSelection::Explicit(ids) => {
            for id in ids {
                match resolve_target(instructions, id) {
                    Some(idx) => resolved.push((id.clone(), idx)),
                    None => unresolved.push(id.clone()),
                }
            }
        }
        TargetSelection::All => {
            for (idx, insn) in instructions.iter().enumerate() {
                if let Some(label) = &insn.label {
                    resolved.push((label.clone(), idx));
                } else if insn.kind.is_jump() {
                    resolved.push((format!("jump@{}", insn.address), idx));
                } else if insn.kind.is_call() {
                    resolved.push((format!("call@{}", insn.address), idx));
                }
            }
        }
        TargetSelection::AllLabeled => {
            for (idx, insn) in instructions.iter().enumerate() {
                if let Some(label) = &insn.label {
                    resolved.push((label.clone(), idx));
                }
            }
        }
        TargetSelection::AllJumps => {
            for (idx, insn) in instructions.iter().enumerate() {
                if insn.kind.is_jump() {
                    resolved.push((format!("jump@{}", insn.address), idx));
                }
            }
        }
        TargetSelection::AllCalls => {
            for (idx, insn) in instructions.iter().enumerate() {
                if insn.kind.is_call() {
                    resolved.push((format!("call@{}", insn.address), idx));
                }
            }
        }
    }

    (resolved, unresolved)
}

/// An instruction window around an anchor.
#[derive(Debug, Clone, Copy)]
struct Window {
    start: usize,
    /// Inclusive end index.
    end: usize,
    /// The stream could not supply `min_length` bytes.
    truncated: bool,
}

/// Build a window per the sizing rules: `before` context instructions, then
/// grow forward until `max_length` bytes or `after` instructions, then
/// extend past `after` (and finally pull context backwards) to reach
/// `min_length`.
fn build_window(
    instructions: &[Instruction],
    anchor: usize,
    before: usize,
    after: usize,
    options: &GeneratorOptions,
) -> Window {
    let mut start = anchor.saturating_sub(before);
    let mut end = anchor;
    let mut bytes: usize = instructions[start..=anchor].iter().map(|i| i.size).sum();

    while end - anchor < after && bytes < options.max_length && end + 1 < instructions.len() {
        end += 1;
        bytes += instructions[end].size;
    }
    while bytes < options.min_length && end + 1 < instructions.len() {
        end += 1;
        bytes += instructions[end].size;
    }
    while bytes < options.min_length && start > 0 {
        start -= 1;
        bytes += instructions[start].size;
    }

    Window {
        start,
        end,
        truncated: bytes < options.min_length,
    }
}

/// Instructions from the anchor to the next `ret`, inclusive.
fn distance_to_ret(instructions: &[Instruction], anchor: usize, fallback: usize) -> usize {
    instructions[anchor..]
        .iter()
        .position(|i| i.kind == crate::types::InstructionType::Return)
        .unwrap_or(fallback)
}

/// The most stable instruction within ±3 positions of the anchor.
///
/// Lower combined volatility wins; ties go to the closest, then earliest,
/// instruction.
fn most_stable_near(instructions: &[Instruction], anchor: usize) -> usize {
    let lo = anchor.saturating_sub(3);
    let hi = (anchor + 3).min(instructions.len().saturating_sub(1));
    (lo..=hi)
        .min_by_key(|&i| {
            let v = instructions[i].volatility;
            let rank = (v.operand as usize) * 4 + v.opcode as usize;
            (rank, i.abs_diff(anchor), i)
        })
        .unwrap_or(anchor)
}

/// All variants for one anchor: nine strategies times eleven context
/// variations, deduplicated and capped.
fn generate_for_anchor(
    instructions: &[Instruction],
    anchor: usize,
    options: &GeneratorOptions,
) -> Vec<Signature> {
    let mut variants = Vec::new();
    let shifted_anchor = most_stable_near(instructions, anchor);

    for strategy in Strategy::ALL {
        for (before, after_spec) in CONTEXT_PAIRS {
            let after = match after_spec {
                AfterSpec::Count(n) => n,
                AfterSpec::ToNextRet => {
                    distance_to_ret(instructions, anchor, options.context_after)
                }
            };
            let window = build_window(instructions, anchor, before, after, options);
            variants.push(build_signature(instructions, window, strategy, options));
        }

        // Anchor-shifted variation on the caller's own context settings.
        let window = build_window(
            instructions,
            shifted_anchor,
            options.context_before,
            options.context_after,
            options,
        );
        variants.push(build_signature(instructions, window, strategy, options));
    }

    dedup_and_rank(variants, options)
}

/// Realize one variant over a window under a strategy.
fn build_signature(
    instructions: &[Instruction],
    window: Window,
    strategy: Strategy,
    options: &GeneratorOptions,
) -> Signature {
    let mut pattern_tokens: Vec<String> = Vec::new();
    let mut mask = String::new();
    let mut bytes_out: Vec<Option<u8>> = Vec::new();
    let mut wildcard_positions = Vec::new();
    let mut wildcard_reasons = Vec::new();
    let mut position = 0usize;

    // High-volatility operand bytes that must be wildcarded for a High
    // stability rating.
    let mut high_required = 0usize;
    let mut high_wildcarded = 0usize;

    'outer: for insn in &instructions[window.start..=window.end] {
        for (offset, &byte) in insn.bytes.iter().enumerate() {
            if position >= options.max_length {
                break 'outer;
            }
            let class = insn
                .candidates
                .iter()
                .find(|c| c.offset == offset)
                .map(|c| c.class);

            let volatile_operand = insn.volatility.operand == VolatilityLevel::High
                && matches!(
                    class,
                    Some(
                        ReasonCode::RelativeJump
                            | ReasonCode::RelativeCall
                            | ReasonCode::GlobalAddress
                    )
                );
            if volatile_operand {
                high_required += 1;
            }

            match class.filter(|c| strategy.realizes(*c, options.rules)) {
                Some(code) => {
                    pattern_tokens.push("??".to_string());
                    mask.push('?');
                    bytes_out.push(None);
                    wildcard_positions.push(position);
                    wildcard_reasons.push(WildcardReason {
                        position,
                        code,
                        detail: format!("{} {}", insn.address, insn.mnemonic),
                    });
                    if volatile_operand {
                        high_wildcarded += 1;
                    }
                }
                None => {
                    pattern_tokens.push(format!("{byte:02X}"));
                    mask.push('x');
                    bytes_out.push(Some(byte));
                }
            }
            position += 1;
        }
    }

    let length = bytes_out.len();
    let wildcard_count = wildcard_positions.len();
    let uniqueness_score = uniqueness(length, wildcard_count, max_wildcard_run(&mask));

    let (stability, warnings) = if window.truncated {
        (
            Stability::Low,
            vec!["stream shorter than min_length; emitted at maximum achievable length".to_string()],
        )
    } else {
        let ratio = if length == 0 {
            0.0
        } else {
            wildcard_count as f64 / length as f64
        };
        let stability = if ratio >= 0.25 && high_wildcarded == high_required {
            Stability::High
        } else if ratio < 0.08 {
            Stability::Low
        } else {
            Stability::Medium
        };
        (stability, Vec::new())
    };

    Signature {
        pattern: pattern_tokens.join(" "),
        mask,
        bytes: bytes_out,
        length,
        wildcard_count,
        wildcard_positions,
        uniqueness_score,
        stability,
        strategy: strategy.name().to_string(),
        wildcard_reasons,
        warnings,
    }
}

/// `concrete_ratio × length_bonus × consecutive_penalty`, clamped to [0, 1].
fn uniqueness(length: usize, wildcard_count: usize, max_run: usize) -> f64 {
    if length == 0 {
        return 0.0;
    }
    let concrete = (length - wildcard_count) as f64 / length as f64;
    let length_bonus = (0.8 + length as f64 / 100.0).min(1.2);
    let run_penalty = 0.9_f64.powf(max_run as f64 / 4.0);
    (concrete * length_bonus * run_penalty).clamp(0.0, 1.0)
}

/// Longest run of `?` in a mask.
fn max_wildcard_run(mask: &str) -> usize {
    let mut best = 0;
    let mut current = 0;
    for c in mask.chars() {
        if c == '?' {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

/// Hamming-like similarity between two masks: matching positions over the
/// longer length, so a missing tail counts as mismatch.
fn mask_similarity(a: &str, b: &str) -> f64 {
    let longer = a.len().max(b.len());
    if longer == 0 {
        return 1.0;
    }
    let matching = a.bytes().zip(b.bytes()).filter(|(x, y)| x == y).count();
    matching as f64 / longer as f64
}

/// Rank variants and drop near-duplicates.
///
/// Order: uniqueness descending, stability, length descending, then stable
/// textual tie-breaks for determinism. A candidate is dropped when it is
/// more than 75% mask-similar to a retained variant and within 0.10
/// uniqueness of it.
fn dedup_and_rank(mut variants: Vec<Signature>, options: &GeneratorOptions) -> Vec<Signature> {
    variants.sort_by(|a, b| {
        b.uniqueness_score
            .total_cmp(&a.uniqueness_score)
            .then_with(|| b.stability.rank().cmp(&a.stability.rank()))
            .then_with(|| b.length.cmp(&a.length))
            .then_with(|| a.strategy.cmp(&b.strategy))
            .then_with(|| a.mask.cmp(&b.mask))
    });

    let mut retained: Vec<Signature> = Vec::new();
    for candidate in variants {
        if retained.len() >= options.variants {
            break;
        }
        let dominated = retained.iter().any(|kept| {
            mask_similarity(&kept.mask, &candidate.mask) > SIMILARITY_THRESHOLD
                && (kept.uniqueness_score - candidate.uniqueness_score).abs() < UNIQUENESS_ESCAPE
        });
        if !dominated {
            retained.push(candidate);
        }
    }
    retained
}
