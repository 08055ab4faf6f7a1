//! Smart anchor selection.
//!
//! Scores every instruction as a potential signature anchor, detects
//! contiguous stable regions, and drives the generator against the best
//! candidates.

pub mod scorer;

pub use scorer::InstructionScore;

use crate::analysis;
use crate::error::Result;
use crate::generator;
use crate::types::{
    GenerationResult, GeneratorOptions, Instruction, SmartAnalysisResult, SmartTarget,
    StableRegion, TargetSelection,
};

/// Stability sub-score at or above which an instruction counts as stable.
const STABLE_THRESHOLD: f64 = 60.0;

/// Minimum run length for a stable region.
const REGION_MIN_RUN: usize = 4;

/// Score the stream and return the top `max_targets` anchor candidates,
/// stable regions, and aggregate metrics.
pub fn analyze(instructions: &[Instruction], max_targets: usize) -> SmartAnalysisResult {
    let analyzed = analysis::analyze_all(instructions.to_vec());
    let scores = scorer::score_all(&analyzed);

    let mut ranked: Vec<(usize, &InstructionScore)> = scores.iter().enumerate().collect();
    ranked.sort_by(|(ia, a), (ib, b)| b.total.total_cmp(&a.total).then_with(|| ia.cmp(ib)));

    let targets: Vec<SmartTarget> = ranked
        .iter()
        .take(max_targets)
        .map(|(index, score)| SmartTarget {
            index: *index,
            address: analyzed[*index].address.clone(),
            mnemonic: analyzed[*index].mnemonic.clone(),
            label: analyzed[*index].label.clone(),
            score: score.total,
            stability_score: score.stability,
            uniqueness_score: score.uniqueness,
            context_score: score.context,
        })
        .collect();

    let regions = stable_regions(&analyzed, &scores);

    let strong_anchors = scores.iter().filter(|s| s.total >= STABLE_THRESHOLD).count();
    let average_stability = if scores.is_empty() {
        0.0
    } else {
        scores.iter().map(|s| s.stability).sum::<f64>() / scores.len() as f64
    };
    let summary = format!(
        "Analyzed {} instructions; found {} strong anchors; average stability {:.0}%.",
        analyzed.len(),
        strong_anchors,
        average_stability
    );

    SmartAnalysisResult {
        targets,
        regions,
        instruction_count: analyzed.len(),
        average_stability,
        summary,
    }
}

/// `analyze` followed by `generate` against the top `top_n` anchors.
pub fn smart_generate(
    instructions: &[Instruction],
    options: &GeneratorOptions,
    top_n: usize,
) -> Result<GenerationResult> {
    options.validate()?;
    let result = analyze(instructions, top_n);
    let ids: Vec<String> = result.targets.iter().map(SmartTarget::target_id).collect();
    generator::generate(instructions, &TargetSelection::Explicit(ids), options)
}

/// Maximal runs of at least [`REGION_MIN_RUN`] instructions whose
/// stability sub-score clears [`STABLE_THRESHOLD`].
fn stable_regions(
    instructions: &[Instruction],
    scores: &[InstructionScore],
) -> Vec<StableRegion> {
    let mut regions = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, score) in scores.iter().enumerate() {
        if score.stability >= STABLE_THRESHOLD {
            run_start.get_or_insert(i);
            continue;
        }
        if let Some(start) = run_start.take() {
            push_region(instructions, start, i - 1, &mut regions);
        }
    }
    if let Some(start) = run_start {
        push_region(instructions, start, scores.len() - 1, &mut regions);
    }

    regions
}

fn push_region(
    instructions: &[Instruction],
    start: usize,
    end: usize,
    regions: &mut Vec<StableRegion>,
) {
    let count = end - start + 1;
    if count < REGION_MIN_RUN {
        return;
    }
    regions.push(StableRegion {
        start_index: start,
        end_index: end,
        start_address: instructions[start].address.clone(),
        end_address: instructions[end].address.clone(),
        instruction_count: count,
        byte_count: instructions[start..=end].iter().map(|i| i.size).sum(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats;
    use crate::types::InstructionType;

    /// Twenty instructions, five of them returns, one clean two-byte
    /// opcode with no relative operands.
    const LISTING: &str = "\
00401000 | 55 | push ebp
00401001 | 8BEC | mov ebp,esp
00401003 | 8B45 08 | mov eax,dword ptr ss:[ebp+8]
00401006 | 85C0 | test eax,eax
00401008 | C3 | ret
00401009 | 8B4D 0C | mov ecx,dword ptr ss:[ebp+C]
0040100C | 33D2 | xor edx,edx
0040100E | 0FB6 D9 | movzx ebx,cl
00401011 | 03C3 | add eax,ebx
00401013 | C3 | ret
00401014 | 8BF0 | mov esi,eax
00401016 | 8BF9 | mov edi,ecx
00401018 | 2BC2 | sub eax,edx
0040101A | C3 | ret
0040101B | 8B5D 10 | mov ebx,dword ptr ss:[ebp+10]
0040101E | 85DB | test ebx,ebx
00401020 | C3 | ret
00401021 | 8BC6 | mov eax,esi
00401023 | 3BC7 | cmp eax,edi
00401025 | C3 | ret";

    fn parsed() -> Vec<crate::types::Instruction> {
        formats::parse(LISTING, None).unwrap().instructions
    }

    #[test]
    fn test_targets_sorted_and_weighted() {
        let result = analyze(&parsed(), 20);
        assert_eq!(result.instruction_count, 20);
        for pair in result.targets.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for target in &result.targets {
            let expected = scorer::STABILITY_WEIGHT * target.stability_score
                + scorer::UNIQUENESS_WEIGHT * target.uniqueness_score
                + scorer::CONTEXT_WEIGHT * target.context_score;
            assert!((target.score - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_returns_never_anchor() {
        let instructions = parsed();
        let result = analyze(&instructions, 5);
        assert_eq!(result.targets.len(), 5);
        for target in &result.targets {
            assert_ne!(instructions[target.index].kind, InstructionType::Return);
        }
    }

    #[test]
    fn test_best_anchor_is_the_two_byte_opcode() {
        let result = analyze(&parsed(), 5);
        let best = &result.targets[0];
        assert_eq!(best.mnemonic, "movzx");
        assert_eq!(best.address, "0040100E");
    }

    #[test]
    fn test_summary_shape() {
        let result = analyze(&parsed(), 5);
        assert!(result.summary.starts_with("Analyzed 20 instructions;"));
        assert!(result.summary.contains("strong anchors"));
        assert!(result.average_stability > 0.0);
    }

    #[test]
    fn test_stable_region_detection() {
        // A clean run with no returns inside it.
        let text = "\
00401000 | 8B45 08 | mov eax,dword ptr ss:[ebp+8]
00401003 | 33D2 | xor edx,edx
00401005 | 03C2 | add eax,edx
00401007 | 8BC8 | mov ecx,eax
00401009 | 2BCA | sub ecx,edx
0040100B | C3 | ret";
        let instructions = formats::parse(text, None).unwrap().instructions;
        let result = analyze(&instructions, 3);
        assert_eq!(result.regions.len(), 1);
        let region = &result.regions[0];
        assert_eq!(region.start_index, 0);
        assert!(region.instruction_count >= 4);
        assert_eq!(region.start_address, "00401000");
        assert_eq!(
            region.byte_count,
            instructions[region.start_index..=region.end_index]
                .iter()
                .map(|i| i.size)
                .sum::<usize>()
        );
    }

    #[test]
    fn test_smart_generate_produces_signatures() {
        let result = smart_generate(&parsed(), &GeneratorOptions::new(), 3).unwrap();
        assert!(result.complete);
        assert_eq!(result.signatures.len(), 3);
        for variants in result.signatures.values() {
            assert!(!variants.is_empty());
        }
    }
}
