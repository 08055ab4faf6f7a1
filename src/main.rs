//! sigforge CLI
//!
//! Command-line tool for turning disassembly listings into wildcarded
//! byte signatures.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use sigforge::{
    export, generate, generate_targeted, parse_with_base, smart_analyze, smart_generate,
    DumpFormat, ExportFormat, GenerationResult, GeneratorOptions, TargetSelection, WildcardRules,
};
use std::path::PathBuf;
use std::process::ExitCode;

/// Byte-signature generator for 32-bit x86 disassembly listings.
///
/// Reads x64dbg, Cheat Engine, or raw hex dumps and emits ranked
/// wildcarded patterns that survive rebuilds.
#[derive(Parser, Debug)]
#[command(name = "sigforge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input listing file(s); use `-` for stdin
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Listing format
    #[arg(short, long, default_value = "auto")]
    format: FormatArg,

    /// Output format
    #[arg(short, long, default_value = "human")]
    output: OutputFormat,

    /// Target identifiers (labels, jump@ADDR, call@ADDR, indices) or one
    /// of: all, all_labeled, all_jumps, all_calls
    #[arg(short, long)]
    targets: Vec<String>,

    /// Pick anchors automatically instead of using --targets
    #[arg(short, long)]
    smart: bool,

    /// Anchors to generate against with --smart
    #[arg(long, default_value = "5")]
    top: usize,

    /// Minimum signature length in bytes
    #[arg(long, default_value = "20")]
    min_length: usize,

    /// Maximum signature length in bytes
    #[arg(long, default_value = "50")]
    max_length: usize,

    /// Variants to keep per target
    #[arg(long, default_value = "10")]
    variants: usize,

    /// Context instructions before the anchor
    #[arg(long, default_value = "0")]
    context_before: usize,

    /// Context instructions after the anchor
    #[arg(long, default_value = "10")]
    context_after: usize,

    /// Also wildcard trailing immediates
    #[arg(long)]
    wildcard_immediates: bool,

    /// Also wildcard non-stack struct offsets
    #[arg(long)]
    wildcard_struct_offsets: bool,

    /// Wildcard every memory displacement
    #[arg(long)]
    wildcard_memory: bool,

    /// Base address (hex) for raw hex streams
    #[arg(long, default_value = "0")]
    base: String,

    /// Export the best variant per target in this format
    /// (aob, mask, ida, cheatengine, cpp, x64dbg, json)
    #[arg(short, long)]
    export: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (patterns only)
    #[arg(short, long)]
    quiet: bool,
}

/// Listing format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Auto-detect from the input
    Auto,
    /// x64dbg copy-paste
    X64dbg,
    /// Cheat Engine
    Cheatengine,
    /// Raw hex stream
    Hex,
}

impl FormatArg {
    fn hint(self) -> Option<DumpFormat> {
        match self {
            FormatArg::Auto => None,
            FormatArg::X64dbg => Some(DumpFormat::X64dbg),
            FormatArg::Cheatengine => Some(DumpFormat::CheatEngine),
            FormatArg::Hex => Some(DumpFormat::RawHex),
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
    /// Compact one-line-per-target output
    Short,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("sigforge=debug")
            .init();
    }

    let mut success = true;
    for path in &args.files {
        if let Err(e) = run_file(path, &args) {
            if !args.quiet {
                eprintln!("Error processing {}: {:#}", path.display(), e);
            }
            success = false;
        }
    }

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run_file(path: &PathBuf, args: &Args) -> anyhow::Result<()> {
    let text = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("reading stdin")?
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };

    let base = u32::from_str_radix(args.base.trim_start_matches("0x"), 16)
        .with_context(|| format!("invalid base address {:?}", args.base))?;

    let parsed = parse_with_base(&text, args.format.hint(), base)?;
    tracing::debug!(
        format = %parsed.format,
        parsed = parsed.stats.parsed,
        dropped = parsed.stats.dropped,
        "parsed listing"
    );

    let options = build_options(args);

    let result = if args.smart {
        if !args.quiet {
            let analysis = smart_analyze(&parsed.instructions, args.top);
            println!("{}", analysis.summary);
        }
        smart_generate(&parsed.instructions, &options, args.top)?
    } else if args.targets.is_empty() {
        generate_targeted(&parsed.instructions, &options)?
    } else if args.targets.len() == 1 {
        generate(
            &parsed.instructions,
            &TargetSelection::from_token(&args.targets[0]),
            &options,
        )?
    } else {
        generate(
            &parsed.instructions,
            &TargetSelection::explicit(args.targets.clone()),
            &options,
        )?
    };

    match args.output {
        OutputFormat::Human => print_human(&result, args)?,
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Short => print_short(&result),
    }

    Ok(())
}

fn build_options(args: &Args) -> GeneratorOptions {
    let mut rules = WildcardRules::default();
    if args.wildcard_immediates {
        rules |= WildcardRules::IMMEDIATES;
    }
    if args.wildcard_struct_offsets {
        rules |= WildcardRules::STRUCT_OFFSETS;
    }
    if args.wildcard_memory {
        rules |= WildcardRules::MEMORY_DISPLACEMENTS;
    }

    let mut options = GeneratorOptions::new();
    options.min_length = args.min_length;
    options.max_length = args.max_length;
    options.variants = args.variants;
    options.context_before = args.context_before;
    options.context_after = args.context_after;
    options.rules = rules;
    options
}

fn print_human(result: &GenerationResult, args: &Args) -> anyhow::Result<()> {
    let export_format = args
        .export
        .as_deref()
        .map(str::parse::<ExportFormat>)
        .transpose()?;

    for (target, variants) in &result.signatures {
        if args.quiet {
            if let Some(best) = variants.first() {
                println!("{}", best.pattern);
            }
            continue;
        }

        println!("Target: {target}");
        for (i, sig) in variants.iter().enumerate() {
            println!(
                "  {}. {} [{}] score {:.3}, {} stability, {} wildcards",
                i + 1,
                sig.pattern,
                sig.strategy,
                sig.uniqueness_score,
                sig.stability,
                sig.wildcard_count
            );
            for warning in &sig.warnings {
                println!("     warning: {warning}");
            }
        }
        if let (Some(format), Some(best)) = (export_format, variants.first()) {
            println!("  export ({format}):");
            for line in export(best, format)?.lines() {
                println!("    {line}");
            }
        }
        println!();
    }

    if !result.unresolved.is_empty() {
        eprintln!("Unresolved targets: {}", result.unresolved.join(", "));
    }

    Ok(())
}

fn print_short(result: &GenerationResult) {
    for (target, variants) in &result.signatures {
        if let Some(best) = variants.first() {
            println!(
                "{}\t{}\t{:.3}\t{}",
                target, best.pattern, best.uniqueness_score, best.stability
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::try_parse_from(["sigforge", "listing.txt"]).unwrap();
        assert_eq!(args.files.len(), 1);
        assert!(!args.smart);
        assert!(args.targets.is_empty());
    }

    #[test]
    fn test_format_options() {
        let args =
            Args::try_parse_from(["sigforge", "-f", "cheatengine", "-o", "json", "dump.txt"])
                .unwrap();
        assert!(matches!(args.format, FormatArg::Cheatengine));
        assert!(matches!(args.output, OutputFormat::Json));
    }

    #[test]
    fn test_rule_flags() {
        let args = Args::try_parse_from([
            "sigforge",
            "--wildcard-immediates",
            "--wildcard-memory",
            "dump.txt",
        ])
        .unwrap();
        let options = build_options(&args);
        assert!(options.rules.contains(WildcardRules::IMMEDIATES));
        assert!(options.rules.contains(WildcardRules::MEMORY_DISPLACEMENTS));
        assert!(!options.rules.contains(WildcardRules::STRUCT_OFFSETS));
    }

    #[test]
    fn test_multiple_targets() {
        let args = Args::try_parse_from([
            "sigforge",
            "-t",
            "Lawnmower_A",
            "-t",
            "jump@00B27AB0",
            "dump.txt",
        ])
        .unwrap();
        assert_eq!(args.targets.len(), 2);
    }
}
