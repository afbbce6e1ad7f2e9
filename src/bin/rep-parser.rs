//! RTS replay (.rep) parser CLI
//!
//! A command-line interface for decoding, validating, and analyzing replay files.
//!
//! ## Commands
//!
//! - `info` - Display quick replay metadata
//! - `parse` - Decode a replay with output format options
//! - `validate` - Validate a replay (exit codes for scripting)
//! - `offsets` - Show command offset candidates and their scores
//! - `batch` - Process multiple replays from a directory

use clap::{Parser, Subcommand, ValueEnum};
use rep_parser::commands::{Command, OffsetCandidate};
use rep_parser::metrics::{BuildOrder, PlayerMetrics, QualityFlags};
use rep_parser::{DecoderConfig, ReplayAnalysis, ReplayDecoder};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// RTS replay (.rep) parser
#[derive(Parser)]
#[command(name = "rep-parser")]
#[command(about = "RTS replay (.rep) parser", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON decoder configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Read the payload as uncompressed when decompression fails
    #[arg(long, global = true)]
    allow_raw_fallback: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display replay information
    Info {
        /// Path to the replay file
        file: PathBuf,
    },
    /// Decode a replay file
    Parse {
        /// Path to the replay file
        file: PathBuf,
        /// Output format: json, pretty
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
        /// Include all commands in output
        #[arg(long)]
        commands: bool,
        /// Include build orders
        #[arg(long)]
        build_orders: bool,
        /// Include quality flags
        #[arg(long)]
        quality: bool,
    },
    /// Validate a replay file
    Validate {
        /// Path to the replay file
        file: PathBuf,
        /// Verbose reporting
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show command offset candidates
    Offsets {
        /// Path to the replay file
        file: PathBuf,
        /// Show every candidate, not only the known offsets and accepted ones
        #[arg(long)]
        all: bool,
    },
    /// Decode multiple replay files
    Batch {
        /// Directory containing replay files
        directory: PathBuf,
        /// Output directory for JSON files
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Generate summary report
        #[arg(long)]
        summary: bool,
        /// Continue on errors
        #[arg(long)]
        continue_on_error: bool,
    },
}

/// Output format options
#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

// ============================================================================
// Serializable Output Structures
// ============================================================================

#[derive(Serialize)]
struct ParseOutput {
    header: HeaderInfo,
    players: Vec<PlayerMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build_orders: Option<Vec<BuildOrder>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<QualityFlags>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commands: Option<Vec<Command>>,
}

#[derive(Serialize)]
struct HeaderInfo {
    format: String,
    file_size: usize,
    engine_version: u32,
    map_name: String,
    game_type: String,
    frame_count: u32,
    frame_count_estimated: bool,
    duration: String,
    matchup: String,
    confidence: f32,
}

#[derive(Serialize)]
struct BatchSummary {
    total_files: usize,
    successful: usize,
    failed: usize,
    total_commands: usize,
    format_distribution: HashMap<String, usize>,
    assessment_distribution: HashMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    average_duration_seconds: Option<u64>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let decoder = match build_decoder(cli.config.as_deref(), cli.allow_raw_fallback) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Info { file } => cmd_info(&decoder, &file),
        Commands::Parse {
            file,
            output,
            commands,
            build_orders,
            quality,
        } => cmd_parse(&decoder, &file, &output, commands, build_orders, quality),
        Commands::Validate { file, verbose } => cmd_validate(&decoder, &file, verbose),
        Commands::Offsets { file, all } => cmd_offsets(&decoder, &file, all),
        Commands::Batch {
            directory,
            output,
            summary,
            continue_on_error,
        } => cmd_batch(&decoder, &directory, output.as_deref(), summary, continue_on_error),
    }
}

fn build_decoder(
    config_file: Option<&Path>,
    allow_raw_fallback: bool,
) -> Result<ReplayDecoder, String> {
    let mut config = match config_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("{}: {e}", path.display()))?;
            serde_json::from_str::<DecoderConfig>(&text)
                .map_err(|e| format!("{}: {e}", path.display()))?
        }
        None => DecoderConfig::default(),
    };
    config.allow_raw_fallback |= allow_raw_fallback;
    Ok(ReplayDecoder::new(config))
}

fn decode_file(decoder: &ReplayDecoder, file: &Path) -> Result<(ReplayAnalysis, usize), String> {
    let data = std::fs::read(file).map_err(|e| format!("Error reading file: {e}"))?;
    let analysis = decoder.decode(&data).map_err(|e| e.to_string())?;
    Ok((analysis, data.len()))
}

// ============================================================================
// Info Command Implementation
// ============================================================================

fn cmd_info(decoder: &ReplayDecoder, file: &Path) -> ExitCode {
    let (analysis, file_size) = match decode_file(decoder, file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    print_info(&analysis, file_size);

    ExitCode::SUCCESS
}

#[allow(clippy::cast_precision_loss)]
fn print_info(analysis: &ReplayAnalysis, file_size: usize) {
    let header = &analysis.header;

    println!("=== Replay Information ===\n");

    println!("File:");
    println!(
        "  Size: {} bytes ({:.2} KB)",
        file_size,
        file_size as f64 / 1024.0
    );
    println!("  Format: {:?}", analysis.format);
    println!("  Engine Version: {}", header.engine_version);

    println!();

    println!("Game:");
    println!("  Map: {}", header.map_name);
    println!("  Type: {}", header.game_type);
    println!("  Duration: {}", header.duration_string(analysis.fps()));
    if header.frame_count_estimated {
        println!("  Frames: {} (estimated)", header.frame_count);
    } else {
        println!("  Frames: {}", header.frame_count);
    }

    println!();

    println!("Players:");
    for player in &header.players {
        println!(
            "  [{}] {} ({}, team {})",
            player.player_id, player.name, player.race, player.team
        );
    }
}

// ============================================================================
// Parse Command Implementation
// ============================================================================

fn cmd_parse(
    decoder: &ReplayDecoder,
    file: &Path,
    output: &OutputFormat,
    include_commands: bool,
    include_build_orders: bool,
    include_quality: bool,
) -> ExitCode {
    let (analysis, file_size) = match decode_file(decoder, file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let output_data = build_output(
        analysis,
        file_size,
        include_commands,
        include_build_orders,
        include_quality,
    );

    match output {
        OutputFormat::Json => print_json(&output_data),
        OutputFormat::Pretty => print_pretty(&output_data),
    }

    ExitCode::SUCCESS
}

fn build_output(
    analysis: ReplayAnalysis,
    file_size: usize,
    include_commands: bool,
    include_build_orders: bool,
    include_quality: bool,
) -> ParseOutput {
    let header = build_header_info(&analysis, file_size);

    ParseOutput {
        header,
        players: analysis.metrics,
        build_orders: include_build_orders.then_some(analysis.build_orders),
        quality: include_quality.then_some(analysis.quality),
        commands: include_commands.then_some(analysis.commands),
    }
}

fn build_header_info(analysis: &ReplayAnalysis, file_size: usize) -> HeaderInfo {
    let header = &analysis.header;
    HeaderInfo {
        format: format!("{:?}", analysis.format),
        file_size,
        engine_version: header.engine_version,
        map_name: header.map_name.clone(),
        game_type: header.game_type.to_string(),
        frame_count: header.frame_count,
        frame_count_estimated: header.frame_count_estimated,
        duration: header.duration_string(analysis.fps()),
        matchup: matchup(analysis),
        confidence: analysis.quality.confidence,
    }
}

/// Builds a matchup string such as "TvZ" from team assignments.
fn matchup(analysis: &ReplayAnalysis) -> String {
    let mut teams: Vec<(u8, String)> = Vec::new();
    for player in &analysis.header.players {
        let letter = player.race.name().chars().next().unwrap_or('?');
        match teams.iter_mut().find(|(team, _)| *team == player.team) {
            Some((_, races)) => races.push(letter),
            None => teams.push((player.team, letter.to_string())),
        }
    }
    teams
        .into_iter()
        .map(|(_, races)| races)
        .collect::<Vec<_>>()
        .join("v")
}

fn print_json(output: &ParseOutput) {
    match serde_json::to_string_pretty(output) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error serializing to JSON: {e}"),
    }
}

fn print_pretty(output: &ParseOutput) {
    let header = &output.header;
    println!("=== Header ===");
    println!("Format: {}", header.format);
    println!("File Size: {} bytes", header.file_size);
    println!("Map: {}", header.map_name);
    println!("Type: {}", header.game_type);
    println!("Duration: {}", header.duration);
    println!("Matchup: {}", header.matchup);
    println!("Confidence: {:.2}", header.confidence);
    println!();

    println!("=== Players ({}) ===", output.players.len());
    for player in &output.players {
        println!(
            "  [{}] {}: APM {:.1}, EAPM {:.1} ({} actions)",
            player.player_id, player.name, player.apm, player.eapm, player.total_actions
        );
    }
    println!();

    if let Some(build_orders) = &output.build_orders {
        println!("=== Build Orders ===");
        for order in build_orders {
            let name = output
                .players
                .iter()
                .find(|p| p.player_id == order.player_id)
                .map_or("Unknown", |p| p.name.as_str());
            println!("\nPlayer {} ({name}):", order.player_id);
            for entry in &order.entries {
                println!(
                    "  {} {:>3}  {:<8} {}",
                    entry.timestamp, entry.supply_estimate, entry.category, entry.unit_name
                );
            }
        }
        println!();
    }

    if let Some(quality) = &output.quality {
        println!("=== Quality ===");
        println!("Format confidence: {:.2}", quality.format_confidence);
        println!("Raw fallback: {}", quality.used_raw_fallback);
        println!(
            "Command offset: {} ({})",
            quality.offset.offset,
            if quality.offset.recovered {
                "recovered"
            } else {
                "fallback"
            }
        );
        println!(
            "Command count: {} observed, {:.0} expected ({:?})",
            quality.command_count.observed,
            quality.command_count.expected,
            quality.command_count.assessment
        );
        for warning in &quality.warnings {
            println!("  - {warning}");
        }
        println!("Overall confidence: {:.2}", quality.confidence);
        println!();
    }

    if let Some(commands) = &output.commands {
        println!("=== Commands ({}) ===", commands.len());
        // Only show first 50 commands in pretty mode to avoid spam
        let display_count = std::cmp::min(commands.len(), 50);
        for command in &commands[..display_count] {
            println!(
                "  [frame {}] Player {}: {}",
                command.frame, command.player_id, command.opcode
            );
        }
        if commands.len() > 50 {
            println!("  ... and {} more commands", commands.len() - 50);
        }
    }
}

// ============================================================================
// Validate Command Implementation
// ============================================================================

fn cmd_validate(decoder: &ReplayDecoder, file: &Path, verbose: bool) -> ExitCode {
    let result = decode_file(decoder, file);

    if verbose {
        print_validation_details(&result, file);
    } else {
        print_validation_summary(&result, file);
    }

    match result {
        Ok((analysis, _)) if analysis.quality.is_clean() => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

fn validation_status(result: &Result<(ReplayAnalysis, usize), String>) -> &'static str {
    match result {
        Ok((analysis, _)) if analysis.quality.is_clean() => "VALID",
        Ok(_) => "DEGRADED",
        Err(_) => "INVALID",
    }
}

fn print_validation_summary(result: &Result<(ReplayAnalysis, usize), String>, file: &Path) {
    println!("{}: {}", file.display(), validation_status(result));
}

fn print_validation_details(result: &Result<(ReplayAnalysis, usize), String>, file: &Path) {
    println!("Validating: {}\n", file.display());

    match result {
        Ok((analysis, _)) => {
            let quality = &analysis.quality;
            println!("Checks:");
            println!("  Decompression:     {}", status_icon(!quality.used_raw_fallback));
            println!(
                "  Header decoding:   {}",
                status_icon(!analysis.header.frame_count_estimated)
            );
            println!("  Command offset:    {}", status_icon(quality.offset.recovered));
            println!("  Command stream:    {}", status_icon(!analysis.commands.is_empty()));
            println!(
                "  Command count:     {:?}",
                quality.command_count.assessment
            );

            if !quality.warnings.is_empty() {
                println!("\nWarnings:");
                for warning in &quality.warnings {
                    println!("  - {warning}");
                }
            }
            println!("\nConfidence: {:.2}", quality.confidence);
        }
        Err(e) => {
            println!("Errors:");
            println!("  - {e}");
        }
    }

    println!("\nResult: {}", validation_status(result));
}

fn status_icon(valid: bool) -> &'static str {
    if valid {
        "[OK]"
    } else {
        "[FAIL]"
    }
}

// ============================================================================
// Offsets Command Implementation
// ============================================================================

fn cmd_offsets(decoder: &ReplayDecoder, file: &Path, all: bool) -> ExitCode {
    let data = match std::fs::read(file) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading file: {e}");
            return ExitCode::FAILURE;
        }
    };

    let candidates = match decoder.offset_candidates(&data) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let chosen = candidates.iter().find(|c| c.accepted).map(|c| c.offset);
    let shown: Vec<&OffsetCandidate> = candidates
        .iter()
        .filter(|c| all || c.known || c.accepted)
        .collect();

    println!("=== Offset Candidates ({} evaluated) ===", candidates.len());
    println!("  {:>8}  {:>7}  {:>7}  {:<8}  source", "offset", "opcodes", "markers", "status");
    for candidate in shown {
        let status = match (candidate.accepted, chosen == Some(candidate.offset)) {
            (true, true) => "chosen",
            (true, false) => "accepted",
            (false, _) => "rejected",
        };
        println!(
            "  {:>8}  {:>7}  {:>7}  {:<8}  {}",
            format!("0x{:X}", candidate.offset),
            candidate.opcode_matches,
            candidate.frame_markers,
            status,
            if candidate.known { "known" } else { "scan" }
        );
    }

    if chosen.is_none() {
        println!("\nNo candidate accepted; the first known offset would be used.");
    }

    ExitCode::SUCCESS
}

// ============================================================================
// Batch Command Implementation
// ============================================================================

fn cmd_batch(
    decoder: &ReplayDecoder,
    directory: &Path,
    output_dir: Option<&Path>,
    summary: bool,
    continue_on_error: bool,
) -> ExitCode {
    let replays = find_replays(directory);

    if replays.is_empty() {
        eprintln!("No .rep files found in {}", directory.display());
        return ExitCode::FAILURE;
    }

    eprintln!("Found {} replay files", replays.len());

    if let Some(dir) = output_dir {
        if !dir.exists() {
            if let Err(e) = std::fs::create_dir_all(dir) {
                eprintln!("Failed to create output directory: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    let mut error_count = 0;
    let mut results: Vec<ReplayAnalysis> = Vec::new();

    for replay in &replays {
        eprint!(
            "Processing {}... ",
            replay.file_name().unwrap_or_default().to_string_lossy()
        );

        match process_replay(decoder, replay, output_dir) {
            Ok(analysis) => {
                eprintln!("OK");
                results.push(analysis);
            }
            Err(e) => {
                eprintln!("ERROR: {e}");
                error_count += 1;
                if !continue_on_error {
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    eprintln!(
        "\nProcessed: {} success, {} errors",
        results.len(),
        error_count
    );

    if summary {
        generate_summary(&results, error_count, output_dir);
    }

    ExitCode::SUCCESS
}

fn find_replays(directory: &Path) -> Vec<PathBuf> {
    let mut replays = Vec::new();

    if let Ok(entries) = std::fs::read_dir(directory) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("rep"))
            {
                replays.push(path);
            }
        }
    }

    replays.sort();
    replays
}

fn process_replay(
    decoder: &ReplayDecoder,
    replay: &Path,
    output_dir: Option<&Path>,
) -> Result<ReplayAnalysis, String> {
    let (analysis, _) = decode_file(decoder, replay)?;

    if let Some(dir) = output_dir {
        let output_file = dir
            .join(replay.file_stem().unwrap_or_default())
            .with_extension("json");
        let content = serde_json::to_string_pretty(&analysis).map_err(|e| e.to_string())?;
        std::fs::write(&output_file, content).map_err(|e| e.to_string())?;
    }

    Ok(analysis)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_summary(results: &[ReplayAnalysis], failed: usize, output_dir: Option<&Path>) {
    let mut format_counts: HashMap<String, usize> = HashMap::new();
    let mut assessment_counts: HashMap<String, usize> = HashMap::new();
    for analysis in results {
        *format_counts
            .entry(format!("{:?}", analysis.format))
            .or_insert(0) += 1;
        *assessment_counts
            .entry(format!("{:?}", analysis.quality.command_count.assessment))
            .or_insert(0) += 1;
    }

    let durations: Vec<u64> = results
        .iter()
        .map(|a| a.header.duration_seconds(a.fps()) as u64)
        .collect();
    let average_duration_seconds = if durations.is_empty() {
        None
    } else {
        Some(durations.iter().sum::<u64>() / durations.len() as u64)
    };

    let summary = BatchSummary {
        total_files: results.len() + failed,
        successful: results.len(),
        failed,
        total_commands: results.iter().map(|a| a.commands.len()).sum(),
        format_distribution: format_counts,
        assessment_distribution: assessment_counts,
        average_duration_seconds,
    };

    println!("\n=== Batch Summary ===");
    println!("Files processed: {}", summary.total_files);
    println!("Successful: {}", summary.successful);
    println!("Failed: {}", summary.failed);
    println!("Total commands: {}", summary.total_commands);

    println!("\nFormat distribution:");
    for (format, count) in &summary.format_distribution {
        println!("  {format}: {count}");
    }

    println!("\nCommand count assessment:");
    for (assessment, count) in &summary.assessment_distribution {
        println!("  {assessment}: {count}");
    }

    if let Some(avg) = summary.average_duration_seconds {
        println!("\nAverage duration: {:02}:{:02}", avg / 60, avg % 60);
    }

    if let Some(dir) = output_dir {
        match write_summary(&summary, dir) {
            Ok(path) => println!("\nSummary written to: {}", path.display()),
            Err(e) => eprintln!("{e}"),
        }
    }
}

fn write_summary(summary: &BatchSummary, dir: &Path) -> Result<PathBuf, String> {
    let summary_file = dir.join("summary.json");
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| format!("Error serializing summary to JSON: {e}"))?;
    std::fs::write(&summary_file, json)
        .map_err(|e| format!("Error writing {}: {e}", summary_file.display()))?;
    Ok(summary_file)
}
