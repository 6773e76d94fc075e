use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use treediff_common::{
    config_to_toml, ensure_config, load_config, CompareRequest, Comparison, ComparisonSummary,
    ComparisonWarning, DecodePolicy, DiffRecord, PairStatus,
};
use treediff_core::{ComparisonEngine, FileOperations};

#[derive(Parser)]
#[command(name = "treediff")]
#[command(author = "TreeDiff Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Compare two directory trees file by file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two directories
    Compare {
        /// Left directory path
        left: PathBuf,

        /// Right directory path
        right: PathBuf,

        /// File base name to skip (can be specified multiple times)
        #[arg(long = "ignore-file", value_name = "NAME")]
        ignore_files: Vec<String>,

        /// Directory base name to skip with everything below it
        #[arg(long = "ignore-dir", value_name = "NAME")]
        ignore_dirs: Vec<String>,

        /// Gitignore-style pattern (can be specified multiple times)
        #[arg(short, long = "ignore", value_name = "PATTERN")]
        ignore_patterns: Vec<String>,

        /// What to do with files that cannot be decoded as text
        #[arg(long, value_enum)]
        decode_policy: Option<DecodePolicyArg>,

        /// Follow symbolic links
        #[arg(short = 'L', long)]
        follow_symlinks: bool,

        /// Compare on a single thread
        #[arg(long)]
        sequential: bool,

        /// Context lines around each hunk
        #[arg(short = 'U', long, value_name = "LINES")]
        context: Option<usize>,

        /// Show only differences (hide identical files)
        #[arg(short = 'd', long)]
        diff_only: bool,

        /// Print the unified diff of modified files
        #[arg(short = 's', long)]
        show_diff: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Disable ANSI colors in output
        #[arg(long)]
        no_color: bool,
    },
    /// Copy SOURCE onto DEST, replacing it
    Overwrite {
        source: PathBuf,

        dest: PathBuf,

        /// Only report what would be copied
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Hash both files after copying
        #[arg(long)]
        verify: bool,
    },
    /// Show the configuration file location and effective settings
    Config {
        /// Write a default configuration file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DecodePolicyArg {
    SkipAsIdentical,
    FailRun,
    FailFile,
}

impl From<DecodePolicyArg> for DecodePolicy {
    fn from(arg: DecodePolicyArg) -> Self {
        match arg {
            DecodePolicyArg::SkipAsIdentical => DecodePolicy::SkipAsIdentical,
            DecodePolicyArg::FailRun => DecodePolicy::FailRun,
            DecodePolicyArg::FailFile => DecodePolicy::FailFile,
        }
    }
}

struct CompareArgs {
    left: PathBuf,
    right: PathBuf,
    ignore_files: Vec<String>,
    ignore_dirs: Vec<String>,
    ignore_patterns: Vec<String>,
    decode_policy: Option<DecodePolicyArg>,
    follow_symlinks: bool,
    sequential: bool,
    context: Option<usize>,
}

struct OutputArgs {
    diff_only: bool,
    show_diff: bool,
    json: bool,
    no_color: bool,
}

fn main() {
    // Initialize tracing to stderr (so JSON output can go cleanly to stdout)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compare {
            left,
            right,
            ignore_files,
            ignore_dirs,
            ignore_patterns,
            decode_policy,
            follow_symlinks,
            sequential,
            context,
            diff_only,
            show_diff,
            json,
            no_color,
        } => run_compare(
            CompareArgs {
                left,
                right,
                ignore_files,
                ignore_dirs,
                ignore_patterns,
                decode_policy,
                follow_symlinks,
                sequential,
                context,
            },
            OutputArgs {
                diff_only,
                show_diff,
                json,
                no_color,
            },
        )
        .context("Comparison failed"),
        Commands::Overwrite {
            source,
            dest,
            dry_run,
            verify,
        } => run_overwrite(&source, &dest, dry_run, verify).context("Overwrite failed"),
        Commands::Config { init } => run_config(init),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run_compare(args: CompareArgs, output: OutputArgs) -> anyhow::Result<()> {
    let mut config = load_config(false)?.config;

    config.ignore_files.extend(args.ignore_files);
    config.ignore_dirs.extend(args.ignore_dirs);
    config.ignore_patterns.extend(args.ignore_patterns);
    if let Some(policy) = args.decode_policy {
        config.decode_policy = policy.into();
    }
    if args.follow_symlinks {
        config.follow_symlinks = true;
    }
    if args.sequential {
        config.parallel = false;
    }
    if let Some(context) = args.context {
        config.context_lines = context;
    }

    let left = absolute(args.left);
    let right = absolute(args.right);

    info!("Comparing:");
    info!("  Left:  {}", left.display());
    info!("  Right: {}", right.display());

    let request = CompareRequest::new(&left, &right).with_ignore(config.ignore_rules());
    let engine = ComparisonEngine::new(config.engine_options());
    let comparison = engine.compare(&request)?;

    if output.json {
        let report = build_json_report(&left, &right, &comparison, output.diff_only);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let use_color = !output.no_color && std::io::stdout().is_terminal();
    print!(
        "{}",
        render_text(&comparison, output.diff_only, output.show_diff, use_color)
    );
    Ok(())
}

fn run_overwrite(source: &Path, dest: &Path, dry_run: bool, verify: bool) -> anyhow::Result<()> {
    let config = load_config(false)?.config;
    let ops = FileOperations::with_verification(dry_run, verify || config.verify_copies);
    let result = ops.overwrite(source, dest)?;

    if result.dry_run {
        println!(
            "Would overwrite {} with {}",
            result.destination.display(),
            result.source.display()
        );
    } else {
        println!(
            "Overwrote {} with {} ({} bytes{})",
            result.destination.display(),
            result.source.display(),
            result.bytes_copied,
            if result.verified { ", verified" } else { "" }
        );
    }
    Ok(())
}

fn run_config(init: bool) -> anyhow::Result<()> {
    let loaded = if init {
        ensure_config(false)?
    } else {
        load_config(false)?
    };

    let state = if loaded.exists { "" } else { " (not created)" };
    println!("# {}{}", loaded.path.display(), state);
    print!("{}", config_to_toml(&loaded.config)?);
    Ok(())
}

/// Roots are reported as absolute paths
fn absolute(path: PathBuf) -> PathBuf {
    path.canonicalize().unwrap_or(path)
}

fn render_text(
    comparison: &Comparison,
    diff_only: bool,
    show_diff: bool,
    use_color: bool,
) -> String {
    let mut out = String::new();

    out.push_str(&format!("\n{}\n", "=".repeat(80)));
    out.push_str("Comparison Results\n");
    out.push_str(&format!("{}\n", "=".repeat(80)));

    for record in &comparison.records {
        // Skip identical files if diff_only is set
        if diff_only && record.status == PairStatus::Identical {
            continue;
        }

        let (status_color, reset) = if use_color {
            (status_color(record.status), "\x1b[0m")
        } else {
            ("", "")
        };

        let detail = match record.status {
            PairStatus::Modified => format!(" ({} lines)", record.diff_line_count),
            _ => String::new(),
        };
        out.push_str(&format!(
            "{}  {}  {} {}{}\n",
            status_color,
            record.status.symbol(),
            reset,
            record.relative_path.display(),
            detail
        ));

        if show_diff {
            for line in &record.diff_lines {
                out.push_str(&format!("      {}\n", colorize_diff_line(line, use_color)));
            }
        }
    }

    if !comparison.warnings.is_empty() {
        out.push_str(&format!("\nWarnings ({}):\n", comparison.warnings.len()));
        for warning in &comparison.warnings {
            out.push_str(&format!("  {}\n", warning));
        }
    }

    let summary = comparison.summary();
    let mark = |status: PairStatus| {
        if use_color {
            format!("{}({})\x1b[0m", status_color(status), status.symbol())
        } else {
            format!("({})", status.symbol())
        }
    };

    out.push_str(&format!("\n{}\n", "=".repeat(80)));
    out.push_str("Summary:\n");
    out.push_str(&format!("  Total entries:   {}\n", summary.total));
    out.push_str(&format!(
        "  Identical:       {} {}\n",
        summary.identical,
        mark(PairStatus::Identical)
    ));
    out.push_str(&format!(
        "  Modified:        {} {}\n",
        summary.modified,
        mark(PairStatus::Modified)
    ));
    out.push_str(&format!(
        "  Left only:       {} {}\n",
        summary.only_in_left,
        mark(PairStatus::OnlyInLeft)
    ));
    out.push_str(&format!(
        "  Right only:      {} {}\n",
        summary.only_in_right,
        mark(PairStatus::OnlyInRight)
    ));
    out.push_str(&format!("{}\n", "=".repeat(80)));
    out
}

fn status_color(status: PairStatus) -> &'static str {
    match status {
        PairStatus::Identical => "\x1b[32m",   // Green
        PairStatus::Modified => "\x1b[31m",    // Red
        PairStatus::OnlyInLeft => "\x1b[33m",  // Yellow
        PairStatus::OnlyInRight => "\x1b[34m", // Blue
    }
}

fn colorize_diff_line(line: &str, use_color: bool) -> String {
    if !use_color || line.starts_with("---") || line.starts_with("+++") {
        return line.to_string();
    }
    let color = match line.chars().next() {
        Some('-') => "\x1b[31m",
        Some('+') => "\x1b[32m",
        Some('@') => "\x1b[36m",
        _ => return line.to_string(),
    };
    format!("{}{}\x1b[0m", color, line)
}

#[derive(Serialize)]
struct JsonReport<'a> {
    left: String,
    right: String,
    generated_at: String,
    summary: ComparisonSummary,
    records: Vec<&'a DiffRecord>,
    warnings: &'a [ComparisonWarning],
}

fn build_json_report<'a>(
    left: &Path,
    right: &Path,
    comparison: &'a Comparison,
    diff_only: bool,
) -> JsonReport<'a> {
    JsonReport {
        left: left.to_string_lossy().to_string(),
        right: right.to_string_lossy().to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        summary: comparison.summary(),
        records: comparison
            .records
            .iter()
            .filter(|r| !diff_only || r.status != PairStatus::Identical)
            .collect(),
        warnings: &comparison.warnings,
    }
}
