mod loader;
mod reports;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use auraroll_engine::{
    Catalog, CompletedRun, RollEngine, RunObserver, RunOutcome, Selection, SystemClock,
    drive_async,
};
use loader::FileLoader;
use reports::{
    ReportMeta, generate_console_report, generate_csv_report, generate_json_report,
    generate_markdown_report, group_digits,
};

/// Exit status for a run stopped with Ctrl-C.
const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Parser)]
#[command(name = "auraroll", version)]
#[command(about = "Aura Roller simulator - rolls the aura table and reports what came up")]
struct Args {
    /// Number of rolls to simulate
    #[arg(long, default_value_t = 1_000_000)]
    rolls: u64,

    /// Luck multiplier applied to luck-scaled items
    #[arg(long, default_value_t = 1.0)]
    luck: f64,

    /// Primary context (biome)
    #[arg(long, default_value = "NORMAL")]
    biome: String,

    /// Rune (secondary modifier)
    #[arg(long)]
    rune: Option<String>,

    /// Time-of-day context (DAY or NIGHT)
    #[arg(long)]
    time: Option<String>,

    /// Enabled events (comma-separated)
    #[arg(long, default_value = "")]
    events: String,

    /// Active presets (comma-separated)
    #[arg(long, default_value = "")]
    presets: String,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Item names to hide from the result table (comma-separated)
    #[arg(long, default_value = "")]
    skip: String,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["console", "json", "markdown", "csv"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Engine tuning file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replacement catalog file (JSON)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// List contexts, runes, events and presets, then exit
    #[arg(long)]
    list_contexts: bool,

    /// Print progress while rolling
    #[arg(short, long)]
    verbose: bool,
}

fn split_csv(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let engine = load_engine(&args)?;
    if maybe_list_contexts(&args, engine.catalog())? {
        return Ok(());
    }

    announce_banner();

    let selection = build_selection(&args);
    let mut request = engine
        .request(&selection, args.rolls)
        .context("invalid selection")?;
    if let Some(seed) = args.seed {
        request = request.with_seed(seed);
    }
    let run = engine.prepare(request).context("invalid run request")?;

    let token = run.cancel_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", "⏹  Cancelling...".yellow());
            token.cancel();
        }
    });

    let start_time = Instant::now();
    let mut progress = ProgressPrinter::new(args.verbose);
    let outcome = drive_async(run, &SystemClock, &mut progress).await;
    ctrl_c.abort();
    let elapsed = start_time.elapsed();

    match outcome {
        RunOutcome::Completed(run) => {
            write_report(&args, &engine, &run, selection, elapsed)?;
            Ok(())
        }
        RunOutcome::Cancelled(cancelled) => {
            eprintln!(
                "{} after {} of {} rolls ({:.1}%)",
                "❌ Run cancelled".red().bold(),
                group_digits(cancelled.processed),
                group_digits(cancelled.total),
                cancelled.fraction() * 100.0
            );
            std::process::exit(EXIT_CANCELLED);
        }
    }
}

fn load_engine(args: &Args) -> Result<RollEngine> {
    let loader = FileLoader {
        catalog: args.catalog.clone(),
        config: args.config.clone(),
    };
    RollEngine::load(&loader).context("failed to load catalog or engine config")
}

fn build_selection(args: &Args) -> Selection {
    Selection {
        primary: Some(args.biome.clone()),
        rune: args.rune.clone(),
        time: args.time.clone(),
        events: split_csv(&args.events),
        presets: split_csv(&args.presets),
        luck: args.luck,
    }
}

fn maybe_list_contexts(args: &Args, catalog: &Catalog) -> Result<bool> {
    if !args.list_contexts {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    let out = output_target.writer();
    writeln!(out, "Available contexts:")?;
    for (_, ctx) in catalog.contexts() {
        let mut tags = Vec::new();
        if ctx.time {
            tags.push("time".to_string());
        }
        if ctx.aggregate {
            tags.push("aggregate".to_string());
        }
        if let Some(family) = &ctx.family {
            tags.push(format!("family {}", family.to_lowercase()));
        }
        writeln!(out, "  {:20} {}", ctx.id, tags.join(", "))?;
    }
    writeln!(out, "Runes:")?;
    for rune in catalog.runes() {
        let implies: Vec<&str> = rune.implies.iter().map(|c| catalog.context_name(*c)).collect();
        writeln!(out, "  {:20} implies {}", rune.id, implies.join(", "))?;
    }
    writeln!(out, "Events:")?;
    for event in catalog.events() {
        writeln!(
            out,
            "  {:20} {}",
            event.id,
            event.name.as_deref().unwrap_or("")
        )?;
    }
    writeln!(out, "Presets:")?;
    for preset in catalog.presets() {
        writeln!(out, "  {:20} min luck {}", preset.id, preset.min_luck)?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    eprintln!("{}", "🎲 Aura Roller".bright_cyan().bold());
    eprintln!("{}", "==============".cyan());
}

/// Prints a line per tenth of the run when verbose.
struct ProgressPrinter {
    verbose: bool,
    last_tenth: u8,
}

impl ProgressPrinter {
    const fn new(verbose: bool) -> Self {
        Self {
            verbose,
            last_tenth: 0,
        }
    }
}

impl RunObserver for ProgressPrinter {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn on_progress(&mut self, fraction: f64) {
        let tenth = (fraction * 10.0).floor().clamp(0.0, 10.0) as u8;
        if self.verbose && tenth > self.last_tenth {
            eprintln!("   {:>3}%", u32::from(tenth) * 10);
        }
        self.last_tenth = self.last_tenth.max(tenth);
    }

    fn on_complete(&mut self, outcome: &RunOutcome) {
        if let RunOutcome::Completed(run) = outcome {
            eprintln!(
                "{} {} rolls",
                "✅ Rolled".green().bold(),
                group_digits(run.total)
            );
        }
    }
}

fn write_report(
    args: &Args,
    engine: &RollEngine,
    run: &CompletedRun,
    selection: Selection,
    elapsed: Duration,
) -> Result<()> {
    let skip = split_csv(&args.skip);
    let report = engine.report(run, |item| {
        skip.iter().any(|name| name.eq_ignore_ascii_case(&item.name))
    });
    let meta = ReportMeta::new(engine.catalog().fingerprint(), selection, elapsed);
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => generate_json_report(&mut output_target, &report, &meta)?,
        "markdown" => generate_markdown_report(&mut output_target, &report, &meta)?,
        "csv" => generate_csv_report(&mut output_target, &report)?,
        _ => generate_console_report(&mut output_target, &report, &meta)?,
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
