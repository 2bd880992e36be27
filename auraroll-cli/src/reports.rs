use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

use auraroll_engine::{ResultRow, RollReport, Selection, Tier};

/// Run details printed alongside the result table.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub generated_at: DateTime<Utc>,
    /// Hex XxHash64 of the catalog the run used.
    pub catalog_fingerprint: String,
    pub selection: Selection,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ReportMeta {
    pub fn new(fingerprint: u64, selection: Selection, elapsed: Duration) -> Self {
        Self {
            generated_at: Utc::now(),
            catalog_fingerprint: format!("{fingerprint:016x}"),
            selection,
            elapsed,
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    meta: &'a ReportMeta,
    #[serde(flatten)]
    report: &'a RollReport,
}

/// `1234567` -> `1,234,567`.
pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn selection_label(selection: &Selection) -> String {
    let mut parts = vec![selection.primary.clone().unwrap_or_else(|| "default".to_string())];
    if let Some(time) = &selection.time {
        parts.push(time.clone());
    }
    if let Some(rune) = &selection.rune {
        parts.push(format!("rune {rune}"));
    }
    for event in &selection.events {
        parts.push(format!("event {event}"));
    }
    for preset in &selection.presets {
        parts.push(format!("preset {preset}"));
    }
    parts.join(" + ")
}

fn tier_colored(tier: Tier) -> colored::ColoredString {
    let label = tier.label();
    match tier {
        Tier::Basic => label.normal(),
        Tier::Epic => label.bright_blue(),
        Tier::Unique => label.bright_magenta(),
        Tier::Legendary => label.yellow(),
        Tier::Mythic => label.bright_red(),
        Tier::Exalted => label.bright_cyan(),
        Tier::Glorious => label.bright_yellow().bold(),
        Tier::Transcendent => label.bright_white().bold(),
        Tier::Special => label.green(),
    }
}

fn wins_detail(row: &ResultRow) -> String {
    match &row.breakthrough {
        Some(context) if row.breakthrough_wins > 0 => format!(
            "{} ({} via {context})",
            group_digits(row.wins),
            group_digits(row.breakthrough_wins)
        ),
        _ => group_digits(row.wins),
    }
}

pub fn generate_console_report<W: Write + ?Sized>(
    out: &mut W,
    report: &RollReport,
    meta: &ReportMeta,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Roll Results".bright_cyan().bold())?;
    writeln!(out, "{}", "===============".cyan())?;
    writeln!(out, "Selection: {}", selection_label(&meta.selection))?;
    writeln!(out, "Luck: {}", report.luck)?;
    writeln!(out, "Rolls: {}", group_digits(report.total))?;
    writeln!(
        out,
        "Wins: {} ({:.2}%)",
        group_digits(report.total_wins).green(),
        percent(report.total_wins, report.total)
    )?;
    writeln!(out, "No win: {}", group_digits(report.no_win))?;
    if report.hidden_wins > 0 {
        writeln!(out, "Hidden wins: {}", group_digits(report.hidden_wins))?;
    }
    if let Some(seed) = report.seed {
        writeln!(out, "Seed: {seed}")?;
    }
    writeln!(out, "Time: {:?}", meta.elapsed)?;
    writeln!(out)?;

    for row in &report.rows {
        writeln!(
            out,
            "  {:<28} 1 in {:<16} {:<14} {}",
            row.name.bold(),
            group_digits(row.effective_chance),
            tier_colored(row.tier),
            wins_detail(row)
        )?;
    }

    writeln!(out)?;
    writeln!(out, "{}", "🏆 Rewards".bright_yellow().bold())?;
    writeln!(out, "{}", "==========".yellow())?;
    writeln!(
        out,
        "Experience: {}",
        group_digits(report.rewards.experience)
    )?;
    if let Some(rarest) = &report.rewards.rarest {
        writeln!(
            out,
            "Rarest: {} (1 in {}, {})",
            rarest.name.bold(),
            group_digits(rarest.effective_chance),
            tier_colored(rarest.tier)
        )?;
    }
    if let Some(milestone) = report.rewards.milestones.last() {
        writeln!(out, "Milestone: {} rolls", group_digits(*milestone))?;
    }
    Ok(())
}

pub fn generate_json_report<W: Write + ?Sized>(
    out: &mut W,
    report: &RollReport,
    meta: &ReportMeta,
) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, &JsonReport { meta, report })?;
    writeln!(out)?;
    Ok(())
}

pub fn generate_markdown_report<W: Write + ?Sized>(
    out: &mut W,
    report: &RollReport,
    meta: &ReportMeta,
) -> Result<()> {
    writeln!(out, "# Aura Roller Results\n")?;
    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Selection**: {}", selection_label(&meta.selection))?;
    writeln!(out, "- **Luck**: {}", report.luck)?;
    writeln!(out, "- **Rolls**: {}", group_digits(report.total))?;
    writeln!(
        out,
        "- **Wins**: {} ({:.2}%)",
        group_digits(report.total_wins),
        percent(report.total_wins, report.total)
    )?;
    writeln!(out, "- **No win**: {}", group_digits(report.no_win))?;
    writeln!(
        out,
        "- **Experience**: {}",
        group_digits(report.rewards.experience)
    )?;
    writeln!(out, "- **Catalog**: `{}`", meta.catalog_fingerprint)?;
    writeln!(
        out,
        "- **Generated**: {}\n",
        meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;

    writeln!(out, "## Items\n")?;
    if report.rows.is_empty() {
        writeln!(out, "_No wins._")?;
        return Ok(());
    }
    writeln!(out, "| Item | Chance | Tier | Wins | Breakthrough wins |")?;
    writeln!(out, "|------|--------|------|------|-------------------|")?;
    for row in &report.rows {
        writeln!(
            out,
            "| {} | 1 in {} | {} | {} | {} |",
            row.name.replace('|', "\\|"),
            group_digits(row.effective_chance),
            row.tier,
            group_digits(row.wins),
            group_digits(row.breakthrough_wins)
        )?;
    }
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn generate_csv_report<W: Write + ?Sized>(out: &mut W, report: &RollReport) -> Result<()> {
    writeln!(
        out,
        "name,wins,breakthrough_wins,base_wins,effective_chance,base_chance,tier,breakthrough"
    )?;
    for row in &report.rows {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            csv_field(&row.name),
            row.wins,
            row.breakthrough_wins,
            row.base_wins,
            row.effective_chance,
            row.base_chance,
            row.tier,
            row.breakthrough.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}
