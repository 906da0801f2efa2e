// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `playbook run` - batch feedback loop over a JSONL task file
//!
//! Each stage checkpoints its output under `<results-dir>/<namespace>/` so a
//! later stage can be rerun without repeating generation:
//!
//! - `infer`   reads the task file, writes `infer.jsonl`
//! - `reflect` reads `infer.jsonl`, writes `reflect.jsonl`
//! - `curate`  reads `reflect.jsonl` and merges into the playbook
//! - `full`    runs all three in order

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use playbook_cortex::application::{Accuracy, InferRecord, ReflectRecord, TaskRecord};
use playbook_cortex::domain::{PlaybookRepository, RunStatus};
use playbook_cortex::infrastructure::playbook_store::validate_namespace;

use crate::bootstrap::Cortex;

const INFER_FILE: &str = "infer.jsonl";
const REFLECT_FILE: &str = "reflect.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    Infer,
    Reflect,
    Curate,
    Full,
}

#[derive(Args)]
pub struct RunArgs {
    /// Playbook namespace
    #[arg(short, long)]
    pub namespace: String,

    /// JSONL task file with `query` and optional `ground_truth`, `id`
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Stage to run
    #[arg(long, value_enum, default_value_t = Stage::Full)]
    pub stage: Stage,

    /// Only process the first N records
    #[arg(long)]
    pub limit: Option<usize>,

    /// Reflection refinement rounds (default: reflection.max_iterations from config)
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Directory for stage checkpoints
    #[arg(long, default_value = "./results", value_name = "DIR")]
    pub results_dir: PathBuf,
}

pub async fn handle_command(args: RunArgs, config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<()> {
    validate_namespace(&args.namespace)?;

    let mut config = super::load_config(config_path, data_dir)?;
    if let Some(iterations) = args.iterations {
        if iterations == 0 {
            bail!("--iterations must be at least 1");
        }
        config.spec.reflection.max_iterations = iterations;
    }
    let cortex = Cortex::from_config(config)?;

    let stage_dir = args.results_dir.join(&args.namespace);
    tokio::fs::create_dir_all(&stage_dir)
        .await
        .with_context(|| format!("Failed to create {}", stage_dir.display()))?;

    if matches!(args.stage, Stage::Infer | Stage::Full) {
        let input = args
            .input
            .as_deref()
            .context("--input is required for the infer and full stages")?;
        infer_stage(&cortex, &args.namespace, input, &stage_dir, args.limit).await?;
    }
    if matches!(args.stage, Stage::Reflect | Stage::Full) {
        reflect_stage(&cortex, &stage_dir, args.limit).await?;
    }
    if matches!(args.stage, Stage::Curate | Stage::Full) {
        curate_stage(&cortex, &args.namespace, &stage_dir, args.limit).await?;
    }

    Ok(())
}

async fn infer_stage(
    cortex: &Cortex,
    namespace: &str,
    input: &Path,
    stage_dir: &Path,
    limit: Option<usize>,
) -> Result<()> {
    let tasks: Vec<TaskRecord> = read_jsonl(input, limit).await?;
    println!("{} {} tasks from {}", "Inferring".bold(), tasks.len(), input.display());

    let progress = progress_bar(tasks.len())?;
    let mut accuracy = Accuracy::default();
    let mut records = Vec::with_capacity(tasks.len());
    for task in &tasks {
        let record = cortex.feedback_loop.infer(task, namespace).await;
        accuracy.record(record.is_correct);
        records.push(record);
        progress.inc(1);
    }
    progress.finish_with_message("done");

    let path = stage_dir.join(INFER_FILE);
    write_jsonl(&path, &records).await?;

    let failed = records.iter().filter(|r| !r.trajectory.is_success()).count();
    if failed > 0 {
        println!("{}", format!("⚠ {} generation(s) failed", failed).yellow());
    }
    println!("{} {}", "Accuracy:".bold(), accuracy);
    println!("  Wrote {}", path.display());
    info!(namespace, total = accuracy.total, correct = accuracy.correct, "Infer stage complete");
    Ok(())
}

async fn reflect_stage(cortex: &Cortex, stage_dir: &Path, limit: Option<usize>) -> Result<()> {
    let input = stage_dir.join(INFER_FILE);
    let inferred: Vec<InferRecord> = read_jsonl(&input, limit).await?;
    println!("{} {} records from {}", "Reflecting".bold(), inferred.len(), input.display());

    let progress = progress_bar(inferred.len())?;
    let mut reflected = Vec::with_capacity(inferred.len());
    let mut skipped = 0usize;
    for record in &inferred {
        match cortex.feedback_loop.reflect(record).await {
            Some(result) => reflected.push(result),
            None => skipped += 1,
        }
        progress.inc(1);
    }
    progress.finish_with_message("done");

    let path = stage_dir.join(REFLECT_FILE);
    write_jsonl(&path, &reflected).await?;

    let degraded = reflected
        .iter()
        .filter(|r| r.reflection.status != RunStatus::Success)
        .count();
    println!(
        "  {} reflected, {} skipped, {} degraded",
        reflected.len(),
        skipped,
        degraded
    );
    println!("  Wrote {}", path.display());
    Ok(())
}

async fn curate_stage(cortex: &Cortex, namespace: &str, stage_dir: &Path, limit: Option<usize>) -> Result<()> {
    let input = stage_dir.join(REFLECT_FILE);
    let reflected: Vec<ReflectRecord> = read_jsonl(&input, limit).await?;
    println!("{} {} reflections into '{}'", "Curating".bold(), reflected.len(), namespace);

    let mut failed = 0usize;
    for (index, record) in reflected.iter().enumerate() {
        if record.reflection.namespace != namespace {
            warn!(
                expected = namespace,
                found = %record.reflection.namespace,
                "Skipping reflection recorded for another namespace"
            );
            continue;
        }

        // Sequential: each curation sees the playbook the previous one saved
        let result = cortex.feedback_loop.curate(record).await;
        let status = match result.status {
            RunStatus::Success => result.status.to_string().green(),
            RunStatus::Degraded => result.status.to_string().yellow(),
            RunStatus::Failed => {
                failed += 1;
                result.status.to_string().red()
            }
        };
        println!(
            "  [{:>3}] {} {} ({} → {} bullets)",
            index + 1,
            status,
            result.summary,
            result.summary.bullets_before,
            result.summary.bullets_after
        );
        for warning in &result.summary.warnings {
            println!("        {}", warning.dimmed());
        }
    }

    let playbook = cortex.repository.load(namespace).await?;
    println!("{} playbook '{}' now has {} bullets", "✓".green(), namespace, playbook.len());
    if failed > 0 {
        bail!("{} curation run(s) failed", failed);
    }
    Ok(())
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let progress = ProgressBar::new(len as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    Ok(progress)
}

/// Parse a JSONL file, skipping blank lines. Errors name the offending line.
pub async fn read_jsonl<T: DeserializeOwned>(path: &Path, limit: Option<usize>) -> Result<Vec<T>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut records = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if limit.is_some_and(|max| records.len() >= max) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid record", path.display(), index + 1))?;
        records.push(record);
    }
    Ok(records)
}

pub async fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    tokio::fs::write(path, out)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
