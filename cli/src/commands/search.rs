// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `playbook search` - hybrid retrieval from the command line

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use playbook_cortex::application::{SearchQuery, SearchResult};
use playbook_cortex::domain::PlaybookRepository;

use crate::bootstrap::Cortex;

#[derive(Args)]
pub struct SearchArgs {
    /// Query text
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Playbook namespace
    #[arg(short, long)]
    pub namespace: String,

    /// Number of results (default: search.top_k from config)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Restrict to these sections (repeatable)
    #[arg(short, long = "section")]
    pub sections: Vec<String>,

    /// Minimum bullet confidence (default: search.min_confidence from config)
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn handle_command(args: SearchArgs, config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config_path, data_dir)?;
    let cortex = Cortex::from_config(config)?;

    let results = run_search(&cortex, &args).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{}", "No matching bullets.".dimmed());
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        let bullet = &result.bullet;
        println!(
            "{:>2}. {} {} {}",
            rank + 1,
            format!("[{}]", bullet.section).cyan(),
            bullet.id.to_string().dimmed(),
            format!("score={:.3}", result.combined_score).bold()
        );
        println!("    {}", bullet.content);
        println!(
            "    {}",
            format!(
                "vector={:.3} lexical={:.3} confidence={:.2} (+{} / -{})",
                result.vector_score,
                result.lexical_score,
                bullet.confidence_score(),
                bullet.helpful,
                bullet.harmful
            )
            .dimmed()
        );
    }

    Ok(())
}

pub async fn run_search(cortex: &Cortex, args: &SearchArgs) -> Result<Vec<SearchResult>> {
    let search = &cortex.config.spec.search;

    let mut query = SearchQuery::new(args.query.clone())
        .with_top_k(args.top_k.unwrap_or(search.top_k))
        .with_min_confidence(args.min_confidence.unwrap_or(search.min_confidence));
    if !args.sections.is_empty() {
        query = query.with_sections(args.sections.clone());
    }

    let playbook = cortex
        .repository
        .load(&args.namespace)
        .await
        .with_context(|| format!("Failed to load playbook '{}'", args.namespace))?;

    cortex.search.search(&query, &playbook).await.context("Search failed")
}
