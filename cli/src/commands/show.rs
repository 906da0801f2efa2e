// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `playbook show` - list the bullets of a namespace

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use playbook_cortex::domain::{Playbook, PlaybookRepository};
use playbook_cortex::infrastructure::JsonPlaybookRepository;

#[derive(Args)]
pub struct ShowArgs {
    /// Playbook namespace (omit to list namespaces)
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Only bullets in this section
    #[arg(short, long)]
    pub section: Option<String>,

    /// Print the stored playbook as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn handle_command(args: ShowArgs, config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config_path, data_dir)?;
    let repository = JsonPlaybookRepository::new(&config.spec.playbook.data_dir);

    let Some(namespace) = args.namespace else {
        let namespaces = repository.list_namespaces().await.context("Failed to list playbooks")?;
        if namespaces.is_empty() {
            println!(
                "{}",
                format!("No playbooks in {}", repository.data_dir().display()).dimmed()
            );
        }
        for namespace in namespaces {
            println!("{}", namespace);
        }
        return Ok(());
    };

    let playbook = repository
        .load(&namespace)
        .await
        .with_context(|| format!("Failed to load playbook '{}'", namespace))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&playbook)?);
        return Ok(());
    }

    print_playbook(&namespace, &playbook, args.section.as_deref());
    Ok(())
}

fn print_playbook(namespace: &str, playbook: &Playbook, section_filter: Option<&str>) {
    println!(
        "{} {}",
        format!("Playbook '{}'", namespace).bold(),
        format!(
            "({} bullets, updated {})",
            playbook.len(),
            playbook.metadata.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
        .dimmed()
    );

    for section in playbook.sections() {
        if section_filter.is_some_and(|wanted| wanted != section) {
            continue;
        }
        println!();
        println!("{}", format!("## {}", section).cyan().bold());
        for bullet in playbook.bullets.iter().filter(|b| b.section == section) {
            let confidence = bullet.confidence_score();
            let score = format!("{:.2}", confidence);
            let score = if confidence >= 0.5 { score.green() } else { score.red() };
            println!(
                "  {} {} {}",
                score,
                bullet.id.to_string().dimmed(),
                format!("(+{} / -{})", bullet.helpful, bullet.harmful).dimmed()
            );
            println!("     {}", bullet.content);
        }
    }
}
