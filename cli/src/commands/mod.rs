// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the playbook CLI

pub mod config;
pub mod run;
pub mod search;
pub mod serve;
pub mod show;

pub use self::config::ConfigCommand;
pub use self::run::RunArgs;
pub use self::search::SearchArgs;
pub use self::serve::ServeArgs;
pub use self::show::ShowArgs;

use anyhow::{Context, Result};
use std::path::PathBuf;

use playbook_cortex::domain::config::CortexConfigManifest;

/// Load, override and validate the configuration for a command.
pub fn load_config(config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<CortexConfigManifest> {
    let mut config = CortexConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    if let Some(dir) = data_dir {
        config.spec.playbook.data_dir = dir;
    }
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}
