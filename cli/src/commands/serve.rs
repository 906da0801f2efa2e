// Copyright (c) 2026 Playbook Cortex Contributors
// SPDX-License-Identifier: AGPL-3.0

//! `playbook serve` - run the HTTP API

use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::bootstrap::Cortex;
use crate::server;

#[derive(Args)]
pub struct ServeArgs {
    /// Bind address (default: server.bind_address from config)
    #[arg(long)]
    pub host: Option<String>,

    /// Port (default: server.port from config)
    #[arg(short, long)]
    pub port: Option<u16>,
}

pub async fn handle_command(args: ServeArgs, config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<()> {
    let mut config = super::load_config(config_path, data_dir)?;
    if let Some(host) = args.host {
        config.spec.server.bind_address = host;
    }
    if let Some(port) = args.port {
        config.spec.server.port = port;
    }

    let addr: SocketAddr = format!("{}:{}", config.spec.server.bind_address, config.spec.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.spec.server.bind_address, config.spec.server.port
            )
        })?;

    let cortex = Cortex::from_config(config)?;
    server::serve(cortex, addr).await
}
