//! CLI surface. The command front-end itself is an out-of-scope
//! collaborator (its UX and the identity provider behind `login` are not
//! this crate's concern) — this module only implements enough of the
//! contract to drive the daemon loop and manage local adapter state.

use std::path::PathBuf;

use agentim_domain::config::{AdaptersConfig, WorkspaceConfig};
use clap::{Parser, Subcommand};

use crate::persisted::{agentim_home, load_custom_adapters, GatewayConfig};

pub const EXIT_OK: i32 = 0;
pub const EXIT_GENERIC: i32 = 1;
pub const EXIT_AUTH: i32 = 2;
pub const EXIT_CONNECTION: i32 = 3;

/// agentim-gateway — hosts local agent adapters and bridges them to the broker.
#[derive(Debug, Parser)]
#[command(name = "agentim-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store server URL and bearer token (read from `AGENTIM_TOKEN`).
    Login {
        #[arg(short = 's', long)]
        server: String,
        #[arg(short = 'u', long)]
        user: String,
    },
    /// Clear persisted connection state.
    Logout,
    /// Record saved environment variables for one adapter type.
    Setup { agent_type: String },
    /// Start the daemon: connect to the broker and host agents.
    Daemon {
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
    /// List locally known agent names (from the session map).
    List,
    /// Stop a running agent's adapter.
    Stop { name: String },
    /// Remove a stopped agent's session record.
    Rm { name: String },
    /// Show the resolved adapter definitions (built-in + custom).
    Adapters,
    /// Report connection + persisted-config health.
    Status,
}

pub fn login(server: String, user: String) -> Result<(), i32> {
    let token = std::env::var("AGENTIM_TOKEN").map_err(|_| {
        eprintln!("AGENTIM_TOKEN is not set");
        EXIT_AUTH
    })?;

    let path = agentim_home().join("config.json");
    let mut config = GatewayConfig::load(&path);
    config.server_url = Some(server);
    config.user_id = Some(user);
    config.token = Some(token);
    config.save(&path).map_err(|e| {
        eprintln!("failed to save config: {e}");
        EXIT_GENERIC
    })?;

    println!("saved gateway config to {}", path.display());
    Ok(())
}

pub fn logout() -> Result<(), i32> {
    let path = agentim_home().join("config.json");
    GatewayConfig::default().save(&path).map_err(|e| {
        eprintln!("failed to clear config: {e}");
        EXIT_GENERIC
    })?;
    println!("logged out");
    Ok(())
}

pub fn adapters() -> Result<(), i32> {
    let mut config = AdaptersConfig::with_defaults();
    load_custom_adapters(&agentim_home().join("adapters.json"), &mut config);

    println!("built-in: claude-code, codex, gemini, generic");
    for (name, def) in &config.custom {
        println!("custom: {name} -> {} {}", def.command, def.args.join(" "));
    }
    Ok(())
}

pub fn status() -> Result<(), i32> {
    let path = agentim_home().join("config.json");
    let config = GatewayConfig::load(&path);
    match (&config.server_url, &config.gateway_id) {
        (Some(server), Some(gateway_id)) => {
            println!("configured: server={server} gateway_id={gateway_id}");
            Ok(())
        }
        _ => {
            println!("not configured; run `agentim-gateway login` first");
            Err(EXIT_AUTH)
        }
    }
}

/// Shared config loading for `daemon`: merges persisted connection state
/// with custom adapter definitions and the process-default workspace
/// bounds.
pub fn load_daemon_config() -> anyhow::Result<(GatewayConfig, AdaptersConfig, WorkspaceConfig)> {
    let home: PathBuf = agentim_home();
    let gateway_config = GatewayConfig::load(&home.join("config.json"));
    let mut adapters_config = AdaptersConfig::with_defaults();
    load_custom_adapters(&home.join("adapters.json"), &mut adapters_config);
    let workspace_config = WorkspaceConfig::default();
    Ok((gateway_config, adapters_config, workspace_config))
}
