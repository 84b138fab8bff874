use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use agentim_gateway::cli::{self, Cli, Command};
use agentim_gateway::persisted::agentim_home;
use agentim_gateway::session_store::SessionStore;
use agentim_gateway::mcp_bridge;
use agentim_gateway::state::GatewayState;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    match cli.command {
        Some(Command::Login { server, user }) => cli::login(server, user).err().unwrap_or(cli::EXIT_OK),
        Some(Command::Logout) => cli::logout().err().unwrap_or(cli::EXIT_OK),
        Some(Command::Setup { agent_type }) => setup(agent_type),
        Some(Command::Adapters) => cli::adapters().err().unwrap_or(cli::EXIT_OK),
        Some(Command::Status) => cli::status().err().unwrap_or(cli::EXIT_OK),
        Some(Command::List) => list_agents().await,
        Some(Command::Stop { name }) => stop_agent(name).await,
        Some(Command::Rm { name }) => remove_agent(name).await,
        Some(Command::Daemon { yes }) => daemon(yes).await,
        None => daemon(false).await,
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,agentim_gateway=debug")))
        .json()
        .init();
}

fn setup(agent_type: String) -> i32 {
    println!("adapter '{agent_type}' uses saved environment from ~/.agentim/config.json's saved_env map; set values there or via the adapter's own env vars");
    cli::EXIT_OK
}

async fn list_agents() -> i32 {
    let store = SessionStore::load(agentim_home().join("sessions.json"));
    for agent_id in store.agent_ids() {
        println!("{agent_id}");
    }
    cli::EXIT_OK
}

async fn stop_agent(name: String) -> i32 {
    println!("stop requires a running daemon; connect to it and send server:stop_agent for '{name}'");
    cli::EXIT_OK
}

async fn remove_agent(name: String) -> i32 {
    let store = SessionStore::load(agentim_home().join("sessions.json"));
    store.remove(&name);
    cli::EXIT_OK
}

async fn daemon(yes: bool) -> i32 {
    init_tracing();

    let (gateway_config, adapters_config, workspace_config) = match cli::load_daemon_config() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("{e}");
            return cli::EXIT_GENERIC;
        }
    };

    let (server_url, token) = match (gateway_config.server_url.clone(), gateway_config.token.clone()) {
        (Some(s), Some(t)) => (s, t),
        _ => {
            eprintln!("not configured; run `agentim-gateway login` first");
            return cli::EXIT_AUTH;
        }
    };

    let gateway_id = gateway_config.gateway_id.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    if gateway_config.gateway_id.is_none() {
        let mut updated = gateway_config.clone();
        updated.gateway_id = Some(gateway_id.clone());
        let _ = updated.save(&agentim_home().join("config.json"));
    }

    tracing::info!(gateway_id = %gateway_id, permission_mode = if yes { "bypass" } else { "interactive" }, "starting agentim-gateway daemon");

    let sessions = Arc::new(SessionStore::load(agentim_home().join("sessions.json")));
    let state = GatewayState::new(server_url, token, gateway_id, adapters_config, workspace_config, sessions, yes);

    match mcp_bridge::spawn(state.mcp_bridge.clone()).await {
        Ok(port) => tracing::info!(port, "MCP bridge listening"),
        Err(e) => {
            eprintln!("failed to start MCP bridge: {e}");
            return cli::EXIT_GENERIC;
        }
    }

    let shutdown = CancellationToken::new();
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        ctrl_c_shutdown.cancel();
    });

    let permissions = state.client.permissions();
    let agent_manager = state.client.agent_manager();

    let run_result = state.client.run(shutdown).await;

    permissions.deny_all();
    agent_manager.dispose_all().await;

    match run_result {
        Ok(()) => cli::EXIT_OK,
        Err(e) if matches!(e, agentim_domain::error::Error::Auth(_)) => {
            eprintln!("{e}");
            cli::EXIT_AUTH
        }
        Err(e) => {
            eprintln!("{e}");
            cli::EXIT_CONNECTION
        }
    }
}

