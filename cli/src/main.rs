//! CLI entrypoint for blockhand
//!
//! This is the main binary that wires together all layers using
//! dependency injection: one simulated world, one local ledger and one
//! registry file shared by the driven agent and its peers.

mod runtime;

use anyhow::{Result, anyhow, bail};
use blockhand_application::{ActivityLogger, AgentConfig, NoActivityLogger};
use blockhand_infrastructure::{
    ConfigLoader, FileConfig, JsonFileCollaboratorRegistry, JsonlActivityLogger, LocalLedger,
    SimulatedWorld,
};
use blockhand_presentation::{Cli, ConsoleFormatter, ConsoleRepl};
use clap::Parser;
use runtime::{Runtime, WorldConsole};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        return Ok(());
    }

    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())?
    };
    apply_overrides(&mut config, &cli);

    let _log_guard = init_tracing(cli.verbose, config.logging.file_path())?;
    info!("Starting blockhand");

    let issues = config.validate();
    if !issues.is_empty() {
        eprintln!("{}", ConsoleFormatter::issues(&issues));
    }
    if AgentConfig::has_errors(&issues) {
        bail!("invalid configuration");
    }
    if cli.check_config {
        println!("Configuration OK");
        return Ok(());
    }

    // === Dependency Injection ===
    let activity: Arc<dyn ActivityLogger> = match config
        .logging
        .activity_log_path()
        .and_then(JsonlActivityLogger::new)
    {
        Some(logger) => {
            info!("Activity log: {}", logger.path().display());
            Arc::new(logger)
        }
        None => Arc::new(NoActivityLogger),
    };
    let registry_path = config.registry.resolve_path();
    info!("Collaborator registry: {}", registry_path.display());

    let runtime = Runtime {
        world: SimulatedWorld::new(),
        ledger: LocalLedger::new(config.simulation.credits_per_order),
        registry: Arc::new(JsonFileCollaboratorRegistry::new(registry_path)),
        activity,
        cancel: CancellationToken::new(),
    };

    let (agent_config, _) = config.to_agent_config();
    let sim = &config.simulation;
    for tree in sim.trees.iter().filter(|t| t.height > 0) {
        runtime.world.plant_tree(
            tree.base(),
            tree.height,
            &agent_config.behavior().resource,
            &agent_config.behavior().marker,
        );
    }
    runtime.world.add_player(&sim.player, sim.player_spawn())?;

    // Peers first, so they are registered before the driven agent's
    // first discovery.
    let mut agents = Vec::new();
    for peer in &sim.peers {
        let (peer_config, _) = config.agent_config_for(&peer.name, peer.parse_role());
        agents.push(
            runtime
                .launch(&peer_config, peer.spawn_position(), peer.inventory)
                .await?,
        );
    }
    agents.push(
        runtime
            .launch(&agent_config, sim.agent_spawn(), sim.agent_inventory)
            .await?,
    );

    spawn_chat_printer(&runtime.world, sim.player.clone(), runtime.cancel.clone());
    let cancel = runtime.cancel.clone();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let console = Arc::new(WorldConsole::new(runtime.world.clone(), agents));
    ConsoleRepl::new(console, sim.player.clone())
        .run(cancel.clone())
        .await?;
    cancel.cancel();
    Ok(())
}

fn apply_overrides(config: &mut FileConfig, cli: &Cli) {
    if let Some(player) = &cli.player {
        config.simulation.player = player.clone();
    }
    if let Some(name) = &cli.name {
        config.agent.name = name.clone();
    }
    if let Some(path) = &cli.registry {
        config.registry.path = Some(path.to_string_lossy().into_owned());
    }
}

/// Initialize logging based on verbosity level, optionally mirrored to a
/// file. The returned guard flushes the file writer when dropped.
fn init_tracing(verbose: u8, file: Option<PathBuf>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let console = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let Some(path) = file else {
        tracing_subscriber::registry()
            .with(EnvFilter::new(level))
            .with(console)
            .init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("invalid log file path: {}", path.display()))?;
    std::fs::create_dir_all(dir)?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(console)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

/// Print every chat line spoken in the world.
fn spawn_chat_printer(world: &SimulatedWorld, player: String, cancel: CancellationToken) {
    let mut feed = world.subscribe_chat();
    tokio::spawn(async move {
        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                line = feed.recv() => line,
            };
            match line {
                Ok(line) => println!(
                    "{}",
                    ConsoleFormatter::chat_line(&line.sender, &line.message, &player)
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Chat display skipped {} lines", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
