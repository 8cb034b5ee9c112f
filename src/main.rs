//! # vibegraph
//!
//! Command-line front end: loads a graph snapshot, registers the service
//! adapters over the token vault and routes each subcommand.
//!
//! ## Usage
//!
//! ```bash
//! # Rank songs around two seeds
//! vibegraph --graph graph.json recommend -s song-1 -s song-2
//!
//! # What is connected?
//! vibegraph services
//!
//! # Watch the poller for 30 seconds
//! RUST_LOG=vibegraph=debug vibegraph sync --seconds 30
//! ```

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use vibegraph::cli::{self, Command, RunCommand};
use vibegraph::completion;
use vibegraph::config::RuntimeConfig;
use vibegraph::engine::{RecommendationEngine, RecommendationSource};
use vibegraph::graph::{EdgeType, MediaGraph, SharedGraph};
use vibegraph::media::RecommendationContext;
use vibegraph::registry::ServiceRegistry;
use vibegraph::services::spotify;
use vibegraph::sync::{SessionState, SessionSyncStore};
use vibegraph::vault::{MemoryTokenVault, SqliteTokenVault, TokenVault};

/// Everything a command needs, built once per invocation.
struct App {
    config: RuntimeConfig,
    graph: SharedGraph,
    registry: Arc<ServiceRegistry>,
}

impl App {
    fn build(config: RuntimeConfig, graph_path: Option<&Path>, ephemeral: bool) -> Result<Self> {
        let vault: Arc<dyn TokenVault> = if ephemeral {
            debug!("Using in-memory token vault");
            Arc::new(MemoryTokenVault::new())
        } else {
            let vault = SqliteTokenVault::open(&config.vault_path).with_context(|| {
                format!("Failed to open token vault {}", config.vault_path.display())
            })?;
            Arc::new(vault)
        };

        let graph = match graph_path {
            Some(path) => MediaGraph::load_json(path)?,
            None => {
                debug!("No graph snapshot given, starting cold");
                MediaGraph::new()
            }
        };
        info!(
            "Graph ready: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        let registry = Arc::new(ServiceRegistry::with_service_timeout(config.service_timeout()));
        registry.register(Arc::new(spotify::offline_spotify_service(vault)));

        Ok(Self {
            config,
            graph: graph.shared(),
            registry,
        })
    }

    async fn run(self, command: RunCommand) -> Result<()> {
        match command {
            RunCommand::Recommend {
                seeds,
                current,
                mood,
                time_of_day,
                limit,
                json,
            } => {
                let context = RecommendationContext {
                    seeds,
                    current_track: current,
                    mood,
                    time_of_day: time_of_day.map(cli::DayPart::resolve),
                    limit: Some(limit),
                };
                self.recommend(&context, json).await
            }
            RunCommand::Neighbors { node, edges } => {
                let filter: Vec<EdgeType> = if edges.is_empty() {
                    EdgeType::ALL.to_vec()
                } else {
                    edges.into_iter().map(EdgeType::from).collect()
                };
                self.neighbors(&node, &filter)
            }
            RunCommand::Services => {
                for status in self.registry.connection_report().await {
                    println!(
                        "{:<12} {:<16} {:<7} {}",
                        status.id,
                        status.display_name,
                        status.service_type.to_string(),
                        connection_label(status.connected)
                    );
                }
                Ok(())
            }
            RunCommand::Connect { service } => self.connect(&service).await,
            RunCommand::Disconnect { service } => {
                let Some(adapter) = self.registry.get(&service) else {
                    bail!("No service named `{service}`");
                };
                adapter
                    .disconnect()
                    .await
                    .with_context(|| format!("Failed to clear credentials for {service}"))?;
                println!("{}: {}", adapter.display_name(), connection_label(false));
                Ok(())
            }
            RunCommand::Sync { seconds, label } => {
                self.sync(&label, Duration::from_secs(seconds)).await
            }
        }
    }

    async fn recommend(&self, context: &RecommendationContext, json: bool) -> Result<()> {
        let engine =
            RecommendationEngine::new(Arc::clone(&self.graph), Arc::clone(&self.registry))
                .with_ranking(self.config.ranking());
        let set = engine.recommend(context).await;

        if json {
            println!("{}", serde_json::to_string_pretty(&set.items)?);
            return Ok(());
        }

        match &set.source {
            RecommendationSource::Graph => println!("From your graph:"),
            RecommendationSource::Fallback { service_id } => {
                println!("Graph had nothing yet, suggestions from {service_id}:")
            }
            RecommendationSource::Empty => {
                println!("No recommendations available.");
                return Ok(());
            }
        }
        for (i, item) in set.items.iter().enumerate() {
            match &item.artist {
                Some(artist) => {
                    println!("{:>3}. {} - {}  [{}]", i + 1, item.title, artist, item.uri)
                }
                None => println!("{:>3}. {}  [{}]", i + 1, item.title, item.uri),
            }
        }
        Ok(())
    }

    fn neighbors(&self, node: &str, filter: &[EdgeType]) -> Result<()> {
        let graph = self.graph.read().unwrap_or_else(PoisonError::into_inner);
        if !graph.contains(node) {
            bail!("Unknown node `{node}`");
        }

        let neighbors = graph.neighbors(node, filter);
        if neighbors.is_empty() {
            println!("`{node}` has no neighbors for the selected edge types.");
        }
        for neighbor in neighbors {
            let weight = neighbor
                .edge
                .weight
                .map(|w| format!(" {w:.2}"))
                .unwrap_or_default();
            println!(
                "{:<24} {:<14} via {}{}",
                neighbor.node.label,
                neighbor.node.node_type.to_string(),
                neighbor.edge.edge_type,
                weight
            );
        }
        Ok(())
    }

    async fn connect(&self, service: &str) -> Result<()> {
        let Some(adapter) = self.registry.get(service) else {
            bail!("No service named `{service}`");
        };

        let connected = match adapter.connect().await {
            Ok(connected) => connected,
            Err(e) => {
                debug!("Connect to `{service}' failed: {e}");
                false
            }
        };
        println!("{}: {}", adapter.display_name(), connection_label(connected));
        Ok(())
    }

    async fn sync(&self, label: &str, duration: Duration) -> Result<()> {
        let store = SessionSyncStore::new(Arc::clone(&self.registry), self.config.sync_config());
        let mut updates = store.subscribe();
        store.start(label)?;

        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                () = &mut deadline => break,
                _ = tokio::signal::ctrl_c() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    print_state(&updates.borrow_and_update());
                }
            }
        }

        store.stop()?;
        Ok(())
    }
}

fn connection_label(connected: bool) -> &'static str {
    if connected {
        "connected"
    } else {
        "not connected"
    }
}

fn print_state(state: &SessionState) {
    if !state.is_active {
        println!("idle");
        return;
    }
    let seconds = state.progress_ms / 1000;
    let service = state.service_id.as_deref().unwrap_or("-");
    let playing = state
        .now_playing
        .as_ref()
        .map(|p| p.title.as_str())
        .unwrap_or("nothing playing");
    println!(
        "[{}] {} ({}) {:02}:{:02} {}",
        state.label,
        service,
        connection_label(state.connected),
        seconds / 60,
        seconds % 60,
        playing
    );
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::load(path),
        None => RuntimeConfig::load_default(),
    }
}

/// Main entry point.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug vibegraph recommend ...` - Enable debug logging
/// - `RUST_LOG=vibegraph::sync=trace vibegraph sync` - Per-tick detail
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(
                completion::shell_to_completion_shell(shell),
                &mut cmd,
            );
        }
        Command::CompleteNodes => {
            // Completion must keep working with a broken config file.
            let graph_path = args.graph.clone().or_else(|| {
                load_config(args.config.as_deref())
                    .ok()
                    .and_then(|config| config.graph_path)
            });
            completion::print_node_completions(graph_path.as_deref());
        }
        Command::Run(command) => {
            let config = load_config(args.config.as_deref())?;
            let graph_path: Option<PathBuf> =
                args.graph.clone().or_else(|| config.graph_path.clone());
            let app = App::build(config, graph_path.as_deref(), args.ephemeral)?;
            app.run(command).await?;
        }
    }

    Ok(())
}
