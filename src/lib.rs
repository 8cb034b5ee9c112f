//! Graph-ranked recommendations across streaming services.
//!
//! Core modules:
//! - [`graph`] - Typed media graph (songs, artists, vibes, features, genres)
//! - [`algorithm`] - Bounded-depth weighted ranking over the graph
//! - [`engine`] - Recommendations with service fallback
//! - [`registry`] - Catalog of service adapters with a reactive view
//! - [`sync`] - Single-owner playback poller
//!
//! ### Supporting Modules
//!
//! - [`services`] - Service capability trait and adapters
//! - [`vault`] - Token storage
//! - [`media`] - Shared data types
//! - [`error`] - Error enums per failure domain
//! - [`config`] - Data directory and runtime configuration
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vibegraph::engine::RecommendationEngine;
//! use vibegraph::graph::MediaGraph;
//! use vibegraph::media::RecommendationContext;
//! use vibegraph::registry::ServiceRegistry;
//! use vibegraph::services::spotify::offline_spotify_service;
//! use vibegraph::sync::{SessionSyncStore, SyncConfig};
//! use vibegraph::vault::MemoryTokenVault;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let registry = Arc::new(ServiceRegistry::new());
//! registry.register(Arc::new(offline_spotify_service(Arc::new(MemoryTokenVault::new()))));
//!
//! let graph = MediaGraph::load_json("graph.json".as_ref())?.shared();
//! let engine = RecommendationEngine::new(graph, Arc::clone(&registry));
//!
//! let sync = SessionSyncStore::new(Arc::clone(&registry), SyncConfig::default());
//! sync.start("player")?;
//!
//! let picks = engine
//!     .recommend_for_session(&sync.state(), &RecommendationContext::default().mood("calm"))
//!     .await;
//! for item in &picks.items {
//!     println!("{} ({})", item.title, item.uri);
//! }
//!
//! sync.stop()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Ranking
//!
//! Seeds expand breadth-first for at most two hops across `SIMILAR`, `RELATED`
//! and `NEXT` edges. Each traversed edge adds `weight * decay^depth` to the node
//! it reaches; only songs are returned and seeds never are. Ties fall back to
//! graph insertion order, so a fixed graph always ranks the same way.
//!
//! ## Error Handling
//!
//! Library errors are `thiserror` enums ([`error::GraphError`],
//! [`error::ServiceError`], [`error::VaultError`], [`error::SyncError`]).
//! Absence is never an error: no service, no token and no candidates come back
//! as `None` or an empty list. File and configuration helpers return
//! `anyhow::Result` with context.

pub mod algorithm;
pub mod cli;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod media;
pub mod registry;
pub mod services;
pub mod sync;
pub mod vault;
