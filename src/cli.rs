//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `vibegraph` binary.
//!
//! ## Commands
//!
//! - `recommend`: rank songs from a graph snapshot, falling back to services
//! - `neighbors`: list a node's adjacent nodes
//! - `services`: show registered services and their connection state
//! - `connect` / `disconnect`: manage a service's stored credentials
//! - `sync`: run the session poller for a while and print each state change
//! - `completion`: print a shell completion script
//!
//! ## Examples
//!
//! ```bash
//! vibegraph --graph ~/graph.json recommend --seed song-42 --limit 5
//! vibegraph --graph ~/graph.json recommend --mood calm --time-of-day now
//! vibegraph neighbors artist-7 --edge related
//! vibegraph disconnect spotify
//! ```

use crate::graph::EdgeType;
use crate::media::TimeOfDay;
use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Edge filter accepted on the command line.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum EdgeKind {
    Similar,
    Next,
    Related,
    HasFeature,
    HasGenre,
}

impl From<EdgeKind> for EdgeType {
    fn from(kind: EdgeKind) -> Self {
        match kind {
            EdgeKind::Similar => Self::Similar,
            EdgeKind::Next => Self::Next,
            EdgeKind::Related => Self::Related,
            EdgeKind::HasFeature => Self::HasFeature,
            EdgeKind::HasGenre => Self::HasGenre,
        }
    }
}

/// Time-of-day bucket, or `now` for the local clock.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum DayPart {
    Morning,
    Afternoon,
    Evening,
    Night,
    Now,
}

impl DayPart {
    pub fn resolve(self) -> TimeOfDay {
        match self {
            Self::Morning => TimeOfDay::Morning,
            Self::Afternoon => TimeOfDay::Afternoon,
            Self::Evening => TimeOfDay::Evening,
            Self::Night => TimeOfDay::Night,
            Self::Now => TimeOfDay::now(),
        }
    }
}

/// Main application arguments structure.
#[derive(Parser)]
#[command(name = "vibegraph")]
#[command(about = "vibegraph: graph-ranked recommendations across streaming services")]
#[command(version)]
pub struct Args {
    /// Configuration file (defaults to the data directory's config.toml)
    #[arg(long, global = true, env = "VIBEGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Graph snapshot (JSON); overrides `graph_path` from the config
    #[arg(long, global = true, env = "VIBEGRAPH_GRAPH")]
    pub graph: Option<PathBuf>,

    /// Keep tokens in memory instead of the token database
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(flatten)]
    Run(RunCommand),

    /// Generate shell completion scripts
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print node ids for shell completion
    #[command(hide = true)]
    CompleteNodes,
}

/// Commands that need the graph, the vault and the service registry.
#[derive(Subcommand)]
pub enum RunCommand {
    /// Recommend songs
    ///
    /// Seeds come from `--seed` node ids, the mood and the time of day. When the
    /// graph has nothing to offer, registered services are asked instead.
    Recommend {
        /// Seed node id (repeatable)
        #[arg(long = "seed", short = 's')]
        seeds: Vec<String>,

        /// Node id of the track currently playing
        #[arg(long)]
        current: Option<String>,

        /// Mood, matched against Vibe node labels
        #[arg(long)]
        mood: Option<String>,

        #[arg(long, value_enum)]
        time_of_day: Option<DayPart>,

        /// Maximum number of results
        #[arg(
            long,
            short = 'n',
            default_value = "10",
            value_parser = RangedU64ValueParser::<usize>::new().range(1..)
        )]
        limit: usize,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the nodes adjacent to a node
    Neighbors {
        /// Node id
        node: String,

        /// Only follow these edge types (repeatable; default: all)
        #[arg(long = "edge", short = 'e', value_enum)]
        edges: Vec<EdgeKind>,
    },

    /// Show registered services and whether they are connected
    Services,

    /// Connect a service using stored or fresh credentials
    Connect {
        service: String,
    },

    /// Forget a service's stored credentials
    Disconnect {
        service: String,
    },

    /// Run the session poller and print state changes
    Sync {
        /// How long to keep polling
        #[arg(long, default_value = "10")]
        seconds: u64,

        /// Session label
        #[arg(long, default_value = "cli")]
        label: String,
    },
}
