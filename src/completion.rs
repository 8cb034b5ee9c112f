//! # Shell Completion Module
//!
//! Completion scripts via `clap_complete`, plus the node-id listing that shell
//! scripts can call for dynamic completion of `--seed` and `neighbors`.
//!
//! ```bash
//! vibegraph completion bash > ~/.local/share/bash-completion/completions/vibegraph
//! vibegraph completion zsh > ~/.config/zsh/completions/_vibegraph
//! ```

use crate::cli::Shell;
use crate::graph::MediaGraph;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io;
use std::path::Path;

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Convert our Shell enum to clap_complete's Shell enum
pub fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Node ids in the snapshot at `graph_path`, in insertion order.
///
/// Completion must never fail loudly, so an unreadable snapshot yields nothing.
pub fn node_completions(graph_path: Option<&Path>) -> Vec<String> {
    let Some(path) = graph_path else {
        return Vec::new();
    };
    match MediaGraph::load_json(path) {
        Ok(graph) => graph.nodes().iter().map(|n| n.id.clone()).collect(),
        Err(e) => {
            log::debug!("No node completions from `{}': {e:#}", path.display());
            Vec::new()
        }
    }
}

pub fn print_node_completions(graph_path: Option<&Path>) {
    for id in node_completions(graph_path) {
        println!("{id}");
    }
}
