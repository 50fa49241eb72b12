use clap::{Parser, Subcommand};
use clap_complete::engine::{ArgValueCompleter, CompletionCandidate};

#[derive(Parser)]
#[command(name = "burrow", about = "Reverse tunnel broker state manager", version)]
pub struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

fn complete_client_names(current: &std::ffi::OsStr) -> Vec<CompletionCandidate> {
    let prefix = current.to_str().unwrap_or("");
    let dir = match crate::config::Config::load().state_dir() {
        Ok(dir) => dir,
        Err(_) => return Vec::new(),
    };
    crate::state::list(&dir)
        .unwrap_or_default()
        .iter()
        .filter(|n| n.starts_with(prefix))
        .map(|n| CompletionCandidate::new(n))
        .collect()
}

#[derive(Subcommand)]
pub enum Command {
    /// Establish tunnels for a client and record them
    Add {
        /// Client name
        #[arg(add = ArgValueCompleter::new(complete_client_names))]
        client: String,
        /// Tunnel declarations, e.g. "3000", "site.com:80", "2222:127.0.0.1:22(acl:10.0.0.1)"
        #[arg(required = true)]
        specs: Vec<String>,
    },
    /// Reconcile a client reconnect against its recorded tunnels
    Reconnect {
        /// Client name (interactive picker if omitted)
        #[arg(add = ArgValueCompleter::new(complete_client_names))]
        client: Option<String>,
        /// Newly declared tunnels (leftovers from the old set are re-established)
        specs: Vec<String>,
    },
    /// List clients and their tunnels
    #[command(alias = "ls", alias = "status")]
    List {
        /// Show a single client
        #[arg(add = ArgValueCompleter::new(complete_client_names))]
        client: Option<String>,
    },
    /// Validate tunnel declarations and print their canonical forms
    Check {
        #[arg(required = true)]
        specs: Vec<String>,
    },
    /// Remove a client's recorded tunnels
    Remove {
        /// Client name (interactive picker if omitted)
        #[arg(add = ArgValueCompleter::new(complete_client_names))]
        client: Option<String>,
    },
    /// Initialize or edit ~/.burrow/config.toml
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (reads from config if omitted)
        shell: Option<clap_complete::Shell>,
    },
    /// List client names (for shell completion scripts)
    #[command(hide = true)]
    ListClientNames,
}
