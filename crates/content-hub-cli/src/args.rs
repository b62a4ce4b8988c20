use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "content-hub")]
#[command(about = "Browse and download agents, instructions, prompts, skills and plugins from GitHub repositories")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Base directory (default: ~/.content-hub)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List content across all configured repositories
    List {
        /// Category (agents, instructions, plugins, prompts, skills); all when omitted
        category: Option<String>,
    },

    /// Download a file, skill folder or plugin bundle
    Download {
        /// Category of the item
        category: String,

        /// Item name as shown by `list`
        name: String,

        /// Only look in this repository (owner/repo)
        #[arg(long)]
        repo: Option<String>,

        /// Local root to download into (default: download.target_root)
        #[arg(long)]
        target: Option<PathBuf>,

        /// Overwrite and replace without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Show downloaded items that have a newer remote version
    Updates {
        /// Restrict to one category
        category: Option<String>,
    },

    /// Manage content repositories
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum RepoAction {
    /// List configured repositories and their folder mappings
    List,

    /// Add a repository
    Add {
        /// Repository (owner/repo)
        repo: String,

        /// Enterprise host base URL (e.g., https://github.example.com)
        #[arg(long)]
        base_url: Option<String>,

        /// Branch, tag or commit to read from
        #[arg(long)]
        branch: Option<String>,

        /// Label shown instead of owner/repo
        #[arg(long)]
        label: Option<String>,
    },

    /// Remove a repository
    Remove {
        /// Repository (owner/repo)
        repo: String,
    },

    /// Map a category to a folder in a repository
    Map {
        /// Repository (owner/repo)
        repo: String,

        /// Category to map
        category: String,

        /// Folder path, "root", "none" to exclude, or "default" to reset
        target: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g., cache.ttl_ms)
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., network.timeout_secs)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all config values
    List,

    /// Show config file path
    Path,

    /// Create config file with defaults
    Init,
}
