//! CLI arguments and subcommands for herakles-process-explorer.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-process-explorer",
    about = "Live process tree explorer for Linux",
    long_about = "Live process tree explorer for Linux.\n\n\
                  Samples the kernel's per-process interface, maintains a sorted process \
                  hierarchy with CPU and memory usage, and searches open descriptors and \
                  mapped libraries across all processes.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (logs go to stderr)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Root of the proc filesystem
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Refresh interval in milliseconds
    #[arg(short = 'i', long)]
    pub interval_ms: Option<u64>,

    /// Parallel processing threads (0 = auto)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Sort children by this key (name, pid, owner, state, cpu, memory, rss, vsize, priority, nice)
    #[arg(short = 's', long)]
    pub sort: Option<String>,

    /// Sort in ascending order
    #[arg(long, conflicts_with = "descending")]
    pub ascending: bool,

    /// Sort in descending order
    #[arg(long, conflicts_with = "ascending")]
    pub descending: bool,

    /// Apply the sort to every level of the tree, not only top-level processes
    #[arg(long)]
    pub sort_global: bool,

    /// Show raw major:minor device numbers in memory maps
    #[arg(long)]
    pub no_device_names: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the process tree once
    Tree {
        /// Emit the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Keep sampling and print each change event
    Watch {
        /// Stop after this many passes
        #[arg(short = 'n', long)]
        passes: Option<u64>,

        /// Emit events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Find processes holding a file, socket or library matching TEXT
    Find {
        /// Substring to search for (case-insensitive)
        text: String,

        /// Emit matches as JSON
        #[arg(long)]
        json: bool,
    },

    /// List open file descriptors of a process
    Fds {
        pid: u32,
    },

    /// List memory maps of a process
    Maps {
        pid: u32,

        /// Show every region instead of the distinct mapped libraries
        #[arg(long)]
        raw: bool,
    },

    /// List threads of a process
    Threads {
        pid: u32,
    },

    /// Validate configuration and proc filesystem access
    Check,
}
