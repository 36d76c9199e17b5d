//! CLI command implementations for herakles-process-explorer.
//!
//! This module provides implementations for all CLI subcommands:
//! - `tree`: One-shot process hierarchy
//! - `watch`: Continuous sampling with change events
//! - `find`: Handle search across all processes
//! - `details`: Descriptors, memory maps and threads of one process
//! - `check`: Proc access and configuration validation

pub mod check;
pub mod details;
pub mod find;
pub mod tree;
pub mod watch;

// Re-export command functions
pub use check::command_check;
pub use details::{command_fds, command_maps, command_threads};
pub use find::command_find;
pub use tree::command_tree;
pub use watch::command_watch;

use herakles_process_explorer::{PassOutcome, ProcessExplorer};

use crate::config::Config;

/// Builds an explorer from the effective configuration.
pub fn build_explorer(config: &Config) -> Result<ProcessExplorer, Box<dyn std::error::Error>> {
    let options = config.engine_options()?;
    Ok(ProcessExplorer::procfs(
        config.proc_root(),
        config.resolve_devices.unwrap_or(true),
        options,
    ))
}

/// Runs one synchronous pass, turning a failed pass into an error.
pub fn populate(explorer: &ProcessExplorer) -> Result<(), Box<dyn std::error::Error>> {
    match explorer.engine().run_pass() {
        PassOutcome::Failed { reason } => Err(format!("Refresh pass failed: {}", reason).into()),
        PassOutcome::Completed { .. } | PassOutcome::Skipped => Ok(()),
    }
}

/// Formats bytes as human-readable string (KB, MB, GB).
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Formats CPU seconds as `h:mm:ss`.
pub fn format_cpu_time(seconds: f64) -> String {
    let total = seconds as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_format_cpu_time() {
        assert_eq!(format_cpu_time(0.4), "0:00:00");
        assert_eq!(format_cpu_time(3725.0), "1:02:05");
    }
}
