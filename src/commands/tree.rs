//! Tree command implementation.
//!
//! Builds the tree once and prints the hierarchy.

use herakles_process_explorer::{ProcessExplorer, TreeSnapshot};

use super::{format_bytes, populate};

/// Prints the process tree once.
pub fn command_tree(explorer: &ProcessExplorer, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    populate(explorer)?;
    let snapshot = explorer.snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        return Ok(());
    }

    print!("{}", render_tree(&snapshot));
    Ok(())
}

/// Renders the snapshot as an indented table in display order.
pub fn render_tree(snapshot: &TreeSnapshot) -> String {
    let mut out = format!(
        "{:>7} {:<12} {:<10} {:>6} {:>6} {:>10}  {}\n",
        "PID", "USER", "STATE", "CPU%", "MEM%", "RSS", "NAME"
    );

    for (depth, node) in snapshot.walk() {
        let info = &node.info;
        let branch = if depth == 0 {
            String::new()
        } else {
            format!("{}└─ ", "   ".repeat(depth - 1))
        };
        let marker = if info.stale { " (stale)" } else { "" };
        out.push_str(&format!(
            "{:>7} {:<12} {:<10} {:>6.1} {:>6.1} {:>10}  {}{}{}\n",
            info.pid,
            truncate(info.owner_name(), 12),
            info.state.as_str(),
            info.cpu_percent,
            info.memory_percent,
            format_bytes(info.rss_bytes),
            branch,
            info.name,
            marker
        ));
    }
    out
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        s.chars().take(width - 1).chain(std::iter::once('+')).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("root", 12), "root");
        assert_eq!(truncate("systemd-resolve", 12), "systemd-res+");
    }

    #[test]
    fn test_render_empty_tree_has_header_only() {
        let rendered = render_tree(&TreeSnapshot::empty());
        assert_eq!(rendered.lines().count(), 1);
        assert!(rendered.contains("PID"));
    }
}
