//! Find command implementation.
//!
//! Searches descriptors and mapped libraries of every process.

use herakles_process_explorer::ProcessExplorer;

use super::populate;

pub fn command_find(
    explorer: &ProcessExplorer,
    text: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    populate(explorer)?;
    let results = explorer.find_handles(text);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("{:>7} {:<20} {:<10} {}", "PID", "PROCESS", "TYPE", "NAME");
    for hit in &results.matches {
        println!(
            "{:>7} {:<20} {:<10} {}",
            hit.pid,
            hit.process_name,
            hit.kind.to_string(),
            hit.name
        );
    }

    println!("\n📊 {} matches", results.matches.len());
    if !results.skipped.is_empty() {
        println!(
            "⚠️  {} processes could not be searched (permission denied)",
            results.skipped.len()
        );
    }
    Ok(())
}
