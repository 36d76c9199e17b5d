//! Check command implementation.
//!
//! Validates proc filesystem access and configuration.

use herakles_process_explorer::{ProcessExplorer, ProcessSource, ProcfsReader, SystemReader, SystemSource};

use crate::config::{validate_effective_config, Config};

use super::populate;

/// Validates system requirements and configuration.
pub fn command_check(
    explorer: &ProcessExplorer,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles Process Explorer - System Check");
    println!("==========================================");

    let mut all_ok = true;
    let root = config.proc_root();
    let reader = ProcfsReader::new(&root);

    println!("\n📁 Checking {}...", root.display());
    match reader.pids() {
        Ok(pids) if !pids.is_empty() => {
            println!("   ✅ Can enumerate {} processes", pids.len());
        }
        Ok(_) => {
            println!("   ❌ No process entries found");
            all_ok = false;
        }
        Err(e) => {
            println!("   ❌ Cannot enumerate processes: {}", e);
            all_ok = false;
        }
    }

    match SystemReader::new(&root).sample() {
        Ok(sample) => println!(
            "   ✅ System counters readable ({} CPUs, {} MB memory)",
            sample.cpu_count,
            sample.total_memory_bytes / 1024 / 1024
        ),
        Err(e) => {
            println!("   ❌ System counters unreadable: {}", e);
            all_ok = false;
        }
    }

    // only meaningful against the live proc filesystem
    let own_pid = std::process::id();
    if root.join(own_pid.to_string()).exists() {
        match reader.read_process(own_pid) {
            Ok(record) => println!("   ✅ Own process readable as '{}'", record.name),
            Err(e) => {
                println!("   ❌ Own process unreadable: {}", e);
                all_ok = false;
            }
        }
        match reader.read_descriptors(own_pid) {
            Ok(fds) => println!("   ✅ Descriptor listing works ({} open)", fds.len()),
            Err(e) => {
                println!("   ⚠️  Descriptor listing failed: {}", e);
            }
        }
    }

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    if all_ok {
        println!("\n🔄 Running one refresh pass...");
        match populate(explorer) {
            Ok(()) => {
                let snapshot = explorer.snapshot();
                println!(
                    "   ✅ Tree built with {} processes, {} top-level",
                    snapshot.len(),
                    snapshot.roots.len()
                );
                println!();
                print!("{}", explorer.stats().render_table());
            }
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
