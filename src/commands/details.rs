//! Per-process detail commands: descriptors, memory maps and threads.
//!
//! These read straight from the process source; no refresh pass is needed.

use herakles_process_explorer::ProcessExplorer;

use super::{format_bytes, format_cpu_time};

pub fn command_fds(explorer: &ProcessExplorer, pid: u32) -> Result<(), Box<dyn std::error::Error>> {
    let descriptors = explorer.descriptors(pid)?;

    println!("{:>5} {:<10} {}", "FD", "TYPE", "TARGET");
    for d in &descriptors {
        println!("{:>5} {:<10} {}", d.fd, d.kind.as_str(), d.target);
    }
    println!("\n📊 {} open descriptors", descriptors.len());
    Ok(())
}

pub fn command_maps(
    explorer: &ProcessExplorer,
    pid: u32,
    raw: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !raw {
        let libraries = explorer.mapped_libraries(pid)?;
        for lib in &libraries {
            println!("{}", lib);
        }
        println!("\n📊 {} mapped files", libraries.len());
        return Ok(());
    }

    let regions = explorer.memory_maps(pid)?;
    println!(
        "{:<25} {:<5} {:>10} {:<10} {:>10} {:>10}  {}",
        "ADDRESS", "PERM", "OFFSET", "DEVICE", "INODE", "SIZE", "PATH"
    );
    for r in &regions {
        println!(
            "{:<25} {:<5} {:>10x} {:<10} {:>10} {:>10}  {}",
            format!("{:x}-{:x}", r.start, r.end),
            r.permissions,
            r.offset,
            r.device,
            r.inode,
            format_bytes(r.end.saturating_sub(r.start)),
            r.path.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub fn command_threads(
    explorer: &ProcessExplorer,
    pid: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let threads = explorer.threads(pid)?;
    if let Some(main) = threads.first() {
        println!("🧵 {} ({})", main.name, main.command_line());
    }

    println!(
        "{:>7} {:<10} {:>5} {:>5} {:>10}  {}",
        "TID", "STATE", "PRIO", "NICE", "TIME", "NAME"
    );
    for t in &threads {
        println!(
            "{:>7} {:<10} {:>5} {:>5} {:>10}  {}",
            t.tid.unwrap_or(t.pid),
            t.state.as_str(),
            t.priority,
            t.nice,
            format_cpu_time(t.cpu_time_seconds()),
            t.short_name
        );
    }
    println!("\n📊 {} threads", threads.len());
    Ok(())
}
