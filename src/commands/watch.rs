//! Watch command implementation.
//!
//! Runs the background sampler and prints one line per change event.

use herakles_process_explorer::{ChangeEvent, ProcessExplorer};
use tokio::sync::{broadcast::error::RecvError, oneshot};
use tracing::{info, warn};

/// Samples until interrupted or until `passes` passes completed.
pub async fn command_watch(
    explorer: &ProcessExplorer,
    passes: Option<u64>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut events = explorer.change_events();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let engine = explorer.engine().clone();
    let sampler = tokio::spawn(engine.run(async move {
        let _ = stop_rx.await;
    }));

    let mut completed = 0u64;
    loop {
        let received = tokio::select! {
            received = events.recv() => received,
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT (Ctrl+C), stopping watch...");
                break;
            }
        };
        let event = match received {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                warn!("Missed {} change events, resynchronising from snapshot", missed);
                let snapshot = explorer.snapshot();
                println!(
                    "resync generation={} live={}",
                    snapshot.generation,
                    snapshot.len()
                );
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            println!("{}", describe(&event));
        }

        if matches!(event, ChangeEvent::Pass(_)) {
            completed += 1;
            if passes.is_some_and(|limit| completed >= limit) {
                break;
            }
        }
    }

    let _ = stop_tx.send(());
    sampler.await?;

    eprint!("{}", explorer.stats().render_table());
    Ok(())
}

/// One-line human description of an event.
pub fn describe(event: &ChangeEvent) -> String {
    match event {
        ChangeEvent::Pass(summary) => {
            let added: Vec<String> = summary.added.iter().map(|l| l.pid.to_string()).collect();
            let removed: Vec<String> = summary.removed.iter().map(|p| p.to_string()).collect();
            let mut line = format!(
                "pass {:>5}  live={:<5} +{} -{} ~{} stale={} ({:.1} ms)",
                summary.generation,
                summary.live,
                summary.added.len(),
                summary.removed.len(),
                summary.reparented.len(),
                summary.stale.len(),
                summary.duration_ms
            );
            if !added.is_empty() {
                line.push_str(&format!("  added=[{}]", added.join(",")));
            }
            if !removed.is_empty() {
                line.push_str(&format!("  removed=[{}]", removed.join(",")));
            }
            line
        }
        ChangeEvent::PassFailed { generation, reason } => {
            format!("pass {:>5}  FAILED: {}", generation, reason)
        }
        ChangeEvent::Resorted { generation } => format!("pass {:>5}  resorted", generation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_process_explorer::{NodeLink, PassSummary};

    #[test]
    fn test_describe_pass() {
        let event = ChangeEvent::Pass(PassSummary {
            generation: 3,
            added: vec![NodeLink {
                pid: 42,
                parent: Some(1),
            }],
            removed: vec![7, 8],
            live: 120,
            metrics_updated: true,
            ..PassSummary::default()
        });
        let line = describe(&event);
        assert!(line.contains("live=120"));
        assert!(line.contains("+1 -2"));
        assert!(line.contains("added=[42]"));
        assert!(line.contains("removed=[7,8]"));
    }

    #[test]
    fn test_describe_failure() {
        let event = ChangeEvent::PassFailed {
            generation: 9,
            reason: "stat unreadable".into(),
        };
        assert!(describe(&event).contains("FAILED: stat unreadable"));
    }
}
