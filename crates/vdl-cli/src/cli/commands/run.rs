//! `vdl run`: download every task of a `name|url` file, printing status events.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use vdl_core::config::VdlConfig;
use vdl_core::control::Shutdown;
use vdl_core::orchestrator::Orchestrator;
use vdl_core::resolver::{CommandResolver, DirectResolver, Resolver};
use vdl_core::task::{SourceTask, TaskEvent, TaskEventKind};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
/// How long in-flight work gets to notice Ctrl-C before we exit anyway.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Parse `name|url` lines. Blank lines and `#` comments are skipped.
pub fn parse_tasks(text: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, url)) = line.split_once('|') else {
            bail!("line {}: expected `name|url`, got {:?}", i + 1, line);
        };
        let (name, url) = (name.trim(), url.trim());
        if name.is_empty() || url.is_empty() {
            bail!("line {}: name and url must both be set", i + 1);
        }
        out.push((name.to_string(), url.to_string()));
    }
    Ok(out)
}

pub async fn run_tasks_file(cfg: VdlConfig, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let tasks = parse_tasks(&text)?;
    if tasks.is_empty() {
        println!("No tasks in {}.", path.display());
        return Ok(());
    }
    run_tasks(cfg, tasks).await
}

fn build_resolver(cfg: &VdlConfig) -> Arc<dyn Resolver> {
    match cfg.resolver.command.as_deref().and_then(CommandResolver::new) {
        Some(cmd) => Arc::new(cmd),
        None => Arc::new(DirectResolver),
    }
}

pub(super) async fn run_tasks(cfg: VdlConfig, tasks: Vec<(String, String)>) -> Result<()> {
    let shutdown = Shutdown::new();
    let resolver = build_resolver(&cfg);
    let orch = Orchestrator::new(cfg, resolver, &shutdown)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let sources: Vec<SourceTask> = tasks
        .into_iter()
        .map(|(name, url)| SourceTask::new(name, url, Some(tx.clone())))
        .collect();
    drop(tx);
    println!("Processing {} task(s)...", sources.len());

    let limiter = Arc::clone(orch.limiter());
    let printer = tokio::spawn(print_events(rx, move || limiter.current_rate()));

    let summary = tokio::select! {
        res = orch.run(sources) => res?,
        _ = tokio::signal::ctrl_c() => {
            println!("\nInterrupted, stopping...");
            if !shutdown.shutdown_within(SHUTDOWN_GRACE).await {
                tracing::warn!("some tasks did not stop within {:?}", SHUTDOWN_GRACE);
            }
            bail!("interrupted");
        }
    };
    drop(orch);
    if !shutdown.shutdown_within(SHUTDOWN_GRACE).await {
        tracing::warn!("some workers did not stop within {:?}", SHUTDOWN_GRACE);
    }
    let _ = printer.await;

    println!(
        "Done: {} completed, {} failed.",
        summary.completed.len(),
        summary.failed.len()
    );
    for (name, err) in &summary.failed {
        println!("  {}: {}", name, err);
    }
    if !summary.is_success() {
        bail!("{} task(s) failed", summary.failed.len());
    }
    Ok(())
}

async fn print_events<F>(mut rx: mpsc::UnboundedReceiver<TaskEvent>, rate: F)
where
    F: Fn() -> String,
{
    let mut last_print: HashMap<u64, Instant> = HashMap::new();
    while let Some(ev) = rx.recv().await {
        match ev.kind {
            TaskEventKind::Status { status, hint } => {
                println!("[{}] {}: {}", ev.name, status, hint);
            }
            TaskEventKind::Progress(p) => {
                let now = Instant::now();
                let due = last_print
                    .get(&ev.id)
                    .map_or(true, |t| now.duration_since(*t) >= PROGRESS_INTERVAL);
                if !due && p.current < p.total {
                    continue;
                }
                last_print.insert(ev.id, now);
                let part = if p.total_tasks > 1 {
                    format!(" stream {}/{}", p.current_task, p.total_tasks)
                } else {
                    String::new()
                };
                let size = if p.total_bytes > 0 {
                    format!(
                        " {:.1}/{:.1} MiB",
                        p.current_bytes as f64 / 1_048_576.0,
                        p.total_bytes as f64 / 1_048_576.0
                    )
                } else {
                    String::new()
                };
                println!(
                    "[{}]{} {:.1}% ({}/{}){}  {}",
                    ev.name,
                    part,
                    p.fraction() * 100.0,
                    p.current,
                    p.total,
                    size,
                    rate()
                );
            }
            TaskEventKind::Completed { path } => println!("[{}] saved {}", ev.name, path.display()),
            TaskEventKind::Failed { error } => println!("[{}] failed: {}", ev.name, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_url_lines() {
        let text = "# shows\n\nEp 1|https://site/v/1\n  Ep 2 | https://site/v/2  \n";
        let tasks = parse_tasks(text).unwrap();
        assert_eq!(
            tasks,
            vec![
                ("Ep 1".to_string(), "https://site/v/1".to_string()),
                ("Ep 2".to_string(), "https://site/v/2".to_string()),
            ]
        );
    }

    #[test]
    fn url_may_contain_pipes() {
        let tasks = parse_tasks("clip|https://a/x?q=a|b").unwrap();
        assert_eq!(tasks[0].1, "https://a/x?q=a|b");
    }

    #[test]
    fn rejects_malformed_lines() {
        let err = parse_tasks("ok|https://a\nbroken line\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
        assert!(parse_tasks("|https://a").is_err());
    }
}
