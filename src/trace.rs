//! Diagnostic trace collector.
//!
//! While a sweep runs, a background thread rewrites a small HTML page describing
//! where the sweep is: state, trials done, the trial in flight and how long it has
//! been running. Point a browser at it to see whether a long read is stuck.
//!
//! The collector never touches the sweep itself. Report write failures are logged
//! and otherwise ignored.

use crate::error::AppResult;
use crate::report::TrialResult;
use crate::sweep::{SharedProgress, SweepProgress};
use chrono::Local;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::PoisonError;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// Running collector. Stops on [`TraceCollector::stop`] or drop.
pub struct TraceCollector {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    path: PathBuf,
}

impl TraceCollector {
    /// Start rewriting `path` every `interval` from `progress`.
    pub fn start(path: PathBuf, interval: Duration, progress: SharedProgress) -> AppResult<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread_path = path.clone();
        let handle = std::thread::Builder::new()
            .name("trace-collector".into())
            .spawn(move || loop {
                let stopping = match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => false,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
                };
                let snapshot = progress
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                write_report(&thread_path, &snapshot);
                if stopping {
                    break;
                }
            })?;
        debug!(path = %path.display(), ?interval, "Trace collector started");
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            path,
        })
    }

    /// Write a final report and join the collector thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Trace collector thread panicked");
            }
            debug!(path = %self.path.display(), "Trace collector stopped");
        }
    }
}

impl Drop for TraceCollector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn write_report(path: &Path, progress: &SweepProgress) {
    if let Err(e) = std::fs::write(path, render(progress)) {
        warn!(path = %path.display(), error = %e, "Failed to write trace report");
    }
}

/// Render `progress` as a standalone HTML page.
pub fn render(progress: &SweepProgress) -> String {
    let now = Local::now();
    let running = now.signed_duration_since(progress.started);
    let current = match &progress.current {
        Some(t) => format!(
            "{} channels, {:.1} h, nproc {}",
            t.n_channels,
            TrialResult::hours_between(t.start, t.end),
            t.nproc
        ),
        None => "none".to_string(),
    };

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
    html.push_str("<title>get-data trace</title></head><body>\n<pre>\n");
    let _ = writeln!(html, "state:     {}", progress.state);
    let _ = writeln!(
        html,
        "trials:    {} / {}",
        progress.trials_completed, progress.trials_planned
    );
    let _ = writeln!(html, "current:   {current}");
    let _ = writeln!(html, "started:   {}", progress.started.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(html, "running:   {}s", running.num_seconds());
    let _ = writeln!(html, "updated:   {}", now.format("%Y-%m-%d %H:%M:%S"));
    html.push_str("</pre>\n</body></html>\n");
    html
}
