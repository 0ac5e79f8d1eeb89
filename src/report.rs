//! Run events and the reporter handle that turns them into log lines.
//!
//! The batch coordinator never logs per-file outcomes itself; it hands each
//! [`Event`] to the [`Reporter`] it was given. [`LogReporter`] forwards them
//! to the `log` facade, tests inject their own reporter to capture them.

use std::path::Path;

use crate::pipeline::{RunSummary, TaskResult};

/// Something observable that happened during a batch run.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// Dispatch is about to begin.
    Started { total: usize, workers: usize },
    /// One file finished, successfully or not.
    Completed(&'a TaskResult),
    /// Discovery produced nothing to do.
    NoImages,
    /// Every task has completed.
    Finished(&'a RunSummary),
}

/// Receives run events. Purely observational: it cannot influence the run.
pub trait Reporter: Send + Sync {
    fn report(&self, event: Event<'_>);
}

/// Reporter backed by the `log` facade.
///
/// Successes go out at debug level, failures and "no images" at error level,
/// start and summary at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, event: Event<'_>) {
        match event {
            Event::Started { total, workers } => {
                log::info!("Found {total} image(s), using {workers} worker(s)");
            }
            Event::Completed(result) => match &result.error {
                None => log::debug!("✓ {} → {}", file_name(&result.source), result.path.display()),
                Some(err) => log::error!("✗ {} ({err})", result.source.display()),
            },
            Event::NoImages => log::error!("No images found to process"),
            Event::Finished(summary) => {
                log::info!(
                    "Done: {} succeeded, {} failed",
                    summary.succeeded,
                    summary.failed
                );
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
