use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use walkdir::WalkDir;

use crate::config::{MetadataRecord, RunOptions};
use crate::metadata::{FormatWriter, ImageBackend, TaskError};
use crate::report::{Event, Reporter};

/// Supported image extensions (matched case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];

/// Expand files and directories into the set of candidate images.
///
/// Files are kept when their extension is one of [`IMAGE_EXTENSIONS`].
/// Directories contribute their direct children, or their whole tree when
/// `recursive` is set. Anything that is neither a file nor a directory is
/// skipped with a warning. The extension check is the only filter; whether
/// a file really is an image is decided later, when it is decoded.
///
/// # Example
///
/// ```rust,no_run
/// use seo_meta::pipeline::discover;
/// use std::path::PathBuf;
///
/// let images = discover(&[
///     PathBuf::from("cover.jpg"),  // single file
///     PathBuf::from("./photos/"),  // directory
/// ], true);
/// println!("Found {} images", images.len());
/// ```
pub fn discover(inputs: &[PathBuf], recursive: bool) -> BTreeSet<PathBuf> {
    let mut images = BTreeSet::new();

    for path in inputs {
        if path.is_file() {
            if is_supported_image(path) {
                images.insert(path.clone());
            } else {
                log::debug!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            let walker = WalkDir::new(path)
                .min_depth(1)
                .max_depth(if recursive { usize::MAX } else { 1 })
                .follow_links(true);
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::debug!("Skipping unreadable entry under {}: {e}", path.display());
                        continue;
                    }
                };
                let p = entry.path();
                if p.is_file() && is_supported_image(p) {
                    images.insert(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Ignoring invalid path: {}", path.display());
        }
    }

    images
}

/// Check if a file has a supported image extension.
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// One file to process, with the run-wide record and options it shares.
#[derive(Debug, Clone)]
pub struct ImageTask {
    pub source: PathBuf,
    pub record: Arc<MetadataRecord>,
    pub options: Arc<RunOptions>,
}

impl ImageTask {
    pub fn execute(self, writer: &FormatWriter) -> TaskResult {
        match writer.write(&self.source, &self.record, &self.options) {
            Ok(path) => TaskResult::success(self.source, path),
            Err(err) => TaskResult::failure(self.source, err),
        }
    }
}

/// The outcome of one [`ImageTask`].
///
/// `path` is the written file on success and the source on failure.
#[derive(Debug)]
pub struct TaskResult {
    pub source: PathBuf,
    pub path: PathBuf,
    pub error: Option<TaskError>,
}

impl TaskResult {
    pub fn success(source: PathBuf, path: PathBuf) -> Self {
        Self { source, path, error: None }
    }

    pub fn failure(source: PathBuf, error: TaskError) -> Self {
        Self { path: source.clone(), source, error: Some(error) }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Final tally of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    fn record(&mut self, result: &TaskResult) {
        if result.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Write `record` into every file of `files` on a bounded worker pool.
///
/// At most `options.workers` (minimum 1) files are processed at once, each on
/// a blocking thread. Results are consumed here, one at a time, as they
/// complete: every task is counted exactly once and forwarded to `reporter`.
/// A failing or panicking task only fails itself. Returns once every task
/// has finished.
///
/// An empty `files` reports [`Event::NoImages`] and returns a zero summary
/// without starting any worker.
///
/// # Example
///
/// ```rust,no_run
/// use seo_meta::config::{MetadataRecord, RunOptions};
/// use seo_meta::metadata::RustBackend;
/// use seo_meta::pipeline::{discover, run};
/// use seo_meta::report::LogReporter;
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let record = MetadataRecord::new("Ada", "© Ada", "Lake", "A calm lake", vec!["lake".into()])?;
/// let files = discover(&[PathBuf::from("./photos")], true);
///
/// let summary = run(
///     files,
///     record,
///     RunOptions::default(),
///     Arc::new(RustBackend::new()),
///     &LogReporter,
/// )
/// .await;
/// println!("{} ok, {} failed", summary.succeeded, summary.failed);
/// # Ok(())
/// # }
/// ```
pub async fn run(
    files: impl IntoIterator<Item = PathBuf>,
    record: MetadataRecord,
    options: RunOptions,
    backend: Arc<dyn ImageBackend>,
    reporter: &dyn Reporter,
) -> RunSummary {
    let files: Vec<PathBuf> = files.into_iter().collect();
    let mut summary = RunSummary::default();

    if files.is_empty() {
        reporter.report(Event::NoImages);
        return summary;
    }

    let workers = options.workers.max(1);
    reporter.report(Event::Started { total: files.len(), workers });

    let writer = FormatWriter::new(backend);
    let record = Arc::new(record);
    let options = Arc::new(options);
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut set = JoinSet::new();
    let mut sources: HashMap<Id, PathBuf> = HashMap::new();

    for source in files {
        let task = ImageTask {
            source: source.clone(),
            record: Arc::clone(&record),
            options: Arc::clone(&options),
        };
        let writer = writer.clone();
        let semaphore = Arc::clone(&semaphore);

        let handle = set.spawn(async move {
            let source = task.source.clone();
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return TaskResult::failure(source, TaskError::Aborted("worker pool closed".into()));
            };
            log::debug!("Processing {}", source.display());

            match tokio::task::spawn_blocking(move || task.execute(&writer)).await {
                Ok(result) => result,
                Err(e) => TaskResult::failure(source, TaskError::Aborted(e.to_string())),
            }
        });
        sources.insert(handle.id(), source);
    }

    while let Some(joined) = set.join_next_with_id().await {
        let result = settle(joined, &mut sources);
        summary.record(&result);
        reporter.report(Event::Completed(&result));
    }

    reporter.report(Event::Finished(&summary));
    summary
}

/// Turn one joined dispatch wrapper into its result. A wrapper that died is
/// mapped back to its source through `sources`.
fn settle(
    joined: Result<(Id, TaskResult), JoinError>,
    sources: &mut HashMap<Id, PathBuf>,
) -> TaskResult {
    match joined {
        Ok((id, result)) => {
            sources.remove(&id);
            result
        }
        Err(e) => {
            let source = sources.remove(&e.id()).unwrap_or_default();
            TaskResult::failure(source, TaskError::Aborted(e.to_string()))
        }
    }
}
