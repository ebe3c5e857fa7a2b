use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::error::{Result, ZipError};

use super::decode::decode_payload;
use super::parser::{
    classify_encryption, locate_eocd, read_central_directory, resolve_local_header,
};
use super::structures::{CentralDirectoryEntry, EndOfCentralDirectory, ExtractionTarget};
use super::writer::{sanitize_entry_path, write_entry};

/// What to do when an extracted file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    #[default]
    Always,
    Never,
}

/// Whether one failed entry stops a whole-archive extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop submitting entries, write nothing past the first failure and
    /// return it.
    #[default]
    Abort,
    /// Extract everything possible and report failures per entry.
    Continue,
}

/// Extraction settings.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub password: Option<Vec<u8>>,
    pub overwrite: OverwritePolicy,
    /// Drop directory components and skip directory entries.
    pub junk_paths: bool,
    pub error_policy: ErrorPolicy,
    /// Maximum number of entries processed at once.
    pub jobs: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            password: None,
            overwrite: OverwritePolicy::default(),
            junk_paths: false,
            error_policy: ErrorPolicy::default(),
            jobs: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

impl ExtractOptions {
    pub fn password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn overwrite(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn junk_paths(mut self, junk_paths: bool) -> Self {
        self.junk_paths = junk_paths;
        self
    }

    pub fn error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// The path an entry is written to, relative to the output root.
    fn output_name<'e>(&self, entry: &'e CentralDirectoryEntry) -> &'e str {
        if self.junk_paths {
            entry
                .name
                .rsplit('/')
                .find(|s| !s.is_empty())
                .unwrap_or(&entry.name)
        } else {
            &entry.name
        }
    }
}

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Extracted(PathBuf),
    CreatedDirectory(PathBuf),
    /// The destination existed and [`OverwritePolicy::Never`] was set.
    SkippedExisting(PathBuf),
    /// A directory entry under `junk_paths`.
    SkippedDirectory,
}

#[derive(Debug)]
pub struct EntryReport {
    pub index: usize,
    pub name: String,
    pub result: Result<EntryOutcome>,
}

/// Per-entry results of a whole-archive extraction, in submission order.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub entries: Vec<EntryReport>,
}

impl ExtractReport {
    pub fn extracted(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.result, Ok(EntryOutcome::Extracted(_))))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries.iter().filter(|e| e.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Add a finished task's entry; tasks stopped by an earlier failure have none.
    fn record(
        &mut self,
        joined: std::result::Result<Option<EntryReport>, JoinError>,
    ) -> Result<()> {
        if let Some(entry) = joined.map_err(join_error)? {
            self.entries.push(entry);
        }
        Ok(())
    }
}

/// ZIP file extractor
///
/// Owns the archive bytes and the parsed Central Directory. Both are
/// immutable once constructed and shared read-only with every worker.
pub struct ZipExtractor {
    archive: Arc<[u8]>,
    eocd: EndOfCentralDirectory,
    entries: Vec<CentralDirectoryEntry>,
    options: Arc<ExtractOptions>,
}

impl ZipExtractor {
    /// Parse the EOCD and Central Directory of `archive`.
    pub fn new(archive: impl Into<Arc<[u8]>>) -> Result<Self> {
        let archive = archive.into();
        let eocd = locate_eocd(&archive)?;
        let entries = read_central_directory(&archive, &eocd)?;
        debug!(entries = entries.len(), "read central directory");

        Ok(Self {
            archive,
            eocd,
            entries,
            options: Arc::new(ExtractOptions::default()),
        })
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn end_of_central_directory(&self) -> &EndOfCentralDirectory {
        &self.eocd
    }

    /// List all entries in the archive
    pub fn entries(&self) -> &[CentralDirectoryEntry] {
        &self.entries
    }

    /// Extract file data to memory
    pub fn extract_to_memory(&self, entry: &CentralDirectoryEntry) -> Result<Vec<u8>> {
        decode_entry(&self.archive, entry, self.options.password.as_deref())
    }

    /// Decode `entry` into the unit the writer consumes.
    pub fn prepare(&self, entry: &CentralDirectoryEntry) -> Result<ExtractionTarget> {
        let relative_path = self.options.output_name(entry);
        prepare_target(&self.archive, entry, relative_path, &self.options)
    }

    /// Extract a single entry under `output_root`.
    pub async fn extract_entry(
        &self,
        entry: &CentralDirectoryEntry,
        output_root: &Path,
    ) -> Result<EntryOutcome> {
        let staged = stage_entry(
            self.archive.clone(),
            self.options.clone(),
            entry.clone(),
            output_root,
        )
        .await;
        commit_entry(output_root, staged).await
    }

    /// Extract every entry of the archive under `output_root`.
    pub async fn extract_all(&self, output_root: &Path) -> Result<ExtractReport> {
        let entries = self.entries.clone();
        self.extract_entries(output_root, entries).await
    }

    /// Extract `entries` under `output_root`, at most `jobs` at a time.
    ///
    /// With [`ErrorPolicy::Abort`] the first failure stops new submissions.
    /// Entries are still decoded in parallel but written in order, so
    /// everything before the failing entry is on disk and nothing after it
    /// is. With [`ErrorPolicy::Continue`] every failure is recorded in the
    /// report.
    pub async fn extract_entries(
        &self,
        output_root: &Path,
        entries: Vec<CentralDirectoryEntry>,
    ) -> Result<ExtractReport> {
        let jobs = self.options.jobs.max(1);
        let abort = self.options.error_policy == ErrorPolicy::Abort;
        let order = abort.then(|| Arc::new(CommitOrder::new()));

        let mut tasks = JoinSet::new();
        let mut report = ExtractReport::default();

        for (index, entry) in entries.into_iter().enumerate() {
            while let Some(joined) = tasks.try_join_next() {
                report.record(joined)?;
            }
            while tasks.len() >= jobs {
                if let Some(joined) = tasks.join_next().await {
                    report.record(joined)?;
                }
            }
            if abort && !report.is_success() {
                debug!(submitted = index, "stopping after a failed entry");
                break;
            }

            let archive = self.archive.clone();
            let options = self.options.clone();
            let output_root = output_root.to_path_buf();
            let order = order.clone();
            tasks.spawn(async move {
                let name = entry.name.clone();
                let staged = stage_entry(archive, options, entry, &output_root).await;

                let result = match order {
                    None => commit_entry(&output_root, staged).await,
                    Some(order) => {
                        if !order.wait_turn(index).await {
                            return None;
                        }
                        let result = commit_entry(&output_root, staged).await;
                        order.finish(result.is_err());
                        result
                    }
                };
                Some(EntryReport {
                    index,
                    name,
                    result,
                })
            });
        }

        while let Some(joined) = tasks.join_next().await {
            report.record(joined)?;
        }
        report.entries.sort_by_key(|e| e.index);

        for failed in report.failures() {
            if let Err(err) = &failed.result {
                warn!(
                    entry = %failed.name,
                    error = %err,
                    "failed to extract entry"
                );
            }
        }

        if abort {
            let first_failure = report.entries.iter().position(|e| e.result.is_err());
            if let Some(err) =
                first_failure.and_then(|pos| report.entries.swap_remove(pos).result.err())
            {
                return Err(err);
            }
        }

        info!(
            extracted = report.extracted(),
            total = report.entries.len(),
            "extraction finished"
        );
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CommitState {
    next: usize,
    failed: bool,
}

/// Hands out write turns in submission order until an entry fails.
struct CommitOrder {
    state: watch::Sender<CommitState>,
}

impl CommitOrder {
    fn new() -> Self {
        let (state, _) = watch::channel(CommitState::default());
        Self { state }
    }

    /// Wait until every earlier entry is done. False once one of them failed.
    async fn wait_turn(&self, index: usize) -> bool {
        let mut turn = self.state.subscribe();
        turn.wait_for(|state| state.next == index || state.failed)
            .await
            .map(|state| !state.failed)
            .unwrap_or(false)
    }

    fn finish(&self, failed: bool) {
        self.state.send_modify(|state| {
            state.next += 1;
            state.failed |= failed;
        });
    }
}

fn join_error(err: JoinError) -> ZipError {
    if err.is_panic() {
        std::panic::resume_unwind(err.into_panic());
    }
    ZipError::Io(std::io::Error::other(err))
}

/// Resolve, classify and decode one entry.
fn decode_entry(
    archive: &[u8],
    entry: &CentralDirectoryEntry,
    password: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let header = resolve_local_header(archive, entry)?;
    let encryption = classify_encryption(entry);
    decode_payload(archive, &header, entry, encryption, password)
}

fn prepare_target(
    archive: &[u8],
    entry: &CentralDirectoryEntry,
    relative_path: &str,
    options: &ExtractOptions,
) -> Result<ExtractionTarget> {
    if entry.is_directory() {
        return Ok(ExtractionTarget::directory(relative_path));
    }
    let contents = decode_entry(archive, entry, options.password.as_deref())?;
    Ok(ExtractionTarget::file(relative_path, contents))
}

/// An entry that went through every check and is ready for the writer.
enum Staged {
    Settled(EntryOutcome),
    Write(ExtractionTarget),
}

/// Path check, overwrite check and decoding on the blocking pool.
async fn stage_entry(
    archive: Arc<[u8]>,
    options: Arc<ExtractOptions>,
    entry: CentralDirectoryEntry,
    output_root: &Path,
) -> Result<Staged> {
    if entry.is_directory() && options.junk_paths {
        return Ok(Staged::Settled(EntryOutcome::SkippedDirectory));
    }

    // reject unsafe names before spending any work on them
    let destination = output_root.join(sanitize_entry_path(options.output_name(&entry))?);
    if !entry.is_directory()
        && options.overwrite == OverwritePolicy::Never
        && fs::try_exists(&destination).await?
    {
        debug!(path = %destination.display(), "skipping existing file");
        return Ok(Staged::Settled(EntryOutcome::SkippedExisting(destination)));
    }

    let target = tokio::task::spawn_blocking(move || {
        prepare_target(&archive, &entry, options.output_name(&entry), &options)
    })
    .await
    .map_err(join_error)??;

    Ok(Staged::Write(target))
}

async fn commit_entry(output_root: &Path, staged: Result<Staged>) -> Result<EntryOutcome> {
    let target = match staged? {
        Staged::Settled(outcome) => return Ok(outcome),
        Staged::Write(target) => target,
    };

    let written = write_entry(output_root, &target).await?;
    Ok(if target.is_directory() {
        EntryOutcome::CreatedDirectory(written)
    } else {
        EntryOutcome::Extracted(written)
    })
}
