//! Backup run: connect, fetch catalog, export each list, write the archive.
//!
//! Stages: Init -> Authenticated -> CatalogFetched -> Exporting -> Assembling -> Done, or
//! Aborted from any stage on a fatal error. Per-list failures are recorded and skipped.

use crate::archive::{self, ArchiveError};
use crate::config::ConfigError;
use crate::imdb::{ImdbError, ListSource};
use crate::model::{ExportedList, ListDescriptor, ManifestEntry};
use crate::sanitize::{self, UsedNames};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Authenticated,
    CatalogFetched,
    Exporting,
    Assembling,
    Done,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Authenticated => "authenticated",
            Stage::CatalogFetched => "catalog fetched",
            Stage::Exporting => "exporting",
            Stage::Assembling => "assembling",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Fatal outcomes. Anything not listed here is per-list and only counted as skipped.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Configuration(#[from] ConfigError),

    #[error("{0}")]
    Authentication(#[source] ImdbError),

    #[error("{0}")]
    Archive(#[from] ArchiveError),

    #[error("Interrupted after exporting {exported} of {discovered} lists; no archive was written.")]
    Cancelled { exported: usize, discovered: usize },
}

#[derive(Debug, Clone)]
pub struct BackupOptions {
    pub output: PathBuf,
    pub max_name_len: usize,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from(crate::config::DEFAULT_OUTPUT),
            max_name_len: sanitize::DEFAULT_MAX_NAME_LEN,
        }
    }
}

/// A list that was discovered but not exported, with the reason.
#[derive(Debug, Clone)]
pub struct SkippedList {
    pub descriptor: ListDescriptor,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub discovered: usize,
    /// Exported lists in catalog order.
    pub entries: Vec<ManifestEntry>,
    pub skipped: Vec<SkippedList>,
    pub output: PathBuf,
}

impl RunSummary {
    pub fn exported(&self) -> usize {
        self.entries.len()
    }
}

struct Run {
    stage: Stage,
}

impl Run {
    fn advance(&mut self, next: Stage) {
        tracing::debug!(from = %self.stage, to = %next, "stage");
        self.stage = next;
    }

    fn abort(&mut self, err: PipelineError) -> PipelineError {
        self.advance(Stage::Aborted);
        err
    }
}

/// Run a full backup. `connect` is the session step; `cancel` is checked before every export
/// and once more before the archive is written.
pub fn run<S, F>(
    connect: F,
    options: &BackupOptions,
    cancel: &AtomicBool,
) -> Result<RunSummary, PipelineError>
where
    S: ListSource,
    F: FnOnce() -> Result<S, ConfigError>,
{
    let mut run = Run { stage: Stage::Init };

    sanitize::check_max_name_len(options.max_name_len).map_err(|e| run.abort(e.into()))?;
    let mut source = connect().map_err(|e| run.abort(e.into()))?;
    run.advance(Stage::Authenticated);

    let catalog = match source.fetch_catalog() {
        Ok(lists) => lists,
        Err(e) if e.is_authentication() => {
            return Err(run.abort(PipelineError::Authentication(e)));
        }
        Err(e) => {
            tracing::warn!("Could not fetch the list catalog: {}", e);
            Vec::new()
        }
    };
    run.advance(Stage::CatalogFetched);
    tracing::info!("Found {} lists", catalog.len());

    run.advance(Stage::Exporting);
    let discovered = catalog.len();
    let mut used = UsedNames::new();
    let mut exported: Vec<ExportedList> = Vec::with_capacity(discovered);
    let mut skipped: Vec<SkippedList> = Vec::new();
    for descriptor in catalog {
        if cancel.load(Ordering::SeqCst) {
            log_summary(discovered, exported.len(), skipped.len());
            return Err(run.abort(PipelineError::Cancelled {
                exported: exported.len(),
                discovered,
            }));
        }
        tracing::info!("Downloading: {}", descriptor.display_title());
        match source.export_list(&descriptor) {
            Ok(content) => {
                let archive_name =
                    sanitize::archive_name(&descriptor, &mut used, options.max_name_len);
                tracing::info!("  -> {}.{}", archive_name, archive::CSV_EXTENSION);
                exported.push(ExportedList {
                    descriptor,
                    content,
                    archive_name,
                });
            }
            Err(e) => {
                tracing::warn!(
                    id = %descriptor.id,
                    title = %descriptor.display_title(),
                    "Skipping list: {}",
                    e
                );
                skipped.push(SkippedList {
                    descriptor,
                    reason: e.to_string(),
                });
            }
        }
    }

    if cancel.load(Ordering::SeqCst) {
        log_summary(discovered, exported.len(), skipped.len());
        return Err(run.abort(PipelineError::Cancelled {
            exported: exported.len(),
            discovered,
        }));
    }

    run.advance(Stage::Assembling);
    if let Err(e) = archive::assemble(&exported, &options.output) {
        log_summary(discovered, exported.len(), skipped.len());
        return Err(run.abort(e.into()));
    }
    run.advance(Stage::Done);

    log_summary(discovered, exported.len(), skipped.len());
    tracing::info!("Wrote {}", options.output.display());
    Ok(RunSummary {
        discovered,
        entries: exported.iter().map(ManifestEntry::from).collect(),
        skipped,
        output: options.output.clone(),
    })
}

fn log_summary(discovered: usize, exported: usize, skipped: usize) {
    tracing::info!(
        "Lists discovered: {}, exported: {}, skipped: {}",
        discovered,
        exported,
        skipped
    );
}
