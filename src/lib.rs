//! imdb-backup: export IMDb ratings, watchlist and custom lists into one zip of CSV files.

pub mod archive;
pub mod cli;
pub mod config;
pub mod imdb;
pub mod model;
pub mod pipeline;
pub mod sanitize;

// Re-exports for CLI and consumers.
pub use archive::{assemble, render_manifest, ArchiveError, MANIFEST_NAME};
pub use config::ConfigError;
pub use imdb::{Credentials, Endpoints, ImdbError, ImdbSession, ListSource, SessionSettings};
pub use model::{ExportedList, ListDescriptor, ListKind, ManifestEntry};
pub use pipeline::{run, BackupOptions, PipelineError, RunSummary, SkippedList, Stage};
pub use sanitize::{sanitize, UsedNames};
