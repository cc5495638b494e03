//! Archive writer. One CSV entry per exported list plus a `titles.txt` manifest, written to a
//! temp file next to the output and renamed into place only when complete.

use crate::model::{ExportedList, ManifestEntry};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const CSV_EXTENSION: &str = "csv";
pub const MANIFEST_NAME: &str = "titles.txt";

const ENTRY_PREFIX: &str = "    ";
const CONTINUATION_MARK: &str = "| ";
const NAME_MARK: &str = "-> ";

/// Local I/O failure while building the archive. Fatal; the output path is left untouched.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create temporary archive in {dir}: {source}")]
    CreateTemp {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to write archive: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot move archive into place at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate archive entry name: {name}")]
    DuplicateEntry { name: String },
}

/// Render the manifest.
///
/// Each block is `[n] <first title line>`, then `    | <line>` for every further title line,
/// then `    -> <entry name>`. Blocks are separated by one empty line. Every entry name appears
/// on exactly one `->` line, and no title line can be mistaken for one.
pub fn render_manifest(entries: &[ManifestEntry]) -> String {
    let mut out = String::new();
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let mut lines = entry.title.split('\n').map(|l| l.trim_end_matches('\r'));
        out.push_str(&format!("[{}] {}\n", i + 1, lines.next().unwrap_or_default()));
        for line in lines {
            out.push_str(ENTRY_PREFIX);
            out.push_str(CONTINUATION_MARK);
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(ENTRY_PREFIX);
        out.push_str(NAME_MARK);
        out.push_str(&format!("{}.{}", entry.archive_name, CSV_EXTENSION));
        out.push('\n');
    }
    out
}

/// Entry names listed in a rendered manifest, in order.
pub fn manifest_entry_names(manifest: &str) -> Vec<String> {
    let marker = format!("{}{}", ENTRY_PREFIX, NAME_MARK);
    manifest
        .lines()
        .filter_map(|l| l.strip_prefix(marker.as_str()))
        .map(String::from)
        .collect()
}

/// Write `lists` (in order) and the manifest to `output`, replacing any existing file.
///
/// Entries use Deflate and the fixed zip epoch timestamp, so the same inputs produce the same
/// bytes. On error nothing is left at `output` beyond what was there before.
pub fn assemble(lists: &[ExportedList], output: &Path) -> Result<(), ArchiveError> {
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".imdb-backup-")
        .suffix(".zip.tmp")
        .tempfile_in(&dir)
        .map_err(|e| ArchiveError::CreateTemp {
            dir: dir.clone(),
            source: e,
        })?;

    write_zip(lists, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;

    tmp.persist(output).map_err(|e| ArchiveError::Persist {
        path: output.to_path_buf(),
        source: e.error,
    })?;
    tracing::debug!(path = %output.display(), entries = lists.len() + 1, "archive written");
    Ok(())
}

fn write_zip(lists: &[ExportedList], file: &mut std::fs::File) -> Result<(), ArchiveError> {
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    let mut zip = ZipWriter::new(file);
    let mut seen = std::collections::HashSet::new();
    for list in lists {
        let name = list.entry_name();
        if name == MANIFEST_NAME || !seen.insert(name.clone()) {
            return Err(ArchiveError::DuplicateEntry { name });
        }
        zip.start_file(name, options)?;
        zip.write_all(&list.content)?;
    }

    let entries: Vec<ManifestEntry> = lists.iter().map(ManifestEntry::from).collect();
    zip.start_file(MANIFEST_NAME, options)?;
    zip.write_all(render_manifest(&entries).as_bytes())?;
    zip.finish()?;
    Ok(())
}
