//! Data model shared by the catalog fetcher, exporter, sanitizer and archive writer.

use serde::Serialize;

/// Which kind of list a descriptor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    Watchlist,
    Ratings,
    Custom,
}

impl ListKind {
    /// Fixed archive name for built-in lists. Custom lists have none.
    pub fn reserved_name(self) -> Option<&'static str> {
        match self {
            ListKind::Watchlist => Some("watchlist"),
            ListKind::Ratings => Some("ratings"),
            ListKind::Custom => None,
        }
    }

    pub fn is_builtin(self) -> bool {
        self != ListKind::Custom
    }
}

/// One list as discovered on the site.
///
/// `id` is an `ls...` list id, or the reserved token `ratings`. `title` is the text shown on
/// the page, unnormalized (may contain line breaks and any script).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListDescriptor {
    pub id: String,
    pub title: String,
    pub kind: ListKind,
}

impl ListDescriptor {
    pub fn custom(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: ListKind::Custom,
        }
    }

    /// Title on a single line, for log output.
    pub fn display_title(&self) -> String {
        self.title
            .split(['\r', '\n'])
            .filter(|s| !s.trim().is_empty())
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A successfully downloaded list, ready for the archive.
#[derive(Debug, Clone)]
pub struct ExportedList {
    pub descriptor: ListDescriptor,
    /// Raw CSV bytes exactly as served.
    pub content: Vec<u8>,
    /// Unique, filesystem-safe name without extension.
    pub archive_name: String,
}

impl ExportedList {
    pub fn entry_name(&self) -> String {
        format!("{}.{}", self.archive_name, crate::archive::CSV_EXTENSION)
    }
}

/// One manifest line: sanitized name back to the original title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub archive_name: String,
    pub title: String,
}

impl From<&ExportedList> for ManifestEntry {
    fn from(list: &ExportedList) -> Self {
        Self {
            archive_name: list.archive_name.clone(),
            title: list.descriptor.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_names_only_for_builtins() {
        assert_eq!(ListKind::Watchlist.reserved_name(), Some("watchlist"));
        assert_eq!(ListKind::Ratings.reserved_name(), Some("ratings"));
        assert_eq!(ListKind::Custom.reserved_name(), None);
        assert!(ListKind::Ratings.is_builtin());
        assert!(!ListKind::Custom.is_builtin());
    }

    #[test]
    fn display_title_joins_lines() {
        let d = ListDescriptor::custom("ls000000001", "Part One\n   Part Two\r\n");
        assert_eq!(d.display_title(), "Part One Part Two");
    }

    #[test]
    fn descriptor_serializes_kind_snake_case() -> Result<(), serde_json::Error> {
        let d = ListDescriptor {
            id: "ratings".to_string(),
            title: "Ratings".to_string(),
            kind: ListKind::Ratings,
        };
        let json = serde_json::to_string(&d)?;
        assert!(json.contains("\"kind\":\"ratings\""));
        Ok(())
    }

    #[test]
    fn manifest_entry_from_exported_list() {
        let list = ExportedList {
            descriptor: ListDescriptor::custom("ls000000002", "Horror\nClassics"),
            content: b"Const,Title\n".to_vec(),
            archive_name: "horror-classics".to_string(),
        };
        let entry = ManifestEntry::from(&list);
        assert_eq!(entry.archive_name, "horror-classics");
        assert_eq!(entry.title, "Horror\nClassics");
        assert_eq!(list.entry_name(), "horror-classics.csv");
    }
}
