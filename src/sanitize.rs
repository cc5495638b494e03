//! Turns list titles into unique, filesystem-safe archive entry names.
//!
//! Titles are transliterated to ASCII, slugified, truncated, and then disambiguated against the
//! names already handed out in this run. Built-in lists never go through the title path; they
//! get their reserved names, which are pre-registered so no custom list can claim them.

use crate::config::ConfigError;
use crate::model::{ListDescriptor, ListKind};
use std::collections::BTreeSet;

/// Default maximum archive name length (without extension).
pub const DEFAULT_MAX_NAME_LEN: usize = 80;
/// Smallest accepted maximum; leaves room for a numeric suffix.
pub const MIN_MAX_NAME_LEN: usize = 16;
/// Name used when a title has nothing left after transliteration.
const FALLBACK_NAME: &str = "list";
const SEPARATOR: char = '-';

/// Names already assigned in one run. A fresh set starts with the reserved built-in names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsedNames {
    names: BTreeSet<String>,
}

impl Default for UsedNames {
    fn default() -> Self {
        Self::new()
    }
}

impl UsedNames {
    pub fn new() -> Self {
        let names = [ListKind::Watchlist, ListKind::Ratings]
            .iter()
            .filter_map(|k| k.reserved_name())
            .map(String::from)
            .collect();
        Self { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn insert(&mut self, name: String) {
        self.names.insert(name);
    }
}

/// Reject a configured maximum too small to hold a name plus its collision suffix.
pub fn check_max_name_len(max_len: usize) -> Result<usize, ConfigError> {
    if max_len < MIN_MAX_NAME_LEN {
        return Err(ConfigError::InvalidSetting {
            key: "max_name_len".to_string(),
            reason: format!("{} is below the minimum of {}", max_len, MIN_MAX_NAME_LEN),
        });
    }
    Ok(max_len)
}

/// Archive name for a descriptor: reserved name for built-ins, sanitized title otherwise.
pub fn archive_name(descriptor: &ListDescriptor, used: &mut UsedNames, max_len: usize) -> String {
    match descriptor.kind.reserved_name() {
        Some(reserved) => {
            used.insert(reserved.to_string());
            reserved.to_string()
        }
        None => sanitize(&descriptor.title, used, max_len),
    }
}

/// Sanitize `title` into a name not yet in `used`, record it, and return it.
///
/// Output is non-empty, only `[a-z0-9-]`, at most `max_len` bytes long for any `max_len`
/// accepted by [`check_max_name_len`]. Collisions get `-2`, `-3`, ... (smallest free suffix).
pub fn sanitize(title: &str, used: &mut UsedNames, max_len: usize) -> String {
    let base = truncate_at_word(&slugify(title), max_len);
    let base = if base.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        base
    };

    let name = if used.contains(&base) {
        disambiguate(&base, used, max_len)
    } else {
        base
    };
    used.insert(name.clone());
    name
}

/// Lowercase ASCII slug: transliterate, then collapse every non-alphanumeric run to one `-`.
fn slugify(title: &str) -> String {
    let ascii = deunicode::deunicode(title);
    let mut out = String::with_capacity(ascii.len());
    let mut pending_sep = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push(SEPARATOR);
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Cut to `max_len`, backing up to the last separator if that keeps at least half the limit.
fn truncate_at_word(slug: &str, max_len: usize) -> String {
    if slug.len() <= max_len {
        return slug.to_string();
    }
    // slug is pure ASCII, byte indexing is safe
    let cut = &slug[..max_len];
    let cut = match cut.rfind(SEPARATOR) {
        Some(i) if i >= max_len / 2 => &cut[..i],
        _ => cut,
    };
    cut.trim_matches(SEPARATOR).to_string()
}

fn disambiguate(base: &str, used: &UsedNames, max_len: usize) -> String {
    let mut n: u32 = 2;
    loop {
        let suffix = format!("{}{}", SEPARATOR, n);
        let room = max_len.saturating_sub(suffix.len());
        let stem = if base.len() > room {
            base[..room].trim_end_matches(SEPARATOR)
        } else {
            base
        };
        let stem = if stem.is_empty() { FALLBACK_NAME } else { stem };
        let candidate = format!("{}{}", stem, suffix);
        if !used.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
