//! List catalog: built-in lists plus the user's custom lists scraped from the "your lists" page.

use crate::imdb::error::ImdbError;
use crate::imdb::session::ImdbSession;
use crate::model::{ListDescriptor, ListKind};
use scraper::{ElementRef, Html, Node, Selector};

const WATCHLIST_TITLE: &str = "Watchlist";
const RATINGS_TITLE: &str = "Ratings";
/// Descriptor id for ratings; the export URL is keyed by user id instead.
pub const RATINGS_ID: &str = "ratings";

const LIST_HREF_MARKER: &str = "/list/ls";
/// Title links of the user's own lists. Other `/list/ls` links on the page (the watchlist,
/// lists from other users, sidebars) carry no such class.
const OWN_LIST_SELECTOR: &str = r#"a.list-name[href*="/list/ls"]"#;

/// Parse a CSS selector or return a parse error (avoids panics from Selector::parse).
fn parse_selector(sel: &str, page: &str) -> Result<Selector, ImdbError> {
    Selector::parse(sel)
        .map_err(|e| ImdbError::parse(page, format!("invalid selector {:?}: {}", sel, e)))
}

pub(crate) fn fetch_catalog(session: &mut ImdbSession) -> Result<Vec<ListDescriptor>, ImdbError> {
    let user_id = session.ensure_user()?;
    let mut lists = Vec::new();

    let watchlist_url = session.endpoints().watchlist(&user_id);
    match session
        .fetch_page(&watchlist_url, "watchlist page")
        .and_then(|html| parse_watchlist_id(&html))
    {
        Ok(id) => lists.push(ListDescriptor {
            id,
            title: WATCHLIST_TITLE.to_string(),
            kind: ListKind::Watchlist,
        }),
        Err(e) if e.is_authentication() => return Err(e),
        Err(e) => tracing::warn!("Skipping watchlist: {}", e),
    }

    lists.push(ListDescriptor {
        id: RATINGS_ID.to_string(),
        title: RATINGS_TITLE.to_string(),
        kind: ListKind::Ratings,
    });

    let lists_url = session.endpoints().lists(&user_id);
    match session
        .fetch_page(&lists_url, "lists page")
        .and_then(|html| parse_custom_lists(&html))
    {
        Ok(entries) => {
            for entry in entries {
                match entry {
                    Ok(list) if lists.iter().any(|known| known.id == list.id) => {
                        tracing::debug!(id = %list.id, "list already in catalog");
                    }
                    Ok(list) => lists.push(list),
                    Err(e) => tracing::warn!("Skipping list entry: {}", e),
                }
            }
        }
        Err(e) if e.is_authentication() => return Err(e),
        Err(e) => tracing::warn!("Could not read custom lists: {}", e),
    }

    tracing::debug!(count = lists.len(), "catalog fetched");
    Ok(lists)
}

/// The watchlist is an ordinary `ls` list; its id is only exposed in page metadata.
pub(crate) fn parse_watchlist_id(html: &str) -> Result<String, ImdbError> {
    const PAGE: &str = "watchlist page";
    let doc = Html::parse_document(html);
    for sel in [
        r#"meta[property="pageId"]"#,
        r#"meta[property="imdb:pageConst"]"#,
    ] {
        let sel = parse_selector(sel, PAGE)?;
        let id = doc
            .select(&sel)
            .filter_map(|e| e.value().attr("content"))
            .map(str::trim)
            .find(|c| is_list_id(c));
        if let Some(id) = id {
            return Ok(id.to_string());
        }
    }
    Err(ImdbError::parse(
        PAGE,
        "no list id in page metadata (layout may have changed)",
    ))
}

/// Every list title link becomes a descriptor, in page order, one per id.
///
/// The outer `Err` means the page itself is unusable; inner `Err`s are per-entry problems
/// (e.g. a link with no title text) that the caller logs and skips.
pub(crate) fn parse_custom_lists(
    html: &str,
) -> Result<Vec<Result<ListDescriptor, ImdbError>>, ImdbError> {
    const PAGE: &str = "lists page";
    let doc = Html::parse_document(html);
    let anchor_sel = parse_selector(OWN_LIST_SELECTOR, PAGE)?;

    // (id, first non-empty title) in first-seen order
    let mut found: Vec<(String, Option<String>)> = Vec::new();
    for anchor in doc.select(&anchor_sel) {
        let Some(id) = anchor.value().attr("href").and_then(list_id_from_href) else {
            continue;
        };
        let title = anchor_title(anchor);
        let title = Some(title).filter(|t| !t.trim().is_empty());
        match found.iter_mut().find(|(seen, _)| *seen == id) {
            Some((_, existing)) => {
                if existing.is_none() {
                    *existing = title;
                }
            }
            None => found.push((id, title)),
        }
    }

    Ok(found
        .into_iter()
        .map(|(id, title)| match title {
            Some(title) => Ok(ListDescriptor::custom(id, title)),
            None => Err(ImdbError::parse(
                PAGE,
                format!("list {} has no title text", id),
            )),
        })
        .collect())
}

fn is_list_id(s: &str) -> bool {
    s.len() > 2 && s.starts_with("ls") && s[2..].bytes().all(|b| b.is_ascii_digit())
}

/// `ls` id from a list page link. Links to sub-pages (`/export`, `/edit`, ...) are ignored.
fn list_id_from_href(href: &str) -> Option<String> {
    let start = href.find(LIST_HREF_MARKER)? + "/list/".len();
    let rest = &href[start..];
    let digits = rest[2..].bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let (id, tail) = rest.split_at(2 + digits);
    let tail = tail.trim_start_matches('/');
    if tail.is_empty() || tail.starts_with('?') || tail.starts_with('#') {
        Some(id.to_string())
    } else {
        None
    }
}

/// Anchor text with `<br>` kept as a line break. Only outer whitespace is trimmed.
fn anchor_title(anchor: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in anchor.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            _ => {}
        }
    }
    out.trim().to_string()
}
