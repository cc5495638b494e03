//! CSV export of a single list. The body is returned untouched.

use crate::imdb::error::ImdbError;
use crate::imdb::session::ImdbSession;
use crate::imdb::{is_signin_url, Endpoints};
use crate::model::{ListDescriptor, ListKind};

pub(crate) fn export_list(
    session: &mut ImdbSession,
    list: &ListDescriptor,
) -> Result<Vec<u8>, ImdbError> {
    let user_id = if list.kind == ListKind::Ratings {
        Some(session.ensure_user()?)
    } else {
        None
    };
    let url = export_url(session.endpoints(), list, user_id.as_deref());
    tracing::debug!(id = %list.id, url = %url, "exporting list");

    let response = session
        .client_mut()
        .get(&url)
        .map_err(|e| ImdbError::transport(&url, e))?;
    let status = response.status();
    if is_signin_url(response.url()) {
        return Err(ImdbError::Authentication {
            url,
            reason: "export redirected to the sign-in page".to_string(),
        });
    }
    if !status.is_success() {
        return Err(ImdbError::ExportUnavailable {
            id: list.id.clone(),
            status: Some(status.as_u16()),
            reason: format!("HTTP {}", status.as_u16()),
        });
    }
    let body = response
        .bytes()
        .map_err(|e| ImdbError::transport(&url, e))?;
    check_export_body(&list.id, &body)?;
    Ok(body.to_vec())
}

fn export_url(endpoints: &Endpoints, list: &ListDescriptor, user_id: Option<&str>) -> String {
    match list.kind {
        ListKind::Ratings => endpoints.ratings_export(user_id.unwrap_or_default()),
        ListKind::Watchlist | ListKind::Custom => endpoints.list_export(&list.id),
    }
}

/// Empty bodies and HTML pages served with 200 (error or login pages) are not exports.
fn check_export_body(id: &str, body: &[u8]) -> Result<(), ImdbError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ImdbError::ExportUnavailable {
            id: id.to_string(),
            status: None,
            reason: "empty response body".to_string(),
        });
    }
    let head: Vec<u8> = body
        .iter()
        .skip_while(|b| b.is_ascii_whitespace() || **b == 0xEF || **b == 0xBB || **b == 0xBF)
        .take(16)
        .map(u8::to_ascii_lowercase)
        .collect();
    if head.starts_with(b"<!doctype html") || head.starts_with(b"<html") {
        return Err(ImdbError::ExportUnavailable {
            id: id.to_string(),
            status: None,
            reason: "got an HTML page instead of CSV".to_string(),
        });
    }
    Ok(())
}
