//! Error type for everything that talks to the site.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImdbError {
    /// Session cookies were rejected (sign-in redirect, 401/403, no user id).
    #[error("IMDb rejected the session at {url}: {reason}. Check the cookie values in your credential file.")]
    Authentication { url: String, reason: String },

    /// The site answered with an unexpected status that says nothing about the session.
    #[error("IMDb answered HTTP {status} at {url}. The site may be having problems; try again later.")]
    Unavailable { url: String, status: u16 },

    /// Page structure was not what we expected; the affected entry is dropped.
    #[error("Could not parse {page}: {reason}")]
    Parse { page: String, reason: String },

    /// Export endpoint answered but gave nothing usable (error status or empty body).
    #[error("Export of list {id} is unavailable: {reason}")]
    ExportUnavailable {
        id: String,
        status: Option<u16>,
        reason: String,
    },

    /// Network-level failure: timeout, DNS, connection reset, body read.
    #[error("Network error: could not fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ImdbError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, ImdbError::Authentication { .. })
    }

    pub(crate) fn parse(page: impl Into<String>, reason: impl Into<String>) -> Self {
        ImdbError::Parse {
            page: page.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(url: &str, source: reqwest::Error) -> Self {
        ImdbError::Transport {
            url: url.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let e = ImdbError::ExportUnavailable {
            id: "ls012345678".to_string(),
            status: Some(404),
            reason: "HTTP 404".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "Export of list ls012345678 is unavailable: HTTP 404"
        );
        let e = ImdbError::parse("lists page", "no list links");
        assert_eq!(e.to_string(), "Could not parse lists page: no list links");
        assert!(!e.is_authentication());
    }

    #[test]
    fn server_trouble_is_not_authentication() {
        let e = ImdbError::Unavailable {
            url: "https://www.imdb.com/profile".to_string(),
            status: 503,
        };
        assert!(!e.is_authentication());
        assert!(e.to_string().contains("HTTP 503"));
        assert!(!e.to_string().contains("credential file"));
    }

    #[test]
    fn authentication_is_detected() {
        let e = ImdbError::Authentication {
            url: "https://www.imdb.com/profile".to_string(),
            reason: "redirected to sign-in".to_string(),
        };
        assert!(e.is_authentication());
        assert!(e.to_string().contains("credential file"));
    }
}
