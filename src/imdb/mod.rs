//! IMDb access: session setup, list catalog, CSV export.
//!
//! The pipeline only sees [`ListSource`]; page parsing stays behind it so a markup change on the
//! site only touches `catalog.rs`.

mod catalog;
mod client;
mod error;
mod export;
mod session;

pub use client::{
    PoliteClient, PoliteClientBuilder, DEFAULT_DELAY_MS, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
pub use error::ImdbError;
pub use session::{Credentials, ImdbSession, SessionSettings};

use crate::model::ListDescriptor;
use reqwest::Url;

pub const IMDB_BASE: &str = "https://www.imdb.com";

/// Where the lists live and get exported. Everything else in this module builds URLs through it.
pub trait ListSource {
    /// Enumerate built-in lists (watchlist, ratings) then custom lists, in page order.
    ///
    /// Entries whose markup cannot be parsed are logged and left out. Only a rejected session
    /// (`ImdbError::Authentication`) or a failure to identify the user is returned as an error.
    fn fetch_catalog(&mut self) -> Result<Vec<ListDescriptor>, ImdbError>;

    /// Download one list's CSV export as raw bytes.
    fn export_list(&mut self, list: &ListDescriptor) -> Result<Vec<u8>, ImdbError>;
}

/// URL layout of the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(IMDB_BASE)
    }
}

impl Endpoints {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Redirects to `/user/ur.../` when signed in, to a sign-in page otherwise.
    pub fn profile(&self) -> String {
        format!("{}/profile", self.base)
    }

    pub fn lists(&self, user_id: &str) -> String {
        format!("{}/user/{}/lists", self.base, user_id)
    }

    pub fn watchlist(&self, user_id: &str) -> String {
        format!("{}/user/{}/watchlist", self.base, user_id)
    }

    pub fn list_export(&self, list_id: &str) -> String {
        format!("{}/list/{}/export", self.base, list_id)
    }

    pub fn ratings_export(&self, user_id: &str) -> String {
        format!("{}/user/{}/ratings/export", self.base, user_id)
    }
}

/// Extract a `ur<digits>` user id from a URL path such as `/user/ur1234567/`.
pub(crate) fn user_id_from_path(path: &str) -> Option<String> {
    path.split('/')
        .find(|seg| {
            seg.len() > 2
                && seg.starts_with("ur")
                && seg[2..].bytes().all(|b| b.is_ascii_digit())
        })
        .map(String::from)
}

/// True when the site bounced us to a login page.
pub(crate) fn is_signin_url(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    path.contains("/registration/signin") || path.contains("/ap/signin") || path.ends_with("/signin")
}
