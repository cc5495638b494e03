//! Session provider: credential tokens in, cookie-carrying client out. No request is made here.

use crate::config::ConfigError;
use crate::imdb::client::PoliteClient;
use crate::imdb::error::ImdbError;
use crate::imdb::{catalog, export, is_signin_url, user_id_from_path, Endpoints, ListSource};
use crate::model::ListDescriptor;
use reqwest::cookie::Jar;
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

const PRIMARY_COOKIE: &str = "id";
const SECONDARY_COOKIE: &str = "sid";

/// Session tokens read from the credential file. Values are opaque and only checked for presence.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    /// Primary session token (`id` cookie). Required.
    #[serde(default)]
    pub id: String,
    /// Secondary session token (`sid` cookie).
    #[serde(default)]
    pub sid: Option<String>,
    /// Any further cookies, sent verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &"<redacted>")
            .field("sid", &self.sid.as_ref().map(|_| "<redacted>"))
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Credentials {
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Check presence and header safety; return the (name, value) cookie pairs to send.
    pub fn cookie_pairs(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(ConfigError::MissingCredential {
                field: PRIMARY_COOKIE.to_string(),
            });
        }
        let mut pairs = vec![(PRIMARY_COOKIE.to_string(), id.to_string())];
        if let Some(sid) = self.sid.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push((SECONDARY_COOKIE.to_string(), sid.to_string()));
        }
        for (name, value) in &self.extra {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if name.is_empty() || !name.bytes().all(is_token_byte) {
                return Err(ConfigError::InvalidCredential {
                    field: name.clone(),
                    reason: "not a valid cookie name".to_string(),
                });
            }
            pairs.push((name.clone(), value.to_string()));
        }
        for (name, value) in &pairs {
            if !value.bytes().all(is_cookie_value_byte) {
                return Err(ConfigError::InvalidCredential {
                    field: name.clone(),
                    reason: "contains whitespace, ';', ',' or control characters".to_string(),
                });
            }
        }
        Ok(pairs)
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn is_cookie_value_byte(b: u8) -> bool {
    b.is_ascii_graphic() && b != b';' && b != b',' && b != b'"' && b != b'\\'
}

/// Client knobs for the session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub user_agent: Option<String>,
    pub delay_ms: u64,
    pub timeout_secs: u64,
    pub endpoints: Endpoints,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            user_agent: None,
            delay_ms: crate::imdb::DEFAULT_DELAY_MS,
            timeout_secs: crate::imdb::DEFAULT_TIMEOUT_SECS,
            endpoints: Endpoints::default(),
        }
    }
}

/// Authenticated client context. The user id is resolved lazily on the first catalog fetch.
#[derive(Debug)]
pub struct ImdbSession {
    client: PoliteClient,
    endpoints: Endpoints,
    user_id: Option<String>,
}

impl ImdbSession {
    /// Attach the credential cookies to a fresh client. Fails only on local problems.
    pub fn connect(
        credentials: &Credentials,
        settings: &SessionSettings,
    ) -> Result<Self, ConfigError> {
        let pairs = credentials.cookie_pairs()?;
        let base = Url::parse(settings.endpoints.base()).map_err(|e| ConfigError::InvalidSetting {
            key: "base_url".to_string(),
            reason: e.to_string(),
        })?;
        let domain = cookie_domain(&base);
        let jar = Jar::default();
        for (name, value) in &pairs {
            let cookie = match &domain {
                Some(d) => format!("{}={}; Domain={}; Path=/", name, value, d),
                None => format!("{}={}; Path=/", name, value),
            };
            jar.add_cookie_str(&cookie, &base);
        }

        let mut builder = PoliteClient::builder()
            .delay_ms(settings.delay_ms)
            .timeout_secs(settings.timeout_secs)
            .cookie_jar(Arc::new(jar));
        if let Some(ua) = &settings.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        let client = builder.build().map_err(ConfigError::HttpClient)?;
        tracing::debug!(cookies = pairs.len(), base = %base, "session prepared");
        Ok(Self {
            client,
            endpoints: settings.endpoints.clone(),
            user_id: None,
        })
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Find the user id from the profile redirect; this is also the credential check.
    pub(crate) fn ensure_user(&mut self) -> Result<String, ImdbError> {
        if let Some(id) = &self.user_id {
            return Ok(id.clone());
        }
        let url = self.endpoints.profile();
        let response = self
            .client
            .get(&url)
            .map_err(|e| ImdbError::transport(&url, e))?;
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ImdbError::Authentication {
                url,
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(ImdbError::Unavailable {
                url,
                status: status.as_u16(),
            });
        }
        let landed = response.url().clone();
        if is_signin_url(&landed) {
            return Err(ImdbError::Authentication {
                url,
                reason: "redirected to the sign-in page".to_string(),
            });
        }
        let user_id =
            user_id_from_path(landed.path()).ok_or_else(|| ImdbError::Authentication {
                url: url.clone(),
                reason: format!("no user id in redirect target {}", landed),
            })?;
        tracing::info!("Logged in as user {}", user_id);
        self.user_id = Some(user_id.clone());
        Ok(user_id)
    }

    /// GET an HTML page. Sign-in redirects and 401/403 are authentication errors; other
    /// non-success statuses are reported as a parse problem for that page.
    pub(crate) fn fetch_page(&mut self, url: &str, page: &str) -> Result<String, ImdbError> {
        let response = self
            .client
            .get(url)
            .map_err(|e| ImdbError::transport(url, e))?;
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 || is_signin_url(response.url()) {
            return Err(ImdbError::Authentication {
                url: url.to_string(),
                reason: format!("{} requires signing in (HTTP {})", page, status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(ImdbError::parse(
                page,
                format!("HTTP {} from {}", status.as_u16(), url),
            ));
        }
        response.text().map_err(|e| ImdbError::transport(url, e))
    }

    pub(crate) fn client_mut(&mut self) -> &mut PoliteClient {
        &mut self.client
    }

    pub(crate) fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

impl ListSource for ImdbSession {
    fn fetch_catalog(&mut self) -> Result<Vec<ListDescriptor>, ImdbError> {
        catalog::fetch_catalog(self)
    }

    fn export_list(&mut self, list: &ListDescriptor) -> Result<Vec<u8>, ImdbError> {
        export::export_list(self, list)
    }
}

/// `.imdb.com` for `www.imdb.com`; no explicit domain for IP hosts or localhost.
fn cookie_domain(base: &Url) -> Option<String> {
    match base.host() {
        Some(url::Host::Domain(host)) if host.contains('.') => {
            let host = host.strip_prefix("www.").unwrap_or(host);
            Some(format!(".{}", host))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_primary_token_is_configuration_error() {
        let creds = Credentials::from_id("   ");
        let err = ImdbSession::connect(&creds, &SessionSettings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { ref field } if field == "id"));
    }

    #[test]
    fn cookie_pairs_include_optional_tokens() -> Result<(), ConfigError> {
        let creds: Credentials = serde_json::from_str(
            r#"{"id": " BCYabc ", "sid": "BCYdef", "ubid-main": "130-1", "empty": ""}"#,
        )
        .map_err(|e| ConfigError::InvalidSetting {
            key: "test".into(),
            reason: e.to_string(),
        })?;
        let pairs = creds.cookie_pairs()?;
        assert_eq!(
            pairs,
            vec![
                ("id".to_string(), "BCYabc".to_string()),
                ("sid".to_string(), "BCYdef".to_string()),
                ("ubid-main".to_string(), "130-1".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn blank_secondary_token_is_ignored() -> Result<(), ConfigError> {
        let creds = Credentials {
            id: "abc".to_string(),
            sid: Some(" ".to_string()),
            extra: BTreeMap::new(),
        };
        assert_eq!(creds.cookie_pairs()?.len(), 1);
        Ok(())
    }

    #[test]
    fn unsafe_cookie_value_rejected() {
        let creds = Credentials::from_id("abc; Domain=evil.example");
        assert!(matches!(
            creds.cookie_pairs(),
            Err(ConfigError::InvalidCredential { .. })
        ));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let creds = Credentials {
            id: "supersecret".to_string(),
            sid: Some("alsosecret".to_string()),
            extra: BTreeMap::new(),
        };
        let dbg = format!("{:?}", creds);
        assert!(!dbg.contains("supersecret"));
        assert!(!dbg.contains("alsosecret"));
    }

    #[test]
    fn connect_builds_without_network() -> Result<(), ConfigError> {
        let session = ImdbSession::connect(&Credentials::from_id("abc"), &SessionSettings::default())?;
        assert!(session.user_id().is_none());
        assert_eq!(session.endpoints(), &Endpoints::default());
        Ok(())
    }

    #[test]
    fn cookie_domain_covers_subdomains() -> Result<(), url::ParseError> {
        assert_eq!(
            cookie_domain(&Url::parse("https://www.imdb.com")?).as_deref(),
            Some(".imdb.com")
        );
        assert_eq!(cookie_domain(&Url::parse("http://127.0.0.1:9000")?), None);
        assert_eq!(cookie_domain(&Url::parse("http://localhost:9000")?), None);
        Ok(())
    }
}
