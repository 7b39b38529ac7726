use crate::error::{EvidenceSourceError, Result};
use std::fmt;
use std::time::Duration;

pub const ENV_CLIENT_ID: &str = "AUDITMAP_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AUDITMAP_CLIENT_SECRET";
pub const ENV_ORG_SLUG: &str = "AUDITMAP_ORG_SLUG";
pub const ENV_BASE_URL: &str = "AUDITMAP_API_BASE_URL";
pub const ENV_AUTH_URL: &str = "AUDITMAP_AUTH_URL";

pub const DEFAULT_BASE_URL: &str = "https://api.vanta.com";
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Connection settings for the evidence source API.
///
/// Credentials are only ever read from the environment; see [`SourceConfig::from_env`].
#[derive(Clone)]
pub struct SourceConfig {
    pub client_id: String,
    pub client_secret: String,
    pub org_slug: String,
    pub base_url: String,
    pub auth_url: String,
    pub page_size: u32,
    /// Per-request timeout; `None` leaves deadlines to the caller
    pub request_timeout: Option<Duration>,
}

impl SourceConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        org_slug: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            org_slug: org_slug.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            auth_url: format!("{DEFAULT_BASE_URL}/oauth/token"),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| EvidenceSourceError::Config(format!("{key} is not set")))
        };

        let mut config = Self::new(
            required(ENV_CLIENT_ID)?,
            required(ENV_CLIENT_SECRET)?,
            required(ENV_ORG_SLUG)?,
        );
        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config = config.base_url(base_url);
        }
        if let Some(auth_url) = lookup(ENV_AUTH_URL).filter(|v| !v.trim().is_empty()) {
            config.auth_url = auth_url.trim().to_string();
        }
        Ok(config)
    }

    /// Builder: set the API base URL (the token endpoint follows unless set explicitly)
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        self.auth_url = format!("{base_url}/oauth/token");
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub const fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(EvidenceSourceError::Config(
                "page_size must be > 0".to_string(),
            ));
        }
        if self.org_slug.contains('/') {
            return Err(EvidenceSourceError::Config(format!(
                "org slug '{}' must not contain '/'",
                self.org_slug
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("org_slug", &self.org_slug)
            .field("base_url", &self.base_url)
            .field("auth_url", &self.auth_url)
            .field("page_size", &self.page_size)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_required_credentials() {
        let config = SourceConfig::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "id"),
            (ENV_CLIENT_SECRET, "secret"),
            (ENV_ORG_SLUG, "acme"),
            (ENV_BASE_URL, "http://localhost:9000/"),
        ]))
        .unwrap();

        assert_eq!(config.client_id, "id");
        assert_eq!(config.org_slug, "acme");
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.auth_url, "http://localhost:9000/oauth/token");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_secret_is_a_config_error() {
        let err = SourceConfig::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "id"),
            (ENV_CLIENT_SECRET, "  "),
            (ENV_ORG_SLUG, "acme"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(ENV_CLIENT_SECRET));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = SourceConfig::new("id", "top-secret", "acme");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("top-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn zero_page_size_is_invalid() {
        let config = SourceConfig::new("id", "s", "acme").page_size(0);
        assert!(config.validate().is_err());
    }
}
