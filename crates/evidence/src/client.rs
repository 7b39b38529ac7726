use crate::config::SourceConfig;
use crate::error::{EvidenceSourceError, Result};
use crate::record_set::{EvidenceSet, DOWNLOAD_FILENAME, DOWNLOAD_URL};
use crate::source::{fetch_all, EvidencePage, EvidenceSource};
use auditmap_protocol::EvidenceSourceRecord;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Tokens are refreshed once they are this close to expiry.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

const AUDITOR_SCOPE: &str = "auditor-api.audit:read auditor-api.auditor:read";

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Bearer token cache with an early-refresh margin.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    token: Option<CachedToken>,
}

impl TokenCache {
    /// The cached token, unless it expires within [`TOKEN_REFRESH_MARGIN`] of `now`.
    pub fn get(&self, now: Instant) -> Option<&str> {
        self.token
            .as_ref()
            .filter(|t| now + TOKEN_REFRESH_MARGIN < t.expires_at)
            .map(|t| t.value.as_str())
    }

    pub fn store(&mut self, value: String, expires_in: Duration, now: Instant) {
        self.token = Some(CachedToken {
            value,
            expires_at: now + expires_in,
        });
    }

    pub fn clear(&mut self) {
        self.token = None;
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Blocking client for the auditor evidence API.
///
/// No retries: every transport or status failure is returned to the caller.
pub struct AuditorClient {
    http: Client,
    config: SourceConfig,
    token: TokenCache,
}

impl AuditorClient {
    pub fn new(config: SourceConfig) -> Result<Self> {
        config.validate()?;
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            config,
            token: TokenCache::default(),
        })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn bearer(&mut self) -> Result<String> {
        let now = Instant::now();
        if let Some(token) = self.token.get(now) {
            return Ok(token.to_string());
        }

        log::debug!("Requesting access token from {}", self.config.auth_url);
        let payload = json!({
            "grant_type": "client_credentials",
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret,
            "scope": AUDITOR_SCOPE,
        });
        let resp = self.http.post(&self.config.auth_url).json(&payload).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(EvidenceSourceError::Auth(format!("HTTP {status}: {body}")));
        }
        let token: TokenResponse = resp
            .json()
            .map_err(|e| EvidenceSourceError::Auth(format!("invalid token response: {e}")))?;

        self.token.store(
            token.access_token.clone(),
            Duration::from_secs(token.expires_in),
            now,
        );
        Ok(token.access_token)
    }

    fn get(&mut self, url: &str, query: &[(&str, String)]) -> Result<Response> {
        let bearer = self.bearer()?;
        let resp = self
            .http
            .get(url)
            .query(query)
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .header(ACCEPT, "application/json")
            .send()?;
        check_status(url, resp)
    }

    fn get_json(&mut self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let resp = self.get(url, query)?;
        resp.json()
            .map_err(|e| EvidenceSourceError::decode(format!("{url}: {e}")))
    }

    fn audits_url(&self) -> String {
        format!(
            "{}/auditor/{}/audits",
            self.config.base_url, self.config.org_slug
        )
    }

    /// A paginated listing under the audits collection, e.g. `"{audit}/evidence"`.
    pub fn listing(&mut self, suffix: &str) -> ApiListing<'_> {
        let url = if suffix.is_empty() {
            self.audits_url()
        } else {
            format!("{}/{}", self.audits_url(), suffix.trim_start_matches('/'))
        };
        ApiListing { client: self, url }
    }

    pub fn list_audits(&mut self) -> Result<Vec<Value>> {
        fetch_all(&mut self.listing(""))
    }

    pub fn list_tests(&mut self, audit_id: &str) -> Result<Vec<Value>> {
        fetch_all(&mut self.listing(&format!("{audit_id}/tests")))
    }

    pub fn list_evidence(&mut self, audit_id: &str) -> Result<Vec<Value>> {
        fetch_all(&mut self.listing(&format!("{audit_id}/evidence")))
    }

    /// Download one file blob.
    ///
    /// The bearer token is only sent to the API's own origin; links to other
    /// hosts (presigned storage URLs) are fetched without credentials.
    pub fn download(&mut self, url: &str) -> Result<Vec<u8>> {
        let url = self.resolve(url)?;
        let resp = if self.is_api_origin(&url) {
            self.get(url.as_str(), &[])?
        } else {
            log::debug!(
                "Downloading from {} without credentials",
                url.origin().ascii_serialization()
            );
            let resp = self.http.get(url.clone()).send()?;
            check_status(url.as_str(), resp)?
        };
        Ok(resp.bytes()?.to_vec())
    }

    /// Absolute form of a download link; relative links hang off the API base.
    fn resolve(&self, url: &str) -> Result<Url> {
        let base = Url::parse(&self.config.base_url).map_err(|e| {
            EvidenceSourceError::Config(format!("invalid base URL {}: {e}", self.config.base_url))
        })?;
        base.join(url)
            .map_err(|e| EvidenceSourceError::decode(format!("invalid download URL {url}: {e}")))
    }

    fn is_api_origin(&self, url: &Url) -> bool {
        Url::parse(&self.config.base_url).is_ok_and(|base| base.origin() == url.origin())
    }

    /// Download every record with a download URL into `dir`.
    ///
    /// Files are named `{evidence id}_{link filename}`, see [`download_path`].
    /// Returns the paths written.
    pub fn download_all(&mut self, set: &EvidenceSet, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for record in set.downloadable() {
            let Some(url) = record.field(DOWNLOAD_URL) else {
                continue;
            };
            let Some(path) = download_path(dir, record) else {
                log::warn!(
                    "Skipping evidence '{}': ID is not usable as a file name",
                    record.evidence_id
                );
                continue;
            };

            let bytes = self.download(url)?;
            std::fs::write(&path, bytes)?;
            log::debug!("Downloaded {}", path.display());
            written.push(path);
        }
        log::info!("Downloaded {} evidence files", written.len());
        Ok(written)
    }
}

/// Where a record's download lands; always a direct child of `dir`.
///
/// The evidence ID has to be a plain file name. The link's filename is cut
/// down to its last component and falls back to the ID.
fn download_path(dir: &Path, record: &EvidenceSourceRecord) -> Option<PathBuf> {
    let id = record.evidence_id.as_str();
    if !is_plain_file_name(id) {
        return None;
    }
    let name = record
        .field(DOWNLOAD_FILENAME)
        .and_then(|f| Path::new(f).file_name())
        .map(|f| f.to_string_lossy().into_owned())
        .filter(|f| is_plain_file_name(f))
        .unwrap_or_else(|| id.to_string());
    Some(dir.join(format!("{id}_{name}")))
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', ':', '\0'])
}

fn check_status(url: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(EvidenceSourceError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// One cursor-paginated API listing, usable as an [`EvidenceSource`].
pub struct ApiListing<'a> {
    client: &'a mut AuditorClient,
    url: String,
}

impl EvidenceSource for ApiListing<'_> {
    fn fetch_page(&mut self, cursor: Option<&str>) -> Result<EvidencePage> {
        let mut query = vec![("pageSize", self.client.config.page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("pageCursor", cursor.to_string()));
        }
        let url = self.url.clone();
        let body = self.client.get_json(&url, &query)?;
        EvidencePage::from_response(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_reused_until_refresh_margin() {
        let start = Instant::now();
        let mut cache = TokenCache::default();
        assert!(cache.get(start).is_none());

        cache.store("tok".to_string(), Duration::from_secs(120), start);

        assert_eq!(cache.get(start), Some("tok"));
        assert_eq!(cache.get(start + Duration::from_secs(59)), Some("tok"));
        assert!(cache.get(start + Duration::from_secs(60)).is_none());
        assert!(cache.get(start + Duration::from_secs(200)).is_none());
    }

    #[test]
    fn short_lived_token_is_never_cached() {
        let now = Instant::now();
        let mut cache = TokenCache::default();
        cache.store("tok".to_string(), Duration::from_secs(30), now);
        assert!(cache.get(now).is_none());

        cache.store("tok2".to_string(), Duration::from_secs(3600), now);
        assert_eq!(cache.get(now), Some("tok2"));
        cache.clear();
        assert!(cache.get(now).is_none());
    }

    #[test]
    fn listing_urls_follow_org_and_audit() {
        let config = SourceConfig::new("id", "secret", "acme").base_url("http://localhost:1");
        let mut client = AuditorClient::new(config).unwrap();

        assert_eq!(
            client.listing("").url,
            "http://localhost:1/auditor/acme/audits"
        );
        assert_eq!(
            client.listing("a-1/evidence").url,
            "http://localhost:1/auditor/acme/audits/a-1/evidence"
        );
    }

    fn downloadable(id: &str, filename: Option<&str>) -> EvidenceSourceRecord {
        let mut fields = vec![(
            DOWNLOAD_URL.to_string(),
            "https://api.example.test/files/1".to_string(),
        )];
        if let Some(filename) = filename {
            fields.push((DOWNLOAD_FILENAME.to_string(), filename.to_string()));
        }
        EvidenceSourceRecord {
            evidence_id: id.to_string(),
            fields,
        }
    }

    #[test]
    fn download_paths_stay_inside_the_target_directory() {
        let dir = Path::new("/srv/audit/downloads");

        assert_eq!(
            download_path(dir, &downloadable("ev-1", Some("policy.pdf"))),
            Some(dir.join("ev-1_policy.pdf"))
        );
        assert_eq!(
            download_path(dir, &downloadable("ev-2", Some("../../etc/passwd"))),
            Some(dir.join("ev-2_passwd"))
        );
        assert_eq!(
            download_path(dir, &downloadable("ev-3", None)),
            Some(dir.join("ev-3_ev-3"))
        );
        for id in ["../../escaped", "/etc/cron.d", "a\\b", "C:x", "..", ""] {
            assert_eq!(
                download_path(dir, &downloadable(id, Some("x.pdf"))),
                None,
                "accepted {id:?}"
            );
        }
    }

    #[test]
    fn credentials_only_go_to_the_api_origin() {
        let config =
            SourceConfig::new("id", "secret", "acme").base_url("https://api.example.test");
        let client = AuditorClient::new(config).unwrap();
        let authorized = |url: &str| client.is_api_origin(&client.resolve(url).unwrap());

        assert!(authorized("https://api.example.test/v1/files/ev-1"));
        assert!(authorized("/v1/files/ev-1"));
        assert!(!authorized("https://bucket.storage.example.com/ev-1?signature=abc"));
        assert!(!authorized("http://api.example.test/v1/files/ev-1"));
        assert!(!authorized("https://api.example.test:8443/v1/files/ev-1"));
    }

    #[test]
    fn unreachable_source_is_a_transport_error() {
        let config = SourceConfig::new("id", "secret", "acme")
            .base_url("http://127.0.0.1:9")
            .request_timeout(Some(Duration::from_secs(2)));
        let mut client = AuditorClient::new(config).unwrap();

        let err = client.list_evidence("audit-1").unwrap_err();
        assert!(matches!(err, EvidenceSourceError::Transport(_)));
    }
}
