use crate::config::SourceSettings;
use anyhow::{Context, Result};
use auditmap_evidence::{load_from_json, AuditorClient, SourceConfig};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub audit_id: String,
    pub records: usize,
    pub out: PathBuf,
    pub downloaded: Vec<PathBuf>,
}

/// Credentials from the environment, everything else from config overrides.
pub fn connect(settings: &SourceSettings) -> Result<AuditorClient> {
    let config = SourceConfig::from_env().context("evidence source configuration failed")?;
    let config = settings.apply(config);
    log::debug!("Connecting with {config:?}");
    AuditorClient::new(config).context("evidence source configuration failed")
}

pub fn list_audits(settings: &SourceSettings) -> Result<Vec<Value>> {
    let mut client = connect(settings)?;
    client.list_audits().context("audit listing failed")
}

/// Fetch every evidence record of an audit and write the raw listing as a
/// JSON array that `map --evidence` reads back.
pub fn fetch_evidence(
    settings: &SourceSettings,
    audit_id: &str,
    out: &Path,
    download_dir: Option<&Path>,
) -> Result<FetchOutcome> {
    let mut client = connect(settings)?;
    let records = client
        .list_evidence(audit_id)
        .with_context(|| format!("evidence fetch failed for audit {audit_id}"))?;
    log::info!("Fetched {} evidence records", records.len());

    std::fs::write(out, serde_json::to_string_pretty(&records)?)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    let count = records.len();
    let downloaded = match download_dir {
        Some(dir) => {
            let set = load_from_json(records).context("evidence decode failed")?;
            client
                .download_all(&set, dir)
                .context("evidence download failed")?
        }
        None => Vec::new(),
    };

    Ok(FetchOutcome {
        audit_id: audit_id.to_string(),
        records: count,
        out: out.to_path_buf(),
        downloaded,
    })
}
