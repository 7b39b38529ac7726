use anyhow::{Context, Result};
use auditmap_evidence::SourceConfig;
use auditmap_reconcile::MatchConfig;
use auditmap_workbook::{ReportSheets, DEFAULT_ALL_EVIDENCE_SHEET, DEFAULT_EVIDENCE_INDEX_SHEET};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TESTS_SHEET: &str = "Tests";

/// Contents of an optional `auditmap.toml`.
///
/// Credentials never come from this file, only from the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub matching: MatchConfig,
    pub sheets: SheetsConfig,
    pub source: SourceSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SheetsConfig {
    pub tests: String,
    pub all_evidence: String,
    pub evidence_index: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            tests: DEFAULT_TESTS_SHEET.to_string(),
            all_evidence: DEFAULT_ALL_EVIDENCE_SHEET.to_string(),
            evidence_index: DEFAULT_EVIDENCE_INDEX_SHEET.to_string(),
        }
    }
}

impl SheetsConfig {
    pub fn report(&self) -> ReportSheets {
        ReportSheets {
            all_evidence: self.all_evidence.clone(),
            evidence_index: self.evidence_index.clone(),
        }
    }
}

/// Non-secret connection overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSettings {
    pub base_url: Option<String>,
    pub page_size: Option<u32>,
    pub timeout_secs: Option<u64>,
}

impl SourceSettings {
    pub fn apply(&self, mut config: SourceConfig) -> SourceConfig {
        if let Some(base_url) = &self.base_url {
            config = config.base_url(base_url.as_str());
        }
        if let Some(page_size) = self.page_size {
            config = config.page_size(page_size);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.request_timeout(Some(Duration::from_secs(secs)));
        }
        config
    }
}

impl FileConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditmap_reconcile::TieBreak;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_path_gives_defaults() {
        let config = FileConfig::load(None).unwrap();
        assert_eq!(config, FileConfig::default());
        assert_eq!(config.sheets.tests, "Tests");
        assert_eq!(config.sheets.report(), ReportSheets::default());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("auditmap.toml");
        std::fs::write(
            &path,
            r#"
            [matching]
            threshold = 0.6
            tie_break = "last_seen"

            [sheets]
            evidence_index = "index"

            [source]
            page_size = 25
            "#,
        )
        .unwrap();

        let config = FileConfig::load(Some(&path)).unwrap();
        assert_eq!(config.matching.threshold, 0.6);
        assert_eq!(config.matching.tie_break, TieBreak::LastSeen);
        assert!(config.matching.use_control_taxonomy);
        assert_eq!(config.sheets.evidence_index, "index");
        assert_eq!(config.sheets.all_evidence, DEFAULT_ALL_EVIDENCE_SHEET);

        let source = config
            .source
            .apply(SourceConfig::new("id", "secret", "acme"));
        assert_eq!(source.page_size, 25);
    }

    #[test]
    fn secrets_are_not_accepted_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("auditmap.toml");
        std::fs::write(&path, "[source]\nclient_secret = \"s3cr3t\"\n").unwrap();

        assert!(FileConfig::load(Some(&path)).is_err());
    }
}
