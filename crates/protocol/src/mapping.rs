use crate::records::EvidenceFileEntry;
use serde::{Deserialize, Serialize};

/// How a mapping row was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchKind {
    /// Folder name equals a control ID
    ExactControl,
    /// Folder name equals a test description
    ExactTest,
    /// Folder name is similar enough to a test description
    Fuzzy,
    Unmatched,
}

impl MatchKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExactControl => "exact-control",
            Self::ExactTest => "exact-test",
            Self::Fuzzy => "fuzzy",
            Self::Unmatched => "unmatched",
        }
    }
}

/// Columns of the evidence index view, in their declared order.
///
/// The reconciliation engine and the report sink both render rows through this
/// list, so the column order is fixed here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingColumn {
    Filename,
    RelativePath,
    ControlFolder,
    ControlId,
    TestName,
    TestId,
    FrameworkRequirement,
    Url,
    MatchType,
    Similarity,
    EvidenceId,
}

impl MappingColumn {
    pub const ALL: [Self; 11] = [
        Self::Filename,
        Self::RelativePath,
        Self::ControlFolder,
        Self::ControlId,
        Self::TestName,
        Self::TestId,
        Self::FrameworkRequirement,
        Self::Url,
        Self::MatchType,
        Self::Similarity,
        Self::EvidenceId,
    ];

    pub const fn header(self) -> &'static str {
        match self {
            Self::Filename => "Filename",
            Self::RelativePath => "Relative Path",
            Self::ControlFolder => "Control Folder",
            Self::ControlId => "Control ID",
            Self::TestName => "Test name",
            Self::TestId => "Test ID",
            Self::FrameworkRequirement => "Framework Requirement",
            Self::Url => "URL",
            Self::MatchType => "Match Type",
            Self::Similarity => "Similarity",
            Self::EvidenceId => "Evidence ID",
        }
    }

    pub fn headers() -> Vec<String> {
        Self::ALL.iter().map(|col| col.header().to_string()).collect()
    }
}

/// One evidence file unified with zero or one control/test match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRow {
    #[serde(flatten)]
    pub entry: EvidenceFileEntry,
    pub matched_control_id: Option<String>,
    pub matched_test_name: Option<String>,
    pub matched_test_reference_id: Option<String>,
    pub framework_requirement: Option<String>,
    pub url: Option<String>,
    pub match_kind: MatchKind,
    pub similarity: Option<f64>,
    pub evidence_id: Option<String>,
}

impl MappingRow {
    pub fn unmatched(entry: EvidenceFileEntry) -> Self {
        Self {
            entry,
            matched_control_id: None,
            matched_test_name: None,
            matched_test_reference_id: None,
            framework_requirement: None,
            url: None,
            match_kind: MatchKind::Unmatched,
            similarity: None,
            evidence_id: None,
        }
    }

    pub fn value(&self, column: MappingColumn) -> String {
        fn opt(value: &Option<String>) -> String {
            value.clone().unwrap_or_default()
        }
        match column {
            MappingColumn::Filename => self.entry.filename.clone(),
            MappingColumn::RelativePath => self.entry.relative_path.clone(),
            MappingColumn::ControlFolder => self.entry.containing_folder.clone(),
            MappingColumn::ControlId => opt(&self.matched_control_id),
            MappingColumn::TestName => opt(&self.matched_test_name),
            MappingColumn::TestId => opt(&self.matched_test_reference_id),
            MappingColumn::FrameworkRequirement => opt(&self.framework_requirement),
            MappingColumn::Url => opt(&self.url),
            MappingColumn::MatchType => self.match_kind.as_str().to_string(),
            MappingColumn::Similarity => self
                .similarity
                .map(|score| format!("{score:.3}"))
                .unwrap_or_default(),
            MappingColumn::EvidenceId => opt(&self.evidence_id),
        }
    }

    /// Render every column in [`MappingColumn::ALL`] order; `None` becomes an empty cell.
    pub fn cells(&self) -> Vec<String> {
        MappingColumn::ALL.iter().map(|col| self.value(*col)).collect()
    }
}
