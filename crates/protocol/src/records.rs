use serde::{Deserialize, Serialize};

/// One physical file found in an extracted evidence archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceFileEntry {
    /// Base name only
    pub filename: String,

    /// Path relative to the archive root, `/`-separated
    pub relative_path: String,

    /// Name of the immediate parent directory; empty at the archive root
    pub containing_folder: String,
}

impl EvidenceFileEntry {
    pub fn new(
        filename: impl Into<String>,
        relative_path: impl Into<String>,
        containing_folder: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            relative_path: relative_path.into(),
            containing_folder: containing_folder.into(),
        }
    }
}

/// One row of the control/test taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRecord {
    pub control_id: String,
    pub test_name: String,
    pub framework_requirement: Option<String>,
    pub url: Option<String>,
}

impl ControlRecord {
    pub fn new(control_id: impl Into<String>, test_name: impl Into<String>) -> Self {
        Self {
            control_id: control_id.into(),
            test_name: test_name.into(),
            framework_requirement: None,
            url: None,
        }
    }
}

/// One row of the canonical test list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    pub test_reference_id: String,
    pub test_description: String,
}

impl TestRecord {
    pub fn new(test_reference_id: impl Into<String>, test_description: impl Into<String>) -> Self {
        Self {
            test_reference_id: test_reference_id.into(),
            test_description: test_description.into(),
        }
    }
}

/// One record from the external evidence export.
///
/// `fields` holds every column of the export in column order, including the
/// ID column itself, so the record can be dumped back out verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSourceRecord {
    pub evidence_id: String,
    pub fields: Vec<(String, String)>,
}

impl EvidenceSourceRecord {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}
