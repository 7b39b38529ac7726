use crate::error::{EvidenceSourceError, Result};
use auditmap_protocol::{is_missing_value, EvidenceSourceRecord, Table};
use serde::Serialize;
use serde_json::{Map, Value};

/// Header spellings accepted for the evidence ID column of a tabular export.
pub const EVIDENCE_ID_COLUMN: &[&str] = &["evidenceid", "evidence id", "id"];

/// Keys under which an API record carries its nested download link.
pub const DOWNLOAD_LINK_KEYS: &[&str] = &["fileDownloadLink", "downloadLink", "download_link"];

pub const HAS_DOWNLOAD_LINK: &str = "hasDownloadLink";
pub const DOWNLOAD_URL: &str = "downloadUrl";
pub const DOWNLOAD_FILENAME: &str = "downloadFilename";

/// Normalized evidence records plus their column set in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvidenceSet {
    pub columns: Vec<String>,
    pub records: Vec<EvidenceSourceRecord>,
}

impl EvidenceSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn push(&mut self, record: EvidenceSourceRecord) {
        for (key, _) in &record.fields {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
            }
        }
        self.records.push(record);
    }

    /// Render as a table: the column set verbatim, one row per record.
    pub fn to_table(&self) -> Table {
        let rows = self
            .records
            .iter()
            .map(|record| {
                self.columns
                    .iter()
                    .map(|col| record.field(col).unwrap_or_default().to_string())
                    .collect()
            })
            .collect();
        Table::new(self.columns.clone(), rows)
    }

    /// Records that carry a download URL
    pub fn downloadable(&self) -> impl Iterator<Item = &EvidenceSourceRecord> {
        self.records
            .iter()
            .filter(|r| r.field(DOWNLOAD_URL).is_some_and(|url| !url.is_empty()))
    }
}

/// Load a tabular evidence export; every column passes through verbatim.
pub fn load_from_table(table: &Table) -> Result<EvidenceSet> {
    let id_col = table
        .column(EVIDENCE_ID_COLUMN)
        .ok_or_else(|| EvidenceSourceError::MissingColumn(table.headers.join(", ")))?;

    let mut set = EvidenceSet {
        columns: table.headers.clone(),
        records: Vec::with_capacity(table.len()),
    };
    for (idx, row) in table.rows.iter().enumerate() {
        let evidence_id = row.get(id_col).map(|v| v.trim()).unwrap_or_default();
        if is_missing_value(evidence_id) {
            log::warn!("Evidence row {} has no evidence ID", idx + 2);
        }
        let fields = table
            .headers
            .iter()
            .cloned()
            .zip(row.iter().cloned())
            .collect();
        set.records.push(EvidenceSourceRecord {
            evidence_id: evidence_id.to_string(),
            fields,
        });
    }

    log::info!("Loaded {} evidence records from export", set.len());
    Ok(set)
}

/// Load structured records obtained from the evidence source API.
///
/// The record's `id` becomes the first column; a nested download-link object
/// is flattened to `hasDownloadLink`, `downloadUrl` and (when present)
/// `downloadFilename`. Other nested values are kept as compact JSON text.
pub fn load_from_json(records: Vec<Value>) -> Result<EvidenceSet> {
    let mut set = EvidenceSet::default();

    for (index, value) in records.into_iter().enumerate() {
        let Value::Object(object) = value else {
            return Err(EvidenceSourceError::InvalidRecord {
                index,
                reason: "expected a JSON object".to_string(),
            });
        };
        set.push(flatten_record(index, object));
    }

    log::info!("Loaded {} evidence records from source", set.len());
    Ok(set)
}

fn flatten_record(index: usize, mut object: Map<String, Value>) -> EvidenceSourceRecord {
    let evidence_id = object.remove("id").map(scalar_text).unwrap_or_default();
    if evidence_id.is_empty() {
        log::warn!("Evidence record #{index} has no id");
    }

    let link = DOWNLOAD_LINK_KEYS
        .iter()
        .find_map(|key| object.remove(*key))
        .filter(|v| !v.is_null());
    for key in DOWNLOAD_LINK_KEYS {
        object.remove(*key);
    }

    let mut fields = vec![("id".to_string(), evidence_id.clone())];
    for (key, value) in object {
        fields.push((key, scalar_text(value)));
    }

    let link_url = link
        .as_ref()
        .and_then(|l| l.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let link_filename = link
        .as_ref()
        .and_then(|l| l.get("filename").or_else(|| l.get("fileName")))
        .and_then(Value::as_str)
        .map(str::to_string);

    fields.push((HAS_DOWNLOAD_LINK.to_string(), link_url.is_some().to_string()));
    fields.push((DOWNLOAD_URL.to_string(), link_url.unwrap_or_default()));
    if let Some(filename) = link_filename {
        fields.push((DOWNLOAD_FILENAME.to_string(), filename));
    }

    EvidenceSourceRecord {
        evidence_id,
        fields,
    }
}

fn scalar_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn table_export_passes_columns_through() {
        let table = Table::from_csv_reader(
            "evidenceId,Evidence type,Updated\nev-1,Document,2024-01-01\nev-2,Screenshot,\n"
                .as_bytes(),
        )
        .unwrap();

        let set = load_from_table(&table).unwrap();

        assert_eq!(set.columns, vec!["evidenceId", "Evidence type", "Updated"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.records[0].evidence_id, "ev-1");
        assert_eq!(set.records[1].field("Evidence type"), Some("Screenshot"));
        assert_eq!(set.to_table(), table);
    }

    #[test]
    fn table_without_id_column_fails() {
        let table = Table::from_csv_reader("name,type\na,b\n".as_bytes()).unwrap();
        assert!(matches!(
            load_from_table(&table),
            Err(EvidenceSourceError::MissingColumn(_))
        ));
    }

    #[test]
    fn rows_without_id_are_kept_for_the_dump() {
        let table = Table::from_csv_reader("Evidence ID,type\n,b\n".as_bytes()).unwrap();
        let set = load_from_table(&table).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.records[0].evidence_id, "");
    }

    #[test]
    fn json_download_link_is_flattened() {
        let set = load_from_json(vec![
            json!({
                "id": "ev-1",
                "name": "Access review Q1",
                "fileDownloadLink": {"url": "https://files/ev-1", "filename": "q1.pdf"}
            }),
            json!({"id": 42, "name": "Backups", "fileDownloadLink": null}),
        ])
        .unwrap();

        let first = &set.records[0];
        assert_eq!(first.evidence_id, "ev-1");
        assert_eq!(first.field(HAS_DOWNLOAD_LINK), Some("true"));
        assert_eq!(first.field(DOWNLOAD_URL), Some("https://files/ev-1"));
        assert_eq!(first.field(DOWNLOAD_FILENAME), Some("q1.pdf"));
        assert!(first.field("fileDownloadLink").is_none());

        let second = &set.records[1];
        assert_eq!(second.evidence_id, "42");
        assert_eq!(second.field(HAS_DOWNLOAD_LINK), Some("false"));
        assert_eq!(second.field(DOWNLOAD_URL), Some(""));

        assert_eq!(set.columns[0], "id");
        assert!(set.columns.contains(&DOWNLOAD_FILENAME.to_string()));
        assert_eq!(set.downloadable().count(), 1);

        let table = set.to_table();
        let filename_col = table.column(&[DOWNLOAD_FILENAME]).unwrap();
        assert_eq!(table.rows[1][filename_col], "");
    }

    #[test]
    fn json_nested_values_become_text() {
        let set = load_from_json(vec![json!({"id": "a", "tags": ["x", "y"]})]).unwrap();
        assert_eq!(set.records[0].field("tags"), Some(r#"["x","y"]"#));
    }

    #[test]
    fn json_non_object_is_rejected() {
        let err = load_from_json(vec![json!({"id": "a"}), json!("oops")]).unwrap_err();
        assert!(matches!(err, EvidenceSourceError::InvalidRecord { index: 1, .. }));
    }
}
