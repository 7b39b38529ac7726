//! Accepted header spellings per semantic column.
//!
//! Lookups go through `normalize_header`, so case, surrounding whitespace and
//! `_`/`-` separators never need their own alias.

use auditmap_protocol::Table;

pub const CONTROL_ID: &[&str] = &["id", "control id", "control"];
pub const CONTROL_TEST_NAME: &[&str] = &["test name", "test"];
pub const FRAMEWORK_REQUIREMENT: &[&str] = &["framework requirement", "framework requirements"];
pub const URL: &[&str] = &["url", "link"];

pub const TEST_REFERENCE_ID: &[&str] = &["reference id", "test id", "ref id"];
pub const TEST_DESCRIPTION: &[&str] = &["test", "test description", "description", "test name"];

pub(crate) fn cell(table: &Table, row: usize, col: Option<usize>) -> Option<String> {
    let col = col?;
    let value = table.cell(row, col)?.trim();
    if auditmap_protocol::is_missing_value(value) {
        None
    } else {
        Some(value.to_string())
    }
}
