use crate::pipeline::MapOutcome;
use auditmap_indexer::ArchiveIndex;
use auditmap_protocol::{MappingColumn, MappingRow};
use std::fmt::Write as _;

pub fn render_map_summary(outcome: &MapOutcome) -> String {
    let stats = &outcome.stats;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Indexed {} files from {}",
        outcome.files,
        outcome.archive.display()
    );
    let _ = writeln!(out, "Evidence records: {}", outcome.evidence_records);
    let _ = writeln!(
        out,
        "Mapping rows: {} (exact control {}, exact test {}, fuzzy {}, unmatched {}; {} duplicates removed)",
        stats.rows,
        stats.exact_control_rows,
        stats.exact_test_rows,
        stats.fuzzy_rows,
        stats.unmatched_rows,
        stats.duplicates_removed
    );
    if !outcome.index_warnings.is_empty() {
        let _ = writeln!(out, "Skipped entries: {}", outcome.index_warnings.len());
    }
    if !outcome.taxonomy_warnings.is_empty() {
        let _ = writeln!(
            out,
            "Dropped taxonomy rows: {}",
            outcome.taxonomy_warnings.len()
        );
    }
    let _ = write!(out, "Wrote {}", outcome.out.display());
    out
}

/// First `limit` mapping rows as a tab-separated block with a header line.
pub fn render_preview(rows: &[MappingRow], limit: usize) -> String {
    let mut out = MappingColumn::headers().join("\t");
    for row in rows.iter().take(limit) {
        out.push('\n');
        out.push_str(&row.cells().join("\t"));
    }
    if rows.len() > limit {
        let _ = write!(out, "\n... {} more rows", rows.len() - limit);
    }
    out
}

pub fn render_index(index: &ArchiveIndex) -> String {
    let mut out = String::new();
    for entry in &index.entries {
        let _ = writeln!(out, "{}\t{}", entry.relative_path, entry.containing_folder);
    }
    for warning in &index.warnings {
        let _ = writeln!(out, "skipped {}: {}", warning.path, warning.message);
    }
    let _ = write!(out, "{} files", index.entries.len());
    out
}
