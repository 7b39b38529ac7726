//! The `map` pipeline: archive -> inventory -> taxonomy -> evidence ->
//! reconciliation -> workbook.
//!
//! Every stage is wrapped in an `anyhow` context naming it, so a fatal error
//! reads as "taxonomy load failed: ..." rather than a bare parse message.

use crate::config::FileConfig;
use anyhow::{Context, Result};
use auditmap_evidence::{load_from_json, load_from_table, EvidencePage};
use auditmap_indexer::{extract_zip, ArchiveIndex, ArchiveIndexer, IndexWarning};
use auditmap_protocol::{EvidenceSourceRecord, MappingRow, Table};
use auditmap_reconcile::{ReconcileStats, Reconciler};
use auditmap_taxonomy::{LoadWarning, Taxonomy};
use auditmap_workbook::{write_report, Workbook};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct MapRequest {
    /// Evidence archive: a `.zip` file or an already-extracted directory
    pub archive: PathBuf,
    pub workbook: PathBuf,
    pub out: PathBuf,
    pub controls: Option<PathBuf>,
    pub tests: Option<PathBuf>,
    pub evidence: Option<PathBuf>,
    pub config: FileConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapOutcome {
    pub archive: PathBuf,
    pub out: PathBuf,
    pub files: usize,
    pub evidence_records: usize,
    pub stats: ReconcileStats,
    pub index_warnings: Vec<IndexWarning>,
    pub taxonomy_warnings: Vec<LoadWarning>,
    #[serde(skip)]
    pub rows: Vec<MappingRow>,
}

pub fn run_map(request: &MapRequest) -> Result<MapOutcome> {
    let sheets = &request.config.sheets;

    let index = index_archive(&request.archive).context("archive indexing failed")?;
    log::info!(
        "Indexed {} evidence files from {}",
        index.entries.len(),
        request.archive.display()
    );

    let mut workbook = Workbook::from_xlsx_path(&request.workbook).with_context(|| {
        format!("workbook read failed: {}", request.workbook.display())
    })?;

    let taxonomy = load_taxonomy(request, &workbook).context("taxonomy load failed")?;
    for warning in &taxonomy.warnings {
        log::warn!("{warning}");
    }

    let (evidence_table, evidence) =
        load_evidence(request.evidence.as_deref(), &workbook, &sheets.all_evidence)
            .context("evidence load failed")?;

    let reconciliation = Reconciler::new(request.config.matching.clone(), &taxonomy)
        .and_then(|reconciler| reconciler.reconcile(&index.entries, &evidence))
        .context("reconciliation failed")?;

    let bytes = write_report(
        &mut workbook,
        &reconciliation.rows,
        &evidence_table,
        &sheets.report(),
    )
    .context("report write failed")?;
    std::fs::write(&request.out, bytes)
        .with_context(|| format!("report write failed: {}", request.out.display()))?;

    Ok(MapOutcome {
        archive: request.archive.clone(),
        out: request.out.clone(),
        files: index.entries.len(),
        evidence_records: evidence.len(),
        stats: reconciliation.stats,
        index_warnings: index.warnings,
        taxonomy_warnings: taxonomy.warnings,
        rows: reconciliation.rows,
    })
}

/// Inventory a directory in place, or a zip after extracting it to scratch space.
pub fn index_archive(path: &Path) -> Result<ArchiveIndex> {
    if path.is_file() {
        let scratch = tempfile::tempdir().context("Failed to create extraction directory")?;
        extract_zip(path, scratch.path())?;
        return Ok(ArchiveIndexer::new(scratch.path()).index()?);
    }
    Ok(ArchiveIndexer::new(path).index()?)
}

fn load_taxonomy(request: &MapRequest, workbook: &Workbook) -> Result<Taxonomy> {
    let controls = match &request.controls {
        Some(path) => Some(read_csv(path)?),
        None => None,
    };

    let tests = match &request.tests {
        Some(path) => Some(read_csv(path)?),
        None => {
            let name = &request.config.sheets.tests;
            let sheet = workbook.sheet(name).map(|s| s.to_table());
            if sheet.is_none() {
                log::warn!("Workbook has no '{name}' sheet; test taxonomy is empty");
            }
            sheet
        }
    };

    Ok(Taxonomy::load(controls.as_ref(), tests.as_ref())?)
}

/// Evidence for the all-evidence view plus the records used for ID tagging.
///
/// Without an explicit export the workbook's current all-evidence sheet is
/// carried over unchanged.
fn load_evidence(
    path: Option<&Path>,
    workbook: &Workbook,
    sheet: &str,
) -> Result<(Table, Vec<EvidenceSourceRecord>)> {
    let Some(path) = path else {
        let Some(existing) = workbook.sheet(sheet) else {
            log::info!("No evidence export given and no '{sheet}' sheet; writing it empty");
            return Ok((Table::default(), Vec::new()));
        };
        let table = existing.to_table();
        let records = match load_from_table(&table) {
            Ok(set) => set.records,
            Err(err) => {
                log::warn!("Existing '{sheet}' sheet is not usable for evidence IDs: {err}");
                Vec::new()
            }
        };
        return Ok((table, records));
    };

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let body: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        let set = load_from_json(EvidencePage::from_response(body)?.records)?;
        Ok((set.to_table(), set.records))
    } else {
        let table = read_csv(path)?;
        let set = load_from_table(&table)?;
        Ok((table, set.records))
    }
}

fn read_csv(path: &Path) -> Result<Table> {
    Table::from_csv_path(path).with_context(|| format!("Failed to read {}", path.display()))
}
