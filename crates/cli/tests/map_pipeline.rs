use assert_cmd::Command;
use auditmap_protocol::{MappingColumn, Table};
use auditmap_workbook::{Sheet, Workbook};
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

#[allow(deprecated)]
fn auditmap() -> Command {
    let mut cmd = Command::cargo_bin("auditmap").expect("binary");
    for var in [
        "AUDITMAP_CLIENT_ID",
        "AUDITMAP_CLIENT_SECRET",
        "AUDITMAP_ORG_SLUG",
        "AUDITMAP_API_BASE_URL",
        "AUDITMAP_AUTH_URL",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

const EVIDENCE_FILES: &[&str] = &[
    "ACME/evidence1.pdf",
    "Access review/screenshot.png",
    "acess reveiw/log.txt",
    "XYZ/doc.txt",
    "root.txt",
];

struct Fixture {
    temp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let temp = tempdir().unwrap();
        let root = temp.path();

        for rel in EVIDENCE_FILES {
            let path = root.join("archive").join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "evidence").unwrap();
        }

        fs::write(
            root.join("controls.csv"),
            "ID,Test name,Framework Requirement\nACME,Access review,CC6.1\n",
        )
        .unwrap();
        fs::write(root.join("evidence.csv"), "evidenceId,Name\nev-1,Policy\n").unwrap();

        let mut workbook = Workbook::new();
        workbook
            .put_sheet(Sheet::from_table(
                "Tests",
                &Table::new(
                    vec!["Reference ID".into(), "Test".into()],
                    vec![
                        vec!["T12".into(), "Access review".into()],
                        vec!["T20".into(), "Backups".into()],
                    ],
                ),
            ))
            .unwrap();
        workbook
            .put_sheet(Sheet::from_table(
                "evidence-index",
                &Table::new(vec!["stale".into()], vec![vec!["old".into()]]),
            ))
            .unwrap();
        fs::write(root.join("audit.xlsx"), workbook.to_xlsx_bytes().unwrap()).unwrap();

        Self { temp }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.temp.path().join(rel)
    }

    fn map_cmd(&self, archive: &Path) -> Command {
        let mut cmd = auditmap();
        cmd.arg("map")
            .arg("--archive")
            .arg(archive)
            .arg("--workbook")
            .arg(self.path("audit.xlsx"))
            .arg("--out")
            .arg(self.path("out.xlsx"))
            .arg("--controls")
            .arg(self.path("controls.csv"))
            .arg("--evidence")
            .arg(self.path("evidence.csv"));
        cmd
    }

    fn output_index(&self) -> Table {
        Workbook::from_xlsx_path(&self.path("out.xlsx"))
            .unwrap()
            .sheet_table("evidence-index")
            .unwrap()
    }
}

fn row_for<'a>(index: &'a Table, filename: &str) -> &'a [String] {
    index
        .rows
        .iter()
        .find(|row| row[0] == filename)
        .unwrap_or_else(|| panic!("no row for {filename}"))
}

#[test]
fn map_writes_reconciled_workbook() {
    let fx = Fixture::new();

    fx.map_cmd(&fx.path("archive"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 5 files"));

    let workbook = Workbook::from_xlsx_path(&fx.path("out.xlsx")).unwrap();
    assert_eq!(
        workbook.sheet_names(),
        vec!["Tests", "evidence-index", "all-evidence-vanta"]
    );
    assert_eq!(
        workbook.sheet_table("all-evidence-vanta").unwrap(),
        Table::new(
            vec!["evidenceId".into(), "Name".into()],
            vec![vec!["ev-1".into(), "Policy".into()]],
        )
    );

    let index = fx.output_index();
    assert_eq!(index.headers, MappingColumn::headers());
    assert_eq!(index.len(), 5);

    let acme = row_for(&index, "evidence1.pdf");
    assert_eq!(&acme[1..6], ["ACME/evidence1.pdf", "ACME", "ACME", "Access review", "T12"]);
    assert_eq!(acme[6], "CC6.1");
    assert_eq!(acme[8], "exact-control");

    let exact = row_for(&index, "screenshot.png");
    assert_eq!(exact[5], "T12");
    assert_eq!(exact[8], "exact-test");

    let fuzzy = row_for(&index, "log.txt");
    assert_eq!(fuzzy[3], "");
    assert_eq!(fuzzy[4], "Access review");
    assert_eq!(fuzzy[5], "T12");
    assert_eq!(fuzzy[8], "fuzzy");
    assert_eq!(fuzzy[9], "0.800");

    for filename in ["doc.txt", "root.txt"] {
        let row = row_for(&index, filename);
        assert_eq!(row[8], "unmatched");
        assert!(row[3..6].iter().all(String::is_empty), "{row:?}");
    }
}

#[test]
fn rerunning_map_on_its_output_is_idempotent() {
    let fx = Fixture::new();
    fx.map_cmd(&fx.path("archive")).assert().success();
    let first = fx.output_index();

    fs::copy(fx.path("out.xlsx"), fx.path("audit.xlsx")).unwrap();
    fx.map_cmd(&fx.path("archive")).assert().success();

    let workbook = Workbook::from_xlsx_path(&fx.path("out.xlsx")).unwrap();
    assert_eq!(workbook.sheets().len(), 3);
    assert_eq!(fx.output_index(), first);
}

#[test]
fn map_accepts_zip_archives() {
    let fx = Fixture::new();
    let zip_path = fx.path("evidence.zip");
    let mut zip = zip::ZipWriter::new(fs::File::create(&zip_path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    for rel in EVIDENCE_FILES {
        zip.start_file(*rel, options).unwrap();
        zip.write_all(b"evidence").unwrap();
    }
    zip.finish().unwrap();

    let output = fx
        .map_cmd(&zip_path)
        .arg("--json")
        .output()
        .expect("command run");
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(body["files"], 5);
    assert_eq!(body["stats"]["exact_control_rows"], 1);
    assert_eq!(body["stats"]["fuzzy_rows"], 1);
    assert_eq!(body["stats"]["unmatched_rows"], 2);
    assert!(body.get("preview").is_none());
}

#[test]
fn threshold_flag_tightens_fuzzy_matching() {
    let fx = Fixture::new();
    let output = fx
        .map_cmd(&fx.path("archive"))
        .args(["--threshold", "0.95", "--json", "--preview", "2"])
        .output()
        .expect("command run");
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(body["stats"]["fuzzy_rows"], 0);
    assert_eq!(body["stats"]["unmatched_rows"], 3);
    assert_eq!(body["preview"].as_array().map(Vec::len), Some(2));
}

#[test]
fn config_file_overrides_sheet_names() {
    let fx = Fixture::new();
    fs::write(
        fx.path("auditmap.toml"),
        "[sheets]\nevidence_index = \"mapping\"\n\n[matching]\nuse_control_taxonomy = false\n",
    )
    .unwrap();

    fx.map_cmd(&fx.path("archive"))
        .arg("--config")
        .arg(fx.path("auditmap.toml"))
        .assert()
        .success();

    let workbook = Workbook::from_xlsx_path(&fx.path("out.xlsx")).unwrap();
    let mapping = workbook.sheet_table("mapping").unwrap();
    // Without the control layer "ACME" is compared against test descriptions only
    assert_eq!(row_for(&mapping, "evidence1.pdf")[8], "unmatched");
    assert_eq!(workbook.sheet_table("evidence-index").unwrap().headers, vec!["stale"]);
}

#[test]
fn missing_archive_names_the_failing_stage() {
    let fx = Fixture::new();
    fx.map_cmd(&fx.path("no-such-archive"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("archive indexing failed"));
    assert!(!fx.path("out.xlsx").exists());
}

#[test]
fn empty_candidate_pool_is_an_input_error() {
    let fx = Fixture::new();
    fs::write(fx.path("tests.csv"), "Reference ID,Test\n").unwrap();

    fx.map_cmd(&fx.path("archive"))
        .arg("--tests")
        .arg(fx.path("tests.csv"))
        .arg("--no-control-taxonomy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("reconciliation failed"));
}

#[test]
fn index_lists_files_with_containing_folder() {
    let fx = Fixture::new();
    let output = auditmap()
        .arg("index")
        .arg(fx.path("archive"))
        .arg("--json")
        .output()
        .expect("command run");
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 5);
    let root_file = entries
        .iter()
        .find(|e| e["filename"] == "root.txt")
        .unwrap();
    assert_eq!(root_file["containing_folder"], "");
}

#[test]
fn api_commands_require_environment_credentials() {
    auditmap()
        .arg("list-audits")
        .assert()
        .failure()
        .stderr(predicate::str::contains("AUDITMAP_CLIENT_ID"));
}
