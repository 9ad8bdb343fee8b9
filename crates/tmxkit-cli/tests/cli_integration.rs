use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde::Deserialize;
use std::{fs, path::Path, process::Command};

#[derive(Deserialize)]
#[allow(dead_code)]
struct AnalysisOut {
    files: usize,
    failed: usize,
    rows: Vec<Row>,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct Row {
    file: String,
    identity: String,
    created_segments: Option<u64>,
    changed_segments: Option<u64>,
    created_characters: Option<u64>,
    changed_characters: Option<u64>,
    status: String,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct FilterOut {
    files: Vec<FileStat>,
    removed: u64,
    failed: usize,
}

#[derive(Deserialize)]
#[allow(dead_code)]
struct FileStat {
    file: String,
    total_units: u64,
    removed_units: u64,
    status: String,
}

const MEMORY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tmx version="1.4">
  <header srclang="pl-PL"><prop type="targetlang">en-GB</prop></header>
  <body>
    <tu creationid="anna" creationdate="20240101T100000Z" changeid="anna" changedate="20240101T120000Z"><tuv xml:lang="pl-PL"><seg>a</seg></tuv><tuv xml:lang="en-GB"><seg>Hello</seg></tuv></tu>
    <tu creationid="anna" creationdate="20240102T100000Z" changeid="bob" changedate="20240105T100000Z"><tuv xml:lang="pl-PL"><seg>b</seg></tuv><tuv xml:lang="en-GB"><seg><bpt i="1">&lt;b&gt;</bpt>Test<ept i="1">&lt;/b&gt;</ept></seg></tuv></tu>
    <tu creationid="carl" creationdate="20240103T100000Z"><tuv xml:lang="pl-PL"><seg>c</seg></tuv><tuv xml:lang="en-GB"><seg>Bye</seg></tuv></tu>
  </body>
</tmx>
"#;

fn bin_cmd(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tmxkit").expect("tmxkit built");
    cmd.current_dir(cwd);
    cmd
}

fn setup() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().expect("tempdir");
    fs::create_dir(tmp.path().join("tm")).unwrap();
    fs::write(tmp.path().join("tm/memory.tmx"), MEMORY).unwrap();
    fs::write(tmp.path().join("tm/broken.tmx"), "<tmx><body><tu></body>").unwrap();
    tmp
}

fn decode_utf16le(bytes: &[u8]) -> String {
    assert_eq!(&bytes[..2], &[0xFF, 0xFE], "missing UTF-16LE BOM");
    let units: Vec<u16> = bytes[2..]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).unwrap()
}

#[test]
fn analyze_writes_semicolon_csv_with_bom() {
    let tmp = setup();
    let assert = bin_cmd(tmp.path())
        .args(["--quiet", "analyze", "--root", "tm"])
        .assert()
        .success();
    let out = assert.get_output().stdout.clone();
    assert!(out.starts_with(b"\xEF\xBB\xBF"));
    let text = String::from_utf8(out[3..].to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].starts_with("File;Total segments;Translator ID"));
    assert!(lines.iter().any(|l| l.starts_with("broken.tmx;-;-;") && l.contains(";ERROR: ")));
    assert!(lines.contains(&"memory.tmx;3;anna;2024.01.02;-;2;0;9;0;OK"));
    assert!(lines.contains(&"memory.tmx;3;bob;-;2024.01.05;0;1;0;4;OK"));
}

#[test]
fn analyze_json_to_file() {
    let tmp = setup();
    bin_cmd(tmp.path())
        .args(["--quiet", "analyze", "--root", "tm", "--format", "json", "--out-csv", "report/out.json"])
        .assert()
        .success();
    let raw = fs::read_to_string(tmp.path().join("report/out.json")).unwrap();
    let parsed: AnalysisOut = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(parsed.files, 2);
    assert_eq!(parsed.failed, 1);
    let carl = parsed.rows.iter().find(|r| r.identity == "carl").unwrap();
    assert_eq!(carl.created_characters, Some(3));
}

#[test]
fn analyze_missing_root_fails() {
    let tmp = tempfile::tempdir().unwrap();
    bin_cmd(tmp.path())
        .args(["--quiet", "analyze", "--root", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read input directory"));
}

#[test]
fn filter_removes_denied_units_and_logs() {
    let tmp = setup();
    fs::write(tmp.path().join("deny.txt"), "# cleanup\nANNA\n").unwrap();
    let assert = bin_cmd(tmp.path())
        .args(["--quiet", "filter", "--root", "tm", "--denylist", "deny.txt", "--out-dir", "out", "--json"])
        .assert()
        .success();

    let summary: FilterOut = serde_json::from_slice(&assert.get_output().stdout).expect("valid json");
    assert_eq!(summary.removed, 2);
    assert_eq!(summary.failed, 1);
    let mem = summary.files.iter().find(|f| f.file == "memory.tmx").unwrap();
    assert_eq!((mem.total_units, mem.removed_units), (3, 2));

    let text = decode_utf16le(&fs::read(tmp.path().join("out/memory_Updated.tmx")).unwrap());
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"utf-16\"?>\r\n<!DOCTYPE tmx SYSTEM \"tmx14.dtd\">\r\n"));
    assert!(text.contains("creationid=\"carl\""));
    assert!(!text.contains("creationid=\"anna\""));
    assert!(!tmp.path().join("out/broken_Updated.tmx").exists());

    let log = fs::read_to_string(tmp.path().join("out/cleanup.log")).unwrap();
    assert!(log.contains("SUCCESS: memory.tmx -> Removed 2 segments (Total checked: 3)."));
    assert!(log.contains("ERROR: "));
}

#[test]
fn filter_output_is_stable_on_second_pass() {
    let tmp = setup();
    fs::remove_file(tmp.path().join("tm/broken.tmx")).unwrap();
    fs::write(tmp.path().join("deny.txt"), "bob\n").unwrap();
    bin_cmd(tmp.path())
        .args(["--quiet", "filter", "--root", "tm", "--denylist", "deny.txt", "--out-dir", "pass1", "--match-change-id"])
        .assert()
        .success();
    bin_cmd(tmp.path())
        .args(["--quiet", "filter", "--root", "pass1", "--denylist", "deny.txt", "--out-dir", "pass2", "--match-change-id"])
        .assert()
        .success();

    let first = fs::read(tmp.path().join("pass1/memory_Updated.tmx")).unwrap();
    let second = fs::read(tmp.path().join("pass2/memory_Updated_Updated.tmx")).unwrap();
    assert_eq!(first, second);
    let log = fs::read_to_string(tmp.path().join("pass2/cleanup.log")).unwrap();
    assert!(log.contains("OK (NO CHANGES): memory_Updated.tmx"));
}

#[test]
fn filter_per_file_report() {
    let tmp = setup();
    fs::write(tmp.path().join("report.csv"), "memory;carl\nother.tmx;anna\n").unwrap();
    bin_cmd(tmp.path())
        .args(["--quiet", "filter", "--root", "tm", "--deny-report", "report.csv", "--out-dir", "out", "--output-encoding", "utf-8"])
        .assert()
        .success();
    let text = fs::read_to_string(tmp.path().join("out/memory_Updated.tmx")).unwrap();
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
    assert_eq!(text.matches("<tu ").count(), 2);
    assert!(!text.contains("carl"));
    assert!(text.contains("<bpt i='1'>"));
}

#[test]
fn filter_without_denylist_fails() {
    let tmp = setup();
    bin_cmd(tmp.path())
        .args(["--quiet", "filter", "--root", "tm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no denylist"));
}

#[test]
fn schema_dumps_report_shapes() {
    let tmp = tempfile::tempdir().unwrap();
    bin_cmd(tmp.path())
        .args(["--quiet", "schema", "--out-dir", "schemas"])
        .assert()
        .success();
    for name in [
        "analysis_row.schema.json",
        "analysis_summary.schema.json",
        "filter_file_stat.schema.json",
        "filter_summary.schema.json",
    ] {
        assert!(tmp.path().join("schemas").join(name).is_file(), "{name} missing");
    }
}
