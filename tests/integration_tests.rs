//! Integration tests for the lagerkoll CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const SNAPSHOT: &str = r#"{
  "Partille": [
    {"MK": "VO", "Artikelnr": "30650", "Benämning": "Oljefilter", "Status": "J", "Lagerplats": "A12", "UpdatedAt": "2024-03-01T10:00:00Z"},
    {"MK": "VO", "Artikelnr": "30651", "Benämning": "Luftfilter", "Status": "B", "UpdatedAt": "2024-03-02T10:00:00Z"},
    {"MK": "SA", "Artikelnr": "12345", "Benämning": "Tändstift", "Status": "J", "UpdatedAt": "2024-03-03T10:00:00Z"}
  ],
  "Alingsås": [
    {"MK": "VO", "Artikelnr": "30650", "Benämning": "Oljefilter", "Status": "B", "UpdatedAt": "2024-02-01T10:00:00Z"},
    {"MK": "OP", "Artikelnr": "777", "Benämning": "Bromsskiva", "UpdatedAt": "2024-01-15T10:00:00Z"}
  ]
}"#;

/// Helper to get a lagerkoll command with a clean environment
fn lagerkoll() -> Command {
    let mut cmd = Command::cargo_bin("lagerkoll").unwrap();
    for var in [
        "LAGER_SOURCE",
        "LAGER_SNAPSHOT",
        "LAGER_DATABASE",
        "LAGER_PER_PAGE",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Helper to create a project with the sample snapshot in data/lager.json
fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    lagerkoll().current_dir(tmp.path()).arg("init").assert().success();
    fs::write(tmp.path().join("data/lager.json"), SNAPSHOT).unwrap();
    tmp
}

fn stdout_json(tmp: &TempDir, args: &[&str]) -> serde_json::Value {
    let output = lagerkoll()
        .current_dir(tmp.path())
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn artikelnrs(page: &serde_json::Value) -> Vec<String> {
    page["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["artikelnr"].as_str().unwrap().to_string())
        .collect()
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    lagerkoll()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("facets"))
        .stdout(predicate::str::contains("seed"));
}

#[test]
fn test_version_displays() {
    lagerkoll()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lagerkoll"));
}

#[test]
fn test_unknown_command_fails() {
    lagerkoll().arg("frobnicate").assert().failure();
}

// ============================================================================
// Init Tests
// ============================================================================

#[test]
fn test_init_creates_project_structure() {
    let tmp = TempDir::new().unwrap();
    lagerkoll()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized lagerkoll project"));

    assert!(tmp.path().join(".lager/config.yaml").exists());
    assert!(tmp.path().join(".lager/.gitignore").exists());
    assert!(tmp.path().join("data").is_dir());
}

#[test]
fn test_init_twice_requires_force() {
    let tmp = setup_test_project();
    fs::write(tmp.path().join(".lager/config.yaml"), "per_page: 3\n").unwrap();
    lagerkoll()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
    assert_eq!(
        fs::read_to_string(tmp.path().join(".lager/config.yaml")).unwrap(),
        "per_page: 3\n"
    );

    lagerkoll()
        .current_dir(tmp.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

// ============================================================================
// Validate Tests
// ============================================================================

#[test]
fn test_validate_configured_snapshot() {
    let tmp = setup_test_project();
    lagerkoll()
        .current_dir(tmp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 location(s)"))
        .stdout(predicate::str::contains("All snapshots passed"));
}

#[test]
fn test_validate_rejects_unknown_field() {
    let tmp = setup_test_project();
    let bad = tmp.path().join("bad.json");
    fs::write(&bad, r#"{"Partille": [{"MK": "VO", "Artikelnr": "1", "Pris": 99}]}"#).unwrap();

    lagerkoll()
        .current_dir(tmp.path())
        .args(["validate", "bad.json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("bad.json"));
}

#[test]
fn test_validate_rejects_malformed_json() {
    let tmp = setup_test_project();
    fs::write(tmp.path().join("broken.json"), "{\"Partille\": [").unwrap();

    lagerkoll()
        .current_dir(tmp.path())
        .args(["validate", "broken.json"])
        .assert()
        .failure();
}

#[test]
fn test_validate_keep_going_checks_every_file() {
    let tmp = setup_test_project();
    fs::write(tmp.path().join("bad.json"), r#"{"Partille": "nope"}"#).unwrap();

    lagerkoll()
        .current_dir(tmp.path())
        .args(["validate", "--keep-going", "bad.json", "data/lager.json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Files checked:  2"));
}

// ============================================================================
// List Tests
// ============================================================================

#[test]
fn test_list_default_table() {
    let tmp = setup_test_project();
    lagerkoll()
        .current_dir(tmp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("ARTIKELNR"))
        .stdout(predicate::str::contains("Oljefilter"))
        .stdout(predicate::str::contains("5 row(s)"));
}

#[test]
fn test_list_count() {
    let tmp = setup_test_project();
    lagerkoll()
        .current_dir(tmp.path())
        .args(["list", "--count"])
        .assert()
        .success()
        .stdout("5\n");
}

#[test]
fn test_list_search_matches_benamning() {
    let tmp = setup_test_project();
    let page = stdout_json(&tmp, &["list", "-f", "json", "--search", "filter"]);
    assert_eq!(page["total"], 3);
    let mut found = artikelnrs(&page);
    found.sort();
    assert_eq!(found, vec!["30650", "30650", "30651"]);
}

#[test]
fn test_list_status_filter() {
    let tmp = setup_test_project();
    let page = stdout_json(&tmp, &["list", "-f", "json", "--status", "B"]);
    assert_eq!(page["total"], 2);
    for row in page["data"].as_array().unwrap() {
        assert_eq!(row["status"], "B");
    }
}

#[test]
fn test_list_mk_and_location_filters() {
    let tmp = setup_test_project();
    let page = stdout_json(
        &tmp,
        &["list", "-f", "json", "--mk", "VO", "--location", "Alingsås"],
    );
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["artikelnr"], "30650");
}

#[test]
fn test_list_paging() {
    let tmp = setup_test_project();
    let page = stdout_json(
        &tmp,
        &["list", "-f", "json", "--per-page", "2", "--page", "3", "--sort", "artikelnr"],
    );
    assert_eq!(page["total"], 5);
    assert_eq!(page["pageCount"], 3);
    assert_eq!(page["data"].as_array().unwrap().len(), 1);
}

#[test]
fn test_list_sort_descending() {
    let tmp = setup_test_project();
    let page = stdout_json(&tmp, &["list", "-f", "json", "--sort", "artikelnr:desc"]);
    assert_eq!(artikelnrs(&page)[0], "777");
}

#[test]
fn test_list_where_clause() {
    let tmp = setup_test_project();
    let page = stdout_json(&tmp, &["list", "-f", "json", "--where", "mk:eq:SA"]);
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["artikelnr"], "12345");
}

#[test]
fn test_list_where_clauses_joined_with_or() {
    let tmp = setup_test_project();
    let page = stdout_json(
        &tmp,
        &[
            "list", "-f", "json", "--where", "mk:eq:SA", "--where", "mk:eq:OP", "--join", "or",
        ],
    );
    assert_eq!(page["total"], 2);
}

#[test]
fn test_list_input_query_file() {
    let tmp = setup_test_project();
    fs::write(
        tmp.path().join("query.json"),
        r#"{"page": 1, "perPage": 10, "sort": [{"id": "artikelnr", "desc": false}], "location": ["Partille"]}"#,
    )
    .unwrap();
    let page = stdout_json(&tmp, &["list", "-f", "json", "--input", "query.json"]);
    assert_eq!(page["total"], 3);
}

#[test]
fn test_list_csv_header() {
    let tmp = setup_test_project();
    lagerkoll()
        .current_dir(tmp.path())
        .args(["list", "-f", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("mk,artikelnr,benamning"));
}

#[test]
fn test_list_no_matches() {
    let tmp = setup_test_project();
    lagerkoll()
        .current_dir(tmp.path())
        .args(["list", "--search", "finnsinte"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No inventory rows found"));
}

#[test]
fn test_list_zero_per_page_rejected() {
    let tmp = setup_test_project();
    lagerkoll()
        .current_dir(tmp.path())
        .args(["list", "--per-page", "0"])
        .assert()
        .failure();
}

#[test]
fn test_list_missing_snapshot_fails_with_help() {
    let tmp = TempDir::new().unwrap();
    lagerkoll()
        .current_dir(tmp.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("snapshot not found"));
}

#[test]
fn test_list_lenient_missing_snapshot_gives_empty_page() {
    let tmp = TempDir::new().unwrap();
    lagerkoll()
        .current_dir(tmp.path())
        .args(["list", "--lenient", "--count"])
        .assert()
        .success()
        .stdout("0\n");

    let page = stdout_json(&tmp, &["list", "--lenient", "-f", "json"]);
    assert_eq!(page["total"], 0);
    assert_eq!(page["pageCount"], 0);
    assert!(page["data"].as_array().unwrap().is_empty());
}

#[test]
fn test_list_lenient_unreadable_store_gives_empty_page() {
    let tmp = setup_test_project();
    fs::write(tmp.path().join(".lager/lager.db"), "this is not a database\n".repeat(200)).unwrap();

    lagerkoll()
        .current_dir(tmp.path())
        .args(["--source", "store", "list", "--count"])
        .assert()
        .failure();
    lagerkoll()
        .current_dir(tmp.path())
        .args(["--source", "store", "list", "--lenient", "--count"])
        .assert()
        .success()
        .stdout("0\n");
}

#[test]
fn test_list_lenient_with_readable_snapshot_returns_rows() {
    let tmp = setup_test_project();
    lagerkoll()
        .current_dir(tmp.path())
        .args(["list", "--lenient", "--count"])
        .assert()
        .success()
        .stdout("5\n");
}

// ============================================================================
// Facets & Show Tests
// ============================================================================

#[test]
fn test_facets_json() {
    let tmp = setup_test_project();
    let facets = stdout_json(&tmp, &["facets", "-f", "json"]);
    assert_eq!(facets["status"]["J"], 2);
    assert_eq!(facets["status"]["B"], 2);

    let locations: Vec<&str> = facets["location"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["value"].as_str().unwrap())
        .collect();
    assert!(locations.contains(&"Partille"));
    assert!(locations.contains(&"Alingsås"));
}

#[test]
fn test_facets_single_kind() {
    let tmp = setup_test_project();
    let facets = stdout_json(&tmp, &["facets", "mk", "-f", "json"]);
    assert!(facets.get("status").is_none());
    assert!(facets["mk"].as_array().unwrap().len() >= 3);
}

#[test]
fn test_show_article_across_locations() {
    let tmp = setup_test_project();
    lagerkoll()
        .current_dir(tmp.path())
        .args(["show", "VO", "30650"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Partille"))
        .stdout(predicate::str::contains("Alingsås"))
        .stdout(predicate::str::contains("Lager (2)"));
}

#[test]
fn test_show_unknown_article_fails() {
    let tmp = setup_test_project();
    lagerkoll()
        .current_dir(tmp.path())
        .args(["show", "VO", "99999"])
        .assert()
        .failure();
}

// ============================================================================
// Store Tests
// ============================================================================

#[test]
fn test_seed_then_query_store_matches_snapshot() {
    let tmp = setup_test_project();
    lagerkoll()
        .current_dir(tmp.path())
        .arg("seed")
        .assert()
        .success()
        .stdout(predicate::str::contains("Seeded"));
    assert!(tmp.path().join(".lager/lager.db").exists());

    let args = ["list", "-f", "json", "--status", "J", "--sort", "artikelnr"];
    let from_snapshot = stdout_json(&tmp, &args);
    let mut store_args = vec!["--source", "store"];
    store_args.extend(args);
    let from_store = stdout_json(&tmp, &store_args);

    assert_eq!(from_snapshot["total"], from_store["total"]);
    assert_eq!(artikelnrs(&from_snapshot), artikelnrs(&from_store));
}

#[test]
fn test_sync_reports_up_to_date() {
    let tmp = setup_test_project();
    lagerkoll().current_dir(tmp.path()).arg("seed").assert().success();
    lagerkoll()
        .current_dir(tmp.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));
}

#[test]
fn test_sync_removes_dropped_rows() {
    let tmp = setup_test_project();
    lagerkoll().current_dir(tmp.path()).arg("seed").assert().success();

    fs::write(
        tmp.path().join("data/lager.json"),
        r#"{"Partille": [{"MK": "VO", "Artikelnr": "30650", "Status": "J"}]}"#,
    )
    .unwrap();
    lagerkoll()
        .current_dir(tmp.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("removed"));

    lagerkoll()
        .current_dir(tmp.path())
        .args(["--source", "store", "list", "--count"])
        .assert()
        .success()
        .stdout("1\n");
}

#[test]
fn test_seed_invalid_snapshot_leaves_no_store() {
    let tmp = setup_test_project();
    fs::write(tmp.path().join("data/lager.json"), r#"{"Partille": 3}"#).unwrap();
    lagerkoll().current_dir(tmp.path()).arg("seed").assert().failure();
    assert!(!tmp.path().join(".lager/lager.db").exists());
}

#[test]
fn test_store_status_and_clear() {
    let tmp = setup_test_project();
    lagerkoll().current_dir(tmp.path()).arg("seed").assert().success();

    let status = stdout_json(&tmp, &["store", "status", "-f", "json"]);
    assert_eq!(status["inventory"], 5);
    assert_eq!(status["locations"], 2);

    lagerkoll()
        .current_dir(tmp.path())
        .args(["store", "clear", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Store cleared"));

    let status = stdout_json(&tmp, &["store", "status", "-f", "json"]);
    assert_eq!(status["inventory"], 0);
}

#[test]
fn test_store_status_without_store() {
    let tmp = setup_test_project();
    lagerkoll()
        .current_dir(tmp.path())
        .args(["store", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No store"));
}

// ============================================================================
// Schema, Config & Completions Tests
// ============================================================================

#[test]
fn test_schema_prints_embedded_schema() {
    lagerkoll()
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("Lager snapshot"));
}

#[test]
fn test_schema_fields() {
    lagerkoll()
        .args(["schema", "--fields"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Artikelnr"))
        .stdout(predicate::str::contains("UpdatedAt"));
}

#[test]
fn test_config_show_json() {
    let tmp = setup_test_project();
    fs::write(tmp.path().join(".lager/config.yaml"), "per_page: 25\n").unwrap();
    let config = stdout_json(&tmp, &["config", "show", "-f", "json"]);
    assert_eq!(config["per_page"], 25);
}

#[test]
fn test_config_per_page_applies_to_list() {
    let tmp = setup_test_project();
    fs::write(tmp.path().join(".lager/config.yaml"), "per_page: 2\n").unwrap();
    let page = stdout_json(&tmp, &["list", "-f", "json"]);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["pageCount"], 3);
}

#[test]
fn test_config_keys() {
    lagerkoll()
        .args(["config", "keys"])
        .assert()
        .success()
        .stdout(predicate::str::contains("per_page"));
}

#[test]
fn test_completions_bash() {
    lagerkoll()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lagerkoll"));
}

#[test]
fn test_browse_requires_terminal() {
    let tmp = setup_test_project();
    lagerkoll()
        .current_dir(tmp.path())
        .arg("browse")
        .assert()
        .failure()
        .stderr(predicate::str::contains("interactive terminal"));
}
