#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn engagerunner(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("engagerunner").unwrap();
    cmd.current_dir(dir.path())
        .env("ENGAGERUNNER_HOME", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn init(dir: &TempDir) {
    engagerunner(dir)
        .args(["init", "--channel", "https://www.youtube.com/@test"])
        .assert()
        .success();
}

const LIST_ONE_VIDEO: &str = r#"echo '{"url":"https://youtu.be/v1","title":"First"}'"#;
const DISCOVER_TWO: &str = r#"printf '%s\n' '{"id":"c1","posted":"1 day ago","author":"@a","text":"great video"}' '{"id":"c2","posted":"2 hours ago","author":"@b","text":"thanks"}'"#;

/// Point the bridge at the given shell commands and remove pacing delays.
fn configure_bridge(dir: &TempDir, discover: &str, perform: &str) {
    let path = dir.path().join("config.yaml");
    let mut cfg: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    cfg["bridge"]["list_videos"] = LIST_ONE_VIDEO.into();
    cfg["bridge"]["discover"] = discover.into();
    cfg["bridge"]["perform"] = perform.into();
    cfg["pacing"]["min_delay_secs"] = 0.0f64.into();
    cfg["pacing"]["max_delay_secs"] = 0.0f64.into();
    cfg["engage"]["action_retry_delay_ms"] = 0u64.into();
    std::fs::write(&path, serde_yaml::to_string(&cfg).unwrap()).unwrap();
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

// ---------------------------------------------------------------------------
// engagerunner init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_starter_config() {
    let dir = TempDir::new().unwrap();
    engagerunner(&dir)
        .args(["init", "--channel", "https://www.youtube.com/@test"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created: config.yaml"));

    let content = std::fs::read_to_string(dir.path().join("config.yaml")).unwrap();
    assert!(content.contains("https://www.youtube.com/@test"));
    assert!(content.contains("heart-recent"));
}

#[test]
fn init_keeps_existing_config_unless_forced() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    engagerunner(&dir)
        .args(["init", "--channel", "https://www.youtube.com/@other"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:"));
    let content = std::fs::read_to_string(dir.path().join("config.yaml")).unwrap();
    assert!(content.contains("@test"));

    engagerunner(&dir)
        .args(["init", "--force", "--channel", "https://www.youtube.com/@other"])
        .assert()
        .success();
    let content = std::fs::read_to_string(dir.path().join("config.yaml")).unwrap();
    assert!(content.contains("@other"));
}

#[test]
fn commands_require_init() {
    let dir = TempDir::new().unwrap();
    engagerunner(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

// ---------------------------------------------------------------------------
// engagerunner config
// ---------------------------------------------------------------------------

#[test]
fn config_validate_reports_unset_bridge_as_warnings() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    engagerunner(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[warning] bridge.perform is not set"));
}

#[test]
fn config_validate_fails_on_inverted_pacing() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    let path = dir.path().join("config.yaml");
    let content = std::fs::read_to_string(&path)
        .unwrap()
        .replace("min_delay_secs: 2.0", "min_delay_secs: 9.0");
    std::fs::write(&path, content).unwrap();

    engagerunner(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn config_show_json_has_defaults() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    let cfg = json_stdout(engagerunner(&dir).args(["-j", "config", "show"]));
    assert_eq!(cfg["engage"]["max_action_retries"], 2);
    assert_eq!(cfg["defaults"]["scenario"], "heart-recent");
}

// ---------------------------------------------------------------------------
// engagerunner engage
// ---------------------------------------------------------------------------

#[test]
fn engage_dry_run_touches_nothing() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    configure_bridge(&dir, DISCOVER_TWO, "exit 1");

    let out = json_stdout(engagerunner(&dir).args(["-j", "engage", "--dry-run"]));
    assert_eq!(out["summary"]["would_act"], 2);
    assert_eq!(out["summary"]["succeeded"], 0);
    assert_eq!(out["report"]["dry_run"], true);

    let stats = json_stdout(engagerunner(&dir).args(["-j", "ledger", "stats"]));
    assert_eq!(stats["successes"], 0);
}

#[test]
fn engage_records_and_second_run_skips() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    configure_bridge(&dir, DISCOVER_TWO, r#"test "$ENGAGE_ACTION" = heart"#);

    let first = json_stdout(engagerunner(&dir).args(["-j", "engage"]));
    assert_eq!(first["summary"]["succeeded"], 2);

    engagerunner(&dir)
        .args(["ledger", "check", "c1", "heart"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already performed"));
    engagerunner(&dir)
        .args(["ledger", "check", "c1", "like"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not performed"));

    let second = json_stdout(engagerunner(&dir).args(["-j", "engage"]));
    assert_eq!(second["summary"]["duplicates"], 2);
    assert_eq!(second["summary"]["succeeded"], 0);
}

#[test]
fn engage_table_output() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    configure_bridge(&dir, DISCOVER_TWO, "true");

    engagerunner(&dir)
        .arg("engage")
        .assert()
        .success()
        .stdout(predicate::str::contains("scenario 'heart-recent'"))
        .stdout(predicate::str::contains("OUTCOME"))
        .stdout(predicate::str::contains("succeeded:"));
}

#[test]
fn engage_fatal_perform_fails_the_run() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    configure_bridge(&dir, DISCOVER_TWO, "echo 'signed out' >&2; exit 3");

    engagerunner(&dir)
        .arg("engage")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed fatally"))
        .stderr(predicate::str::contains("signed out"));
}

#[test]
fn engage_unknown_scenario_fails() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    engagerunner(&dir)
        .args(["engage", "--scenario", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("scenario not found: nope"));
}

// ---------------------------------------------------------------------------
// engagerunner ledger / videos
// ---------------------------------------------------------------------------

#[test]
fn ledger_list_empty() {
    let dir = TempDir::new().unwrap();
    engagerunner(&dir)
        .args(["ledger", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No records."));
}

#[test]
fn ledger_check_rejects_unknown_action() {
    let dir = TempDir::new().unwrap();
    engagerunner(&dir)
        .args(["ledger", "check", "c1", "subscribe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown action"));
}

#[test]
fn videos_lists_selection() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    configure_bridge(&dir, DISCOVER_TWO, "true");

    let videos = json_stdout(engagerunner(&dir).args(["-j", "videos"]));
    assert_eq!(videos[0]["url"], "https://youtu.be/v1");
    assert_eq!(videos[0]["title"], "First");
}

// ---------------------------------------------------------------------------
// engagerunner reply
// ---------------------------------------------------------------------------

#[test]
fn reply_without_keys_exhausts_chain() {
    let dir = TempDir::new().unwrap();
    init(&dir);
    engagerunner(&dir)
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("ANTHROPIC_API_KEY")
        .args(["reply", "--comment", "love this"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("no API key configured"))
        .stderr(predicate::str::contains("all providers exhausted"));
}
