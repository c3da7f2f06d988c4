use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tempfile::TempDir;

fn squid_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("squid");
    path
}

/// Create a SQLite file at `path` by running `statements`.
fn create_db(path: &Path, statements: &[&str]) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let mut conn = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();
        for sql in statements {
            sqlx::query(sql).execute(&mut conn).await.unwrap();
        }
        conn.close().await.unwrap();
    });
}

const PLACES_V47: &[&str] = &[
    "CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url LONGVARCHAR, title LONGVARCHAR, \
     visit_count INTEGER DEFAULT 0)",
    "CREATE TABLE moz_bookmarks (id INTEGER PRIMARY KEY, fk INTEGER DEFAULT NULL, title LONGVARCHAR)",
];

const PLACES_V48: &[&str] = &[
    "CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url LONGVARCHAR, title LONGVARCHAR, \
     visit_count INTEGER DEFAULT 0, frecency INTEGER NOT NULL DEFAULT -1)",
    "CREATE TABLE moz_bookmarks (id INTEGER PRIMARY KEY, fk INTEGER DEFAULT NULL, title LONGVARCHAR)",
];

const SKYPE_MAIN: &[&str] = &[
    "CREATE TABLE Accounts (id INTEGER NOT NULL PRIMARY KEY, skypename TEXT, fullname TEXT)",
    "CREATE TABLE Messages (id INTEGER NOT NULL PRIMARY KEY, author TEXT, body_xml TEXT, timestamp INTEGER)",
];

struct TestEnv {
    _tmp: TempDir,
    root: PathBuf,
    config_path: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();

        let config_dir = root.join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::create_dir_all(root.join("data")).unwrap();
        fs::create_dir_all(root.join("reports")).unwrap();

        let config_content = format!(
            r#"[catalog]
path = "{root}/data/catalog.sqlite"

[extract]
timeout_secs = 5

[compare]
high_confidence = 90.0
output_dir = "{root}/reports"

[learn]
on_match = "merge"
"#,
            root = root.display()
        );

        let config_path = config_dir.join("squid.toml");
        fs::write(&config_path, config_content).unwrap();

        Self {
            _tmp: tmp,
            root,
            config_path,
        }
    }

    fn dir(&self, name: &str) -> PathBuf {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn run(&self, args: &[&str]) -> (String, String, bool) {
        let binary = squid_binary();
        let output = Command::new(&binary)
            .current_dir(&self.root)
            .arg("--config")
            .arg(self.config_path.to_str().unwrap())
            .args(args)
            .output()
            .unwrap_or_else(|e| panic!("Failed to run squid binary at {:?}: {}", binary, e));

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        (stdout, stderr, output.status.success())
    }

    fn reports(&self) -> Vec<PathBuf> {
        let mut reports: Vec<PathBuf> = fs::read_dir(self.root.join("reports"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        reports.sort();
        reports
    }
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_init_creates_catalog() {
    let env = TestEnv::new();

    let (stdout, stderr, success) = env.run(&["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(env.root.join("data/catalog.sqlite").exists());

    let (_, _, again) = env.run(&["init"]);
    assert!(again, "Second init failed (not idempotent)");
}

#[test]
fn test_learn_then_compare_finds_exact_match() {
    let env = TestEnv::new();
    let known = env.dir("known");
    create_db(&known.join("places.sqlite"), PLACES_V47);

    env.run(&["init"]);
    let (stdout, stderr, success) = env.run(&[
        "learn",
        path_str(&known),
        "--program",
        "Firefox",
        "--version",
        "47",
        "--family",
        "Browser",
    ]);
    assert!(success, "learn failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("1 new"), "got: {}", stdout);

    let unknown = env.dir("evidence");
    create_db(&unknown.join("recovered-0001.db"), PLACES_V47);
    let (stdout, stderr, success) = env.run(&["compare", path_str(&unknown)]);
    assert!(success, "compare failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("recovered-0001.db"), "got: {}", stdout);
    assert!(stdout.contains("100.0%"), "got: {}", stdout);
    assert!(stdout.contains("Firefox"), "got: {}", stdout);

    let reports = env.reports();
    assert_eq!(reports.len(), 1);
    let name = reports[0].file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("SQUID Matches ("), "got: {}", name);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&reports[0]).unwrap()).unwrap();
    assert_eq!(json[0]["file_name"], "recovered-0001.db");
    assert_eq!(json[0]["top_three"][0]["score"], 100.0);
    assert_eq!(json[0]["top_three"][0]["program_name"], "Firefox");
    assert_eq!(json[0]["top_three"][0]["program_family"], "Browser");
}

#[test]
fn test_compare_ranks_closest_first() {
    let env = TestEnv::new();
    let ff = env.dir("ff47");
    let skype = env.dir("skype");
    create_db(&ff.join("places.sqlite"), PLACES_V47);
    create_db(&skype.join("main.db"), SKYPE_MAIN);

    env.run(&["init"]);
    env.run(&["learn", path_str(&ff), "--program", "Firefox", "--version", "47"]);
    env.run(&["learn", path_str(&skype), "--program", "Skype", "--version", "7"]);

    // A newer Firefox: similar but not identical to the catalogued one.
    let evidence = env.dir("evidence");
    create_db(&evidence.join("unknown.sqlite"), PLACES_V48);
    let (stdout, stderr, success) =
        env.run(&["compare", path_str(&evidence), "--output", "case-12"]);
    assert!(success, "compare failed: stdout={}, stderr={}", stdout, stderr);

    let report = env.root.join("reports/case-12.json");
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(report).unwrap()).unwrap();
    let top = json[0]["top_three"].as_array().unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0]["program_name"], "Firefox");
    assert_eq!(top[1]["program_name"], "Skype");
    let best = top[0]["score"].as_f64().unwrap();
    assert!(best > 50.0 && best < 100.0, "got: {}", best);
    assert_eq!(top[1]["score"], 0.0);
}

#[test]
fn test_learn_twice_is_idempotent() {
    let env = TestEnv::new();
    let known = env.dir("known");
    create_db(&known.join("main.db"), SKYPE_MAIN);

    env.run(&["init"]);
    let args = [
        "learn",
        path_str(&known),
        "--program",
        "Skype",
        "--version",
        "7",
    ];
    env.run(&args);
    let (stdout, _, success) = env.run(&args);
    assert!(success);
    assert!(stdout.contains("1 already known"), "got: {}", stdout);

    let (stdout, _, success) = env.run(&["stats"]);
    assert!(success);
    assert!(stdout.contains("Records:     1"), "got: {}", stdout);
}

#[test]
fn test_learn_new_version_merges() {
    let env = TestEnv::new();
    let known = env.dir("known");
    create_db(&known.join("main.db"), SKYPE_MAIN);

    env.run(&["init"]);
    for version in ["7", "10", "8"] {
        let (stdout, stderr, success) = env.run(&[
            "learn",
            path_str(&known),
            "--program",
            "Skype",
            "--version",
            version,
            "--family",
            "Chat",
        ]);
        assert!(success, "learn failed: stdout={}, stderr={}", stdout, stderr);
    }

    let evidence = env.dir("evidence");
    create_db(&evidence.join("x.db"), SKYPE_MAIN);
    env.run(&["compare", path_str(&evidence), "--output", "merged"]);

    let json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(env.root.join("reports/merged.json")).unwrap(),
    )
    .unwrap();
    let best = &json[0]["top_three"][0];
    assert_eq!(best["program_versions"], serde_json::json!(["7", "8", "10"]));
    assert_eq!(best["version_label"], "7 - 10");

    let (stdout, _, _) = env.run(&["stats"]);
    assert!(stdout.contains("Chat"), "got: {}", stdout);
    assert!(stdout.contains("Skype"), "got: {}", stdout);
}

#[test]
fn test_non_database_files_are_skipped() {
    let env = TestEnv::new();
    let known = env.dir("known");
    create_db(&known.join("main.db"), SKYPE_MAIN);
    fs::write(known.join("notes.txt"), "not a database ".repeat(50)).unwrap();

    env.run(&["init"]);
    let (stdout, stderr, success) =
        env.run(&["learn", path_str(&known), "--program", "Skype", "--version", "7"]);
    assert!(success, "learn failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("1 new"), "got: {}", stdout);
    assert!(stdout.contains("1 skipped"), "got: {}", stdout);

    let evidence = env.dir("evidence");
    create_db(&evidence.join("a.db"), SKYPE_MAIN);
    fs::write(evidence.join("b.bin"), [0u8, 1, 2, 3].repeat(300)).unwrap();
    let (stdout, stderr, success) = env.run(&["compare", path_str(&evidence)]);
    assert!(success, "compare failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Compared 1 file(s), 1 skipped"), "got: {}", stdout);
}

#[test]
fn test_learn_is_one_level_compare_is_recursive() {
    let env = TestEnv::new();
    let known = env.dir("known");
    fs::create_dir_all(known.join("nested")).unwrap();
    create_db(&known.join("nested/main.db"), SKYPE_MAIN);

    env.run(&["init"]);
    let (stdout, _, success) =
        env.run(&["learn", path_str(&known), "--program", "Skype", "--version", "7"]);
    assert!(success);
    assert!(stdout.contains("Learned 0 file(s)"), "got: {}", stdout);

    create_db(&known.join("main.db"), SKYPE_MAIN);
    env.run(&["learn", path_str(&known), "--program", "Skype", "--version", "7"]);

    let (stdout, _, success) = env.run(&["compare", path_str(&known)]);
    assert!(success);
    assert!(stdout.contains("Compared 2 file(s)"), "got: {}", stdout);
}

#[test]
fn test_compare_single_file_with_name() {
    let env = TestEnv::new();
    let known = env.dir("known");
    create_db(&known.join("main.db"), SKYPE_MAIN);
    env.run(&["init"]);
    env.run(&["learn", path_str(&known), "--program", "Skype", "--version", "7"]);

    let file = known.join("main.db");
    let (stdout, _, success) = env.run(&["compare", path_str(&file), "--name", "exhibit-3"]);
    assert!(success);
    assert!(stdout.contains("exhibit-3"), "got: {}", stdout);
    // Single files only produce a report when asked.
    assert!(env.reports().is_empty());
}

#[test]
fn test_compare_empty_catalog_fails() {
    let env = TestEnv::new();
    let evidence = env.dir("evidence");
    create_db(&evidence.join("a.db"), SKYPE_MAIN);

    env.run(&["init"]);
    let (_, stderr, success) = env.run(&["compare", path_str(&evidence)]);
    assert!(!success);
    assert!(stderr.contains("catalog"), "got: {}", stderr);
}

#[test]
fn test_invalid_invocations_fail() {
    let env = TestEnv::new();
    env.run(&["init"]);

    let (_, _, success) = env.run(&["learn", "somewhere"]);
    assert!(!success, "learn without --program/--version should fail");

    let missing = env.root.join("does-not-exist");
    let (_, _, success) = env.run(&[
        "learn",
        path_str(&missing),
        "--program",
        "X",
        "--version",
        "1",
    ]);
    assert!(!success, "learn on a missing path should fail");

    let (_, _, success) = env.run(&["frobnicate"]);
    assert!(!success);
}
