use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Helper struct to manage test directories
struct TestFixture {
    _temp_dir: TempDir,
    config_dir: TempDir,
    left_dir: PathBuf,
    right_dir: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with left and right directories
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let left_dir = temp_dir.path().join("left");
        let right_dir = temp_dir.path().join("right");

        fs::create_dir(&left_dir).expect("Failed to create left dir");
        fs::create_dir(&right_dir).expect("Failed to create right dir");

        TestFixture {
            _temp_dir: temp_dir,
            config_dir: TempDir::new().expect("Failed to create config dir"),
            left_dir,
            right_dir,
        }
    }

    fn create_left_file<P: AsRef<Path>>(&self, path: P, content: &str) -> PathBuf {
        create_file(&self.left_dir, path, content)
    }

    fn create_right_file<P: AsRef<Path>>(&self, path: P, content: &str) -> PathBuf {
        create_file(&self.right_dir, path, content)
    }

    fn left(&self) -> &str {
        self.left_dir.to_str().unwrap()
    }

    fn right(&self) -> &str {
        self.right_dir.to_str().unwrap()
    }

    /// Run the binary with config and cache lookups isolated from the host
    fn run(&self, args: &[&str]) -> std::process::Output {
        let exe = env!("CARGO_BIN_EXE_treediff");
        let home = self.config_dir.path();
        Command::new(exe)
            .args(args)
            .env("XDG_CONFIG_HOME", home)
            .env("APPDATA", home)
            .env("HOME", home)
            .env("RUST_LOG", "warn")
            .output()
            .expect("Failed to execute command")
    }

    fn run_success(&self, args: &[&str]) -> String {
        let output = self.run(args);
        if !output.status.success() {
            eprintln!("STDOUT:\n{}", String::from_utf8_lossy(&output.stdout));
            eprintln!("STDERR:\n{}", String::from_utf8_lossy(&output.stderr));
            panic!("Command failed with status: {}", output.status);
        }
        String::from_utf8(output.stdout).expect("stdout not utf-8")
    }

    fn compare_json(&self, extra: &[&str]) -> Value {
        let mut args = vec!["compare", self.left(), self.right(), "--json"];
        args.extend_from_slice(extra);
        serde_json::from_str(&self.run_success(&args)).expect("invalid json output")
    }
}

fn create_file<P: AsRef<Path>>(base: &Path, path: P, content: &str) -> PathBuf {
    let file_path = base.join(path.as_ref());
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directories");
    }
    fs::write(&file_path, content).expect("Failed to write file");
    file_path
}

fn record<'a>(report: &'a Value, relative: &str) -> &'a Value {
    report["records"]
        .as_array()
        .expect("records array missing")
        .iter()
        .find(|r| r["relativePath"] == relative)
        .unwrap_or_else(|| panic!("no record for {}", relative))
}

#[test]
fn test_identical_directories() {
    let fixture = TestFixture::new();
    fixture.create_left_file("file1.txt", "Hello, world!");
    fixture.create_right_file("file1.txt", "Hello, world!");
    fixture.create_left_file("dir/file2.txt", "Test content");
    fixture.create_right_file("dir/file2.txt", "Test content");

    let report = fixture.compare_json(&[]);

    assert_eq!(report["summary"]["total"], 2);
    assert_eq!(report["summary"]["identical"], 2);
    for rec in report["records"].as_array().unwrap() {
        assert_eq!(rec["status"], "Identical");
        assert_eq!(rec["diffLineCount"], 0);
        assert_eq!(rec["diffLines"].as_array().unwrap().len(), 0);
    }
}

#[test]
fn test_modified_file_line_count() {
    let fixture = TestFixture::new();
    fixture.create_left_file("a.txt", "1\n2\n3\n");
    fixture.create_right_file("a.txt", "1\n2\n4\n");

    let report = fixture.compare_json(&[]);

    let rec = record(&report, "a.txt");
    assert_eq!(rec["status"], "Modified");
    assert_eq!(rec["diffLineCount"], 2);
    let lines: Vec<&str> = rec["diffLines"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l.as_str().unwrap())
        .collect();
    assert!(lines.contains(&"-3"));
    assert!(lines.contains(&"+4"));
    assert!(rec["leftPath"].as_str().unwrap().ends_with("a.txt"));
    assert!(rec["rightPath"].as_str().unwrap().ends_with("a.txt"));
}

#[test]
fn test_only_on_one_side() {
    let fixture = TestFixture::new();
    fixture.create_left_file("c.txt", "left only");
    fixture.create_right_file("d.txt", "right only");

    let report = fixture.compare_json(&[]);

    let left_only = record(&report, "c.txt");
    assert_eq!(left_only["status"], "OnlyInLeft");
    assert_eq!(left_only["diffLineCount"], 0);
    assert!(left_only["rightPath"].is_null());

    let right_only = record(&report, "d.txt");
    assert_eq!(right_only["status"], "OnlyInRight");
    assert!(right_only["leftPath"].is_null());
}

#[test]
fn test_ignore_rules() {
    let fixture = TestFixture::new();
    fixture.create_left_file("b/.git/config", "[core]");
    fixture.create_right_file("b/.git/config", "[other]");
    fixture.create_left_file(".DS_Store", "junk");
    fixture.create_left_file("build.log", "log");
    fixture.create_left_file("keep.txt", "k");
    fixture.create_right_file("keep.txt", "k");

    let report = fixture.compare_json(&[
        "--ignore-dir",
        ".git",
        "--ignore-file",
        ".DS_Store",
        "--ignore",
        "*.log",
    ]);

    let records = report["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["relativePath"], "keep.txt");
}

#[test]
#[cfg(target_os = "linux")]
fn test_config_file_ignore_rules() {
    let fixture = TestFixture::new();
    fixture.create_left_file("node_modules/pkg/index.js", "x");
    fixture.create_left_file("src/main.rs", "fn main() {}");
    fixture.create_right_file("src/main.rs", "fn main() {}");

    let config_path = fixture
        .config_dir
        .path()
        .join("treediff")
        .join("treediff.toml");
    fs::create_dir_all(config_path.parent().unwrap()).unwrap();
    fs::write(&config_path, "ignore_dirs = [\"node_modules\"]\n").unwrap();

    let report = fixture.compare_json(&[]);

    let records = report["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["relativePath"], "src/main.rs");
}

#[test]
fn test_swapped_roots() {
    let fixture = TestFixture::new();
    fixture.create_left_file("only_left.txt", "l");
    fixture.create_left_file("mod.txt", "old\n");
    fixture.create_right_file("mod.txt", "new\n");

    let forward = fixture.compare_json(&[]);
    let output = fixture.run_success(&["compare", fixture.right(), fixture.left(), "--json"]);
    let backward: Value = serde_json::from_str(&output).unwrap();

    assert_eq!(record(&forward, "only_left.txt")["status"], "OnlyInLeft");
    assert_eq!(record(&backward, "only_left.txt")["status"], "OnlyInRight");

    let backward_lines = record(&backward, "mod.txt")["diffLines"].clone();
    let lines: Vec<&str> = backward_lines
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l.as_str().unwrap())
        .collect();
    assert!(lines.contains(&"-new"));
    assert!(lines.contains(&"+old"));
}

#[test]
fn test_repeated_runs_match() {
    let fixture = TestFixture::new();
    for i in 0..10 {
        fixture.create_left_file(format!("d{}/f.txt", i % 3), &format!("{}\n", i));
        fixture.create_right_file(format!("d{}/g{}.txt", i % 2, i), "x\n");
    }

    let mut first = fixture.compare_json(&[]);
    let mut second = fixture.compare_json(&["--sequential"]);
    first.as_object_mut().unwrap().remove("generated_at");
    second.as_object_mut().unwrap().remove("generated_at");

    assert_eq!(first, second);
}

#[test]
fn test_text_output() {
    let fixture = TestFixture::new();
    fixture.create_left_file("same.txt", "Same content");
    fixture.create_right_file("same.txt", "Same content");
    fixture.create_left_file("different.txt", "Left\n");
    fixture.create_right_file("different.txt", "Right\n");

    let stdout = fixture.run_success(&["compare", fixture.left(), fixture.right(), "--show-diff"]);

    assert!(stdout.contains("Comparison Results"));
    assert!(stdout.contains("!=   different.txt (2 lines)"));
    assert!(stdout.contains("==   same.txt"));
    assert!(stdout.contains("-Left"));
    assert!(stdout.contains("+Right"));
    assert!(stdout.contains("Identical:       1"));
    assert!(stdout.contains("Modified:        1"));
}

#[test]
fn test_diff_only_flag() {
    let fixture = TestFixture::new();
    fixture.create_left_file("same.txt", "Same content");
    fixture.create_right_file("same.txt", "Same content");
    fixture.create_left_file("different.txt", "Left");
    fixture.create_right_file("different.txt", "Right");

    let stdout = fixture.run_success(&["compare", fixture.left(), fixture.right(), "--diff-only"]);

    let listing: Vec<&str> = stdout
        .lines()
        .skip_while(|l| !l.contains("Comparison Results"))
        .take_while(|l| !l.contains("Summary"))
        .collect();
    assert!(listing.iter().any(|l| l.contains("different.txt")));
    assert!(!listing.iter().any(|l| l.contains("same.txt")));
}

#[test]
fn test_decode_policy_flag() {
    let fixture = TestFixture::new();
    fixture.create_left_file("blob.bin", "a\0b");
    fixture.create_right_file("blob.bin", "a\0c");

    let report = fixture.compare_json(&[]);
    assert_eq!(record(&report, "blob.bin")["status"], "Identical");

    let report = fixture.compare_json(&["--decode-policy", "fail-file"]);
    assert_eq!(record(&report, "blob.bin")["status"], "Modified");
    assert_eq!(report["warnings"][0]["kind"], "decodeFailure");

    let output = fixture.run(&[
        "compare",
        fixture.left(),
        fixture.right(),
        "--decode-policy",
        "fail-run",
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_missing_root_fails() {
    let fixture = TestFixture::new();
    let missing = fixture.left_dir.join("does-not-exist");

    let output = fixture.run(&["compare", missing.to_str().unwrap(), fixture.right()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Root not found"));
}

#[test]
fn test_overwrite_then_compare() {
    let fixture = TestFixture::new();
    let left = fixture.create_left_file("a.txt", "1\n2\n3\n");
    let right = fixture.create_right_file("a.txt", "1\n2\n4\n");

    let stdout = fixture.run_success(&[
        "overwrite",
        left.to_str().unwrap(),
        right.to_str().unwrap(),
        "--verify",
    ]);
    assert!(stdout.contains("Overwrote"));
    assert!(stdout.contains("verified"));

    let report = fixture.compare_json(&[]);
    assert_eq!(record(&report, "a.txt")["status"], "Identical");
}

#[test]
fn test_overwrite_dry_run_leaves_dest() {
    let fixture = TestFixture::new();
    let left = fixture.create_left_file("a.txt", "new");
    let right = fixture.create_right_file("a.txt", "old");

    let stdout = fixture.run_success(&[
        "overwrite",
        left.to_str().unwrap(),
        right.to_str().unwrap(),
        "--dry-run",
    ]);

    assert!(stdout.contains("Would overwrite"));
    assert_eq!(fs::read_to_string(&right).unwrap(), "old");
}

#[test]
fn test_overwrite_missing_source_fails() {
    let fixture = TestFixture::new();
    let right = fixture.create_right_file("a.txt", "old");
    let missing = fixture.left_dir.join("a.txt");

    let output = fixture.run(&["overwrite", missing.to_str().unwrap(), right.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(fs::read_to_string(&right).unwrap(), "old");
}
