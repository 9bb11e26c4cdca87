//! The `bifrost` binary, run as a subprocess against a direct store.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const MP4_HEADER: &[u8] = &[
    0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm', 0x00, 0x00, 0x02, 0x00,
    b'i', b's', b'o', b'm', b'm', b'p', b'4', b'1',
];

fn bifrost_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("bifrost");
    path
}

/// Profile directory with home profile `home1` backed by a direct store.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let profile_dir = root.join("servers");
    fs::create_dir_all(&profile_dir).unwrap();
    fs::write(
        profile_dir.join("home1.toml"),
        format!(
            r#"
name = "home1"
home = true

[rest]
host = "127.0.0.1"
port = 1

[direct]
database = "{}/store/catalog.sqlite"
"#,
            root.display()
        ),
    )
    .unwrap();

    fs::write(
        profile_dir.join("work.toml"),
        r#"
name = "work"

[rest]
host = "10.0.0.2"
port = 7340
"#,
    )
    .unwrap();

    (tmp, profile_dir)
}

struct Output {
    stdout: String,
    stderr: String,
    code: Option<i32>,
}

fn run_bifrost(profile_dir: &Path, args: &[&str]) -> Output {
    let binary = bifrost_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(profile_dir)
        .args(args)
        .env("RUST_LOG", "bifrost=info")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run bifrost binary at {:?}: {}", binary, e));

    Output {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        code: output.status.code(),
    }
}

fn create_movies(profile_dir: &Path) {
    let out = run_bifrost(
        profile_dir,
        &["--direct", "create-section", "movies", "/mnt/movies", "video"],
    );
    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
}

#[test]
fn test_profiles_lists_home() {
    let (_tmp, profile_dir) = setup_test_env();
    let out = run_bifrost(&profile_dir, &["profiles"]);

    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
    let home_line = out
        .stdout
        .lines()
        .find(|l| l.starts_with("home1"))
        .expect("home1 listed");
    assert!(home_line.contains('*'));
    assert!(out.stdout.lines().any(|l| l.starts_with("work")));
}

#[test]
fn test_missing_profile_directory_is_created() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("fresh").join("servers");

    let out = run_bifrost(&dir, &["profiles"]);
    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
    assert!(out.stdout.contains("No profiles"));
    assert!(dir.is_dir());
}

#[test]
fn test_unknown_profile_exits_with_profile_code() {
    let (_tmp, profile_dir) = setup_test_env();
    let out = run_bifrost(&profile_dir, &["--server", "ghost", "--direct", "sections"]);

    assert_eq!(out.code, Some(5));
    assert!(out.stderr.contains("ghost"));
}

#[test]
fn test_unknown_section_exits_with_section_code() {
    let (_tmp, profile_dir) = setup_test_env();
    let out = run_bifrost(&profile_dir, &["--direct", "--section", "ghost", "sections"]);

    assert_eq!(out.code, Some(6));
    assert!(out.stderr.contains("Failed to find section: ghost"));
    assert!(out.stderr.contains("bifrost sections"));
}

#[test]
fn test_file_miss_exits_with_not_found_code() {
    let (_tmp, profile_dir) = setup_test_env();
    create_movies(&profile_dir);

    let out = run_bifrost(&profile_dir, &["--direct", "file", "absent.mp4"]);
    assert_eq!(out.code, Some(3), "stdout: {}", out.stdout);
    assert!(out.stderr.contains("No file matches 'absent.mp4'"));
    assert!(out.stdout.is_empty());
}

#[test]
fn test_zero_timeout_is_invalid_argument() {
    let (_tmp, profile_dir) = setup_test_env();
    let out = run_bifrost(&profile_dir, &["--timeout", "0", "sections"]);
    assert_eq!(out.code, Some(2), "stderr: {}", out.stderr);
}

#[test]
fn test_register_and_show_file() {
    let (tmp, profile_dir) = setup_test_env();
    create_movies(&profile_dir);

    let clip = tmp.path().join("clip.mp4");
    fs::write(&clip, MP4_HEADER).unwrap();

    let out = run_bifrost(
        &profile_dir,
        &["--direct", "--section", "movies", "register", clip.to_str().unwrap()],
    );
    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
    assert!(out.stdout.contains("/mnt/movies/clip.mp4"));

    let out = run_bifrost(&profile_dir, &["--direct", "file", "clip.mp4"]);
    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
    assert!(out.stdout.contains("--- Video ---"));
    assert!(out.stdout.contains("default-user"));

    let out = run_bifrost(&profile_dir, &["--direct", "index", "--key", "file_location"]);
    assert_eq!(out.stdout.trim(), "/mnt/movies/clip.mp4");

    let out = run_bifrost(&profile_dir, &["--direct", "--section", "movies", "sections"]);
    assert!(out.stdout.contains("total_uploads:   1"));
}

#[test]
fn test_username_override_warns() {
    let (tmp, profile_dir) = setup_test_env();
    create_movies(&profile_dir);

    let clip = tmp.path().join("clip.mp4");
    fs::write(&clip, MP4_HEADER).unwrap();

    let out = run_bifrost(
        &profile_dir,
        &[
            "--direct",
            "--section",
            "movies",
            "--username",
            "ana",
            "register",
            clip.to_str().unwrap(),
        ],
    );
    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
    assert!(out.stderr.contains("temporary stand-in"));

    let out = run_bifrost(&profile_dir, &["--direct", "index", "--key", "uploaded_by"]);
    assert_eq!(out.stdout.trim(), "ana");
}

#[test]
fn test_register_document_into_video_section_fails() {
    let (tmp, profile_dir) = setup_test_env();
    create_movies(&profile_dir);

    let notes = tmp.path().join("notes.txt");
    fs::write(&notes, "plain text").unwrap();

    let out = run_bifrost(
        &profile_dir,
        &["--direct", "--section", "movies", "register", notes.to_str().unwrap()],
    );
    assert_eq!(out.code, Some(7));
    assert!(out.stderr.contains("document"));
    assert!(out.stderr.contains("video"));
}

#[test]
fn test_register_requires_section() {
    let (tmp, profile_dir) = setup_test_env();
    let clip = tmp.path().join("clip.mp4");
    fs::write(&clip, MP4_HEADER).unwrap();

    let out = run_bifrost(&profile_dir, &["--direct", "register", clip.to_str().unwrap()]);
    assert_eq!(out.code, Some(2));
}

#[test]
fn test_migrate_reports_outcomes_and_succeeds() {
    let (tmp, profile_dir) = setup_test_env();
    create_movies(&profile_dir);

    let dir = tmp.path().join("incoming");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("a.mp4"), MP4_HEADER).unwrap();
    fs::write(dir.join("notes.txt"), "text").unwrap();

    let out = run_bifrost(
        &profile_dir,
        &["--direct", "--section", "movies", "migrate", dir.to_str().unwrap()],
    );
    assert_eq!(out.code, Some(0), "stderr: {}", out.stderr);
    assert!(out.stdout.contains("1 registered, 1 failed"));
    assert!(out.stdout.lines().any(|l| l.starts_with("failed") && l.contains("notes.txt")));
}

#[test]
fn test_migrate_on_file_is_invalid_argument() {
    let (tmp, profile_dir) = setup_test_env();
    create_movies(&profile_dir);

    let clip = tmp.path().join("clip.mp4");
    fs::write(&clip, MP4_HEADER).unwrap();

    let out = run_bifrost(
        &profile_dir,
        &["--direct", "--section", "movies", "migrate", clip.to_str().unwrap()],
    );
    assert_eq!(out.code, Some(2));
    assert!(out.stderr.contains("not a directory"));
}

#[test]
fn test_create_section_rejects_unknown_type() {
    let (_tmp, profile_dir) = setup_test_env();
    let out = run_bifrost(
        &profile_dir,
        &["--direct", "create-section", "misc", "/mnt/misc", "hologram"],
    );
    assert_ne!(out.code, Some(0));
}
