//! End-to-end integration tests for the `fblec` CLI (spec.md section 6.1):
//! each test writes one or more `.fble` source files to a temp search-path
//! root, invokes the compiled `fblec` binary against them, and asserts on
//! its exit code and stdio -- mirroring `snowc`/`meshc`'s own
//! `find_<binary>` + `Command` e2e style.

use std::path::PathBuf;
use std::process::{Command, Output};

fn write_module(dir: &std::path::Path, rel: &str, contents: &str) {
    let full = dir.join(rel);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, contents).unwrap();
}

fn find_fblec() -> PathBuf {
    let mut path = std::env::current_exe()
        .expect("cannot find current exe")
        .parent()
        .expect("cannot find parent dir")
        .to_path_buf();

    if path.file_name().map_or(false, |n| n == "deps") {
        path = path.parent().unwrap().to_path_buf();
    }

    let fblec = path.join("fblec");
    assert!(
        fblec.exists(),
        "fblec binary not found at {}. Run `cargo build -p fblec` first.",
        fblec.display()
    );
    fblec
}

fn run_fblec(search_dir: &std::path::Path, module: &str, extra: &[&str]) -> Output {
    Command::new(find_fblec())
        .args(["-I", search_dir.to_str().unwrap(), "-m", module])
        .args(extra)
        .output()
        .expect("failed to invoke fblec")
}

#[test]
fn runs_unit_evaluation_module() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "Main.fble", "*()()");

    let output = run_fblec(dir.path(), "/Main%", &[]);
    assert!(
        output.status.success(),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "*()");
}

#[test]
fn reports_compile_error_with_exit_code_one() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "Main.fble", "Undefined;");

    let output = run_fblec(dir.path(), "/Main%", &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!String::from_utf8_lossy(&output.stderr).is_empty());
}

#[test]
fn reports_usage_error_when_module_flag_missing() {
    let output = Command::new(find_fblec()).output().expect("failed to invoke fblec");
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn unresolved_module_is_a_compile_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_fblec(dir.path(), "/Missing%", &[]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn help_flag_exits_zero() {
    let output = Command::new(find_fblec()).args(["--help"]).output().expect("failed to invoke fblec");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("fblec"));
}

#[test]
fn version_flag_exits_zero() {
    let output = Command::new(find_fblec()).args(["--version"]).output().expect("failed to invoke fblec");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("fblec"));
}

#[test]
fn profile_flag_writes_a_pprof_file() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "Main.fble", "*()()");
    let profile_path = dir.path().join("out.pprof");

    let output = run_fblec(dir.path(), "/Main%", &["--profile", profile_path.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let bytes = std::fs::read(&profile_path).expect("profile file should have been written");
    assert!(!bytes.is_empty());
}

#[test]
fn loads_module_with_a_dependency() {
    let dir = tempfile::tempdir().unwrap();
    write_module(dir.path(), "Leaf.fble", "*()()");
    write_module(dir.path(), "Main.fble", "/Leaf%");

    let output = run_fblec(dir.path(), "/Main%", &[]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "*()");
}
