// Command-line behaviour: exit codes, emit stages, output files.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn gatelink_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_gatelink"))
}

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("linker crate has a parent directory")
        .to_path_buf()
}

fn demo(name: &str) -> PathBuf {
    project_root().join("demos").join(name)
}

fn run(args: &[&str], objects: &[PathBuf]) -> Output {
    Command::new(gatelink_binary())
        .args(objects)
        .args(args)
        .output()
        .expect("failed to run gatelink")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

// ── Exit codes ──

#[test]
fn clean_link_exits_zero() {
    let out = run(&[], &[demo("pump.gnl")]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    assert!(stdout(&out).is_empty());
}

#[test]
fn link_errors_exit_one() {
    let out = run(&[], &[demo("broken.gnl")]);
    assert_eq!(out.status.code(), Some(1));
    let err = stderr(&out);
    assert!(err.contains("error[E0202]"), "stderr: {err}");
    assert!(err.contains("PASS 1"), "stderr: {err}");
}

#[test]
fn missing_object_exits_two() {
    let out = run(&[], &[project_root().join("demos").join("no_such_file.gnl")]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("no_such_file.gnl"));
}

#[test]
fn syntax_error_exits_two() {
    let dir = std::env::temp_dir().join(format!("gatelink_cli_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("bad.gnl");
    std::fs::write(&path, "A1 and gate : : IX0.0\n").unwrap();
    let out = run(&[], &[path]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("E0101"), "stderr: {}", stderr(&out));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn error_threshold_exits_four() {
    let out = run(&["--max-errors", "0"], &[demo("broken.gnl")]);
    assert_eq!(out.status.code(), Some(4));
    assert!(stderr(&out).contains("E0904"));
}

#[test]
fn gate_width_below_two_is_rejected() {
    let out = run(&["--gate-width", "1"], &[demo("pump.gnl")]);
    assert_eq!(out.status.code(), Some(2));
}

// ── Emit stages ──

#[test]
fn emit_counts_stops_after_split() {
    let out = run(&["--emit", "counts"], &[demo("counter.gnl")]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    // iClock, IB1, IW2, sum, _10, QW4, QB6, __1
    assert!(text.starts_with("nodes 8\n"), "{text}");
    assert!(text.contains("splits 0\n"));
    assert!(text.contains("CONST   2\n"), "{text}");
}

#[test]
fn emit_json_is_valid() {
    let out = run(&["--emit", "json"], &[demo("pump.gnl")]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).expect("valid JSON");
    let symbols = json["symbols"].as_array().unwrap();
    assert_eq!(json["stats"]["nodes"].as_u64().unwrap() as usize, symbols.len());
    let names: Vec<&str> = symbols.iter().map(|s| s["name"].as_str().unwrap()).collect();
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
    assert!(names.contains(&"QX0") && names.contains(&"IX0"));
    assert_eq!(json["provenance"]["inputs"][0]["sha256"].as_str().unwrap().len(), 64);
}

#[test]
fn emit_c_writes_output_file() {
    let dir = std::env::temp_dir().join(format!("gatelink_cli_c_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("counter.c");
    let out = run(
        &["--emit", "c", "-o", path.to_str().unwrap()],
        &[demo("counter.gnl")],
    );
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    let c = std::fs::read_to_string(&path).unwrap();
    assert!(c.contains("static Gate QW4 = { \"QW4\", K_OUTPUT, R_OUTW,"));
    assert!(c.contains("static Gate __1 = { \"__1\", K_CONST, R_ARITH, 0,"));
    assert!(c.contains("Gate *sTable[] = {"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn emit_dot_covers_both_modules() {
    let out = run(&["--emit", "dot"], &[demo("pump.gnl")]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    let dot = stdout(&out);
    assert!(dot.starts_with("digraph gatelink {"));
    assert!(dot.contains("label=\"module: pump\";"));
    assert!(dot.contains("label=\"module: timing\";"));
}

#[test]
fn duplicate_across_objects_is_a_load_error() {
    // both files declare IB1
    let out = run(&["--emit", "symbols"], &[demo("pump.gnl"), demo("counter.gnl")]);
    assert_eq!(out.status.code(), Some(2));
    let err = stderr(&out);
    assert!(err.contains("E0103"), "stderr: {err}");
    assert!(err.contains("first defined in module 'pump'"), "stderr: {err}");
}

#[test]
fn emit_symbols_lists_every_node_sorted() {
    let out = run(&["--emit", "symbols"], &[demo("counter.gnl")]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    let names: Vec<String> = stdout(&out)
        .lines()
        .map(|l| l.split_whitespace().next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, vec!["IB1", "IW2", "QB6", "QW4", "_10", "__1", "iClock", "sum"]);
}
