//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: All production I/O must be async. Use `tokio::fs`, `tokio::io`,
//! and async `reqwest`, not `std::fs`, `std::net`, or blocking stdio.
//! **Allowed**: blocking I/O in non-async functions that run before the tokio
//! runtime starts (configuration loading), and test code.

use architectural_enforcement::{production_sources, violation, SourceFile};

const BLOCKING_FS: &[&str] = &["std::fs::", "use std::fs"];
const BLOCKING_NET: &[&str] = &["std::net::TcpStream", "std::net::TcpListener", "std::net::UdpSocket"];
/// Sources that run before the runtime starts
const BEFORE_RUNTIME: &[&str] = &["chatstream/core/src/config"];
const BLOCKING_STDIO: &[&str] = &["std::io::stdin()", "std::io::stdout()"];

#[test]
fn test_no_blocking_io_in_async_code() {
    let violations: Vec<String> = production_sources()
        .iter()
        .flat_map(find_violations)
        .collect();

    if !violations.is_empty() {
        eprintln!("\nBlocking I/O found in async code:\n");
        for v in &violations {
            eprintln!("  {v}");
        }
        eprintln!("\nUse tokio::fs, tokio::io::stdin/stdout, or move the work into a sync fn.");
        panic!("Found {} blocking I/O violation(s)", violations.len());
    }
}

#[test]
fn test_blocking_fs_only_before_runtime() {
    let violations: Vec<String> = production_sources()
        .iter()
        .filter(|file| !runs_before_runtime(file))
        .flat_map(find_blocking_fs)
        .collect();

    assert!(
        violations.is_empty(),
        "Blocking file I/O outside configuration loading:\n{violations:#?}"
    );
}

#[test]
fn test_no_blocking_http_client() {
    let violations: Vec<String> = production_sources()
        .iter()
        .flat_map(|file| {
            (0..file.lines.len())
                .filter(|&i| file.code(i).contains("reqwest::blocking"))
                .map(|i| violation(file, i, "Blocking HTTP client"))
                .collect::<Vec<_>>()
        })
        .collect();

    assert!(violations.is_empty(), "{violations:#?}");
}

fn runs_before_runtime(file: &SourceFile) -> bool {
    let path = file.path.to_string_lossy().replace('\\', "/");
    BEFORE_RUNTIME.iter().any(|dir| path.contains(dir))
}

fn find_blocking_fs(file: &SourceFile) -> Vec<String> {
    (0..file.lines.len())
        .filter(|&i| !file.is_test_code(i))
        .filter(|&i| BLOCKING_FS.iter().any(|p| file.code(i).contains(p)))
        .map(|i| violation(file, i, "Blocking file I/O"))
        .collect()
}

fn find_violations(file: &SourceFile) -> Vec<String> {
    let mut violations = Vec::new();

    for idx in 0..file.lines.len() {
        if file.is_test_code(idx) || !file.is_in_async_fn(idx) {
            continue;
        }
        let code = file.code(idx);

        let checks = [
            (BLOCKING_FS, "Blocking file I/O"),
            (BLOCKING_NET, "Blocking network I/O"),
            (BLOCKING_STDIO, "Blocking stdin/stdout"),
        ];
        for (patterns, kind) in checks {
            if patterns.iter().any(|p| code.contains(p)) {
                violations.push(violation(file, idx, kind));
            }
        }
    }

    violations
}

#[test]
fn test_detector_flags_fs_in_async_fn() {
    let file = SourceFile::from_text(
        "bad.rs",
        "pub async fn load() {\n    let s = std::fs::read_to_string(\"history.json\");\n}\n",
    );
    let found = find_violations(&file);
    assert_eq!(found.len(), 1);
    assert!(found[0].starts_with("bad.rs:2 - Blocking file I/O"));
}

#[test]
fn test_detector_allows_sync_fn_and_tests() {
    let file = SourceFile::from_text(
        "ok.rs",
        "fn read_value(path: &Path) {\n    std::fs::read_to_string(path);\n}\n\
         #[cfg(test)]\nmod tests {\n    async fn t() {\n        std::fs::read_dir(\".\");\n    }\n}\n",
    );
    assert!(find_violations(&file).is_empty());
}

#[test]
fn test_blocking_fs_flagged_in_sync_store_code() {
    let file = SourceFile::from_text(
        "chatstream/core/src/store/kv.rs",
        "fn write_value(path: &Path) {\n    std::fs::write(path, \"[]\");\n}\n",
    );
    assert!(!runs_before_runtime(&file));
    assert_eq!(find_blocking_fs(&file).len(), 1);

    let config = SourceFile::from_text("chatstream/core/src/config/mod.rs", "");
    assert!(runs_before_runtime(&config));
}
