//! Integration Test: Sleep Prohibition
//!
//! **Policy**: the chatstream crates wait on I/O and channels, never on timers.
//! This covers unit tests in `src/` too: streaming tests drive fragments
//! through channels instead of delays.

use architectural_enforcement::{production_sources, violation, SourceFile};

#[test]
fn test_no_sleep_in_source() {
    let violations: Vec<String> = production_sources()
        .iter()
        .flat_map(find_sleeps)
        .collect();

    if !violations.is_empty() {
        eprintln!("\nSleep calls found:\n");
        for v in &violations {
            eprintln!("  {v}");
        }
        eprintln!("\nWait on the session channel or a CancellationToken instead.");
        panic!("Found {} sleep violation(s)", violations.len());
    }
}

#[test]
fn test_sources_found() {
    let files = production_sources();
    assert!(
        files.iter().any(|f| f.path.ends_with("streaming/session.rs")),
        "production sources not found under the workspace root"
    );
}

fn find_sleeps(file: &SourceFile) -> Vec<String> {
    (0..file.lines.len())
        .filter(|&i| {
            let code = file.code(i);
            code.contains("::sleep(") || code.contains(".sleep(")
        })
        .map(|i| violation(file, i, "Sleep"))
        .collect()
}

#[test]
fn test_detector_ignores_comments() {
    let file = SourceFile::from_text(
        "x.rs",
        "fn wait() {\n    // tokio::time::sleep(d).await;\n    tokio::time::sleep(d).await;\n}\n",
    );
    let found = find_sleeps(&file);
    assert_eq!(found.len(), 1);
    assert!(found[0].starts_with("x.rs:3"));
}
