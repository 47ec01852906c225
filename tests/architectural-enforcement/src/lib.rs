//! Architectural Enforcement
//!
//! Source scanners backing the workspace's architectural tests:
//! - No sleep calls in production code
//! - No blocking I/O inside async functions
//!
//! The scanners are line based. They read production sources from the
//! chatstream crates and report `path:line - code` strings for each violation.

use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["chatstream/core/src", "chatstream/cli/src"];

/// Workspace root, resolved from this crate's manifest
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// A Rust source file split into lines
#[derive(Debug)]
pub struct SourceFile {
    /// Path as found on disk
    pub path: PathBuf,
    /// File contents, one entry per line
    pub lines: Vec<String>,
}

impl SourceFile {
    /// Build from in-memory text
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    /// Code portion of a line, with any trailing `//` comment removed
    #[must_use]
    pub fn code(&self, idx: usize) -> &str {
        let line = self.lines[idx].as_str();
        line.split("//").next().unwrap_or(line)
    }

    /// Whether the line sits in a `#[cfg(test)]` module or a test function
    #[must_use]
    pub fn is_test_code(&self, idx: usize) -> bool {
        let test_module = self
            .lines
            .iter()
            .position(|l| l.trim() == "#[cfg(test)]");
        if test_module.is_some_and(|start| idx > start) {
            return true;
        }

        let Some(fn_idx) = self.enclosing_fn(idx) else {
            return false;
        };
        self.lines[..fn_idx]
            .iter()
            .rev()
            .map(|l| l.trim())
            .take_while(|l| l.starts_with("#[") || l.starts_with("///"))
            .any(|l| l.starts_with("#[test]") || l.starts_with("#[tokio::test"))
    }

    /// Index of the nearest function signature at or above `idx`
    #[must_use]
    pub fn enclosing_fn(&self, idx: usize) -> Option<usize> {
        (0..=idx).rev().find(|&i| fn_signature(&self.lines[i]).is_some())
    }

    /// Whether the nearest enclosing function is `async`
    ///
    /// Lines outside any function count as async context.
    #[must_use]
    pub fn is_in_async_fn(&self, idx: usize) -> bool {
        self.enclosing_fn(idx)
            .and_then(|i| fn_signature(&self.lines[i]))
            .unwrap_or(true)
    }
}

/// Parse a function signature line
///
/// Returns `Some(is_async)` for lines like `pub(crate) async fn name(`.
#[must_use]
pub fn fn_signature(line: &str) -> Option<bool> {
    let mut rest = line.trim_start();
    for visibility in ["pub(crate) ", "pub(super) ", "pub "] {
        if let Some(stripped) = rest.strip_prefix(visibility) {
            rest = stripped;
            break;
        }
    }

    let mut is_async = false;
    loop {
        if let Some(stripped) = rest.strip_prefix("async ") {
            is_async = true;
            rest = stripped;
        } else if let Some(stripped) = rest
            .strip_prefix("const ")
            .or_else(|| rest.strip_prefix("unsafe "))
        {
            rest = stripped;
        } else {
            break;
        }
    }

    rest.starts_with("fn ").then_some(is_async)
}

/// Load every `.rs` file under `dir`
#[must_use]
pub fn load_sources(dir: &Path) -> Vec<SourceFile> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .filter_map(|e| {
            let text = std::fs::read_to_string(e.path()).ok()?;
            Some(SourceFile::from_text(e.path(), &text))
        })
        .collect()
}

/// Load all production sources of the workspace
#[must_use]
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    PRODUCTION_DIRS
        .iter()
        .flat_map(|dir| load_sources(&root.join(dir)))
        .collect()
}

/// Format a violation for reporting
#[must_use]
pub fn violation(file: &SourceFile, idx: usize, kind: &str) -> String {
    format!(
        "{}:{} - {kind}: {}",
        file.path.display(),
        idx + 1,
        file.lines[idx].trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_signature() {
        assert_eq!(fn_signature("fn main() {"), Some(false));
        assert_eq!(fn_signature("    pub fn get(&self) -> u8 {"), Some(false));
        assert_eq!(fn_signature("pub(crate) fn now_ms() -> u64 {"), Some(false));
        assert_eq!(fn_signature("pub async fn next(&mut self) {"), Some(true));
        assert_eq!(fn_signature("    async fn open_stream("), Some(true));
        assert_eq!(fn_signature("pub const fn new() -> Self {"), Some(false));
        assert_eq!(fn_signature("let f = |x| x + 1;"), None);
        assert_eq!(fn_signature("// fn commented()"), None);
    }

    #[test]
    fn test_async_context() {
        let file = SourceFile::from_text(
            "x.rs",
            "async fn bad() {\n    let s = std::fs::read_to_string(\"f\");\n}\n\
             fn good() {\n    let s = std::fs::read_to_string(\"f\");\n}\n",
        );
        assert!(file.is_in_async_fn(1));
        assert!(!file.is_in_async_fn(4));
    }

    #[test]
    fn test_test_code_detection() {
        let file = SourceFile::from_text(
            "x.rs",
            "fn prod() {}\n\n#[tokio::test]\nasync fn test_it() {\n    body();\n}\n",
        );
        assert!(!file.is_test_code(0));
        assert!(file.is_test_code(4));

        let file = SourceFile::from_text(
            "x.rs",
            "fn prod() {}\n#[cfg(test)]\nmod tests {\n    fn helper() {}\n}\n",
        );
        assert!(!file.is_test_code(0));
        assert!(file.is_test_code(3));
    }
}
