//! Hygiene — enforces coding standards at test time.
//!
//! Scans the production source tree (`src/`, excluding `*_test.rs`) for
//! antipatterns. Every budget is zero and stays zero: the controller
//! promises its callers that no persistence failure ever panics or is
//! silently discarded, so the patterns below are banned outright.

use std::fs;
use std::path::Path;

/// (pattern, what it means) — all budgets are zero.
const BANNED: &[(&str, &str)] = &[
    (".unwrap()", "panics on failure"),
    (".expect(", "panics on failure"),
    ("panic!(", "crashes the process"),
    ("unreachable!(", "crashes the process"),
    ("todo!(", "unfinished stub"),
    ("unimplemented!(", "unfinished stub"),
    ("let _ =", "silently discards a result"),
    (".ok()", "silently discards an error"),
    ("#[allow(dead_code)]", "hides unused code"),
];

struct SourceFile {
    path: String,
    content: String,
}

fn source_files() -> Vec<SourceFile> {
    let mut files = Vec::new();
    collect_rs_files(Path::new("src"), &mut files);
    files
}

fn collect_rs_files(dir: &Path, out: &mut Vec<SourceFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rs_files(&path, out);
            continue;
        }
        if path.extension().is_none_or(|ext| ext != "rs") {
            continue;
        }
        let path_str = path.to_string_lossy().to_string();
        // Sibling test modules may unwrap freely.
        if path_str.ends_with("_test.rs") {
            continue;
        }
        if let Ok(content) = fs::read_to_string(&path) {
            out.push(SourceFile { path: path_str, content });
        }
    }
}

fn hits(files: &[SourceFile], pattern: &str) -> Vec<String> {
    let mut found = Vec::new();
    for file in files {
        for (index, line) in file.content.lines().enumerate() {
            if line.contains(pattern) {
                found.push(format!("  {}:{}", file.path, index + 1));
            }
        }
    }
    found
}

#[test]
fn source_tree_is_nonempty() {
    // Guards against the scan silently looking at the wrong directory.
    assert!(source_files().len() >= 6, "expected the crate's source files under src/");
}

#[test]
fn banned_patterns_do_not_appear_in_production_code() {
    let files = source_files();
    let mut violations = Vec::new();
    for (pattern, why) in BANNED {
        let found = hits(&files, pattern);
        if !found.is_empty() {
            violations.push(format!("`{pattern}` ({why}):\n{}", found.join("\n")));
        }
    }
    assert!(
        violations.is_empty(),
        "banned patterns found in src/:\n{}",
        violations.join("\n")
    );
}
