//! Hygiene: enforces coding standards at test time
//!
//! These tests scan the library and binary sources for antipatterns. Each
//! has a budget (ideally zero). If you must add one, fix an existing one
//! first: the budget never grows.
#![allow(clippy::absurd_extreme_comparisons)]

use std::fs;
use std::path::Path;

// Panics. A crashed view task takes the display down with it.
const MAX_UNWRAP: usize = 0;
const MAX_EXPECT: usize = 0;
const MAX_PANIC: usize = 0;
const MAX_UNREACHABLE: usize = 0;
const MAX_TODO: usize = 0;
const MAX_UNIMPLEMENTED: usize = 0;

// Silent loss: discards errors without inspecting.
const MAX_SILENT_DISCARD: usize = 0;
const MAX_DOT_OK: usize = 0;

// Output: the library logs through `tracing`; only the binary prints.
const MAX_LIBRARY_PRINT: usize = 0;

// Style / structure.
const MAX_ALLOW_DEAD_CODE: usize = 0;

struct SourceFile {
    path: String,
    content: String,
}

impl SourceFile {
    fn is_binary(&self) -> bool {
        self.path.ends_with("main.rs")
    }
}

/// Collect production `.rs` files from `src/`, excluding `*_test.rs`.
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
        } else if path.extension().is_some_and(|e| e == "rs") {
            let path_str = path.to_string_lossy().to_string();
            if path_str.ends_with("_test.rs") {
                continue;
            }
            if let Ok(content) = fs::read_to_string(&path) {
                out.push(SourceFile { path: path_str, content });
            }
        }
    }
}

fn count_in_source<'a>(files: impl IntoIterator<Item = &'a SourceFile>, pattern: &str) -> Vec<(String, usize)> {
    files
        .into_iter()
        .filter_map(|file| {
            let count = file
                .content
                .lines()
                .filter(|line| !line.trim_start().starts_with("//"))
                .filter(|line| line.contains(pattern))
                .count();
            (count > 0).then(|| (file.path.clone(), count))
        })
        .collect()
}

fn format_hits(hits: &[(String, usize)]) -> String {
    hits.iter()
        .map(|(path, count)| format!("  {path}: {count}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assert that `pattern` appears at most `max` times across `files`.
fn assert_budget<'a>(files: impl IntoIterator<Item = &'a SourceFile>, pattern: &str, max: usize) {
    let hits = count_in_source(files, pattern);
    let count: usize = hits.iter().map(|(_, c)| c).sum();
    assert!(
        count <= max,
        "`{pattern}` budget exceeded: found {count}, max {max}.\n{}",
        format_hits(&hits)
    );
}

#[test]
fn sources_are_found() {
    let files = source_files();
    assert!(files.iter().any(|f| f.path.ends_with("lib.rs")), "scanner found no sources");
}

#[test]
fn unwrap_budget() {
    assert_budget(&source_files(), ".unwrap()", MAX_UNWRAP);
}

#[test]
fn expect_budget() {
    assert_budget(&source_files(), ".expect(", MAX_EXPECT);
}

#[test]
fn panic_budget() {
    assert_budget(&source_files(), "panic!(", MAX_PANIC);
}

#[test]
fn unreachable_budget() {
    assert_budget(&source_files(), "unreachable!(", MAX_UNREACHABLE);
}

#[test]
fn todo_budget() {
    assert_budget(&source_files(), "todo!(", MAX_TODO);
}

#[test]
fn unimplemented_budget() {
    assert_budget(&source_files(), "unimplemented!(", MAX_UNIMPLEMENTED);
}

#[test]
fn silent_discard_budget() {
    assert_budget(&source_files(), "let _ =", MAX_SILENT_DISCARD);
}

#[test]
fn dot_ok_budget() {
    assert_budget(&source_files(), ".ok()", MAX_DOT_OK);
}

#[test]
fn library_print_budget() {
    let files = source_files();
    let library: Vec<&SourceFile> = files.iter().filter(|f| !f.is_binary()).collect();
    assert_budget(library.iter().copied(), "println!(", MAX_LIBRARY_PRINT);
    assert_budget(library.iter().copied(), "eprintln!(", MAX_LIBRARY_PRINT);
}

#[test]
fn allow_dead_code_budget() {
    assert_budget(&source_files(), "#[allow(dead_code)]", MAX_ALLOW_DEAD_CODE);
}
