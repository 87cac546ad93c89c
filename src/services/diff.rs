//! Reviewable diffs between region bodies.

use std::fmt::Write;

/// Render a whole-body replacement as a unified-style hunk.
///
/// Every old line is listed as removed and every new line as added, so the
/// diff always carries both texts in full.
pub fn generate_diff(old: &str, new: &str) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    let mut out = String::with_capacity(old.len() + new.len() + 64);
    out.push_str("--- current\n+++ proposed\n");
    let _ = writeln!(out, "@@ -1,{} +1,{} @@", old_lines.len(), new_lines.len());

    for line in &old_lines {
        let _ = writeln!(out, "-{line}");
    }
    for line in &new_lines {
        let _ = writeln!(out, "+{line}");
    }

    out
}
