//! Failure reports.
//!
//! Exact-fixture mismatches are shown as a unified line diff between the stored
//! lines and the received lines; substring mismatches list the offending strings.

use std::fmt::Write as _;

use similar::{ChangeTag, TextDiff};

/// Lines of unchanged context around each hunk.
const CONTEXT_LINES: usize = 3;

/// Generates a unified diff between expected and received line sequences.
///
/// Returns an empty string when the sequences are equal.
///
/// # Example
///
/// ```rust
/// use tui_stepcheck::diff::unified_diff;
///
/// let expected = vec!["a".to_string(), "b".to_string()];
/// let received = vec!["a".to_string(), "c".to_string()];
///
/// let diff = unified_diff(&expected, &received);
/// assert!(diff.contains("-b\n+c\n"));
/// ```
pub fn unified_diff(expected: &[String], received: &[String]) -> String {
    let old: Vec<&str> = expected.iter().map(String::as_str).collect();
    let new: Vec<&str> = received.iter().map(String::as_str).collect();
    let diff = TextDiff::from_slices(&old, &new);

    let groups = diff.grouped_ops(CONTEXT_LINES);
    if groups.is_empty() {
        return String::new();
    }

    let mut output = String::new();
    output.push_str("--- expected\n");
    output.push_str("+++ received\n");

    for group in &groups {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old_start = first.old_range().start;
        let old_len = last.old_range().end - old_start;
        let new_start = first.new_range().start;
        let new_len = last.new_range().end - new_start;

        let _ = writeln!(
            output,
            "@@ -{} +{} @@",
            hunk_range(old_start, old_len),
            hunk_range(new_start, new_len)
        );

        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                    ChangeTag::Equal => ' ',
                };
                let _ = writeln!(output, "{}{}", sign, change.value());
            }
        }
    }

    output
}

// difflib convention: 1-based start, length omitted when it is 1, start
// pointing at the preceding line for empty ranges
fn hunk_range(start: usize, len: usize) -> String {
    match len {
        0 => format!("{},0", start),
        1 => format!("{}", start + 1),
        _ => format!("{},{}", start + 1, len),
    }
}

/// Describes a failed substring check.
pub fn substring_report(missing: &[&str], unexpected: &[&str]) -> String {
    let mut report = String::new();
    if !missing.is_empty() {
        report.push_str("missing look_fors:\n");
        for text in missing {
            let _ = writeln!(report, "  - {:?}", text);
        }
    }
    if !unexpected.is_empty() {
        report.push_str("unexpected look_nots:\n");
        for text in unexpected {
            let _ = writeln!(report, "  - {:?}", text);
        }
    }
    report
}
