//! New-output extraction between two pane snapshots.
//!
//! `before` is captured right before input is sent, `after` once the pane has
//! gone quiet. The pane only exposes a bounded window, so when the response
//! pushes lines out of that window `before` is no longer a prefix of `after`
//! and the overlap has to be found by line alignment.
//!
//! This is best-effort. Two bounded snapshots cannot describe unbounded
//! scrollback exactly: a line that already scrolled away may be reported
//! again, and content that changed and reverted between samples is missed.
//! The alignment search tries every suffix length at every position, cubic in
//! line count at worst, which is fine for capture windows of a few hundred
//! lines.

use tracing::trace;

/// Text that appeared in `after` relative to `before`.
pub fn new_output(before: &str, after: &str) -> String {
    if before.is_empty() {
        return after.to_string();
    }

    if let Some(rest) = after.strip_prefix(before) {
        return rest.trim_start_matches('\n').to_string();
    }

    let before_lines: Vec<&str> = before.split('\n').collect();
    let after_lines: Vec<&str> = after.split('\n').collect();

    if let Some(end) = aligned_end(&before_lines, &after_lines) {
        trace!(target: "backchannel::poller", "Aligned scrolled lines up to line {}", end);
        return join_from(&after_lines, end);
    }

    after.to_string()
}

/// End (exclusive) of the longest suffix of `before` found as a contiguous
/// run anywhere in `after`.
///
/// Longer suffixes win; among equal lengths the earliest run wins. A
/// one-line suffix is the last line of `before`, so when nothing longer
/// aligns this anchors on the first line of `after` equal to it.
fn aligned_end(before: &[&str], after: &[&str]) -> Option<usize> {
    let max = before.len().min(after.len());
    (1..=max).rev().find_map(|k| {
        let tail = &before[before.len() - k..];
        after
            .windows(k)
            .position(|run| run == tail)
            .map(|start| start + k)
    })
}

fn join_from(lines: &[&str], start: usize) -> String {
    lines
        .get(start..)
        .map(|rest| rest.join("\n"))
        .unwrap_or_default()
        .trim_start_matches('\n')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_before_returns_everything() {
        assert_eq!(new_output("", "$ hello\nHi"), "$ hello\nHi");
        assert_eq!(new_output("", ""), "");
    }

    #[test]
    fn test_prefix_case_trims_leading_newlines() {
        assert_eq!(new_output("$ ", "$ hello\nHi there\n$ "), "hello\nHi there\n$ ");
        assert_eq!(new_output("line1", "line1\n\nline2"), "line2");
    }

    #[test]
    fn test_unchanged_snapshot_has_no_new_output() {
        assert_eq!(new_output("a\nb", "a\nb"), "");
    }

    #[test]
    fn test_scrolled_window() {
        let before = "one\ntwo\nthree\n> ask";
        let after = "three\n> ask\nanswer line\n> ";
        assert_eq!(new_output(before, after), "answer line\n> ");
    }

    #[test]
    fn test_scrolled_prefers_longest_alignment() {
        // "x" alone also aligns, but the two-line tail is the real overlap.
        let before = "a\nx\nb\nx";
        let after = "b\nx\nreply\nx";
        assert_eq!(new_output(before, after), "reply\nx");
    }

    #[test]
    fn test_scrolled_run_below_top_of_window() {
        // A status line now sits above the region that scrolled up.
        let before = "q\n>";
        let after = "hdr\n>\nstuff\nq\n>\nresp";
        assert_eq!(new_output(before, after), "resp");
    }

    #[test]
    fn test_fallback_anchors_on_last_before_line() {
        // The header was redrawn, so only the prompt line aligns.
        let before = "header v1\nprompt> ";
        let after = "header v2\nprompt> \nresult";
        assert_eq!(new_output(before, after), "result");
    }

    #[test]
    fn test_no_overlap_returns_everything() {
        assert_eq!(new_output("old screen", "brand\nnew"), "brand\nnew");
    }

    proptest! {
        #[test]
        fn prop_empty_before_is_identity(after in ".{0,200}") {
            prop_assert_eq!(new_output("", &after), after);
        }

        #[test]
        fn prop_appended_text_is_returned(before in "[a-z$> \n]{1,80}", added in "[a-z$> \n]{0,80}") {
            let after = format!("{before}{added}");
            prop_assert_eq!(new_output(&before, &after), added.trim_start_matches('\n'));
        }
    }
}
