//! Terminal escape-sequence normalization.
//!
//! Pane captures can carry color codes, cursor movement and title changes.
//! Everything downstream (stability comparison, diffing, display) works on
//! the visible text only.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Recognized escape-sequence grammars. An ESC that starts none of these is
/// kept as-is.
static ANSI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\x1b\[[0-?]*[ -/]*[@-~]",           // CSI: colors, cursor movement, erase
        r"|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)", // OSC ending with BEL or ST (titles, links)
        r"|\x1b[PX^_][^\x1b]*\x1b\\",          // DCS / SOS / PM / APC strings
        r"|\x1b[()*+][0-9A-Za-z]",             // Character set selection
        r"|\x1b[NO].",                         // SS2 / SS3
        r"|\x1b[=>78Mc]",                      // Keypad modes, save/restore, reverse index, reset
    ))
    .expect("Invalid ANSI regex")
});

/// Strip terminal escape sequences, preserving every other character in order.
///
/// Removal is repeated until nothing matches, so sequences that only become
/// visible once an inner one is removed are stripped too and the result is a
/// fixed point: `strip_ansi(&strip_ansi(s)) == strip_ansi(s)`.
pub fn strip_ansi(text: &str) -> String {
    let mut current = match ANSI_REGEX.replace_all(text, "") {
        Cow::Borrowed(_) => return text.to_string(),
        Cow::Owned(stripped) => stripped,
    };
    while let Cow::Owned(stripped) = ANSI_REGEX.replace_all(&current, "") {
        current = stripped;
    }
    current
}

/// Whether `text` contains anything [`strip_ansi`] would remove.
pub fn contains_ansi(text: &str) -> bool {
    ANSI_REGEX.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strip_colors() {
        assert_eq!(strip_ansi("\x1b[32mHello\x1b[0m World"), "Hello World");
        assert_eq!(
            strip_ansi("\x1b[1m\x1b[31mBold Red\x1b[0m \x1b[4mUnderline\x1b[0m"),
            "Bold Red Underline"
        );
        assert_eq!(
            strip_ansi("\x1b[38;5;196mRed\x1b[48;2;0;255;0mGreen BG\x1b[0m"),
            "RedGreen BG"
        );
    }

    #[test]
    fn test_strip_cursor_movement() {
        assert_eq!(strip_ansi("\x1b[2Jclear\x1b[H\x1b[10;5Hposition"), "clearposition");
        assert_eq!(strip_ansi("\x1b[?25lhidden\x1b[?25h"), "hidden");
    }

    #[test]
    fn test_strip_titles() {
        assert_eq!(strip_ansi("\x1b]0;Window Title\x07Some text"), "Some text");
        assert_eq!(strip_ansi("\x1b]2;title\x1b\\after"), "after");
    }

    #[test]
    fn test_strip_short_forms() {
        assert_eq!(strip_ansi("\x1b(BNormal\x1b)0Line"), "NormalLine");
        assert_eq!(strip_ansi("a\x1b=b\x1b>c\x1b7d\x1b8"), "abcd");
        assert_eq!(strip_ansi("\x1bPq#0;2;0;0;0\x1b\\done"), "done");
    }

    #[test]
    fn test_unmatched_escape_is_kept() {
        assert_eq!(strip_ansi("cost \x1b! here"), "cost \x1b! here");
        assert_eq!(strip_ansi("trailing \x1b"), "trailing \x1b");
        assert_eq!(strip_ansi("\x1b]unterminated title"), "\x1b]unterminated title");
    }

    #[test]
    fn test_nested_remnant_is_stripped() {
        // Removing the inner CSI exposes a second one.
        assert_eq!(strip_ansi("\x1b\x1b[31m[0mtext"), "text");
    }

    #[test]
    fn test_empty_and_plain() {
        assert_eq!(strip_ansi(""), "");
        assert_eq!(strip_ansi("Plain text\nwith lines"), "Plain text\nwith lines");
        assert!(!contains_ansi("Plain"));
        assert!(contains_ansi("\x1b[0m"));
    }

    proptest! {
        #[test]
        fn prop_strip_is_idempotent(s in "(\x1b|\\[|[0-9;?]|[A-Za-z]|\\]|\x07|\\\\| |\n){0,64}") {
            let once = strip_ansi(&s);
            prop_assert_eq!(strip_ansi(&once), once);
        }

        #[test]
        fn prop_strip_never_grows(s in any::<String>()) {
            prop_assert!(strip_ansi(&s).len() <= s.len());
        }

        #[test]
        fn prop_text_without_escape_is_unchanged(s in "[^\x1b]{0,128}") {
            prop_assert_eq!(strip_ansi(&s), s);
        }
    }
}
