//! Suffix/prefix overlap merging of continuation rounds.

use gauge_extract::CodeKind;

/// Longest overlap considered, in characters.
pub const MAX_OVERLAP_WINDOW: usize = 200;

/// Overlaps of this many characters or fewer are treated as coincidence.
pub const MIN_DUPLICATE_OVERLAP: usize = 10;

/// Length in characters of the longest suffix of `tail` that is also a prefix
/// of `head`, looking at no more than [`MAX_OVERLAP_WINDOW`] characters.
///
/// # Examples
///
/// ```
/// use gauge_llm::continuation::find_overlap;
///
/// assert_eq!(find_overlap("abc Message('Hi');", "Message('Hi');\nend;"), 14);
/// assert_eq!(find_overlap("abc", "xyz"), 0);
/// ```
#[must_use]
pub fn find_overlap(tail: &str, head: &str) -> usize {
    let max = tail
        .chars()
        .count()
        .min(head.chars().count())
        .min(MAX_OVERLAP_WINDOW);

    (1..=max)
        .rev()
        .find(|&len| char_suffix(tail, len) == char_prefix(head, len))
        .unwrap_or(0)
}

/// Appends `continuation` to `accumulated`, dropping a duplicated prefix.
///
/// Leading whitespace of `continuation` is trimmed first. An overlap longer
/// than [`MIN_DUPLICATE_OVERLAP`] characters is cut from the continuation;
/// otherwise the two are joined with a newline. The kind does not change the
/// result: diffs merge on raw text like code.
#[must_use]
pub fn merge_code(accumulated: &str, continuation: &str, _kind: CodeKind) -> String {
    let trimmed = continuation.trim_start();
    let overlap = find_overlap(accumulated, trimmed);

    if overlap > MIN_DUPLICATE_OVERLAP {
        let rest = &trimmed[char_prefix(trimmed, overlap).len()..];
        format!("{accumulated}{rest}")
    } else {
        format!("{accumulated}\n{trimmed}")
    }
}

/// The first `n` characters of `s`, or all of it.
pub(crate) fn char_prefix(s: &str, n: usize) -> &str {
    s.char_indices().nth(n).map_or(s, |(i, _)| &s[..i])
}

/// The last `n` characters of `s`, or all of it.
pub(crate) fn char_suffix(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    s.char_indices().rev().nth(n - 1).map_or(s, |(i, _)| &s[i..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_helpers() {
        assert_eq!(char_prefix("héllo", 2), "hé");
        assert_eq!(char_prefix("hi", 5), "hi");
        assert_eq!(char_suffix("héllo", 4), "éllo");
        assert_eq!(char_suffix("hi", 5), "hi");
        assert_eq!(char_suffix("hi", 0), "");
    }

    #[test]
    fn test_finds_longest_not_first_match() {
        // "end;" and "end; end;" both overlap; the longer one wins
        let tail = "begin end; end;";
        let head = "end; end; x";
        assert_eq!(find_overlap(tail, head), 9);
    }

    #[test]
    fn test_overlap_window_is_bounded() {
        let shared = "a".repeat(300);
        assert_eq!(find_overlap(&shared, &shared), MAX_OVERLAP_WINDOW);
    }

    #[test]
    fn test_overlap_of_suffix_is_found() {
        let a = "procedure Run() begin\n    Message('Hello');\n    Counter += 1;";
        for k in [1, 7, 20, 40] {
            let b = format!("{}\nend;", char_suffix(a, k));
            assert!(find_overlap(a, &b) >= k, "k = {k}");
        }
    }

    #[test]
    fn test_overlap_counts_characters() {
        assert_eq!(find_overlap("über straße", "straße und"), 6);
    }

    #[test]
    fn test_merge_trims_genuine_duplicate() {
        let merged = merge_code(
            "begin\n    Message('Hello');",
            "Message('Hello');\n    Message('World');\nend;",
            CodeKind::Al,
        );
        assert_eq!(merged, "begin\n    Message('Hello');\n    Message('World');\nend;");
        assert_eq!(merged.matches("Message('Hello')").count(), 1);
    }

    #[test]
    fn test_short_overlap_is_kept() {
        // "end;" overlaps by 4 characters, below the duplicate floor
        let merged = merge_code("begin end;", "  end; x", CodeKind::Al);
        assert_eq!(merged, "begin end;\nend; x");
    }

    #[test]
    fn test_merge_without_overlap_inserts_newline() {
        let merged = merge_code("procedure Test() begin", " Message('Hi'); end;", CodeKind::Al);
        assert_eq!(merged, "procedure Test() begin\nMessage('Hi'); end;");
    }

    #[test]
    fn test_diff_kind_merges_like_code() {
        let a = "@@ -1,2 +1,2 @@\n-old line one\n";
        let b = "-old line one\n+new line one";
        assert_eq!(merge_code(a, b, CodeKind::Diff), merge_code(a, b, CodeKind::Al));
    }
}
