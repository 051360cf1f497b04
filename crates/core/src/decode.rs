//! # Response Decoder
//!
//! One place that turns free-form model output into typed results.
//! Every agent goes through here:
//!
//! ```text
//! raw text ─► strip_fences ─► sentinel? ─► NoChange
//!                               │
//!                               ├─► decode_record::<T>  (JSON)
//!                               └─► decode_patch        (unified diff)
//! ```

use crate::domain::Patch;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// A decoded response: a value, or the agent's "nothing to do" answer
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Value(T),
    NoChange,
}

impl<T> Decoded<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Decoded::Value(v) => Some(v),
            Decoded::NoChange => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("response was empty")]
    Empty,

    #[error("response is not a unified diff: {preview}")]
    NotADiff { preview: String },

    #[error("response is not valid JSON: {reason}")]
    InvalidJson { reason: String },
}

/// Remove a surrounding code fence (```` ``` ````, ```` ```diff ````,
/// ```` ```json ````...).
///
/// When the response has prose around a single fenced block, the block's
/// body is returned. Text without a fence comes back untouched, so the
/// function is idempotent.
pub fn strip_fences(raw: &str) -> &str {
    // Only fences at the start of a line count; diff lines always begin with
    // '+', '-' or ' ', so fences inside patched markdown are left alone.
    let Some(open) = line_start_fences(raw).next() else {
        return raw;
    };

    let after_marker = &raw[open + 3..];
    // The info string (language tag) runs to the end of the opening line
    let Some(body_start) = after_marker.find('\n') else {
        return raw;
    };
    let body = &after_marker[body_start + 1..];

    match line_start_fences(body).last() {
        Some(close) => body[..close].trim_end_matches([' ', '\t']),
        None => body,
    }
}

fn line_start_fences(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.match_indices("```")
        .map(|(idx, _)| idx)
        .filter(move |&idx| idx == 0 || text.as_bytes().get(idx - 1) == Some(&b'\n'))
}

/// True when the first non-empty line of the (fence-stripped) response is
/// one of the sentinels. Anything after it is commentary.
///
/// Models sometimes decorate the word (`**NO_BUGS_FOUND**`, trailing period),
/// so the comparison ignores surrounding punctuation.
pub fn is_sentinel(text: &str, sentinels: &[&str]) -> bool {
    let first_line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let word = first_line
        .trim_matches(|c: char| c == '*' || c == '`' || c == '.' || c == '"' || c == '\'');
    sentinels.iter().any(|s| word.eq_ignore_ascii_case(s))
}

/// Decode a JSON record, honouring the agent's sentinels
pub fn decode_record<T: DeserializeOwned>(
    raw: &str,
    sentinels: &[&str],
) -> Result<Decoded<T>, DecodeError> {
    let body = strip_fences(raw).trim();
    if body.is_empty() {
        return Err(DecodeError::Empty);
    }
    if is_sentinel(body, sentinels) {
        return Ok(Decoded::NoChange);
    }

    let json = extract_json_object(body).unwrap_or(body);
    serde_json::from_str(json)
        .map(Decoded::Value)
        .map_err(|e| DecodeError::InvalidJson {
            reason: e.to_string(),
        })
}

/// Decode a unified diff, honouring the agent's sentinels
pub fn decode_patch(raw: &str, sentinels: &[&str]) -> Result<Decoded<Patch>, DecodeError> {
    let body = strip_fences(raw);
    if body.trim().is_empty() {
        return Err(DecodeError::Empty);
    }
    if is_sentinel(body, sentinels) {
        return Ok(Decoded::NoChange);
    }

    let Some(start) = diff_start(body) else {
        return Err(DecodeError::NotADiff {
            preview: body.trim().chars().take(80).collect(),
        });
    };

    let mut diff = body[start..].trim_end().to_string();
    diff.push('\n');
    Ok(Decoded::Value(Patch::new(diff)))
}

/// Byte offset of the first diff header line, skipping any preamble prose
fn diff_start(text: &str) -> Option<usize> {
    let mut offset = 0;
    let mut saw_old_header = None;
    for line in text.split_inclusive('\n') {
        if line.starts_with("diff --git ") {
            return Some(offset);
        }
        if line.starts_with("--- ") {
            saw_old_header = Some(offset);
        } else if line.starts_with("+++ ") {
            if let Some(start) = saw_old_header {
                return Some(start);
            }
        } else {
            saw_old_header = None;
        }
        offset += line.len();
    }
    None
}

/// Slice from the first `{` to the last `}` when the model wrapped JSON in prose
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Named {
        name: String,
    }

    const DIFF: &str = "--- a/src/main.rs\n+++ b/src/main.rs\n@@ -1 +1 @@\n-old\n+new\n";

    #[test]
    fn test_strip_fences_tagged_and_untagged() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}\n");
        assert_eq!(strip_fences("```\nplain\n```\n"), "plain\n");
        assert_eq!(
            strip_fences("Here you go:\n```diff\n-a\n+b\n```\nThanks"),
            "-a\n+b\n"
        );
    }

    #[test]
    fn test_strip_fences_idempotent() {
        for input in [DIFF, "{\"name\": \"x\"}", "", "NO_TASKS", "```json\n{}\n```"] {
            let once = strip_fences(input);
            assert_eq!(strip_fences(once), once);
        }
        assert_eq!(strip_fences(DIFF), DIFF);
    }

    #[test]
    fn test_strip_fences_keeps_fences_inside_patched_markdown() {
        let doc_diff = "--- a/README.md\n+++ b/README.md\n@@ -1,1 +1,3 @@\n # Title\n+```bash\n+cargo run\n+```\n";
        assert_eq!(strip_fences(doc_diff), doc_diff);

        let wrapped = format!("```diff\n{}```\n", doc_diff);
        assert_eq!(strip_fences(&wrapped), doc_diff);
    }

    #[test]
    fn test_decode_record_fenced_and_plain() {
        let fenced: Decoded<Named> =
            decode_record("```json\n{\"name\": \"a\"}\n```", &["NO_TASKS"]).unwrap();
        assert_eq!(fenced, Decoded::Value(Named { name: "a".into() }));

        let plain: Decoded<Named> = decode_record("{\"name\": \"b\"}", &["NO_TASKS"]).unwrap();
        assert_eq!(plain, Decoded::Value(Named { name: "b".into() }));

        let prose: Decoded<Named> =
            decode_record("Sure! {\"name\": \"c\"} hope this helps", &[]).unwrap();
        assert_eq!(prose, Decoded::Value(Named { name: "c".into() }));
    }

    #[test]
    fn test_decode_record_sentinel() {
        let decoded: Decoded<Named> = decode_record("  NO_TASKS\n", &["NO_TASKS"]).unwrap();
        assert_eq!(decoded, Decoded::NoChange);

        let fenced: Decoded<Named> = decode_record("```\nNO_TASKS\n```", &["NO_TASKS"]).unwrap();
        assert_eq!(fenced, Decoded::NoChange);
    }

    #[test]
    fn test_sentinel_followed_by_commentary() {
        let decoded: Decoded<Named> =
            decode_record("NO_TASKS\n\nAll pending work is complete.", &["NO_TASKS"]).unwrap();
        assert_eq!(decoded, Decoded::NoChange);

        let decoded = decode_patch("\n**NO_BUGS_FOUND**\nThe error paths look right.", &["NO_BUGS_FOUND"]);
        assert_eq!(decoded, Ok(Decoded::NoChange));

        // A sentinel mentioned mid-sentence is not an answer
        assert!(!is_sentinel("I found nothing, so NO_TASKS", &["NO_TASKS"]));
    }

    #[test]
    fn test_decode_record_errors() {
        let empty = decode_record::<Named>("   ", &[]);
        assert_eq!(empty, Err(DecodeError::Empty));

        let garbage = decode_record::<Named>("not json at all", &[]);
        assert!(matches!(garbage, Err(DecodeError::InvalidJson { .. })));
    }

    #[test]
    fn test_decode_patch_strips_fence_and_preamble() {
        let raw = format!("I fixed it.\n```diff\n{}```", DIFF);
        let decoded = decode_patch(&raw, &["NO_BUGS_FOUND"]).unwrap();
        assert_eq!(decoded, Decoded::Value(Patch::new(DIFF)));

        let git_style = "Explanation\ndiff --git a/x b/x\n--- a/x\n+++ b/x\n@@ -1 +1 @@\n-1\n+2\n";
        let decoded = decode_patch(git_style, &[]).unwrap().into_option().unwrap();
        assert!(decoded.as_str().starts_with("diff --git"));
    }

    #[test]
    fn test_decode_patch_sentinels_are_no_change() {
        for (raw, sentinel) in [
            ("NO_BUGS_FOUND", "NO_BUGS_FOUND"),
            ("**NO_REFACTORING_NEEDED**", "NO_REFACTORING_NEEDED"),
            ("```\nNO_SECURITY_ISSUES\n```", "NO_SECURITY_ISSUES"),
        ] {
            assert_eq!(decode_patch(raw, &[sentinel]).unwrap(), Decoded::NoChange);
        }
    }

    #[test]
    fn test_decode_patch_rejects_prose() {
        let result = decode_patch("The code looks fine to me.", &["NO_BUGS_FOUND"]);
        assert!(matches!(result, Err(DecodeError::NotADiff { .. })));
    }
}
