use std::sync::LazyLock;

use regex::Regex;

/// Longest tag component we produce.
const MAX_TAG_LEN: usize = 64;

static DISALLOWED_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9.-]+").expect("tag pattern is valid"));

/// Return the sanitized version of an image tag component.
///
/// A tag follows the same rules as DNS for what's permitted in it: runs of
/// any other character collapse to a single `-`, the result is cut to 64
/// characters, and leading/trailing `.` and `-` are stripped.
///
/// # Examples
///
/// ```
/// use portable_core::sanitize_image_tag;
///
/// assert_eq!(sanitize_image_tag(" pelican server "), "pelican-server");
/// assert_eq!(sanitize_image_tag("el9-a_b/c"), "el9-a-b-c");
/// ```
pub fn sanitize_image_tag(image_tag: &str) -> String {
    let replaced = DISALLOWED_RUN.replace_all(image_tag.trim(), "-");
    // Everything left is ASCII, so byte truncation is char-safe.
    let truncated = &replaced[..replaced.len().min(MAX_TAG_LEN)];
    truncated.trim_matches(|c| c == '.' || c == '-').to_owned()
}
