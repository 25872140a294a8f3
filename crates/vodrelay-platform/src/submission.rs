//! Output parsing for the uploader CLI.
//!
//! The tool prints progress for humans, not machines, and decorates it with
//! ANSI color codes. These helpers are pure so every quirk we have seen in
//! the wild can be pinned down in a test.

use std::sync::OnceLock;

use regex::Regex;

/// `id: <token>` lines in the submission transcript. The tool may echo the
/// pattern more than once while retrying internally; the last occurrence is
/// the one that stuck.
fn submission_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"id:\s*([A-Za-z0-9]+)").expect("id pattern is valid"))
}

fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("ansi pattern is valid"))
}

/// Remove ANSI color escapes.
pub fn strip_ansi(text: &str) -> String {
    ansi_pattern().replace_all(text, "").into_owned()
}

/// Extract the platform post id from a submission transcript, taking the
/// last match when the tool printed several.
pub fn parse_submission_id(transcript: &str) -> Option<String> {
    let clean = strip_ansi(transcript);
    submission_id_pattern()
        .captures_iter(&clean)
        .last()
        .map(|caps| caps[1].to_string())
}

/// Decide whether a `show`/`list` response describes a live post.
///
/// The tool exits zero even for missing posts, reporting the problem either
/// as an empty body or as a JSON payload with a non-zero `code`. Output that
/// fits neither shape is treated as valid: a flaky lookup must never cause
/// a real upload to be re-done.
pub fn show_output_is_valid(status_ok: bool, stdout: &str) -> bool {
    if !status_ok {
        return false;
    }
    let clean = strip_ansi(stdout);
    let body = clean.trim();
    if body.is_empty() {
        return false;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(code) = value.get("code").and_then(|c| c.as_i64()) {
            return code == 0;
        }
    }
    true
}

/// One row of the tool's `list` output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemotePost {
    pub id: String,
    pub title: String,
    pub status: String,
}

/// Parse a tab-separated `list` row: `id<TAB>title<TAB>status[<TAB>...]`.
/// Rows with fewer than three columns are listing chrome, not posts.
pub fn parse_list_line(line: &str) -> Option<RemotePost> {
    let clean = strip_ansi(line);
    let mut cols = clean.trim().split('\t');
    let id = cols.next()?.trim();
    let title = cols.next()?.trim();
    let status = cols.next()?.trim();
    if id.is_empty() {
        return None;
    }
    Some(RemotePost {
        id: id.to_string(),
        title: title.to_string(),
        status: status.to_string(),
    })
}
