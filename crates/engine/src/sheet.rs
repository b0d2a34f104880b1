//! Field extraction from the protagonist sheet.
//!
//! The sheet is free-form markdown; only the bold-label lines below are
//! recognised, with either a full-width or an ASCII colon:
//! ```text
//! - **当前位置**：桃花坞
//! - **气血 (HP)**：80 / 100
//! ```

use regex::{Captures, Regex};
use std::sync::LazyLock;

static LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"当前位置\*\*[：:][ \t]*([^\r\n]*)").expect("valid regex"));
static LOCATION_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ \t]*-[ \t]*\*\*当前位置\*\*[：:])[^\r\n]*").expect("valid regex")
});
static HP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"气血 \(HP\)\*\*[：:][ \t]*(\d+)[ \t]*/[ \t]*(\d+)").expect("valid regex")
});

/// The current location, trimmed. `None` when absent or blank.
pub fn current_location(sheet: &str) -> Option<String> {
    let value = LOCATION_RE.captures(sheet)?.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_owned())
}

/// `(current, maximum)` hit points.
pub fn hit_points(sheet: &str) -> Option<(u32, u32)> {
    let caps = HP_RE.captures(sheet)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// The sheet with its location line rewritten to `location`.
///
/// `None` when the sheet has no location line to rewrite.
pub fn with_location(sheet: &str, location: &str) -> Option<String> {
    if !LOCATION_LINE_RE.is_match(sheet) {
        return None;
    }
    let rewritten = LOCATION_LINE_RE.replace_all(sheet, |caps: &Captures<'_>| {
        format!("{}{}", &caps[1], location)
    });
    Some(rewritten.into_owned())
}
