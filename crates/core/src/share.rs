//! Plain-text share payloads.

use serde::{Deserialize, Serialize};

/// Title used in share text when a creation has none.
pub const SHARE_UNTITLED: &str = "Untitled";

/// Title handed to native share sheets when a creation has none.
pub const SHARE_SHEET_FALLBACK_TITLE: &str = "Photo Poet";

/// What a client copies to the clipboard or hands to a native share action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePayload {
    /// Title for the share sheet.
    pub title: String,
    /// Clipboard text: a title line followed by the poem.
    pub text: String,
}

impl SharePayload {
    pub fn new(title: Option<&str>, poem: &str) -> Self {
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        Self {
            title: title.unwrap_or(SHARE_SHEET_FALLBACK_TITLE).to_string(),
            text: share_text(title, poem),
        }
    }
}

/// `Title: <title>\n<poem>`.
pub fn share_text(title: Option<&str>, poem: &str) -> String {
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(SHARE_UNTITLED);
    format!("Title: {title}\n{poem}")
}
