//! The closed set of poem forms offered for generation and filtering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A poem form label.
///
/// Serialized as its display label (`"Free Verse"`, not `"FreeVerse"`) so the
/// stored value, the API value, and the prompt hint are the same string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoemStyle {
    Haiku,
    Limerick,
    Sonnet,
    #[serde(rename = "Free Verse")]
    FreeVerse,
    Ode,
    Ballad,
    Epic,
}

impl PoemStyle {
    /// Every style in presentation order. The first entry is the default selection.
    pub const ALL: [PoemStyle; 7] = [
        PoemStyle::Haiku,
        PoemStyle::Limerick,
        PoemStyle::Sonnet,
        PoemStyle::FreeVerse,
        PoemStyle::Ode,
        PoemStyle::Ballad,
        PoemStyle::Epic,
    ];

    /// Human-readable label, also used as the stored column value.
    pub fn label(self) -> &'static str {
        match self {
            Self::Haiku => "Haiku",
            Self::Limerick => "Limerick",
            Self::Sonnet => "Sonnet",
            Self::FreeVerse => "Free Verse",
            Self::Ode => "Ode",
            Self::Ballad => "Ballad",
            Self::Epic => "Epic",
        }
    }

    /// Parse from the exact label. Matching is case-sensitive.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.label() == label)
    }

    /// Lowercase, hyphenated form used in download filenames (`free-verse`).
    pub fn slug(self) -> String {
        self.label().to_lowercase().replace(' ', "-")
    }
}

impl Default for PoemStyle {
    fn default() -> Self {
        Self::ALL[0]
    }
}

impl fmt::Display for PoemStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PoemStyle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| {
            let valid: Vec<&str> = Self::ALL.iter().map(|s| s.label()).collect();
            CoreError::Validation(format!(
                "Unknown poem style '{s}'. Must be one of: {}",
                valid.join(", ")
            ))
        })
    }
}
