//! Input and output shapes of the two model calls.

use photopoet_core::style::PoemStyle;
use serde::{Deserialize, Serialize};

use crate::error::AiError;

/// Extraction output: two comma-separated free-text lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoAnalysis {
    pub themes: String,
    pub emotions: String,
}

impl PhotoAnalysis {
    /// Trim both fields and reject the analysis if either is empty.
    pub fn validated(self) -> Result<Self, AiError> {
        let themes = self.themes.trim().to_string();
        let emotions = self.emotions.trim().to_string();
        if themes.is_empty() {
            return Err(AiError::IncompleteAnalysis("themes"));
        }
        if emotions.is_empty() {
            return Err(AiError::IncompleteAnalysis("emotions"));
        }
        Ok(Self { themes, emotions })
    }

    /// Individual theme entries.
    pub fn theme_list(&self) -> Vec<&str> {
        split_list(&self.themes)
    }

    /// Individual emotion entries.
    pub fn emotion_list(&self) -> Vec<&str> {
        split_list(&self.emotions)
    }
}

fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Generation input. The style is a prompt hint only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoemRequest {
    pub themes: String,
    pub emotions: String,
    pub style: Option<PoemStyle>,
}

impl PoemRequest {
    pub fn from_analysis(analysis: &PhotoAnalysis, style: Option<PoemStyle>) -> Self {
        Self {
            themes: analysis.themes.clone(),
            emotions: analysis.emotions.clone(),
            style,
        }
    }
}

/// Generation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPoem {
    pub poem: String,
}

impl GeneratedPoem {
    /// Reject blank output. Length and form are not checked.
    pub fn validated(self) -> Result<Self, AiError> {
        if self.poem.trim().is_empty() {
            return Err(AiError::MalformedOutput("empty poem".into()));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_themes_are_incomplete() {
        let analysis = PhotoAnalysis {
            themes: "  ".into(),
            emotions: "peace".into(),
        };
        assert_matches!(analysis.validated(), Err(AiError::IncompleteAnalysis("themes")));
    }

    #[test]
    fn empty_emotions_are_incomplete() {
        let analysis = PhotoAnalysis {
            themes: "mountains".into(),
            emotions: String::new(),
        };
        assert_matches!(
            analysis.validated(),
            Err(AiError::IncompleteAnalysis("emotions"))
        );
    }

    #[test]
    fn lists_split_on_commas() {
        let analysis = PhotoAnalysis {
            themes: "mountains, solitude,".into(),
            emotions: "peace, awe".into(),
        }
        .validated()
        .unwrap();
        assert_eq!(analysis.theme_list(), vec!["mountains", "solitude"]);
        assert_eq!(analysis.emotion_list(), vec!["peace", "awe"]);
    }

    #[test]
    fn blank_poem_is_malformed() {
        let poem = GeneratedPoem { poem: "\n ".into() };
        assert_matches!(poem.validated(), Err(AiError::MalformedOutput(_)));
    }
}
