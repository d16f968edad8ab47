//! Prompt templates for the two model calls.

use crate::analysis::PoemRequest;

/// Instruction sent alongside the photo for extraction.
pub const EXTRACTION_PROMPT: &str = "You are an AI that analyzes photos and extracts themes and emotions.\n\n\
Analyze the photo and extract the themes and emotions present in the photo. \
Respond with comma separated values.";

/// Build the generation prompt. The style line is omitted when no style is given.
pub fn poem_prompt(request: &PoemRequest) -> String {
    let mut prompt = String::from(
        "You are a skilled poet. You will generate a poem based on the themes and \
         emotions extracted from a photo.\n\n",
    );
    prompt.push_str(&format!("Themes: {}\n", request.themes));
    prompt.push_str(&format!("Emotions: {}\n\n", request.emotions));
    if let Some(style) = request.style {
        prompt.push_str(&format!("Poem Style: {style}\n\n"));
    }
    prompt.push_str("Generate a poem that reflects the image's mood.\n");
    prompt
}

#[cfg(test)]
mod tests {
    use photopoet_core::style::PoemStyle;

    use super::*;

    fn request(style: Option<PoemStyle>) -> PoemRequest {
        PoemRequest {
            themes: "mountains, solitude".into(),
            emotions: "peace, awe".into(),
            style,
        }
    }

    #[test]
    fn includes_themes_emotions_and_style() {
        let prompt = poem_prompt(&request(Some(PoemStyle::FreeVerse)));
        assert!(prompt.contains("Themes: mountains, solitude\n"));
        assert!(prompt.contains("Emotions: peace, awe\n"));
        assert!(prompt.contains("Poem Style: Free Verse\n"));
    }

    #[test]
    fn omits_style_line_without_style() {
        assert!(!poem_prompt(&request(None)).contains("Poem Style"));
    }
}
