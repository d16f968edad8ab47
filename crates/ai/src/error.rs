/// Errors from the AI boundary.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("Model request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The model endpoint returned a non-2xx status code.
    #[error("Model API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The call did not finish within the configured timeout.
    #[error("Model request timed out after {0}s")]
    Timeout(u64),

    /// The response did not match the expected output shape.
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    /// Extraction succeeded but one of the two fields was empty.
    #[error("Incomplete photo analysis: missing {0}")]
    IncompleteAnalysis(&'static str),
}
