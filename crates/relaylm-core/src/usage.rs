//! Length-derived token accounting.
//!
//! The backend's generate API does not report counts the proxy can trust
//! across dialects, so usage is approximated from text length alone.

/// Characters per synthesized token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Approximate token count of `text` as `chars / 4`, rounded down.
#[must_use]
pub fn estimate_tokens(text: &str) -> u32 {
    u32::try_from(text.chars().count() / CHARS_PER_TOKEN).unwrap_or(u32::MAX)
}

/// Synthesized usage for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Estimate usage from the flattened prompt and the generated text.
    #[must_use]
    pub fn estimate(prompt: &str, completion: &str) -> Self {
        Self {
            prompt_tokens: estimate_tokens(prompt),
            completion_tokens: estimate_tokens(completion),
        }
    }

    #[must_use]
    pub const fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}
