//! Token usage accounting shared by the `LlmClient` seam (§6: "the bridge
//! MUST return token usage") and the per-run [`crate::observability`]
//! report. The provider response carries its own token counts; nothing here
//! estimates them locally.

use serde::{Deserialize, Serialize};

/// Token usage reported by a single LLM call, or aggregated across a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self { input_tokens, output_tokens, total_tokens: input_tokens + output_tokens }
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens = self.input_tokens + self.output_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_accumulates_both_fields() {
        let mut usage = TokenUsage::new(10, 5);
        usage.add(&TokenUsage::new(3, 2));
        assert_eq!(usage.input_tokens, 13);
        assert_eq!(usage.output_tokens, 7);
        assert_eq!(usage.total_tokens, 20);
    }
}
