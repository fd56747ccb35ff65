use std::sync::Arc;

use crate::client::{ChatMessage, ClientResult, CompletionClient};
use crate::prompt::FORMATTER_INSTRUCTION;
use crate::storage::models::QueryOutcome;

/// Phrases raw query rows as a natural-language answer.
pub struct ResponseFormatter {
    client: Arc<dyn CompletionClient>,
}

impl ResponseFormatter {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    pub fn format_prompt(question: &str, outcome: &QueryOutcome) -> String {
        format!(
            "User query: {question}\nRaw response: {}\nGenerated response: ",
            outcome.raw_display()
        )
    }

    pub async fn format(&self, question: &str, outcome: &QueryOutcome) -> ClientResult<String> {
        let messages = [
            ChatMessage::system(FORMATTER_INSTRUCTION),
            ChatMessage::user(Self::format_prompt(question, outcome)),
        ];
        self.client.complete(&messages).await
    }
}
