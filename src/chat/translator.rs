use std::sync::Arc;

use crate::client::{ClientResult, CompletionClient};
use crate::prompt::{build_sql_messages, PromptTemplate};

/// Turns a free-text question into candidate SQL with one completion call.
///
/// The returned text is exactly what the endpoint produced. Checking that it
/// is a safe query happens in the executor.
pub struct QueryTranslator {
    client: Arc<dyn CompletionClient>,
    prompt: Arc<PromptTemplate>,
}

impl QueryTranslator {
    pub fn new(client: Arc<dyn CompletionClient>, prompt: Arc<PromptTemplate>) -> Self {
        Self { client, prompt }
    }

    pub async fn translate(&self, question: &str) -> ClientResult<String> {
        let messages = build_sql_messages(&self.prompt, question);
        self.client.complete(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::client::{ChatMessage, ClientError, Role};

    #[derive(Default)]
    struct RecordingClient {
        reply: String,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl CompletionClient for RecordingClient {
        async fn complete(&self, messages: &[ChatMessage]) -> ClientResult<String> {
            self.calls.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }
    }

    struct FailingClient;

    #[async_trait]
    impl CompletionClient for FailingClient {
        async fn complete(&self, _messages: &[ChatMessage]) -> ClientResult<String> {
            Err(ClientError::EmptyCompletion)
        }
    }

    #[tokio::test]
    async fn issues_one_request_and_returns_content_verbatim() {
        let reply = "  SELECT symbol FROM trades;  \n".to_string();
        let client = Arc::new(RecordingClient {
            reply: reply.clone(),
            ..Default::default()
        });
        let translator = QueryTranslator::new(client.clone(), Arc::new(PromptTemplate::builtin_sql()));

        let sql = translator.translate("Which symbols were traded?").await.unwrap();
        assert_eq!(sql, reply);

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 2);
        assert_eq!(calls[0][0].role, Role::System);
        assert!(calls[0][1].content.contains("Which symbols were traded?"));
    }

    #[tokio::test]
    async fn uses_injected_prompt() {
        let client = Arc::new(RecordingClient::default());
        let prompt = Arc::new(PromptTemplate {
            role: Role::System,
            content: "custom instruction".to_string(),
        });
        let translator = QueryTranslator::new(client.clone(), prompt);
        translator.translate("q").await.unwrap();
        assert_eq!(client.calls.lock().unwrap()[0][0].content, "custom instruction");
    }

    #[tokio::test]
    async fn endpoint_errors_propagate() {
        let translator =
            QueryTranslator::new(Arc::new(FailingClient), Arc::new(PromptTemplate::builtin_sql()));
        let err = translator.translate("anything").await.unwrap_err();
        assert!(matches!(err, ClientError::EmptyCompletion));
    }
}
