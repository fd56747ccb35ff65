pub mod chat;
pub mod client;
pub mod monitoring;
pub mod prompt;
pub mod sql_guard;
pub mod storage;
pub mod types;
pub mod web;

pub use crate::types::*;

use std::sync::Arc;

use crate::chat::{ChatAgent, QueryTranslator, ResponseFormatter};
use crate::client::{CompletionClient, OpenAiClient};
use crate::prompt::PromptTemplate;
use crate::storage::{create_read_only_pool, create_sqlite_pool, DataGenerator, QueryExecutor};

/// Long-lived handles built once at startup and shared by every turn.
pub struct App {
    pub agent: Arc<ChatAgent>,
    pub generator: Arc<DataGenerator>,
}

impl App {
    /// Wire the pipeline from config: the SQL prompt is loaded once here, the
    /// completion client and both pools are created once and injected.
    pub async fn build(cfg: &AppConfig) -> anyhow::Result<Self> {
        let client: Arc<dyn CompletionClient> = Arc::new(OpenAiClient::new(&cfg.llm)?);
        Self::build_with_client(cfg, client).await
    }

    /// Same as [`build`](Self::build) with a caller-supplied completion client.
    pub async fn build_with_client(
        cfg: &AppConfig,
        client: Arc<dyn CompletionClient>,
    ) -> anyhow::Result<Self> {
        let prompt = Arc::new(PromptTemplate::load_or_builtin(
            cfg.prompts.sql_prompt_path.as_deref(),
        )?);

        // The executor's read-only pool needs the file to exist.
        let generator = DataGenerator::new(create_sqlite_pool(&cfg.database).await?);
        generator.create_table().await?;
        let executor = QueryExecutor::new(create_read_only_pool(&cfg.database).await?);

        let translator = QueryTranslator::new(client.clone(), prompt);
        let formatter = cfg
            .chat
            .format_response
            .then(|| ResponseFormatter::new(client));

        Ok(Self {
            agent: Arc::new(ChatAgent::new(translator, executor, formatter)),
            generator: Arc::new(generator),
        })
    }

    pub fn web_state(&self) -> web::AppState {
        web::AppState {
            agent: self.agent.clone(),
            generator: self.generator.clone(),
        }
    }
}
