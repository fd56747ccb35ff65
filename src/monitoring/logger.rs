use serde::Serialize;
use tracing::info;

use crate::types::AppConfig;

#[derive(Serialize)]
struct StartupLog<'a> {
    event: &'a str,
    database: &'a str,
    model: &'a str,
    llm_base_url: &'a str,
    api_key_present: bool,
    sql_prompt: &'a str,
    format_response: bool,
    bind_addr: &'a str,
}

pub fn log_startup(cfg: &AppConfig) {
    let payload = StartupLog {
        event: "startup",
        database: &cfg.database.url,
        model: &cfg.llm.model,
        llm_base_url: &cfg.llm.base_url,
        api_key_present: cfg.llm.api_key.is_some(),
        sql_prompt: cfg.prompts.sql_prompt_path.as_deref().unwrap_or("builtin"),
        format_response: cfg.chat.format_response,
        bind_addr: &cfg.server.bind_addr,
    };
    info!(target: "chatbot", startup = serde_json::to_string(&payload).unwrap_or_default().as_str());
}
