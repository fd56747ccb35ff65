pub mod agent;
pub mod formatter;
pub mod translator;

pub use agent::{ChatAgent, ChatTurn, TurnError};
pub use formatter::ResponseFormatter;
pub use translator::QueryTranslator;
