pub mod agent;
pub mod llm;
pub mod prompts;

pub use agent::{parse_payload, AnalysisAgent, AnalysisOptions};
pub use llm::{ChatCompleter, OpenAiChat, DEFAULT_MODEL};
