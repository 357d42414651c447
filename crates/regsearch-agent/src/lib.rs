//! Question answering over the retrieval engine: a chat-model boundary,
//! retrieval exposed as tools, and a bounded tool-calling loop.

pub mod drivers;
pub mod llm;
pub mod messages;
pub mod orchestrator;
pub mod tools;

pub use drivers::{question_prompt, system_message, Answerer, ContextSource};
pub use llm::{ChatModel, OpenAiChat};
pub use messages::{Message, Role, ToolCall};
pub use orchestrator::{Orchestrator, Outcome, Run, DEFAULT_MAX_CALLS};
pub use tools::{retrieval_tools, QueryTool, Tool, ToolRegistry, ToolSchema, LOOKUP_DEFINITION, REGULATION_SEARCH};
