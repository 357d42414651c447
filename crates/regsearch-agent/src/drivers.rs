//! The three ways of answering a question: model alone, model over one
//! retrieved context, and model with retrieval tools.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use regsearch_core::config::{AnswerMode, Settings};
use regsearch_core::error::Error;
use regsearch_hybrid::{ContextBundle, RetrievalEngine};

use crate::llm::{ChatModel, OpenAiChat};
use crate::messages::Message;
use crate::orchestrator::{Orchestrator, Outcome, Run, DEFAULT_MAX_CALLS};
use crate::tools::{retrieval_tools, ToolRegistry};

pub const SYSTEM_MESSAGE_BASE: &str =
    "You are an assitant to a Formula 1 team.  Your job is to answer team questions to the best of your ability.";

pub const RETRIEVAL_INSTRUCTIONS: &str = "  You will be given several excerpts from regulations \
to help you in answering.  Some of the provided regulations may be irrelevant, so \
ignore these and only use those that appear to be relevant. Do not mention or cite \
regulations that are not given to you.  Answer succinctly and make reference to the \
relevant regulation sections.\n\n\
Think carefully about the question and the provided regulations and definitions. Check that your \
response makes sense before answering.";

pub const TOOL_INSTRUCTIONS: &str = "\n\nIf you need additional information, if you need to refine your response, \
or if the provided regulations do not appear to answer the question, you should run additional regulation \
searches using the `regulation_search` function. When using this function your queries should rephrase or \
refine the original question; don't repeat the original question becuase you will get the same results. \
You can also look up any word or phrase that you are not sure about using the `lookup_definition` function.  \
Repeated tool calls may be necessary to get an accurate response.  Do your best!";

pub fn system_message(mode: AnswerMode) -> String {
    match mode {
        AnswerMode::LlmOnly => SYSTEM_MESSAGE_BASE.to_string(),
        AnswerMode::Search => format!("{}{}", SYSTEM_MESSAGE_BASE, RETRIEVAL_INSTRUCTIONS),
        AnswerMode::Agentic => format!("{}{}{}", SYSTEM_MESSAGE_BASE, RETRIEVAL_INSTRUCTIONS, TOOL_INSTRUCTIONS),
    }
}

pub fn question_prompt(context: &str, question: &str) -> String {
    format!("{}\n\nHere is the question: {}", context, question)
}

/// Where the seed context for a question comes from.
pub trait ContextSource: Send + Sync {
    fn context(&self, question: &str) -> Result<ContextBundle>;
}

impl ContextSource for RetrievalEngine {
    fn context(&self, question: &str) -> Result<ContextBundle> { RetrievalEngine::context(self, question) }
}

pub struct Answerer {
    model: Arc<dyn ChatModel>,
    context: Option<Arc<dyn ContextSource>>,
    tools: ToolRegistry,
    include_definitions: bool,
    max_calls: usize,
}

impl Answerer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model, context: None, tools: ToolRegistry::new(), include_definitions: true, max_calls: DEFAULT_MAX_CALLS }
    }

    /// OpenAI-compatible model plus the engine's search and lookup tools.
    pub fn from_settings(settings: &Settings, engine: Arc<RetrievalEngine>) -> Result<Self> {
        let model: Arc<dyn ChatModel> = Arc::new(OpenAiChat::from_settings(&settings.llm)?);
        Ok(Self::new(model)
            .with_tools(retrieval_tools(engine.clone()))
            .with_context(engine)
            .include_definitions(settings.llm.include_definitions)
            .with_max_calls(settings.llm.max_calls))
    }

    pub fn with_context(mut self, context: Arc<dyn ContextSource>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn include_definitions(mut self, include: bool) -> Self {
        self.include_definitions = include;
        self
    }

    pub fn with_max_calls(mut self, max_calls: usize) -> Self {
        self.max_calls = max_calls;
        self
    }

    pub fn answer(&self, mode: AnswerMode, question: &str) -> Result<Run> {
        match mode {
            AnswerMode::LlmOnly => self.llm_only(question),
            AnswerMode::Search => self.with_search(question),
            AnswerMode::Agentic => self.agentic(question),
        }
    }

    pub fn llm_only(&self, question: &str) -> Result<Run> {
        self.single_call(vec![Message::system(system_message(AnswerMode::LlmOnly)), Message::user(question)])
    }

    pub fn with_search(&self, question: &str) -> Result<Run> {
        let prompt = self.seeded_prompt(question)?;
        self.single_call(vec![Message::system(system_message(AnswerMode::Search)), Message::user(prompt)])
    }

    pub fn agentic(&self, question: &str) -> Result<Run> {
        let prompt = self.seeded_prompt(question)?;
        let messages = vec![Message::system(system_message(AnswerMode::Agentic)), Message::user(prompt)];
        Orchestrator::new(self.model.as_ref(), &self.tools).with_max_calls(self.max_calls).run(messages)
    }

    fn seeded_prompt(&self, question: &str) -> Result<String> {
        let source = self.context.as_ref().ok_or_else(|| Error::InvalidConfig("this answer mode needs a retrieval context".into()))?;
        let bundle = source.context(question)?;
        info!(regulations = bundle.regulations.len(), definitions = bundle.definitions.len(), "context assembled");
        Ok(question_prompt(&bundle.to_context(self.include_definitions), question))
    }

    fn single_call(&self, messages: Vec<Message>) -> Result<Run> {
        info!("calling language model");
        let reply = self.model.generate(&messages, &[])?;
        let outcome = Outcome::Answered(reply.content.clone());
        let mut transcript = messages;
        transcript.push(reply);
        Ok(Run { outcome, model_calls: 1, transcript })
    }
}
