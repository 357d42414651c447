//! Bounded tool-calling loop.
//!
//! The loop alternates between asking the model and running the tools it
//! requested. Every model call counts toward `max_calls`; when the bound is
//! reached the loop stops with whatever the last reply said, even if that
//! reply asked for more tools.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::llm::ChatModel;
use crate::messages::{Message, ToolCall};
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_CALLS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The model replied without requesting tools.
    Answered(String),
    /// The call bound was hit while the model still wanted tools.
    IterationLimit(String),
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Outcome::Answered(text) | Outcome::IterationLimit(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Outcome::Answered(text) | Outcome::IterationLimit(text) => text,
        }
    }
}

#[derive(Debug)]
enum State {
    AwaitingModel,
    ExecutingTools(Vec<ToolCall>),
    Done(Outcome),
}

/// Result of one question: the outcome plus the conversation that produced it.
#[derive(Debug, Clone)]
pub struct Run {
    pub outcome: Outcome,
    pub model_calls: usize,
    pub transcript: Vec<Message>,
}

pub struct Orchestrator<'a> {
    model: &'a dyn ChatModel,
    tools: &'a ToolRegistry,
    max_calls: usize,
}

impl<'a> Orchestrator<'a> {
    pub fn new(model: &'a dyn ChatModel, tools: &'a ToolRegistry) -> Self {
        Self { model, tools, max_calls: DEFAULT_MAX_CALLS }
    }

    pub fn with_max_calls(mut self, max_calls: usize) -> Self {
        self.max_calls = max_calls.max(1);
        self
    }

    pub fn max_calls(&self) -> usize { self.max_calls }

    /// Drive the conversation seeded with `messages` to a terminal state.
    /// Model failures propagate; tool failures become observations.
    pub fn run(&self, messages: Vec<Message>) -> Result<Run> {
        let schemas = self.tools.schemas();
        let mut history = messages;
        let mut calls = 0;
        let mut state = State::AwaitingModel;
        loop {
            state = match state {
                State::AwaitingModel => {
                    info!(call = calls + 1, max = self.max_calls, "calling language model");
                    let reply = self.model.generate(&history, &schemas)?;
                    calls += 1;
                    let next = if !reply.has_tool_calls() {
                        State::Done(Outcome::Answered(reply.content.clone()))
                    } else if calls >= self.max_calls {
                        warn!(calls, "model call limit reached with tool calls pending");
                        State::Done(Outcome::IterationLimit(reply.content.clone()))
                    } else {
                        State::ExecutingTools(reply.tool_calls.clone())
                    };
                    history.push(reply);
                    next
                }
                State::ExecutingTools(requested) => {
                    debug!(count = requested.len(), "calling tools");
                    for call in &requested {
                        let observation = self.tools.execute(call);
                        history.push(Message::tool_result(call.id.clone(), observation));
                    }
                    State::AwaitingModel
                }
                State::Done(outcome) => {
                    return Ok(Run { outcome, model_calls: calls, transcript: history });
                }
            };
        }
    }
}
