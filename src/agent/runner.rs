//! Agent runner with the tag-driven tool loop.

use super::response::{render, AgentResponse};
use super::state::{Fault, PipelineState, TerminationReason, TraceStep};
use super::AgentConfig;
use crate::command::{parse_reply, ReplyKind, ToolCommand};
use crate::config::Prompts;
use crate::conversation::{ConversationState, Message, Role};
use crate::error::{PonderError, Result};
use crate::llm::LanguageModel;
use crate::text::truncate_with_marker;
use crate::tools::Toolbox;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Agent that lets a chat model call tools until it can answer.
///
/// Holds no per-request state, so one agent can serve many conversations
/// at once.
pub struct Agent {
    model: Arc<dyn LanguageModel>,
    tools: Toolbox,
    prompts: Prompts,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent with default prompts.
    pub fn new(model: Arc<dyn LanguageModel>, tools: Toolbox, config: AgentConfig) -> Self {
        Self {
            model,
            tools,
            prompts: Prompts::default(),
            config,
        }
    }

    /// Use custom prompts.
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &Toolbox {
        &self.tools
    }

    /// Answer a single question.
    pub async fn run(&self, message: &str) -> AgentResponse {
        self.run_with_cancel(message, &CancellationToken::new()).await
    }

    /// Answer a single question, stopping early if `cancel` fires.
    pub async fn run_with_cancel(&self, message: &str, cancel: &CancellationToken) -> AgentResponse {
        self.run_with_history(Vec::new(), message, cancel).await.0
    }

    /// Continue a conversation carried over from earlier requests.
    ///
    /// Returns the response together with the full history, which the caller
    /// can pass back in for the next message.
    #[instrument(skip_all)]
    pub async fn run_with_history(
        &self,
        history: Vec<Message>,
        message: &str,
        cancel: &CancellationToken,
    ) -> (AgentResponse, Vec<Message>) {
        let mut state = ConversationState::with_history(self.prepare_history(history));
        let mut trace = Vec::new();

        let outcome = self.drive(&mut state, message, cancel, &mut trace).await;
        state.mark_terminal();

        let response = render(&state, &outcome).with_trace(trace);
        info!(
            "Run {} ended as {} after {} turns",
            state.id(),
            outcome.label(),
            response.turns_used
        );
        (response, state.into_messages())
    }

    /// Replace any carried system prompt with a fresh one.
    fn prepare_history(&self, mut history: Vec<Message>) -> Vec<Message> {
        if history.first().is_some_and(|m| m.role == Role::System) {
            history.remove(0);
        }
        let system = self
            .prompts
            .system_prompt(chrono::Local::now(), &self.tools.catalog());
        history.insert(0, Message::system(system));
        history
    }

    #[instrument(skip_all, fields(conversation = %state.id()))]
    async fn drive(
        &self,
        state: &mut ConversationState,
        message: &str,
        cancel: &CancellationToken,
        trace: &mut Vec<TraceStep>,
    ) -> PipelineState {
        if let Err(e) = state.push_user(message) {
            return rejected(e);
        }
        trace.push(TraceStep::new(0, &PipelineState::NextStep));

        let mut previous = PipelineState::NextStep;
        loop {
            let current = match self.step(state, cancel, &previous).await {
                Ok(current) => current,
                Err(e) => rejected(e),
            };
            trace.push(TraceStep::new(state.turns(), &current));

            if current.is_terminal() {
                return current;
            }
            previous = current;
        }
    }

    /// One iteration: budget check, model call, classification, dispatch.
    async fn step(
        &self,
        state: &mut ConversationState,
        cancel: &CancellationToken,
        previous: &PipelineState,
    ) -> Result<PipelineState> {
        if cancel.is_cancelled() {
            return Ok(cancelled());
        }
        if state.turns() >= self.config.max_depth {
            warn!("{}", PonderError::DepthExceeded(self.config.max_depth));
            return Ok(PipelineState::Error(Fault::terminal(
                TerminationReason::DepthExceeded,
                self.prompts.agent.depth_exhausted.clone(),
            )));
        }

        let turn = state.begin_turn()?;
        info!("Turn {} of {}", turn, self.config.max_depth);

        let completion = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(cancelled()),
            reply = self.model.complete(state.messages(), &self.config.completion) => reply,
        };
        let reply = match completion {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Model call failed: {}", e);
                return Ok(PipelineState::Error(Fault::terminal(
                    TerminationReason::LlmFailed,
                    e.to_string(),
                )));
            }
        };
        debug!("Model replied with {} characters", reply.len());

        let parsed = parse_reply(&reply);
        state.push_assistant(reply)?;

        match parsed {
            Ok(parsed) => {
                state.record_annotations(&parsed.annotations);
                match parsed.kind {
                    ReplyKind::Command(command) => self.dispatch(state, command, cancel).await,
                    ReplyKind::Answer(_) => {
                        info!("Model produced a final answer");
                        Ok(PipelineState::Finished)
                    }
                    ReplyKind::Unclassified if matches!(previous, PipelineState::Unknown) => {
                        warn!("Second consecutive unclassifiable reply");
                        Ok(PipelineState::Error(Fault::terminal(
                            TerminationReason::ClassificationFailed,
                            PonderError::Classification(
                                "two consecutive replies were neither a tool command nor an answer"
                                    .to_string(),
                            )
                            .to_string(),
                        )))
                    }
                    ReplyKind::Unclassified => {
                        warn!("Unclassifiable reply; asking the model to retry");
                        state.push_tool(None, self.prompts.agent.reprompt.clone(), None)?;
                        Ok(PipelineState::Unknown)
                    }
                }
            }
            Err(e) => {
                warn!("Malformed tool tag: {}", e);
                state.push_tool(
                    None,
                    format!("<error>\n{}\nFix the tag and try again.\n</error>", e),
                    None,
                )?;
                Ok(PipelineState::Error(Fault::Parse(e)))
            }
        }
    }

    /// Run a command and feed its result back as a tool message.
    #[instrument(skip_all, fields(tool = %command.tool_kind))]
    async fn dispatch(
        &self,
        state: &mut ConversationState,
        command: ToolCommand,
        cancel: &CancellationToken,
    ) -> Result<PipelineState> {
        if cancel.is_cancelled() {
            return Ok(cancelled());
        }

        info!("Calling tool: {}", command);
        let kind = command.tool_kind;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(cancelled()),
            result = self.tools.invoke(kind, &command.arguments) => result,
        };

        let tag = if result.success {
            kind.result_tag()
        } else {
            kind.error_tag()
        };
        let body = truncate_with_marker(
            result.feedback_body().trim(),
            self.config.max_tool_message_chars,
        );
        state.push_tool(
            Some(kind),
            format!("<{}>\n{}\n</{}>", tag, body, tag),
            Some(result.to_payload()),
        )?;

        match result.error {
            None => Ok(PipelineState::NextStep),
            Some(error) => {
                warn!("Tool {} failed: {}", kind, error);
                Ok(PipelineState::Error(Fault::ToolFailed {
                    tool_kind: kind,
                    error,
                }))
            }
        }
    }
}

fn cancelled() -> PipelineState {
    PipelineState::Error(Fault::terminal(
        TerminationReason::Cancelled,
        PonderError::Cancelled.to_string(),
    ))
}

fn rejected(error: PonderError) -> PipelineState {
    PipelineState::Error(Fault::terminal(
        TerminationReason::HistoryRejected,
        error.to_string(),
    ))
}
