//! Orchestration Loop
//!
//! Drives the multi-round exchange with the model: send the conversation,
//! parse the response, dispatch any tool requests, fold the results back
//! in, and repeat until the parser yields a final answer or the round
//! bound is reached.
//!
//! Each round is staged and committed to the conversation atomically, so
//! an abort while awaiting the model or a tool leaves the history at the
//! last completed round, never half-appended.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};
use crate::parser::{strip_thinking_lossy, ResponseParser};
use crate::provider::{complete_with_backoff, GenerationOptions, LlmProvider, RetryPolicy};
use crate::session::AgentSession;
use crate::tool::{ToolInvocation, ToolRegistry, ToolResult};

/// Protocol state for one conversation turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Waiting on the model client adapter
    AwaitingModel,
    /// Extracting tool requests and answer from raw model text
    Parsing,
    /// Executing this round's tool requests
    DispatchingTools,
    /// A final answer was produced
    Done,
    /// Adapter retries exhausted
    Failed,
}

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// System prompt template
    pub system_prompt: String,

    /// Hard bound on rounds per user turn
    pub max_rounds: usize,

    /// Generation options passed to the adapter
    pub generation: GenerationOptions,

    /// Retry policy for transient adapter failures
    pub retry: RetryPolicy,

    /// Deadline for a single tool execution
    pub tool_timeout: Duration,

    /// Cap on a single tool output folded into the conversation
    pub max_tool_output_chars: usize,

    /// Whether to append the tool catalogue to the system prompt
    pub inject_tool_catalogue: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_rounds: 8,
            generation: GenerationOptions::default(),
            retry: RetryPolicy::default(),
            tool_timeout: Duration::from_secs(60),
            max_tool_output_chars: 6000,
            inject_tool_catalogue: true,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful AI assistant with access to tools.

Private reasoning goes inside <thinking>...</thinking> tags; it is never
shown to the user.

Use tools only when they are truly necessary. When you do, emit one
fenced block per request:
```tool
{"tool": "tool_name", "arguments": {"arg1": "value1"}}
```

After receiving tool results, synthesize them into a helpful answer.
If you can answer directly, do so without any tool block."#;

/// Observability record emitted when the session debug flag is on.
/// Never changes control flow.
#[derive(Clone, Debug)]
pub enum DebugEvent {
    /// Raw model output for a round
    RawResponse { round: usize, content: String },
    /// Stripped thinking commentary
    Thinking { round: usize, content: String },
    /// Round flagged malformed; zero requests dispatched
    MalformedRound { round: usize, reason: String },
    /// Adapter call retried
    AdapterRetry { attempt: u32, reason: String },
    /// Tool request handed to the registry
    ToolDispatch { round: usize, name: String, id: String },
    /// Tool result folded back into the conversation
    ToolOutcome {
        round: usize,
        name: String,
        id: String,
        success: bool,
    },
}

/// Outcome of one user turn
#[derive(Clone, Debug)]
pub struct ChatOutcome {
    /// User-facing answer (thinking and tool blocks stripped)
    pub answer: String,

    /// True when the round bound forced termination with a best-effort
    /// partial answer
    pub truncated: bool,

    /// Rounds consumed
    pub rounds: usize,

    /// Debug trace; empty unless the debug flag was on
    pub debug_trace: Vec<DebugEvent>,
}

/// The orchestration agent: one provider, one immutable tool registry
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
    parser: ResponseParser,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
            parser: ResponseParser::new(),
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Full system prompt including the tool catalogue
    fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.inject_tool_catalogue && !self.tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.tools.prompt_section());
        }

        prompt
    }

    /// Process one user turn within a session
    pub async fn chat(&self, session: &mut AgentSession, input: &str) -> Result<ChatOutcome> {
        session.conversation.push(Message::user(input));
        let debug = session.debug;
        let outcome = self.run(&mut session.conversation, debug).await?;
        session.touch();
        Ok(outcome)
    }

    /// Single-shot convenience entry over a throwaway conversation
    pub async fn ask(&self, question: &str) -> Result<ChatOutcome> {
        let mut conversation = Conversation::new();
        conversation.push(Message::user(question));
        self.run(&mut conversation, false).await
    }

    /// Run the loop until a final answer, the round bound, or adapter
    /// exhaustion. The conversation must end with the new user message.
    pub async fn run(&self, conversation: &mut Conversation, debug: bool) -> Result<ChatOutcome> {
        conversation.ensure_system_prompt(self.build_system_prompt());

        let mut trace: Vec<DebugEvent> = Vec::new();
        let mut last_cleaned = String::new();

        for round in 1..=self.config.max_rounds {
            let mut phase = Phase::AwaitingModel;
            tracing::debug!(round, ?phase, "starting round");

            let completion = match complete_with_backoff(
                self.provider.as_ref(),
                conversation.messages(),
                &self.config.generation,
                &self.config.retry,
                |attempt, err| {
                    if debug {
                        trace.push(DebugEvent::AdapterRetry {
                            attempt,
                            reason: err.to_string(),
                        });
                    }
                },
            )
            .await
            {
                Ok(completion) => completion,
                Err(err) => {
                    phase = Phase::Failed;
                    tracing::error!(round, ?phase, error = %err, "adapter retries exhausted");
                    return Err(err);
                }
            };

            phase = Phase::Parsing;
            let raw = completion.content;
            tracing::debug!(round, ?phase, chars = raw.len(), "model response received");
            if debug {
                trace.push(DebugEvent::RawResponse {
                    round,
                    content: raw.clone(),
                });
            }

            let parsed = match self.parser.parse(&raw) {
                Ok(parsed) => parsed,
                Err(AgentError::Parse(reason)) => {
                    // Malformed round: flag it, dispatch nothing, ask the
                    // model to correct itself. Counts against the bound.
                    tracing::warn!(round, %reason, "malformed tool request, asking model to retry");
                    if debug {
                        trace.push(DebugEvent::MalformedRound {
                            round,
                            reason: reason.clone(),
                        });
                    }
                    // Even a rejected round must not replay reasoning
                    // text on the next adapter call.
                    conversation.extend([
                        Message::assistant(strip_thinking_lossy(&raw)),
                        Message::user(corrective_note(&reason)),
                    ]);
                    continue;
                }
                Err(other) => return Err(other),
            };

            if let Some(thinking) = &parsed.thinking {
                tracing::debug!(round, thinking = %thinking, "thinking section stripped");
                if debug {
                    trace.push(DebugEvent::Thinking {
                        round,
                        content: thinking.clone(),
                    });
                }
            }

            // Stage the round; commit only when it completes.
            let mut staged = vec![Message::assistant(&parsed.sans_thinking)];

            if let Some(answer) = parsed.final_answer() {
                phase = Phase::Done;
                tracing::debug!(round, ?phase, "final answer produced");
                let answer = answer.to_string();
                conversation.extend(staged);
                return Ok(ChatOutcome {
                    answer,
                    truncated: false,
                    rounds: round,
                    debug_trace: trace,
                });
            }

            last_cleaned = parsed.cleaned.clone();

            phase = Phase::DispatchingTools;
            tracing::debug!(round, ?phase, requests = parsed.requests.len(), "dispatching tools");
            if debug {
                for request in &parsed.requests {
                    trace.push(DebugEvent::ToolDispatch {
                        round,
                        name: request.name.clone(),
                        id: request.id.clone(),
                    });
                }
            }

            // Requests within a round are independent: execute them
            // concurrently, but record results in request order.
            let results = join_all(
                parsed
                    .requests
                    .iter()
                    .map(|request| self.dispatch_one(request)),
            )
            .await;

            for (request, result) in parsed.requests.iter().zip(results) {
                tracing::debug!(
                    round,
                    tool = %result.name,
                    success = result.success,
                    "tool result recorded"
                );
                if debug {
                    trace.push(DebugEvent::ToolOutcome {
                        round,
                        name: result.name.clone(),
                        id: request.id.clone(),
                        success: result.success,
                    });
                }
                staged.push(Message::tool(
                    self.format_tool_result(&result),
                    &result.name,
                    Some(request.id.clone()),
                    result.success,
                ));
            }

            conversation.extend(staged);
        }

        // Round bound reached without a final answer: forced Done with a
        // best-effort partial answer, flagged as truncated.
        tracing::warn!(
            max_rounds = self.config.max_rounds,
            "round bound reached without final answer"
        );
        let answer = if last_cleaned.is_empty() {
            "I could not complete the request within the allowed number of tool rounds.".to_string()
        } else {
            last_cleaned
        };

        Ok(ChatOutcome {
            answer,
            truncated: true,
            rounds: self.config.max_rounds,
            debug_trace: trace,
        })
    }

    /// Dispatch a single request, mapping every failure class (unknown
    /// tool, bad arguments, execution error, timeout) into a failed
    /// result instead of an escalating error.
    async fn dispatch_one(&self, request: &ToolInvocation) -> ToolResult {
        let dispatched = tokio::time::timeout(
            self.config.tool_timeout,
            self.tools.dispatch(request),
        )
        .await;

        let result = match dispatched {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => ToolResult::failure(&request.name, format!("Error: {}", err)),
            Err(_) => ToolResult::failure(
                &request.name,
                format!(
                    "Error: tool '{}' timed out after {}s",
                    request.name,
                    self.config.tool_timeout.as_secs()
                ),
            ),
        };

        result.with_id(request.id.clone())
    }

    /// Render a tool result for the conversation, applying the oversized
    /// output policy: explicit truncation with a visible marker.
    fn format_tool_result(&self, result: &ToolResult) -> String {
        let output = truncate_output(&result.output, self.config.max_tool_output_chars);
        if result.success {
            format!("[Tool '{}' returned]\n{}", result.name, output)
        } else {
            format!("[Tool '{}' failed]\n{}", result.name, output)
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

fn corrective_note(reason: &str) -> String {
    format!(
        "Your previous response contained a malformed tool request ({}). \
         No tools were run. Re-send the request as a fenced block:\n\
         ```tool\n{{\"tool\": \"tool_name\", \"arguments\": {{\"arg\": \"value\"}}}}\n```\n\
         or answer the question directly without tools.",
        reason
    )
}

/// Truncate oversized tool output with an explicit marker; never silent.
fn truncate_output(output: &str, max_chars: usize) -> String {
    if output.chars().count() <= max_chars {
        return output.to_string();
    }

    let shown: String = output.chars().take(max_chars).collect();
    format!(
        "{}\n[output truncated: shown {} of {} chars]",
        shown,
        max_chars,
        output.chars().count()
    )
}

/// Builder for agent construction
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Register a tool; duplicate names fail at build time
    pub fn tool<T: crate::tool::Tool + 'static>(mut self, tool: T) -> Result<Self> {
        self.tools.register(tool)?;
        Ok(self)
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn max_rounds(mut self, max: usize) -> Self {
        self.config.max_rounds = max;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("provider is required".into()))?;

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}
