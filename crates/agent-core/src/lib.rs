//! # agent-core
//!
//! Core of a tool-mediated conversational agent: the protocol by which
//! free-form model output is parsed for tool requests, tools are
//! dispatched, and their results are folded back into the conversation
//! until a final user-facing answer is produced.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Agent                                │
//! │  ┌───────────────┐  ┌──────────┐  ┌──────────────────────┐   │
//! │  │ Orchestration │  │ Response │  │    ToolRegistry      │   │
//! │  │     Loop      │──│  Parser  │──│  (named capabilities)│   │
//! │  └───────┬───────┘  └──────────┘  └──────────────────────┘   │
//! │          │                                                   │
//! │  ┌───────┴──────────┐                                        │
//! │  │   LlmProvider    │  (model client adapter boundary)       │
//! │  └──────────────────┘                                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait keeps the hosted endpoint swappable; the
//! `Tool` trait makes new capabilities pluggable without touching the
//! loop.

pub mod error;
pub mod message;
pub mod orchestrator;
pub mod parser;
pub mod provider;
pub mod session;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{Conversation, Message, Role};
pub use orchestrator::{Agent, AgentBuilder, AgentConfig, ChatOutcome, DebugEvent};
pub use parser::{ParsedResponse, ResponseParser};
pub use provider::{Completion, GenerationOptions, LlmProvider, RetryPolicy};
pub use session::{AgentSession, SessionId, SessionStore};
pub use tool::{ParameterSpec, Tool, ToolInvocation, ToolRegistry, ToolResult, ToolSpec};
