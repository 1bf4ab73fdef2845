//! # agent-runtime
//!
//! Model client adapters for the agent system.
//!
//! ## Providers
//!
//! - **Gemini** (default): hosted `generateContent` endpoint
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::gemini::GeminiProvider;
//!
//! let provider = GeminiProvider::from_env()?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .build()?;
//! ```

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, AgentSession, Conversation, LlmProvider, Message, Result, Role, Tool,
    ToolRegistry,
};
