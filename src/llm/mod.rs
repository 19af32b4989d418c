//! LLM client abstraction and the reasoning provider adapter.
//!
//! The grounding judge talks to a [`ReasoningProvider`]; the bundled
//! [`LlmReasoningProvider`] adapts any [`LLMClient`] (OpenAI, Anthropic) to
//! that interface.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rag_audit::llm::{build_client, ClientConfig, LlmReasoningProvider, Provider};
//!
//! let client = build_client(Provider::OpenAI, ClientConfig::from_env(Provider::OpenAI)?)?;
//! let provider = LlmReasoningProvider::new(client).with_model("gpt-4o-mini");
//!
//! let generation = provider.generate("You are an auditor.", "CONTEXT: ...").await?;
//! println!("{}", generation.content);
//! ```

mod client;
mod provider;
#[cfg(test)]
pub(crate) mod testing;
mod types;

pub use client::{build_client, AnthropicClient, ClientConfig, LLMClient, OpenAIClient};
pub use provider::{Generation, LlmReasoningProvider, ReasoningProvider};
pub use types::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, Provider, StopReason, TokenUsage,
};
