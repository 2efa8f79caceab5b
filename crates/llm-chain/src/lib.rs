//! `llm-chain`: ordered LLM provider fallback for reply generation.
//!
//! # Architecture
//!
//! ```text
//! ChainConfig (llm: section)
//!     │
//!     ▼
//! FallbackChain   ← candidates sorted by priority, retry budget per candidate
//!     │
//!     ▼
//! TextProvider    ← HttpProvider (OpenAI-compatible / Anthropic) or a test double
//!     │
//!     ▼
//! normalize()     ← strips fences, quotes, emphasis, "Here's a reply:"
//! ```
//!
//! Every call made while resolving a request lands in the attempt trail,
//! whether it succeeded or not. An exhausted chain returns
//! [`ChainError::AllProvidersExhausted`] with that trail; it never returns
//! empty text.

pub mod backoff;
pub mod chain;
pub mod config;
pub mod error;
pub mod http;
pub mod normalize;
pub mod provider;
pub mod types;


pub use backoff::Backoff;
pub use chain::{ChainSettings, FallbackChain};
pub use config::ChainConfig;
pub use error::{ChainError, ProviderError};
pub use http::{ApiStyle, HttpProvider, ProviderEndpoint};
pub use normalize::normalize;
pub use provider::{ProviderRegistry, TextProvider};
pub use types::{Attempt, GenerationRequest, GenerationResult, ProviderCandidate};
