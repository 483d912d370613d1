//! `gemini-prompt` is an async client for the Gemini `generateContent` API
//! built around rate-limit-aware retries.
//!
//! - [`RetryingCaller`] retries `429` responses, honoring `Retry-After` and
//!   `RetryInfo` hints before falling back to exponential backoff.
//! - [`GeminiClient`] sends requests through it with an injected API key.
//! - [`Signature`] and [`Predict`] turn typed records into prompts and parse
//!   the replies back.
//! - [`LabeledFewShot`] and [`InstructionSearch`] optimize a [`Predict`]
//!   against labeled examples; [`evaluate`] scores it.
//! - [`WikipediaSearch`] and [`Rag`] add retrieval-augmented answering.

mod client;
mod decode;
mod error;
mod evaluate;
mod hint;
mod optimize;
mod options;
mod predict;
mod rag;
mod retry;
mod search;
mod signature;
mod types;
mod wire;

pub use client::{normalize_model_name, GeminiClient, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::PromptError;
pub use evaluate::{evaluate, exact_match, Evaluation, Outcome};
pub use hint::{DelayHint, HintSource};
pub use optimize::{InstructionSearch, LabeledFewShot, Optimizer, Trial};
pub use options::ClientOptions;
pub use predict::{Example, Predict, Prediction};
pub use rag::{AnswerInput, AnswerOutput, GenerateAnswer, Rag, RagAnswer};
pub use retry::{CallAttempt, RetryPolicy, RetryingCaller, Sleeper, TokioSleeper};
pub use search::{SearchProvider, WikipediaSearch, WIKIPEDIA_API_URL};
pub use signature::{
    parse_output, render_input, render_system_instruction, Field, Signature, REASONING_FIELD,
};
pub use types::{GenerateRequest, Generation, HistoryEntry, Passage, Role, Turn, Usage};

pub type Result<T> = std::result::Result<T, PromptError>;
