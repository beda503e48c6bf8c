//! HTTP gateway module.
//!
//! This module provides the OpenAI-compatible HTTP API that accepts
//! requests, picks a provider from the model name and forwards them.

pub mod gemini;
mod handlers;
pub mod history;
mod server;
pub mod stream;
pub mod types;
pub mod upstream;

pub use server::{create_router, run_server, AppState, TraceId, TRACE_ID_HEADER};
pub use types::{ChatCompletionRequest, ChatCompletionResponse, GenerationMeta};
