//! vibehub - local gateway for several LLM providers
//!
//! Exposes one OpenAI-compatible chat completions endpoint, routes each call
//! to a provider chosen from the model name, and records every call in an
//! append-only JSONL event log that can be queried back by trace id.

pub mod config;
pub mod error;
pub mod proxy;
pub mod router;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
