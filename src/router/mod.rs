//! Router module for provider selection.
//!
//! Maps a requested model identifier onto one of the fixed upstream
//! providers. Selection is a pure function of the model string.

mod selector;

pub use selector::{select_provider, Provider};
