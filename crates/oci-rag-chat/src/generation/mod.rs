//! Prompt rendering and streamed answer delivery

pub mod prompt;
pub mod stream;

pub use prompt::{PromptBuilder, PromptLanguage, PromptTemplate};
pub use stream::{ResponseStream, SseDecoder, SseEvent};
