//! Streaming JSON token layer
//!
//! The converter speaks to JSON through the `JsonReader` and `JsonWriter`
//! traits only. The implementations here back those traits with serde_json:
//! `ValueReader` tokenizes a parsed document, `TextWriter` emits compact
//! JSON text.

pub mod reader;
pub mod token;
pub mod writer;

pub use reader::{JsonReader, ValueReader};
pub use token::{Token, TokenKind};
pub use writer::{JsonWriter, TextWriter};
