//! # Protojson - Protobuf JSON Conversion
//!
//! A bidirectional converter between dynamic protobuf messages and the
//! canonical protobuf JSON encoding, including proto2-style extension
//! fields.
//!
//! Conversion is plan-driven: the first use of a message type compiles its
//! descriptor into an immutable field plan (JSON property names plus a
//! typed codec per field) that is cached for the process lifetime. Every
//! subsequent read or write walks the plan against a streaming token layer
//! with no per-value type derivation.
//!
//! ## Modules
//!
//! - **descriptor**: schema metadata and the dynamic message model
//! - **convert**: field plans, codecs and the read/write drivers
//! - **json**: the streaming JSON token layer
//!
//! ## Quick Start
//!
//! ### Writing
//!
//! ```rust
//! use protojson::{
//!     DynamicMessage, FieldDescriptor, FieldKind, JsonConverter, MessageDescriptor, Value,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let person = MessageDescriptor::new(
//!     "example.Person",
//!     vec![
//!         FieldDescriptor::new(1, "name", FieldKind::String),
//!         FieldDescriptor::new(2, "tags", FieldKind::String).repeated(),
//!     ],
//! );
//!
//! let mut message = DynamicMessage::new(person);
//! message.set(1, Value::String("test".into()));
//! message.set(2, Value::List(vec![
//!     Value::String("a".into()),
//!     Value::String("b".into()),
//! ]));
//!
//! let json = JsonConverter::new().to_json_string(&message)?;
//! assert_eq!(json, r#"{"name":"test","tags":["a","b"]}"#);
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading
//!
//! ```rust
//! use protojson::{FieldDescriptor, FieldKind, JsonConverter, MessageDescriptor, Value};
//!
//! # fn main() -> anyhow::Result<()> {
//! let person = MessageDescriptor::new(
//!     "example.Person",
//!     vec![FieldDescriptor::new(1, "name", FieldKind::String)],
//! );
//!
//! let converter = JsonConverter::new();
//! let message = converter
//!     .from_json_str(&person, r#"{"name":"test","unknown_field":[1,2,3]}"#)?
//!     .expect("non-null message");
//!
//! // Unknown properties are skipped without error
//! assert_eq!(message.get(1), Some(&Value::String("test".into())));
//! # Ok(())
//! # }
//! ```

use anyhow::Context;
use std::io::BufRead;

pub mod convert;
pub mod descriptor;
pub mod error;
pub mod json;

// Re-export commonly used types for convenience
pub use convert::{
    read_message, write_message, DefaultHandling, ExtensionCatalog, FieldEntry, FieldPlan,
    JsonOptions, NamingPolicy,
};
pub use descriptor::{
    to_json_name, Cardinality, DescriptorError, DynamicMessage, EnumDescriptor,
    ExtensionDescriptor, FieldDescriptor, FieldKind, FileDescriptor, MapKey, MapKeyKind,
    MessageDescriptor, Value,
};
pub use error::ConvertError;
pub use json::{JsonReader, JsonWriter, TextWriter, TokenKind, ValueReader};

/// String-level entry points over the streaming converter
#[derive(Debug, Clone, Default)]
pub struct JsonConverter {
    options: JsonOptions,
}

impl JsonConverter {
    /// A converter with default options
    pub fn new() -> Self {
        JsonConverter::default()
    }

    pub fn with_options(options: JsonOptions) -> Self {
        JsonConverter { options }
    }

    pub fn options(&self) -> &JsonOptions {
        &self.options
    }

    /// Serialize a message to compact protobuf JSON
    pub fn to_json_string(&self, message: &DynamicMessage) -> Result<String, ConvertError> {
        let mut writer = TextWriter::new();
        write_message(&mut writer, Some(message), &self.options)?;
        Ok(writer.finish())
    }

    /// Parse a JSON document into a message of the given type.
    ///
    /// Returns `None` when the document is a bare JSON null.
    pub fn from_json_str(
        &self,
        descriptor: &MessageDescriptor,
        json: &str,
    ) -> Result<Option<DynamicMessage>, ConvertError> {
        let mut reader = ValueReader::from_str(json)?;
        read_message(&mut reader, descriptor, &self.options)
    }
}

/// Read a stream of newline-delimited JSON messages of one type
pub fn read_json_lines<R: BufRead>(
    reader: R,
    descriptor: &MessageDescriptor,
    options: &JsonOptions,
) -> anyhow::Result<Vec<DynamicMessage>> {
    let converter = JsonConverter::with_options(options.clone());
    let mut messages = Vec::new();

    for line in reader.lines() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        let message = converter
            .from_json_str(descriptor, &line)
            .context("Failed to convert JSON")?;
        if let Some(message) = message {
            messages.push(message);
        }
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_round_trip() {
        let person = MessageDescriptor::new(
            "lib.Person",
            vec![
                FieldDescriptor::new(1, "name", FieldKind::String),
                FieldDescriptor::new(2, "tags", FieldKind::String).repeated(),
            ],
        );
        let mut message = DynamicMessage::new(person.clone());
        message.set(1, Value::String("test".into()));
        message.set(
            2,
            Value::List(vec![Value::String("a".into()), Value::String("b".into())]),
        );

        let converter = JsonConverter::new();
        let json = converter.to_json_string(&message).unwrap();
        assert_eq!(json, r#"{"name":"test","tags":["a","b"]}"#);

        let parsed = converter.from_json_str(&person, &json).unwrap().unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_read_json_lines() {
        let person = MessageDescriptor::new(
            "lib.LinePerson",
            vec![FieldDescriptor::new(1, "name", FieldKind::String)],
        );
        let input = "{\"name\":\"a\"}\n\n{\"name\":\"b\"}\nnull\n";

        let messages =
            read_json_lines(input.as_bytes(), &person, &JsonOptions::default()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].get(1), Some(&Value::String("b".into())));
    }
}
