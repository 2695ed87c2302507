//! Message write path: a dynamic message onto the JSON token stream

use crate::convert::extension::ExtensionCatalog;
use crate::convert::options::{DefaultHandling, JsonOptions};
use crate::convert::plan::FieldPlan;
use crate::descriptor::message::DynamicMessage;
use crate::error::ConvertError;
use crate::json::JsonWriter;

/// Write one message value to the stream.
///
/// Output is a single deterministic pass over the plan's entries in schema
/// declaration order, so the same type always emits fields in the same
/// order. A `None` message emits JSON null. Extension properties follow the
/// declared fields.
pub fn write_message(
    w: &mut dyn JsonWriter,
    message: Option<&DynamicMessage>,
    options: &JsonOptions,
) -> Result<(), ConvertError> {
    let Some(message) = message else {
        w.null();
        return Ok(());
    };

    let plan = FieldPlan::cached(message.descriptor(), options)?;
    let catalog = ExtensionCatalog::cached(message.descriptor(), options);

    w.object_start();
    for entry in plan.entries() {
        // Only the selected member of a oneof group is ever emitted
        if let Some(group) = entry.oneof() {
            if message.oneof_selected(group) != Some(entry.number()) {
                continue;
            }
        }

        match message.get(entry.number()) {
            Some(value) => {
                let emit = match plan.default_handling() {
                    DefaultHandling::Never | DefaultHandling::WhenWritingNull => true,
                    DefaultHandling::WhenWritingDefault => {
                        entry.oneof().is_some()
                            || entry.explicit_presence()
                            || !value.is_default()
                    }
                };
                if emit {
                    w.property_name(entry.json_name());
                    entry.codec.write(w, value)?;
                }
            }
            None => {
                if plan.default_handling() == DefaultHandling::Never {
                    w.property_name(entry.json_name());
                    if entry.is_map() {
                        w.object_start();
                        w.object_end();
                    } else if entry.is_repeated() {
                        w.array_start();
                        w.array_end();
                    } else {
                        w.null();
                    }
                }
            }
        }
    }
    catalog.write_all(w, message);
    w.object_end();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::schema::{FieldDescriptor, FieldKind, MessageDescriptor};
    use crate::descriptor::value::Value;
    use crate::json::TextWriter;

    fn write(message: &DynamicMessage, options: &JsonOptions) -> String {
        let mut w = TextWriter::new();
        write_message(&mut w, Some(message), options).unwrap();
        w.finish()
    }

    fn person() -> MessageDescriptor {
        MessageDescriptor::new(
            "test.write.Person",
            vec![
                FieldDescriptor::new(1, "name", FieldKind::String),
                FieldDescriptor::new(2, "age", FieldKind::Int32),
                FieldDescriptor::new(3, "tags", FieldKind::String).repeated(),
            ],
        )
    }

    #[test]
    fn test_field_order_is_declaration_order() {
        let mut msg = DynamicMessage::new(person());
        // Assignment order is deliberately reversed
        msg.set(3, Value::List(vec![Value::String("a".into())]));
        msg.set(2, Value::I32(30));
        msg.set(1, Value::String("test".into()));

        assert_eq!(
            write(&msg, &JsonOptions::default()),
            r#"{"name":"test","age":30,"tags":["a"]}"#
        );
    }

    #[test]
    fn test_null_message_writes_null() {
        let mut w = TextWriter::new();
        write_message(&mut w, None, &JsonOptions::default()).unwrap();
        assert_eq!(w.finish(), "null");
    }

    #[test]
    fn test_never_omit_emits_null_and_empty_containers() {
        let msg = DynamicMessage::new(person());
        let options = JsonOptions {
            default_handling: DefaultHandling::Never,
            ..JsonOptions::default()
        };
        assert_eq!(
            write(&msg, &options),
            r#"{"name":null,"age":null,"tags":[]}"#
        );
    }

    #[test]
    fn test_omit_default_drops_absent_and_default_values() {
        let mut msg = DynamicMessage::new(person());
        msg.set(1, Value::String(String::new()));
        msg.set(2, Value::I32(7));

        // name holds its default and has implicit presence, so it is dropped
        assert_eq!(write(&msg, &JsonOptions::default()), r#"{"age":7}"#);
    }

    #[test]
    fn test_optional_field_emits_explicit_default() {
        let desc = MessageDescriptor::new(
            "test.write.WithOptional",
            vec![FieldDescriptor::new(1, "count", FieldKind::Int32).optional()],
        );
        let mut msg = DynamicMessage::new(desc);
        msg.set(1, Value::I32(0));

        // Explicit presence wins over the omit-defaults policy
        assert_eq!(write(&msg, &JsonOptions::default()), r#"{"count":0}"#);
    }

    #[test]
    fn test_only_selected_oneof_member_is_written() {
        let desc = MessageDescriptor::with_oneofs(
            "test.write.Choice",
            vec![
                FieldDescriptor::new(1, "text", FieldKind::String).with_oneof(0),
                FieldDescriptor::new(2, "number", FieldKind::Int32).with_oneof(0),
            ],
            vec!["value".to_string()],
        );
        let mut msg = DynamicMessage::new(desc);
        msg.set(1, Value::String("chosen".into()));
        // Bypass the oneof contract; the case still points at field 1
        msg.set_unchecked(2, Value::I32(5));

        assert_eq!(write(&msg, &JsonOptions::default()), r#"{"text":"chosen"}"#);
    }
}
