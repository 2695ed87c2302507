//! Message read path: JSON token stream into a dynamic message

use crate::convert::extension::ExtensionCatalog;
use crate::convert::options::JsonOptions;
use crate::convert::plan::FieldPlan;
use crate::descriptor::message::DynamicMessage;
use crate::descriptor::schema::MessageDescriptor;
use crate::error::ConvertError;
use crate::json::{JsonReader, TokenKind};

/// Read one message value off the stream.
///
/// A JSON null yields `None` (no instance constructed). Properties that
/// resolve in the plan are decoded by their codec; bracketed properties are
/// dispatched to the extension catalog; anything else is skipped without
/// error. Structural violations abort with the expected and actual token
/// kinds.
pub fn read_message(
    r: &mut dyn JsonReader,
    descriptor: &MessageDescriptor,
    options: &JsonOptions,
) -> Result<Option<DynamicMessage>, ConvertError> {
    match r.peek_kind() {
        TokenKind::Null => {
            r.expect(TokenKind::Null)?;
            Ok(None)
        }
        TokenKind::ObjectStart => {
            r.expect(TokenKind::ObjectStart)?;
            let plan = FieldPlan::cached(descriptor, options)?;
            let catalog = ExtensionCatalog::cached(descriptor, options);
            let mut message = DynamicMessage::new(descriptor.clone());

            loop {
                match r.peek_kind() {
                    TokenKind::ObjectEnd => {
                        r.expect(TokenKind::ObjectEnd)?;
                        return Ok(Some(message));
                    }
                    TokenKind::PropertyName => {
                        let name = r.read_property_name()?;
                        if let Some(inner) = bracketed(&name) {
                            catalog.read_value(r, inner, &mut message)?;
                        } else if let Some(entry) = plan.entry_for(&name) {
                            // An explicit null leaves the field absent
                            if r.peek_kind() == TokenKind::Null {
                                r.expect(TokenKind::Null)?;
                                continue;
                            }
                            let value = entry.codec.read(r)?;
                            message.set(entry.number(), value);
                        } else {
                            r.skip_value()?;
                        }
                    }
                    other => {
                        return Err(ConvertError::UnexpectedToken {
                            expected: "property name or object end",
                            found: other,
                        })
                    }
                }
            }
        }
        other => Err(ConvertError::UnexpectedToken {
            expected: "object or null",
            found: other,
        }),
    }
}

fn bracketed(name: &str) -> Option<&str> {
    name.strip_prefix('[')?.strip_suffix(']')
}
