use crate::descriptor::message::DynamicMessage;
use crate::descriptor::schema::{FieldDescriptor, FieldKind};
use std::collections::BTreeMap;
use std::fmt;

/// A single protobuf field value held by a dynamic message
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    /// An enum value by number; unknown numbers are representable for
    /// forward compatibility
    EnumNumber(i32),
    Message(DynamicMessage),
    List(Vec<Value>),
    Map(BTreeMap<MapKey, Value>),
}

/// A protobuf map key. Ordered so map emission is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

impl Value {
    /// The default value for a field of the given kind
    pub fn default_for(kind: &FieldKind) -> Value {
        match kind {
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Int32 => Value::I32(0),
            FieldKind::Int64 => Value::I64(0),
            FieldKind::Uint32 => Value::U32(0),
            FieldKind::Uint64 => Value::U64(0),
            FieldKind::Float => Value::F32(0.0),
            FieldKind::Double => Value::F64(0.0),
            FieldKind::String => Value::String(String::new()),
            FieldKind::Bytes => Value::Bytes(Vec::new()),
            FieldKind::Enum(_) => Value::EnumNumber(0),
            FieldKind::Message(descriptor) => {
                Value::Message(DynamicMessage::new(descriptor.clone()))
            }
        }
    }

    /// The default for a whole field, accounting for repeated and map shape
    pub fn default_for_field(field: &FieldDescriptor) -> Value {
        if field.is_map() {
            Value::Map(BTreeMap::new())
        } else if field.is_repeated() {
            Value::List(Vec::new())
        } else {
            Value::default_for(field.kind())
        }
    }

    /// Whether this is the protobuf default for its own shape.
    ///
    /// Messages are never default: their presence is explicit.
    pub fn is_default(&self) -> bool {
        match self {
            Value::Bool(b) => !b,
            Value::I32(n) => *n == 0,
            Value::I64(n) => *n == 0,
            Value::U32(n) => *n == 0,
            Value::U64(n) => *n == 0,
            Value::F32(n) => *n == 0.0,
            Value::F64(n) => *n == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::EnumNumber(n) => *n == 0,
            Value::Message(_) => false,
            Value::List(items) => items.is_empty(),
            Value::Map(entries) => entries.is_empty(),
        }
    }

    /// Short kind label for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I32(_) => "int32",
            Value::I64(_) => "int64",
            Value::U32(_) => "uint32",
            Value::U64(_) => "uint64",
            Value::F32(_) => "float",
            Value::F64(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::EnumNumber(_) => "enum",
            Value::Message(_) => "message",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

impl fmt::Display for MapKey {
    /// Renders the key the way protobuf JSON does: always as the content of
    /// a JSON string
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{b}"),
            MapKey::I32(n) => write!(f, "{n}"),
            MapKey::I64(n) => write!(f, "{n}"),
            MapKey::U32(n) => write!(f, "{n}"),
            MapKey::U64(n) => write!(f, "{n}"),
            MapKey::String(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::schema::MapKeyKind;

    #[test]
    fn test_scalar_defaults() {
        assert!(Value::Bool(false).is_default());
        assert!(Value::I64(0).is_default());
        assert!(Value::String(String::new()).is_default());
        assert!(!Value::I32(7).is_default());
        assert!(!Value::String("x".into()).is_default());
    }

    #[test]
    fn test_message_is_never_default() {
        let desc = crate::descriptor::schema::MessageDescriptor::new("test.Empty", vec![]);
        assert!(!Value::Message(DynamicMessage::new(desc)).is_default());
    }

    #[test]
    fn test_field_shape_defaults() {
        let repeated =
            FieldDescriptor::new(1, "tags", FieldKind::String).repeated();
        assert_eq!(Value::default_for_field(&repeated), Value::List(vec![]));

        let map = FieldDescriptor::map(2, "labels", MapKeyKind::String, FieldKind::String);
        assert_eq!(Value::default_for_field(&map), Value::Map(BTreeMap::new()));
    }

    #[test]
    fn test_map_key_display() {
        assert_eq!(MapKey::Bool(true).to_string(), "true");
        assert_eq!(MapKey::I64(-5).to_string(), "-5");
        assert_eq!(MapKey::String("k".into()).to_string(), "k");
    }
}
