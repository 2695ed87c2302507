//! Per-kind value codecs and the registry that shares them
//!
//! A codec is a stateless read/write strategy for one value kind. Codecs
//! are shared by kind signature, not by field identity: every int64 field
//! uses the same codec instance, every `map<string, string>` field uses the
//! same map codec, and so on. Scalar translation follows the protobuf JSON
//! mapping: 64-bit integers as strings, bytes as base64, non-finite floats
//! as `"NaN"` / `"Infinity"` / `"-Infinity"`.

use crate::convert::options::JsonOptions;
use crate::convert::{reader, writer};
use crate::descriptor::schema::{
    EnumDescriptor, FieldDescriptor, FieldKind, MapKeyKind, MessageDescriptor,
};
use crate::descriptor::value::{MapKey, Value};
use crate::error::ConvertError;
use crate::json::{JsonReader, JsonWriter, TokenKind};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, Engine, GeneralPurpose, GeneralPurposeConfig};
use once_cell::sync::Lazy;
use serde_json::Number;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

/// Accept both padded and unpadded input on decode
const STANDARD_RELAXED: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const URL_SAFE_RELAXED: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug)]
pub(crate) enum Codec {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float,
    Double,
    String,
    Bytes,
    Enum {
        target: EnumDescriptor,
        as_integer: bool,
    },
    Message {
        descriptor: MessageDescriptor,
        options: JsonOptions,
    },
    Repeated(Arc<Codec>),
    Map {
        key: MapKeyKind,
        value: Arc<Codec>,
    },
}

static CODECS: Lazy<Mutex<HashMap<String, Arc<Codec>>>> = Lazy::new(Default::default);

fn memoized(signature: String, build: impl FnOnce() -> Codec) -> Arc<Codec> {
    if let Some(codec) = CODECS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&signature)
    {
        return codec.clone();
    }
    let built = Arc::new(build());
    CODECS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(signature)
        .or_insert(built)
        .clone()
}

fn kind_signature(kind: &FieldKind, options: &JsonOptions) -> String {
    match kind {
        FieldKind::Bool => "bool".to_string(),
        FieldKind::Int32 => "int32".to_string(),
        FieldKind::Int64 => "int64".to_string(),
        FieldKind::Uint32 => "uint32".to_string(),
        FieldKind::Uint64 => "uint64".to_string(),
        FieldKind::Float => "float".to_string(),
        FieldKind::Double => "double".to_string(),
        FieldKind::String => "string".to_string(),
        FieldKind::Bytes => "bytes".to_string(),
        FieldKind::Enum(e) => {
            format!("enum:{}#{}", e.full_name(), u8::from(options.enum_as_integer))
        }
        FieldKind::Message(m) => {
            format!("message:{}#{:016x}", m.full_name(), options.fingerprint())
        }
    }
}

/// Codec for a bare kind (an element or map-value position)
fn codec_for_kind(kind: &FieldKind, options: &JsonOptions) -> Arc<Codec> {
    let kind = kind.clone();
    let options = options.clone();
    memoized(kind_signature(&kind, &options), move || match kind {
        FieldKind::Bool => Codec::Bool,
        FieldKind::Int32 => Codec::Int32,
        FieldKind::Int64 => Codec::Int64,
        FieldKind::Uint32 => Codec::Uint32,
        FieldKind::Uint64 => Codec::Uint64,
        FieldKind::Float => Codec::Float,
        FieldKind::Double => Codec::Double,
        FieldKind::String => Codec::String,
        FieldKind::Bytes => Codec::Bytes,
        FieldKind::Enum(target) => Codec::Enum {
            target,
            as_integer: options.enum_as_integer,
        },
        FieldKind::Message(descriptor) => Codec::Message {
            descriptor,
            options,
        },
    })
}

/// Codec for a whole field, accounting for repeated and map shape
pub(crate) fn codec_for_field(field: &FieldDescriptor, options: &JsonOptions) -> Arc<Codec> {
    let inner_sig = kind_signature(field.kind(), options);
    if let Some(key) = field.map_key() {
        let value = codec_for_kind(field.kind(), options);
        memoized(format!("map<{key:?},{inner_sig}>"), move || Codec::Map {
            key,
            value,
        })
    } else if field.is_repeated() {
        let element = codec_for_kind(field.kind(), options);
        memoized(format!("repeated<{inner_sig}>"), move || {
            Codec::Repeated(element)
        })
    } else {
        codec_for_kind(field.kind(), options)
    }
}

impl Codec {
    pub(crate) fn read(&self, r: &mut dyn JsonReader) -> Result<Value, ConvertError> {
        match self {
            Codec::Bool => Ok(Value::Bool(r.read_bool()?)),
            Codec::Int32 => {
                let n = read_i64(r, "int32")?;
                let n = i32::try_from(n).map_err(|_| out_of_range("int32", n))?;
                Ok(Value::I32(n))
            }
            Codec::Int64 => Ok(Value::I64(read_i64(r, "int64")?)),
            Codec::Uint32 => {
                let n = read_u64(r, "uint32")?;
                let n = u32::try_from(n).map_err(|_| out_of_range("uint32", n))?;
                Ok(Value::U32(n))
            }
            Codec::Uint64 => Ok(Value::U64(read_u64(r, "uint64")?)),
            Codec::Float => Ok(Value::F32(read_f64(r, "float")? as f32)),
            Codec::Double => Ok(Value::F64(read_f64(r, "double")?)),
            Codec::String => Ok(Value::String(r.read_string()?)),
            Codec::Bytes => {
                let encoded = r.read_string()?;
                let bytes = STANDARD_RELAXED
                    .decode(&encoded)
                    .or_else(|_| URL_SAFE_RELAXED.decode(&encoded))
                    .map_err(|e| ConvertError::InvalidScalar {
                        kind: "bytes",
                        detail: e.to_string(),
                    })?;
                Ok(Value::Bytes(bytes))
            }
            Codec::Enum { target, .. } => match r.peek_kind() {
                TokenKind::String => {
                    let symbol = r.read_string()?;
                    match target.number_of(&symbol) {
                        Some(number) => Ok(Value::EnumNumber(number)),
                        None => Err(ConvertError::UnknownEnumValue {
                            enum_name: target.full_name().to_string(),
                            symbol,
                        }),
                    }
                }
                // Unknown numbers pass through for forward compatibility
                TokenKind::Number => {
                    let n = read_i64(r, "enum")?;
                    let n = i32::try_from(n).map_err(|_| out_of_range("enum", n))?;
                    Ok(Value::EnumNumber(n))
                }
                other => Err(ConvertError::UnexpectedToken {
                    expected: "string or number",
                    found: other,
                }),
            },
            Codec::Message {
                descriptor,
                options,
            } => match reader::read_message(r, descriptor, options)? {
                Some(message) => Ok(Value::Message(message)),
                None => Err(ConvertError::UnexpectedToken {
                    expected: "object",
                    found: TokenKind::Null,
                }),
            },
            Codec::Repeated(element) => {
                r.expect(TokenKind::ArrayStart)?;
                let mut items = Vec::new();
                while r.peek_kind() != TokenKind::ArrayEnd {
                    items.push(element.read(r)?);
                }
                r.expect(TokenKind::ArrayEnd)?;
                Ok(Value::List(items))
            }
            Codec::Map { key, value } => {
                r.expect(TokenKind::ObjectStart)?;
                let mut entries = BTreeMap::new();
                while r.peek_kind() != TokenKind::ObjectEnd {
                    let name = r.read_property_name()?;
                    let map_key = parse_map_key(*key, &name)?;
                    entries.insert(map_key, value.read(r)?);
                }
                r.expect(TokenKind::ObjectEnd)?;
                Ok(Value::Map(entries))
            }
        }
    }

    pub(crate) fn write(
        &self,
        w: &mut dyn JsonWriter,
        value: &Value,
    ) -> Result<(), ConvertError> {
        match (self, value) {
            (Codec::Bool, Value::Bool(b)) => {
                w.bool(*b);
                Ok(())
            }
            (Codec::Int32, Value::I32(n)) => {
                w.number(&Number::from(*n));
                Ok(())
            }
            (Codec::Uint32, Value::U32(n)) => {
                w.number(&Number::from(*n));
                Ok(())
            }
            // 64-bit integers are JSON strings by the protobuf JSON mapping
            (Codec::Int64, Value::I64(n)) => {
                w.string(&n.to_string());
                Ok(())
            }
            (Codec::Uint64, Value::U64(n)) => {
                w.string(&n.to_string());
                Ok(())
            }
            (Codec::Float, Value::F32(n)) => {
                write_f64(w, f64::from(*n));
                Ok(())
            }
            (Codec::Double, Value::F64(n)) => {
                write_f64(w, *n);
                Ok(())
            }
            (Codec::String, Value::String(s)) => {
                w.string(s);
                Ok(())
            }
            (Codec::Bytes, Value::Bytes(b)) => {
                w.string(&base64::engine::general_purpose::STANDARD.encode(b));
                Ok(())
            }
            (Codec::Enum { target, as_integer }, Value::EnumNumber(n)) => {
                if !as_integer {
                    if let Some(symbol) = target.name_of(*n) {
                        w.string(symbol);
                        return Ok(());
                    }
                }
                // Unknown numbers are emitted numerically even in symbol mode
                w.number(&Number::from(*n));
                Ok(())
            }
            (
                Codec::Message {
                    descriptor,
                    options,
                },
                Value::Message(message),
            ) => {
                if message.descriptor().full_name() != descriptor.full_name() {
                    return Err(ConvertError::ValueKind {
                        expected: "message",
                    });
                }
                writer::write_message(w, Some(message), options)
            }
            (Codec::Repeated(element), Value::List(items)) => {
                w.array_start();
                for item in items {
                    element.write(w, item)?;
                }
                w.array_end();
                Ok(())
            }
            (Codec::Map { key, value }, Value::Map(entries)) => {
                w.object_start();
                for (map_key, map_value) in entries {
                    if !key_matches(map_key, *key) {
                        return Err(ConvertError::ValueKind { expected: "map key" });
                    }
                    w.property_name(&map_key.to_string());
                    value.write(w, map_value)?;
                }
                w.object_end();
                Ok(())
            }
            _ => Err(ConvertError::ValueKind {
                expected: self.expected_name(),
            }),
        }
    }

    fn expected_name(&self) -> &'static str {
        match self {
            Codec::Bool => "bool",
            Codec::Int32 => "int32",
            Codec::Int64 => "int64",
            Codec::Uint32 => "uint32",
            Codec::Uint64 => "uint64",
            Codec::Float => "float",
            Codec::Double => "double",
            Codec::String => "string",
            Codec::Bytes => "bytes",
            Codec::Enum { .. } => "enum",
            Codec::Message { .. } => "message",
            Codec::Repeated(_) => "list",
            Codec::Map { .. } => "map",
        }
    }
}

fn out_of_range(kind: &'static str, value: impl std::fmt::Display) -> ConvertError {
    ConvertError::InvalidScalar {
        kind,
        detail: format!("{value} out of range"),
    }
}

/// Integer fields accept both JSON numbers and their string form
fn read_i64(r: &mut dyn JsonReader, kind: &'static str) -> Result<i64, ConvertError> {
    match r.peek_kind() {
        TokenKind::Number => {
            let n = r.read_number()?;
            n.as_i64().ok_or_else(|| ConvertError::InvalidScalar {
                kind,
                detail: format!("{n} is not an exact integer"),
            })
        }
        TokenKind::String => {
            let s = r.read_string()?;
            s.parse().map_err(|_| ConvertError::InvalidScalar {
                kind,
                detail: format!("cannot parse {s:?}"),
            })
        }
        other => Err(ConvertError::UnexpectedToken {
            expected: "number or string",
            found: other,
        }),
    }
}

fn read_u64(r: &mut dyn JsonReader, kind: &'static str) -> Result<u64, ConvertError> {
    match r.peek_kind() {
        TokenKind::Number => {
            let n = r.read_number()?;
            n.as_u64().ok_or_else(|| ConvertError::InvalidScalar {
                kind,
                detail: format!("{n} is not an exact unsigned integer"),
            })
        }
        TokenKind::String => {
            let s = r.read_string()?;
            s.parse().map_err(|_| ConvertError::InvalidScalar {
                kind,
                detail: format!("cannot parse {s:?}"),
            })
        }
        other => Err(ConvertError::UnexpectedToken {
            expected: "number or string",
            found: other,
        }),
    }
}

fn read_f64(r: &mut dyn JsonReader, kind: &'static str) -> Result<f64, ConvertError> {
    match r.peek_kind() {
        TokenKind::Number => {
            let n = r.read_number()?;
            n.as_f64().ok_or_else(|| ConvertError::InvalidScalar {
                kind,
                detail: format!("{n} is not representable"),
            })
        }
        TokenKind::String => {
            let s = r.read_string()?;
            match s.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                _ => s.parse().map_err(|_| ConvertError::InvalidScalar {
                    kind,
                    detail: format!("cannot parse {s:?}"),
                }),
            }
        }
        other => Err(ConvertError::UnexpectedToken {
            expected: "number or string",
            found: other,
        }),
    }
}

fn write_f64(w: &mut dyn JsonWriter, value: f64) {
    match Number::from_f64(value) {
        Some(n) => w.number(&n),
        None if value.is_nan() => w.string("NaN"),
        None if value > 0.0 => w.string("Infinity"),
        None => w.string("-Infinity"),
    }
}

fn parse_map_key(kind: MapKeyKind, name: &str) -> Result<MapKey, ConvertError> {
    let invalid = || ConvertError::InvalidScalar {
        kind: "map key",
        detail: format!("cannot parse {name:?}"),
    };
    match kind {
        MapKeyKind::Bool => match name {
            "true" => Ok(MapKey::Bool(true)),
            "false" => Ok(MapKey::Bool(false)),
            _ => Err(invalid()),
        },
        MapKeyKind::Int32 => name.parse().map(MapKey::I32).map_err(|_| invalid()),
        MapKeyKind::Int64 => name.parse().map(MapKey::I64).map_err(|_| invalid()),
        MapKeyKind::Uint32 => name.parse().map(MapKey::U32).map_err(|_| invalid()),
        MapKeyKind::Uint64 => name.parse().map(MapKey::U64).map_err(|_| invalid()),
        MapKeyKind::String => Ok(MapKey::String(name.to_string())),
    }
}

fn key_matches(key: &MapKey, kind: MapKeyKind) -> bool {
    matches!(
        (key, kind),
        (MapKey::Bool(_), MapKeyKind::Bool)
            | (MapKey::I32(_), MapKeyKind::Int32)
            | (MapKey::I64(_), MapKeyKind::Int64)
            | (MapKey::U32(_), MapKeyKind::Uint32)
            | (MapKey::U64(_), MapKeyKind::Uint64)
            | (MapKey::String(_), MapKeyKind::String)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::{TextWriter, ValueReader};
    use serde_json::json;

    fn write_one(codec: &Codec, value: &Value) -> String {
        let mut w = TextWriter::new();
        codec.write(&mut w, value).unwrap();
        w.finish()
    }

    fn read_one(codec: &Codec, json: serde_json::Value) -> Result<Value, ConvertError> {
        let mut r = ValueReader::new(json);
        codec.read(&mut r)
    }

    #[test]
    fn test_int64_as_string() {
        assert_eq!(
            write_one(&Codec::Int64, &Value::I64(9007199254740993)),
            r#""9007199254740993""#
        );
        assert_eq!(
            read_one(&Codec::Int64, json!("9007199254740993")).unwrap(),
            Value::I64(9007199254740993)
        );
        assert_eq!(
            read_one(&Codec::Int64, json!(-42)).unwrap(),
            Value::I64(-42)
        );
    }

    #[test]
    fn test_int32_range_check() {
        assert!(read_one(&Codec::Int32, json!(2147483648i64)).is_err());
        assert_eq!(
            read_one(&Codec::Int32, json!("-7")).unwrap(),
            Value::I32(-7)
        );
    }

    #[test]
    fn test_bytes_base64() {
        assert_eq!(
            write_one(&Codec::Bytes, &Value::Bytes(b"hello".to_vec())),
            r#""aGVsbG8=""#
        );
        assert_eq!(
            read_one(&Codec::Bytes, json!("aGVsbG8=")).unwrap(),
            Value::Bytes(b"hello".to_vec())
        );
        // Unpadded and URL-safe forms decode too
        assert_eq!(
            read_one(&Codec::Bytes, json!("aGVsbG8")).unwrap(),
            Value::Bytes(b"hello".to_vec())
        );
    }

    #[test]
    fn test_float_specials() {
        assert_eq!(write_one(&Codec::Double, &Value::F64(f64::NAN)), r#""NaN""#);
        assert_eq!(
            write_one(&Codec::Double, &Value::F64(f64::NEG_INFINITY)),
            r#""-Infinity""#
        );
        match read_one(&Codec::Double, json!("Infinity")).unwrap() {
            Value::F64(v) => assert!(v.is_infinite() && v > 0.0),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    fn color() -> EnumDescriptor {
        EnumDescriptor::new("test.Color", [(0, "COLOR_UNSPECIFIED"), (1, "RED")])
    }

    #[test]
    fn test_enum_symbols() {
        let codec = Codec::Enum {
            target: color(),
            as_integer: false,
        };
        assert_eq!(write_one(&codec, &Value::EnumNumber(1)), r#""RED""#);
        assert_eq!(
            read_one(&codec, json!("RED")).unwrap(),
            Value::EnumNumber(1)
        );
    }

    #[test]
    fn test_enum_unknown_symbol_is_error() {
        let codec = Codec::Enum {
            target: color(),
            as_integer: false,
        };
        let err = read_one(&codec, json!("GREEN")).unwrap_err();
        assert!(matches!(err, ConvertError::UnknownEnumValue { .. }));
    }

    #[test]
    fn test_enum_unknown_number_passes_through() {
        let codec = Codec::Enum {
            target: color(),
            as_integer: false,
        };
        assert_eq!(read_one(&codec, json!(9)).unwrap(), Value::EnumNumber(9));
        // An unknown number is emitted numerically even in symbol mode
        assert_eq!(write_one(&codec, &Value::EnumNumber(9)), "9");
    }

    #[test]
    fn test_repeated_strings() {
        let codec = Codec::Repeated(Arc::new(Codec::String));
        let value = Value::List(vec![
            Value::String("a".into()),
            Value::String("b".into()),
        ]);
        assert_eq!(write_one(&codec, &value), r#"["a","b"]"#);
        assert_eq!(read_one(&codec, json!(["a", "b"])).unwrap(), value);
    }

    #[test]
    fn test_map_int32_keys() {
        let codec = Codec::Map {
            key: MapKeyKind::Int32,
            value: Arc::new(Codec::String),
        };
        let mut entries = BTreeMap::new();
        entries.insert(MapKey::I32(2), Value::String("two".into()));
        entries.insert(MapKey::I32(10), Value::String("ten".into()));
        let value = Value::Map(entries);

        assert_eq!(write_one(&codec, &value), r#"{"2":"two","10":"ten"}"#);
        assert_eq!(
            read_one(&codec, json!({"2": "two", "10": "ten"})).unwrap(),
            value
        );
    }

    #[test]
    fn test_write_kind_mismatch_is_error() {
        let err = Codec::Int32
            .write(&mut TextWriter::new(), &Value::String("nope".into()))
            .unwrap_err();
        assert!(matches!(err, ConvertError::ValueKind { expected: "int32" }));
    }

    #[test]
    fn test_codecs_share_by_signature() {
        let options = JsonOptions::default();
        let a = FieldDescriptor::new(1, "first", FieldKind::Int64);
        let b = FieldDescriptor::new(2, "second", FieldKind::Int64);
        assert!(Arc::ptr_eq(
            &codec_for_field(&a, &options),
            &codec_for_field(&b, &options)
        ));
    }
}
