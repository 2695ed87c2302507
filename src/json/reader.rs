use crate::error::ConvertError;
use crate::json::token::{Token, TokenKind};
use serde_json::{Map, Number, Value};
use std::collections::VecDeque;

/// Streaming JSON reader consumed by the converter.
///
/// The converter only ever inspects the current token kind, advances past
/// structural tokens, reads scalar payloads, and skips values it does not
/// recognize. `skip_value` must consume a whole value (arbitrarily nested)
/// without failing, so unknown properties can be discarded losslessly.
pub trait JsonReader {
    /// Kind of the token under the cursor, `Eof` when exhausted
    fn peek_kind(&self) -> TokenKind;

    /// Consume a structural token of the given kind
    fn expect(&mut self, kind: TokenKind) -> Result<(), ConvertError>;

    fn read_property_name(&mut self) -> Result<String, ConvertError>;

    fn read_string(&mut self) -> Result<String, ConvertError>;

    fn read_number(&mut self) -> Result<Number, ConvertError>;

    fn read_bool(&mut self) -> Result<bool, ConvertError>;

    /// Consume the next full value, including any nested structure
    fn skip_value(&mut self) -> Result<(), ConvertError>;

    /// Consume the next full value and return it as a parsed tree.
    ///
    /// Used where a value must be decoded speculatively (extension fields):
    /// the stream stays synchronized even if decoding the captured value
    /// later fails.
    fn read_raw(&mut self) -> Result<Value, ConvertError>;
}

/// A `JsonReader` over a parsed `serde_json::Value` tree.
///
/// The tree is flattened into a token queue up front; the converter then
/// drives a plain cursor over it.
#[derive(Debug)]
pub struct ValueReader {
    tokens: VecDeque<Token>,
}

impl ValueReader {
    pub fn new(value: Value) -> Self {
        let mut tokens = VecDeque::new();
        flatten(value, &mut tokens);
        ValueReader { tokens }
    }

    /// Parse a JSON document and position the reader at its first token
    pub fn from_str(json: &str) -> Result<Self, ConvertError> {
        let value: Value = serde_json::from_str(json)?;
        Ok(ValueReader::new(value))
    }

    fn pop(&mut self, expected: &'static str) -> Result<Token, ConvertError> {
        self.tokens
            .pop_front()
            .ok_or(ConvertError::UnexpectedToken {
                expected,
                found: TokenKind::Eof,
            })
    }
}

impl JsonReader for ValueReader {
    fn peek_kind(&self) -> TokenKind {
        self.tokens.front().map_or(TokenKind::Eof, Token::kind)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ConvertError> {
        let found = self.peek_kind();
        if found == kind {
            self.tokens.pop_front();
            Ok(())
        } else {
            Err(ConvertError::UnexpectedToken {
                expected: kind.static_name(),
                found,
            })
        }
    }

    fn read_property_name(&mut self) -> Result<String, ConvertError> {
        match self.pop("property name")? {
            Token::PropertyName(name) => Ok(name),
            other => Err(ConvertError::UnexpectedToken {
                expected: "property name",
                found: other.kind(),
            }),
        }
    }

    fn read_string(&mut self) -> Result<String, ConvertError> {
        match self.pop("string")? {
            Token::String(s) => Ok(s),
            other => Err(ConvertError::UnexpectedToken {
                expected: "string",
                found: other.kind(),
            }),
        }
    }

    fn read_number(&mut self) -> Result<Number, ConvertError> {
        match self.pop("number")? {
            Token::Number(n) => Ok(n),
            other => Err(ConvertError::UnexpectedToken {
                expected: "number",
                found: other.kind(),
            }),
        }
    }

    fn read_bool(&mut self) -> Result<bool, ConvertError> {
        match self.pop("boolean")? {
            Token::Bool(b) => Ok(b),
            other => Err(ConvertError::UnexpectedToken {
                expected: "boolean",
                found: other.kind(),
            }),
        }
    }

    fn skip_value(&mut self) -> Result<(), ConvertError> {
        match self.pop("value")? {
            Token::ObjectStart | Token::ArrayStart => {
                let mut depth = 1usize;
                while depth > 0 {
                    match self.pop("value")? {
                        Token::ObjectStart | Token::ArrayStart => depth += 1,
                        Token::ObjectEnd | Token::ArrayEnd => depth -= 1,
                        _ => {}
                    }
                }
                Ok(())
            }
            other @ (Token::ObjectEnd | Token::ArrayEnd) => Err(ConvertError::UnexpectedToken {
                expected: "value",
                found: other.kind(),
            }),
            _ => Ok(()),
        }
    }

    fn read_raw(&mut self) -> Result<Value, ConvertError> {
        rebuild(self)
    }
}

fn flatten(value: Value, out: &mut VecDeque<Token>) {
    match value {
        Value::Null => out.push_back(Token::Null),
        Value::Bool(b) => out.push_back(Token::Bool(b)),
        Value::Number(n) => out.push_back(Token::Number(n)),
        Value::String(s) => out.push_back(Token::String(s)),
        Value::Array(items) => {
            out.push_back(Token::ArrayStart);
            for item in items {
                flatten(item, out);
            }
            out.push_back(Token::ArrayEnd);
        }
        Value::Object(map) => {
            out.push_back(Token::ObjectStart);
            for (key, item) in map {
                out.push_back(Token::PropertyName(key));
                flatten(item, out);
            }
            out.push_back(Token::ObjectEnd);
        }
    }
}

/// Inverse of `flatten`: consume one full value off the reader
fn rebuild(reader: &mut ValueReader) -> Result<Value, ConvertError> {
    match reader.pop("value")? {
        Token::Null => Ok(Value::Null),
        Token::Bool(b) => Ok(Value::Bool(b)),
        Token::Number(n) => Ok(Value::Number(n)),
        Token::String(s) => Ok(Value::String(s)),
        Token::ArrayStart => {
            let mut items = Vec::new();
            while reader.peek_kind() != TokenKind::ArrayEnd {
                items.push(rebuild(reader)?);
            }
            reader.expect(TokenKind::ArrayEnd)?;
            Ok(Value::Array(items))
        }
        Token::ObjectStart => {
            let mut map = Map::new();
            while reader.peek_kind() != TokenKind::ObjectEnd {
                let name = reader.read_property_name()?;
                map.insert(name, rebuild(reader)?);
            }
            reader.expect(TokenKind::ObjectEnd)?;
            Ok(Value::Object(map))
        }
        other => Err(ConvertError::UnexpectedToken {
            expected: "value",
            found: other.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tokenize_object() {
        let mut reader = ValueReader::new(json!({"a": 1, "b": [true, null]}));

        assert_eq!(reader.peek_kind(), TokenKind::ObjectStart);
        reader.expect(TokenKind::ObjectStart).unwrap();
        assert_eq!(reader.read_property_name().unwrap(), "a");
        assert_eq!(reader.read_number().unwrap().as_i64(), Some(1));
        assert_eq!(reader.read_property_name().unwrap(), "b");
        reader.expect(TokenKind::ArrayStart).unwrap();
        assert!(reader.read_bool().unwrap());
        reader.expect(TokenKind::Null).unwrap();
        reader.expect(TokenKind::ArrayEnd).unwrap();
        reader.expect(TokenKind::ObjectEnd).unwrap();
        assert_eq!(reader.peek_kind(), TokenKind::Eof);
    }

    #[test]
    fn test_skip_nested_value() {
        let mut reader = ValueReader::new(json!({"skip": {"deep": [1, {"x": 2}]}, "keep": 3}));

        reader.expect(TokenKind::ObjectStart).unwrap();
        assert_eq!(reader.read_property_name().unwrap(), "keep");
        // serde_json orders object keys; "keep" sorts before "skip"
        assert_eq!(reader.read_number().unwrap().as_i64(), Some(3));
        assert_eq!(reader.read_property_name().unwrap(), "skip");
        reader.skip_value().unwrap();
        reader.expect(TokenKind::ObjectEnd).unwrap();
    }

    #[test]
    fn test_read_raw_round_trips() {
        let value = json!({"a": [1, 2], "b": {"c": "x"}});
        let mut reader = ValueReader::new(value.clone());
        assert_eq!(reader.read_raw().unwrap(), value);
        assert_eq!(reader.peek_kind(), TokenKind::Eof);
    }

    #[test]
    fn test_expect_mismatch_is_error() {
        let mut reader = ValueReader::new(json!([1]));
        let err = reader.expect(TokenKind::ObjectStart).unwrap_err();
        assert!(err.to_string().contains("object start"));
    }
}
