use serde_json::Number;

/// The kind of the token currently under the reader's cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    PropertyName,
    String,
    Number,
    Bool,
    Null,
    /// No more tokens in the stream
    Eof,
}

impl TokenKind {
    pub(crate) fn static_name(self) -> &'static str {
        match self {
            TokenKind::ObjectStart => "object start",
            TokenKind::ObjectEnd => "object end",
            TokenKind::ArrayStart => "array start",
            TokenKind::ArrayEnd => "array end",
            TokenKind::PropertyName => "property name",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Bool => "boolean",
            TokenKind::Null => "null",
            TokenKind::Eof => "end of input",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.static_name())
    }
}

/// A single JSON token with its payload
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    ObjectStart,
    ObjectEnd,
    ArrayStart,
    ArrayEnd,
    PropertyName(String),
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::ObjectStart => TokenKind::ObjectStart,
            Token::ObjectEnd => TokenKind::ObjectEnd,
            Token::ArrayStart => TokenKind::ArrayStart,
            Token::ArrayEnd => TokenKind::ArrayEnd,
            Token::PropertyName(_) => TokenKind::PropertyName,
            Token::String(_) => TokenKind::String,
            Token::Number(_) => TokenKind::Number,
            Token::Bool(_) => TokenKind::Bool,
            Token::Null => TokenKind::Null,
        }
    }
}
