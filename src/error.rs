use crate::descriptor::DescriptorError;
use crate::json::TokenKind;
use thiserror::Error;

/// Errors surfaced by message conversion.
///
/// Unknown properties and extension failures are not represented here: the
/// former are skipped by contract, the latter are isolated per extension
/// and never abort the surrounding message.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The token stream violated the expected JSON shape
    #[error("unexpected JSON token: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: TokenKind,
    },

    /// A recognized enum field carried a symbol the enum does not declare
    #[error("unknown value {symbol:?} for enum {enum_name}")]
    UnknownEnumValue { enum_name: String, symbol: String },

    /// A recognized scalar field carried a malformed value
    #[error("invalid {kind} value: {detail}")]
    InvalidScalar {
        kind: &'static str,
        detail: String,
    },

    /// A stored value does not match the field's declared type
    #[error("value does not match field type, expected {expected}")]
    ValueKind { expected: &'static str },

    /// Schema metadata was missing or inconsistent at plan-build time
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// The outer document failed to parse as JSON
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
