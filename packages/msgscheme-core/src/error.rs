//! Codec, text parsing and conversion error types.

use thiserror::Error;

pub use crate::scheme::LayoutError;

/// Pack/unpack errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Value does not fit the field's type or capacity
    #[error("Field '{field}': value {value} does not fit {target}")]
    Overflow {
        field: String,
        value: String,
        target: String,
    },

    /// Buffer is shorter than the message header or a referenced region
    #[error("Buffer truncated at '{field}': need {need} bytes, have {have}")]
    Truncated {
        field: String,
        need: usize,
        have: usize,
    },

    /// Wire data is structurally invalid
    #[error("Malformed data in '{field}': {reason}")]
    Malformed { field: String, reason: String },

    /// Value variant can not be stored in the field
    #[error("Type mismatch for '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: String,
        got: String,
    },

    /// Record refers to a field the message does not have
    #[error("Unknown field '{field}' in message '{message}'")]
    UnknownField { message: String, field: String },

    /// Enum entry, bits entry or union member name is not declared
    #[error("Field '{field}': unknown name '{name}'")]
    UnknownName { field: String, name: String },
}

/// Text parsing errors for `from_string`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid syntax '{input}': {reason}")]
    Syntax { input: String, reason: String },

    #[error("Value '{input}' out of range for {target}")]
    Overflow { input: String, target: String },

    #[error("Unknown name '{name}' in '{input}'")]
    UnknownName { input: String, name: String },

    #[error("Text parsing is not supported for {kind} field '{field}'")]
    Unsupported { field: String, kind: String },
}

impl ParseError {
    pub(crate) fn syntax(input: &str, reason: impl Into<String>) -> Self {
        ParseError::Syntax {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(input: &str, target: impl Into<String>) -> Self {
        ParseError::Overflow {
            input: input.to_string(),
            target: target.into(),
        }
    }
}

/// Scheme-to-scheme conversion errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// Message or union member has no counterpart in the destination scheme
    #[error("No destination for {what} '{name}'")]
    Unmatched { what: &'static str, name: String },

    /// Field kinds can not be converted into each other
    #[error("Field '{field}': can not convert {from} to {to}")]
    IncompatibleKind {
        field: String,
        from: String,
        to: String,
    },

    /// Value does not fit the destination range or precision
    #[error("Field '{field}': value {value} does not fit destination {target}")]
    Overflow {
        field: String,
        value: String,
        target: String,
    },

    /// Enum name missing in destination and no fallback declared
    #[error("Field '{field}': enum value '{name}' has no destination and no fallback")]
    EnumFallbackMissing { field: String, name: String },

    /// Text rendering or parsing failed while converting to or from strings
    #[error("Field '{field}': {source}")]
    Parse {
        field: String,
        #[source]
        source: ParseError,
    },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}
