//! Error types for the value tree, the exchange protocol, and the parser.

/// Result type alias for value access and exchange operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by value access, exchange conversion, and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The active kind is not an object
    #[error("expected object")]
    ExpectedObject,

    /// The active kind is not an array
    #[error("expected array")]
    ExpectedArray,

    /// The active kind is not a string
    #[error("expected string")]
    ExpectedString,

    /// The active kind is not a boolean
    #[error("expected bool")]
    ExpectedBool,

    /// The active kind is not a number
    #[error("expected number")]
    ExpectedNumber,

    /// A signed integer was requested but the value cannot provide one
    #[error("expected signed integer")]
    ExpectedSigned,

    /// An unsigned integer was requested but the value cannot provide one
    #[error("expected unsigned integer")]
    ExpectedUnsigned,

    /// A number was present but does not fit the requested integer width
    #[error("integer out of range")]
    IntegerOverflow,

    /// The storage provider could not satisfy an allocation
    #[error("storage allocation failed")]
    OutOfMemory,
}

/// Errors produced while parsing a JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The input violates the JSON grammar
    #[error("syntax error at byte {offset}")]
    Syntax {
        /// Offset into the logical byte stream where the error was detected
        offset: usize,
    },

    /// Unexpected extra data after a complete document
    #[error("extra data after complete document")]
    ExtraData,

    /// A number's mantissa overflowed 64 bits
    #[error("mantissa overflow while parsing number")]
    MantissaOverflow,

    /// A number's exponent is outside the supported range
    #[error("exponent overflow while parsing number")]
    ExponentOverflow,

    /// Object/array nesting exceeded the configured depth limit
    #[error("maximum structure depth exceeded")]
    TooDeep,

    /// The storage provider could not satisfy an allocation
    #[error("storage allocation failed")]
    OutOfMemory,
}

impl From<Error> for ParseError {
    fn from(_: Error) -> Self {
        // The only fallible container operations reachable from the
        // tree builder are allocating ones.
        ParseError::OutOfMemory
    }
}
