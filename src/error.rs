//! Error types for the translation pipeline

use crate::diagnostics::Diagnostics;
use thiserror::Error;

/// Translation errors
///
/// Every stage of the pipeline returns one of these instead of aborting. The
/// structured per-stage records travel next to the error in
/// [`Diagnostics`](crate::diagnostics::Diagnostics).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed SPIR-V binary or assembly text
    ///
    /// **Triggered by:** a binary with a bad header, a byte length that is not
    /// a multiple of four, a truncated instruction, assembly that does not
    /// parse
    #[error("Codec error: {message}")]
    Codec {
        /// Error description
        message: String,
    },

    /// Invalid or unsupported shader program
    ///
    /// **Triggered by:** WGSL syntax or type errors, undeclared identifiers,
    /// SPIR-V using a capability or extension outside the allowed feature set
    #[error("Parse error: {message}")]
    Parse {
        /// Error description
        message: String,
    },

    /// The module cannot be represented in the requested output format
    #[error("Emit error: {message}")]
    Emit {
        /// Error description
        message: String,
    },

    /// Input rejected before any stage ran
    ///
    /// **Triggered by:** non UTF-8 text, a null pointer with a non-zero length,
    /// an unknown conversion code
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Options could not be decoded
    #[error("Configuration error: {0}")]
    Config(String),

    /// No stage chain exists between the two formats
    #[error("Unsupported conversion: {from} to {to}")]
    UnsupportedConversion {
        /// Input format name
        from: String,
        /// Output format name
        to: String,
    },
}

/// Coarse error classification, stable across message changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// [`Error::Codec`]
    Codec,
    /// [`Error::Parse`]
    Parse,
    /// [`Error::Emit`]
    Emit,
    /// [`Error::InvalidInput`]
    InvalidInput,
    /// [`Error::Config`] and [`Error::UnsupportedConversion`]
    Config,
}

impl Error {
    /// Create a codec error with a message
    pub fn codec(msg: impl Into<String>) -> Self {
        Error::Codec {
            message: msg.into(),
        }
    }

    /// Create a parse error with a message
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse {
            message: msg.into(),
        }
    }

    /// Create an emit error with a message
    pub fn emit(msg: impl Into<String>) -> Self {
        Error::Emit {
            message: msg.into(),
        }
    }

    /// Create an invalid-input error with a message
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Codec { .. } => ErrorKind::Codec,
            Error::Parse { .. } => ErrorKind::Parse,
            Error::Emit { .. } => ErrorKind::Emit,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Config(_) | Error::UnsupportedConversion { .. } => ErrorKind::Config,
        }
    }

    /// Bare message without the kind prefix
    pub fn message(&self) -> String {
        match self {
            Error::Codec { message } | Error::Parse { message } | Error::Emit { message } => {
                message.clone()
            }
            Error::InvalidInput(message) | Error::Config(message) => message.clone(),
            Error::UnsupportedConversion { .. } => self.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, Error>;

/// A failed stage: the classified error plus the records that explain it
///
/// Codec, reader and emitter all fail with this shape so the pipeline can
/// carry their records forward unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    /// Classified error
    pub error: Error,
    /// Records from the wrapped library, in the order it reported them
    pub diagnostics: Diagnostics,
}

impl StageFailure {
    /// Pair an error with explicit records
    pub fn new(error: Error, diagnostics: Diagnostics) -> Self {
        Self { error, diagnostics }
    }
}

impl From<Error> for StageFailure {
    fn from(error: Error) -> Self {
        let diagnostics = Diagnostics::from(&error);
        Self { error, diagnostics }
    }
}

/// Result type for a single pipeline stage
pub type StageResult<T> = std::result::Result<T, StageFailure>;
