//! Error types
//!
//! Each layer has its own error enum; [`Error`] wraps them for callers that
//! drive the whole bridge.

use std::fmt;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug)]
pub enum Error {
    /// Link transport failure (fatal to that link's loops)
    Io(std::io::Error),
    /// Schema could not be loaded
    Schema(SchemaError),
    /// Payload could not be encoded or decoded
    Codec(CodecError),
    /// Frame could not be decoded
    Frame(FrameError),
    /// Hub is unavailable
    Hub(HubError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "Link I/O error: {}", e),
            Error::Schema(e) => write!(f, "Schema error: {}", e),
            Error::Codec(e) => write!(f, "Codec error: {}", e),
            Error::Frame(e) => write!(f, "Frame error: {}", e),
            Error::Hub(e) => write!(f, "Hub error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Schema(e) => Some(e),
            Error::Codec(e) => Some(e),
            Error::Frame(e) => Some(e),
            Error::Hub(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<SchemaError> for Error {
    fn from(e: SchemaError) -> Self {
        Error::Schema(e)
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Error::Frame(e)
    }
}

impl From<HubError> for Error {
    fn from(e: HubError) -> Self {
        Error::Hub(e)
    }
}

/// Errors raised while loading object definitions
#[derive(Debug)]
pub enum SchemaError {
    /// Field attributes are inconsistent
    InvalidField { definition: String, field: String, reason: String },
    /// Type name is not one of the wire types
    UnknownType(String),
    /// `clone_of` names a field that does not exist
    UnresolvedClone { definition: String, field: String, target: String },
    /// `clone_of` names a field that is itself a clone
    CloneChain { definition: String, field: String, target: String },
    /// Two definitions share a name
    DuplicateName(String),
    /// Two definitions share an object ID
    DuplicateObjectId(u32),
    /// Schema file could not be read
    Io(std::io::Error),
    /// Schema file is not valid JSON for a definition
    Parse(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::InvalidField {
                definition,
                field,
                reason,
            } => write!(f, "{}.{}: {}", definition, field, reason),
            SchemaError::UnknownType(name) => write!(f, "Unknown field type: {}", name),
            SchemaError::UnresolvedClone {
                definition,
                field,
                target,
            } => write!(
                f,
                "{}.{} clones unknown field {}",
                definition, field, target
            ),
            SchemaError::CloneChain {
                definition,
                field,
                target,
            } => write!(
                f,
                "{}.{} clones {} which is itself a clone",
                definition, field, target
            ),
            SchemaError::DuplicateName(name) => write!(f, "Duplicate definition name: {}", name),
            SchemaError::DuplicateObjectId(id) => write!(f, "Duplicate object ID: 0x{:08X}", id),
            SchemaError::Io(e) => write!(f, "{}", e),
            SchemaError::Parse(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SchemaError {}

impl From<std::io::Error> for SchemaError {
    fn from(e: std::io::Error) -> Self {
        SchemaError::Io(e)
    }
}

/// Errors raised by the payload codec
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Data map has no value for a field
    MissingField(String),
    /// Value variant cannot be written as the field's wire type
    TypeMismatch { field: String, expected: &'static str },
    /// Numeric value does not fit the field's wire type
    OutOfRange { field: String },
    /// Enum value is not one of the field's options
    UnknownOption { field: String, option: String },
    /// Array length differs from the field's element count
    ElementCount { field: String, expected: usize, actual: usize },
    /// Payload is shorter than the definition's byte length
    Truncated { expected: usize, actual: usize },
    /// Frame would not fit the length field limit
    FrameTooLarge { length: usize, max: usize },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::MissingField(field) => write!(f, "Missing value for field {}", field),
            CodecError::TypeMismatch { field, expected } => {
                write!(f, "Field {} expects {}", field, expected)
            }
            CodecError::OutOfRange { field } => write!(f, "Value out of range for field {}", field),
            CodecError::UnknownOption { field, option } => {
                write!(f, "Field {} has no option {:?}", field, option)
            }
            CodecError::ElementCount {
                field,
                expected,
                actual,
            } => write!(
                f,
                "Field {} expects {} elements, got {}",
                field, expected, actual
            ),
            CodecError::Truncated { expected, actual } => {
                write!(f, "Payload too short: need {} bytes, got {}", expected, actual)
            }
            CodecError::FrameTooLarge { length, max } => {
                write!(f, "Frame length {} exceeds limit of {}", length, max)
            }
        }
    }
}

impl std::error::Error for CodecError {}

/// Errors raised while decoding a complete frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Checksum mismatch; carries the raw candidate frame
    Corrupt(Vec<u8>),
    /// Object ID is not in the schema registry
    UnknownObjectId(u32),
    /// Command bits are not a known command
    UnknownCommand(u8),
    /// Length field disagrees with the schema
    LengthMismatch { object_id: u32, expected: usize, actual: usize },
    /// Frame is shorter than its header
    TooShort(usize),
    /// Payload failed to decode
    Codec(CodecError),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Corrupt(raw) => write!(f, "Checksum mismatch in {} byte frame", raw.len()),
            FrameError::UnknownObjectId(id) => write!(f, "Unknown object ID 0x{:08X}", id),
            FrameError::UnknownCommand(cmd) => write!(f, "Unknown command 0x{:02X}", cmd),
            FrameError::LengthMismatch {
                object_id,
                expected,
                actual,
            } => write!(
                f,
                "Object 0x{:08X}: frame length {} does not match expected {}",
                object_id, actual, expected
            ),
            FrameError::TooShort(len) => write!(f, "Frame too short: {} bytes", len),
            FrameError::Codec(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<CodecError> for FrameError {
    fn from(e: CodecError) -> Self {
        FrameError::Codec(e)
    }
}

/// Errors raised by the dispatch hub API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Hub task has stopped
    Closed,
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubError::Closed => write!(f, "Hub is closed"),
        }
    }
}

impl std::error::Error for HubError {}
