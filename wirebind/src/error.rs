//! Error types and helpers.
use {
    crate::{binding::Relation, io},
    core::fmt,
    thiserror::Error,
};

/// Boxed error produced by a custom [`Codec`](crate::codec::Codec).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    UnknownSubtype(#[from] UnknownSubtypeError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Stream ended while reading `{field}` (needed {needed} bytes)")]
    TruncatedStream { field: &'static str, needed: usize },
    #[error("Frame mismatch at `{field}`: expected {expected} {unit}, found {actual}")]
    FrameOverrun {
        field: &'static str,
        unit: FrameUnit,
        expected: usize,
        actual: usize,
    },
    #[error("Value {value} for `{field}` does not fit its bound integer")]
    BindingOverflow { field: &'static str, value: i128 },
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    #[error(
        "Encoded sequence length exceeded preallocation limit of {limit} bytes (needed {needed} \
         bytes)"
    )]
    PreallocationSizeLimit { needed: usize, limit: usize },
    #[error("Nesting depth exceeded the configured limit of {0}")]
    DepthLimit(usize),
    #[error(transparent)]
    Write(#[from] io::WriteError),
    #[error("Failed reading `{field}`: {source}")]
    Read {
        field: &'static str,
        #[source]
        source: io::ReadError,
    },
    #[error("Value handed to the engine is not a `{0}`")]
    TypeMismatch(&'static str),
}

/// Unit of a [`Error::FrameOverrun`] measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUnit {
    Bytes,
    Elements,
}

impl fmt::Display for FrameUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameUnit::Bytes => f.write_str("bytes"),
            FrameUnit::Elements => f.write_str("elements"),
        }
    }
}

/// Malformed layout declarations. Always raised while building a schema, before any I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{type_name}: order index {order} is used by more than one field")]
    DuplicateOrder { type_name: &'static str, order: u16 },
    #[error("{type_name}.{field}: binding refers to a field of another schema")]
    ForeignField {
        type_name: &'static str,
        field: &'static str,
    },
    #[error("{type_name}.{field}: bound field `{target}` must be declared before it")]
    ForwardBinding {
        type_name: &'static str,
        field: &'static str,
        target: &'static str,
    },
    #[error("{type_name}.{field}: bound field `{target}` is not an integer")]
    BindingTargetNotInteger {
        type_name: &'static str,
        field: &'static str,
        target: &'static str,
    },
    #[error("{type_name}.{field}: more than one {relation} binding")]
    DuplicateBinding {
        type_name: &'static str,
        field: &'static str,
        relation: Relation,
    },
    #[error("{type_name}.{target}: bound by more than one field")]
    SharedBinding {
        type_name: &'static str,
        target: &'static str,
    },
    #[error("{type_name}.{field}: {relation} binding is not supported by this field")]
    UnsupportedBinding {
        type_name: &'static str,
        field: &'static str,
        relation: Relation,
    },
    #[error("{type_name}.{field}: requires a {relation} binding")]
    MissingBinding {
        type_name: &'static str,
        field: &'static str,
        relation: Relation,
    },
    #[error("{type_name}.{field}: subtype field declares no subtype map")]
    MissingSubtypeMap {
        type_name: &'static str,
        field: &'static str,
    },
    #[error("{type_name}.{field}: variant `{variant}` has no layout and the field has no codec")]
    OpaqueVariant {
        type_name: &'static str,
        field: &'static str,
        variant: &'static str,
    },
    #[error("{type_name}.{field}: fixed width must be non-zero")]
    InvalidWidth {
        type_name: &'static str,
        field: &'static str,
    },
    #[error("Composition cycle: {chain}")]
    CompositionCycle { chain: String },
    #[error("Subtype map `{registry}`: key {key} registered twice")]
    DuplicateSubtypeKey { registry: &'static str, key: i128 },
    #[error("Subtype map `{registry}`: type `{type_name}` registered twice")]
    DuplicateSubtypeType {
        registry: &'static str,
        type_name: &'static str,
    },
}

/// Discriminator or runtime type absent from a subtype map.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnknownSubtypeError {
    #[error("`{field}`: type `{type_name}` has no discriminator")]
    ForSerialize {
        field: &'static str,
        type_name: &'static str,
    },
    #[error("`{field}`: discriminator {key} is not registered")]
    ForDeserialize { field: &'static str, key: i128 },
}

impl UnknownSubtypeError {
    /// Attribute the failed lookup to `field`.
    pub(crate) fn at(self, field: &'static str) -> Self {
        match self {
            UnknownSubtypeError::ForSerialize { type_name, .. } => {
                UnknownSubtypeError::ForSerialize { field, type_name }
            }
            UnknownSubtypeError::ForDeserialize { key, .. } => {
                UnknownSubtypeError::ForDeserialize { field, key }
            }
        }
    }
}

/// Failure raised by a custom codec, tagged with the field it was encoding.
#[derive(Error, Debug)]
#[error("Codec for `{field}` failed: {source}")]
pub struct CodecError {
    pub field: &'static str,
    #[source]
    pub source: BoxError,
}

pub type Result<T> = core::result::Result<T, Error>;

#[cold]
pub const fn truncated_stream(field: &'static str, needed: usize) -> Error {
    Error::TruncatedStream { field, needed }
}

#[cold]
pub const fn frame_overrun(
    field: &'static str,
    unit: FrameUnit,
    expected: usize,
    actual: usize,
) -> Error {
    Error::FrameOverrun {
        field,
        unit,
        expected,
        actual,
    }
}

#[cold]
pub const fn binding_overflow(field: &'static str, value: i128) -> Error {
    Error::BindingOverflow { field, value }
}

#[cold]
pub const fn invalid_value(field: &'static str, reason: &'static str) -> Error {
    Error::InvalidValue { field, reason }
}

#[cold]
pub const fn preallocation_size_limit(needed: usize, limit: usize) -> Error {
    Error::PreallocationSizeLimit { needed, limit }
}

#[cold]
pub const fn type_mismatch(expected: &'static str) -> Error {
    Error::TypeMismatch(expected)
}

#[cold]
pub fn codec_error(field: &'static str, source: impl Into<BoxError>) -> Error {
    Error::Codec(CodecError {
        field,
        source: source.into(),
    })
}

/// Attribute a stream read failure to `field`.
///
/// An exhausted source is a truncated stream; an exhausted [`Frame`](io::Frame) means the
/// decoder ran past the length its binding declared.
#[cold]
pub fn read_error(field: &'static str, error: io::ReadError) -> Error {
    match error {
        io::ReadError::ReadSizeLimit(needed) => truncated_stream(field, needed),
        io::ReadError::FrameBoundary { needed, remaining } => Error::FrameOverrun {
            field,
            unit: FrameUnit::Bytes,
            expected: remaining,
            actual: needed,
        },
        source => Error::Read { field, source },
    }
}
