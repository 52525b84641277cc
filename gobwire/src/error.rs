//! Error types and helpers.
use {crate::types::TypeId, core::str::Utf8Error, thiserror::Error};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Encoded uint length prefix exceeds 8 bytes")]
    BadUint,
    #[error("Unexpected end of input: attempting to read {0} bytes")]
    UnexpectedEnd(usize),
    #[error("Field number {0} out of range")]
    FieldRange(u64),
    #[error("Type mismatch: local type {local} cannot decode remote type {remote}")]
    TypeMismatch { local: String, remote: String },
    #[error("Duplicate type received: {0}")]
    DuplicateType(TypeId),
    #[error("Unknown type id {0}")]
    UnknownTypeId(TypeId),
    #[error("Type not registered for interface: {0}")]
    UnregisteredInterfaceType(String),
    #[error("Value for {0} out of range")]
    Overflow(&'static str),
    #[error("Type {0} has no exported fields")]
    NoExportedFields(&'static str),
    #[error("Cannot encode nil pointer of type {0}")]
    NilPointer(&'static str),
    #[error("Array length mismatch: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: u64 },
    #[error(
        "Encoded sequence length exceeded preallocation limit of {limit} bytes (needed {needed} \
         bytes)"
    )]
    PreallocationSizeLimit { needed: u64, limit: usize },
    #[error("Message of {len} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge { len: u64, limit: usize },
    #[error(transparent)]
    InvalidUtf8Encoding(#[from] Utf8Error),
    #[error("Corrupted data: {0}")]
    Corrupt(&'static str),
    #[error("Conflicting interface registration for {0}")]
    DuplicateRegistration(String),
    #[error("Custom codec error: {0}")]
    Codec(String),
    #[error("End of stream")]
    Eof,
    #[error("Session poisoned by an earlier fatal error; call reset()")]
    Poisoned,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;

#[cold]
pub const fn bad_uint() -> Error {
    Error::BadUint
}

#[cold]
pub const fn unexpected_end(len: usize) -> Error {
    Error::UnexpectedEnd(len)
}

#[cold]
pub const fn field_range(field: u64) -> Error {
    Error::FieldRange(field)
}

#[cold]
pub fn type_mismatch(local: &str, remote: &str) -> Error {
    Error::TypeMismatch {
        local: local.to_owned(),
        remote: remote.to_owned(),
    }
}

#[cold]
pub const fn duplicate_type(id: TypeId) -> Error {
    Error::DuplicateType(id)
}

#[cold]
pub const fn unknown_type_id(id: TypeId) -> Error {
    Error::UnknownTypeId(id)
}

#[cold]
pub fn unregistered_interface_type(name: &str) -> Error {
    Error::UnregisteredInterfaceType(name.to_owned())
}

#[cold]
pub const fn overflow(field: &'static str) -> Error {
    Error::Overflow(field)
}

#[cold]
pub const fn no_exported_fields(ty: &'static str) -> Error {
    Error::NoExportedFields(ty)
}

#[cold]
pub const fn nil_pointer(ty: &'static str) -> Error {
    Error::NilPointer(ty)
}

#[cold]
pub const fn length_mismatch(expected: usize, found: u64) -> Error {
    Error::LengthMismatch { expected, found }
}

#[cold]
pub const fn preallocation_size_limit(needed: u64, limit: usize) -> Error {
    Error::PreallocationSizeLimit { needed, limit }
}

#[cold]
pub const fn message_too_large(len: u64, limit: usize) -> Error {
    Error::MessageTooLarge { len, limit }
}

#[cold]
pub const fn invalid_utf8_encoding(error: Utf8Error) -> Error {
    Error::InvalidUtf8Encoding(error)
}

#[cold]
pub const fn corrupt(what: &'static str) -> Error {
    Error::Corrupt(what)
}

#[cold]
pub fn duplicate_registration(name: &str) -> Error {
    Error::DuplicateRegistration(name.to_owned())
}

/// Build an error from inside a [`GobCodec`](crate::GobCodec) implementation.
#[cold]
pub fn codec(msg: impl core::fmt::Display) -> Error {
    Error::Codec(msg.to_string())
}
