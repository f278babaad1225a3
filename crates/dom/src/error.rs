/// Error is the failure surface of the document model: typed accessors
/// invoked against a value of the wrong kind, and container mutations
/// which would exceed a fixed size limit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("value is not a null")]
    NotNull,
    #[error("value is not a bool")]
    NotBool,
    #[error("value is not an int64")]
    NotInt64,
    #[error("value is not a uint64")]
    NotUint64,
    #[error("value is not a double")]
    NotDouble,
    #[error("value is not a string")]
    NotString,
    #[error("value is not an array")]
    NotArray,
    #[error("value is not an object")]
    NotObject,
    #[error("string exceeds its maximum length")]
    StringTooLarge,
    #[error("array exceeds its maximum length")]
    ArrayTooLarge,
    #[error("object exceeds its maximum size")]
    ObjectTooLarge,
}
