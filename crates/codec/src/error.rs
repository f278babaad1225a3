/// Error is the failure surface of parsing. The parser stops consuming at
/// the failing byte and keeps returning the same error until it is reset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("syntax error")]
    Syntax,
    #[error("document is incomplete")]
    Incomplete,
    #[error("nesting exceeds the depth limit")]
    TooDeep,
    #[error("expected a hex digit")]
    ExpectedHexDigit,
    #[error("illegal leading surrogate")]
    IllegalLeadingSurrogate,
    #[error("illegal trailing surrogate")]
    IllegalTrailingSurrogate,
    #[error("exponent overflows")]
    ExponentOverflow,
    #[error("string exceeds its maximum length")]
    StringTooLarge,
    #[error("array exceeds its maximum length")]
    ArrayTooLarge,
    #[error("object exceeds its maximum size")]
    ObjectTooLarge,
    #[error("input continues past the document")]
    ExtraData,
    #[error("handler aborted the parse")]
    Aborted,
}
