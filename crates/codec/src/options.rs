/// ParseOptions selects the extensions a [`crate::Parser`] honors, fixed
/// at the start of each document.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Permit `//…` and `/*…*/` comments wherever whitespace is permitted,
    /// reported through the comment events.
    pub allow_comments: bool,
    /// Permit one trailing comma before a closing `]` or `}`.
    pub allow_trailing_commas: bool,
    /// Skip UTF-8 validation of strings and keys, passing bytes at and
    /// above 0x80 through opaquely.
    pub allow_invalid_utf8: bool,
    /// Containers may nest this deep; one deeper fails the parse.
    pub max_depth: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            allow_comments: false,
            allow_trailing_commas: false,
            allow_invalid_utf8: false,
            max_depth: 32,
        }
    }
}
