/// Handler receives the semantic events of a parse, in document order.
///
/// Every method returns `true` to continue or `false` to halt, which the
/// parser reports as [`crate::Error::Aborted`].
///
/// Strings, keys, and comments may arrive in pieces: zero or more `_part`
/// events carry leading runs, and the unsuffixed event carries the final
/// run (possibly empty). The split points are an artifact of input
/// chunking and internal buffering; only the concatenation is meaningful.
/// The comment events have default no-op implementations, as comments only
/// occur under an opt-in extension.
pub trait Handler {
    /// The first non-whitespace byte of a document was seen.
    fn on_document_begin(&mut self) -> bool;
    /// The document's terminal value completed.
    fn on_document_end(&mut self) -> bool;

    fn on_object_begin(&mut self) -> bool;
    /// `{…}` closed, carrying the count of members reported within it.
    fn on_object_end(&mut self, members: usize) -> bool;
    fn on_array_begin(&mut self) -> bool;
    /// `[…]` closed, carrying the count of its elements.
    fn on_array_end(&mut self, elements: usize) -> bool;

    fn on_key_part(&mut self, part: &[u8]) -> bool;
    fn on_key(&mut self, last: &[u8]) -> bool;
    fn on_string_part(&mut self, part: &[u8]) -> bool;
    fn on_string(&mut self, last: &[u8]) -> bool;

    /// A number representable as a signed 64-bit integer.
    fn on_int64(&mut self, v: i64) -> bool;
    /// A non-negative integer representable only as unsigned 64-bit.
    fn on_uint64(&mut self, v: u64) -> bool;
    /// A number representable only as a double.
    fn on_double(&mut self, v: f64) -> bool;

    fn on_bool(&mut self, v: bool) -> bool;
    fn on_null(&mut self) -> bool;

    fn on_comment_part(&mut self, _part: &[u8]) -> bool {
        true
    }
    fn on_comment(&mut self, _last: &[u8]) -> bool {
        true
    }
}
