//! Streaming JSON for the document model of the `dom` crate: a
//! resumable, incremental parser which accepts input in chunks of any
//! size and emits semantic events; a resumable serializer which writes a
//! value tree into output buffers of any size; and the handler that
//! assembles parse events back into a tree.

mod error;
pub use error::Error;

mod options;
pub use options::ParseOptions;

mod handler;
pub use handler::Handler;

// Number finalization: mantissa/exponent accumulation into the
// narrowest of int64 / uint64 / double.
mod number;

// Incremental UTF-8 validation shared by the string paths.
mod utf8;

mod parser;
pub use parser::Parser;

mod ser;
pub use ser::Serializer;

mod build;
pub use build::TreeBuilder;

#[cfg(test)]
mod tests;

use dom::{Storage, Value};

/// Parse a complete document into a [`Value`] allocated from `storage`.
pub fn parse<'s>(input: &[u8], storage: Storage<'s>) -> Result<Value<'s>, Error> {
    parse_with_options(input, storage, ParseOptions::default())
}

/// As [`parse`], with explicit [`ParseOptions`].
pub fn parse_with_options<'s>(
    input: &[u8],
    storage: Storage<'s>,
    options: ParseOptions,
) -> Result<Value<'s>, Error> {
    let mut parser = Parser::with_options(TreeBuilder::new(storage), options);
    let consumed = match parser.write_some(false, input) {
        Ok(n) => n,
        Err(err) => {
            // The builder knows why it halted the parser.
            let err = match (err, parser.handler().error()) {
                (Error::Aborted, Some(cause)) => cause,
                _ => err,
            };
            tracing::debug!(%err, "document parse failed");
            return Err(err);
        }
    };
    if consumed < input.len() {
        return Err(Error::ExtraData);
    }
    parser.into_handler().into_value().ok_or(Error::Incomplete)
}

/// Serialize a tree as canonical JSON bytes.
pub fn to_vec(value: &Value<'_>) -> Vec<u8> {
    let mut ser = Serializer::new(value);
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    while !ser.done() {
        let n = ser.read(&mut buf);
        out.extend_from_slice(&buf[..n]);
    }
    out
}

/// Serialize a tree as a canonical JSON string.
pub fn to_string(value: &Value<'_>) -> String {
    // Safety: the serializer emits UTF-8 whenever the tree's strings are
    // UTF-8, which only the opt-out unchecked paths can violate.
    unsafe { String::from_utf8_unchecked(to_vec(value)) }
}
