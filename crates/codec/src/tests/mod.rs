use crate::{Error, Handler, ParseOptions, Parser};

mod arbitrary;
pub use arbitrary::ArbitraryValue;


/// One semantic event, with part runs coalesced into their full event
/// unless recording raw.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    DocBegin,
    DocEnd,
    ObjBegin,
    ObjEnd(usize),
    ArrBegin,
    ArrEnd(usize),
    KeyPart(Vec<u8>),
    Key(Vec<u8>),
    StrPart(Vec<u8>),
    Str(Vec<u8>),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Null,
    ComPart(Vec<u8>),
    Com(Vec<u8>),
}

/// Recorder captures the event stream. By default it coalesces `_part`
/// runs into the final event, which makes streams comparable across
/// different input chunkings; `raw()` keeps the parts distinct to test
/// the part/full contract itself.
#[derive(Default)]
pub struct Recorder {
    pub events: Vec<Event>,
    pending: Vec<u8>,
    raw: bool,
    fail_after: Option<usize>,
}

impl Recorder {
    pub fn raw() -> Self {
        Recorder {
            raw: true,
            ..Default::default()
        }
    }

    /// Halt the parse once this many events have been recorded.
    pub fn fail_after(n: usize) -> Self {
        Recorder {
            fail_after: Some(n),
            ..Default::default()
        }
    }

    fn push(&mut self, event: Event) -> bool {
        self.events.push(event);
        match self.fail_after {
            Some(n) => self.events.len() < n,
            None => true,
        }
    }

    fn push_part(&mut self, part: &[u8], as_event: fn(Vec<u8>) -> Event) -> bool {
        if self.raw {
            self.push(as_event(part.to_vec()))
        } else {
            self.pending.extend_from_slice(part);
            true
        }
    }

    fn push_full(&mut self, last: &[u8], as_event: fn(Vec<u8>) -> Event) -> bool {
        let mut full = std::mem::take(&mut self.pending);
        full.extend_from_slice(last);
        self.push(as_event(full))
    }
}

impl Handler for Recorder {
    fn on_document_begin(&mut self) -> bool {
        self.push(Event::DocBegin)
    }
    fn on_document_end(&mut self) -> bool {
        self.push(Event::DocEnd)
    }
    fn on_object_begin(&mut self) -> bool {
        self.push(Event::ObjBegin)
    }
    fn on_object_end(&mut self, members: usize) -> bool {
        self.push(Event::ObjEnd(members))
    }
    fn on_array_begin(&mut self) -> bool {
        self.push(Event::ArrBegin)
    }
    fn on_array_end(&mut self, elements: usize) -> bool {
        self.push(Event::ArrEnd(elements))
    }
    fn on_key_part(&mut self, part: &[u8]) -> bool {
        self.push_part(part, Event::KeyPart)
    }
    fn on_key(&mut self, last: &[u8]) -> bool {
        self.push_full(last, Event::Key)
    }
    fn on_string_part(&mut self, part: &[u8]) -> bool {
        self.push_part(part, Event::StrPart)
    }
    fn on_string(&mut self, last: &[u8]) -> bool {
        self.push_full(last, Event::Str)
    }
    fn on_int64(&mut self, v: i64) -> bool {
        self.push(Event::I64(v))
    }
    fn on_uint64(&mut self, v: u64) -> bool {
        self.push(Event::U64(v))
    }
    fn on_double(&mut self, v: f64) -> bool {
        self.push(Event::F64(v))
    }
    fn on_bool(&mut self, v: bool) -> bool {
        self.push(Event::Bool(v))
    }
    fn on_null(&mut self) -> bool {
        self.push(Event::Null)
    }
    fn on_comment_part(&mut self, part: &[u8]) -> bool {
        self.push_part(part, Event::ComPart)
    }
    fn on_comment(&mut self, last: &[u8]) -> bool {
        self.push_full(last, Event::Com)
    }
}

/// Record the coalesced events of parsing `input` in one call.
pub fn record(input: &[u8], opts: ParseOptions) -> Result<Vec<Event>, Error> {
    let mut parser = Parser::with_options(Recorder::default(), opts);
    parser.write_some(false, input)?;
    Ok(parser.into_handler().events)
}

/// Record the coalesced events of parsing `chunks` sequentially. Every
/// chunk before the last must be consumed in full, since each is a
/// prefix of a valid document.
pub fn record_chunked(chunks: &[&[u8]], opts: ParseOptions) -> Result<Vec<Event>, Error> {
    let mut parser = Parser::with_options(Recorder::default(), opts);
    let (last, rest) = chunks.split_last().expect("at least one chunk");
    for chunk in rest {
        let n = parser.write_some(true, chunk)?;
        assert_eq!(n, chunk.len(), "prefix chunks are consumed entirely");
    }
    parser.write_some(false, last)?;
    Ok(parser.into_handler().events)
}

/// Assert that every two-chunk partition of `input` yields the event
/// stream of parsing it whole.
pub fn check_all_splits(input: &[u8], opts: ParseOptions) {
    let whole = record(input, opts).expect("fixture parses whole");
    for split in 0..=input.len() {
        let split_events = record_chunked(&[&input[..split], &input[split..]], opts)
            .unwrap_or_else(|err| panic!("split at {split}: {err}"));
        assert_eq!(whole, split_events, "split at {split}");
    }
}
