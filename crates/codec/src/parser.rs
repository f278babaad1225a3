use crate::number::{dec_to_f64, Num};
use crate::{utf8, Error, Handler, ParseOptions};

// Escape-path staging buffer. Unescaped output never exceeds its input,
// so filling the buffer bounds how much is decoded between flushes.
const TEMP_SIZE: usize = 2048;

// Byte classes for the string hot loop.
const C_PLAIN: u8 = 0;
const C_QUOTE: u8 = 1;
const C_ESCAPE: u8 = 2;
const C_CONTROL: u8 = 3;
const C_HIGH: u8 = 4;

const fn string_classes() -> [u8; 256] {
    let mut t = [C_PLAIN; 256];
    let mut b = 0;
    while b < 0x20 {
        t[b] = C_CONTROL;
        b += 1;
    }
    let mut b = 0x80;
    while b < 256 {
        t[b] = C_HIGH;
        b += 1;
    }
    t[b'"' as usize] = C_QUOTE;
    t[b'\\' as usize] = C_ESCAPE;
    t
}

static CLASS: [u8; 256] = string_classes();

// Where the machine resumes. Token interiors keep their own sub-state in
// dedicated fields; only one token is ever in flight.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    // Whitespace before the document.
    LeadingWs,
    // A value is required here (document root, after '[', ',' or ':').
    Value,
    // Inside '[': expect first element or ']'.
    ArrFirst,
    // After an element: expect ',' or ']'.
    ArrPost,
    // After an array ',': expect an element (or ']' under the extension).
    ArrNext,
    // Inside '{': expect first key or '}'.
    ObjFirst,
    // After an object ',': expect a key (or '}' under the extension).
    ObjKey,
    // After a key: expect ':'.
    ObjColon,
    // After a member value: expect ',' or '}'.
    ObjPost,
    // The document completed; only whitespace and comments are consumed.
    TrailingWs,
    // Token interiors.
    Lit,
    Num,
    Str,
    Comment,
}

// How a token stepper leaves the main loop.
enum Flow {
    // The token completed; the machine routed onward.
    Continue,
    // Out of input mid-token, with more promised.
    Suspend,
}

#[derive(Debug, Copy, Clone)]
enum Scope {
    // Each scope counts the members reported within it.
    Array(u32),
    Object(u32),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Lit {
    Null,
    True,
    False,
}

impl Lit {
    fn text(self) -> &'static [u8] {
        match self {
            Lit::Null => b"null",
            Lit::True => b"true",
            Lit::False => b"false",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum NumState {
    // A first digit is required (after a leading '-').
    First,
    // Significant digits left of the decimal point.
    Int,
    // Digits beyond the mantissa's capacity; each raises the bias.
    IntOver,
    // At '.', 'e', or the end of an integer.
    Sep,
    // A first significant fraction digit is required.
    FracFirst,
    // Significant fraction digits; each lowers the bias.
    Frac,
    // A first fraction digit is required (overflowed mantissa).
    FracOverFirst,
    // Fraction digits dropped beyond the mantissa's precision.
    FracOver,
    // Optional exponent sign.
    ExpSign,
    // A first exponent digit is required.
    ExpFirst,
    // Remaining exponent digits.
    Exp,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum StrState {
    // Zero-copy scan of unescaped bytes.
    Run,
    // Multibyte validation inside the unescaped run.
    RunUtf8,
    // A '\' was consumed; its escape byte is next.
    Esc,
    // Decoding through the staging buffer after the first escape.
    EscLoop,
    // Multibyte validation in the staged path.
    EscUtf8,
    // Hex digits of a '\uXXXX' unit, n of 4 consumed.
    Hex1(u8),
    // Between surrogate halves: expect '\'.
    SurSlash,
    // Between surrogate halves: expect 'u'.
    SurU,
    // Hex digits of the low surrogate, n of 4 consumed.
    Hex2(u8),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ComState {
    // A '/' was consumed; '/' or '*' decides the form.
    Start,
    Line,
    Block,
    // A '*' was seen inside a block comment.
    BlockStar,
}

/// Parser is a resumable byte-driven JSON tokenizer. Feed it input in
/// chunks of any size with [`Parser::write_some`]; it emits semantic
/// events to its [`Handler`] and suspends between any two bytes, keeping
/// all state inside itself. Beyond its scope stack, which grows only with
/// nesting depth, it allocates nothing per chunk.
pub struct Parser<H> {
    handler: H,
    opts: ParseOptions,

    state: State,
    scopes: Vec<Scope>,
    began: bool,
    complete: bool,
    failed: Option<Error>,
    more: bool,

    lit: Lit,
    lit_off: usize,

    num_state: NumState,
    num: Num,

    str_key: bool,
    str_state: StrState,
    u1: u16,
    u2: u16,
    temp: [u8; TEMP_SIZE],
    temp_len: usize,

    utf8_remaining: u8,
    utf8_lo: u8,
    utf8_hi: u8,

    com_state: ComState,
    com_resume: State,
}

// Map a handler's continue/halt bool onto the parse result.
fn chk(ok: bool) -> Result<(), Error> {
    if ok {
        Ok(())
    } else {
        Err(Error::Aborted)
    }
}

fn skip_ws(data: &[u8], i: &mut usize) {
    while *i < data.len() && matches!(data[*i], b' ' | b'\t' | b'\n' | b'\r') {
        *i += 1;
    }
}

fn hex_digit(b: u8) -> Option<u16> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u16),
        b'a'..=b'f' => Some((b - b'a' + 10) as u16),
        b'A'..=b'F' => Some((b - b'A' + 10) as u16),
        _ => None,
    }
}

impl<H: Handler> Parser<H> {
    pub fn new(handler: H) -> Self {
        Self::with_options(handler, ParseOptions::default())
    }

    pub fn with_options(handler: H, opts: ParseOptions) -> Self {
        Self {
            handler,
            opts,
            state: State::LeadingWs,
            scopes: Vec::new(),
            began: false,
            complete: false,
            failed: None,
            more: true,
            lit: Lit::Null,
            lit_off: 0,
            num_state: NumState::First,
            num: Num::default(),
            str_key: false,
            str_state: StrState::Run,
            u1: 0,
            u2: 0,
            temp: [0; TEMP_SIZE],
            temp_len: 0,
            utf8_remaining: 0,
            utf8_lo: 0,
            utf8_hi: 0,
            com_state: ComState::Start,
            com_resume: State::TrailingWs,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    pub fn options(&self) -> &ParseOptions {
        &self.opts
    }

    /// Whether the document's terminal value has completed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Return to the initial state, keeping the handler and options.
    pub fn reset(&mut self) {
        self.state = State::LeadingWs;
        self.scopes.clear();
        self.began = false;
        self.complete = false;
        self.failed = None;
        self.temp_len = 0;
    }

    /// Consume bytes of the document, dispatching events as constructs
    /// complete, and return how many bytes were used. `more` promises (or
    /// denies) further input: with `more == false`, input ending inside a
    /// construct is an error rather than a suspension.
    ///
    /// Bytes remain unconsumed only once the document has completed;
    /// re-present them (for instance, to a fresh parser) as the start of
    /// whatever follows the document.
    pub fn write_some(&mut self, more: bool, data: &[u8]) -> Result<usize, Error> {
        if let Some(err) = self.failed {
            return Err(err);
        }
        self.more = more;
        match self.run(data) {
            Ok(n) => Ok(n),
            Err(err) => {
                self.failed = Some(err);
                Err(err)
            }
        }
    }

    /// Present the end of input: any suspended construct becomes an
    /// error.
    pub fn finish(&mut self) -> Result<(), Error> {
        self.write_some(false, &[]).map(|_| ())
    }

    fn run(&mut self, data: &[u8]) -> Result<usize, Error> {
        let mut i = 0usize;
        // Start of the in-chunk run for zero-copy string and comment
        // events. Runs never span calls; suspension flushes them.
        let mut run = 0usize;

        loop {
            match self.state {
                State::LeadingWs => {
                    skip_ws(data, &mut i);
                    if i == data.len() {
                        return self.suspend(i);
                    }
                    if !self.began {
                        self.began = true;
                        chk(self.handler.on_document_begin())?;
                    }
                    self.state = State::Value;
                }

                State::Value => {
                    skip_ws(data, &mut i);
                    if i == data.len() {
                        return self.suspend(i);
                    }
                    let b = data[i];
                    match b {
                        b'{' => {
                            i += 1;
                            self.push_scope(Scope::Object(0))?;
                            chk(self.handler.on_object_begin())?;
                            self.state = State::ObjFirst;
                        }
                        b'[' => {
                            i += 1;
                            self.push_scope(Scope::Array(0))?;
                            chk(self.handler.on_array_begin())?;
                            self.state = State::ArrFirst;
                        }
                        b'"' => {
                            i += 1;
                            run = i;
                            self.str_key = false;
                            self.str_state = StrState::Run;
                            self.state = State::Str;
                        }
                        b'n' => {
                            i += 1;
                            self.lit = Lit::Null;
                            self.lit_off = 1;
                            self.state = State::Lit;
                        }
                        b't' => {
                            i += 1;
                            self.lit = Lit::True;
                            self.lit_off = 1;
                            self.state = State::Lit;
                        }
                        b'f' => {
                            i += 1;
                            self.lit = Lit::False;
                            self.lit_off = 1;
                            self.state = State::Lit;
                        }
                        b'-' => {
                            i += 1;
                            self.num = Num {
                                neg: true,
                                ..Num::default()
                            };
                            self.num_state = NumState::First;
                            self.state = State::Num;
                        }
                        b'0' => {
                            i += 1;
                            self.num = Num::default();
                            self.num_state = NumState::Sep;
                            self.state = State::Num;
                        }
                        b'1'..=b'9' => {
                            i += 1;
                            self.num = Num {
                                mant: (b - b'0') as u64,
                                ..Num::default()
                            };
                            self.num_state = NumState::Int;
                            self.state = State::Num;
                        }
                        b'/' if self.opts.allow_comments => {
                            run = i;
                            i += 1;
                            self.com_state = ComState::Start;
                            self.com_resume = State::Value;
                            self.state = State::Comment;
                        }
                        _ => return Err(Error::Syntax),
                    }
                }

                State::ArrFirst => {
                    skip_ws(data, &mut i);
                    if i == data.len() {
                        return self.suspend(i);
                    }
                    match data[i] {
                        b']' => {
                            i += 1;
                            self.close_array()?;
                        }
                        b'/' if self.opts.allow_comments => {
                            run = i;
                            i += 1;
                            self.com_state = ComState::Start;
                            self.com_resume = State::ArrFirst;
                            self.state = State::Comment;
                        }
                        _ => self.state = State::Value,
                    }
                }

                State::ArrPost => {
                    skip_ws(data, &mut i);
                    if i == data.len() {
                        return self.suspend(i);
                    }
                    match data[i] {
                        b',' => {
                            i += 1;
                            self.state = State::ArrNext;
                        }
                        b']' => {
                            i += 1;
                            self.close_array()?;
                        }
                        b'/' if self.opts.allow_comments => {
                            run = i;
                            i += 1;
                            self.com_state = ComState::Start;
                            self.com_resume = State::ArrPost;
                            self.state = State::Comment;
                        }
                        _ => return Err(Error::Syntax),
                    }
                }

                State::ArrNext => {
                    skip_ws(data, &mut i);
                    if i == data.len() {
                        return self.suspend(i);
                    }
                    match data[i] {
                        b']' if self.opts.allow_trailing_commas => {
                            i += 1;
                            self.close_array()?;
                        }
                        b'/' if self.opts.allow_comments => {
                            run = i;
                            i += 1;
                            self.com_state = ComState::Start;
                            self.com_resume = State::ArrNext;
                            self.state = State::Comment;
                        }
                        _ => self.state = State::Value,
                    }
                }

                State::ObjFirst | State::ObjKey => {
                    skip_ws(data, &mut i);
                    if i == data.len() {
                        return self.suspend(i);
                    }
                    match data[i] {
                        b'"' => {
                            i += 1;
                            run = i;
                            self.str_key = true;
                            self.str_state = StrState::Run;
                            self.state = State::Str;
                        }
                        b'}' if self.state == State::ObjFirst
                            || self.opts.allow_trailing_commas =>
                        {
                            i += 1;
                            self.close_object()?;
                        }
                        b'/' if self.opts.allow_comments => {
                            run = i;
                            i += 1;
                            self.com_resume = self.state;
                            self.com_state = ComState::Start;
                            self.state = State::Comment;
                        }
                        _ => return Err(Error::Syntax),
                    }
                }

                State::ObjColon => {
                    skip_ws(data, &mut i);
                    if i == data.len() {
                        return self.suspend(i);
                    }
                    match data[i] {
                        b':' => {
                            i += 1;
                            self.state = State::Value;
                        }
                        b'/' if self.opts.allow_comments => {
                            run = i;
                            i += 1;
                            self.com_state = ComState::Start;
                            self.com_resume = State::ObjColon;
                            self.state = State::Comment;
                        }
                        _ => return Err(Error::Syntax),
                    }
                }

                State::ObjPost => {
                    skip_ws(data, &mut i);
                    if i == data.len() {
                        return self.suspend(i);
                    }
                    match data[i] {
                        b',' => {
                            i += 1;
                            self.state = State::ObjKey;
                        }
                        b'}' => {
                            i += 1;
                            self.close_object()?;
                        }
                        b'/' if self.opts.allow_comments => {
                            run = i;
                            i += 1;
                            self.com_state = ComState::Start;
                            self.com_resume = State::ObjPost;
                            self.state = State::Comment;
                        }
                        _ => return Err(Error::Syntax),
                    }
                }

                State::TrailingWs => {
                    skip_ws(data, &mut i);
                    if i == data.len() {
                        return Ok(i);
                    }
                    if data[i] == b'/' && self.opts.allow_comments {
                        run = i;
                        i += 1;
                        self.com_state = ComState::Start;
                        self.com_resume = State::TrailingWs;
                        self.state = State::Comment;
                    } else {
                        // Bytes past the document stay unconsumed.
                        return Ok(i);
                    }
                }

                State::Lit => {
                    let text = self.lit.text();
                    while self.lit_off < text.len() {
                        if i == data.len() {
                            return self.suspend(i);
                        }
                        if data[i] != text[self.lit_off] {
                            return Err(Error::Syntax);
                        }
                        i += 1;
                        self.lit_off += 1;
                    }
                    match self.lit {
                        Lit::Null => chk(self.handler.on_null())?,
                        Lit::True => chk(self.handler.on_bool(true))?,
                        Lit::False => chk(self.handler.on_bool(false))?,
                    }
                    self.after_value()?;
                }

                State::Num => match self.step_number(data, &mut i)? {
                    Flow::Continue => (),
                    Flow::Suspend => return Ok(i),
                },

                State::Str => match self.step_string(data, &mut i, run)? {
                    Flow::Continue => (),
                    Flow::Suspend => return Ok(i),
                },

                State::Comment => loop {
                    if i == data.len() {
                        // A line comment trailing the document is closed
                        // by the end of input.
                        if !self.more
                            && self.com_state == ComState::Line
                            && self.com_resume == State::TrailingWs
                        {
                            chk(self.handler.on_comment(&data[run..i]))?;
                            self.state = State::TrailingWs;
                            break;
                        }
                        if i > run {
                            chk(self.handler.on_comment_part(&data[run..i]))?;
                        }
                        return self.suspend(i);
                    }
                    let b = data[i];
                    match self.com_state {
                        ComState::Start => match b {
                            b'/' => {
                                i += 1;
                                self.com_state = ComState::Line;
                            }
                            b'*' => {
                                i += 1;
                                self.com_state = ComState::Block;
                            }
                            _ => return Err(Error::Syntax),
                        },
                        ComState::Line => {
                            i += 1;
                            if b == b'\n' {
                                // The newline belongs to the comment.
                                chk(self.handler.on_comment(&data[run..i]))?;
                                self.state = self.com_resume;
                                break;
                            }
                        }
                        ComState::Block => {
                            i += 1;
                            if b == b'*' {
                                self.com_state = ComState::BlockStar;
                            }
                        }
                        ComState::BlockStar => {
                            i += 1;
                            match b {
                                b'/' => {
                                    chk(self.handler.on_comment(&data[run..i]))?;
                                    self.state = self.com_resume;
                                    break;
                                }
                                b'*' => (),
                                _ => self.com_state = ComState::Block,
                            }
                        }
                    }
                },
            }
        }
    }

    // Out of input between tokens, or at a point where a construct is
    // still open.
    fn suspend(&self, i: usize) -> Result<usize, Error> {
        if self.more {
            Ok(i)
        } else {
            Err(Error::Incomplete)
        }
    }

    fn push_scope(&mut self, scope: Scope) -> Result<(), Error> {
        if self.scopes.len() as u32 >= self.opts.max_depth {
            return Err(Error::TooDeep);
        }
        if self.scopes.capacity() == 0 {
            // One reservation covers the worst admissible nesting.
            self.scopes.reserve(self.opts.max_depth.min(64) as usize);
        }
        self.scopes.push(scope);
        Ok(())
    }

    // A value (or closed container) completed; route by context.
    fn after_value(&mut self) -> Result<(), Error> {
        match self.scopes.last_mut() {
            None => {
                self.complete = true;
                chk(self.handler.on_document_end())?;
                self.state = State::TrailingWs;
            }
            Some(Scope::Array(n)) => {
                *n += 1;
                self.state = State::ArrPost;
            }
            Some(Scope::Object(n)) => {
                *n += 1;
                self.state = State::ObjPost;
            }
        }
        Ok(())
    }

    fn close_array(&mut self) -> Result<(), Error> {
        match self.scopes.pop() {
            Some(Scope::Array(n)) => {
                chk(self.handler.on_array_end(n as usize))?;
                self.after_value()
            }
            _ => unreachable!("array scope is open"),
        }
    }

    fn close_object(&mut self) -> Result<(), Error> {
        match self.scopes.pop() {
            Some(Scope::Object(n)) => {
                chk(self.handler.on_object_end(n as usize))?;
                self.after_value()
            }
            _ => unreachable!("object scope is open"),
        }
    }

    fn step_number(&mut self, data: &[u8], i: &mut usize) -> Result<Flow, Error> {
        loop {
            if *i == data.len() {
                if self.more {
                    return Ok(Flow::Suspend);
                }
                // End of all input: a number in a terminable state
                // finalizes here and closes out the document.
                return match self.num_state {
                    NumState::Int | NumState::Sep => {
                        self.finish_int().map(|_| Flow::Continue)
                    }
                    NumState::IntOver | NumState::Frac | NumState::FracOver | NumState::Exp => {
                        self.finish_double().map(|_| Flow::Continue)
                    }
                    NumState::FracFirst | NumState::ExpFirst => Err(Error::Syntax),
                    NumState::First | NumState::FracOverFirst | NumState::ExpSign => {
                        Err(Error::Incomplete)
                    }
                };
            }
            let b = data[*i];
            match self.num_state {
                NumState::First => match b {
                    b'0' => {
                        *i += 1;
                        self.num_state = NumState::Sep;
                    }
                    b'1'..=b'9' => {
                        *i += 1;
                        self.num.mant = (b - b'0') as u64;
                        self.num_state = NumState::Int;
                    }
                    _ => return Err(Error::Syntax),
                },

                NumState::Int => {
                    if b.is_ascii_digit() {
                        *i += 1;
                        let d = b - b'0';
                        // Negative numbers admit one more of magnitude.
                        let (limit, last) = if self.num.neg {
                            (922337203685477580, 8)
                        } else {
                            (1844674407370955161, 5)
                        };
                        if self.num.mant > limit || (self.num.mant == limit && d > last) {
                            // The dropped digit raises the bias.
                            self.num.bias += 1;
                            self.num_state = NumState::IntOver;
                        } else {
                            self.num.mant = self.num.mant * 10 + d as u64;
                        }
                    } else {
                        self.num_state = NumState::Sep;
                    }
                }

                NumState::IntOver => match b {
                    b'0'..=b'9' => {
                        *i += 1;
                        self.num.bias += 1;
                    }
                    b'.' => {
                        *i += 1;
                        self.num_state = NumState::FracOverFirst;
                    }
                    b'e' | b'E' => {
                        *i += 1;
                        self.num_state = NumState::ExpSign;
                    }
                    _ => return self.finish_double().map(|_| Flow::Continue),
                },

                NumState::Sep => match b {
                    b'.' => {
                        *i += 1;
                        self.num_state = NumState::FracFirst;
                    }
                    b'e' | b'E' => {
                        *i += 1;
                        self.num_state = NumState::ExpSign;
                    }
                    _ => return self.finish_int().map(|_| Flow::Continue),
                },

                NumState::FracFirst => {
                    if !b.is_ascii_digit() {
                        return Err(Error::Syntax);
                    }
                    self.num_state = NumState::Frac;
                }

                NumState::Frac => match b {
                    b'0'..=b'9' => {
                        *i += 1;
                        if self.num.mant <= 9007199254740991 {
                            // Below the 2^53-1 ceiling, fraction digits
                            // stay significant.
                            self.num.bias -= 1;
                            self.num.mant = self.num.mant * 10 + (b - b'0') as u64;
                        } else {
                            self.num_state = NumState::FracOver;
                        }
                    }
                    b'e' | b'E' => {
                        *i += 1;
                        self.num_state = NumState::ExpSign;
                    }
                    _ => return self.finish_double().map(|_| Flow::Continue),
                },

                NumState::FracOverFirst => {
                    if !b.is_ascii_digit() {
                        return Err(Error::Syntax);
                    }
                    *i += 1;
                    self.num_state = NumState::FracOver;
                }

                NumState::FracOver => match b {
                    b'0'..=b'9' => *i += 1,
                    b'e' | b'E' => {
                        *i += 1;
                        self.num_state = NumState::ExpSign;
                    }
                    _ => return self.finish_double().map(|_| Flow::Continue),
                },

                NumState::ExpSign => {
                    match b {
                        b'+' => *i += 1,
                        b'-' => {
                            *i += 1;
                            self.num.exp_neg = true;
                        }
                        _ => (),
                    }
                    self.num_state = NumState::ExpFirst;
                }

                NumState::ExpFirst => match b {
                    b'0'..=b'9' => {
                        *i += 1;
                        self.num.exp = (b - b'0') as u32;
                        self.num_state = NumState::Exp;
                    }
                    _ => return Err(Error::Syntax),
                },

                NumState::Exp => match b {
                    b'0'..=b'9' => {
                        let d = (b - b'0') as u32;
                        if self.num.exp > 214748364 || (self.num.exp == 214748364 && d > 7) {
                            return Err(Error::ExponentOverflow);
                        }
                        *i += 1;
                        self.num.exp = self.num.exp * 10 + d;
                    }
                    _ => return self.finish_double().map(|_| Flow::Continue),
                },
            }
        }
    }

    fn finish_int(&mut self) -> Result<(), Error> {
        let Num { mant, neg, .. } = self.num;
        if neg {
            // Two's complement: the magnitude may be exactly 2^63.
            chk(self.handler.on_int64(mant.wrapping_neg() as i64))?;
        } else if mant <= i64::MAX as u64 {
            chk(self.handler.on_int64(mant as i64))?;
        } else {
            chk(self.handler.on_uint64(mant))?;
        }
        self.after_value()
    }

    fn finish_double(&mut self) -> Result<(), Error> {
        let Num {
            mant,
            exp,
            bias,
            neg,
            exp_neg,
        } = self.num;
        let exp = bias as i64 + if exp_neg { -(exp as i64) } else { exp as i64 };
        let exp = exp.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        chk(self.handler.on_double(dec_to_f64(mant, exp, neg)))?;
        self.after_value()
    }

    // `run` anchors the zero-copy unescaped run: where the string (or the
    // current chunk of it) began. Multibyte validation leaves it alone,
    // so validated sequences flow through the run uncopied; the escape
    // path abandons it for the staging buffer.
    fn step_string(&mut self, data: &[u8], i: &mut usize, run: usize) -> Result<Flow, Error> {
        loop {
            match self.str_state {
                StrState::Run => loop {
                    if *i == data.len() {
                        self.flush_run(&data[run..*i])?;
                        return self.string_suspend();
                    }
                    let b = data[*i];
                    match CLASS[b as usize] {
                        C_QUOTE => {
                            let last = &data[run..*i];
                            *i += 1;
                            if self.str_key {
                                chk(self.handler.on_key(last))?;
                            } else {
                                chk(self.handler.on_string(last))?;
                            }
                            return self.end_string().map(|_| Flow::Continue);
                        }
                        C_ESCAPE => {
                            self.flush_run(&data[run..*i])?;
                            *i += 1;
                            self.temp_len = 0;
                            self.str_state = StrState::Esc;
                            break;
                        }
                        C_CONTROL => return Err(Error::Syntax),
                        C_HIGH if !self.opts.allow_invalid_utf8 => {
                            let (n, lo, hi) = utf8::classify(b).ok_or(Error::Syntax)?;
                            *i += 1;
                            self.utf8_remaining = n;
                            self.utf8_lo = lo;
                            self.utf8_hi = hi;
                            self.str_state = StrState::RunUtf8;
                            break;
                        }
                        _ => *i += 1,
                    }
                },

                StrState::RunUtf8 => {
                    while self.utf8_remaining > 0 {
                        if *i == data.len() {
                            self.flush_run(&data[run..*i])?;
                            return self.string_suspend();
                        }
                        let b = data[*i];
                        if b < self.utf8_lo || b > self.utf8_hi {
                            return Err(Error::Syntax);
                        }
                        *i += 1;
                        self.utf8_lo = utf8::CONT_LO;
                        self.utf8_hi = utf8::CONT_HI;
                        self.utf8_remaining -= 1;
                    }
                    self.str_state = StrState::Run;
                }

                StrState::Esc => {
                    if *i == data.len() {
                        self.flush_temp()?;
                        return self.string_suspend();
                    }
                    let b = data[*i];
                    *i += 1;
                    let decoded = match b {
                        b'"' => b'"',
                        b'\\' => b'\\',
                        b'/' => b'/',
                        b'b' => 0x08,
                        b'f' => 0x0c,
                        b'n' => 0x0a,
                        b'r' => 0x0d,
                        b't' => 0x09,
                        b'u' => {
                            self.u1 = 0;
                            self.str_state = StrState::Hex1(0);
                            continue;
                        }
                        _ => return Err(Error::Syntax),
                    };
                    self.temp_push(decoded)?;
                    self.str_state = StrState::EscLoop;
                }

                StrState::EscLoop => loop {
                    if *i == data.len() {
                        self.flush_temp()?;
                        return self.string_suspend();
                    }
                    let b = data[*i];
                    match CLASS[b as usize] {
                        C_QUOTE => {
                            *i += 1;
                            let n = self.temp_len;
                            self.temp_len = 0;
                            if self.str_key {
                                chk(self.handler.on_key(&self.temp[..n]))?;
                            } else {
                                chk(self.handler.on_string(&self.temp[..n]))?;
                            }
                            return self.end_string().map(|_| Flow::Continue);
                        }
                        C_ESCAPE => {
                            *i += 1;
                            self.str_state = StrState::Esc;
                            break;
                        }
                        C_CONTROL => return Err(Error::Syntax),
                        C_HIGH if !self.opts.allow_invalid_utf8 => {
                            let (n, lo, hi) = utf8::classify(b).ok_or(Error::Syntax)?;
                            *i += 1;
                            self.temp_push(b)?;
                            self.utf8_remaining = n;
                            self.utf8_lo = lo;
                            self.utf8_hi = hi;
                            self.str_state = StrState::EscUtf8;
                            break;
                        }
                        _ => {
                            *i += 1;
                            self.temp_push(b)?;
                        }
                    }
                },

                StrState::EscUtf8 => {
                    while self.utf8_remaining > 0 {
                        if *i == data.len() {
                            self.flush_temp()?;
                            return self.string_suspend();
                        }
                        let b = data[*i];
                        if b < self.utf8_lo || b > self.utf8_hi {
                            return Err(Error::Syntax);
                        }
                        *i += 1;
                        self.temp_push(b)?;
                        self.utf8_lo = utf8::CONT_LO;
                        self.utf8_hi = utf8::CONT_HI;
                        self.utf8_remaining -= 1;
                    }
                    self.str_state = StrState::EscLoop;
                }

                StrState::Hex1(n) => {
                    if *i == data.len() {
                        self.flush_temp()?;
                        return self.string_suspend();
                    }
                    let d = hex_digit(data[*i]).ok_or(Error::ExpectedHexDigit)?;
                    *i += 1;
                    self.u1 = (self.u1 << 4) | d;
                    if n < 3 {
                        self.str_state = StrState::Hex1(n + 1);
                        continue;
                    }
                    match self.u1 {
                        0xd800..=0xdbff => self.str_state = StrState::SurSlash,
                        0xdc00..=0xdfff => return Err(Error::IllegalLeadingSurrogate),
                        cp => {
                            self.append_utf8(cp as u32)?;
                            self.str_state = StrState::EscLoop;
                        }
                    }
                }

                StrState::SurSlash => {
                    if *i == data.len() {
                        self.flush_temp()?;
                        return self.string_suspend();
                    }
                    if data[*i] != b'\\' {
                        return Err(Error::Syntax);
                    }
                    *i += 1;
                    self.str_state = StrState::SurU;
                }

                StrState::SurU => {
                    if *i == data.len() {
                        self.flush_temp()?;
                        return self.string_suspend();
                    }
                    if data[*i] != b'u' {
                        return Err(Error::Syntax);
                    }
                    *i += 1;
                    self.u2 = 0;
                    self.str_state = StrState::Hex2(0);
                }

                StrState::Hex2(n) => {
                    if *i == data.len() {
                        self.flush_temp()?;
                        return self.string_suspend();
                    }
                    let d = hex_digit(data[*i]).ok_or(Error::ExpectedHexDigit)?;
                    *i += 1;
                    self.u2 = (self.u2 << 4) | d;
                    if n < 3 {
                        self.str_state = StrState::Hex2(n + 1);
                        continue;
                    }
                    if !(0xdc00..=0xdfff).contains(&self.u2) {
                        return Err(Error::IllegalTrailingSurrogate);
                    }
                    let cp =
                        0x10000 + (((self.u1 as u32) - 0xd800) << 10) + ((self.u2 as u32) - 0xdc00);
                    self.append_utf8(cp)?;
                    self.str_state = StrState::EscLoop;
                }
            }
        }
    }

    fn string_suspend(&self) -> Result<Flow, Error> {
        if self.more {
            Ok(Flow::Suspend)
        } else {
            Err(Error::Incomplete)
        }
    }

    // Flush a non-empty unescaped run as a part event.
    fn flush_run(&mut self, part: &[u8]) -> Result<(), Error> {
        if part.is_empty() {
            return Ok(());
        }
        if self.str_key {
            chk(self.handler.on_key_part(part))
        } else {
            chk(self.handler.on_string_part(part))
        }
    }

    // Flush staged escape-path bytes as a part event.
    fn flush_temp(&mut self) -> Result<(), Error> {
        if self.temp_len == 0 {
            return Ok(());
        }
        let n = self.temp_len;
        self.temp_len = 0;
        if self.str_key {
            chk(self.handler.on_key_part(&self.temp[..n]))
        } else {
            chk(self.handler.on_string_part(&self.temp[..n]))
        }
    }

    fn temp_push(&mut self, b: u8) -> Result<(), Error> {
        if self.temp_len == TEMP_SIZE {
            self.flush_temp()?;
        }
        self.temp[self.temp_len] = b;
        self.temp_len += 1;
        Ok(())
    }

    // Encode a code point into the staging buffer.
    fn append_utf8(&mut self, cp: u32) -> Result<(), Error> {
        let mut buf = [0u8; 4];
        let n = match cp {
            0..=0x7f => {
                buf[0] = cp as u8;
                1
            }
            0x80..=0x7ff => {
                buf[0] = 0xc0 | (cp >> 6) as u8;
                buf[1] = 0x80 | (cp & 0x3f) as u8;
                2
            }
            0x800..=0xffff => {
                buf[0] = 0xe0 | (cp >> 12) as u8;
                buf[1] = 0x80 | ((cp >> 6) & 0x3f) as u8;
                buf[2] = 0x80 | (cp & 0x3f) as u8;
                3
            }
            _ => {
                buf[0] = 0xf0 | (cp >> 18) as u8;
                buf[1] = 0x80 | ((cp >> 12) & 0x3f) as u8;
                buf[2] = 0x80 | ((cp >> 6) & 0x3f) as u8;
                buf[3] = 0x80 | (cp & 0x3f) as u8;
                4
            }
        };
        for &b in &buf[..n] {
            self.temp_push(b)?;
        }
        Ok(())
    }

    // A string token completed: keys await their ':', values route by
    // the surrounding scope.
    fn end_string(&mut self) -> Result<(), Error> {
        if self.str_key {
            self.state = State::ObjColon;
            Ok(())
        } else {
            self.after_value()
        }
    }
}
