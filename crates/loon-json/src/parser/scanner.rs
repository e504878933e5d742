//! Push-driven lexical scanner for JSON text.
//!
//! The scanner consumes byte chunks of any size, suspending at chunk
//! boundaries anywhere in the grammar, including inside literals, escape
//! sequences, and multibyte UTF-8 characters. Structure is tracked on an
//! explicit state stack with a `Done` sentinel at the bottom, so there is
//! no recursion and nesting depth is bounded only by the handler.

use smallvec::SmallVec;

use crate::error::ParseError;
use crate::number::Number;

/// Receiver of scan events.
///
/// Every callback may fail; the scanner stops at the first error and
/// reports it from every later call.
pub trait Handler {
    fn on_document_begin(&mut self) -> Result<(), ParseError> {
        Ok(())
    }

    fn on_document_end(&mut self) -> Result<(), ParseError> {
        Ok(())
    }

    fn on_object_begin(&mut self) -> Result<(), ParseError>;

    fn on_object_end(&mut self) -> Result<(), ParseError>;

    /// A fully decoded and validated object key.
    fn on_key(&mut self, key: &str) -> Result<(), ParseError>;

    fn on_array_begin(&mut self) -> Result<(), ParseError>;

    fn on_array_end(&mut self) -> Result<(), ParseError>;

    fn on_string_begin(&mut self) -> Result<(), ParseError>;

    /// A decoded fragment of the current string.
    ///
    /// Fragments concatenate to valid UTF-8, but a single fragment may end
    /// mid-character only at a chunk boundary the scanner has already
    /// verified will be completed; each delivered fragment is whole.
    fn on_string_piece(&mut self, piece: &[u8]) -> Result<(), ParseError>;

    fn on_string_end(&mut self) -> Result<(), ParseError>;

    fn on_number(&mut self, n: Number) -> Result<(), ParseError>;

    fn on_bool(&mut self, b: bool) -> Result<(), ParseError>;

    fn on_null(&mut self) -> Result<(), ParseError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Bottom sentinel: the document is complete.
    Done,
    /// Skip insignificant whitespace, then pop.
    Ws,
    /// Dispatch on the first byte of a value.
    Value,
    /// After `{`: expect a key or `}`.
    Object1,
    /// After a member: expect `,` or `}`.
    Object3,
    /// After `,` in an object: expect the opening quote of a key.
    KeyStart,
    /// Expect `:`.
    Colon,
    /// After `[`: expect a value or `]`.
    Array1,
    /// After an element: expect `,` or `]`.
    Array3,
    /// Inside a string body.
    Str { key: bool },
    /// After a backslash.
    Esc { key: bool },
    /// Inside the four hex digits of a `\u` escape.
    Hex { key: bool },
    /// After a high surrogate: expect `\`.
    Sur1 { key: bool },
    /// After a high surrogate and `\`: expect `u`.
    Sur2 { key: bool },
    True1,
    True2,
    True3,
    False1,
    False2,
    False3,
    False4,
    Null1,
    Null2,
    Null3,
    /// After `-`: expect the first mantissa digit.
    Mant1,
    /// After a leading zero.
    Mant0,
    /// Inside integer digits.
    Mant,
    /// After `.`: expect the first fraction digit.
    Frac1,
    /// Inside fraction digits.
    Frac,
    /// After `e`: expect a sign or digit.
    Exp1,
    /// After an exponent sign: expect a digit.
    Exp2,
    /// Inside exponent digits.
    Exp,
}

/// Largest decimal exponent a finite double can carry, checked against the
/// final exponent after fraction digits are folded in.
const MAX_EXPONENT: i32 = 308;

/// Cap on the accumulated literal exponent and on the fraction digit
/// count, so neither counter can overflow before the final range check.
/// A run of zero fraction digits never trips the mantissa check, so the
/// count needs its own bound.
const MAX_EXPONENT_DIGITS_VALUE: i32 = 999_999;

/// Incremental JSON scanner.
///
/// Reusable across documents via [`Scanner::reset`].
pub struct Scanner {
    stack: SmallVec<[State; 16]>,
    mant: u64,
    exp: i32,
    frac: i32,
    neg: bool,
    exp_neg: bool,
    key_buf: Vec<u8>,
    u_acc: u32,
    u_len: u8,
    u_hi: Option<u16>,
    /// Tail bytes of a multibyte character split across chunks.
    utf8: [u8; 4],
    utf8_len: u8,
    consumed: u64,
    done: bool,
    failed: Option<ParseError>,
}

impl Scanner {
    pub fn new() -> Self {
        Scanner {
            stack: SmallVec::new(),
            mant: 0,
            exp: 0,
            frac: 0,
            neg: false,
            exp_neg: false,
            key_buf: Vec::new(),
            u_acc: 0,
            u_len: 0,
            u_hi: None,
            utf8: [0; 4],
            utf8_len: 0,
            consumed: 0,
            done: false,
            failed: None,
        }
    }

    /// Forget all state and prepare for a fresh document.
    pub fn reset(&mut self) {
        let key_buf = std::mem::take(&mut self.key_buf);
        *self = Scanner::new();
        self.key_buf = key_buf;
        self.key_buf.clear();
    }

    /// Whether a complete document has been scanned.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Total bytes consumed since construction or the last reset.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Scan as much of `data` as belongs to the current document.
    ///
    /// Returns the number of bytes consumed, which is less than
    /// `data.len()` only when the document completed inside `data`.
    pub fn write_some<H: Handler>(
        &mut self,
        h: &mut H,
        data: &[u8],
    ) -> Result<usize, ParseError> {
        if let Some(e) = self.failed {
            return Err(e);
        }
        match self.scan(h, data) {
            Ok(n) => {
                self.consumed += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.failed = Some(e);
                Err(e)
            }
        }
    }

    /// Scan `data`, requiring that all of it belongs to the document.
    pub fn write<H: Handler>(&mut self, h: &mut H, data: &[u8]) -> Result<usize, ParseError> {
        let n = self.write_some(h, data)?;
        if n < data.len() {
            self.failed = Some(ParseError::ExtraData);
            return Err(ParseError::ExtraData);
        }
        Ok(n)
    }

    /// Signal the end of input, finalizing a trailing number if needed.
    pub fn write_eof<H: Handler>(&mut self, h: &mut H) -> Result<(), ParseError> {
        if let Some(e) = self.failed {
            return Err(e);
        }
        match self.finish(h) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.failed = Some(e);
                Err(e)
            }
        }
    }

    fn finish<H: Handler>(&mut self, h: &mut H) -> Result<(), ParseError> {
        if self.done {
            return Ok(());
        }
        loop {
            match self.stack.last().copied() {
                Some(State::Done) => {
                    self.done = true;
                    return h.on_document_end();
                }
                Some(State::Ws) => {
                    self.stack.pop();
                }
                Some(State::Mant0 | State::Mant | State::Frac | State::Exp) => {
                    self.finish_number(h)?;
                }
                // nothing else may be pending at end of input
                _ => return Err(self.syntax(0)),
            }
        }
    }

    fn scan<H: Handler>(&mut self, h: &mut H, data: &[u8]) -> Result<usize, ParseError> {
        if self.done {
            return Ok(0);
        }
        if self.stack.is_empty() {
            self.stack.push(State::Done);
            self.stack.push(State::Ws);
            self.stack.push(State::Value);
            self.stack.push(State::Ws);
            h.on_document_begin()?;
        }
        let mut i = 0;
        loop {
            let st = *self.stack.last().expect("stack holds the Done sentinel");
            if st == State::Done {
                self.done = true;
                h.on_document_end()?;
                return Ok(i);
            }
            if i >= data.len() {
                return Ok(i);
            }
            let b = data[i];
            match st {
                State::Done => unreachable!(),
                State::Ws => match b {
                    b' ' | b'\t' | b'\n' | b'\r' => i += 1,
                    _ => {
                        self.stack.pop();
                    }
                },
                State::Value => match b {
                    b'{' => {
                        i += 1;
                        self.set_top(State::Object1);
                        self.stack.push(State::Ws);
                        h.on_object_begin()?;
                    }
                    b'[' => {
                        i += 1;
                        self.set_top(State::Array1);
                        self.stack.push(State::Ws);
                        h.on_array_begin()?;
                    }
                    b'"' => {
                        i += 1;
                        self.set_top(State::Str { key: false });
                        h.on_string_begin()?;
                    }
                    b't' => {
                        i += 1;
                        self.set_top(State::True1);
                    }
                    b'f' => {
                        i += 1;
                        self.set_top(State::False1);
                    }
                    b'n' => {
                        i += 1;
                        self.set_top(State::Null1);
                    }
                    b'-' => {
                        i += 1;
                        self.neg = true;
                        self.set_top(State::Mant1);
                    }
                    b'0' => {
                        i += 1;
                        self.set_top(State::Mant0);
                    }
                    b'1'..=b'9' => {
                        i += 1;
                        self.mant = u64::from(b - b'0');
                        self.set_top(State::Mant);
                    }
                    _ => return Err(self.syntax(i)),
                },
                State::Object1 => match b {
                    b'"' => {
                        i += 1;
                        self.set_top(State::Object3);
                        self.stack.push(State::Ws);
                        self.stack.push(State::Value);
                        self.stack.push(State::Ws);
                        self.stack.push(State::Colon);
                        self.stack.push(State::Ws);
                        self.stack.push(State::Str { key: true });
                    }
                    b'}' => {
                        i += 1;
                        self.stack.pop();
                        h.on_object_end()?;
                    }
                    _ => return Err(self.syntax(i)),
                },
                State::Object3 => match b {
                    b',' => {
                        i += 1;
                        self.stack.push(State::Ws);
                        self.stack.push(State::Value);
                        self.stack.push(State::Ws);
                        self.stack.push(State::Colon);
                        self.stack.push(State::Ws);
                        self.stack.push(State::KeyStart);
                        self.stack.push(State::Ws);
                    }
                    b'}' => {
                        i += 1;
                        self.stack.pop();
                        h.on_object_end()?;
                    }
                    _ => return Err(self.syntax(i)),
                },
                State::KeyStart => match b {
                    b'"' => {
                        i += 1;
                        self.set_top(State::Str { key: true });
                    }
                    _ => return Err(self.syntax(i)),
                },
                State::Colon => match b {
                    b':' => {
                        i += 1;
                        self.stack.pop();
                    }
                    _ => return Err(self.syntax(i)),
                },
                State::Array1 => match b {
                    b']' => {
                        i += 1;
                        self.stack.pop();
                        h.on_array_end()?;
                    }
                    _ => {
                        self.set_top(State::Array3);
                        self.stack.push(State::Ws);
                        self.stack.push(State::Value);
                    }
                },
                State::Array3 => match b {
                    b',' => {
                        i += 1;
                        self.stack.push(State::Ws);
                        self.stack.push(State::Value);
                        self.stack.push(State::Ws);
                    }
                    b']' => {
                        i += 1;
                        self.stack.pop();
                        h.on_array_end()?;
                    }
                    _ => return Err(self.syntax(i)),
                },
                State::Str { key } => {
                    let start = i;
                    while i < data.len() {
                        let c = data[i];
                        if c == b'"' || c == b'\\' || c < 0x20 {
                            break;
                        }
                        i += 1;
                    }
                    if i > start {
                        self.accept_text(h, key, &data[start..i], start)?;
                    }
                    if i >= data.len() {
                        return Ok(i);
                    }
                    match data[i] {
                        b'"' => {
                            if self.utf8_len != 0 {
                                return Err(self.syntax(i));
                            }
                            i += 1;
                            self.stack.pop();
                            if key {
                                self.flush_key(h, i)?;
                            } else {
                                h.on_string_end()?;
                            }
                        }
                        b'\\' => {
                            if self.utf8_len != 0 {
                                return Err(self.syntax(i));
                            }
                            i += 1;
                            self.set_top(State::Esc { key });
                        }
                        _ => return Err(self.syntax(i)),
                    }
                }
                State::Esc { key } => {
                    let decoded = match b {
                        b'"' => b'"',
                        b'\\' => b'\\',
                        b'/' => b'/',
                        b'b' => 0x08,
                        b'f' => 0x0c,
                        b'n' => b'\n',
                        b'r' => b'\r',
                        b't' => b'\t',
                        b'u' => {
                            i += 1;
                            self.u_acc = 0;
                            self.u_len = 0;
                            self.set_top(State::Hex { key });
                            continue;
                        }
                        _ => return Err(self.syntax(i)),
                    };
                    i += 1;
                    self.emit(h, key, &[decoded])?;
                    self.set_top(State::Str { key });
                }
                State::Hex { key } => {
                    let d = match b {
                        b'0'..=b'9' => b - b'0',
                        b'a'..=b'f' => b - b'a' + 10,
                        b'A'..=b'F' => b - b'A' + 10,
                        _ => return Err(self.syntax(i)),
                    };
                    i += 1;
                    self.u_acc = (self.u_acc << 4) | u32::from(d);
                    self.u_len += 1;
                    if self.u_len == 4 {
                        self.end_escape(h, key, i)?;
                    }
                }
                State::Sur1 { key } => match b {
                    b'\\' => {
                        i += 1;
                        self.set_top(State::Sur2 { key });
                    }
                    _ => return Err(self.syntax(i)),
                },
                State::Sur2 { key } => match b {
                    b'u' => {
                        i += 1;
                        self.u_acc = 0;
                        self.u_len = 0;
                        self.set_top(State::Hex { key });
                    }
                    _ => return Err(self.syntax(i)),
                },
                State::True1 => {
                    self.expect(b, b'r', i)?;
                    i += 1;
                    self.set_top(State::True2);
                }
                State::True2 => {
                    self.expect(b, b'u', i)?;
                    i += 1;
                    self.set_top(State::True3);
                }
                State::True3 => {
                    self.expect(b, b'e', i)?;
                    i += 1;
                    self.stack.pop();
                    h.on_bool(true)?;
                }
                State::False1 => {
                    self.expect(b, b'a', i)?;
                    i += 1;
                    self.set_top(State::False2);
                }
                State::False2 => {
                    self.expect(b, b'l', i)?;
                    i += 1;
                    self.set_top(State::False3);
                }
                State::False3 => {
                    self.expect(b, b's', i)?;
                    i += 1;
                    self.set_top(State::False4);
                }
                State::False4 => {
                    self.expect(b, b'e', i)?;
                    i += 1;
                    self.stack.pop();
                    h.on_bool(false)?;
                }
                State::Null1 => {
                    self.expect(b, b'u', i)?;
                    i += 1;
                    self.set_top(State::Null2);
                }
                State::Null2 => {
                    self.expect(b, b'l', i)?;
                    i += 1;
                    self.set_top(State::Null3);
                }
                State::Null3 => {
                    self.expect(b, b'l', i)?;
                    i += 1;
                    self.stack.pop();
                    h.on_null()?;
                }
                State::Mant1 => match b {
                    b'0' => {
                        i += 1;
                        self.set_top(State::Mant0);
                    }
                    b'1'..=b'9' => {
                        i += 1;
                        self.mant = u64::from(b - b'0');
                        self.set_top(State::Mant);
                    }
                    _ => return Err(self.syntax(i)),
                },
                State::Mant0 => match b {
                    b'.' => {
                        i += 1;
                        self.set_top(State::Frac1);
                    }
                    b'e' | b'E' => {
                        i += 1;
                        self.set_top(State::Exp1);
                    }
                    // a second digit after a leading zero is not a number
                    b'0'..=b'9' => return Err(self.syntax(i)),
                    _ => self.finish_number(h)?,
                },
                State::Mant => match b {
                    b'0'..=b'9' => {
                        i += 1;
                        self.push_mantissa_digit(b - b'0')?;
                    }
                    b'.' => {
                        i += 1;
                        self.set_top(State::Frac1);
                    }
                    b'e' | b'E' => {
                        i += 1;
                        self.set_top(State::Exp1);
                    }
                    _ => self.finish_number(h)?,
                },
                State::Frac1 => match b {
                    b'0'..=b'9' => {
                        i += 1;
                        self.push_mantissa_digit(b - b'0')?;
                        self.frac += 1;
                        self.set_top(State::Frac);
                    }
                    _ => return Err(self.syntax(i)),
                },
                State::Frac => match b {
                    b'0'..=b'9' => {
                        i += 1;
                        self.push_mantissa_digit(b - b'0')?;
                        self.frac += 1;
                        if self.frac > MAX_EXPONENT_DIGITS_VALUE {
                            return Err(ParseError::ExponentOverflow);
                        }
                    }
                    b'e' | b'E' => {
                        i += 1;
                        self.set_top(State::Exp1);
                    }
                    _ => self.finish_number(h)?,
                },
                State::Exp1 => match b {
                    b'-' => {
                        i += 1;
                        self.exp_neg = true;
                        self.set_top(State::Exp2);
                    }
                    b'+' => {
                        i += 1;
                        self.set_top(State::Exp2);
                    }
                    b'0'..=b'9' => {
                        i += 1;
                        self.exp = i32::from(b - b'0');
                        self.set_top(State::Exp);
                    }
                    _ => return Err(self.syntax(i)),
                },
                State::Exp2 => match b {
                    b'0'..=b'9' => {
                        i += 1;
                        self.exp = i32::from(b - b'0');
                        self.set_top(State::Exp);
                    }
                    _ => return Err(self.syntax(i)),
                },
                State::Exp => match b {
                    b'0'..=b'9' => {
                        i += 1;
                        self.exp = self.exp * 10 + i32::from(b - b'0');
                        if self.exp > MAX_EXPONENT_DIGITS_VALUE {
                            return Err(ParseError::ExponentOverflow);
                        }
                    }
                    _ => self.finish_number(h)?,
                },
            }
        }
    }

    fn set_top(&mut self, st: State) {
        *self.stack.last_mut().expect("stack is non-empty") = st;
    }

    fn expect(&mut self, got: u8, want: u8, i: usize) -> Result<(), ParseError> {
        if got == want {
            Ok(())
        } else {
            Err(self.syntax(i))
        }
    }

    fn syntax(&self, i: usize) -> ParseError {
        ParseError::Syntax {
            offset: self.consumed as usize + i,
        }
    }

    fn push_mantissa_digit(&mut self, d: u8) -> Result<(), ParseError> {
        self.mant = self
            .mant
            .checked_mul(10)
            .and_then(|m| m.checked_add(u64::from(d)))
            .ok_or(ParseError::MantissaOverflow)?;
        Ok(())
    }

    /// Emit the pending number and pop its state.
    fn finish_number<H: Handler>(&mut self, h: &mut H) -> Result<(), ParseError> {
        let signed = if self.exp_neg { -self.exp } else { self.exp };
        let e = signed - self.frac;
        if !(-MAX_EXPONENT..=MAX_EXPONENT).contains(&e) {
            return Err(ParseError::ExponentOverflow);
        }
        let n = Number::new(self.mant, e as i16, self.neg);
        self.mant = 0;
        self.exp = 0;
        self.frac = 0;
        self.neg = false;
        self.exp_neg = false;
        self.stack.pop();
        h.on_number(n)
    }

    /// Deliver decoded key bytes to the handler as a validated `str`.
    fn flush_key<H: Handler>(&mut self, h: &mut H, i: usize) -> Result<(), ParseError> {
        let key_buf = std::mem::take(&mut self.key_buf);
        let r = match std::str::from_utf8(&key_buf) {
            Ok(key) => h.on_key(key),
            Err(_) => Err(self.syntax(i)),
        };
        self.key_buf = key_buf;
        self.key_buf.clear();
        r
    }

    /// Validate a run of unescaped string bytes, holding back a split
    /// multibyte tail until the next chunk completes it.
    fn accept_text<H: Handler>(
        &mut self,
        h: &mut H,
        key: bool,
        mut bytes: &[u8],
        at: usize,
    ) -> Result<(), ParseError> {
        if self.utf8_len != 0 {
            let want = utf8_sequence_len(self.utf8[0]);
            let have = self.utf8_len as usize;
            let take = (want - have).min(bytes.len());
            self.utf8[have..have + take].copy_from_slice(&bytes[..take]);
            self.utf8_len += take as u8;
            bytes = &bytes[take..];
            if (self.utf8_len as usize) < want {
                return Ok(());
            }
            let seq = self.utf8;
            let n = self.utf8_len as usize;
            self.utf8_len = 0;
            if std::str::from_utf8(&seq[..n]).is_err() {
                return Err(self.syntax(at));
            }
            self.emit(h, key, &seq[..n])?;
        }
        match std::str::from_utf8(bytes) {
            Ok(_) => self.emit(h, key, bytes),
            Err(e) if e.error_len().is_some() => Err(self.syntax(at + e.valid_up_to())),
            Err(e) => {
                // the buffer ends inside a well-formed multibyte sequence
                let valid = e.valid_up_to();
                self.emit(h, key, &bytes[..valid])?;
                let tail = &bytes[valid..];
                self.utf8[..tail.len()].copy_from_slice(tail);
                self.utf8_len = tail.len() as u8;
                Ok(())
            }
        }
    }

    /// Finish a `\uXXXX` escape, pairing surrogates when required.
    fn end_escape<H: Handler>(&mut self, h: &mut H, key: bool, i: usize) -> Result<(), ParseError> {
        let cu = self.u_acc as u16;
        if let Some(hi) = self.u_hi.take() {
            if !(0xDC00..=0xDFFF).contains(&cu) {
                return Err(self.syntax(i));
            }
            let c = 0x10000 + (u32::from(hi - 0xD800) << 10) + u32::from(cu - 0xDC00);
            let c = char::from_u32(c).expect("paired surrogates form a scalar");
            self.emit_char(h, key, c)?;
            self.set_top(State::Str { key });
        } else if (0xD800..=0xDBFF).contains(&cu) {
            self.u_hi = Some(cu);
            self.set_top(State::Sur1 { key });
        } else if (0xDC00..=0xDFFF).contains(&cu) {
            // a low surrogate cannot stand alone
            return Err(self.syntax(i));
        } else {
            let c = char::from_u32(u32::from(cu)).expect("non-surrogate code unit");
            self.emit_char(h, key, c)?;
            self.set_top(State::Str { key });
        }
        Ok(())
    }

    fn emit_char<H: Handler>(&mut self, h: &mut H, key: bool, c: char) -> Result<(), ParseError> {
        let mut enc = [0u8; 4];
        let s = c.encode_utf8(&mut enc);
        self.emit(h, key, s.as_bytes())
    }

    fn emit<H: Handler>(&mut self, h: &mut H, key: bool, bytes: &[u8]) -> Result<(), ParseError> {
        if key {
            self.key_buf.extend_from_slice(bytes);
            Ok(())
        } else {
            h.on_string_piece(bytes)
        }
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Scanner::new()
    }
}

/// Total length of the UTF-8 sequence introduced by `b`.
fn utf8_sequence_len(b: u8) -> usize {
    match b {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}
