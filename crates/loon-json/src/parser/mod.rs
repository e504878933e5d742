//! Incremental parser producing a [`Value`] tree.

mod scanner;

pub use scanner::{Handler, Scanner};

use tracing::trace;

use crate::array::Array;
use crate::error::ParseError;
use crate::number::Number;
use crate::object::Object;
use crate::storage::{StoragePtr, default_storage};
use crate::value::Value;

/// Nesting limit applied when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 64;

enum Frame {
    Object { obj: Object, key: Option<String> },
    Array(Array),
}

/// [`Handler`] that assembles scan events into a value tree.
struct TreeBuilder {
    sp: StoragePtr,
    frames: Vec<Frame>,
    scratch: Vec<u8>,
    doc: Option<Value>,
    complete: bool,
    max_depth: usize,
}

impl TreeBuilder {
    fn new(sp: StoragePtr) -> Self {
        TreeBuilder {
            sp,
            frames: Vec::new(),
            scratch: Vec::new(),
            doc: None,
            complete: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    fn reset(&mut self) {
        self.frames.clear();
        self.scratch.clear();
        self.doc = None;
        self.complete = false;
    }

    /// Attach a finished value to the innermost open container, or make it
    /// the document when none is open.
    fn assign(&mut self, v: Value) -> Result<(), ParseError> {
        match self.frames.last_mut() {
            Some(Frame::Object { obj, key }) => {
                let key = key.take().expect("key event precedes value");
                // first occurrence of a duplicate key wins
                obj.insert(&key, v)?;
            }
            Some(Frame::Array(arr)) => arr.push(v)?,
            None => self.doc = Some(v),
        }
        Ok(())
    }

    fn check_depth(&self) -> Result<(), ParseError> {
        if self.frames.len() >= self.max_depth {
            return Err(ParseError::TooDeep);
        }
        Ok(())
    }
}

impl Handler for TreeBuilder {
    fn on_document_begin(&mut self) -> Result<(), ParseError> {
        self.doc = None;
        self.complete = false;
        Ok(())
    }

    fn on_document_end(&mut self) -> Result<(), ParseError> {
        self.complete = true;
        Ok(())
    }

    fn on_object_begin(&mut self) -> Result<(), ParseError> {
        self.check_depth()?;
        self.frames.push(Frame::Object {
            obj: Object::with_storage(self.sp.clone()),
            key: None,
        });
        Ok(())
    }

    fn on_object_end(&mut self) -> Result<(), ParseError> {
        match self.frames.pop() {
            Some(Frame::Object { obj, .. }) => self.assign(Value::from(obj)),
            _ => unreachable!("object end matches object begin"),
        }
    }

    fn on_key(&mut self, key: &str) -> Result<(), ParseError> {
        match self.frames.last_mut() {
            Some(Frame::Object { key: slot, .. }) => {
                *slot = Some(key.to_owned());
                Ok(())
            }
            _ => unreachable!("keys only occur inside objects"),
        }
    }

    fn on_array_begin(&mut self) -> Result<(), ParseError> {
        self.check_depth()?;
        self.frames
            .push(Frame::Array(Array::with_storage(self.sp.clone())));
        Ok(())
    }

    fn on_array_end(&mut self) -> Result<(), ParseError> {
        match self.frames.pop() {
            Some(Frame::Array(arr)) => self.assign(Value::from(arr)),
            _ => unreachable!("array end matches array begin"),
        }
    }

    fn on_string_begin(&mut self) -> Result<(), ParseError> {
        self.scratch.clear();
        Ok(())
    }

    fn on_string_piece(&mut self, piece: &[u8]) -> Result<(), ParseError> {
        self.scratch.extend_from_slice(piece);
        Ok(())
    }

    fn on_string_end(&mut self) -> Result<(), ParseError> {
        let s = std::str::from_utf8(&self.scratch).expect("scanner validates string bytes");
        let v = Value::from_str_in(s, self.sp.clone())?;
        self.scratch.clear();
        self.assign(v)
    }

    fn on_number(&mut self, n: Number) -> Result<(), ParseError> {
        self.assign(Value::number(n, self.sp.clone()))
    }

    fn on_bool(&mut self, b: bool) -> Result<(), ParseError> {
        self.assign(Value::from(b).into_storage(self.sp.clone())?)
    }

    fn on_null(&mut self) -> Result<(), ParseError> {
        self.assign(Value::with_storage(self.sp.clone()))
    }
}

/// Incremental JSON parser.
///
/// Feed input with [`Parser::write_some`] or [`Parser::write`] in chunks of
/// any size, then call [`Parser::write_eof`] when the stream ends. A parser
/// is reusable: [`Parser::release`] hands over the finished document and
/// prepares for the next one, which makes back-to-back documents on one
/// connection cheap.
pub struct Parser {
    scanner: Scanner,
    builder: TreeBuilder,
}

impl Parser {
    /// A parser building values in the default storage.
    pub fn new() -> Self {
        Parser::with_storage(default_storage())
    }

    /// A parser building values in `sp`.
    pub fn with_storage(sp: StoragePtr) -> Self {
        Parser {
            scanner: Scanner::new(),
            builder: TreeBuilder::new(sp),
        }
    }

    /// The configured nesting limit.
    pub fn max_depth(&self) -> usize {
        self.builder.max_depth
    }

    /// Set the nesting limit. Takes effect for structure opened afterward.
    pub fn set_max_depth(&mut self, depth: usize) {
        self.builder.max_depth = depth;
    }

    /// Whether a complete document is ready for [`Parser::release`].
    pub fn is_done(&self) -> bool {
        self.scanner.is_done()
    }

    /// Consume input, stopping after a complete document.
    ///
    /// Returns the number of bytes consumed; bytes past the end of the
    /// document are left for the caller, typically the start of the next
    /// document on the same stream.
    pub fn write_some(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        self.scanner.write_some(&mut self.builder, data)
    }

    /// Consume input that must belong entirely to the current document.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, ParseError> {
        self.scanner.write(&mut self.builder, data)
    }

    /// Signal end of input.
    pub fn write_eof(&mut self) -> Result<(), ParseError> {
        self.scanner.write_eof(&mut self.builder)?;
        trace!(consumed = self.scanner.consumed(), "document complete");
        Ok(())
    }

    /// Borrow the completed document, if any.
    pub fn get(&self) -> Option<&Value> {
        if self.builder.complete {
            self.builder.doc.as_ref()
        } else {
            None
        }
    }

    /// Take the completed document and reset for the next one.
    pub fn release(&mut self) -> Option<Value> {
        if !self.builder.complete {
            return None;
        }
        let doc = self.builder.doc.take();
        self.scanner.reset();
        self.builder.reset();
        doc
    }
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new()
    }
}

/// Parse one complete document from `data` into the default storage.
pub fn parse(data: &[u8]) -> Result<Value, ParseError> {
    parse_with_storage(data, default_storage())
}

/// Parse one complete document from `text` into the default storage.
pub fn parse_str(text: &str) -> Result<Value, ParseError> {
    parse(text.as_bytes())
}

/// Parse one complete document from `data` into `sp`.
pub fn parse_with_storage(data: &[u8], sp: StoragePtr) -> Result<Value, ParseError> {
    let mut p = Parser::with_storage(sp);
    p.write(data)?;
    p.write_eof()?;
    Ok(p.release().expect("document complete after eof"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Kind;

    #[test]
    fn test_parse_builds_tree() {
        let v = parse_str(r#"{"name":"lounge","users":[{"id":1},{"id":2}],"open":true}"#).unwrap();
        let o = v.as_object().unwrap();
        assert_eq!(o.get("name").unwrap().as_str(), Some("lounge"));
        assert_eq!(o.get("open").unwrap().as_bool(), Some(true));
        let users = o.get("users").unwrap().as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(
            users[1].as_object().unwrap().get("id").unwrap().as_i64(),
            Some(2)
        );
    }

    #[test]
    fn test_number_kinds_from_text() {
        let v = parse_str(r#"[1,-1,18446744073709551615,0.5,1e3]"#).unwrap();
        let a = v.as_array().unwrap();
        assert_eq!(a[0].kind(), Kind::Signed);
        assert_eq!(a[1].kind(), Kind::Signed);
        assert_eq!(a[2].kind(), Kind::Unsigned);
        assert_eq!(a[2].as_u64(), Some(u64::MAX));
        assert_eq!(a[3].kind(), Kind::Double);
        assert_eq!(a[3].as_f64(), Some(0.5));
        assert_eq!(a[4].kind(), Kind::Double);
        assert_eq!(a[4].as_f64(), Some(1000.0));
    }

    #[test]
    fn test_duplicate_keys_keep_first() {
        let v = parse_str(r#"{"k":1,"k":2}"#).unwrap();
        let o = v.as_object().unwrap();
        assert_eq!(o.len(), 1);
        assert_eq!(o.get("k").unwrap().as_i64(), Some(1));
    }

    #[test]
    fn test_object_preserves_document_order() {
        let v = parse_str(r#"{"z":1,"a":2,"m":3}"#).unwrap();
        let keys: Vec<&str> = v.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_depth_limit() {
        let mut p = Parser::new();
        p.set_max_depth(3);
        assert_eq!(p.write(b"[[[[").unwrap_err(), ParseError::TooDeep);

        let mut p = Parser::new();
        p.set_max_depth(3);
        p.write(b"[[[]]]").unwrap();
        p.write_eof().unwrap();
        assert!(p.release().is_some());
    }

    #[test]
    fn test_streaming_across_chunks() {
        let text = r#"{"a":[1,2,3],"b":"split right here"}"#;
        let mut p = Parser::new();
        for chunk in text.as_bytes().chunks(5) {
            p.write(chunk).unwrap();
        }
        p.write_eof().unwrap();
        assert_eq!(p.release().unwrap(), parse_str(text).unwrap());
    }

    #[test]
    fn test_release_supports_back_to_back_documents() {
        let mut p = Parser::new();
        let stream = b"{\"n\":1} {\"n\":2}";
        let n = p.write_some(stream).unwrap();
        p.write_eof().unwrap();
        let first = p.release().unwrap();
        assert_eq!(first.as_object().unwrap().get("n").unwrap().as_i64(), Some(1));

        let rest = &stream[n..];
        p.write_some(rest).unwrap();
        p.write_eof().unwrap();
        let second = p.release().unwrap();
        assert_eq!(second.as_object().unwrap().get("n").unwrap().as_i64(), Some(2));
    }

    #[test]
    fn test_get_borrows_without_consuming() {
        let mut p = Parser::new();
        assert!(p.get().is_none());
        p.write(b"[true]").unwrap();
        p.write_eof().unwrap();
        assert!(p.get().is_some());
        assert!(p.release().is_some());
        assert!(p.get().is_none());
    }

    #[test]
    fn test_values_land_in_requested_storage() {
        use crate::storage::{BoundedStorage, StoragePtr};
        let sp = StoragePtr::new(BoundedStorage::new(1 << 16));
        let v = parse_with_storage(br#"{"k":"v"}"#, sp.clone()).unwrap();
        assert!(StoragePtr::same(v.storage(), &sp));
    }

    #[test]
    fn test_allocation_failure_surfaces_as_parse_error() {
        use crate::storage::{BoundedStorage, StoragePtr};
        let sp = StoragePtr::new(BoundedStorage::new(64));
        let text = br#"{"key":"a rather long string that cannot fit in the arena"}"#;
        assert_eq!(
            parse_with_storage(text, sp).unwrap_err(),
            ParseError::OutOfMemory
        );
    }
}
