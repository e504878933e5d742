//! The dynamically typed JSON value.

use std::fmt;

use crate::array::Array;
use crate::error::{Error, Result};
use crate::number::Number;
use crate::object::Object;
use crate::storage::{StoragePtr, default_storage};
use crate::string::Str;

/// The discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Object,
    Array,
    String,
    Signed,
    Unsigned,
    Double,
    Bool,
    Null,
}

enum Rep {
    Object(Object),
    Array(Array),
    String(Str),
    Signed(i64),
    Unsigned(u64),
    Double(f64),
    Bool(bool),
    Null,
}

impl Rep {
    /// The default payload of `kind`, with containers in `sp`.
    fn default_of(kind: Kind, sp: &StoragePtr) -> Rep {
        match kind {
            Kind::Object => Rep::Object(Object::with_storage(sp.clone())),
            Kind::Array => Rep::Array(Array::with_storage(sp.clone())),
            Kind::String => Rep::String(Str::with_storage(sp.clone())),
            Kind::Signed => Rep::Signed(0),
            Kind::Unsigned => Rep::Unsigned(0),
            Kind::Double => Rep::Double(0.0),
            Kind::Bool => Rep::Bool(false),
            Kind::Null => Rep::Null,
        }
    }
}

/// A JSON value of any [`Kind`], tied to a [`StoragePtr`] arena.
///
/// There is no `Clone`; duplication is always the explicit, fallible
/// [`Value::clone_in`], which names the destination storage.
pub struct Value {
    sp: StoragePtr,
    rep: Rep,
}

impl Value {
    /// A null value in the default storage.
    pub fn null() -> Self {
        Value::with_storage(default_storage())
    }

    /// A null value in `sp`.
    pub fn with_storage(sp: StoragePtr) -> Self {
        Value { sp, rep: Rep::Null }
    }

    /// A default-constructed value of `kind` in `sp`.
    ///
    /// Containers come up empty, numbers zero, booleans false.
    pub fn with_kind(kind: Kind, sp: StoragePtr) -> Self {
        let rep = Rep::default_of(kind, &sp);
        Value { sp, rep }
    }

    /// A string value copied into `sp`.
    pub fn from_str_in(s: &str, sp: StoragePtr) -> Result<Self> {
        Ok(Value {
            sp: sp.clone(),
            rep: Rep::String(Str::from_str_in(s, sp)?),
        })
    }

    /// A numeric value in `sp`, choosing the narrowest faithful kind.
    ///
    /// Exact integers land on the signed kind when they fit `i64`, the
    /// unsigned kind when they only fit `u64`, and double otherwise.
    pub fn number(n: Number, sp: StoragePtr) -> Self {
        let rep = if let Some(v) = n.as_i64() {
            Rep::Signed(v)
        } else if let Some(v) = n.as_u64() {
            Rep::Unsigned(v)
        } else {
            Rep::Double(n.as_f64())
        };
        Value { sp, rep }
    }

    /// The storage this value is tied to.
    pub fn storage(&self) -> &StoragePtr {
        match &self.rep {
            Rep::Object(o) => o.storage(),
            Rep::Array(a) => a.storage(),
            Rep::String(s) => s.storage(),
            _ => &self.sp,
        }
    }

    /// The active kind.
    pub fn kind(&self) -> Kind {
        match &self.rep {
            Rep::Object(_) => Kind::Object,
            Rep::Array(_) => Kind::Array,
            Rep::String(_) => Kind::String,
            Rep::Signed(_) => Kind::Signed,
            Rep::Unsigned(_) => Kind::Unsigned,
            Rep::Double(_) => Kind::Double,
            Rep::Bool(_) => Kind::Bool,
            Rep::Null => Kind::Null,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self.rep, Rep::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.rep, Rep::Array(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self.rep, Rep::String(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self.rep,
            Rep::Signed(_) | Rep::Unsigned(_) | Rep::Double(_)
        )
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.rep, Rep::Bool(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.rep, Rep::Null)
    }

    pub fn as_object(&self) -> Option<&Object> {
        match &self.rep {
            Rep::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match &mut self.rep {
            Rep::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match &self.rep {
            Rep::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match &mut self.rep {
            Rep::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.rep {
            Rep::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The value as `i64`, converting an unsigned value that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self.rep {
            Rep::Signed(v) => Some(v),
            Rep::Unsigned(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// The value as `u64`, converting a non-negative signed value.
    pub fn as_u64(&self) -> Option<u64> {
        match self.rep {
            Rep::Unsigned(v) => Some(v),
            Rep::Signed(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// The value as `f64`, converting any numeric kind.
    pub fn as_f64(&self) -> Option<f64> {
        match self.rep {
            Rep::Double(v) => Some(v),
            Rep::Signed(v) => Some(v as f64),
            Rep::Unsigned(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.rep {
            Rep::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// The value as an exact decimal [`Number`], for any numeric kind.
    pub fn to_number(&self) -> Option<Number> {
        match self.rep {
            Rep::Signed(v) => Some(Number::from(v)),
            Rep::Unsigned(v) => Some(Number::from(v)),
            Rep::Double(v) => Some(Number::from(v)),
            _ => None,
        }
    }

    pub fn try_object(&self) -> Result<&Object> {
        self.as_object().ok_or(Error::ExpectedObject)
    }

    pub fn try_object_mut(&mut self) -> Result<&mut Object> {
        self.as_object_mut().ok_or(Error::ExpectedObject)
    }

    pub fn try_array(&self) -> Result<&Array> {
        self.as_array().ok_or(Error::ExpectedArray)
    }

    pub fn try_array_mut(&mut self) -> Result<&mut Array> {
        self.as_array_mut().ok_or(Error::ExpectedArray)
    }

    pub fn try_str(&self) -> Result<&str> {
        self.as_str().ok_or(Error::ExpectedString)
    }

    pub fn try_i64(&self) -> Result<i64> {
        match self.rep {
            Rep::Signed(v) => Ok(v),
            Rep::Unsigned(v) => i64::try_from(v).map_err(|_| Error::IntegerOverflow),
            _ => Err(Error::ExpectedSigned),
        }
    }

    pub fn try_u64(&self) -> Result<u64> {
        match self.rep {
            Rep::Unsigned(v) => Ok(v),
            Rep::Signed(v) => u64::try_from(v).map_err(|_| Error::IntegerOverflow),
            _ => Err(Error::ExpectedUnsigned),
        }
    }

    pub fn try_f64(&self) -> Result<f64> {
        self.as_f64().ok_or(Error::ExpectedNumber)
    }

    pub fn try_bool(&self) -> Result<bool> {
        self.as_bool().ok_or(Error::ExpectedBool)
    }

    /// Take the object payload, consuming the value.
    pub fn into_object(self) -> Option<Object> {
        match self.rep {
            Rep::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Take the array payload, consuming the value.
    pub fn into_array(self) -> Option<Array> {
        match self.rep {
            Rep::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Take the string payload, consuming the value.
    pub fn into_string(self) -> Option<Str> {
        match self.rep {
            Rep::String(s) => Some(s),
            _ => None,
        }
    }

    /// Replace the contents with a default-constructed value of `kind`,
    /// keeping the storage.
    pub fn reset(&mut self, kind: Kind) {
        self.rep = Rep::default_of(kind, &self.sp);
    }

    /// Replace the contents with an empty object in this value's storage.
    pub fn emplace_object(&mut self) -> &mut Object {
        self.rep = Rep::Object(Object::with_storage(self.sp.clone()));
        match &mut self.rep {
            Rep::Object(o) => o,
            _ => unreachable!(),
        }
    }

    /// Replace the contents with an empty array in this value's storage.
    pub fn emplace_array(&mut self) -> &mut Array {
        self.rep = Rep::Array(Array::with_storage(self.sp.clone()));
        match &mut self.rep {
            Rep::Array(a) => a,
            _ => unreachable!(),
        }
    }

    /// Replace the contents with an empty string in this value's storage.
    pub fn emplace_string(&mut self) -> &mut Str {
        self.rep = Rep::String(Str::with_storage(self.sp.clone()));
        match &mut self.rep {
            Rep::String(s) => s,
            _ => unreachable!(),
        }
    }

    /// Deep-copy this value and everything it owns into `sp`.
    pub fn clone_in(&self, sp: StoragePtr) -> Result<Self> {
        let rep = match &self.rep {
            Rep::Object(o) => Rep::Object(o.clone_in(sp.clone())?),
            Rep::Array(a) => Rep::Array(a.clone_in(sp.clone())?),
            Rep::String(s) => Rep::String(s.clone_in(sp.clone())?),
            Rep::Signed(v) => Rep::Signed(*v),
            Rep::Unsigned(v) => Rep::Unsigned(*v),
            Rep::Double(v) => Rep::Double(*v),
            Rep::Bool(v) => Rep::Bool(*v),
            Rep::Null => Rep::Null,
        };
        Ok(Value { sp, rep })
    }

    /// Move this value into `sp`: a no-op when the storages match, a deep
    /// copy otherwise.
    pub fn into_storage(self, sp: StoragePtr) -> Result<Self> {
        if StoragePtr::same(self.storage(), &sp) {
            Ok(self)
        } else {
            self.clone_in(sp)
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::null()
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value {
            sp: o.storage().clone(),
            rep: Rep::Object(o),
        }
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value {
            sp: a.storage().clone(),
            rep: Rep::Array(a),
        }
    }
}

impl From<Str> for Value {
    fn from(s: Str) -> Self {
        Value {
            sp: s.storage().clone(),
            rep: Rep::String(s),
        }
    }
}

impl From<&str> for Value {
    /// Copies into the default storage.
    ///
    /// # Panics
    ///
    /// Panics when the default storage cannot allocate. Fallible
    /// construction goes through [`Value::from_str_in`].
    fn from(s: &str) -> Self {
        Value::from_str_in(s, default_storage()).expect("default storage allocation")
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value {
            sp: default_storage(),
            rep: Rep::Bool(v),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value {
            sp: default_storage(),
            rep: Rep::Double(v),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::from(f64::from(v))
    }
}

macro_rules! value_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value {
                    sp: default_storage(),
                    rep: Rep::Signed(i64::from(v)),
                }
            }
        })*
    };
}

macro_rules! value_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value {
                    sp: default_storage(),
                    rep: Rep::Unsigned(u64::from(v)),
                }
            }
        })*
    };
}

value_from_signed!(i8, i16, i32, i64);
value_from_unsigned!(u8, u16, u32, u64);

impl PartialEq for Value {
    /// Structural equality. Signed and unsigned integers compare by
    /// numeric value; objects compare independent of key order.
    fn eq(&self, other: &Self) -> bool {
        match (&self.rep, &other.rep) {
            (Rep::Object(a), Rep::Object(b)) => a == b,
            (Rep::Array(a), Rep::Array(b)) => a == b,
            (Rep::String(a), Rep::String(b)) => a == b,
            (Rep::Signed(a), Rep::Signed(b)) => a == b,
            (Rep::Unsigned(a), Rep::Unsigned(b)) => a == b,
            (Rep::Signed(a), Rep::Unsigned(b)) | (Rep::Unsigned(b), Rep::Signed(a)) => {
                u64::try_from(*a).is_ok_and(|a| a == *b)
            }
            (Rep::Double(a), Rep::Double(b)) => a == b,
            (Rep::Bool(a), Rep::Bool(b)) => a == b,
            (Rep::Null, Rep::Null) => true,
            _ => false,
        }
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            '\u{08}' => f.write_str("\\b")?,
            '\u{0c}' => f.write_str("\\f")?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Value {
    /// Compact JSON with object keys in insertion order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rep {
            Rep::Object(o) => {
                f.write_str("{")?;
                for (i, (k, v)) in o.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_escaped(f, k)?;
                    f.write_str(":")?;
                    fmt::Display::fmt(v, f)?;
                }
                f.write_str("}")
            }
            Rep::Array(a) => {
                f.write_str("[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    fmt::Display::fmt(v, f)?;
                }
                f.write_str("]")
            }
            Rep::String(s) => write_escaped(f, s.as_str()),
            Rep::Signed(v) => write!(f, "{v}"),
            Rep::Unsigned(v) => write!(f, "{v}"),
            Rep::Double(v) if v.is_finite() => write!(f, "{v:?}"),
            // JSON has no lexeme for NaN or infinity
            Rep::Double(_) => f.write_str("null"),
            Rep::Bool(v) => write!(f, "{v}"),
            Rep::Null => f.write_str("null"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rep {
            Rep::Object(o) => fmt::Debug::fmt(o, f),
            Rep::Array(a) => fmt::Debug::fmt(a, f),
            Rep::String(s) => fmt::Debug::fmt(s, f),
            Rep::Signed(v) => write!(f, "{v}i64"),
            Rep::Unsigned(v) => write!(f, "{v}u64"),
            Rep::Double(v) => fmt::Debug::fmt(v, f),
            Rep::Bool(v) => fmt::Debug::fmt(v, f),
            Rep::Null => f.write_str("null"),
        }
    }
}
