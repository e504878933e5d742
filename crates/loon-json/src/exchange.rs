//! Conversion between native types and [`Value`].
//!
//! Implement [`ToValue`] and [`FromValue`] to carry application types across
//! the JSON boundary. Integer extraction is range checked; a value that does
//! not fit the requested width fails with [`Error::IntegerOverflow`] instead
//! of truncating.

use crate::array::Array;
use crate::error::{Error, Result};
use crate::storage::StoragePtr;
use crate::value::Value;

/// Conversion into a [`Value`] allocated from `sp`.
pub trait ToValue {
    fn to_value(&self, sp: StoragePtr) -> Result<Value>;
}

/// Conversion out of a borrowed [`Value`].
pub trait FromValue: Sized {
    fn from_value(v: &Value) -> Result<Self>;
}

impl ToValue for Value {
    fn to_value(&self, sp: StoragePtr) -> Result<Value> {
        self.clone_in(sp)
    }
}

impl ToValue for bool {
    fn to_value(&self, sp: StoragePtr) -> Result<Value> {
        Value::from(*self).into_storage(sp)
    }
}

impl FromValue for bool {
    fn from_value(v: &Value) -> Result<Self> {
        v.try_bool()
    }
}

impl ToValue for str {
    fn to_value(&self, sp: StoragePtr) -> Result<Value> {
        Value::from_str_in(self, sp)
    }
}

impl ToValue for &str {
    fn to_value(&self, sp: StoragePtr) -> Result<Value> {
        Value::from_str_in(self, sp)
    }
}

impl ToValue for String {
    fn to_value(&self, sp: StoragePtr) -> Result<Value> {
        Value::from_str_in(self, sp)
    }
}

impl FromValue for String {
    fn from_value(v: &Value) -> Result<Self> {
        v.try_str().map(str::to_owned)
    }
}

impl ToValue for f64 {
    fn to_value(&self, sp: StoragePtr) -> Result<Value> {
        Value::from(*self).into_storage(sp)
    }
}

impl FromValue for f64 {
    fn from_value(v: &Value) -> Result<Self> {
        v.try_f64()
    }
}

impl ToValue for f32 {
    fn to_value(&self, sp: StoragePtr) -> Result<Value> {
        Value::from(*self).into_storage(sp)
    }
}

impl FromValue for f32 {
    fn from_value(v: &Value) -> Result<Self> {
        v.try_f64().map(|d| d as f32)
    }
}

macro_rules! exchange_signed {
    ($($t:ty),*) => {
        $(
            impl ToValue for $t {
                fn to_value(&self, sp: StoragePtr) -> Result<Value> {
                    Value::from(*self).into_storage(sp)
                }
            }

            impl FromValue for $t {
                fn from_value(v: &Value) -> Result<Self> {
                    let wide = v.try_i64()?;
                    <$t>::try_from(wide).map_err(|_| Error::IntegerOverflow)
                }
            }
        )*
    };
}

macro_rules! exchange_unsigned {
    ($($t:ty),*) => {
        $(
            impl ToValue for $t {
                fn to_value(&self, sp: StoragePtr) -> Result<Value> {
                    Value::from(*self).into_storage(sp)
                }
            }

            impl FromValue for $t {
                fn from_value(v: &Value) -> Result<Self> {
                    let wide = v.try_u64()?;
                    <$t>::try_from(wide).map_err(|_| Error::IntegerOverflow)
                }
            }
        )*
    };
}

exchange_signed!(i8, i16, i32, i64);
exchange_unsigned!(u8, u16, u32, u64);

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self, sp: StoragePtr) -> Result<Value> {
        match self {
            Some(inner) => inner.to_value(sp),
            None => Ok(Value::with_storage(sp)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(v: &Value) -> Result<Self> {
        if v.is_null() {
            Ok(None)
        } else {
            T::from_value(v).map(Some)
        }
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self, sp: StoragePtr) -> Result<Value> {
        let mut arr = Array::with_capacity(self.len(), sp.clone())?;
        for item in self {
            arr.push(item.to_value(sp.clone())?)?;
        }
        Ok(Value::from(arr))
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self, sp: StoragePtr) -> Result<Value> {
        self.as_slice().to_value(sp)
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(v: &Value) -> Result<Self> {
        let arr = v.try_array()?;
        let mut out = Vec::with_capacity(arr.len());
        for item in arr {
            out.push(T::from_value(item)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::default_storage;

    fn round_trip<T: ToValue + FromValue + PartialEq + std::fmt::Debug>(v: T) {
        let jv = v.to_value(default_storage()).unwrap();
        assert_eq!(T::from_value(&jv).unwrap(), v);
    }

    #[test]
    fn test_primitive_round_trips() {
        round_trip(true);
        round_trip(-42i32);
        round_trip(u64::MAX);
        round_trip(2.5f64);
        round_trip(String::from("lounge"));
        round_trip(Some(7u8));
        round_trip(None::<String>);
        round_trip(vec![1i64, 2, 3]);
    }

    #[test]
    fn test_integer_extraction_is_range_checked() {
        let jv = 300i64.to_value(default_storage()).unwrap();
        assert_eq!(u8::from_value(&jv), Err(Error::IntegerOverflow));
        assert_eq!(i16::from_value(&jv), Ok(300));

        let jv = (-1i64).to_value(default_storage()).unwrap();
        assert_eq!(u32::from_value(&jv), Err(Error::IntegerOverflow));
    }

    #[test]
    fn test_signedness_crosses_when_in_range() {
        let jv = Value::from(7u64);
        assert_eq!(i8::from_value(&jv), Ok(7));
        let jv = Value::from(i64::MAX);
        assert_eq!(u64::from_value(&jv), Ok(i64::MAX as u64));
    }

    #[test]
    fn test_kind_mismatch_is_typed() {
        let jv = Value::from("nope");
        assert_eq!(i32::from_value(&jv), Err(Error::ExpectedSigned));
        assert_eq!(u32::from_value(&jv), Err(Error::ExpectedUnsigned));
        assert_eq!(bool::from_value(&jv), Err(Error::ExpectedBool));
        assert_eq!(Vec::<i64>::from_value(&jv), Err(Error::ExpectedArray));
    }

    #[test]
    fn test_option_maps_null() {
        let null = Value::null();
        assert_eq!(Option::<i64>::from_value(&null).unwrap(), None);
        let sp = default_storage();
        let jv = None::<i64>.to_value(sp).unwrap();
        assert!(jv.is_null());
    }

    #[test]
    fn test_nested_sequences() {
        let data = vec![vec![1u32, 2], vec![], vec![3]];
        let jv = data.to_value(default_storage()).unwrap();
        assert_eq!(Vec::<Vec<u32>>::from_value(&jv).unwrap(), data);
    }
}
