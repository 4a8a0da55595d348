//! Conversion traits between Rust types and [`Value`]s.
//!
//! - [`Typed`]: the static [`DataType`] of a Rust type
//! - [`IntoValue`]: convert a Rust value into a [`Value`]
//! - [`FromValue`]: extract a Rust value from a [`Value`]
//!
//! ## Supported Types
//!
//! - Integers: `i8`, `i16`, `i32`, `i64`, `u8`, `u16`, `u32`, `u64`
//! - Floats: `f32`, `f64`
//! - `bool`, `String`
//! - Unit: `()` (void)
//! - [`Value`] itself (untyped, `?`)
//! - Any `Clone + Send + Sync + 'static` type via [`native_type!`](crate::native_type)
//!
//! Extraction is exact: an `Int32` value never converts to `i64`.

use crate::error::ConversionError;
use crate::{DataType, Value};

/// A Rust type with a fixed [`DataType`].
pub trait Typed {
    fn data_type() -> DataType;
}

/// Convert a Rust value into a [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Extract a Rust value from a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

macro_rules! impl_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Typed for $ty {
                fn data_type() -> DataType {
                    DataType::$variant
                }
            }

            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, ConversionError> {
                    match value {
                        Value::$variant(v) => Ok(v.clone()),
                        other => Err(ConversionError::TypeMismatch {
                            expected: DataType::$variant.name(),
                            actual: other.type_name(),
                        }),
                    }
                }
            }
        )*
    };
}

impl_primitive! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => String,
}

impl Typed for () {
    fn data_type() -> DataType {
        DataType::Void
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Void
    }
}

impl FromValue for () {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Void => Ok(()),
            other => Err(ConversionError::TypeMismatch {
                expected: "void",
                actual: other.type_name(),
            }),
        }
    }
}

impl Typed for Value {
    fn data_type() -> DataType {
        DataType::Any
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_owned())
    }
}

/// Implement the conversion traits for user types, stored as shared native values.
///
/// The type must be `Clone + Send + Sync + 'static`; extraction clones the
/// payload out of the shared value.
///
/// ```
/// use implementer_core::{native_type, DataType, FromValue, IntoValue, Typed};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Session { user: String }
/// native_type!(Session);
///
/// let value = Session { user: "ada".into() }.into_value();
/// assert_eq!(value.data_type(), Session::data_type());
/// assert_eq!(Session::from_value(&value).unwrap().user, "ada");
/// ```
#[macro_export]
macro_rules! native_type {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Typed for $ty {
                fn data_type() -> $crate::DataType {
                    $crate::DataType::native::<$ty>()
                }
            }

            impl $crate::IntoValue for $ty {
                fn into_value(self) -> $crate::Value {
                    $crate::Value::native(self)
                }
            }

            impl $crate::FromValue for $ty {
                fn from_value(value: &$crate::Value) -> ::std::result::Result<Self, $crate::ConversionError> {
                    value
                        .as_native()
                        .and_then(|native| native.downcast_ref::<$ty>())
                        .cloned()
                        .ok_or_else(|| $crate::ConversionError::TypeMismatch {
                            expected: ::std::any::type_name::<$ty>(),
                            actual: value.type_name(),
                        })
                }
            }
        )+
    };
}
