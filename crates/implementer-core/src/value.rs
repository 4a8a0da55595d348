//! Runtime value crossing a member boundary.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::DataType;
use crate::error::ConversionError;

/// A dynamically typed value.
///
/// Each primitive keeps its exact width so a value always reports the
/// [`DataType`] it was created with. Native values are shared: cloning a
/// `Value::Native` clones the `Arc`, not the payload.
#[derive(Clone)]
pub enum Value {
    /// No value
    Void,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    /// Shared native value with its declared type
    Native(NativeValue),
}

/// A shared, type-erased Rust value.
#[derive(Clone)]
pub struct NativeValue {
    data_type: DataType,
    inner: Arc<dyn Any + Send + Sync>,
}

impl NativeValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            data_type: DataType::native::<T>(),
            inner: Arc::new(value),
        }
    }

    /// Wrap an already shared value without cloning it.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            data_type: DataType::native::<T>(),
            inner: value,
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Get the shared handle to the payload.
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    pub fn is<T: Any>(&self) -> bool {
        (*self.inner).type_id() == TypeId::of::<T>()
    }

    /// Whether both values share the same payload.
    pub fn ptr_eq(&self, other: &NativeValue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native({})", self.data_type.name())
    }
}

impl Value {
    /// Wrap any Rust value as a shared native value.
    pub fn native<T: Any + Send + Sync>(value: T) -> Self {
        Value::Native(NativeValue::new(value))
    }

    /// The exact type of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Void => DataType::Void,
            Value::Bool(_) => DataType::Bool,
            Value::Int8(_) => DataType::Int8,
            Value::Int16(_) => DataType::Int16,
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::UInt8(_) => DataType::UInt8,
            Value::UInt16(_) => DataType::UInt16,
            Value::UInt32(_) => DataType::UInt32,
            Value::UInt64(_) => DataType::UInt64,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::String(_) => DataType::String,
            Value::Native(native) => native.data_type(),
        }
    }

    /// Get a human-readable name for this value's type.
    pub fn type_name(&self) -> &'static str {
        self.data_type().name()
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_native(&self) -> Option<&NativeValue> {
        match self {
            Value::Native(native) => Some(native),
            _ => None,
        }
    }

    /// Check this value against a declared type.
    ///
    /// The value passes through unchanged when the declared type accepts it;
    /// nothing is widened or truncated.
    pub fn coerce_to(self, expected: DataType) -> Result<Value, ConversionError> {
        if expected.accepts(self.data_type()) {
            Ok(self)
        } else {
            Err(ConversionError::TypeMismatch {
                expected: expected.name(),
                actual: self.type_name(),
            })
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "Void"),
            Value::Bool(v) => write!(f, "Bool({})", v),
            Value::Int8(v) => write!(f, "Int8({})", v),
            Value::Int16(v) => write!(f, "Int16({})", v),
            Value::Int32(v) => write!(f, "Int32({})", v),
            Value::Int64(v) => write!(f, "Int64({})", v),
            Value::UInt8(v) => write!(f, "UInt8({})", v),
            Value::UInt16(v) => write!(f, "UInt16({})", v),
            Value::UInt32(v) => write!(f, "UInt32({})", v),
            Value::UInt64(v) => write!(f, "UInt64({})", v),
            Value::Float(v) => write!(f, "Float({})", v),
            Value::Double(v) => write!(f, "Double({})", v),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Native(native) => write!(f, "{:?}", native),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int8(a), Value::Int8(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt8(a), Value::UInt8(b)) => a == b,
            (Value::UInt16(a), Value::UInt16(b)) => a == b,
            (Value::UInt32(a), Value::UInt32(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            // Native payloads are opaque; equal only when shared.
            (Value::Native(a), Value::Native(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}
