//! DataType - the static type of a parameter, return value, property, or data slot.
//!
//! Every member of a target declares its types up front; bindings are checked
//! against these when they are registered, never when they are invoked.
//!
//! # Example
//!
//! ```
//! use implementer_core::DataType;
//!
//! assert_eq!(DataType::from_name("int"), Some(DataType::Int32));
//! assert_eq!(DataType::Int32.name(), "int");
//! assert!(DataType::Any.accepts(DataType::String));
//! assert!(!DataType::Int32.accepts(DataType::Int64));
//! ```

use std::any::TypeId;
use std::fmt::{self, Display, Formatter};

use crate::TypeHash;

/// Static type of a value crossing a member boundary.
///
/// Integer and float widths are distinct: an `int` member never accepts an
/// `int64` value and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// No value
    Void,
    Bool,
    Int8,
    Int16,
    /// `int`
    Int32,
    Int64,
    UInt8,
    UInt16,
    /// `uint`
    UInt32,
    UInt64,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    String,
    /// An arbitrary Rust type stored by shared reference.
    Native {
        /// Declared name (the Rust type name unless registered under an alias)
        name: &'static str,
        /// Rust type identity
        type_id: TypeId,
    },
    /// Untyped (`?`): accepts any value, checked at call time.
    Any,
}

impl DataType {
    /// The native data type for `T`, named after the Rust type.
    pub fn native<T: 'static>() -> Self {
        DataType::Native {
            name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Look up a primitive by its declaration name.
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "void" => DataType::Void,
            "bool" => DataType::Bool,
            "int8" => DataType::Int8,
            "int16" => DataType::Int16,
            "int" | "int32" => DataType::Int32,
            "int64" => DataType::Int64,
            "uint8" => DataType::UInt8,
            "uint16" => DataType::UInt16,
            "uint" | "uint32" => DataType::UInt32,
            "uint64" => DataType::UInt64,
            "float" => DataType::Float,
            "double" => DataType::Double,
            "string" => DataType::String,
            "?" => DataType::Any,
            _ => return None,
        };
        Some(ty)
    }

    /// Declaration name of this type.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Void => "void",
            DataType::Bool => "bool",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int",
            DataType::Int64 => "int64",
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint",
            DataType::UInt64 => "uint64",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::String => "string",
            DataType::Native { name, .. } => name,
            DataType::Any => "?",
        }
    }

    /// Hash of this type, used when hashing member signatures.
    pub fn type_hash(&self) -> TypeHash {
        match self {
            // Aliases of the same Rust type must hash identically.
            DataType::Native { type_id, .. } => {
                TypeHash::from_name(&format!("{:?}", type_id))
            }
            other => TypeHash::from_name(other.name()),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, DataType::Void)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, DataType::Any)
    }

    /// Whether a value of type `other` may flow into a slot declared as `self`.
    ///
    /// Only exact matches are accepted, except that `Any` accepts everything
    /// but `Void`.
    pub fn accepts(&self, other: DataType) -> bool {
        match (self, other) {
            (DataType::Any, DataType::Void) => false,
            (DataType::Any, _) => true,
            (DataType::Native { type_id: a, .. }, DataType::Native { type_id: b, .. }) => *a == b,
            (a, b) => *a == b,
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
