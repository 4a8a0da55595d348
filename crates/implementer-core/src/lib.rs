//! Core data model for runtime interface implementation.
//!
//! This crate holds everything the synthesis engine and macro-generated code
//! share: type identity ([`TypeHash`]), static types ([`DataType`]), runtime
//! values ([`Value`]) and their conversions, and the descriptors of the
//! types being implemented ([`TargetType`]).

mod convert;
mod data_type;
pub mod decl;
mod error;
mod native_fn;
mod target;
mod type_hash;
mod value;

pub use convert::{FromValue, IntoValue, Typed};
pub use data_type::DataType;
pub use decl::DATA_KEY;
pub use error::{ConversionError, DeclarationError};
pub use native_fn::NativeFn;
pub use target::{
    BaseTarget, MemberDef, MemberId, MemberKind, Param, PropertyDef, PropertyId, TargetBuilder,
    TargetKind, TargetType,
};
pub use type_hash::{TypeHash, hash_constants};
pub use value::{NativeValue, Value};
