//! Runtime implementation of interfaces and classes from per-member callbacks.
//!
//! An [`Implementer`] session wires each member of a target (a method, or a
//! property getter or setter) to a constant or a callback, then finishes
//! into a live [`Instance`]. Unbound void members do nothing; unbound
//! non-void members are unavailable unless the target is a class with a
//! base body for them.
//!
//! Targets are described at run time with [`TargetType`] builders, or at
//! compile time from a trait with [`#[implementer::target]`](macro@target),
//! in which case the instance implements the trait itself.
//!
//! # Example
//!
//! ```
//! use implementer::{Implementer, TargetType, Value};
//!
//! let target = TargetType::interface("ICalculator")
//!     .method("int add(int a, int b)")?
//!     .method("void reset()")?
//!     .build();
//!
//! let mut implementer = Implementer::new(target);
//! implementer
//!     .member("add")?
//!     .callback_with_params(|p| Ok(p.get_as::<i32>("a")? + p.get_as::<i32>("b")?))?;
//!
//! let calculator = implementer.finish()?;
//! assert_eq!(calculator.call::<i32>("add", &[Value::Int32(2), Value::Int32(3)])?, 5);
//! assert_eq!(calculator.invoke("reset", &[])?, Value::Void);
//!
//! let copy = calculator.copy();
//! assert_eq!(copy.call::<i32>("add", &[Value::Int32(1), Value::Int32(1)])?, 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! - [`Implementer`] / [`MemberBuilder`] - registration and finishing
//! - [`Binding`] - constant and callback behaviors
//! - [`CapturedStateTable`] - per-instance slot layout
//! - [`SynthesizedType`] / [`Instance`] - the produced type and dispatch
//! - [`copy`] / [`copy_with_data`] - instance copying through a per-type plan
//! - [`get_data`] / [`set_data`] - custom-data access

mod binding;
mod copier;
mod data;
mod error;
mod implementer;
mod options;
mod params;
mod state;
mod synthesized;

pub use binding::{Behavior, Binding, BindingKind};
pub use copier::{CopyPlan, SlotCopy, copy, copy_with_data};
pub use data::{get_data, set_data};
pub use error::{ImplementError, InstanceError, InvokeError};
pub use implementer::{Implementable, Implementer, MemberBuilder};
pub use options::{ImplementerOptions, LookupMode, RebindPolicy};
pub use params::Params;
pub use state::{BindOutcome, CUSTOM_DATA_SLOT, CapturedStateTable, SlotDecl, SlotKind, SlotValue};
pub use synthesized::{Instance, SynthesizedType, TYPE_NAME_PREFIX};

pub use implementer_core::{
    BaseTarget, ConversionError, DATA_KEY, DataType, DeclarationError, FromValue, IntoValue,
    MemberDef, MemberId, MemberKind, NativeFn, NativeValue, Param, PropertyDef, PropertyId,
    TargetBuilder, TargetKind, TargetType, TypeHash, Typed, Value, native_type,
};
pub use implementer_macros::target;

/// Support code for `#[implementer::target]` expansions.
#[doc(hidden)]
pub mod __private {
    pub use std::sync::{Arc, OnceLock};

    use crate::{FromValue, Implementable, Instance, InvokeError, MemberId, Value};

    /// Dispatch a trait method to one of `T`'s own members.
    ///
    /// `member` counts from the first of the `own` members `T` declares
    /// itself, which follow any inherited ones. An instance of a target
    /// inheriting `T` dispatches through that target's id mapping.
    ///
    /// Trait methods cannot return errors; failures unwind with the
    /// [`InvokeError`] as the payload.
    pub fn dispatch<T, R>(instance: &Instance, own: usize, member: usize, args: &[Value]) -> R
    where
        T: Implementable + ?Sized,
        R: FromValue,
    {
        match try_dispatch::<T, R>(instance, own, member, args) {
            Ok(value) => value,
            Err(err) => std::panic::resume_unwind(Box::new(err)),
        }
    }

    fn try_dispatch<T, R>(
        instance: &Instance,
        own: usize,
        member: usize,
        args: &[Value],
    ) -> Result<R, InvokeError>
    where
        T: Implementable + ?Sized,
        R: FromValue,
    {
        let target = T::target().map_err(|err| InvokeError::Callback(err.into()))?;
        let local = MemberId(target.members().len().saturating_sub(own) + member);
        let id = if Arc::ptr_eq(&target, instance.synthesized_type().target()) {
            local
        } else {
            instance
                .target()
                .upcast(&target)
                .and_then(|ids| ids.get(local.0).copied())
                .ok_or_else(|| InvokeError::TargetMismatch {
                    expected: target.name().to_string(),
                    actual: instance.target().name().to_string(),
                })?
        };

        let value = instance.invoke_member(id, args)?;
        R::from_value(&value).map_err(|source| InvokeError::ReturnType {
            member: target
                .member(local)
                .map(|m| m.display_name())
                .unwrap_or_default(),
            source,
        })
    }
}
