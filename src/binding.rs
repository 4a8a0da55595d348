//! Member bindings.
//!
//! A [`Binding`] is the behavior attached to one member: a constant, a
//! callback taking no arguments, or a callback taking the [`Params`] map.
//! Its [`BindingKind`] is checked against the member's signature when it is
//! registered, so a mismatched binding never reaches an instance.

use std::fmt;
use std::sync::Arc;

use implementer_core::{DataType, IntoValue, MemberDef, Typed, Value};

use crate::error::ImplementError;
use crate::params::Params;

type Callback = dyn Fn() -> anyhow::Result<Value> + Send + Sync;
type ParamsCallback = dyn Fn(&Params) -> anyhow::Result<Value> + Send + Sync;

/// Return shape of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// A callback that returns nothing; only valid for void members.
    NoReturn,
    /// A callback returning a value of this type.
    ReturnsValue(DataType),
    /// A fixed value of this type.
    Constant(DataType),
}

impl BindingKind {
    fn for_return(data_type: DataType) -> Self {
        if data_type.is_void() {
            BindingKind::NoReturn
        } else {
            BindingKind::ReturnsValue(data_type)
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::NoReturn => f.write_str("void"),
            BindingKind::ReturnsValue(data_type) => write!(f, "{}", data_type),
            BindingKind::Constant(data_type) => write!(f, "constant {}", data_type),
        }
    }
}

/// What runs when a bound member is invoked.
#[derive(Clone)]
pub enum Behavior {
    /// Returned as is, without building a parameter map.
    Constant(Value),
    /// Called with no arguments.
    Callback(Arc<Callback>),
    /// Called with the parameter map.
    WithParams(Arc<ParamsCallback>),
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Behavior::Callback(_) => f.write_str("Callback(..)"),
            Behavior::WithParams(_) => f.write_str("WithParams(..)"),
        }
    }
}

/// A behavior plus its return shape.
#[derive(Debug, Clone)]
pub struct Binding {
    kind: BindingKind,
    behavior: Behavior,
    untyped: bool,
    provisional: bool,
}

impl Binding {
    /// Always return `value`.
    pub fn constant<R: IntoValue>(value: R) -> Self {
        let value = value.into_value();
        Self {
            kind: BindingKind::Constant(value.data_type()),
            behavior: Behavior::Constant(value),
            untyped: false,
            provisional: false,
        }
    }

    /// Call `f` with no arguments. `R = ()` binds a void member.
    pub fn callback<R, F>(f: F) -> Self
    where
        R: IntoValue + Typed + 'static,
        F: Fn() -> anyhow::Result<R> + Send + Sync + 'static,
    {
        Self {
            kind: BindingKind::for_return(R::data_type()),
            behavior: Behavior::Callback(Arc::new(move || f().map(IntoValue::into_value))),
            untyped: false,
            provisional: false,
        }
    }

    /// Call `f` with the parameter map.
    pub fn with_params<R, F>(f: F) -> Self
    where
        R: IntoValue + Typed + 'static,
        F: Fn(&Params) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        Self {
            kind: BindingKind::for_return(R::data_type()),
            behavior: Behavior::WithParams(Arc::new(move |params: &Params| {
                f(params).map(IntoValue::into_value)
            })),
            untyped: false,
            provisional: false,
        }
    }

    /// Call `f` with the parameter map; accepted for any member.
    ///
    /// The returned value is checked against the member's return type at
    /// call time. For void members it is discarded.
    pub fn untyped<F>(f: F) -> Self
    where
        F: Fn(&Params) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            kind: BindingKind::ReturnsValue(DataType::Any),
            behavior: Behavior::WithParams(Arc::new(f)),
            untyped: true,
            provisional: false,
        }
    }

    /// Mark as installed by a catch-all handler; any explicit binding replaces it.
    pub(crate) fn provisional(mut self) -> Self {
        self.provisional = true;
        self
    }

    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    pub fn is_untyped(&self) -> bool {
        self.untyped
    }

    pub fn is_provisional(&self) -> bool {
        self.provisional
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.behavior, Behavior::Constant(_))
    }

    /// Check this binding's return shape against `member`.
    pub(crate) fn check(&self, member: &MemberDef) -> Result<(), ImplementError> {
        if self.untyped {
            return Ok(());
        }
        let compatible = match self.kind {
            BindingKind::NoReturn => member.is_void(),
            BindingKind::ReturnsValue(data_type) | BindingKind::Constant(data_type) => {
                !member.is_void() && member.return_type.accepts(data_type)
            }
        };
        if compatible {
            Ok(())
        } else {
            Err(ImplementError::SignatureMismatch {
                member: member.signature(),
                expected: member.return_type.to_string(),
                actual: self.kind.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use implementer_core::TargetType;

    fn members() -> Vec<MemberDef> {
        TargetType::interface("ITest")
            .method("void test()")
            .unwrap()
            .method("int count()")
            .unwrap()
            .method("? anything()")
            .unwrap()
            .build()
            .members()
            .to_vec()
    }

    #[test]
    fn kinds_follow_return_type() {
        assert_eq!(Binding::callback(|| Ok(())).kind(), BindingKind::NoReturn);
        assert_eq!(
            Binding::callback(|| Ok(1i32)).kind(),
            BindingKind::ReturnsValue(DataType::Int32)
        );
        assert_eq!(
            Binding::constant(123i32).kind(),
            BindingKind::Constant(DataType::Int32)
        );
        assert!(Binding::untyped(|_| Ok(Value::Void)).is_untyped());
    }

    #[test]
    fn void_member_accepts_no_return_only() {
        let members = members();
        let test = &members[0];
        assert!(Binding::callback(|| Ok(())).check(test).is_ok());
        assert!(Binding::callback(|| Ok(1i32)).check(test).is_err());
        assert!(Binding::constant(1i32).check(test).is_err());
    }

    #[test]
    fn value_member_requires_exact_type() {
        let members = members();
        let count = &members[1];
        assert!(Binding::callback(|| Ok(1i32)).check(count).is_ok());
        assert!(Binding::constant(123i32).check(count).is_ok());

        let err = Binding::callback(|| Ok(1i64)).check(count).unwrap_err();
        assert_eq!(
            err,
            ImplementError::SignatureMismatch {
                member: "int count()".to_string(),
                expected: "int".to_string(),
                actual: "int64".to_string(),
            }
        );
        assert!(Binding::callback(|| Ok(())).check(count).is_err());
    }

    #[test]
    fn untyped_member_accepts_any_value() {
        let members = members();
        let anything = &members[2];
        assert!(Binding::constant("text").check(anything).is_ok());
        assert!(Binding::callback(|| Ok(2.5f64)).check(anything).is_ok());
        assert!(Binding::callback(|| Ok(())).check(anything).is_err());
    }

    #[test]
    fn untyped_binding_fits_every_member() {
        let binding = Binding::untyped(|_| Ok(Value::Int32(0)));
        for member in members() {
            assert!(binding.check(&member).is_ok());
        }
    }

    #[test]
    fn provisional_flag() {
        let binding = Binding::untyped(|_| Ok(Value::Void)).provisional();
        assert!(binding.is_provisional());
        assert!(!Binding::constant(1i32).is_provisional());
    }
}
