//! Type-erased native function storage.

use std::fmt;
use std::sync::Arc;

use crate::Value;

type NativeCallable = dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync;

/// Shared native function.
///
/// Used for the base behavior of class targets. Arguments arrive
/// positionally in declaration order, already checked against the member's
/// parameter types. Cloning shares the underlying callable.
#[derive(Clone)]
pub struct NativeFn {
    inner: Arc<NativeCallable>,
}

impl NativeFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    pub fn call(&self, args: &[Value]) -> anyhow::Result<Value> {
        (self.inner)(args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_fn_calls_closure() {
        let add = NativeFn::new(|args: &[Value]| match args {
            [Value::Int32(a), Value::Int32(b)] => Ok(Value::Int32(a + b)),
            _ => anyhow::bail!("bad arguments"),
        });

        assert_eq!(
            add.call(&[Value::Int32(2), Value::Int32(3)]).unwrap(),
            Value::Int32(5)
        );
        assert!(add.call(&[]).is_err());
    }

    #[test]
    fn native_fn_clone_shares_callable() {
        let f = NativeFn::new(|_: &[Value]| Ok(Value::Bool(true)));
        let g = f.clone();
        assert_eq!(g.call(&[]).unwrap(), Value::Bool(true));
    }
}
