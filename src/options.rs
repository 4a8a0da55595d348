//! Session options.

/// How bare-name member lookups treat overloaded names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupMode {
    /// A bare name resolves when exactly one member has it.
    #[default]
    Unique,
    /// A bare name of an overloaded method is refused; a parameter-type
    /// list is required to pick the overload.
    Exact,
}

/// What registering a binding for an already bound member does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebindPolicy {
    /// Overwrite the existing slot's value; the slot count does not grow.
    #[default]
    Replace,
    /// Fail with [`ImplementError::AlreadyBound`](crate::ImplementError::AlreadyBound).
    Reject,
}

/// Options for an [`Implementer`](crate::Implementer) session.
///
/// # Example
///
/// ```
/// use implementer::{ImplementerOptions, LookupMode, RebindPolicy};
///
/// let options = ImplementerOptions::default()
///     .lookup(LookupMode::Exact)
///     .rebind(RebindPolicy::Reject);
/// assert_eq!(options.lookup, LookupMode::Exact);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImplementerOptions {
    pub lookup: LookupMode,
    pub rebind: RebindPolicy,
}

impl ImplementerOptions {
    pub fn lookup(mut self, mode: LookupMode) -> Self {
        self.lookup = mode;
        self
    }

    pub fn rebind(mut self, policy: RebindPolicy) -> Self {
        self.rebind = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ImplementerOptions::default();
        assert_eq!(options.lookup, LookupMode::Unique);
        assert_eq!(options.rebind, RebindPolicy::Replace);
    }

    #[test]
    fn builder_methods() {
        let options = ImplementerOptions::default().rebind(RebindPolicy::Reject);
        assert_eq!(options.rebind, RebindPolicy::Reject);
        assert_eq!(options.lookup, LookupMode::Unique);
    }
}
