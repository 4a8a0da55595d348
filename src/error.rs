//! Error types for synthesis, instance handling, and dispatch.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ImplementError   - configuration and lifecycle errors, raised while
//!                    registering bindings or finishing a session
//! InstanceError    - an object passed to the copier or the data accessor
//!                    is not a usable implemented instance
//! InvokeError      - calling a member of an instance failed; callback
//!                    failures pass through untouched
//! ```

use implementer_core::{ConversionError, DeclarationError};
use thiserror::Error;

/// Errors raised while configuring or finishing an [`Implementer`](crate::Implementer).
///
/// All of these surface at the call that caused them, never later at
/// invocation time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImplementError {
    /// No member with this name (and parameter types) exists.
    #[error("'{target}' has no member '{member}'")]
    MemberNotFound { target: String, member: String },

    /// No property with this name exists.
    #[error("'{target}' has no property '{property}'")]
    PropertyNotFound { target: String, property: String },

    /// The name matches several overloads.
    #[error("'{member}' on '{target}' is ambiguous; candidates: {}", candidates.join(", "))]
    AmbiguousMember {
        target: String,
        member: String,
        candidates: Vec<String>,
    },

    /// Exact lookup is enabled and the name is overloaded.
    #[error("'{member}' on '{target}' is overloaded; parameter types are required (candidates: {})", candidates.join(", "))]
    SignatureRequired {
        target: String,
        member: String,
        candidates: Vec<String>,
    },

    /// The binding's shape does not match the member's signature.
    #[error("signature mismatch binding '{member}': member returns {expected}, binding provides {actual}")]
    SignatureMismatch {
        member: String,
        expected: String,
        actual: String,
    },

    /// A setter was bound on a property without one.
    #[error("property '{property}' is read-only")]
    ReadOnlyProperty { property: String },

    /// A getter was bound on a property without one.
    #[error("property '{property}' is write-only")]
    WriteOnlyProperty { property: String },

    /// A custom-data API was used on a session without a custom-data type.
    #[error("'{target}' was not configured with a custom data type")]
    NoCustomData { target: String },

    /// The session declares custom data but none was provided.
    #[error("'{target}' requires custom data of type {expected}")]
    MissingCustomData { target: String, expected: String },

    /// Custom data (or a callback's view of it) has the wrong type.
    #[error("custom data type mismatch: expected {expected}, got {actual}")]
    DataTypeMismatch { expected: String, actual: String },

    /// The member already has a binding and rebinding is rejected.
    #[error("member '{member}' is already bound")]
    AlreadyBound { member: String },

    /// The session was already finished.
    #[error("implementer for '{target}' has already been finished")]
    AlreadyFinished { target: String },

    /// A member identifier does not belong to the target.
    #[error("member #{index} does not exist on '{target}'")]
    InvalidMemberId { target: String, index: usize },

    /// The target description itself is invalid.
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// The captured values did not fit the synthesized layout.
    #[error(transparent)]
    Instance(#[from] InstanceError),
}

/// Errors raised when an object is not a usable implemented instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    /// The object was not produced by [`Implementer::finish`](crate::Implementer::finish).
    #[error("the object must have been returned by Implementer::finish()")]
    InvalidInstance,

    /// The instance's type has no custom-data slot.
    #[error("'{type_name}' has no custom data")]
    NoCustomData { type_name: String },

    /// The replacement custom data has the wrong type.
    #[error("custom data type mismatch on '{type_name}': expected {expected}, got {actual}")]
    DataTypeMismatch {
        type_name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Captured values do not fit the synthesized layout.
    #[error("captured state does not match the layout of '{type_name}': {reason}")]
    LayoutMismatch { type_name: String, reason: String },
}

/// Errors raised when invoking a member of an instance.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The bound callback failed. The original error is kept as is.
    #[error(transparent)]
    Callback(anyhow::Error),

    /// No member matches the name.
    #[error("'{target}' has no member '{member}'")]
    UnknownMember { target: String, member: String },

    /// Several overloads accept the given arguments.
    #[error("call to '{member}' on '{target}' is ambiguous; candidates: {}", candidates.join(", "))]
    AmbiguousCall {
        target: String,
        member: String,
        candidates: Vec<String>,
    },

    /// No overload accepts the given arguments.
    #[error("no overload of '{member}' on '{target}' accepts ({args})")]
    NoMatchingOverload {
        target: String,
        member: String,
        args: String,
    },

    /// The instance implements a different target than the one called through.
    #[error("instance of '{actual}' does not implement '{expected}'")]
    TargetMismatch { expected: String, actual: String },

    /// The member is non-void, unbound, and has no base behavior.
    #[error("'{member}' is not implemented")]
    NotImplemented { member: String },

    /// Wrong number of arguments.
    #[error("'{member}' expects {expected} arguments, got {actual}")]
    ArgumentCount {
        member: String,
        expected: usize,
        actual: usize,
    },

    /// An argument does not match its parameter type.
    #[error("argument '{param}' of '{member}': {source}")]
    ArgumentType {
        member: String,
        param: String,
        source: ConversionError,
    },

    /// An untyped binding returned a value of the wrong type.
    #[error("'{member}' returned a value of the wrong type: {source}")]
    ReturnType {
        member: String,
        source: ConversionError,
    },

    /// Reading a property without a getter.
    #[error("property '{property}' is write-only")]
    WriteOnlyProperty { property: String },

    /// Writing a property without a setter.
    #[error("property '{property}' is read-only")]
    ReadOnlyProperty { property: String },
}

impl InvokeError {
    /// The callback's own error, if this failure came from a callback.
    pub fn callback_error(&self) -> Option<&anyhow::Error> {
        match self {
            InvokeError::Callback(err) => Some(err),
            _ => None,
        }
    }
}
