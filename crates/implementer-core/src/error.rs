//! Error types for the data model.

use thiserror::Error;

/// Errors that can occur when converting between Rust values and [`Value`](crate::Value)s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// Type mismatch during conversion
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// A named parameter was not present in the parameter map
    #[error("missing parameter '{name}'")]
    MissingParameter { name: String },
}

/// Errors raised while describing a target type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    /// The declaration string could not be parsed.
    #[error("invalid declaration '{decl}': {reason}")]
    InvalidDeclaration { decl: String, reason: String },

    /// A type name in a declaration is not known.
    #[error("unknown type '{name}' in declaration '{decl}'")]
    UnknownType { name: String, decl: String },

    /// A parameter uses a name reserved for custom data.
    #[error("parameter name '{name}' is reserved")]
    ReservedParameter { name: String },

    /// Two parameters of the same member share a name.
    #[error("duplicate parameter '{param}' in member '{member}'")]
    DuplicateParameter { member: String, param: String },

    /// A member with the same name and parameter types was already declared.
    #[error("duplicate member '{signature}' on '{target}'")]
    DuplicateMember { target: String, signature: String },

    /// A property with this name was already declared.
    #[error("duplicate property '{name}' on '{target}'")]
    DuplicateProperty { target: String, name: String },

    /// A property declared neither a getter nor a setter.
    #[error("property '{name}' has no accessors")]
    NoAccessors { name: String },

    /// A base body was attached to a member of an interface.
    #[error("interface '{target}' cannot carry a body for '{member}'")]
    BodyOnInterface { target: String, member: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_error_type_mismatch() {
        let err = ConversionError::TypeMismatch {
            expected: "int",
            actual: "string",
        };
        assert!(err.to_string().contains("type mismatch"));
        assert!(err.to_string().contains("int"));
        assert!(err.to_string().contains("string"));
    }

    #[test]
    fn conversion_error_missing_parameter() {
        let err = ConversionError::MissingParameter {
            name: "value".to_string(),
        };
        assert!(err.to_string().contains("'value'"));
    }

    #[test]
    fn declaration_error_messages() {
        let err = DeclarationError::UnknownType {
            name: "Vec3".to_string(),
            decl: "Vec3 pos()".to_string(),
        };
        assert!(err.to_string().contains("Vec3"));

        let err = DeclarationError::DuplicateMember {
            target: "ITest".to_string(),
            signature: "void run()".to_string(),
        };
        assert!(err.to_string().contains("ITest"));
        assert!(err.to_string().contains("void run()"));
    }
}
