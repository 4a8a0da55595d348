//! Ordered parameter map handed to callbacks.

use implementer_core::{ConversionError, DATA_KEY, FromValue, MemberDef, Value};

/// The arguments of one member invocation, keyed by parameter name.
///
/// Entries keep declaration order. When the session declares custom data,
/// the instance's current value is appended under `"__data"`; no real
/// parameter may use that name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map for a call. `args` must already be checked against `member`.
    pub(crate) fn for_call(member: &MemberDef, args: &[Value], data: Option<&Value>) -> Self {
        let mut entries = Vec::with_capacity(args.len() + usize::from(data.is_some()));
        for (param, arg) in member.params.iter().zip(args) {
            entries.push((param.name.clone(), arg.clone()));
        }
        if let Some(data) = data {
            entries.push((DATA_KEY.to_string(), data.clone()));
        }
        Self { entries }
    }

    /// Add an entry. Used to build maps by hand, e.g. in tests of handlers.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.entries.push((name.into(), value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Extract a parameter as a Rust value.
    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T, ConversionError> {
        let value = self
            .get(name)
            .ok_or_else(|| ConversionError::MissingParameter {
                name: name.to_string(),
            })?;
        T::from_value(value)
    }

    /// The custom-data entry, if the session declares one.
    pub fn data(&self) -> Option<&Value> {
        self.get(DATA_KEY)
    }

    pub fn data_as<T: FromValue>(&self) -> Result<T, ConversionError> {
        self.get_as(DATA_KEY)
    }

    /// Positional access to the call arguments, custom data excluded.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args().nth(index)
    }

    /// Call arguments in declaration order, custom data excluded.
    pub fn args(&self) -> impl Iterator<Item = &Value> {
        self.entries
            .iter()
            .filter(|(key, _)| key != DATA_KEY)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use implementer_core::TargetType;

    fn add_member() -> MemberDef {
        let target = TargetType::interface("ITest")
            .method("int add(int a, int b)")
            .unwrap()
            .build();
        target.members()[0].clone()
    }

    #[test]
    fn entries_follow_declaration_order() {
        let member = add_member();
        let params = Params::for_call(&member, &[Value::Int32(1), Value::Int32(2)], None);
        let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(params.get_as::<i32>("b").unwrap(), 2);
        assert!(params.data().is_none());
    }

    #[test]
    fn custom_data_is_appended() {
        let member = add_member();
        let data = Value::String("ctx".into());
        let params = Params::for_call(&member, &[Value::Int32(1), Value::Int32(2)], Some(&data));
        assert_eq!(params.len(), 3);
        assert_eq!(params.data_as::<String>().unwrap(), "ctx");
        assert_eq!(params.args().count(), 2);
        assert_eq!(params.arg(1), Some(&Value::Int32(2)));
    }

    #[test]
    fn missing_and_mistyped_parameters() {
        let params = Params::new().with("a", Value::Int32(1));
        assert!(matches!(
            params.get_as::<i32>("z"),
            Err(ConversionError::MissingParameter { .. })
        ));
        assert!(matches!(
            params.get_as::<i64>("a"),
            Err(ConversionError::TypeMismatch { .. })
        ));
    }
}
