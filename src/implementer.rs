//! The type synthesizer.
//!
//! An [`Implementer`] session collects one binding per member of a target,
//! then [`finish`](Implementer::finish)es into a [`SynthesizedType`] and its
//! first [`Instance`].
//!
//! # Example
//!
//! ```
//! use implementer::{Implementer, TargetType};
//!
//! let target = TargetType::interface("ITest")
//!     .property("string Prop1 { get; set; }")?
//!     .property("int Prop2 { get; }")?
//!     .build();
//!
//! let mut implementer = Implementer::with_data::<String>(target);
//! implementer
//!     .getter("Prop1")?
//!     .callback_with_data(|data: String| Ok(data))?
//!     .setter("Prop1", |value: String| {
//!         println!("Prop1 = {value}");
//!         Ok(())
//!     })?
//!     .getter("Prop2")?
//!     .returns(123i32)?;
//!
//! let instance = implementer.finish_with("hello")?;
//! assert_eq!(instance.get_as::<String>("Prop1")?, "hello");
//! assert_eq!(instance.get_as::<i32>("Prop2")?, 123);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;

use implementer_core::{
    DataType, DeclarationError, FromValue, IntoValue, MemberDef, MemberId, PropertyDef,
    TargetType, Typed, Value,
};
use tracing::{debug, trace};

use crate::binding::Binding;
use crate::error::ImplementError;
use crate::options::{ImplementerOptions, LookupMode, RebindPolicy};
use crate::params::Params;
use crate::state::{BindOutcome, CapturedStateTable, SlotDecl};
use crate::synthesized::{Instance, SynthesizedType};

/// A target described at compile time, usually by `#[implementer::target]`.
///
/// Implemented for `dyn Trait`; the descriptor is built once per process.
pub trait Implementable {
    fn target() -> Result<Arc<TargetType>, DeclarationError>;
}

type CatchAllHandler = dyn Fn(&MemberDef, &Params) -> anyhow::Result<Value> + Send + Sync;

/// A synthesis session for one target and optional custom-data type.
///
/// Sessions are not synchronized; register and finish from one thread.
#[derive(Debug)]
pub struct Implementer {
    target: Arc<TargetType>,
    data_type: Option<DataType>,
    options: ImplementerOptions,
    state: CapturedStateTable,
    finished: bool,
}

impl Implementer {
    /// Start a session without custom data.
    pub fn new(target: impl Into<Arc<TargetType>>) -> Self {
        Self::open(target.into(), None)
    }

    /// Start a session threading a `D` through every callback.
    pub fn with_data<D: Typed>(target: impl Into<Arc<TargetType>>) -> Self {
        Self::with_data_type(target, D::data_type())
    }

    /// Start a session with an explicit custom-data type. `Void` means none.
    pub fn with_data_type(target: impl Into<Arc<TargetType>>, data_type: DataType) -> Self {
        Self::open(target.into(), (!data_type.is_void()).then_some(data_type))
    }

    /// Start a session for a macro-described target.
    pub fn for_target<T: Implementable + ?Sized>() -> Result<Self, ImplementError> {
        Ok(Self::new(T::target()?))
    }

    /// Start a session for a macro-described target with custom data.
    pub fn for_target_with_data<T, D>() -> Result<Self, ImplementError>
    where
        T: Implementable + ?Sized,
        D: Typed,
    {
        Ok(Self::with_data::<D>(T::target()?))
    }

    pub fn with_options(mut self, options: ImplementerOptions) -> Self {
        self.options = options;
        self
    }

    fn open(target: Arc<TargetType>, data_type: Option<DataType>) -> Self {
        trace!(
            target: "implementer",
            stage = "open",
            target_type = target.name(),
            members = target.members().len(),
            custom_data = data_type.map(|dt| dt.name()).unwrap_or("none"),
        );
        Self {
            state: CapturedStateTable::new(data_type),
            target,
            data_type,
            options: ImplementerOptions::default(),
            finished: false,
        }
    }

    pub fn target(&self) -> &Arc<TargetType> {
        &self.target
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    pub fn options(&self) -> ImplementerOptions {
        self.options
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of members with a binding.
    pub fn bound_count(&self) -> usize {
        self.state.bound_count()
    }

    pub fn is_bound(&self, member: MemberId) -> bool {
        self.state.is_bound(member)
    }

    /// Current slot layout, custom data first.
    pub fn slots(&self) -> &[SlotDecl] {
        self.state.slots()
    }

    /// Bindable methods of the target, accessors excluded.
    pub fn methods(&self) -> impl Iterator<Item = &MemberDef> {
        self.target.methods()
    }

    pub fn properties(&self) -> &[PropertyDef] {
        self.target.properties()
    }

    /// Select a member by bare name.
    ///
    /// Accessors are found by their `get_`/`set_` names. An overloaded name
    /// fails with [`ImplementError::AmbiguousMember`], or with
    /// [`ImplementError::SignatureRequired`] under [`LookupMode::Exact`].
    pub fn member(&mut self, name: &str) -> Result<MemberBuilder<'_>, ImplementError> {
        self.ensure_open()?;
        let id = self.lookup(name)?;
        self.builder(id)
    }

    /// Select a method by name and parameter types.
    ///
    /// An exact match always wins. Under [`LookupMode::Unique`] the types may
    /// also select the single overload whose parameters accept them.
    pub fn member_with(
        &mut self,
        name: &str,
        param_types: &[DataType],
    ) -> Result<MemberBuilder<'_>, ImplementError> {
        self.ensure_open()?;
        let id = self.lookup_with(name, param_types)?;
        self.builder(id)
    }

    /// Select a member by id.
    pub fn member_at(&mut self, id: MemberId) -> Result<MemberBuilder<'_>, ImplementError> {
        self.ensure_open()?;
        self.builder(id)
    }

    /// Select a property's getter.
    pub fn getter(&mut self, property: &str) -> Result<MemberBuilder<'_>, ImplementError> {
        self.ensure_open()?;
        let def = self.property_def(property)?;
        let id = def.getter.ok_or_else(|| ImplementError::WriteOnlyProperty {
            property: property.to_string(),
        })?;
        self.builder(id)
    }

    /// Bind a property's setter to `f`, called with the new value.
    pub fn setter<T, F>(&mut self, property: &str, f: F) -> Result<&mut Self, ImplementError>
    where
        T: FromValue + Typed + 'static,
        F: Fn(T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let id = self.setter_of::<T>(property)?;
        let binding = Binding::with_params(move |params: &Params| f(params.get_as::<T>("value")?));
        self.register(id, binding)
    }

    /// Bind a property's setter to `f`, called with the new value and the custom data.
    pub fn setter_with_data<T, D, F>(&mut self, property: &str, f: F) -> Result<&mut Self, ImplementError>
    where
        T: FromValue + Typed + 'static,
        D: FromValue + Typed + 'static,
        F: Fn(T, D) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.ensure_open()?;
        self.check_data::<D>()?;
        let id = self.setter_of::<T>(property)?;
        let binding = Binding::with_params(move |params: &Params| {
            f(params.get_as::<T>("value")?, params.data_as::<D>()?)
        });
        self.register(id, binding)
    }

    /// Bind every unbound void member to `handler`.
    ///
    /// With `include_non_void`, unbound non-void members are bound as well;
    /// their results are checked against the member's return type at call
    /// time. These bindings are provisional: a later explicit registration
    /// replaces them whatever the rebind policy.
    pub fn handle_all<F>(&mut self, handler: F, include_non_void: bool) -> Result<&mut Self, ImplementError>
    where
        F: Fn(&MemberDef, &Params) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let handler: Arc<CatchAllHandler> = Arc::new(handler);
        let target = Arc::clone(&self.target);
        let mut bound = 0;

        for member in target.members() {
            if self.state.is_bound(member.id) || (!member.is_void() && !include_non_void) {
                continue;
            }
            let def = member.clone();
            let handler = Arc::clone(&handler);
            let binding = Binding::untyped(move |params: &Params| handler(&def, params)).provisional();
            self.state
                .bind(target.name(), member, binding, RebindPolicy::Replace)?;
            bound += 1;
        }

        debug!(
            target: "implementer",
            stage = "handle_all",
            target_type = target.name(),
            include_non_void,
            bound,
        );
        Ok(self)
    }

    /// Attach `binding` to a member. Every registration path ends here.
    pub fn register(&mut self, id: MemberId, binding: Binding) -> Result<&mut Self, ImplementError> {
        self.ensure_open()?;
        let target = Arc::clone(&self.target);
        let member = target
            .member(id)
            .ok_or_else(|| ImplementError::InvalidMemberId {
                target: target.name().to_string(),
                index: id.0,
            })?;
        binding.check(member)?;

        let kind = binding.kind();
        match self
            .state
            .bind(target.name(), member, binding, self.options.rebind)?
        {
            BindOutcome::Added(slot) => trace!(
                target: "implementer",
                stage = "bind",
                member = %member,
                binding = %kind,
                slot,
            ),
            BindOutcome::Replaced(slot) => trace!(
                target: "implementer",
                stage = "rebind",
                member = %member,
                binding = %kind,
                slot,
            ),
        }
        Ok(self)
    }

    /// Finish a session without custom data.
    ///
    /// Fails with [`ImplementError::MissingCustomData`] when the session
    /// declares a custom-data type; the session stays open in that case.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn finish(&mut self) -> Result<Instance, ImplementError> {
        self.ensure_open()?;
        if let Some(data_type) = self.data_type {
            return Err(ImplementError::MissingCustomData {
                target: self.target.name().to_string(),
                expected: data_type.to_string(),
            });
        }
        self.synthesize(None)
    }

    /// Finish a session, storing `data` in the custom-data slot.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn finish_with<D: IntoValue>(&mut self, data: D) -> Result<Instance, ImplementError> {
        self.ensure_open()?;
        let data_type = self.data_type.ok_or_else(|| ImplementError::NoCustomData {
            target: self.target.name().to_string(),
        })?;
        let value = data.into_value();
        if !data_type.accepts(value.data_type()) {
            return Err(ImplementError::DataTypeMismatch {
                expected: data_type.to_string(),
                actual: value.type_name().to_string(),
            });
        }
        self.synthesize(Some(value))
    }

    fn synthesize(&mut self, data: Option<Value>) -> Result<Instance, ImplementError> {
        let (slots, values) = self.state.freeze(data);
        let ty = SynthesizedType::new(Arc::clone(&self.target), self.data_type, slots);
        let instance = ty.construct(values)?;
        self.finished = true;

        debug!(
            target: "implementer",
            stage = "finish",
            target_type = self.target.name(),
            type_name = ty.name(),
            type_id = %ty.id(),
            slots = ty.slot_count(),
            bound = self.state.bound_count(),
        );
        Ok(instance)
    }

    fn ensure_open(&self) -> Result<(), ImplementError> {
        if self.finished {
            return Err(ImplementError::AlreadyFinished {
                target: self.target.name().to_string(),
            });
        }
        Ok(())
    }

    fn builder(&mut self, id: MemberId) -> Result<MemberBuilder<'_>, ImplementError> {
        let member = self
            .target
            .member(id)
            .cloned()
            .ok_or_else(|| ImplementError::InvalidMemberId {
                target: self.target.name().to_string(),
                index: id.0,
            })?;
        Ok(MemberBuilder {
            implementer: self,
            member,
        })
    }

    fn lookup(&self, name: &str) -> Result<MemberId, ImplementError> {
        match self.target.overloads(name) {
            [] => self
                .target
                .members()
                .iter()
                .find(|m| !m.is_method() && m.display_name() == name)
                .map(|m| m.id)
                .ok_or_else(|| self.not_found(name.to_string())),
            [only] => Ok(*only),
            overloads => {
                let candidates = self.signatures(overloads);
                let target = self.target.name().to_string();
                let member = name.to_string();
                Err(match self.options.lookup {
                    LookupMode::Unique => ImplementError::AmbiguousMember {
                        target,
                        member,
                        candidates,
                    },
                    LookupMode::Exact => ImplementError::SignatureRequired {
                        target,
                        member,
                        candidates,
                    },
                })
            }
        }
    }

    fn lookup_with(&self, name: &str, param_types: &[DataType]) -> Result<MemberId, ImplementError> {
        if let Some(id) = self.target.find_method(name, param_types) {
            return Ok(id);
        }
        let not_found = || {
            let types: Vec<&str> = param_types.iter().map(DataType::name).collect();
            self.not_found(format!("{}({})", name, types.join(", ")))
        };
        if self.options.lookup == LookupMode::Exact {
            return Err(not_found());
        }

        let fitting: Vec<MemberId> = self
            .target
            .overloads(name)
            .iter()
            .copied()
            .filter(|id| {
                self.target.member(*id).is_some_and(|m| {
                    m.params.len() == param_types.len()
                        && m.params
                            .iter()
                            .zip(param_types)
                            .all(|(p, t)| p.data_type.accepts(*t))
                })
            })
            .collect();
        match fitting.as_slice() {
            [only] => Ok(*only),
            [] => Err(not_found()),
            _ => Err(ImplementError::AmbiguousMember {
                target: self.target.name().to_string(),
                member: name.to_string(),
                candidates: self.signatures(&fitting),
            }),
        }
    }

    fn property_def(&self, property: &str) -> Result<&PropertyDef, ImplementError> {
        self.target
            .property(property)
            .ok_or_else(|| ImplementError::PropertyNotFound {
                target: self.target.name().to_string(),
                property: property.to_string(),
            })
    }

    fn setter_of<T: Typed>(&self, property: &str) -> Result<MemberId, ImplementError> {
        let def = self.property_def(property)?;
        let id = def.setter.ok_or_else(|| ImplementError::ReadOnlyProperty {
            property: property.to_string(),
        })?;
        let value_type = T::data_type();
        if !def.data_type.accepts(value_type) && !value_type.is_any() {
            return Err(ImplementError::SignatureMismatch {
                member: format!("set_{}", property),
                expected: def.data_type.to_string(),
                actual: value_type.to_string(),
            });
        }
        Ok(id)
    }

    fn check_data<D: Typed>(&self) -> Result<(), ImplementError> {
        let data_type = self.data_type.ok_or_else(|| ImplementError::NoCustomData {
            target: self.target.name().to_string(),
        })?;
        let requested = D::data_type();
        if !data_type.accepts(requested) && !requested.is_any() {
            return Err(ImplementError::DataTypeMismatch {
                expected: data_type.to_string(),
                actual: requested.to_string(),
            });
        }
        Ok(())
    }

    fn signatures(&self, ids: &[MemberId]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.target.member(*id))
            .map(MemberDef::signature)
            .collect()
    }

    fn not_found(&self, member: String) -> ImplementError {
        ImplementError::MemberNotFound {
            target: self.target.name().to_string(),
            member,
        }
    }
}

/// A member selected for binding.
///
/// Every method consumes the builder and hands the session back, so
/// registrations chain with `?`.
pub struct MemberBuilder<'a> {
    implementer: &'a mut Implementer,
    member: MemberDef,
}

impl<'a> MemberBuilder<'a> {
    pub fn id(&self) -> MemberId {
        self.member.id
    }

    pub fn def(&self) -> &MemberDef {
        &self.member
    }

    /// Bind a callback taking no arguments. Use `R = ()` for void members.
    pub fn callback<R, F>(self, f: F) -> Result<&'a mut Implementer, ImplementError>
    where
        R: IntoValue + Typed + 'static,
        F: Fn() -> anyhow::Result<R> + Send + Sync + 'static,
    {
        self.bind(Binding::callback(f))
    }

    /// Bind a callback receiving the parameter map.
    pub fn callback_with_params<R, F>(self, f: F) -> Result<&'a mut Implementer, ImplementError>
    where
        R: IntoValue + Typed + 'static,
        F: Fn(&Params) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        self.bind(Binding::with_params(f))
    }

    /// Bind a callback receiving only the custom data.
    pub fn callback_with_data<R, D, F>(self, f: F) -> Result<&'a mut Implementer, ImplementError>
    where
        R: IntoValue + Typed + 'static,
        D: FromValue + Typed + 'static,
        F: Fn(D) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        self.implementer.check_data::<D>()?;
        self.bind(Binding::with_params(move |params: &Params| {
            f(params.data_as::<D>()?)
        }))
    }

    /// Bind an untyped callback; its result is checked at call time.
    pub fn callback_any<F>(self, f: F) -> Result<&'a mut Implementer, ImplementError>
    where
        F: Fn(&Params) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.bind(Binding::untyped(f))
    }

    /// Bind a constant return value.
    pub fn returns<R: IntoValue>(self, value: R) -> Result<&'a mut Implementer, ImplementError> {
        self.bind(Binding::constant(value))
    }

    pub fn bind(self, binding: Binding) -> Result<&'a mut Implementer, ImplementError> {
        let implementer = self.implementer;
        implementer.register(self.member.id, binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use implementer_core::TargetType;

    fn target() -> TargetType {
        TargetType::interface("ITest")
            .method("void test()")
            .unwrap()
            .method("int add(int a, int b)")
            .unwrap()
            .method("int64 add(int64 a, int64 b)")
            .unwrap()
            .method("void log(? value)")
            .unwrap()
            .property("string Prop1 { get; set; }")
            .unwrap()
            .property("int Prop2 { get; }")
            .unwrap()
            .build()
    }

    #[test]
    fn bare_name_lookup() {
        let mut imp = Implementer::new(target());
        assert_eq!(imp.member("test").unwrap().id(), MemberId(0));
        assert_eq!(imp.member("get_Prop2").unwrap().def().return_type, DataType::Int32);
        assert!(matches!(
            imp.member("missing"),
            Err(ImplementError::MemberNotFound { .. })
        ));
    }

    #[test]
    fn overloaded_name_is_ambiguous() {
        let mut imp = Implementer::new(target());
        match imp.member("add") {
            Err(ImplementError::AmbiguousMember { candidates, .. }) => {
                assert_eq!(
                    candidates,
                    ["int add(int a, int b)", "int64 add(int64 a, int64 b)"]
                );
            }
            other => panic!("expected ambiguity, got {:?}", other.map(|b| b.id())),
        }
    }

    #[test]
    fn exact_mode_requires_signature() {
        let mut imp =
            Implementer::new(target()).with_options(ImplementerOptions::default().lookup(LookupMode::Exact));
        assert!(matches!(
            imp.member("add"),
            Err(ImplementError::SignatureRequired { .. })
        ));
        let id = imp
            .member_with("add", &[DataType::Int64, DataType::Int64])
            .unwrap()
            .id();
        assert_eq!(id, MemberId(2));
        assert!(imp.member_with("log", &[DataType::Int32]).is_err());
    }

    #[test]
    fn unique_mode_matches_accepting_params() {
        let mut imp = Implementer::new(target());
        assert_eq!(imp.member_with("log", &[DataType::Int32]).unwrap().id(), MemberId(3));
    }

    #[test]
    fn registration_checks_signature() {
        let mut imp = Implementer::new(target());
        let err = imp.member("test").unwrap().returns(1i32).unwrap_err();
        assert!(matches!(err, ImplementError::SignatureMismatch { .. }));
        assert_eq!(imp.bound_count(), 0);
    }

    #[test]
    fn setter_on_read_only_property() {
        let mut imp = Implementer::new(target());
        let err = imp.setter("Prop2", |_: i32| Ok(())).unwrap_err();
        assert_eq!(
            err,
            ImplementError::ReadOnlyProperty {
                property: "Prop2".to_string()
            }
        );
    }

    #[test]
    fn setter_value_type_checked() {
        let mut imp = Implementer::new(target());
        assert!(matches!(
            imp.setter("Prop1", |_: i32| Ok(())),
            Err(ImplementError::SignatureMismatch { .. })
        ));
        assert!(imp.setter("Prop1", |_: String| Ok(())).is_ok());
    }

    #[test]
    fn data_apis_need_custom_data() {
        let mut imp = Implementer::new(target());
        assert!(matches!(
            imp.setter_with_data("Prop1", |_: String, _: String| Ok(())),
            Err(ImplementError::NoCustomData { .. })
        ));
        assert!(matches!(
            imp.finish_with(1i32),
            Err(ImplementError::NoCustomData { .. })
        ));
        assert!(!imp.is_finished());
    }

    #[test]
    fn finish_requires_declared_data() {
        let mut imp = Implementer::with_data::<String>(target());
        assert!(matches!(
            imp.finish(),
            Err(ImplementError::MissingCustomData { .. })
        ));
        assert!(matches!(
            imp.finish_with(5i32),
            Err(ImplementError::DataTypeMismatch { .. })
        ));
        assert!(imp.finish_with("ok").is_ok());
    }

    #[test]
    fn registration_after_finish_fails() {
        let mut imp = Implementer::new(target());
        imp.finish().unwrap();
        assert!(matches!(
            imp.member("test"),
            Err(ImplementError::AlreadyFinished { .. })
        ));
        assert!(matches!(
            imp.register(MemberId(0), Binding::callback(|| Ok(()))),
            Err(ImplementError::AlreadyFinished { .. })
        ));
    }

    #[test]
    fn handle_all_skips_bound_and_non_void() {
        let mut imp = Implementer::new(target());
        imp.member("test").unwrap().callback(|| Ok(())).unwrap();
        imp.handle_all(|_, _| Ok(Value::Void), false).unwrap();

        // log and set_Prop1 are the remaining void members.
        assert_eq!(imp.bound_count(), 3);
        assert!(!imp.is_bound(MemberId(1)));
        assert!(!imp.state.binding(MemberId(0)).unwrap().is_provisional());
    }

    #[test]
    fn slot_names() {
        let mut imp = Implementer::with_data::<String>(target());
        imp.getter("Prop2").unwrap().returns(1i32).unwrap();
        let names: Vec<&str> = imp.slots().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["<>CustomData", "ITest.int get_Prop2()"]);
    }
}
