//! Synthesized types and their instances.
//!
//! Finishing a session produces one [`SynthesizedType`]: a fixed slot layout
//! plus a table mapping each bound member to its slot. Every [`Instance`]
//! of that type owns its own slot values and dispatches member calls by
//! reading them.
//!
//! # Dispatch
//!
//! Invoking a member:
//!
//! 1. checks the arguments against the member's parameters (count and exact type)
//! 2. returns the constant directly for constant bindings
//! 3. otherwise builds the [`Params`] map (custom data under `"__data"`)
//!    when the callback takes it, and calls it
//! 4. passes callback failures through as [`InvokeError::Callback`]
//!
//! Unbound void members do nothing. Unbound non-void members run the class
//! base body when there is one and fail with [`InvokeError::NotImplemented`]
//! otherwise.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use implementer_core::{
    ConversionError, DataType, FromValue, IntoValue, MemberDef, MemberId, TargetType, TypeHash,
    Value,
};

use crate::binding::{Behavior, Binding};
use crate::copier::CopyPlan;
use crate::error::{InstanceError, InvokeError};
use crate::implementer::Implementable;
use crate::params::Params;
use crate::state::{SlotDecl, SlotKind, SlotValue};

/// Prefix of every synthesized type name.
pub const TYPE_NAME_PREFIX: &str = "<>Impl";

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// A type produced by finishing a session.
#[derive(Debug)]
pub struct SynthesizedType {
    id: TypeHash,
    name: String,
    target: Arc<TargetType>,
    data_type: Option<DataType>,
    slots: Vec<SlotDecl>,
    /// Slot index per member id
    dispatch: Vec<Option<usize>>,
    copy_plan: OnceLock<CopyPlan>,
}

impl SynthesizedType {
    pub(crate) fn new(
        target: Arc<TargetType>,
        data_type: Option<DataType>,
        slots: Vec<SlotDecl>,
    ) -> Arc<Self> {
        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        let id = TypeHash::from_synthesized(
            target.hash(),
            data_type.map(|data_type| data_type.type_hash()),
            serial,
        );

        let mut dispatch = vec![None; target.members().len()];
        for (index, slot) in slots.iter().enumerate() {
            if let SlotKind::Member { id, .. } = slot.kind {
                if let Some(entry) = dispatch.get_mut(id.0) {
                    *entry = Some(index);
                }
            }
        }

        Arc::new(Self {
            id,
            name: format!("{}{}", TYPE_NAME_PREFIX, target.name()),
            target,
            data_type,
            slots,
            dispatch,
            copy_plan: OnceLock::new(),
        })
    }

    /// Process-unique identity of this type.
    pub fn id(&self) -> TypeHash {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Arc<TargetType> {
        &self.target
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    pub fn has_custom_data(&self) -> bool {
        self.data_type.is_some()
    }

    /// Index of the custom-data slot.
    pub fn data_slot(&self) -> Option<usize> {
        self.data_type.map(|_| 0)
    }

    pub fn slots(&self) -> &[SlotDecl] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_of(&self, member: MemberId) -> Option<usize> {
        self.dispatch.get(member.0).copied().flatten()
    }

    pub fn is_bound(&self, member: MemberId) -> bool {
        self.slot_of(member).is_some()
    }

    /// The copy plan, once an instance of this type has been copied.
    pub fn copy_plan(&self) -> Option<&CopyPlan> {
        self.copy_plan.get()
    }

    pub(crate) fn copy_plan_or_init(&self) -> &CopyPlan {
        self.copy_plan.get_or_init(|| CopyPlan::new(self))
    }

    /// Construct an instance from one value per slot, in slot order.
    pub fn construct(self: &Arc<Self>, values: Vec<SlotValue>) -> Result<Instance, InstanceError> {
        if values.len() != self.slots.len() {
            return Err(self.layout_mismatch(format!(
                "expected {} values, got {}",
                self.slots.len(),
                values.len()
            )));
        }

        for (index, (slot, value)) in self.slots.iter().zip(&values).enumerate() {
            let fits = match (&slot.kind, value) {
                (SlotKind::CustomData(data_type), SlotValue::Data(data)) => {
                    data_type.accepts(data.data_type())
                }
                (SlotKind::Member { binding, .. }, SlotValue::Binding(value)) => {
                    value.kind() == *binding
                }
                _ => false,
            };
            if !fits {
                return Err(self.layout_mismatch(format!(
                    "slot {} '{}' cannot hold the given value",
                    index, slot.name
                )));
            }
        }

        Ok(Instance::from_parts(Arc::clone(self), values))
    }

    fn layout_mismatch(&self, reason: String) -> InstanceError {
        InstanceError::LayoutMismatch {
            type_name: self.name.clone(),
            reason,
        }
    }
}

/// A live object implementing a target.
///
/// Instances are `Send + Sync`; concurrent calls are as safe as the bound
/// callbacks are.
pub struct Instance {
    ty: Arc<SynthesizedType>,
    state: Vec<SlotValue>,
}

impl Instance {
    pub(crate) fn from_parts(ty: Arc<SynthesizedType>, state: Vec<SlotValue>) -> Self {
        Self { ty, state }
    }

    pub fn synthesized_type(&self) -> &Arc<SynthesizedType> {
        &self.ty
    }

    pub fn type_hash(&self) -> TypeHash {
        self.ty.id
    }

    pub fn target(&self) -> &TargetType {
        &self.ty.target
    }

    /// Whether this instance implements the macro-described target `T`,
    /// directly or through inheritance.
    pub fn implements<T: Implementable + ?Sized>(&self) -> bool {
        T::target().is_ok_and(|target| self.ty.target.includes(&target))
    }

    pub(crate) fn slots(&self) -> &[SlotValue] {
        &self.state
    }

    /// Invoke a method by name, picking the overload the arguments fit.
    ///
    /// Accessors can be invoked by their `get_`/`set_` names.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, InvokeError> {
        let id = self.resolve_call(name, args)?;
        self.invoke_member(id, args)
    }

    /// Invoke the method with exactly these parameter types.
    pub fn invoke_with(
        &self,
        name: &str,
        param_types: &[DataType],
        args: &[Value],
    ) -> Result<Value, InvokeError> {
        let id = self
            .target()
            .find_method(name, param_types)
            .ok_or_else(|| self.unknown_member(name))?;
        self.invoke_member(id, args)
    }

    /// Invoke a member by id.
    pub fn invoke_member(&self, id: MemberId, args: &[Value]) -> Result<Value, InvokeError> {
        let member = self
            .target()
            .member(id)
            .ok_or_else(|| self.unknown_member(&format!("#{}", id.0)))?;
        check_args(member, args)?;

        match self.ty.slot_of(id).map(|slot| &self.state[slot]) {
            Some(SlotValue::Binding(binding)) => self.dispatch(member, binding, args),
            _ => self.unbound(member, args),
        }
    }

    /// Invoke a method and convert its result.
    pub fn call<R: FromValue>(&self, name: &str, args: &[Value]) -> Result<R, InvokeError> {
        let value = self.invoke(name, args)?;
        R::from_value(&value).map_err(|source| InvokeError::ReturnType {
            member: name.to_string(),
            source,
        })
    }

    /// Read a property through its getter.
    pub fn get(&self, property: &str) -> Result<Value, InvokeError> {
        let def = self
            .target()
            .property(property)
            .ok_or_else(|| self.unknown_member(property))?;
        let getter = def.getter.ok_or_else(|| InvokeError::WriteOnlyProperty {
            property: property.to_string(),
        })?;
        self.invoke_member(getter, &[])
    }

    /// Read a property and convert it.
    pub fn get_as<R: FromValue>(&self, property: &str) -> Result<R, InvokeError> {
        let value = self.get(property)?;
        R::from_value(&value).map_err(|source| InvokeError::ReturnType {
            member: property.to_string(),
            source,
        })
    }

    /// Write a property through its setter.
    pub fn set(&self, property: &str, value: impl IntoValue) -> Result<(), InvokeError> {
        let def = self
            .target()
            .property(property)
            .ok_or_else(|| self.unknown_member(property))?;
        let setter = def.setter.ok_or_else(|| InvokeError::ReadOnlyProperty {
            property: property.to_string(),
        })?;
        self.invoke_member(setter, &[value.into_value()])?;
        Ok(())
    }

    /// A new instance of the same type sharing every captured binding.
    pub fn copy(&self) -> Instance {
        crate::copier::copy_instance(self)
    }

    /// Like [`copy`](Self::copy) with the custom data replaced.
    pub fn copy_with_data<D: IntoValue>(&self, data: D) -> Result<Instance, InstanceError> {
        crate::copier::copy_instance_with_data(self, data.into_value())
    }

    /// The current custom data.
    pub fn data_value(&self) -> Result<&Value, InstanceError> {
        match self.ty.data_slot().map(|slot| &self.state[slot]) {
            Some(SlotValue::Data(value)) => Ok(value),
            _ => Err(InstanceError::NoCustomData {
                type_name: self.ty.name.clone(),
            }),
        }
    }

    /// The current custom data as a Rust value.
    pub fn data<D: FromValue>(&self) -> Result<D, InstanceError> {
        let value = self.data_value()?;
        D::from_value(value).map_err(|err| self.data_mismatch(err))
    }

    /// Replace the custom data of this instance only.
    pub fn set_data<D: IntoValue>(&mut self, data: D) -> Result<(), InstanceError> {
        self.replace_data(data.into_value())
    }

    pub(crate) fn replace_data(&mut self, value: Value) -> Result<(), InstanceError> {
        let data_type = self.ty.data_type.ok_or_else(|| InstanceError::NoCustomData {
            type_name: self.ty.name.clone(),
        })?;
        if !data_type.accepts(value.data_type()) {
            return Err(InstanceError::DataTypeMismatch {
                type_name: self.ty.name.clone(),
                expected: data_type.name(),
                actual: value.type_name(),
            });
        }
        self.state[0] = SlotValue::Data(value);
        Ok(())
    }

    fn dispatch(
        &self,
        member: &MemberDef,
        binding: &Binding,
        args: &[Value],
    ) -> Result<Value, InvokeError> {
        let result = match binding.behavior() {
            Behavior::Constant(value) => return Ok(value.clone()),
            Behavior::Callback(callback) => callback(),
            Behavior::WithParams(callback) => {
                let data = self.data_value().ok();
                callback(&Params::for_call(member, args, data))
            }
        }
        .map_err(InvokeError::Callback)?;

        if member.is_void() {
            return Ok(Value::Void);
        }
        if binding.is_untyped() || member.return_type.is_any() {
            return self.check_return(member, result);
        }
        Ok(result)
    }

    fn unbound(&self, member: &MemberDef, args: &[Value]) -> Result<Value, InvokeError> {
        if let Some(base) = member.base() {
            let result = base.call(args).map_err(InvokeError::Callback)?;
            if member.is_void() {
                return Ok(Value::Void);
            }
            return self.check_return(member, result);
        }
        if member.is_void() {
            return Ok(Value::Void);
        }
        Err(InvokeError::NotImplemented {
            member: format!("{}.{}", self.target().name(), member.signature()),
        })
    }

    fn check_return(&self, member: &MemberDef, value: Value) -> Result<Value, InvokeError> {
        value
            .coerce_to(member.return_type)
            .map_err(|source| InvokeError::ReturnType {
                member: member.display_name(),
                source,
            })
    }

    fn resolve_call(&self, name: &str, args: &[Value]) -> Result<MemberId, InvokeError> {
        let target = self.target();
        let overloads = target.overloads(name);
        match overloads {
            [] => target
                .members()
                .iter()
                .find(|m| !m.is_method() && m.display_name() == name)
                .map(|m| m.id)
                .ok_or_else(|| self.unknown_member(name)),
            [only] => Ok(*only),
            _ => {
                let arg_types: Vec<DataType> = args.iter().map(Value::data_type).collect();
                let fitting: Vec<MemberId> = overloads
                    .iter()
                    .copied()
                    .filter(|id| target.member(*id).is_some_and(|m| accepts_args(m, &arg_types)))
                    .collect();
                match fitting.as_slice() {
                    [only] => Ok(*only),
                    [] => Err(InvokeError::NoMatchingOverload {
                        target: target.name().to_string(),
                        member: name.to_string(),
                        args: arg_types
                            .iter()
                            .map(|t| t.name())
                            .collect::<Vec<_>>()
                            .join(", "),
                    }),
                    _ => target.find_method(name, &arg_types).ok_or_else(|| {
                        InvokeError::AmbiguousCall {
                            target: target.name().to_string(),
                            member: name.to_string(),
                            candidates: fitting
                                .iter()
                                .filter_map(|id| target.member(*id))
                                .map(MemberDef::signature)
                                .collect(),
                        }
                    }),
                }
            }
        }
    }

    fn unknown_member(&self, name: &str) -> InvokeError {
        InvokeError::UnknownMember {
            target: self.target().name().to_string(),
            member: name.to_string(),
        }
    }

    fn data_mismatch(&self, err: ConversionError) -> InstanceError {
        let (expected, actual) = match err {
            ConversionError::TypeMismatch { expected, actual } => (expected, actual),
            ConversionError::MissingParameter { .. } => ("custom data", "nothing"),
        };
        InstanceError::DataTypeMismatch {
            type_name: self.ty.name.clone(),
            expected,
            actual,
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.ty.name)
            .field("id", &self.ty.id)
            .field("slots", &self.state.len())
            .finish()
    }
}

fn accepts_args(member: &MemberDef, arg_types: &[DataType]) -> bool {
    member.params.len() == arg_types.len()
        && member
            .params
            .iter()
            .zip(arg_types)
            .all(|(param, arg)| param.data_type.accepts(*arg))
}

fn check_args(member: &MemberDef, args: &[Value]) -> Result<(), InvokeError> {
    if args.len() != member.params.len() {
        return Err(InvokeError::ArgumentCount {
            member: member.display_name(),
            expected: member.params.len(),
            actual: args.len(),
        });
    }
    for (param, arg) in member.params.iter().zip(args) {
        if !param.data_type.accepts(arg.data_type()) {
            return Err(InvokeError::ArgumentType {
                member: member.display_name(),
                param: param.name.clone(),
                source: ConversionError::TypeMismatch {
                    expected: param.data_type.name(),
                    actual: arg.type_name(),
                },
            });
        }
    }
    Ok(())
}
