//! Captured-state table.
//!
//! The ordered per-instance storage of a synthesized type. Slot 0 holds the
//! custom data when the session declares a custom-data type; every other
//! slot holds the binding of one member, in the order members were first
//! bound. The slot list at finish time is the synthesized type's layout and
//! the parameter list of its constructor.

use implementer_core::{DataType, MemberDef, MemberId, Value};
use rustc_hash::FxHashMap;

use crate::binding::{Binding, BindingKind};
use crate::error::ImplementError;
use crate::options::RebindPolicy;

/// Name of the custom-data slot.
pub const CUSTOM_DATA_SLOT: &str = "<>CustomData";

/// What a slot stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    CustomData(DataType),
    Member { id: MemberId, binding: BindingKind },
}

/// Declaration of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDecl {
    pub name: String,
    pub kind: SlotKind,
}

/// Value stored in one slot of an instance.
#[derive(Debug, Clone)]
pub enum SlotValue {
    Data(Value),
    Binding(Binding),
}

/// Result of [`CapturedStateTable::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    Added(usize),
    Replaced(usize),
}

/// Slots accumulated by a session.
#[derive(Debug, Clone)]
pub struct CapturedStateTable {
    slots: Vec<SlotDecl>,
    bindings: Vec<Option<Binding>>,
    by_member: FxHashMap<MemberId, usize>,
}

impl CapturedStateTable {
    pub fn new(data_type: Option<DataType>) -> Self {
        let mut table = Self {
            slots: Vec::new(),
            bindings: Vec::new(),
            by_member: FxHashMap::default(),
        };
        if let Some(data_type) = data_type {
            table.slots.push(SlotDecl {
                name: CUSTOM_DATA_SLOT.to_string(),
                kind: SlotKind::CustomData(data_type),
            });
            table.bindings.push(None);
        }
        table
    }

    /// Bind `member`, adding a slot or replacing the value of its existing one.
    ///
    /// `Reject` refuses to replace an explicit binding. Provisional
    /// (catch-all) bindings are always replaceable.
    pub fn bind(
        &mut self,
        target: &str,
        member: &MemberDef,
        binding: Binding,
        policy: RebindPolicy,
    ) -> Result<BindOutcome, ImplementError> {
        if let Some(&index) = self.by_member.get(&member.id) {
            let current = self.bindings[index].as_ref();
            if policy == RebindPolicy::Reject && current.is_some_and(|b| !b.is_provisional()) {
                return Err(ImplementError::AlreadyBound {
                    member: member.signature(),
                });
            }
            self.slots[index].kind = SlotKind::Member {
                id: member.id,
                binding: binding.kind(),
            };
            self.bindings[index] = Some(binding);
            return Ok(BindOutcome::Replaced(index));
        }

        let index = self.slots.len();
        self.slots.push(SlotDecl {
            name: format!("{}.{}", target, member.signature()),
            kind: SlotKind::Member {
                id: member.id,
                binding: binding.kind(),
            },
        });
        self.bindings.push(Some(binding));
        self.by_member.insert(member.id, index);
        Ok(BindOutcome::Added(index))
    }

    pub fn is_bound(&self, member: MemberId) -> bool {
        self.by_member.contains_key(&member)
    }

    pub fn binding(&self, member: MemberId) -> Option<&Binding> {
        let index = *self.by_member.get(&member)?;
        self.bindings[index].as_ref()
    }

    pub fn slots(&self) -> &[SlotDecl] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of bound members.
    pub fn bound_count(&self) -> usize {
        self.by_member.len()
    }

    /// Snapshot the layout and the constructor arguments, custom data first.
    pub fn freeze(&self, data: Option<Value>) -> (Vec<SlotDecl>, Vec<SlotValue>) {
        let mut data = data;
        let values = self
            .bindings
            .iter()
            .map(|binding| match binding {
                Some(binding) => SlotValue::Binding(binding.clone()),
                None => SlotValue::Data(data.take().unwrap_or(Value::Void)),
            })
            .collect();
        (self.slots.clone(), values)
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
            .method("int count()")
            .unwrap()
            .build()
    }

    #[test]
    fn custom_data_takes_slot_zero() {
        let table = CapturedStateTable::new(Some(DataType::String));
        assert_eq!(table.len(), 1);
        assert_eq!(table.slots()[0].name, CUSTOM_DATA_SLOT);
        assert_eq!(table.bound_count(), 0);
    }

    #[test]
    fn slots_follow_registration_order() {
        let target = target();
        let mut table = CapturedStateTable::new(None);
        let count = &target.members()[1];
        let test = &target.members()[0];

        table
            .bind("ITest", count, Binding::constant(1i32), RebindPolicy::Replace)
            .unwrap();
        table
            .bind("ITest", test, Binding::callback(|| Ok(())), RebindPolicy::Replace)
            .unwrap();

        let names: Vec<&str> = table.slots().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["ITest.int count()", "ITest.void test()"]);
    }

    #[test]
    fn rebind_replaces_value_in_place() {
        let target = target();
        let count = &target.members()[1];
        let mut table = CapturedStateTable::new(None);

        let first = table
            .bind("ITest", count, Binding::constant(1i32), RebindPolicy::Replace)
            .unwrap();
        let second = table
            .bind("ITest", count, Binding::callback(|| Ok(2i32)), RebindPolicy::Replace)
            .unwrap();

        assert_eq!(first, BindOutcome::Added(0));
        assert_eq!(second, BindOutcome::Replaced(0));
        assert_eq!(table.len(), 1);
        assert!(!table.binding(count.id).unwrap().is_constant());
    }

    #[test]
    fn reject_policy_refuses_explicit_rebind() {
        let target = target();
        let count = &target.members()[1];
        let mut table = CapturedStateTable::new(None);

        table
            .bind("ITest", count, Binding::constant(1i32), RebindPolicy::Reject)
            .unwrap();
        let err = table
            .bind("ITest", count, Binding::constant(2i32), RebindPolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, ImplementError::AlreadyBound { .. }));
    }

    #[test]
    fn reject_policy_still_replaces_provisional() {
        let target = target();
        let test = &target.members()[0];
        let mut table = CapturedStateTable::new(None);

        table
            .bind(
                "ITest",
                test,
                Binding::untyped(|_| Ok(Value::Void)).provisional(),
                RebindPolicy::Reject,
            )
            .unwrap();
        let outcome = table
            .bind("ITest", test, Binding::callback(|| Ok(())), RebindPolicy::Reject)
            .unwrap();
        assert_eq!(outcome, BindOutcome::Replaced(0));
    }

    #[test]
    fn freeze_puts_data_first() {
        let target = target();
        let mut table = CapturedStateTable::new(Some(DataType::String));
        table
            .bind("ITest", &target.members()[1], Binding::constant(7i32), RebindPolicy::Replace)
            .unwrap();

        let (slots, values) = table.freeze(Some(Value::String("hello".into())));
        assert_eq!(slots.len(), 2);
        assert!(matches!(&values[0], SlotValue::Data(Value::String(s)) if s == "hello"));
        assert!(matches!(&values[1], SlotValue::Binding(b) if b.is_constant()));
    }
}
