//! Instance copier.
//!
//! Copying reads the slot values of an existing instance and constructs a
//! new instance of the same synthesized type from them. Nothing is
//! re-registered and no type is synthesized.
//!
//! Each synthesized type owns its copy plan: the action for every slot and
//! where the custom data lives. The plan is built on the first copy of the
//! type, at most once even when several threads copy at the same time, and
//! never changes afterwards. It is dropped with the type.

use std::any::Any;
use std::sync::Arc;

use implementer_core::{DataType, Value};
use tracing::debug;

use crate::error::InstanceError;
use crate::state::{SlotKind, SlotValue};
use crate::synthesized::{Instance, SynthesizedType};

/// What a copy does with one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCopy {
    /// Share the source's binding.
    Share,
    /// Keep the source's custom data unless a replacement is given.
    Data,
}

/// How to read and rebuild the layout of one synthesized type.
#[derive(Debug)]
pub struct CopyPlan {
    slots: Vec<SlotCopy>,
    data: Option<(usize, DataType)>,
}

impl CopyPlan {
    pub(crate) fn new(ty: &SynthesizedType) -> Self {
        let slots: Vec<SlotCopy> = ty
            .slots()
            .iter()
            .map(|slot| match slot.kind {
                SlotKind::CustomData(_) => SlotCopy::Data,
                SlotKind::Member { .. } => SlotCopy::Share,
            })
            .collect();
        let data = ty
            .slots()
            .iter()
            .enumerate()
            .find_map(|(index, slot)| match slot.kind {
                SlotKind::CustomData(data_type) => Some((index, data_type)),
                SlotKind::Member { .. } => None,
            });

        debug!(
            target: "implementer",
            stage = "copy_plan",
            type_name = ty.name(),
            type_id = %ty.id(),
            slots = slots.len(),
            data_slot = ?data.map(|(index, _)| index),
        );
        Self { slots, data }
    }

    /// One action per slot, in slot order.
    pub fn slots(&self) -> &[SlotCopy] {
        &self.slots
    }

    pub fn data_slot(&self) -> Option<usize> {
        self.data.map(|(index, _)| index)
    }

    fn apply(&self, source: &Instance, data: Option<Value>) -> Instance {
        let mut data = data;
        let values = self
            .slots
            .iter()
            .zip(source.slots())
            .map(|(action, value)| match action {
                SlotCopy::Data => data
                    .take()
                    .map(SlotValue::Data)
                    .unwrap_or_else(|| value.clone()),
                SlotCopy::Share => value.clone(),
            })
            .collect();
        Instance::from_parts(Arc::clone(source.synthesized_type()), values)
    }

    fn check_data(&self, ty: &SynthesizedType, data: &Value) -> Result<(), InstanceError> {
        let (_, data_type) = self.data.ok_or_else(|| InstanceError::NoCustomData {
            type_name: ty.name().to_string(),
        })?;
        if !data_type.accepts(data.data_type()) {
            return Err(InstanceError::DataTypeMismatch {
                type_name: ty.name().to_string(),
                expected: data_type.name(),
                actual: data.type_name(),
            });
        }
        Ok(())
    }
}

fn downcast(instance: &dyn Any) -> Result<&Instance, InstanceError> {
    instance
        .downcast_ref::<Instance>()
        .ok_or(InstanceError::InvalidInstance)
}

/// Copy an instance, sharing all of its captured bindings and custom data.
///
/// Fails with [`InstanceError::InvalidInstance`] when `instance` was not
/// produced by [`Implementer::finish`](crate::Implementer::finish). Trait
/// objects of `#[implementer::target]` traits pass their `as_instance()`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn copy(instance: &dyn Any) -> Result<Instance, InstanceError> {
    Ok(copy_instance(downcast(instance)?))
}

/// Copy an instance, replacing only its custom data.
///
/// Fails when the instance's type has no custom-data slot or `data` has
/// the wrong type.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn copy_with_data(instance: &dyn Any, data: Value) -> Result<Instance, InstanceError> {
    copy_instance_with_data(downcast(instance)?, data)
}

pub(crate) fn copy_instance(instance: &Instance) -> Instance {
    instance.synthesized_type().copy_plan_or_init().apply(instance, None)
}

pub(crate) fn copy_instance_with_data(
    instance: &Instance,
    data: Value,
) -> Result<Instance, InstanceError> {
    let ty = instance.synthesized_type();
    let plan = ty.copy_plan_or_init();
    plan.check_data(ty, &data)?;
    Ok(plan.apply(instance, Some(data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Implementer;
    use implementer_core::TargetType;

    fn target() -> TargetType {
        TargetType::interface("ICounter")
            .method("int count()")
            .unwrap()
            .build()
    }

    #[test]
    fn copy_reuses_plan() {
        let mut imp = Implementer::new(target());
        imp.member("count").unwrap().returns(3i32).unwrap();
        let original = imp.finish().unwrap();
        assert!(original.synthesized_type().copy_plan().is_none());

        let first = copy(&original).unwrap();
        let plan: *const CopyPlan = original.synthesized_type().copy_plan().unwrap();
        let second = copy(&first).unwrap();

        assert!(std::ptr::eq(plan, second.synthesized_type().copy_plan().unwrap()));
        assert_eq!(second.type_hash(), original.type_hash());
        assert_eq!(second.call::<i32>("count", &[]).unwrap(), 3);
    }

    #[test]
    fn plan_marks_the_data_slot() {
        let mut imp = Implementer::with_data::<String>(target());
        imp.member("count").unwrap().returns(1i32).unwrap();
        let original = imp.finish_with("abc").unwrap();

        let plan = original.synthesized_type().copy_plan_or_init();
        assert_eq!(plan.slots(), &[SlotCopy::Data, SlotCopy::Share]);
        assert_eq!(plan.data_slot(), Some(0));

        let plain = Implementer::new(target()).finish().unwrap();
        assert!(plain.synthesized_type().copy_plan_or_init().data_slot().is_none());
    }

    #[test]
    fn rejects_foreign_objects() {
        assert_eq!(
            copy(&String::from("not an instance")).unwrap_err(),
            InstanceError::InvalidInstance
        );
        assert_eq!(
            copy_with_data(&5i32, Value::Int32(1)).unwrap_err(),
            InstanceError::InvalidInstance
        );
    }

    #[test]
    fn copy_with_data_needs_data_slot() {
        let original = Implementer::new(target()).finish().unwrap();
        assert!(matches!(
            copy_with_data(&original, Value::Int32(1)),
            Err(InstanceError::NoCustomData { .. })
        ));
    }

    #[test]
    fn copy_with_data_replaces_slot_zero_only() {
        let mut imp = Implementer::with_data::<String>(target());
        imp.member("count")
            .unwrap()
            .callback_with_data(|data: String| Ok(data.len() as i32))
            .unwrap();
        let original = imp.finish_with("abc").unwrap();

        let copy = copy_with_data(&original, Value::String("abcdef".into())).unwrap();
        assert_eq!(copy.call::<i32>("count", &[]).unwrap(), 6);
        assert_eq!(original.call::<i32>("count", &[]).unwrap(), 3);
        assert!(matches!(
            copy_with_data(&original, Value::Bool(true)),
            Err(InstanceError::DataTypeMismatch { .. })
        ));
    }
}
