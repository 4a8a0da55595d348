//! Custom-data accessor for type-erased instances.
//!
//! [`Instance::data`] and [`Instance::set_data`] are the typed forms.

use std::any::Any;

use implementer_core::Value;

use crate::error::InstanceError;
use crate::synthesized::Instance;

/// Read the custom data of an instance.
pub fn get_data(instance: &dyn Any) -> Result<Value, InstanceError> {
    let instance = instance
        .downcast_ref::<Instance>()
        .ok_or(InstanceError::InvalidInstance)?;
    instance.data_value().cloned()
}

/// Replace the custom data of one instance.
///
/// Other instances of the same type, copies included, keep their values.
pub fn set_data(instance: &mut dyn Any, value: Value) -> Result<(), InstanceError> {
    let instance = instance
        .downcast_mut::<Instance>()
        .ok_or(InstanceError::InvalidInstance)?;
    instance.replace_data(value)
}
