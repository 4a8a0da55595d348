//! Implementer Proc Macros
//!
//! This crate provides the `#[implementer::target]` attribute, which turns a
//! Rust trait into an implementable target.
//!
//! # Example
//!
//! ```ignore
//! #[implementer::target]
//! pub trait ICalculator {
//!     fn add(&self, a: i32, b: i32) -> i32;
//!     fn reset(&self);
//!
//!     #[get("Name")]
//!     fn name(&self) -> String;
//!     #[set("Name")]
//!     fn set_name(&self, value: String);
//! }
//!
//! let mut implementer = Implementer::for_target::<dyn ICalculator>()?;
//! implementer.member("add")?.callback_with_params(|p| Ok(p.get_as::<i32>("a")? + p.get_as::<i32>("b")?))?;
//! let calculator: Box<dyn ICalculator> = Box::new(implementer.finish()?);
//! assert_eq!(calculator.add(2, 3), 5);
//! ```

use proc_macro::TokenStream;

mod attrs;
mod target;

/// Describe a trait as an implementable target.
///
/// Generates `impl Implementable for dyn Trait` and `impl Trait for Instance`.
/// Every method without a default body becomes a member, in declaration
/// order. Methods must take `&self`, have no generic parameters, and use
/// parameter and return types implementing `Typed`, `IntoValue` and
/// `FromValue`.
///
/// # Attributes
///
/// - `name = "..."` - Override the target name (default: the trait name)
///
/// # Method Attributes
///
/// - `#[get]` / `#[get("Name")]` - The method is the getter of a property
/// - `#[set]` / `#[set("Name")]` - The method is the setter of a property
///
/// Without an explicit name the property is named after the method, minus
/// a leading `get_` or `set_`.
///
/// # Supertraits
///
/// Supertraits that are themselves targets are inherited: their members
/// come first, so an instance of the trait also implements them. Marker
/// traits such as `Send` and `Sync` are ignored.
///
/// # Trait Objects
///
/// `dyn Trait` gets `as_instance()` and `as_instance_mut()`, returning the
/// underlying `Instance` for the type-erased `copy`, `get_data` and
/// `set_data`.
///
/// # Dispatch Failures
///
/// Trait methods cannot return errors, so a failed dispatch unwinds with the
/// `InvokeError` itself as the panic payload (via `resume_unwind`). Catch it
/// with `std::panic::catch_unwind` and downcast the payload.
#[proc_macro_attribute]
pub fn target(attr: TokenStream, item: TokenStream) -> TokenStream {
    target::target_impl(attr, item)
}
