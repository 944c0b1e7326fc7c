//! Model name and `ref()` resolution

mod bindings;
mod names;
mod refs;

pub use bindings::ModelBindings;
pub use names::NameResolver;
pub use refs::{format_ref, parse_model_id, parse_ref, ModelRef};
