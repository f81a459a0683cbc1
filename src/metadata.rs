use std::any::Any;

use dyn_clone::DynClone;

/// Opaque annotation attached to a node, e.g. provenance for debugging.
pub trait UserMetadata: DynClone + core::fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

dyn_clone::clone_trait_object!(UserMetadata);

/// Names the custom op a subgraph was traced from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomOpNameMetadata {
    pub op_name_prefix: String,
    pub max_stack_depth: usize,
}

impl CustomOpNameMetadata {
    pub fn new(op_name_prefix: impl Into<String>, max_stack_depth: usize) -> Self {
        Self {
            op_name_prefix: op_name_prefix.into(),
            max_stack_depth,
        }
    }
}

impl UserMetadata for CustomOpNameMetadata {
    fn as_any(&self) -> &dyn Any {
        self
    }
}
