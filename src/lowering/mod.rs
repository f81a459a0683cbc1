//! Node -> backend op translation.
//!
//! Node lowering -> LoweringContext.get_output_op(operands) -> Builder calls -> NodeBase::return_ops

use anyhow::Result;

use crate::node::{Output, Value};
use crate::ops::AllReduceType;
use crate::shape::Shape;

pub mod context;
pub mod trace;

pub use context::{graph_hash, post_order, GraphLoweringContext};
pub use trace::{Instruction, TraceBuilder};

/// Handle to an operation emitted by a [`Builder`].
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub struct OpHandle(pub usize);

impl core::fmt::Display for OpHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

pub type OpVector = Vec<OpHandle>;

/// Backend computation builder the nodes emit into.
pub trait Builder {
    fn parameter(&mut self, shape: &Shape, name: &str) -> Result<OpHandle>;

    fn create_token(&mut self) -> Result<OpHandle>;

    fn all_reduce(
        &mut self,
        reduce_type: AllReduceType,
        input: OpHandle,
        scale: f64,
        groups: &[Vec<i64>],
    ) -> Result<OpHandle>;

    /// Reduces every input in one collective ordered after `token`. Returns
    /// one handle per input followed by the new token.
    fn all_reduce_with_token(
        &mut self,
        reduce_type: AllReduceType,
        inputs: &[OpHandle],
        token: OpHandle,
        scale: f64,
        groups: &[Vec<i64>],
        pin_layout: bool,
    ) -> Result<OpVector>;
}

pub trait LoweringContext {
    fn builder(&mut self) -> &mut dyn Builder;

    /// Backend op for an operand. The operand must have been lowered already.
    fn get_output_op(&self, value: &Value) -> Result<OpHandle>;

    fn assign_output_op(&mut self, output: Output, op: OpHandle);
}
