use std::any::Any;

use anyhow::Result;

use super::xla_create_token;
use crate::hash::DEFAULT_HASH_SEED;
use crate::lowering::{LoweringContext, OpVector};
use crate::node::{make_node, Node, NodeBase, NodeRef, Value};
use crate::shape::Shape;

/// Fresh ordering token, the start of a chain of token-threaded collectives.
#[derive(Debug)]
pub struct Token {
    base: NodeBase,
}

impl Token {
    pub fn new() -> Self {
        Self {
            base: NodeBase::leaf(*xla_create_token, Shape::token(), 1, DEFAULT_HASH_SEED),
        }
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for Token {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn lower(&self, loctx: &mut dyn LoweringContext) -> Result<OpVector> {
        let op = loctx.builder().create_token()?;
        Ok(self.base.return_op(op, loctx))
    }

    fn clone_with_operands(&self, operands: Vec<Value>) -> Result<NodeRef> {
        assert!(operands.is_empty(), "{} takes no operands", self.base.op());
        Ok(make_node(Token::new()))
    }
}
