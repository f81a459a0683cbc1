use std::any::Any;

use anyhow::Result;

use super::xla_device_data;
use crate::lowering::{LoweringContext, OpVector};
use crate::mhash;
use crate::node::{make_node, Node, NodeBase, NodeRef, Value};
use crate::shape::Shape;

/// Named input living on the device. Lowers to a computation parameter.
#[derive(Debug)]
pub struct DeviceData {
    base: NodeBase,
    name: String,
}

impl DeviceData {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        let name = name.into();
        Self {
            base: NodeBase::leaf(*xla_device_data, shape, 1, mhash!(name)),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Node for DeviceData {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn lower(&self, loctx: &mut dyn LoweringContext) -> Result<OpVector> {
        let op = loctx.builder().parameter(self.base.shape(), &self.name)?;
        Ok(self.base.return_op(op, loctx))
    }

    fn clone_with_operands(&self, operands: Vec<Value>) -> Result<NodeRef> {
        assert!(operands.is_empty(), "{} takes no operands", self.base.op());
        Ok(make_node(DeviceData::new(
            self.name.clone(),
            self.base.shape().clone(),
        )))
    }

    fn describe(&self) -> String {
        format!("{}, name={}", self.base, self.name)
    }
}
