use std::any::Any;

use anyhow::Result;
use itertools::Itertools;

use super::{operand_list_with_token, xla_cross_replica_sum, AllReduceType};
use crate::lowering::{LoweringContext, OpVector};
use crate::mhash;
use crate::node::{make_node, Node, NodeBase, NodeRef, Value};
use crate::shape::Shape;

fn node_output_shape(operands: &[Value], token: &Value) -> Shape {
    let mut shapes = Vec::with_capacity(operands.len() + 1);
    shapes.extend(operands.iter().map(|v| v.shape().clone()));
    shapes.push(token.shape().clone());
    Shape::tuple(shapes)
}

/// Cross-replica reduction.
///
/// The token form reduces several operands in one collective and threads an
/// ordering token through it: outputs are one value per operand plus the new
/// token. The single operand form takes no token and has one output.
#[derive(Debug)]
pub struct AllReduce {
    base: NodeBase,
    reduce_type: AllReduceType,
    scale: f64,
    groups: Vec<Vec<i64>>,
    pin_layout: bool,
    has_token: bool,
}

impl AllReduce {
    pub fn new(
        reduce_type: AllReduceType,
        operands: &[Value],
        token: &Value,
        scale: f64,
        groups: Vec<Vec<i64>>,
        pin_layout: bool,
    ) -> Result<Self> {
        let base = NodeBase::with_shape_fn(
            *xla_cross_replica_sum,
            operand_list_with_token(operands, token),
            || Ok(node_output_shape(operands, token)),
            operands.len() + 1,
            mhash!(reduce_type.value(), scale, groups, pin_layout),
        )?;
        Ok(Self {
            base,
            reduce_type,
            scale,
            groups,
            pin_layout,
            has_token: true,
        })
    }

    pub fn single(
        reduce_type: AllReduceType,
        operand: &Value,
        scale: f64,
        groups: Vec<Vec<i64>>,
    ) -> Self {
        let base = NodeBase::new(
            *xla_cross_replica_sum,
            vec![operand.clone()],
            operand.shape().clone(),
            1,
            mhash!(reduce_type.value(), scale, groups),
        );
        Self {
            base,
            reduce_type,
            scale,
            groups,
            pin_layout: false,
            has_token: false,
        }
    }

    pub fn reduce_type(&self) -> AllReduceType {
        self.reduce_type
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn groups(&self) -> &[Vec<i64>] {
        &self.groups
    }

    pub fn pin_layout(&self) -> bool {
        self.pin_layout
    }

    pub fn has_token(&self) -> bool {
        self.has_token
    }
}

impl Node for AllReduce {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn lower(&self, loctx: &mut dyn LoweringContext) -> Result<OpVector> {
        let operands = self.base.operands();
        if !self.has_token {
            let input = loctx.get_output_op(&operands[0])?;
            let result =
                loctx
                    .builder()
                    .all_reduce(self.reduce_type, input, self.scale, &self.groups)?;
            return Ok(self.base.return_op(result, loctx));
        }
        let last = operands.len() - 1;
        let inputs = operands[..last]
            .iter()
            .map(|v| loctx.get_output_op(v))
            .collect::<Result<Vec<_>>>()?;
        let token = loctx.get_output_op(&operands[last])?;
        let results = loctx.builder().all_reduce_with_token(
            self.reduce_type,
            &inputs,
            token,
            self.scale,
            &self.groups,
            self.pin_layout,
        )?;
        Ok(self.base.return_ops(&results, loctx))
    }

    fn clone_with_operands(&self, operands: Vec<Value>) -> Result<NodeRef> {
        assert_eq!(
            operands.len(),
            self.base.operands().len(),
            "{} takes {} operands",
            self.base.op(),
            self.base.operands().len()
        );
        if !self.has_token {
            return Ok(make_node(AllReduce::single(
                self.reduce_type,
                &operands[0],
                self.scale,
                self.groups.clone(),
            )));
        }
        let last = operands.len() - 1;
        Ok(make_node(AllReduce::new(
            self.reduce_type,
            &operands[..last],
            &operands[last],
            self.scale,
            self.groups.clone(),
            self.pin_layout,
        )?))
    }

    fn describe(&self) -> String {
        format!(
            "{}, reduce_type={}, scale={}, pin_layout={}, groups=({})",
            self.base,
            self.reduce_type.value(),
            self.scale,
            self.pin_layout,
            self.groups
                .iter()
                .map(|g| format!("({})", g.iter().join(", ")))
                .join(",")
        )
    }
}
