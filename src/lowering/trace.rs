use anyhow::{Context, Result};
use itertools::Itertools;

use super::{Builder, OpHandle, OpVector};
use crate::ops::AllReduceType;
use crate::shape::Shape;

#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: &'static str,
    pub operands: Vec<OpHandle>,
    pub shape: Shape,
    pub attributes: String,
}

/// In-memory [`Builder`] that records every emitted op.
#[derive(Clone, Debug, Default)]
pub struct TraceBuilder {
    instructions: Vec<Instruction>,
    parameters: usize,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction(&self, op: OpHandle) -> Result<&Instruction> {
        self.instructions
            .get(op.0)
            .with_context(|| format!("{op} was not emitted by this builder"))
    }

    pub fn shape(&self, op: OpHandle) -> Result<&Shape> {
        Ok(&self.instruction(op)?.shape)
    }

    fn push(
        &mut self,
        opcode: &'static str,
        operands: Vec<OpHandle>,
        shape: Shape,
        attributes: String,
    ) -> OpHandle {
        let op = OpHandle(self.instructions.len());
        self.instructions.push(Instruction {
            opcode,
            operands,
            shape,
            attributes,
        });
        op
    }

    /// One instruction per line, e.g. `%2 = f32[4,4] all-reduce(%0), to_apply=sum`.
    pub fn render(&self) -> String {
        self.instructions
            .iter()
            .enumerate()
            .map(|(i, ins)| {
                let mut line = format!(
                    "%{i} = {} {}({})",
                    ins.shape,
                    ins.opcode,
                    ins.operands.iter().join(", ")
                );
                if !ins.attributes.is_empty() {
                    line.push_str(", ");
                    line.push_str(&ins.attributes);
                }
                line
            })
            .join("\n")
    }
}

fn reduce_attributes(reduce_type: AllReduceType, scale: f64, groups: &[Vec<i64>]) -> String {
    let mut attrs = format!(
        "to_apply={reduce_type}, replica_groups={{{}}}",
        groups
            .iter()
            .map(|g| format!("{{{}}}", g.iter().join(",")))
            .join(",")
    );
    if scale != 1.0 {
        attrs.push_str(&format!(", scale={scale}"));
    }
    attrs
}

impl Builder for TraceBuilder {
    fn parameter(&mut self, shape: &Shape, name: &str) -> Result<OpHandle> {
        let number = self.parameters;
        self.parameters += 1;
        Ok(self.push(
            "parameter",
            vec![],
            shape.clone(),
            format!("number={number}, name={name}"),
        ))
    }

    fn create_token(&mut self) -> Result<OpHandle> {
        Ok(self.push("after-all", vec![], Shape::token(), String::new()))
    }

    fn all_reduce(
        &mut self,
        reduce_type: AllReduceType,
        input: OpHandle,
        scale: f64,
        groups: &[Vec<i64>],
    ) -> Result<OpHandle> {
        let shape = self.shape(input)?.clone();
        Ok(self.push(
            "all-reduce",
            vec![input],
            shape,
            reduce_attributes(reduce_type, scale, groups),
        ))
    }

    fn all_reduce_with_token(
        &mut self,
        reduce_type: AllReduceType,
        inputs: &[OpHandle],
        token: OpHandle,
        scale: f64,
        groups: &[Vec<i64>],
        pin_layout: bool,
    ) -> Result<OpVector> {
        let mut shapes = inputs
            .iter()
            .map(|op| self.shape(*op).cloned())
            .collect::<Result<Vec<_>>>()?;
        shapes.push(self.shape(token)?.clone());
        let mut operands = inputs.to_vec();
        operands.push(token);
        let mut attrs = reduce_attributes(reduce_type, scale, groups);
        if pin_layout {
            attrs.push_str(", pin_layout=true");
        }
        let tuple = self.push("all-reduce", operands, Shape::tuple(shapes.clone()), attrs);
        Ok(shapes
            .into_iter()
            .enumerate()
            .map(|(i, shape)| {
                self.push("get-tuple-element", vec![tuple], shape, format!("index={i}"))
            })
            .collect())
    }
}
