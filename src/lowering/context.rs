use anyhow::{bail, Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};

use super::{Builder, LoweringContext, OpHandle, OpVector};
use crate::hash::{hash_combine, HashValue, DEFAULT_HASH_SEED};
use crate::node::{NodeId, NodeRef, Output, Value};

/// Every node reachable from `roots`, operands before their users.
///
/// Operands always get a smaller id than the nodes reading them, so sorting by
/// id is a topological order.
pub fn post_order(roots: &[Value]) -> Vec<NodeRef> {
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut nodes = vec![];
    let mut stack: Vec<NodeRef> = roots.iter().map(|v| v.node.clone()).collect();
    while let Some(node) = stack.pop() {
        if !seen.insert(node.id()) {
            continue;
        }
        for operand in node.operands() {
            if !seen.contains(&operand.node.id()) {
                stack.push(operand.node.clone());
            }
        }
        nodes.push(node);
    }
    nodes.sort_by_key(|n| n.id());
    nodes
}

/// Identity of the computation producing `roots`.
pub fn graph_hash(roots: &[Value]) -> HashValue {
    roots
        .iter()
        .fold(DEFAULT_HASH_SEED, |h, v| hash_combine(h, v.hash()))
}

/// Lowers graphs into a [`Builder`], one node at a time in topological order.
pub struct GraphLoweringContext<B> {
    builder: B,
    emitted: FxHashMap<Output, OpHandle>,
    lowered: FxHashSet<NodeId>,
}

impl<B: Builder> GraphLoweringContext<B> {
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            emitted: FxHashMap::default(),
            lowered: FxHashSet::default(),
        }
    }

    pub fn inner(&self) -> &B {
        &self.builder
    }

    pub fn into_inner(self) -> B {
        self.builder
    }

    pub fn is_lowered(&self, node: &NodeRef) -> bool {
        self.lowered.contains(&node.id())
    }

    /// Lowers a single node whose operands are all lowered. A node that was
    /// lowered before returns its recorded handles.
    pub fn lower_node(&mut self, node: &NodeRef) -> Result<OpVector> {
        if !self.is_lowered(node) {
            for operand in node.operands() {
                if !self.emitted.contains_key(&operand.output()) {
                    bail!("operand {operand:?} of {node} has not been lowered");
                }
            }
            log::debug!("lowering {}#{}", node.op(), node.id());
            let ops = node
                .lower(self)
                .with_context(|| format!("lowering {node}"))?;
            if ops.len() != node.num_outputs() {
                bail!(
                    "{} produced {} ops for {} outputs",
                    node.op(),
                    ops.len(),
                    node.num_outputs()
                );
            }
            self.lowered.insert(node.id());
            return Ok(ops);
        }
        (0..node.num_outputs())
            .map(|index| {
                let output = Output {
                    node: node.id(),
                    index,
                };
                self.emitted
                    .get(&output)
                    .copied()
                    .with_context(|| format!("{} never returned output {index}", node.op()))
            })
            .collect()
    }

    /// Lowers everything `roots` depend on and returns the roots' ops.
    pub fn lower_values(&mut self, roots: &[Value]) -> Result<OpVector> {
        let order = post_order(roots);
        log::info!(
            "lowering {} nodes for {} roots, graph hash {:#018x}",
            order.len(),
            roots.len(),
            graph_hash(roots)
        );
        for node in &order {
            self.lower_node(node)?;
        }
        log::info!("lowering completed");
        roots.iter().map(|v| self.get_output_op(v)).collect()
    }
}

impl<B: Builder> LoweringContext for GraphLoweringContext<B> {
    fn builder(&mut self) -> &mut dyn Builder {
        &mut self.builder
    }

    fn get_output_op(&self, value: &Value) -> Result<OpHandle> {
        self.emitted
            .get(&value.output())
            .copied()
            .with_context(|| format!("no backend op lowered for {value:?}"))
    }

    fn assign_output_op(&mut self, output: Output, op: OpHandle) {
        self.emitted.insert(output, op);
    }
}
