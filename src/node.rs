use std::any::Any;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{bail, Context, Result};
use cached::{Cached, SizedCache};
use itertools::Itertools;

use crate::hash::{hash_combine, hash_of, HashData, HashValue};
use crate::lowering::{LoweringContext, OpHandle, OpVector};
use crate::metadata::UserMetadata;
use crate::op_kind::OpKind;
use crate::shape::Shape;
use crate::sharding::OpSharding;
use crate::utils::SHAPE_CACHE_SIZE;

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub struct NodeId(pub(crate) usize);

pub(crate) fn node_id() -> NodeId {
    static COUNTER: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);
    NodeId(COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type NodeRef = Arc<dyn Node>;

pub fn make_node<T: Node>(node: T) -> NodeRef {
    Arc::new(node)
}

/// One output of a node, used as an operand. Holds the producing node alive.
#[derive(Clone)]
pub struct Value {
    pub node: NodeRef,
    pub index: usize,
}

impl Value {
    pub fn new(node: NodeRef) -> Self {
        Self::with_index(node, 0)
    }

    pub fn with_index(node: NodeRef, index: usize) -> Self {
        assert!(
            index < node.num_outputs(),
            "output index {index} out of range for {} with {} outputs",
            node.op(),
            node.num_outputs()
        );
        Self { node, index }
    }

    pub fn shape(&self) -> &Shape {
        self.node.shape_at(self.index)
    }

    pub fn hash(&self) -> HashValue {
        hash_combine(self.node.hash(), self.index.hash_data())
    }

    pub fn shape_hash(&self) -> HashValue {
        hash_combine(self.node.shape_hash(), self.index.hash_data())
    }

    pub fn output(&self) -> Output {
        Output {
            node: self.node.id(),
            index: self.index,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.output() == other.output()
    }
}

impl Eq for Value {}

impl core::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}#{}:{}>", self.node.op(), self.node.id(), self.index)
    }
}

/// Key a lowering context maps to the backend handle of a node output.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub struct Output {
    pub node: NodeId,
    pub index: usize,
}

/// An operation in the graph.
///
/// Concrete operations embed a [`NodeBase`] and add their own parameters.
pub trait Node: Any + Send + Sync + core::fmt::Debug {
    fn base(&self) -> &NodeBase;

    fn as_any(&self) -> &dyn Any;

    /// Emits the backend operations for this node. Implementations register
    /// every produced handle through [`NodeBase::return_ops`].
    fn lower(&self, loctx: &mut dyn LoweringContext) -> Result<OpVector> {
        let _ = loctx;
        bail!("lowering not implemented for node: {}", self.describe())
    }

    /// Builds an equivalent node reading from `operands`.
    fn clone_with_operands(&self, operands: Vec<Value>) -> Result<NodeRef> {
        let _ = operands;
        bail!("cloning not implemented for node: {}", self.describe())
    }

    fn describe(&self) -> String {
        self.base().to_string()
    }
}

impl dyn Node {
    pub fn id(&self) -> NodeId {
        self.base().id
    }

    pub fn op(&self) -> OpKind {
        self.base().op
    }

    pub fn operands(&self) -> &[Value] {
        &self.base().operands
    }

    pub fn num_outputs(&self) -> usize {
        self.base().num_outputs
    }

    pub fn shape(&self) -> &Shape {
        &self.base().shape
    }

    pub fn shape_at(&self, index: usize) -> &Shape {
        self.base().shape_at(index)
    }

    pub fn node_hash(&self) -> HashValue {
        self.base().node_hash
    }

    pub fn shape_hash(&self) -> HashValue {
        self.base().dag_hash
    }

    pub fn hash(&self) -> HashValue {
        self.base().hash()
    }

    pub fn sharding_hash(&self) -> HashValue {
        self.base().sharding_hash()
    }
}

impl core::fmt::Display for dyn Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

#[derive(Debug, Default)]
struct Annotations {
    output_shardings: Vec<Option<Arc<OpSharding>>>,
    sharding_hash: HashValue,
    dynamic_dims: BTreeSet<u32>,
    user_metadata: Option<Box<dyn UserMetadata>>,
}

/// State every node shares: kind, operands, shape and identity hashes.
///
/// Everything but the annotations is fixed at construction.
#[derive(Debug)]
pub struct NodeBase {
    id: NodeId,
    op: OpKind,
    operands: Vec<Value>,
    num_outputs: usize,
    shape: Shape,
    node_hash: HashValue,
    dag_hash: HashValue,
    annotations: RwLock<Annotations>,
}

impl NodeBase {
    pub fn new(
        op: OpKind,
        operands: Vec<Value>,
        shape: Shape,
        num_outputs: usize,
        hash_seed: HashValue,
    ) -> Self {
        let node_hash = get_op_hash(op, &shape, hash_seed);
        let dag_hash = operand_hashes(&operands, node_hash);
        Self::build(op, operands, shape, num_outputs, node_hash, dag_hash)
    }

    /// Same as [`NodeBase::new`], but the shape comes from `shape_fn`, which
    /// only runs when the shape cache has no entry for this node.
    pub fn with_shape_fn<F>(
        op: OpKind,
        operands: Vec<Value>,
        shape_fn: F,
        num_outputs: usize,
        hash_seed: HashValue,
    ) -> Result<Self>
    where
        F: FnOnce() -> Result<Shape>,
    {
        let node_hash = hash_combine(op.hash(), hash_seed);
        let dag_hash = operand_hashes(&operands, node_hash);
        let shape = get_op_shape(dag_hash, shape_fn)
            .with_context(|| format!("computing the shape of {op}"))?;
        Ok(Self::build(op, operands, shape, num_outputs, node_hash, dag_hash))
    }

    pub fn leaf(op: OpKind, shape: Shape, num_outputs: usize, hash_seed: HashValue) -> Self {
        Self::new(op, vec![], shape, num_outputs, hash_seed)
    }

    fn build(
        op: OpKind,
        operands: Vec<Value>,
        shape: Shape,
        num_outputs: usize,
        node_hash: HashValue,
        dag_hash: HashValue,
    ) -> Self {
        assert!(num_outputs > 0, "{op} must have at least one output");
        assert!(
            if num_outputs == 1 {
                !shape.is_tuple() || shape.tuple_arity() == 1
            } else {
                shape.tuple_arity() == num_outputs
            },
            "{op} declares {num_outputs} outputs but has shape {shape}"
        );
        let id = node_id();
        debug_assert!(operands.iter().all(|v| v.node.id() < id));
        log::trace!("created {op}#{id} shape={shape} hash={dag_hash:#018x}");
        Self {
            id,
            op,
            operands,
            num_outputs,
            shape,
            node_hash,
            dag_hash,
            annotations: RwLock::new(Annotations::default()),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn op(&self) -> OpKind {
        self.op
    }

    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    pub fn operand(&self, i: usize) -> &Value {
        &self.operands[i]
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Full shape; a tuple for multi-output nodes.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Shape of output `index`. Single output nodes only accept zero.
    pub fn shape_at(&self, index: usize) -> &Shape {
        assert!(
            index < self.num_outputs,
            "output index {index} out of range for {} with {} outputs",
            self.op,
            self.num_outputs
        );
        if self.shape.is_tuple() {
            return &self.shape.tuple_shapes()[index];
        }
        &self.shape
    }

    /// Hash of kind, shape and seed, ignoring operands.
    pub fn node_hash(&self) -> HashValue {
        self.node_hash
    }

    /// Hash over the whole subgraph, ignoring sharding.
    pub fn shape_hash(&self) -> HashValue {
        self.dag_hash
    }

    pub fn hash(&self) -> HashValue {
        let sharding_hash = self.sharding_hash();
        if sharding_hash != 0 {
            return hash_combine(self.dag_hash, sharding_hash);
        }
        self.dag_hash
    }

    pub fn sharding_hash(&self) -> HashValue {
        self.annotations().sharding_hash
    }

    pub fn get_sharding(&self, index: usize) -> Option<Arc<OpSharding>> {
        let ann = self.annotations();
        if ann.output_shardings.is_empty() {
            return None;
        }
        ann.output_shardings[index].clone()
    }

    pub fn output_shardings(&self) -> Vec<Option<Arc<OpSharding>>> {
        self.annotations().output_shardings.clone()
    }

    pub fn set_sharding(&self, sharding: OpSharding, index: usize) {
        assert!(
            index < self.num_outputs,
            "sharding index {index} out of range for {} with {} outputs",
            self.op,
            self.num_outputs
        );
        let mut ann = self.annotations_mut();
        if ann.output_shardings.is_empty() {
            ann.output_shardings = vec![None; self.num_outputs];
        }
        log::debug!("{}#{} output {index} sharded as {sharding}", self.op, self.id);
        ann.output_shardings[index] = Some(Arc::new(sharding));
        let sharding_hash = self.compute_sharding_hash(&ann.output_shardings);
        ann.sharding_hash = sharding_hash;
    }

    pub fn clear_sharding(&self) {
        let mut ann = self.annotations_mut();
        ann.output_shardings.clear();
        ann.sharding_hash = 0;
    }

    fn compute_sharding_hash(&self, shardings: &[Option<Arc<OpSharding>>]) -> HashValue {
        let mut h = self.node_hash;
        for (i, sharding) in shardings.iter().enumerate() {
            h = hash_combine(h, (i as u32).hash_data());
            if let Some(s) = sharding {
                h = s.fold_hash(h);
            }
        }
        h
    }

    /// Not part of the node hash.
    pub fn mark_dynamic_dimension(&self, dim: u32) {
        self.annotations_mut().dynamic_dims.insert(dim);
    }

    pub fn dynamic_dims(&self) -> BTreeSet<u32> {
        self.annotations().dynamic_dims.clone()
    }

    pub fn user_metadata(&self) -> Option<Box<dyn UserMetadata>> {
        self.annotations().user_metadata.clone()
    }

    pub fn set_user_metadata(&self, metadata: Box<dyn UserMetadata>) {
        self.annotations_mut().user_metadata = Some(metadata);
    }

    pub fn return_op(&self, op: OpHandle, loctx: &mut dyn LoweringContext) -> OpVector {
        self.return_ops(&[op], loctx)
    }

    /// Registers `ops` as outputs `0..ops.len()` of this node.
    pub fn return_ops(&self, ops: &[OpHandle], loctx: &mut dyn LoweringContext) -> OpVector {
        for (index, op) in ops.iter().enumerate() {
            loctx.assign_output_op(
                Output {
                    node: self.id,
                    index,
                },
                *op,
            );
        }
        ops.to_vec()
    }

    fn annotations(&self) -> RwLockReadGuard<'_, Annotations> {
        self.annotations.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn annotations_mut(&self) -> RwLockWriteGuard<'_, Annotations> {
        self.annotations.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl core::fmt::Display for NodeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, xla_shape={}", self.op, self.shape)?;
        if self.num_outputs > 1 {
            write!(f, ", num_outputs={}", self.num_outputs)?;
        }
        write!(
            f,
            ", dynamic_dims: ({})",
            self.annotations().dynamic_dims.iter().join(", ")
        )
    }
}

/// Attaches `metadata` to `node` and to every node below it that has none yet.
/// Returns the metadata `node` ends up with.
pub fn set_user_metadata_for_subgraph(
    node: &dyn Node,
    metadata: Box<dyn UserMetadata>,
) -> Option<Box<dyn UserMetadata>> {
    for operand in node.operands() {
        if operand.node.base().user_metadata().is_none() {
            set_user_metadata_for_subgraph(&*operand.node, metadata.clone());
        }
    }
    let base = node.base();
    if base.user_metadata().is_none() {
        base.set_user_metadata(metadata);
    }
    base.user_metadata()
}

fn get_op_hash(op: OpKind, shape: &Shape, hash_seed: HashValue) -> HashValue {
    hash_combine(op.hash(), hash_combine(hash_of(&shape.to_string()), hash_seed))
}

fn operand_hashes(operands: &[Value], node_hash: HashValue) -> HashValue {
    operands
        .iter()
        .fold(node_hash, |h, v| hash_combine(h, v.shape_hash()))
}

lazy_static::lazy_static! {
    static ref SHAPE_CACHE: Mutex<SizedCache<HashValue, Shape>> =
        Mutex::new(SizedCache::with_size(*SHAPE_CACHE_SIZE));
}

fn get_op_shape<F>(key: HashValue, shape_fn: F) -> Result<Shape>
where
    F: FnOnce() -> Result<Shape>,
{
    if let Some(shape) = SHAPE_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .cache_get(&key)
    {
        log::debug!("shape cache hit {key:#018x}");
        return Ok(shape.clone());
    }
    log::debug!("shape cache miss {key:#018x}");
    let shape = shape_fn()?;
    SHAPE_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .cache_set(key, shape.clone());
    Ok(shape)
}

pub fn shape_cache_len() -> usize {
    SHAPE_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .cache_size()
}

pub fn clear_shape_cache() {
    SHAPE_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .cache_clear()
}
