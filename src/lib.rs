pub mod cast;
pub mod dtype;
pub mod hash;
/// NodeBase::new(kind, operands, shape | shape_fn, seed) -> Value -> GraphLoweringContext::lower_values(roots) -> Builder
pub mod lowering;
pub mod metadata;
pub mod node;
pub mod op_kind;
pub mod ops;
pub mod shape;
pub mod sharding;
pub mod utils;

pub mod prelude {
    pub use crate::cast::{node_cast, node_cast_unchecked};
    pub use crate::dtype::{self, Dtype};
    pub use crate::hash::{HashValue, DEFAULT_HASH_SEED};
    pub use crate::lowering::{
        graph_hash, post_order, Builder, GraphLoweringContext, Instruction, LoweringContext,
        OpHandle, OpVector, TraceBuilder,
    };
    pub use crate::metadata::{CustomOpNameMetadata, UserMetadata};
    pub use crate::mhash;
    pub use crate::node::{
        make_node, set_user_metadata_for_subgraph, Node, NodeBase, NodeRef, Output, Value,
    };
    pub use crate::op_kind::OpKind;
    pub use crate::ops::{AllReduce, AllReduceType, DeviceData, Token};
    pub use crate::shape::Shape;
    pub use crate::sharding::{OpSharding, ShardingType};
}
