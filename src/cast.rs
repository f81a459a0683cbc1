use crate::node::Node;
use crate::op_kind::OpKind;
use crate::utils::CHECKED_CAST;

/// Recovers the concrete node type behind `node`.
///
/// Returns `None` when the node's kind is not `op` or its type is not `T`.
pub fn node_cast<T: Node>(node: &dyn Node, op: OpKind) -> Option<&T> {
    if node.op() != op {
        return None;
    }
    node.as_any().downcast_ref::<T>()
}

/// Downcast for call sites that already dispatched on the node kind.
///
/// Still returns `None` on a kind mismatch. The type itself is only verified
/// in debug builds or when `IR_CHECKED_CAST` is set; a mismatch there panics.
///
/// # Safety
///
/// Every node of kind `op` must have concrete type `T`.
pub unsafe fn node_cast_unchecked<T: Node>(node: &dyn Node, op: OpKind) -> Option<&T> {
    if node.op() != op {
        return None;
    }
    if *CHECKED_CAST {
        return match node.as_any().downcast_ref::<T>() {
            Some(t) => Some(t),
            None => panic!(
                "{op} node is not a {}: {node}",
                std::any::type_name::<T>()
            ),
        };
    }
    Some(&*(node as *const dyn Node as *const T))
}
