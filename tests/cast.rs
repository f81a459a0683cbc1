use squall::ops::{xla_create_token, xla_cross_replica_sum, xla_device_data};
use squall::prelude::*;

fn reduce() -> NodeRef {
    let x = Value::new(make_node(DeviceData::new(
        "x",
        Shape::array(dtype::float32, [2]),
    )));
    make_node(AllReduce::single(AllReduceType::Sum, &x, 1.0, vec![]))
}

#[test]
fn checked_cast() {
    let node = reduce();
    let ar = node_cast::<AllReduce>(&*node, *xla_cross_replica_sum).unwrap();
    assert_eq!(ar.reduce_type(), AllReduceType::Sum);
    assert!(node_cast::<AllReduce>(&*node, *xla_device_data).is_none());
    // Kind matches, type does not.
    assert!(node_cast::<Token>(&*node, *xla_cross_replica_sum).is_none());
}

#[test]
fn cast_operands() {
    let node = reduce();
    let operand = &node.operands()[0];
    let data = node_cast::<DeviceData>(&*operand.node, *xla_device_data).unwrap();
    assert_eq!(data.name(), "x");
}

#[test]
fn unchecked_cast() {
    let node = make_node(Token::new());
    let token = unsafe { node_cast_unchecked::<Token>(&*node, *xla_create_token) };
    assert!(token.is_some());
    let other = unsafe { node_cast_unchecked::<Token>(&*node, *xla_cross_replica_sum) };
    assert!(other.is_none());
}

#[cfg(debug_assertions)]
#[test]
#[should_panic]
fn unchecked_cast_verifies_in_debug() {
    let node = reduce();
    let _ = unsafe { node_cast_unchecked::<Token>(&*node, *xla_cross_replica_sum) };
}
