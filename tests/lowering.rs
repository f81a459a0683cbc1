use std::any::Any;

use squall::prelude::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn data(name: &str) -> Value {
    Value::new(make_node(DeviceData::new(
        name,
        Shape::array(dtype::float32, [4, 4]),
    )))
}

fn token() -> Value {
    Value::new(make_node(Token::new()))
}

fn groups() -> Vec<Vec<i64>> {
    vec![vec![0, 1], vec![2, 3]]
}

#[test]
fn single_form_lowers_to_one_op() {
    init();
    let x = data("x");
    let ar = Value::new(make_node(AllReduce::single(
        AllReduceType::Sum,
        &x,
        1.0,
        groups(),
    )));
    let mut ctx = GraphLoweringContext::new(TraceBuilder::new());
    let roots = ctx.lower_values(&[ar.clone()]).unwrap();
    assert_eq!(roots.len(), 1);
    let ops = ctx.lower_node(&ar.node).unwrap();
    assert_eq!(ops, roots);

    let builder = ctx.into_inner();
    let ins = builder.instruction(roots[0]).unwrap();
    assert_eq!(ins.opcode, "all-reduce");
    assert_eq!(ins.shape, Shape::array(dtype::float32, [4, 4]));
    assert_eq!(
        builder.render(),
        "%0 = f32[4,4] parameter(), number=0, name=x\n\
         %1 = f32[4,4] all-reduce(%0), to_apply=sum, replica_groups={{0,1},{2,3}}"
    );
}

#[test]
fn token_form_lowers_to_k_plus_one_ops() {
    init();
    let xs: Vec<Value> = (0..3).map(|i| data(&format!("x{i}"))).collect();
    let node = make_node(
        AllReduce::new(AllReduceType::Sum, &xs, &token(), 0.5, groups(), true).unwrap(),
    );
    let mut ctx = GraphLoweringContext::new(TraceBuilder::new());
    ctx.lower_values(&xs).unwrap();
    ctx.lower_values(&[node.operands()[3].clone()]).unwrap();
    let ops = ctx.lower_node(&node).unwrap();
    assert_eq!(ops.len(), 4);
    for (i, op) in ops.iter().enumerate() {
        let out = Value::with_index(node.clone(), i);
        assert_eq!(ctx.get_output_op(&out).unwrap(), *op);
        let ins = ctx.inner().instruction(*op).unwrap();
        assert_eq!(ins.opcode, "get-tuple-element");
        assert_eq!(&ins.shape, out.shape());
    }
    assert!(ctx.inner().shape(ops[3]).unwrap().is_token());
    let tuple = ctx.inner().instruction(ops[0]).unwrap().operands[0];
    let reduce = ctx.inner().instruction(tuple).unwrap();
    assert_eq!(reduce.opcode, "all-reduce");
    assert_eq!(reduce.operands.len(), 4);
    assert!(reduce.attributes.contains("scale=0.5"));
    assert!(reduce.attributes.contains("pin_layout=true"));
}

#[test]
fn tokens_chain_collectives() {
    init();
    let x = data("x");
    let y = data("y");
    let first = make_node(
        AllReduce::new(AllReduceType::Sum, &[x], &token(), 1.0, groups(), false).unwrap(),
    );
    let next_token = Value::with_index(first.clone(), 1);
    let second = make_node(
        AllReduce::new(AllReduceType::Sum, &[y], &next_token, 1.0, groups(), false).unwrap(),
    );
    let roots = vec![
        Value::with_index(first.clone(), 0),
        Value::with_index(second.clone(), 0),
        Value::with_index(second.clone(), 1),
    ];

    let order = post_order(&roots);
    let position = |n: &NodeRef| order.iter().position(|o| o.id() == n.id()).unwrap();
    assert_eq!(order.len(), 5);
    assert!(position(&first) < position(&second));

    let mut ctx = GraphLoweringContext::new(TraceBuilder::new());
    let ops = ctx.lower_values(&roots).unwrap();
    assert_eq!(ops.len(), 3);
    let builder = ctx.inner();
    let reduces: Vec<&Instruction> = builder
        .instructions()
        .iter()
        .filter(|i| i.opcode == "all-reduce")
        .collect();
    assert_eq!(reduces.len(), 2);
    // The second collective consumes the token the first one produced.
    let first_token = ctx.get_output_op(&next_token).unwrap();
    assert_eq!(*reduces[1].operands.last().unwrap(), first_token);
}

#[test]
fn lowering_twice_reuses_ops() {
    let x = data("x");
    let ar = Value::new(make_node(AllReduce::single(AllReduceType::Max, &x, 1.0, vec![])));
    let mut ctx = GraphLoweringContext::new(TraceBuilder::new());
    let a = ctx.lower_values(&[ar.clone()]).unwrap();
    let count = ctx.inner().instructions().len();
    let b = ctx.lower_values(&[ar.clone(), x.clone()]).unwrap();
    assert_eq!(a[0], b[0]);
    assert_eq!(ctx.inner().instructions().len(), count);
    assert!(ctx.is_lowered(&x.node));
}

#[test]
fn shared_operands_lower_once() {
    let x = data("x");
    let a = Value::new(make_node(AllReduce::single(AllReduceType::Sum, &x, 1.0, vec![])));
    let b = Value::new(make_node(AllReduce::single(AllReduceType::Min, &x, 1.0, vec![])));
    let mut ctx = GraphLoweringContext::new(TraceBuilder::new());
    ctx.lower_values(&[a, b]).unwrap();
    let params = ctx
        .inner()
        .instructions()
        .iter()
        .filter(|i| i.opcode == "parameter")
        .count();
    assert_eq!(params, 1);
}

#[test]
fn unlowered_operand_is_an_error() {
    let x = data("x");
    let ar = make_node(AllReduce::single(AllReduceType::Sum, &x, 1.0, vec![]));
    let mut ctx = GraphLoweringContext::new(TraceBuilder::new());
    let err = ctx.lower_node(&ar).unwrap_err();
    assert!(err.to_string().contains("has not been lowered"));
    assert!(ctx.get_output_op(&x).is_err());
}

#[derive(Debug)]
struct Unlowerable {
    base: NodeBase,
}

impl Node for Unlowerable {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn missing_lowering_is_an_error() {
    let node = make_node(Unlowerable {
        base: NodeBase::leaf(OpKind::new("test", "unlowerable"), Shape::token(), 1, 0),
    });
    let mut ctx = GraphLoweringContext::new(TraceBuilder::new());
    let err = ctx.lower_values(&[Value::new(node)]).unwrap_err();
    assert!(format!("{err:#}").contains("lowering not implemented"));
}

/// Returns fewer ops than it has outputs.
#[derive(Debug)]
struct ShortLowering {
    base: NodeBase,
}

impl Node for ShortLowering {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn lower(&self, loctx: &mut dyn LoweringContext) -> anyhow::Result<OpVector> {
        let op = loctx.builder().create_token()?;
        Ok(self.base.return_op(op, loctx))
    }
}

#[test]
fn output_count_is_checked() {
    let node = make_node(ShortLowering {
        base: NodeBase::leaf(
            OpKind::new("test", "short"),
            Shape::tuple(vec![Shape::token(), Shape::token()]),
            2,
            0,
        ),
    });
    let mut ctx = GraphLoweringContext::new(TraceBuilder::new());
    assert!(ctx.lower_node(&node).is_err());
}

#[test]
fn graph_hash_tracks_roots() {
    let a = data("a");
    let b = data("b");
    assert_eq!(graph_hash(&[a.clone(), b.clone()]), graph_hash(&[data("a"), data("b")]));
    assert_ne!(graph_hash(&[a.clone(), b.clone()]), graph_hash(&[b.clone(), a.clone()]));
    let h = graph_hash(&[a.clone()]);
    a.node.base().set_sharding(OpSharding::replicated(), 0);
    assert_ne!(graph_hash(&[a]), h);
}
