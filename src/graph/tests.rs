use std::sync::Arc;

use crate::descriptor::{DataType, TensorDescriptor};
use crate::graph::{Function, Graph, GraphError, Lifetime, NodeId, OutputRef};
use crate::operator::{OpError, OpTypeId};
use crate::ops::{Add, Concat, Mul, Relu};

fn f32_desc(shape: &[usize]) -> TensorDescriptor {
    TensorDescriptor::new(DataType::Float, shape)
}

#[test]
fn test_add_op_infers_outputs() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("a"), f32_desc(&[2, 3]));
    let b = g.add_parameter(Some("b"), f32_desc(&[2, 3]));
    let add = g
        .add_op(Some("add"), Arc::new(Add {}), &[a.into(), b.into()])
        .unwrap();

    let node = g.get_node(add).unwrap();
    assert_eq!(node.type_id(), OpTypeId::new("Add", 1));
    assert_eq!(node.outputs().len(), 1);
    assert_eq!(node.outputs()[0].descriptor(), &f32_desc(&[2, 3]));
    assert_eq!(node.outputs()[0].lifetime(), Lifetime::Unset);
}

#[test]
fn test_add_op_checks_arity() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("a"), f32_desc(&[2]));
    let err = g.add_op(Some("add"), Arc::new(Add {}), &[a.into()]);
    assert_eq!(
        err,
        Err(GraphError::Op(OpError::InvalidArity {
            expected: 2,
            actual: 1
        }))
    );
}

#[test]
fn test_add_op_checks_input_types() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("a"), f32_desc(&[2]));
    let b = g.add_parameter(Some("b"), TensorDescriptor::new(DataType::Int32, &[2]));
    let err = g.add_op(Some("add"), Arc::new(Add {}), &[a.into(), b.into()]);
    assert!(matches!(err, Err(GraphError::Op(OpError::TypeMismatch(_)))));
}

#[test]
fn test_add_op_rejects_bad_refs() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("a"), f32_desc(&[2]));

    let bogus_node = NodeId::from_u32(42);
    let err = g.add_op(None, Arc::new(Add {}), &[a.into(), bogus_node.into()]);
    assert_eq!(err, Err(GraphError::InvalidNodeId));

    let bogus_output = OutputRef::new(a, 1);
    let err = g.add_op(None, Arc::new(Add {}), &[a.into(), bogus_output]);
    assert_eq!(
        err,
        Err(GraphError::InvalidOutputRef { node: a, output: 1 })
    );
}

#[test]
fn test_clone_with_new_inputs_preserves_identity() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("a"), f32_desc(&[2, 3]));
    let b = g.add_parameter(Some("b"), f32_desc(&[2, 3]));
    let c = g.add_parameter(Some("c"), f32_desc(&[2, 3]));
    let add = g
        .add_op(Some("add"), Arc::new(Add {}), &[a.into(), b.into()])
        .unwrap();

    let clone = g.clone_with_new_inputs(add, &[a.into(), c.into()]).unwrap();
    assert_ne!(clone, add);

    let original = g.get_node(add).unwrap();
    let cloned = g.get_node(clone).unwrap();
    assert_eq!(cloned.type_id(), original.type_id());
    assert_eq!(cloned.input_refs(), &[OutputRef::from(a), c.into()]);
    // The original is untouched.
    assert_eq!(original.input_refs(), &[OutputRef::from(a), b.into()]);
}

#[test]
fn test_clone_with_new_inputs_rejects_wrong_arity() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("a"), f32_desc(&[2]));
    let b = g.add_parameter(Some("b"), f32_desc(&[2]));
    let add = g
        .add_op(Some("add"), Arc::new(Add {}), &[a.into(), b.into()])
        .unwrap();

    // Never silently truncates or pads.
    let err = g.clone_with_new_inputs(add, &[a.into()]);
    assert_eq!(
        err,
        Err(GraphError::Op(OpError::InvalidArity {
            expected: 2,
            actual: 1
        }))
    );
    let err = g.clone_with_new_inputs(add, &[a.into(), b.into(), a.into()]);
    assert_eq!(
        err,
        Err(GraphError::Op(OpError::InvalidArity {
            expected: 2,
            actual: 3
        }))
    );
}

#[test]
fn test_clone_with_new_inputs_reruns_inference() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("a"), f32_desc(&[2]));
    let b = g.add_parameter(Some("b"), f32_desc(&[2]));
    let int_input = g.add_parameter(Some("i"), TensorDescriptor::new(DataType::Int32, &[2]));
    let short = g.add_parameter(Some("s"), f32_desc(&[3]));
    let add = g
        .add_op(Some("add"), Arc::new(Add {}), &[a.into(), b.into()])
        .unwrap();

    let err = g.clone_with_new_inputs(add, &[a.into(), int_input.into()]);
    assert!(matches!(err, Err(GraphError::Op(OpError::TypeMismatch(_)))));

    let err = g.clone_with_new_inputs(add, &[a.into(), short.into()]);
    assert!(matches!(err, Err(GraphError::Op(OpError::ShapeMismatch(_)))));
}

#[test]
fn test_clone_variadic_keeps_input_count() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("a"), f32_desc(&[2, 1]));
    let b = g.add_parameter(Some("b"), f32_desc(&[2, 2]));
    let c = g.add_parameter(Some("c"), f32_desc(&[2, 3]));
    let concat = g
        .add_op(
            Some("concat"),
            Arc::new(Concat { axis: 1 }),
            &[a.into(), b.into(), c.into()],
        )
        .unwrap();

    let err = g.clone_with_new_inputs(concat, &[a.into(), b.into()]);
    assert_eq!(
        err,
        Err(GraphError::Op(OpError::InvalidArity {
            expected: 3,
            actual: 2
        }))
    );

    let clone = g
        .clone_with_new_inputs(concat, &[c.into(), b.into(), a.into()])
        .unwrap();
    assert_eq!(
        g.output_descriptor(clone.into()).unwrap(),
        &f32_desc(&[2, 6])
    );
}

#[test]
fn test_function_construction() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("a"), f32_desc(&[4]));
    let b = g.add_parameter(Some("b"), f32_desc(&[4]));
    let add = g
        .add_op(Some("add"), Arc::new(Add {}), &[a.into(), b.into()])
        .unwrap();

    let f = Function::new(g, vec![add.into()], vec![a, b]).unwrap();
    assert_eq!(f.output_count(), 1);
    assert_eq!(f.get_output_op(0), Ok(add));
    assert_eq!(
        f.get_output_op(1),
        Err(GraphError::IndexOutOfRange { index: 1, len: 1 })
    );
    assert!(f.is_output(add.into()));
    assert!(!f.is_output(a.into()));
}

#[test]
fn test_function_rejects_dangling_parameter() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("p1"), f32_desc(&[4]));
    let b = g.add_parameter(Some("p2"), f32_desc(&[4]));
    let unused = g.add_parameter(Some("p3"), f32_desc(&[4]));
    let add = g
        .add_op(Some("add"), Arc::new(Add {}), &[a.into(), b.into()])
        .unwrap();

    let err = Function::new(g, vec![add.into()], vec![a, b, unused]);
    assert!(matches!(
        err,
        Err(GraphError::DanglingParameter { name }) if name == "p3"
    ));
}

#[test]
fn test_function_allows_declared_unused_parameter() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("a"), f32_desc(&[4]));
    let spare = g.add_unused_parameter(Some("spare"), f32_desc(&[4]));
    let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();

    let f = Function::new(g, vec![relu.into()], vec![a, spare]).unwrap();
    assert_eq!(f.parameters(), &[a, spare]);
}

#[test]
fn test_function_detects_cycle() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("a"), f32_desc(&[4]));
    let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();
    let mul = g
        .add_op(Some("mul"), Arc::new(Mul {}), &[relu.into(), relu.into()])
        .unwrap();

    let mut f = Function::new(g, vec![mul.into()], vec![a]).unwrap();

    // Rewire relu to consume mul's output, forming relu -> mul -> relu.
    f.graph_mut().replace_uses(a.into(), mul.into());
    let err = f.validate();
    assert!(matches!(err, Err(GraphError::CyclicGraph { .. })));
}

#[test]
fn test_execution_order_is_topological() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("a"), f32_desc(&[4]));
    let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();
    let mul = g
        .add_op(Some("mul"), Arc::new(Mul {}), &[relu.into(), a.into()])
        .unwrap();
    let add = g
        .add_op(Some("add"), Arc::new(Add {}), &[mul.into(), relu.into()])
        .unwrap();

    let f = Function::new(g, vec![add.into()], vec![a]).unwrap();
    let order = f.execution_order().unwrap();

    // Every node once, producers before consumers.
    assert_eq!(order.len(), 4);
    let pos = |id: NodeId| order.iter().position(|&n| n == id).unwrap();
    assert!(pos(a) < pos(relu));
    assert!(pos(relu) < pos(mul));
    assert!(pos(mul) < pos(add));
}

#[test]
fn test_replace_uses_updates_results() {
    let mut g = Graph::new();
    let a = g.add_parameter(Some("a"), f32_desc(&[4]));
    let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();
    let relu2 = g.add_op(Some("relu2"), Arc::new(Relu {}), &[a.into()]).unwrap();

    let mut f = Function::new(g, vec![relu.into()], vec![a]).unwrap();
    f.replace_uses(relu.into(), relu2.into());

    assert_eq!(f.results(), &[OutputRef::from(relu2)]);
    assert!(f.validate().is_ok());
}
