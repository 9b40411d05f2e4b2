use rustc_hash::FxHashMap;

use crate::graph::{Function, OutputRef};
use crate::ops::Identity;
use crate::pass::{Pass, PassError};

/// Remove `Identity` nodes by rewiring their consumers to the identity's
/// input.
///
/// A result bound to an identity output is rebound to the input, so the
/// function computes the same values with one fewer copy. The identity node
/// itself stays in the arena but becomes unreachable.
pub struct EliminateIdentity {}

impl Pass for EliminateIdentity {
    fn name(&self) -> &str {
        "EliminateIdentity"
    }

    fn run(&self, function: &mut Function) -> Result<(), PassError> {
        let rewires: FxHashMap<OutputRef, OutputRef> = function
            .graph()
            .iter()
            .filter_map(|(node_id, node)| {
                let op_node = node.as_operator()?;
                op_node.operator().downcast_ref::<Identity>()?;
                let &[input] = op_node.input_refs() else {
                    return None;
                };
                Some((OutputRef::new(node_id, 0), input))
            })
            .collect();

        for (&old, &new) in &rewires {
            // Chains of identities resolve through to the first
            // non-identity source. Termination holds because the graph is
            // acyclic.
            let mut target = new;
            while let Some(&next) = rewires.get(&target) {
                target = next;
            }
            function.replace_uses(old, target);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::EliminateIdentity;
    use crate::descriptor::{DataType, TensorDescriptor};
    use crate::graph::{Function, Graph, OutputRef};
    use crate::ops::{Add, Identity, Relu};
    use crate::pass::Pass;

    fn f32_desc(shape: &[usize]) -> TensorDescriptor {
        TensorDescriptor::new(DataType::Float, shape)
    }

    #[test]
    fn test_consumers_rewired_to_input() {
        let mut g = Graph::new();
        let a = g.add_parameter(Some("a"), f32_desc(&[4]));
        let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();
        let id = g
            .add_op(Some("copy"), Arc::new(Identity {}), &[relu.into()])
            .unwrap();
        let add = g
            .add_op(Some("add"), Arc::new(Add {}), &[id.into(), a.into()])
            .unwrap();
        let mut f = Function::new(g, vec![add.into()], vec![a]).unwrap();

        EliminateIdentity {}.run(&mut f).unwrap();

        let add_node = f.graph().get_node(add).unwrap();
        assert_eq!(add_node.input_refs(), &[relu.into(), a.into()]);
        assert!(!f.execution_order().unwrap().contains(&id));
    }

    #[test]
    fn test_result_rebound_to_input() {
        let mut g = Graph::new();
        let a = g.add_parameter(Some("a"), f32_desc(&[4]));
        let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();
        let id = g
            .add_op(Some("copy"), Arc::new(Identity {}), &[relu.into()])
            .unwrap();
        let mut f = Function::new(g, vec![id.into()], vec![a]).unwrap();

        EliminateIdentity {}.run(&mut f).unwrap();

        assert_eq!(f.results(), &[OutputRef::from(relu)]);
        assert!(f.is_output(relu.into()));
    }

    #[test]
    fn test_identity_chain_collapses() {
        let mut g = Graph::new();
        let a = g.add_parameter(Some("a"), f32_desc(&[4]));
        let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();
        let id1 = g
            .add_op(Some("copy1"), Arc::new(Identity {}), &[relu.into()])
            .unwrap();
        let id2 = g
            .add_op(Some("copy2"), Arc::new(Identity {}), &[id1.into()])
            .unwrap();
        let mut f = Function::new(g, vec![id2.into()], vec![a]).unwrap();

        EliminateIdentity {}.run(&mut f).unwrap();

        assert_eq!(f.results(), &[OutputRef::from(relu)]);
    }

    #[test]
    fn test_non_identity_nodes_untouched() {
        let mut g = Graph::new();
        let a = g.add_parameter(Some("a"), f32_desc(&[4]));
        let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();
        let mut f = Function::new(g, vec![relu.into()], vec![a]).unwrap();

        EliminateIdentity {}.run(&mut f).unwrap();
        assert_eq!(f.results(), &[OutputRef::from(relu)]);
        assert_eq!(f.execution_order().unwrap().len(), 2);
    }
}
