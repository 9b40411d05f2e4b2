//! Buffer-lifetime analysis.

use crate::graph::{Function, Lifetime, OutputRef};
use crate::pass::{Pass, PassError};

/// Compute, for every tensor produced inside a function, the point at which
/// its backing buffer may be recycled.
///
/// Tensors bound to function results are marked [`Lifetime::Output`] and are
/// exempt from recycling regardless of internal consumers. Every other
/// reachable tensor is marked `FreeAfter(n)` where `n` is its last consumer
/// in the function's execution order, or its producer if nothing consumes
/// it. A tensor feeding several inputs of one node has that node as its
/// single last-use site.
///
/// The pass walks [`Function::execution_order`] in reverse, visiting each
/// node exactly once. Deriving last-use from the same fixed order the
/// runner executes makes "first consumer seen in reverse" exactly the
/// consumer that runs last, including for reconvergent (diamond-shaped)
/// graphs.
pub struct Liveness {}

impl Pass for Liveness {
    fn name(&self) -> &str {
        "Liveness"
    }

    fn run(&self, function: &mut Function) -> Result<(), PassError> {
        let order = function
            .execution_order()
            .map_err(|err| PassError::new(self.name(), err.to_string()))?;

        let results: Vec<OutputRef> = function.results().to_vec();
        let graph = function.graph_mut();

        // Stale annotations from a previous run would survive below if the
        // graph shrank, so reset first.
        graph.clear_lifetimes();

        for &result in &results {
            let info = graph
                .output_info_mut(result)
                .expect("validated result ref");
            info.set_lifetime(Lifetime::Output);
        }

        for &node_id in order.iter().rev() {
            // Finalize this node's own outputs first: every consumer has
            // already been visited, so anything still unset is either
            // unconsumed or only consumed by unreachable nodes, and dies
            // with its producer.
            let node = graph.get_node(node_id).expect("node in order");
            let output_count = node.outputs().len();
            for output in 0..output_count {
                let info = graph
                    .output_info_mut(OutputRef::new(node_id, output))
                    .expect("output in range");
                if !info.lifetime().is_set() {
                    info.set_lifetime(Lifetime::FreeAfter(node_id));
                }
            }

            let inputs: Vec<OutputRef> = graph
                .get_node(node_id)
                .expect("node in order")
                .input_refs()
                .to_vec();
            for input in inputs {
                let info = graph.output_info_mut(input).expect("validated input ref");
                if !info.lifetime().is_set() {
                    info.set_lifetime(Lifetime::FreeAfter(node_id));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::Liveness;
    use crate::descriptor::{DataType, TensorDescriptor};
    use crate::graph::{Function, Graph, Lifetime, NodeId, OutputRef};
    use crate::ops::{Add, Mul, Relu};
    use crate::pass::{Pass, PassManager};

    fn f32_desc(shape: &[usize]) -> TensorDescriptor {
        TensorDescriptor::new(DataType::Float, shape)
    }

    fn lifetime(f: &Function, output: OutputRef) -> Lifetime {
        f.graph().output_info(output).unwrap().lifetime()
    }

    #[test]
    fn test_every_reachable_tensor_is_assigned() {
        let mut g = Graph::new();
        let a = g.add_parameter(Some("a"), f32_desc(&[4]));
        let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();
        let mul = g
            .add_op(Some("mul"), Arc::new(Mul {}), &[relu.into(), a.into()])
            .unwrap();
        let mut f = Function::new(g, vec![mul.into()], vec![a]).unwrap();

        Liveness {}.run(&mut f).unwrap();

        for node_id in f.execution_order().unwrap() {
            let node = f.graph().get_node(node_id).unwrap();
            for output in 0..node.outputs().len() {
                let lt = lifetime(&f, OutputRef::new(node_id, output));
                assert!(lt.is_set(), "unassigned tensor on node {}", node_id);
            }
        }
    }

    #[test]
    fn test_last_use_is_last_consumer_in_execution_order() {
        let mut g = Graph::new();
        let a = g.add_parameter(Some("a"), f32_desc(&[4]));
        let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();
        let mul = g
            .add_op(Some("mul"), Arc::new(Mul {}), &[relu.into(), a.into()])
            .unwrap();
        let add = g
            .add_op(Some("add"), Arc::new(Add {}), &[mul.into(), relu.into()])
            .unwrap();
        let mut f = Function::new(g, vec![add.into()], vec![a]).unwrap();

        Liveness {}.run(&mut f).unwrap();

        // `a` is consumed by relu and mul; mul runs later.
        assert_eq!(lifetime(&f, a.into()), Lifetime::FreeAfter(mul));
        // relu's output is consumed by mul and add; add runs later.
        assert_eq!(lifetime(&f, relu.into()), Lifetime::FreeAfter(add));
        assert_eq!(lifetime(&f, mul.into()), Lifetime::FreeAfter(add));
        assert_eq!(lifetime(&f, add.into()), Lifetime::Output);
    }

    #[test]
    fn test_self_consumption_is_single_last_use() {
        // A tensor feeding both inputs of the same node ends its lifetime
        // at that node.
        let mut g = Graph::new();
        let a = g.add_parameter(Some("a"), f32_desc(&[2, 3]));
        let add = g
            .add_op(Some("add"), Arc::new(Add {}), &[a.into(), a.into()])
            .unwrap();
        let mut f = Function::new(g, vec![add.into()], vec![a]).unwrap();

        Liveness {}.run(&mut f).unwrap();

        assert_eq!(lifetime(&f, a.into()), Lifetime::FreeAfter(add));
        assert_eq!(lifetime(&f, add.into()), Lifetime::Output);
    }

    #[test]
    fn test_outputs_are_permanent_despite_consumers() {
        // relu's output is both a function result and an internal input to
        // mul; the result flag wins unconditionally.
        let mut g = Graph::new();
        let a = g.add_parameter(Some("a"), f32_desc(&[4]));
        let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();
        let mul = g
            .add_op(Some("mul"), Arc::new(Mul {}), &[relu.into(), relu.into()])
            .unwrap();
        let mut f = Function::new(g, vec![relu.into(), mul.into()], vec![a]).unwrap();

        Liveness {}.run(&mut f).unwrap();

        assert_eq!(lifetime(&f, relu.into()), Lifetime::Output);
        assert_eq!(lifetime(&f, mul.into()), Lifetime::Output);
    }

    #[test]
    fn test_output_with_no_consumers_is_permanent() {
        let mut g = Graph::new();
        let a = g.add_parameter(Some("a"), f32_desc(&[4]));
        let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();
        let mut f = Function::new(g, vec![relu.into()], vec![a]).unwrap();

        Liveness {}.run(&mut f).unwrap();
        assert_eq!(lifetime(&f, relu.into()), Lifetime::Output);
    }

    #[test]
    fn test_diamond_reconvergence() {
        //        a
        //       / \
        //   relu   relu2
        //       \ /
        //       add
        let mut g = Graph::new();
        let a = g.add_parameter(Some("a"), f32_desc(&[4]));
        let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();
        let relu2 = g.add_op(Some("relu2"), Arc::new(Relu {}), &[a.into()]).unwrap();
        let add = g
            .add_op(Some("add"), Arc::new(Add {}), &[relu.into(), relu2.into()])
            .unwrap();
        let mut f = Function::new(g, vec![add.into()], vec![a]).unwrap();

        let order = f.execution_order().unwrap();
        Liveness {}.run(&mut f).unwrap();

        // `a` must stay live until whichever branch the execution order
        // runs second, never the first.
        let Lifetime::FreeAfter(last_use) = lifetime(&f, a.into()) else {
            panic!("expected FreeAfter for a");
        };
        let pos = |id: NodeId| order.iter().position(|&n| n == id).unwrap();
        assert_eq!(pos(last_use), pos(relu).max(pos(relu2)));

        assert_eq!(lifetime(&f, relu.into()), Lifetime::FreeAfter(add));
        assert_eq!(lifetime(&f, relu2.into()), Lifetime::FreeAfter(add));
    }

    #[test]
    fn test_recompute_after_rewire() {
        let mut g = Graph::new();
        let a = g.add_parameter(Some("a"), f32_desc(&[4]));
        let relu = g.add_op(Some("relu"), Arc::new(Relu {}), &[a.into()]).unwrap();
        let relu2 = g.add_op(Some("relu2"), Arc::new(Relu {}), &[a.into()]).unwrap();
        let add = g
            .add_op(Some("add"), Arc::new(Add {}), &[relu.into(), relu.into()])
            .unwrap();
        let mut f = Function::new(g, vec![add.into()], vec![a]).unwrap();

        let mut manager = PassManager::new();
        manager.register_pass(Liveness {});
        manager.run_passes(&mut f).unwrap();
        assert_eq!(lifetime(&f, relu.into()), Lifetime::FreeAfter(add));

        // Rewiring resets annotations; a fresh run reflects the new
        // topology.
        f.replace_uses(relu.into(), relu2.into());
        assert_eq!(lifetime(&f, relu.into()), Lifetime::Unset);

        manager.run_passes(&mut f).unwrap();
        assert_eq!(lifetime(&f, relu2.into()), Lifetime::FreeAfter(add));
    }
}
