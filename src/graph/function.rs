use rustc_hash::FxHashSet;

use super::{Graph, GraphError, Node, NodeId, OutputRef};

/// A complete, validated computation graph: an ordered set of parameters, an
/// ordered set of results, and the node arena connecting them.
///
/// Construction validates that the graph reachable backward from the results
/// is acyclic and that every declared parameter is either reachable or
/// explicitly marked unused. Passes operate on functions via
/// [`PassManager::run_passes`](crate::pass::PassManager::run_passes).
pub struct Function {
    graph: Graph,
    parameters: Vec<NodeId>,
    results: Vec<OutputRef>,
}

impl Function {
    /// Construct a function from `graph` with the given results and an
    /// explicit, ordered parameter list.
    pub fn new(
        graph: Graph,
        results: Vec<OutputRef>,
        parameters: Vec<NodeId>,
    ) -> Result<Function, GraphError> {
        for &result in &results {
            graph.check_ref(result)?;
        }
        for &param in &parameters {
            match graph.get_node(param) {
                Some(Node::Parameter(_)) => {}
                Some(_) | None => return Err(GraphError::InvalidNodeId),
            }
        }

        let function = Function {
            graph,
            parameters,
            results,
        };
        function.validate()?;
        Ok(function)
    }

    /// Re-check the function's structural invariants.
    ///
    /// Passes may rewire the graph; the pass manager re-validates after each
    /// pass so a rewrite can never leave a cyclic graph behind unnoticed.
    pub fn validate(&self) -> Result<(), GraphError> {
        let order = self.execution_order()?;
        let reachable: FxHashSet<NodeId> = order.iter().copied().collect();

        for &param in &self.parameters {
            let Some(Node::Parameter(param_node)) = self.graph.get_node(param) else {
                return Err(GraphError::InvalidNodeId);
            };
            if !reachable.contains(&param) && !param_node.is_unused() {
                return Err(GraphError::DanglingParameter {
                    name: self.graph.node_name(param),
                });
            }
        }
        Ok(())
    }

    /// Return a deterministic topological order of all nodes reachable from
    /// the results: a node always appears after every node it consumes.
    ///
    /// This is the order the reference runner executes and the order the
    /// liveness pass walks in reverse, so the two always agree on which
    /// consumer of a tensor runs last.
    pub fn execution_order(&self) -> Result<Vec<NodeId>, GraphError> {
        // Depth first post-order traversal from the results. A helper struct
        // is used as recursive closures are not supported in Rust.
        struct Visitor<'a> {
            graph: &'a Graph,
            visited: FxHashSet<NodeId>,
            on_path: FxHashSet<NodeId>,
            order: Vec<NodeId>,
        }
        impl Visitor<'_> {
            fn visit(&mut self, id: NodeId) -> Result<(), GraphError> {
                if self.visited.contains(&id) {
                    return Ok(());
                }
                if !self.on_path.insert(id) {
                    return Err(GraphError::CyclicGraph {
                        node: self.graph.node_name(id),
                    });
                }
                let node = self.graph.get_node(id).ok_or(GraphError::InvalidNodeId)?;
                for input in node.input_refs() {
                    self.visit(input.node)?;
                }
                self.on_path.remove(&id);
                self.visited.insert(id);
                self.order.push(id);
                Ok(())
            }
        }

        let mut visitor = Visitor {
            graph: &self.graph,
            visited: FxHashSet::default(),
            on_path: FxHashSet::default(),
            order: Vec::new(),
        };
        for result in &self.results {
            visitor.visit(result.node)?;
        }
        Ok(visitor.order)
    }

    /// Number of function outputs.
    pub fn output_count(&self) -> usize {
        self.results.len()
    }

    /// Return the node producing the i-th result.
    pub fn get_output_op(&self, index: usize) -> Result<NodeId, GraphError> {
        self.results
            .get(index)
            .map(|r| r.node)
            .ok_or(GraphError::IndexOutOfRange {
                index,
                len: self.results.len(),
            })
    }

    /// True if `output` is one of this function's declared results, as
    /// opposed to an internal intermediate value.
    pub fn is_output(&self, output: OutputRef) -> bool {
        self.results.contains(&output)
    }

    pub fn results(&self) -> &[OutputRef] {
        &self.results
    }

    pub fn parameters(&self) -> &[NodeId] {
        &self.parameters
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Replace every use of `old` with `new`, in operator inputs and in the
    /// function's result list.
    pub fn replace_uses(&mut self, old: OutputRef, new: OutputRef) {
        self.graph.replace_uses(old, new);
        for result in self.results.iter_mut() {
            if *result == old {
                *result = new;
            }
        }
    }
}
