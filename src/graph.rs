//! The dataflow graph IR.
//!
//! Nodes live in an arena ([`Graph`]) and are addressed by [`NodeId`]
//! handles; a [`Function`] declares which arena nodes are its parameters and
//! which node outputs are its results. Node topology is immutable after
//! construction except through [`Graph::clone_with_new_inputs`], which
//! builds a new node rather than mutating one in place, and
//! [`Graph::replace_uses`], the consumer-rewiring primitive used by passes.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use crate::descriptor::TensorDescriptor;
use crate::operator::{OpError, Operator};

mod function;
mod node;
mod node_id;

#[cfg(test)]
mod tests;

pub use function::Function;
pub use node::{
    Lifetime, Node, OperatorNode, OutputInfo, OutputRef, ParameterNode, PARAMETER_TYPE,
};
pub use node_id::NodeId;

/// Errors arising from graph or function construction.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphError {
    /// A node ID does not refer to a node in the graph.
    InvalidNodeId,

    /// An input reference names a node output that does not exist.
    InvalidOutputRef { node: NodeId, output: usize },

    /// Backward traversal from the function's results revisited a node on
    /// the current traversal path.
    CyclicGraph { node: String },

    /// A declared parameter is not reachable from the function's results
    /// and was not marked as intentionally unused.
    DanglingParameter { name: String },

    /// An output index passed to [`Function::get_output_op`] is invalid.
    IndexOutOfRange { index: usize, len: usize },

    /// Node construction failed (arity, shape or type constraints).
    Op(OpError),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::InvalidNodeId => write!(f, "node ID is invalid"),
            GraphError::InvalidOutputRef { node, output } => {
                write!(f, "node {} has no output {}", node, output)
            }
            GraphError::CyclicGraph { node } => {
                write!(f, "graph contains a cycle through \"{}\"", node)
            }
            GraphError::DanglingParameter { name } => {
                write!(f, "parameter \"{}\" is not reachable from any result", name)
            }
            GraphError::IndexOutOfRange { index, len } => {
                write!(f, "output index {} out of range for {} outputs", index, len)
            }
            GraphError::Op(err) => write!(f, "operation construction failed: {}", err),
        }
    }
}

impl Error for GraphError {}

impl From<OpError> for GraphError {
    fn from(err: OpError) -> GraphError {
        GraphError::Op(err)
    }
}

/// Arena of graph nodes.
///
/// A graph holds parameters and operator nodes; [`Function`] adds the
/// declared parameter order and result set on top and owns the arena.
#[derive(Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    /// Create a new empty dataflow graph.
    pub fn new() -> Graph {
        Graph { nodes: Vec::new() }
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId::from_u32((self.nodes.len() - 1) as u32)
    }

    /// Add a parameter (graph input) node.
    ///
    /// `name` is an identifier used in debug and error messages.
    pub fn add_parameter(&mut self, name: Option<&str>, desc: TensorDescriptor) -> NodeId {
        self.push_node(Node::Parameter(ParameterNode::new(name, desc, false)))
    }

    /// Add a parameter that is declared but intentionally not consumed.
    ///
    /// Function validation exempts such parameters from the
    /// [`DanglingParameter`](GraphError::DanglingParameter) check.
    pub fn add_unused_parameter(&mut self, name: Option<&str>, desc: TensorDescriptor) -> NodeId {
        self.push_node(Node::Parameter(ParameterNode::new(name, desc, true)))
    }

    /// Add an operator node bound to `inputs`.
    ///
    /// Checks the operation's arity, then runs shape/type inference on the
    /// input descriptors to determine the node's output descriptors.
    /// Inference failures surface as [`GraphError::Op`] before the node is
    /// added; a node never enters the arena in a half-constructed state.
    pub fn add_op(
        &mut self,
        name: Option<&str>,
        op: Arc<dyn Operator + Send + Sync>,
        inputs: &[OutputRef],
    ) -> Result<NodeId, GraphError> {
        if let Some(expected) = op.arity() {
            if inputs.len() != expected {
                return Err(OpError::InvalidArity {
                    expected,
                    actual: inputs.len(),
                }
                .into());
            }
        }
        let input_descs = self.input_descriptors(inputs)?;
        let output_descs = op.infer_outputs(&input_descs)?;
        let outputs = output_descs.into_iter().map(OutputInfo::new).collect();
        Ok(self.push_node(Node::Operator(OperatorNode::new(name, inputs, outputs, op))))
    }

    /// Create a new node with the same identity and attributes as `node`,
    /// bound to `new_inputs`.
    ///
    /// The original node is left untouched, so other graphs or consumers
    /// sharing it are unaffected. Fails with `InvalidArity` if the input
    /// count differs from the original's, and re-runs shape/type inference
    /// which may fail if the new inputs are structurally incompatible.
    pub fn clone_with_new_inputs(
        &mut self,
        node: NodeId,
        new_inputs: &[OutputRef],
    ) -> Result<NodeId, GraphError> {
        match self.get_node(node).ok_or(GraphError::InvalidNodeId)? {
            Node::Parameter(param) => {
                if !new_inputs.is_empty() {
                    return Err(OpError::InvalidArity {
                        expected: 0,
                        actual: new_inputs.len(),
                    }
                    .into());
                }
                let (name, desc, unused) = (
                    param.name().map(|s| s.to_owned()),
                    param.descriptor().clone(),
                    param.is_unused(),
                );
                Ok(self.push_node(Node::Parameter(ParameterNode::new(
                    name.as_deref(),
                    desc,
                    unused,
                ))))
            }
            Node::Operator(op_node) => {
                let expected = op_node.input_refs().len();
                if new_inputs.len() != expected {
                    return Err(OpError::InvalidArity {
                        expected,
                        actual: new_inputs.len(),
                    }
                    .into());
                }
                let name = op_node.name().map(|s| s.to_owned());
                let op = op_node.clone_operator();
                self.add_op_unchecked_arity(name.as_deref(), op, new_inputs)
            }
        }
    }

    // Arity was validated against the original node; variadic operations
    // must keep their original input count on clone rather than being
    // re-checked against `Operator::arity`.
    fn add_op_unchecked_arity(
        &mut self,
        name: Option<&str>,
        op: Arc<dyn Operator + Send + Sync>,
        inputs: &[OutputRef],
    ) -> Result<NodeId, GraphError> {
        let input_descs = self.input_descriptors(inputs)?;
        let output_descs = op.infer_outputs(&input_descs)?;
        let outputs = output_descs.into_iter().map(OutputInfo::new).collect();
        Ok(self.push_node(Node::Operator(OperatorNode::new(name, inputs, outputs, op))))
    }

    /// Retrieve a node by ID.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.as_usize())
    }

    /// Return the debug name for a node.
    pub fn node_name(&self, id: NodeId) -> String {
        self.get_node(id)
            .and_then(|node| node.name())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("[ID: {}]", id))
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over nodes and their IDs.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId::from_u32(i as u32), node))
    }

    /// Look up the descriptor/annotation record for one node output.
    pub fn output_info(&self, output: OutputRef) -> Option<&OutputInfo> {
        self.get_node(output.node)?.outputs().get(output.output)
    }

    /// Mutable access to one output's annotation record, for passes.
    pub fn output_info_mut(&mut self, output: OutputRef) -> Option<&mut OutputInfo> {
        self.nodes
            .get_mut(output.node.as_usize())?
            .outputs_mut()
            .get_mut(output.output)
    }

    /// Look up the descriptor for one node output.
    pub fn output_descriptor(&self, output: OutputRef) -> Option<&TensorDescriptor> {
        self.output_info(output).map(|info| info.descriptor())
    }

    /// Replace every use of `old` as an operator input with `new`.
    ///
    /// This is the rewiring half of a graph rewrite: a pass builds a
    /// replacement node via [`clone_with_new_inputs`](Self::clone_with_new_inputs)
    /// or [`add_op`](Self::add_op), then redirects consumers here. Liveness
    /// annotations are derived from topology and are reset by this call.
    pub fn replace_uses(&mut self, old: OutputRef, new: OutputRef) {
        for node in self.nodes.iter_mut() {
            if let Node::Operator(op_node) = node {
                op_node.replace_input(old, new);
            }
        }
        self.clear_lifetimes();
    }

    /// Reset every output's lifetime annotation to [`Lifetime::Unset`].
    pub fn clear_lifetimes(&mut self) {
        for node in self.nodes.iter_mut() {
            for info in node.outputs_mut() {
                info.set_lifetime(Lifetime::Unset);
            }
        }
    }

    fn check_ref(&self, output: OutputRef) -> Result<(), GraphError> {
        match self.get_node(output.node) {
            None => Err(GraphError::InvalidNodeId),
            Some(node) if output.output >= node.outputs().len() => {
                Err(GraphError::InvalidOutputRef {
                    node: output.node,
                    output: output.output,
                })
            }
            Some(_) => Ok(()),
        }
    }

    fn input_descriptors(&self, inputs: &[OutputRef]) -> Result<Vec<TensorDescriptor>, GraphError> {
        inputs
            .iter()
            .map(|&input| {
                self.check_ref(input)?;
                Ok(self
                    .output_descriptor(input)
                    .expect("checked ref")
                    .clone())
            })
            .collect()
    }
}
