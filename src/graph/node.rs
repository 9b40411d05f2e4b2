use std::fmt;
use std::sync::Arc;

use crate::descriptor::TensorDescriptor;
use crate::operator::{OpTypeId, Operator};

use super::NodeId;

/// Identity of the built-in Parameter node kind.
pub const PARAMETER_TYPE: OpTypeId = OpTypeId::new("Parameter", 0);

/// Reference to one output of a node: the source end of a graph edge.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct OutputRef {
    pub node: NodeId,
    pub output: usize,
}

impl OutputRef {
    pub fn new(node: NodeId, output: usize) -> OutputRef {
        OutputRef { node, output }
    }
}

/// Refer to a node's first output. Covers the common single-output case.
impl From<NodeId> for OutputRef {
    fn from(node: NodeId) -> OutputRef {
        OutputRef { node, output: 0 }
    }
}

impl fmt::Debug for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.output)
    }
}

/// Buffer-lifetime annotation for one output tensor.
///
/// This is derived data computed by the [`Liveness`](crate::pass::Liveness)
/// pass, not part of node construction. Any topology mutation resets it to
/// `Unset`, and it must be recomputed before the annotation is consumed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Lifetime {
    /// Not yet assigned by a liveness analysis.
    Unset,

    /// The tensor's backing buffer may be recycled once the given node has
    /// executed. The node is the tensor's last consumer, or its producer if
    /// nothing consumes it.
    FreeAfter(NodeId),

    /// The tensor backs a function output and must never be recycled.
    Output,
}

impl Lifetime {
    pub fn is_set(self) -> bool {
        self != Lifetime::Unset
    }
}

/// Descriptor plus derived annotations for one output tensor of a node.
#[derive(Clone, Debug)]
pub struct OutputInfo {
    desc: TensorDescriptor,
    lifetime: Lifetime,
}

impl OutputInfo {
    pub(super) fn new(desc: TensorDescriptor) -> OutputInfo {
        OutputInfo {
            desc,
            lifetime: Lifetime::Unset,
        }
    }

    pub fn descriptor(&self) -> &TensorDescriptor {
        &self.desc
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn set_lifetime(&mut self, lifetime: Lifetime) {
        self.lifetime = lifetime;
    }
}

/// A graph input. Declared positionally on a [`Function`](super::Function).
#[derive(Debug)]
pub struct ParameterNode {
    name: Option<String>,
    output: OutputInfo,
    unused: bool,
}

impl ParameterNode {
    pub(super) fn new(name: Option<&str>, desc: TensorDescriptor, unused: bool) -> ParameterNode {
        ParameterNode {
            name: name.map(|s| s.to_owned()),
            output: OutputInfo::new(desc),
            unused,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn descriptor(&self) -> &TensorDescriptor {
        self.output.descriptor()
    }

    /// True if this parameter was declared as intentionally unused.
    pub fn is_unused(&self) -> bool {
        self.unused
    }
}

/// A computation step bound to the outputs of other nodes.
pub struct OperatorNode {
    name: Option<String>,
    inputs: Box<[OutputRef]>,
    outputs: Vec<OutputInfo>,
    operator: Arc<dyn Operator + Send + Sync>,
}

impl OperatorNode {
    pub(super) fn new(
        name: Option<&str>,
        inputs: &[OutputRef],
        outputs: Vec<OutputInfo>,
        operator: Arc<dyn Operator + Send + Sync>,
    ) -> OperatorNode {
        OperatorNode {
            name: name.map(|s| s.to_owned()),
            inputs: inputs.into(),
            outputs,
            operator,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn input_refs(&self) -> &[OutputRef] {
        &self.inputs
    }

    pub fn operator(&self) -> &dyn Operator {
        self.operator.as_ref()
    }

    /// Return a new `Arc` reference to this node's operator.
    ///
    /// Operators are stateless and immutable once added to a graph, so they
    /// can be "cloned" by creating a new reference.
    pub fn clone_operator(&self) -> Arc<dyn Operator + Send + Sync> {
        self.operator.clone()
    }

    pub(super) fn replace_input(&mut self, old: OutputRef, new: OutputRef) {
        for input in self.inputs.iter_mut() {
            if *input == old {
                *input = new;
            }
        }
    }
}

impl fmt::Debug for OperatorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorNode")
            .field("name", &self.name)
            .field("type", &Operator::type_id(&*self.operator))
            .field("inputs", &self.inputs)
            .finish()
    }
}

#[derive(Debug)]
pub enum Node {
    Parameter(ParameterNode),
    Operator(OperatorNode),
}

impl Node {
    /// Return the debug name of this node.
    pub fn name(&self) -> Option<&str> {
        match self {
            Node::Parameter(node) => node.name(),
            Node::Operator(node) => node.name(),
        }
    }

    /// Return the stable `(name, version)` identity of this node's kind.
    pub fn type_id(&self) -> OpTypeId {
        match self {
            Node::Parameter(_) => PARAMETER_TYPE,
            Node::Operator(node) => Operator::type_id(node.operator()),
        }
    }

    /// Ordered references to the outputs of other nodes this node consumes.
    /// Empty for parameters.
    pub fn input_refs(&self) -> &[OutputRef] {
        match self {
            Node::Parameter(_) => &[],
            Node::Operator(node) => node.input_refs(),
        }
    }

    /// Per-output descriptors and annotations.
    pub fn outputs(&self) -> &[OutputInfo] {
        match self {
            Node::Parameter(node) => std::slice::from_ref(&node.output),
            Node::Operator(node) => &node.outputs,
        }
    }

    pub(super) fn outputs_mut(&mut self) -> &mut [OutputInfo] {
        match self {
            Node::Parameter(node) => std::slice::from_mut(&mut node.output),
            Node::Operator(node) => &mut node.outputs,
        }
    }

    /// Return the contained operator node, if this is one.
    pub fn as_operator(&self) -> Option<&OperatorNode> {
        match self {
            Node::Operator(node) => Some(node),
            _ => None,
        }
    }

    /// Return the contained parameter node, if this is one.
    pub fn as_parameter(&self) -> Option<&ParameterNode> {
        match self {
            Node::Parameter(node) => Some(node),
            _ => None,
        }
    }
}
