//! opgraph is a graph-based intermediate representation for numeric
//! computations, plus the machinery to analyze and run it.
//!
//! # Building graphs
//!
//! A [`Graph`] is an arena of nodes addressed by [`NodeId`] handles. Leaf
//! nodes are parameters declaring an element type and shape
//! ([`TensorDescriptor`]); interior nodes apply an [`Operator`] to the
//! outputs of earlier nodes, with output descriptors inferred at
//! construction time. A [`Function`] selects which nodes are the
//! parameters and which node outputs are the results, and validates that
//! the graph between them is a DAG.
//!
//! ```
//! use std::sync::Arc;
//!
//! use opgraph::{DataType, Function, Graph, TensorDescriptor};
//! use opgraph::ops::{Add, Relu};
//!
//! let mut graph = Graph::new();
//! let desc = TensorDescriptor::new(DataType::Float, &[2, 3]);
//! let a = graph.add_parameter(Some("a"), desc.clone());
//! let b = graph.add_parameter(Some("b"), desc);
//! let sum = graph.add_op(Some("sum"), Arc::new(Add {}), &[a.into(), b.into()])?;
//! let out = graph.add_op(Some("out"), Arc::new(Relu {}), &[sum.into()])?;
//! let function = Function::new(graph, vec![out.into()], vec![a, b])?;
//! # Ok::<(), opgraph::GraphError>(())
//! ```
//!
//! # Analyzing and transforming
//!
//! Passes implement the [`Pass`](pass::Pass) trait and run through a
//! [`PassManager`](pass::PassManager). The [`Liveness`](pass::Liveness)
//! pass annotates every tensor with the point its buffer dies, which the
//! runner uses to recycle device memory.
//!
//! # Running on a backend
//!
//! A [`Backend`](backend::Backend) allocates byte-addressable device
//! tensors; [`backend::create`] constructs one by name.
//! [`FunctionRunner`] evaluates a liveness-annotated function on a
//! backend, staging operator kernels through host memory.

pub mod backend;
pub mod ops;
pub mod pass;

mod descriptor;
mod fingerprint;
mod graph;
mod operator;
mod runner;
mod serialize;

pub use descriptor::{DataType, TensorDescriptor};
pub use fingerprint::node_fingerprint;
pub use graph::{
    Function, Graph, GraphError, Lifetime, Node, NodeId, OperatorNode, OutputInfo, OutputRef,
    ParameterNode, PARAMETER_TYPE,
};
pub use operator::{
    AttributeVisitor, HostTensor, HostTensorMut, OpError, OpTypeId, Operator, OutputDescs,
};
pub use runner::{FunctionRunner, RunError, RunOptions};
pub use serialize::{function_to_json, node_to_json};
