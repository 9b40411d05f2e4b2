//! Sequential evaluation of functions on a backend.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use rustc_hash::FxHashMap;

use crate::backend::{Backend, DevicePool, DeviceError, DeviceTensor};
use crate::graph::{Function, GraphError, Lifetime, OutputRef};
use crate::operator::{HostTensor, HostTensorMut, OpError, Operator};

/// Reasons why running a function on a backend failed.
#[derive(Debug)]
pub enum RunError {
    /// The function has tensors with no lifetime annotation. The liveness
    /// pass must run after the last graph mutation and before execution.
    LivenessNotComputed,

    /// The number of provided inputs does not match the function's
    /// parameter count.
    InputCount { expected: usize, actual: usize },

    /// A provided input's byte length does not match its parameter's
    /// descriptor.
    InputSize {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// The function's graph failed validation.
    Graph(GraphError),

    /// An operation's reference kernel failed.
    Operator { name: String, error: OpError },

    /// The backend failed to allocate or transfer memory.
    Device(DeviceError),
}

impl Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::LivenessNotComputed => {
                write!(f, "function has no liveness annotations")
            }
            RunError::InputCount { expected, actual } => {
                write!(f, "expected {} inputs but got {}", expected, actual)
            }
            RunError::InputSize {
                name,
                expected,
                actual,
            } => write!(
                f,
                "input \"{}\" is {} bytes but its parameter needs {}",
                name, actual, expected
            ),
            RunError::Graph(err) => write!(f, "graph error: {}", err),
            RunError::Operator { name, error } => {
                write!(f, "operator \"{}\" failed: {}", name, error)
            }
            RunError::Device(err) => write!(f, "device error: {}", err),
        }
    }
}

impl Error for RunError {}

impl From<GraphError> for RunError {
    fn from(err: GraphError) -> RunError {
        RunError::Graph(err)
    }
}

impl From<DeviceError> for RunError {
    fn from(err: DeviceError) -> RunError {
        RunError::Device(err)
    }
}

/// Options for [`FunctionRunner::run`].
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Print each evaluation step and buffer pool statistics.
    pub verbose: bool,
}

/// Evaluates a function node by node on one backend.
///
/// Every tensor the function produces lives on the backend. Operator
/// kernels run host-side: inputs are staged into host memory, the kernel
/// fills host output buffers and the results are written back to fresh
/// device tensors. Device buffers whose contents are dead, per the
/// function's liveness annotations, are recycled through a [`DevicePool`]
/// to back later tensors of the same size.
pub struct FunctionRunner<'a> {
    backend: &'a dyn Backend,
}

impl<'a> FunctionRunner<'a> {
    pub fn new(backend: &'a dyn Backend) -> FunctionRunner<'a> {
        FunctionRunner { backend }
    }

    /// Evaluate `function` with one host byte buffer per parameter,
    /// returning one host byte buffer per result.
    pub fn run(
        &self,
        function: &Function,
        inputs: &[&[u8]],
        opts: RunOptions,
    ) -> Result<Vec<Vec<u8>>, RunError> {
        let order = function.execution_order()?;
        let graph = function.graph();

        // Refuse to run with stale or missing annotations. Recycling
        // decisions below trust them completely.
        for &node_id in &order {
            let node = graph.get_node(node_id).ok_or(GraphError::InvalidNodeId)?;
            for output in node.outputs() {
                if !output.lifetime().is_set() {
                    return Err(RunError::LivenessNotComputed);
                }
            }
        }

        let parameters = function.parameters();
        if inputs.len() != parameters.len() {
            return Err(RunError::InputCount {
                expected: parameters.len(),
                actual: inputs.len(),
            });
        }

        let pool = DevicePool::new(self.backend);
        let mut tensors: FxHashMap<OutputRef, Box<dyn DeviceTensor>> = FxHashMap::default();

        for (&param, &data) in parameters.iter().zip(inputs) {
            let desc = graph
                .output_descriptor(param.into())
                .ok_or(GraphError::InvalidNodeId)?;
            if data.len() != desc.size_in_bytes() {
                return Err(RunError::InputSize {
                    name: graph.node_name(param),
                    expected: desc.size_in_bytes(),
                    actual: data.len(),
                });
            }
            let mut tensor = pool.alloc(desc)?;
            tensor.write(0, data)?;
            tensors.insert(param.into(), tensor);
        }

        for &node_id in &order {
            let node = graph.get_node(node_id).ok_or(GraphError::InvalidNodeId)?;
            let Some(op_node) = node.as_operator() else {
                continue;
            };

            if opts.verbose {
                println!(
                    "#{} {} ({})",
                    node_id,
                    graph.node_name(node_id),
                    Operator::type_id(op_node.operator())
                );
            }

            // Stage inputs into host memory.
            let mut staged = Vec::with_capacity(op_node.input_refs().len());
            for &input in op_node.input_refs() {
                let desc = graph
                    .output_descriptor(input)
                    .ok_or(GraphError::InvalidOutputRef {
                        node: input.node,
                        output: input.output,
                    })?;
                let tensor = tensors
                    .get(&input)
                    .ok_or(GraphError::InvalidOutputRef {
                        node: input.node,
                        output: input.output,
                    })?;
                staged.push((desc, tensor.read(0, tensor.size_in_bytes())?));
            }
            let host_inputs: Vec<HostTensor> = staged
                .iter()
                .map(|(desc, bytes)| HostTensor::new(desc, bytes))
                .collect();

            let mut out_bufs: Vec<Vec<u8>> = node
                .outputs()
                .iter()
                .map(|info| vec![0; info.descriptor().size_in_bytes()])
                .collect();
            let mut host_outputs: Vec<HostTensorMut> = out_bufs
                .iter_mut()
                .zip(node.outputs())
                .map(|(buf, info)| HostTensorMut::new(info.descriptor(), buf))
                .collect();

            op_node
                .operator()
                .evaluate(&host_inputs, &mut host_outputs)
                .map_err(|error| RunError::Operator {
                    name: graph.node_name(node_id),
                    error,
                })?;
            drop(host_outputs);
            drop(host_inputs);

            for (output, buf) in out_bufs.into_iter().enumerate() {
                let output_ref = OutputRef::new(node_id, output);
                let desc = graph
                    .output_descriptor(output_ref)
                    .ok_or(GraphError::InvalidNodeId)?;
                let mut tensor = pool.alloc(desc)?;
                tensor.write(0, &buf)?;
                tensors.insert(output_ref, tensor);
            }

            // Recycle every buffer that died at this step: consumed inputs
            // and own outputs nothing consumes. Removing from the map
            // handles an input used twice by the same node.
            let mut candidates: Vec<OutputRef> = op_node.input_refs().to_vec();
            candidates.extend((0..node.outputs().len()).map(|i| OutputRef::new(node_id, i)));
            for candidate in candidates {
                let Some(info) = graph.output_info(candidate) else {
                    continue;
                };
                if info.lifetime() != Lifetime::FreeAfter(node_id) {
                    continue;
                }
                if let Some(tensor) = tensors.remove(&candidate) {
                    pool.release(tensor);
                }
            }
        }

        if opts.verbose {
            println!(
                "pool: {} allocs, {} reused",
                pool.alloc_count(),
                pool.hit_count()
            );
        }

        let mut results = Vec::with_capacity(function.results().len());
        for &result in function.results() {
            let tensor = tensors
                .get(&result)
                .ok_or(GraphError::InvalidOutputRef {
                    node: result.node,
                    output: result.output,
                })?;
            results.push(tensor.read(0, tensor.size_in_bytes())?);
        }
        Ok(results)
    }
}
