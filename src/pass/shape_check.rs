use crate::graph::Function;
use crate::pass::{Pass, PassError};

/// Verify that every operator node's stored output descriptors still agree
/// with what the operator infers from its current inputs.
///
/// Descriptors are inferred once when a node is added and become stale if a
/// later rewrite swaps an input for one with a different shape or type.
/// Running this pass after any graph-mutating pass catches such drift before
/// buffers are sized from the stored descriptors.
pub struct ShapeCheck {}

impl Pass for ShapeCheck {
    fn name(&self) -> &str {
        "ShapeCheck"
    }

    fn run(&self, function: &mut Function) -> Result<(), PassError> {
        let graph = function.graph();
        for (node_id, node) in graph.iter() {
            let Some(op_node) = node.as_operator() else {
                continue;
            };

            let mut input_descs = Vec::with_capacity(op_node.input_refs().len());
            for &input in op_node.input_refs() {
                let desc = graph.output_descriptor(input).ok_or_else(|| {
                    PassError::new(
                        self.name(),
                        format!(
                            "node \"{}\" has invalid input ref {:?}",
                            graph.node_name(node_id),
                            input
                        ),
                    )
                })?;
                input_descs.push(desc.clone());
            }

            let inferred = op_node.operator().infer_outputs(&input_descs).map_err(|err| {
                PassError::new(
                    self.name(),
                    format!(
                        "inference failed for node \"{}\": {}",
                        graph.node_name(node_id),
                        err
                    ),
                )
            })?;

            let stored = node.outputs();
            if inferred.len() != stored.len() {
                return Err(PassError::new(
                    self.name(),
                    format!(
                        "node \"{}\" stores {} outputs but inference produced {}",
                        graph.node_name(node_id),
                        stored.len(),
                        inferred.len()
                    ),
                ));
            }
            for (i, (inferred, stored)) in inferred.iter().zip(stored).enumerate() {
                if inferred != stored.descriptor() {
                    return Err(PassError::new(
                        self.name(),
                        format!(
                            "output {} of node \"{}\" has descriptor {:?} but inference produced {:?}",
                            i,
                            graph.node_name(node_id),
                            stored.descriptor(),
                            inferred
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}
