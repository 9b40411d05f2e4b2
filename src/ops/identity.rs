//! The no-op identity operation.

use crate::descriptor::TensorDescriptor;
use crate::operator::{HostTensor, HostTensorMut, OpError, OpTypeId, Operator, OutputDescs};

/// Pass a tensor through unchanged.
///
/// Identity nodes typically appear as placeholders left behind by import
/// layers; the [`EliminateIdentity`](crate::pass::EliminateIdentity) pass
/// removes them by rewiring consumers.
#[derive(Clone, Debug)]
pub struct Identity {}

impl Operator for Identity {
    fn type_id(&self) -> OpTypeId {
        OpTypeId::new("Identity", 1)
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }

    fn infer_outputs(&self, inputs: &[TensorDescriptor]) -> Result<OutputDescs, OpError> {
        let [input] = inputs else {
            return Err(OpError::InvalidArity {
                expected: 1,
                actual: inputs.len(),
            });
        };
        Ok([input.clone()].into())
    }

    fn evaluate(&self, inputs: &[HostTensor], outputs: &mut [HostTensorMut]) -> Result<(), OpError> {
        let [input] = inputs else {
            return Err(OpError::InvalidArity {
                expected: 1,
                actual: inputs.len(),
            });
        };
        let [out] = outputs else {
            return Err(OpError::InvalidValue("expected one output buffer"));
        };
        out.bytes_mut().copy_from_slice(input.bytes());
        Ok(())
    }
}
