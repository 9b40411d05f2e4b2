//! Unary elementwise operations.

use crate::descriptor::{DataType, TensorDescriptor};
use crate::operator::{HostTensor, HostTensorMut, OpError, OpTypeId, Operator, OutputDescs};

fn unary_output(inputs: &[TensorDescriptor]) -> Result<OutputDescs, OpError> {
    let [input] = inputs else {
        return Err(OpError::InvalidArity {
            expected: 1,
            actual: inputs.len(),
        });
    };
    Ok([input.clone()].into())
}

fn unary_eval_f32<F: Fn(f32) -> f32>(
    inputs: &[HostTensor],
    outputs: &mut [HostTensorMut],
    op: F,
) -> Result<(), OpError> {
    let [input] = inputs else {
        return Err(OpError::InvalidArity {
            expected: 1,
            actual: inputs.len(),
        });
    };
    let [out] = outputs else {
        return Err(OpError::InvalidValue("expected one output buffer"));
    };
    if input.descriptor().dtype() != DataType::Float {
        return Err(OpError::TypeMismatch("unary kernel supports f32"));
    }
    let result: Vec<f32> = input.to_f32()?.into_iter().map(op).collect();
    out.set_f32(&result)
}

/// Rectified linear unit.
#[derive(Clone, Debug)]
pub struct Relu {}

impl Operator for Relu {
    fn type_id(&self) -> OpTypeId {
        OpTypeId::new("Relu", 0)
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }

    fn infer_outputs(&self, inputs: &[TensorDescriptor]) -> Result<OutputDescs, OpError> {
        unary_output(inputs)
    }

    fn evaluate(&self, inputs: &[HostTensor], outputs: &mut [HostTensorMut]) -> Result<(), OpError> {
        unary_eval_f32(inputs, outputs, |x| x.max(0.0))
    }
}

/// Elementwise inverse hyperbolic tangent.
#[derive(Clone, Debug)]
pub struct Atanh {}

impl Operator for Atanh {
    fn type_id(&self) -> OpTypeId {
        OpTypeId::new("Atanh", 3)
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
        if input.dtype() != DataType::Float {
            return Err(OpError::TypeMismatch("Atanh requires a float input"));
        }
        Ok([input.clone()].into())
    }

    fn evaluate(&self, inputs: &[HostTensor], outputs: &mut [HostTensorMut]) -> Result<(), OpError> {
        unary_eval_f32(inputs, outputs, f32::atanh)
    }
}
