//! Matrix multiplication.

use crate::descriptor::{DataType, TensorDescriptor};
use crate::operator::{HostTensor, HostTensorMut, OpError, OpTypeId, Operator, OutputDescs};

/// 2-D matrix product.
#[derive(Clone, Debug)]
pub struct MatMul {}

impl Operator for MatMul {
    fn type_id(&self) -> OpTypeId {
        OpTypeId::new("MatMul", 0)
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }

    fn infer_outputs(&self, inputs: &[TensorDescriptor]) -> Result<OutputDescs, OpError> {
        let [a, b] = inputs else {
            return Err(OpError::InvalidArity {
                expected: 2,
                actual: inputs.len(),
            });
        };
        if a.dtype() != DataType::Float || b.dtype() != DataType::Float {
            return Err(OpError::TypeMismatch("MatMul requires float inputs"));
        }
        let (&[m, k_a], &[k_b, n]) = (a.shape(), b.shape()) else {
            return Err(OpError::ShapeMismatch("MatMul inputs must be matrices"));
        };
        if k_a != k_b {
            return Err(OpError::ShapeMismatch(
                "MatMul input inner dimensions must match",
            ));
        }
        Ok([TensorDescriptor::new(DataType::Float, &[m, n])].into())
    }

    fn evaluate(&self, inputs: &[HostTensor], outputs: &mut [HostTensorMut]) -> Result<(), OpError> {
        let [a, b] = inputs else {
            return Err(OpError::InvalidArity {
                expected: 2,
                actual: inputs.len(),
            });
        };
        let [out] = outputs else {
            return Err(OpError::InvalidValue("expected one output buffer"));
        };

        let (&[m, k], &[_, n]) = (a.descriptor().shape(), b.descriptor().shape()) else {
            return Err(OpError::ShapeMismatch("MatMul inputs must be matrices"));
        };
        let lhs = a.to_f32()?;
        let rhs = b.to_f32()?;

        let mut result = vec![0.0f32; m * n];
        for row in 0..m {
            for col in 0..n {
                let mut acc = 0.0;
                for i in 0..k {
                    acc += lhs[row * k + i] * rhs[i * n + col];
                }
                result[row * n + col] = acc;
            }
        }
        out.set_f32(&result)
    }
}
