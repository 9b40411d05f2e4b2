//! Binary elementwise arithmetic operations.

use crate::descriptor::{DataType, TensorDescriptor};
use crate::operator::{HostTensor, HostTensorMut, OpError, OpTypeId, Operator, OutputDescs};

/// Infer the output descriptor for a binary elementwise operation.
///
/// Elementwise arithmetic requires both inputs to have identical element
/// types and identical shapes; the output shares them.
fn binary_elementwise_output(inputs: &[TensorDescriptor]) -> Result<OutputDescs, OpError> {
    let [a, b] = inputs else {
        return Err(OpError::InvalidArity {
            expected: 2,
            actual: inputs.len(),
        });
    };
    if a.dtype() != b.dtype() {
        return Err(OpError::TypeMismatch(
            "elementwise inputs must have the same element type",
        ));
    }
    if a.shape() != b.shape() {
        return Err(OpError::ShapeMismatch(
            "elementwise inputs must have the same shape",
        ));
    }
    Ok([a.clone()].into())
}

/// Apply `op_f32`/`op_i32` elementwise over a pair of buffers of matching
/// descriptors.
fn binary_elementwise_eval<F, I>(
    inputs: &[HostTensor],
    outputs: &mut [HostTensorMut],
    op_f32: F,
    op_i32: I,
) -> Result<(), OpError>
where
    F: Fn(f32, f32) -> f32,
    I: Fn(i32, i32) -> i32,
{
    let [a, b] = inputs else {
        return Err(OpError::InvalidArity {
            expected: 2,
            actual: inputs.len(),
        });
    };
    let [out] = outputs else {
        return Err(OpError::InvalidValue("expected one output buffer"));
    };

    match a.descriptor().dtype() {
        DataType::Float => {
            let (xs, ys) = (a.to_f32()?, b.to_f32()?);
            let result: Vec<f32> = xs.iter().zip(&ys).map(|(&x, &y)| op_f32(x, y)).collect();
            out.set_f32(&result)
        }
        DataType::Int32 => {
            let (xs, ys) = (a.to_i32()?, b.to_i32()?);
            let result: Vec<i32> = xs.iter().zip(&ys).map(|(&x, &y)| op_i32(x, y)).collect();
            out.set_i32(&result)
        }
        _ => Err(OpError::TypeMismatch(
            "elementwise kernel supports f32 and i32",
        )),
    }
}

macro_rules! binary_elementwise_op {
    ($op:ident, $name:literal, $version:literal, $f32_expr:expr, $i32_expr:expr) => {
        #[derive(Clone, Debug)]
        pub struct $op {}

        impl Operator for $op {
            fn type_id(&self) -> OpTypeId {
                OpTypeId::new($name, $version)
            }

            fn arity(&self) -> Option<usize> {
                Some(2)
            }

            fn infer_outputs(&self, inputs: &[TensorDescriptor]) -> Result<OutputDescs, OpError> {
                binary_elementwise_output(inputs)
            }

            fn evaluate(
                &self,
                inputs: &[HostTensor],
                outputs: &mut [HostTensorMut],
            ) -> Result<(), OpError> {
                binary_elementwise_eval(inputs, outputs, $f32_expr, $i32_expr)
            }
        }
    };
}

binary_elementwise_op!(Add, "Add", 1, |x, y| x + y, |x, y| x.wrapping_add(y));
binary_elementwise_op!(Sub, "Sub", 1, |x, y| x - y, |x, y| x.wrapping_sub(y));
binary_elementwise_op!(Mul, "Mul", 1, |x, y| x * y, |x, y| x.wrapping_mul(y));
