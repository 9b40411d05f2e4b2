//! Tensor concatenation.

use crate::descriptor::TensorDescriptor;
use crate::operator::{
    AttributeVisitor, HostTensor, HostTensorMut, OpError, OpTypeId, Operator, OutputDescs,
};

/// Concatenate tensors along an axis.
#[derive(Clone, Debug)]
pub struct Concat {
    pub axis: usize,
}

impl Operator for Concat {
    fn type_id(&self) -> OpTypeId {
        OpTypeId::new("Concat", 0)
    }

    // Variadic.
    fn arity(&self) -> Option<usize> {
        None
    }

    fn infer_outputs(&self, inputs: &[TensorDescriptor]) -> Result<OutputDescs, OpError> {
        let [first, rest @ ..] = inputs else {
            return Err(OpError::InvalidArity {
                expected: 1,
                actual: 0,
            });
        };
        if self.axis >= first.ndim() {
            return Err(OpError::InvalidValue("concat axis exceeds input rank"));
        }

        let mut out_shape = first.shape().to_vec();
        for input in rest {
            if input.dtype() != first.dtype() {
                return Err(OpError::TypeMismatch(
                    "concat inputs must have the same element type",
                ));
            }
            if input.ndim() != first.ndim() {
                return Err(OpError::ShapeMismatch("concat inputs must have same rank"));
            }
            for (dim, (&a, &b)) in first.shape().iter().zip(input.shape()).enumerate() {
                if dim != self.axis && a != b {
                    return Err(OpError::ShapeMismatch(
                        "concat inputs must match on non-axis dimensions",
                    ));
                }
            }
            out_shape[self.axis] += input.shape()[self.axis];
        }
        Ok([TensorDescriptor::new(first.dtype(), &out_shape)].into())
    }

    fn visit_attributes(&self, visitor: &mut dyn AttributeVisitor) -> bool {
        visitor.visit_int("axis", self.axis as i64)
    }

    fn evaluate(&self, inputs: &[HostTensor], outputs: &mut [HostTensorMut]) -> Result<(), OpError> {
        let [out] = outputs else {
            return Err(OpError::InvalidValue("expected one output buffer"));
        };
        let Some(first) = inputs.first() else {
            return Err(OpError::InvalidArity {
                expected: 1,
                actual: 0,
            });
        };

        // Concatenation is dtype-agnostic: copy whole byte runs. Each input
        // contributes `product(shape[axis..]) * elem_size` bytes per outer
        // index.
        let elem_size = first.descriptor().dtype().size();
        let outer: usize = first.descriptor().shape()[..self.axis].iter().product();
        let run_bytes: Vec<usize> = inputs
            .iter()
            .map(|input| {
                input.descriptor().shape()[self.axis..]
                    .iter()
                    .product::<usize>()
                    * elem_size
            })
            .collect();

        let out_bytes = out.bytes_mut();
        let mut out_offset = 0;
        for outer_idx in 0..outer {
            for (input, &run) in inputs.iter().zip(&run_bytes) {
                let src = &input.bytes()[outer_idx * run..(outer_idx + 1) * run];
                out_bytes[out_offset..out_offset + run].copy_from_slice(src);
                out_offset += run;
            }
        }
        Ok(())
    }
}
