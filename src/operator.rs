//! The [`Operator`] trait for defining operations.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display};

use smallvec::SmallVec;

use crate::descriptor::{DataType, TensorDescriptor};

/// Identity of an operation kind: a `(name, version)` pair.
///
/// The pair is used for equality and lookup in place of runtime type
/// identity, and must be stable across releases so that a serialized graph
/// referencing eg. `("Atanh", 3)` always resolves to the same semantics.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct OpTypeId {
    pub name: &'static str,
    pub version: u32,
}

impl OpTypeId {
    pub const fn new(name: &'static str, version: u32) -> OpTypeId {
        OpTypeId { name, version }
    }
}

impl Display for OpTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

/// Capability interface presented with each named attribute of an operation.
///
/// [`Operator::visit_attributes`] walks every attribute exactly once, in
/// declaration order, calling the method matching the attribute's kind. Each
/// method returns `false` if the visitor cannot handle that kind, and the
/// default bodies return `false` so that a partial visitor reports failure
/// instead of silently skipping data.
///
/// Serialization, hashing and structural-equality callers funnel through
/// this interface, so adding a new operation never requires touching them.
#[allow(unused_variables)]
pub trait AttributeVisitor {
    fn visit_int(&mut self, name: &str, value: i64) -> bool {
        false
    }

    fn visit_float(&mut self, name: &str, value: f64) -> bool {
        false
    }

    fn visit_string(&mut self, name: &str, value: &str) -> bool {
        false
    }

    fn visit_int_list(&mut self, name: &str, values: &[i64]) -> bool {
        false
    }
}

/// Possible reasons why constructing or evaluating an operation may fail.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum OpError {
    /// The number of inputs does not match the operation's input count.
    InvalidArity { expected: usize, actual: usize },

    /// Input element types are incompatible with each other or the
    /// operation's constraints.
    TypeMismatch(&'static str),

    /// Input shapes are incompatible with each other or the operation's
    /// attributes.
    ShapeMismatch(&'static str),

    /// An input or attribute has a value that is incorrect.
    InvalidValue(&'static str),

    /// The operation has no host-side reference kernel.
    NoEvaluator,
}

impl Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpError::InvalidArity { expected, actual } => {
                write!(f, "expected {} inputs but got {}", expected, actual)
            }
            OpError::TypeMismatch(details) => write!(f, "type mismatch: {}", details),
            OpError::ShapeMismatch(details) => write!(f, "shape mismatch: {}", details),
            OpError::InvalidValue(details) => {
                write!(f, "input or attribute has invalid value: {}", details)
            }
            OpError::NoEvaluator => write!(f, "operation has no reference kernel"),
        }
    }
}

impl Error for OpError {}

/// Output descriptors produced by shape/type inference.
///
/// This avoids allocations in the common case where an operation produces
/// exactly one output.
pub type OutputDescs = SmallVec<[TensorDescriptor; 1]>;

/// A read-only view of a host buffer backing one tensor during evaluation.
pub struct HostTensor<'a> {
    desc: &'a TensorDescriptor,
    data: &'a [u8],
}

impl<'a> HostTensor<'a> {
    /// Construct a view over `data`, which must be exactly
    /// `desc.size_in_bytes()` long.
    pub fn new(desc: &'a TensorDescriptor, data: &'a [u8]) -> HostTensor<'a> {
        debug_assert_eq!(data.len(), desc.size_in_bytes());
        HostTensor { desc, data }
    }

    pub fn descriptor(&self) -> &TensorDescriptor {
        self.desc
    }

    pub fn bytes(&self) -> &[u8] {
        self.data
    }

    /// Decode the buffer as f32 elements.
    ///
    /// Host buffers are byte-aligned, so elements are decoded individually
    /// rather than via a reinterpreting cast.
    pub fn to_f32(&self) -> Result<Vec<f32>, OpError> {
        if self.desc.dtype() != DataType::Float {
            return Err(OpError::TypeMismatch("expected f32 tensor"));
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Decode the buffer as i32 elements.
    pub fn to_i32(&self) -> Result<Vec<i32>, OpError> {
        if self.desc.dtype() != DataType::Int32 {
            return Err(OpError::TypeMismatch("expected i32 tensor"));
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

/// A mutable view of a host buffer backing one tensor during evaluation.
pub struct HostTensorMut<'a> {
    desc: &'a TensorDescriptor,
    data: &'a mut [u8],
}

impl<'a> HostTensorMut<'a> {
    pub fn new(desc: &'a TensorDescriptor, data: &'a mut [u8]) -> HostTensorMut<'a> {
        debug_assert_eq!(data.len(), desc.size_in_bytes());
        HostTensorMut { desc, data }
    }

    pub fn descriptor(&self) -> &TensorDescriptor {
        self.desc
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.data
    }

    /// Encode `values` into the buffer as f32 elements.
    pub fn set_f32(&mut self, values: &[f32]) -> Result<(), OpError> {
        if self.desc.dtype() != DataType::Float {
            return Err(OpError::TypeMismatch("expected f32 tensor"));
        }
        if values.len() != self.desc.len() {
            return Err(OpError::ShapeMismatch("element count mismatch"));
        }
        for (chunk, value) in self.data.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value.to_ne_bytes());
        }
        Ok(())
    }

    /// Encode `values` into the buffer as i32 elements.
    pub fn set_i32(&mut self, values: &[i32]) -> Result<(), OpError> {
        if self.desc.dtype() != DataType::Int32 {
            return Err(OpError::TypeMismatch("expected i32 tensor"));
        }
        if values.len() != self.desc.len() {
            return Err(OpError::ShapeMismatch("element count mismatch"));
        }
        for (chunk, value) in self.data.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value.to_ne_bytes());
        }
        Ok(())
    }
}

/// An Operator is a typed unit of computation in a dataflow graph.
///
/// Operators are identified by a stable [`OpTypeId`] rather than by their
/// Rust type, carry zero or more static attributes, and determine their
/// output descriptors as a pure function of their input descriptors plus
/// attributes via [`infer_outputs`](Operator::infer_outputs).
pub trait Operator: Any + Debug {
    /// Return the stable identity of this operation kind.
    fn type_id(&self) -> OpTypeId;

    /// Return the number of inputs this operation accepts, or `None` if it
    /// is variadic.
    fn arity(&self) -> Option<usize>;

    /// Compute output descriptors from input descriptors.
    ///
    /// This must be deterministic and side-effect free. It runs when a node
    /// is first constructed and re-runs on
    /// [`clone_with_new_inputs`](crate::graph::Graph::clone_with_new_inputs).
    fn infer_outputs(&self, inputs: &[TensorDescriptor]) -> Result<OutputDescs, OpError>;

    /// Present each named attribute to `visitor`, in declaration order.
    ///
    /// Returns `false` if any attribute could not be visited. Callers must
    /// treat that as "this node cannot be safely introspected" rather than
    /// skipping the attribute.
    fn visit_attributes(&self, #[allow(unused)] visitor: &mut dyn AttributeVisitor) -> bool {
        true
    }

    /// Reference kernel: compute outputs in place in pre-allocated buffers.
    ///
    /// Input and output buffer sizes match their descriptors. Operations
    /// without a host-side reference implementation keep the default body,
    /// which reports [`OpError::NoEvaluator`].
    fn evaluate(
        &self,
        #[allow(unused)] inputs: &[HostTensor],
        #[allow(unused)] outputs: &mut [HostTensorMut],
    ) -> Result<(), OpError> {
        Err(OpError::NoEvaluator)
    }
}

impl dyn Operator {
    /// Downcast this operator to a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref()
    }
}

impl dyn Operator + Send + Sync {
    /// Downcast this operator to a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref()
    }
}
