//! Concrete operations.
//!
//! Each operation declares a stable `(name, version)` identity, infers its
//! output descriptors from its input descriptors and attributes, and may
//! provide a host-side reference kernel via
//! [`Operator::evaluate`](crate::operator::Operator::evaluate).

mod binary_elementwise;
mod concat;
mod identity;
mod matmul;
mod unary_elementwise;

pub use binary_elementwise::{Add, Mul, Sub};
pub use concat::Concat;
pub use identity::Identity;
pub use matmul::MatMul;
pub use unary_elementwise::{Atanh, Relu};
