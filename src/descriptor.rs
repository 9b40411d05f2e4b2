//! Element types and shapes of tensors.

use std::fmt;
use std::fmt::Display;

/// Element type of a tensor.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DataType {
    Float,
    Int32,
    Int8,
    UInt8,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            DataType::Float => 4,
            DataType::Int32 => 4,
            DataType::Int8 => 1,
            DataType::UInt8 => 1,
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Float => "float",
            DataType::Int32 => "int32",
            DataType::Int8 => "int8",
            DataType::UInt8 => "uint8",
        };
        write!(f, "{}", name)
    }
}

/// Element type and shape of one tensor.
///
/// A descriptor fully determines the byte size of the tensor's storage. An
/// empty shape describes a scalar holding one element.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TensorDescriptor {
    dtype: DataType,
    shape: Vec<usize>,
}

impl TensorDescriptor {
    pub fn new(dtype: DataType, shape: &[usize]) -> TensorDescriptor {
        TensorDescriptor {
            dtype,
            shape: shape.to_vec(),
        }
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements: the product of the dimensions.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// True if any dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the tensor's storage in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.len() * self.dtype.size()
    }
}

#[cfg(test)]
mod tests {
    use super::{DataType, TensorDescriptor};

    #[test]
    fn test_size_in_bytes() {
        struct Case {
            dtype: DataType,
            shape: &'static [usize],
            expected: usize,
        }

        let cases = [
            Case {
                dtype: DataType::Float,
                shape: &[2, 3],
                expected: 24,
            },
            Case {
                dtype: DataType::Int32,
                shape: &[5],
                expected: 20,
            },
            Case {
                dtype: DataType::UInt8,
                shape: &[10, 10],
                expected: 100,
            },
            Case {
                dtype: DataType::Int8,
                shape: &[3, 0, 2],
                expected: 0,
            },
        ];

        for Case {
            dtype,
            shape,
            expected,
        } in cases
        {
            assert_eq!(TensorDescriptor::new(dtype, shape).size_in_bytes(), expected);
        }
    }

    #[test]
    fn test_scalar_has_one_element() {
        let desc = TensorDescriptor::new(DataType::Float, &[]);
        assert_eq!(desc.len(), 1);
        assert_eq!(desc.size_in_bytes(), 4);
    }
}
