//! Named tensors for identifying intermediate buffers in diagnostics.

use crate::tensor::Tensor;
use std::fmt;

/// An opaque named buffer with an integer shape.
///
/// The bytes are never interpreted by the pipeline; the name and shape exist
/// so intermediate tensors can be told apart when dumped or logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureMap {
    name: String,
    data: Box<[u8]>,
    shape: Vec<usize>,
}

impl FeatureMap {
    /// Creates a feature map taking ownership of `data`.
    pub fn new(name: impl Into<String>, data: Box<[u8]>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            data,
            shape,
        }
    }

    /// Snapshots an `f32` tensor as little-endian bytes with a CHW shape.
    pub fn from_tensor(name: impl Into<String>, tensor: &Tensor<f32>) -> Self {
        let dims = tensor.dims();
        let data: Vec<u8> = tensor
            .as_slice()
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        Self::new(
            name,
            data.into_boxed_slice(),
            vec![dims.channels, dims.height, dims.width],
        )
    }

    /// Name used in logs and dumps.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw bytes, uninterpreted.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Dimensions, outermost first.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
}

impl fmt::Display for FeatureMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:[", self.name)?;
        for (i, dim) in self.shape.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dim}")?;
        }
        f.write_str("]")
    }
}
