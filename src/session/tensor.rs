use burn::tensor::{backend::Backend, Tensor, TensorData};
use serde::{Deserialize, Serialize};

use crate::error::{PartError, Result};

/// Backend-independent copy of a parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTensor {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl StoredTensor {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if numel != values.len() {
            return Err(PartError::Tensor(format!(
                "shape {:?} holds {} elements, got {}",
                shape,
                numel,
                values.len()
            )));
        }
        Ok(Self { shape, values })
    }

    /// Copies `tensor` out of the backend, viewing it with `shape`.
    pub fn from_tensor<B: Backend, const D: usize>(
        tensor: Tensor<B, D>,
        shape: Vec<usize>,
    ) -> Result<Self> {
        let values = tensor
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| PartError::Tensor(format!("{:?}", e)))?;
        Self::new(shape, values)
    }

    pub fn to_tensor<B: Backend, const D: usize>(&self, device: &B::Device) -> Result<Tensor<B, D>> {
        if self.shape.len() != D {
            return Err(PartError::Tensor(format!(
                "cannot view shape {:?} as a rank {} tensor",
                self.shape, D
            )));
        }
        let data = TensorData::new(self.values.clone(), self.shape.clone());
        Ok(Tensor::from_data(data, device))
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_rejects_wrong_element_count() {
        assert!(StoredTensor::new(vec![2, 2], vec![1.0; 3]).is_err());
        assert!(StoredTensor::new(vec![], vec![1.0]).is_ok());
    }

    #[test]
    fn test_materializes_with_original_dims() {
        let device = Default::default();
        let stored = StoredTensor::new(vec![2, 3], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let tensor = stored.to_tensor::<TestBackend, 2>(&device).unwrap();
        assert_eq!(tensor.dims(), [2, 3]);
        assert!(stored.to_tensor::<TestBackend, 1>(&device).is_err());

        let back = StoredTensor::from_tensor(tensor, vec![2, 3]).unwrap();
        assert_eq!(back, stored);
    }
}
