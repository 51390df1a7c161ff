mod feed;
mod tensor;

pub use feed::{FeedDict, FeedValue, InputKind, Placeholder};
pub use tensor::StoredTensor;

use std::collections::BTreeMap;

use burn::tensor::{backend::Backend, Tensor};
use tracing::debug;

use crate::error::{PartError, Result};
use crate::graph::{Graph, Variable};

/// Live parameter values for a [`Graph`] on backend `B`.
pub struct Session<B: Backend> {
    device: B::Device,
    values: BTreeMap<String, StoredTensor>,
}

impl<B: Backend> Session<B> {
    pub fn new(device: B::Device) -> Self {
        Self {
            device,
            values: BTreeMap::new(),
        }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Runs the initializer of every variable declared in `graph`.
    pub fn initialize(&mut self, graph: &Graph) -> Result<usize> {
        let mut count = 0;
        for variable in graph.variables() {
            let value = variable
                .initializer()
                .init::<B>(variable.shape(), &self.device)?;
            self.values.insert(variable.name().to_string(), value);
            count += 1;
        }
        debug!("Initialized {} variables", count);
        Ok(count)
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn value(&self, name: &str) -> Result<&StoredTensor> {
        self.values
            .get(name)
            .ok_or_else(|| PartError::Uninitialized(name.to_string()))
    }

    /// Replaces the value of `name`; the shape must match the live value.
    pub fn assign(&mut self, name: &str, value: StoredTensor) -> Result<()> {
        if let Some(current) = self.values.get(name) {
            if current.shape() != value.shape() {
                return Err(PartError::ShapeMismatch {
                    name: name.to_string(),
                    expected: current.shape().to_vec(),
                    found: value.shape().to_vec(),
                });
            }
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn tensor<const D: usize>(&self, variable: &Variable) -> Result<Tensor<B, D>> {
        self.value(variable.name())?.to_tensor::<B, D>(&self.device)
    }

    pub fn assign_tensor<const D: usize>(
        &mut self,
        variable: &Variable,
        tensor: Tensor<B, D>,
    ) -> Result<()> {
        let dims = tensor.dims().to_vec();
        if dims != variable.shape() {
            return Err(PartError::ShapeMismatch {
                name: variable.name().to_string(),
                expected: variable.shape().to_vec(),
                found: dims,
            });
        }
        let value = StoredTensor::from_tensor(tensor, dims)?;
        self.assign(variable.name(), value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Initializer;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn graph_with_weights() -> (Graph, Variable) {
        let mut graph = Graph::new();
        let scope = graph.variable_scope("enc");
        let w = graph
            .enter(&scope, false)
            .get_variable("w", &[2, 2], Initializer::Ones)
            .unwrap();
        (graph, w)
    }

    #[test]
    fn test_initialize_runs_declared_initializers() {
        let (graph, w) = graph_with_weights();
        let mut session = Session::<TestBackend>::new(Default::default());
        assert!(matches!(session.value("enc/w"), Err(PartError::Uninitialized(_))));

        assert_eq!(session.initialize(&graph).unwrap(), 1);
        assert_eq!(session.value(w.name()).unwrap().values(), &[1.0; 4]);
    }

    #[test]
    fn test_assign_tensor_checks_shape() {
        let (graph, w) = graph_with_weights();
        let mut session = Session::<TestBackend>::new(Default::default());
        session.initialize(&graph).unwrap();

        let zeros = Tensor::<TestBackend, 2>::zeros([2, 2], session.device());
        session.assign_tensor(&w, zeros).unwrap();
        assert_eq!(session.value("enc/w").unwrap().values(), &[0.0; 4]);

        let wrong = Tensor::<TestBackend, 1>::zeros([4], session.device());
        assert!(matches!(
            session.assign_tensor(&w, wrong),
            Err(PartError::ShapeMismatch { .. })
        ));

        let restored = session.tensor::<2>(&w).unwrap();
        assert_eq!(restored.dims(), [2, 2]);
    }
}
