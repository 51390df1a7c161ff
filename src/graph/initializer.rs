use std::collections::{BTreeMap, BTreeSet};

use burn::tensor::{backend::Backend, Distribution, Tensor};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PartError, Result};
use crate::session::StoredTensor;

/// How a variable's initial value is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Initializer {
    Zeros,
    Ones,
    Constant { value: f32 },
    Uniform { min: f64, max: f64 },
    Normal { mean: f64, std: f64 },
    XavierUniform,
}

impl Default for Initializer {
    fn default() -> Self {
        Self::XavierUniform
    }
}

impl Initializer {
    /// Rejects parameters the backend cannot sample from.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Constant { value } if !value.is_finite() => Err(PartError::Config(format!(
                "constant initializer value must be finite, got {}",
                value
            ))),
            Self::Uniform { min, max } if !(min.is_finite() && max.is_finite() && min < max) => {
                Err(PartError::Config(format!(
                    "uniform initializer needs finite bounds with min < max, got [{}, {}]",
                    min, max
                )))
            }
            Self::Normal { mean, std } if !(mean.is_finite() && std.is_finite() && *std >= 0.0) => {
                Err(PartError::Config(format!(
                    "normal initializer needs a finite mean and a finite non-negative std, got mean {} std {}",
                    mean, std
                )))
            }
            _ => Ok(()),
        }
    }

    pub fn init<B: Backend>(&self, shape: &[usize], device: &B::Device) -> Result<StoredTensor> {
        self.validate()?;
        let numel: usize = shape.iter().product();
        if numel == 0 {
            return StoredTensor::new(shape.to_vec(), Vec::new());
        }
        let flat = match self {
            Self::Zeros => Tensor::<B, 1>::zeros([numel], device),
            Self::Ones => Tensor::<B, 1>::ones([numel], device),
            Self::Constant { value } => Tensor::<B, 1>::full([numel], *value, device),
            Self::Uniform { min, max } => {
                Tensor::<B, 1>::random([numel], Distribution::Uniform(*min, *max), device)
            }
            Self::Normal { mean, std } => {
                Tensor::<B, 1>::random([numel], Distribution::Normal(*mean, *std), device)
            }
            Self::XavierUniform => {
                // numel > 0 here, so both fans are positive.
                let (fan_in, fan_out) = fans(shape);
                let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
                Tensor::<B, 1>::random([numel], Distribution::Uniform(-limit, limit), device)
            }
        };
        StoredTensor::from_tensor(flat, shape.to_vec())
    }
}

// Matches the glorot convention: the last two axes are (in, out), leading
// axes form the receptive field.
fn fans(shape: &[usize]) -> (usize, usize) {
    match shape {
        [] => (1, 1),
        [n] => (*n, *n),
        [.., fan_in, fan_out] => {
            let receptive: usize = shape[..shape.len() - 2].iter().product();
            (fan_in * receptive, fan_out * receptive)
        }
    }
}

/// Initializer overrides keyed by fully-qualified variable name.
///
/// Entries are registered by parts at construction time and consulted when a
/// variable with the same full name is later created anywhere in the graph.
#[derive(Debug, Clone, Default)]
pub struct InitializerRegistry {
    entries: BTreeMap<String, Initializer>,
    used: BTreeSet<String>,
}

impl InitializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers overrides; a later registration for the same name wins.
    pub fn update<I>(&mut self, initializers: I)
    where
        I: IntoIterator<Item = (String, Initializer)>,
    {
        for (name, initializer) in initializers {
            debug!("Registering initializer for '{}': {:?}", name, initializer);
            self.entries.insert(name, initializer);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Initializer> {
        self.entries.get(name)
    }

    /// Looks up the override for `name` and marks it as consumed.
    pub fn resolve(&mut self, name: &str) -> Option<Initializer> {
        let initializer = self.entries.get(name).cloned()?;
        self.used.insert(name.to_string());
        Some(initializer)
    }

    /// Names registered but never matched by a created variable.
    pub fn unused(&self) -> Vec<&str> {
        self.entries
            .keys()
            .filter(|name| !self.used.contains(*name))
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
