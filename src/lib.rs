// Library exports for use in the CLI and by model implementations

pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod graph;
pub mod model;
pub mod parts;
pub mod session;
pub mod training;

// Re-export commonly used types
pub use config::{ModelConfig, PartConfig};
pub use error::{PartError, Result};
pub use graph::Graph;
pub use model::{get_dependencies, ModelPart, ModelPartBase, Parameterized, PartRef};
pub use session::Session;
pub use training::Model;
