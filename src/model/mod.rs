pub mod dependencies;
pub mod model_part;
pub mod parameterized;

pub use dependencies::{get_dependencies, Dependencies, Relations};
pub use model_part::{ModelPart, ModelPartBase, PartRef};
pub use parameterized::Parameterized;
