use std::ops::Deref;
use std::rc::Rc;

use crate::config::PartConfig;
use crate::data::Dataset;
use crate::error::Result;
use crate::session::{FeedDict, InputKind, Placeholder};
use crate::graph::Graph;

use super::dependencies::Relations;
use super::parameterized::Parameterized;

pub type PartRef = Rc<dyn ModelPart>;

/// State every model part carries: its parameters plus the per-batch
/// `train_mode` and `batch_size` inputs.
#[derive(Debug)]
pub struct ModelPartBase {
    params: Parameterized,
    train_mode: Placeholder,
    batch_size: Placeholder,
}

impl ModelPartBase {
    pub fn new(
        graph: &mut Graph,
        kind: &'static str,
        config: PartConfig,
        reuse: Option<&ModelPartBase>,
    ) -> Result<Self> {
        let params = Parameterized::new(graph, kind, config, reuse.map(|r| &r.params))?;

        let (train_mode, batch_size) = {
            let mut g = params.use_scope(graph);
            (
                g.placeholder("train_mode", InputKind::Bool),
                g.placeholder("batch_size", InputKind::Int),
            )
        };

        Ok(Self {
            params,
            train_mode,
            batch_size,
        })
    }

    pub fn params(&self) -> &Parameterized {
        &self.params
    }

    pub fn train_mode(&self) -> &Placeholder {
        &self.train_mode
    }

    pub fn batch_size(&self) -> &Placeholder {
        &self.batch_size
    }

    pub fn feed_dict(&self, dataset: &dyn Dataset, train: bool) -> FeedDict {
        let mut fd = FeedDict::new();
        fd.insert(&self.train_mode, train);
        fd.insert(&self.batch_size, dataset.len() as i64);
        fd
    }
}

impl Deref for ModelPartBase {
    type Target = Parameterized;

    fn deref(&self) -> &Parameterized {
        &self.params
    }
}

/// A component of a sequence-to-sequence model.
///
/// Implementors embed a [`ModelPartBase`] and declare the parts they are
/// wired to through [`ModelPart::relations`].
pub trait ModelPart {
    fn base(&self) -> &ModelPartBase;

    fn relations(&self) -> Relations {
        Relations::default()
    }

    /// Values for this part's runtime inputs. Overrides should start from
    /// the base step and add their own inputs; a dataset lacking what the
    /// part reads is an error.
    fn feed_dict(&self, dataset: &dyn Dataset, train: bool) -> Result<FeedDict> {
        Ok(self.base().feed_dict(dataset, train))
    }

    fn name(&self) -> &str {
        self.base().name()
    }
}
