use std::collections::BTreeSet;
use std::path::PathBuf;

use burn::tensor::backend::Backend;
use tracing::info;

use crate::data::Dataset;
use crate::error::Result;
use crate::graph::Graph;
use crate::model::{Dependencies, PartRef};
use crate::session::{FeedDict, Session};

/// Every part of a model, collected from its root parts.
pub struct Model {
    parts: Dependencies,
}

impl Model {
    pub fn from_roots(roots: &[PartRef]) -> Self {
        Self {
            parts: Dependencies::of_all(roots),
        }
    }

    pub fn parts(&self) -> impl Iterator<Item = &PartRef> {
        self.parts.iter()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.parts.names()
    }

    /// Inputs of all parts for one batch of `dataset`.
    pub fn feed_dict(&self, dataset: &dyn Dataset, train: bool) -> Result<FeedDict> {
        let mut fd = FeedDict::new();
        for part in self.parts.iter() {
            fd.extend(part.feed_dict(dataset, train)?);
        }
        fd.check()?;
        Ok(fd)
    }

    /// Saves every part configured with a save checkpoint.
    pub fn save<B: Backend>(&self, graph: &Graph, session: &Session<B>) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for part in self.parts.iter() {
            if let Some(index) = part.base().save(graph, session)? {
                written.push(index);
            }
        }
        info!("Saved {} of {} model parts", written.len(), self.len());
        Ok(written)
    }

    /// Loads every part configured with a load checkpoint.
    pub fn load<B: Backend>(&self, graph: &Graph, session: &mut Session<B>) -> Result<usize> {
        let mut loaded = 0;
        for part in self.parts.iter() {
            if part.base().load(graph, session)? {
                loaded += 1;
            }
        }
        info!("Loaded {} of {} model parts", loaded, self.len());
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_model;
    use crate::config::ModelConfig;
    use crate::data::SentenceDataset;
    use crate::error::PartError;
    use crate::session::FeedValue;
    use burn_ndarray::NdArray;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    fn config(dir: &std::path::Path, key: &str) -> ModelConfig {
        let json = format!(
            r#"{{
            "encoders": [{{"name": "source", "vocab_size": 12, "embedding_size": 4, "hidden_size": 6,
                           "{key}": "{enc}"}}],
            "attentions": [{{"name": "att", "encoder": "source", "hidden_size": 6}}],
            "decoders": [{{"name": "decoder", "encoders": ["source"], "attentions": ["att"],
                           "vocab_size": 12, "hidden_size": 6, "{key}": "{dec}"}}]
        }}"#,
            key = key,
            enc = dir.join("source").display(),
            dec = dir.join("decoder").display(),
        );
        serde_json::from_str(&json).unwrap()
    }

    #[test]
    fn test_collects_parts_from_decoders() {
        let temp_dir = TempDir::new().unwrap();
        let mut graph = Graph::new();
        let built = build_model(&config(temp_dir.path(), "save_checkpoint"), &mut graph).unwrap();
        let model = Model::from_roots(built.decoders());

        assert_eq!(model.len(), 3);
        assert_eq!(
            model.names(),
            ["att", "decoder", "source"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn test_feed_dict_covers_every_part() {
        let temp_dir = TempDir::new().unwrap();
        let mut graph = Graph::new();
        let built = build_model(&config(temp_dir.path(), "save_checkpoint"), &mut graph).unwrap();
        let model = Model::from_roots(built.decoders());

        let mut series = BTreeMap::new();
        series.insert("source".to_string(), vec![vec!["x".to_string()]; 4]);
        let dataset = SentenceDataset::new("train", series).unwrap();

        let fd = model.feed_dict(&dataset, false).unwrap();
        // Two inputs per part plus the encoder's lengths.
        assert_eq!(fd.len(), 7);
        assert_eq!(fd.get_by_name("decoder/batch_size"), Some(&FeedValue::Int(4)));
        assert_eq!(fd.get_by_name("att/train_mode"), Some(&FeedValue::Bool(false)));
        assert_eq!(
            fd.get_by_name("source/input_lengths"),
            Some(&FeedValue::IntVector(vec![1; 4]))
        );
    }

    #[test]
    fn test_feed_dict_fails_without_encoder_series() {
        let temp_dir = TempDir::new().unwrap();
        let mut graph = Graph::new();
        let built = build_model(&config(temp_dir.path(), "save_checkpoint"), &mut graph).unwrap();
        let model = Model::from_roots(built.decoders());

        assert!(matches!(
            model.feed_dict(&vec![(); 4], true),
            Err(PartError::Config(_))
        ));
    }

    #[test]
    fn test_save_then_load_whole_model() {
        let temp_dir = TempDir::new().unwrap();

        let mut graph = Graph::new();
        let built = build_model(&config(temp_dir.path(), "save_checkpoint"), &mut graph).unwrap();
        let model = Model::from_roots(built.decoders());
        let mut session = Session::<TestBackend>::new(Default::default());
        session.initialize(&graph).unwrap();
        let written = model.save(&graph, &session).unwrap();
        assert_eq!(written.len(), 2);

        let mut fresh_graph = Graph::new();
        let fresh = build_model(&config(temp_dir.path(), "load_checkpoint"), &mut fresh_graph).unwrap();
        let fresh_model = Model::from_roots(fresh.decoders());
        let mut fresh_session = Session::<TestBackend>::new(Default::default());
        fresh_session.initialize(&fresh_graph).unwrap();
        assert_eq!(fresh_model.load(&fresh_graph, &mut fresh_session).unwrap(), 2);

        for name in [
            "source/embedding_matrix",
            "source/encoder_weights",
            "decoder/output_projection",
        ] {
            assert_eq!(
                fresh_session.value(name).unwrap(),
                session.value(name).unwrap(),
                "{} differs after load",
                name
            );
        }
        // The attention has no checkpoint and keeps its fresh values.
        assert!(fresh_session.is_initialized("att/attention_weights"));
    }
}
