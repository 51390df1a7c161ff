use burn::tensor::{backend::Backend, Int, Tensor, TensorData};

use crate::config::EncoderConfig;
use crate::data::Dataset;
use crate::error::{PartError, Result};
use crate::graph::{Graph, Initializer, Variable};
use crate::model::{ModelPart, ModelPartBase};
use crate::session::{FeedDict, InputKind, Placeholder, Session};

pub const SENTENCE_ENCODER: &str = "sentence_encoder";

/// Embeds a tokenized sentence and projects its mean embedding to the
/// hidden size.
#[derive(Debug)]
pub struct SentenceEncoder {
    base: ModelPartBase,
    data_id: String,
    hidden_size: usize,
    embedding_matrix: Variable,
    encoder_weights: Variable,
    encoder_bias: Variable,
    input_lengths: Placeholder,
}

impl SentenceEncoder {
    pub fn new(graph: &mut Graph, config: &EncoderConfig, reuse: Option<&SentenceEncoder>) -> Result<Self> {
        config.validate()?;
        let base = ModelPartBase::new(
            graph,
            SENTENCE_ENCODER,
            config.part.clone(),
            reuse.map(|r| &r.base),
        )?;

        let mut g = base.use_scope(graph);
        let embedding_matrix = g.get_variable(
            "embedding_matrix",
            &[config.vocab_size, config.embedding_size],
            Initializer::Normal { mean: 0.0, std: 0.1 },
        )?;
        let encoder_weights = g.get_variable(
            "encoder_weights",
            &[config.embedding_size, config.hidden_size],
            Initializer::XavierUniform,
        )?;
        let encoder_bias = g.get_variable("encoder_bias", &[config.hidden_size], Initializer::Zeros)?;
        let input_lengths = g.placeholder("input_lengths", InputKind::IntVector);
        drop(g);

        Ok(Self {
            base,
            data_id: config.data_id.clone(),
            hidden_size: config.hidden_size,
            embedding_matrix,
            encoder_weights,
            encoder_bias,
            input_lengths,
        })
    }

    pub fn data_id(&self) -> &str {
        &self.data_id
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn input_lengths(&self) -> &Placeholder {
        &self.input_lengths
    }

    pub fn variables(&self) -> [&Variable; 3] {
        [&self.embedding_matrix, &self.encoder_weights, &self.encoder_bias]
    }

    /// `tanh(mean(E[tokens]) W + b)` with the session's current values.
    pub fn encode<B: Backend>(&self, session: &Session<B>, tokens: &[usize]) -> Result<Tensor<B, 1>> {
        let vocab_size = self.embedding_matrix.shape()[0];
        if tokens.is_empty() {
            return Err(PartError::Config(format!(
                "encoder '{}' cannot encode an empty sentence",
                self.name()
            )));
        }
        if let Some(token) = tokens.iter().find(|t| **t >= vocab_size) {
            return Err(PartError::Config(format!(
                "token {} is outside the vocabulary of '{}' ({} entries)",
                token,
                self.name(),
                vocab_size
            )));
        }

        let device = session.device();
        let ids: Vec<i64> = tokens.iter().map(|t| *t as i64).collect();
        let ids = Tensor::<B, 1, Int>::from_data(TensorData::new(ids, [tokens.len()]), device);

        let embeddings = session.tensor::<2>(&self.embedding_matrix)?.select(0, ids);
        let weights = session.tensor::<2>(&self.encoder_weights)?;
        let bias = session.tensor::<1>(&self.encoder_bias)?;

        let hidden = embeddings.mean_dim(0).matmul(weights) + bias.unsqueeze::<2>();
        Ok(hidden.tanh().reshape([self.hidden_size]))
    }
}

impl ModelPart for SentenceEncoder {
    fn base(&self) -> &ModelPartBase {
        &self.base
    }

    fn feed_dict(&self, dataset: &dyn Dataset, train: bool) -> Result<FeedDict> {
        let sentences = dataset.series(&self.data_id).ok_or_else(|| {
            PartError::Config(format!(
                "encoder '{}' reads series '{}', missing from dataset '{}'",
                self.base.name(),
                self.data_id,
                dataset.name()
            ))
        })?;
        let lengths: Vec<i64> = sentences.iter().map(|s| s.len() as i64).collect();
        let mut fd = self.base.feed_dict(dataset, train);
        fd.insert(&self.input_lengths, lengths);
        Ok(fd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InitializerSpec, PartConfig};
    use crate::data::SentenceDataset;
    use crate::error::PartError;
    use crate::session::FeedValue;
    use burn_ndarray::NdArray;
    use std::collections::BTreeMap;

    type TestBackend = NdArray<f32>;

    fn config(name: &str) -> EncoderConfig {
        let mut config = EncoderConfig::new(PartConfig::new(name));
        config.vocab_size = 10;
        config.embedding_size = 2;
        config.hidden_size = 3;
        config
    }

    #[test]
    fn test_creates_scoped_variables() {
        let mut graph = Graph::new();
        let encoder = SentenceEncoder::new(&mut graph, &config("source"), None).unwrap();
        let names: Vec<_> = encoder.variables().iter().map(|v| v.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["source/embedding_matrix", "source/encoder_weights", "source/encoder_bias"]
        );
        assert_eq!(graph.num_variables(), 3);
    }

    #[test]
    fn test_reused_encoder_binds_same_variables() {
        let mut graph = Graph::new();
        let first = SentenceEncoder::new(&mut graph, &config("source"), None).unwrap();
        let second = SentenceEncoder::new(&mut graph, &config("source_again"), Some(&first)).unwrap();
        assert_eq!(first.variables(), second.variables());
        assert_eq!(graph.num_variables(), 3);
    }

    #[test]
    fn test_reused_encoder_with_other_shapes_fails() {
        let mut graph = Graph::new();
        let first = SentenceEncoder::new(&mut graph, &config("source"), None).unwrap();
        let mut bigger = config("bigger");
        bigger.hidden_size = 4;
        assert!(matches!(
            SentenceEncoder::new(&mut graph, &bigger, Some(&first)),
            Err(PartError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_feed_dict_adds_sentence_lengths() {
        let mut graph = Graph::new();
        let encoder = SentenceEncoder::new(&mut graph, &config("source"), None).unwrap();

        let mut series = BTreeMap::new();
        series.insert(
            "source".to_string(),
            vec![vec!["a".to_string(), "b".to_string()], vec!["c".to_string()]],
        );
        let dataset = SentenceDataset::new("train", series).unwrap();

        let fd = encoder.feed_dict(&dataset, true).unwrap();
        assert_eq!(fd.len(), 3);
        assert_eq!(fd.get(encoder.base().batch_size()), Some(&FeedValue::Int(2)));
        assert_eq!(fd.get(encoder.input_lengths()), Some(&FeedValue::IntVector(vec![2, 1])));
    }

    #[test]
    fn test_feed_dict_requires_the_data_series() {
        let mut graph = Graph::new();
        let encoder = SentenceEncoder::new(&mut graph, &config("source"), None).unwrap();

        let batch = vec![(); 4];
        assert!(matches!(encoder.feed_dict(&batch, true), Err(PartError::Config(_))));

        let mut series = BTreeMap::new();
        series.insert("target".to_string(), vec![vec!["x".to_string()]]);
        let dataset = SentenceDataset::new("train", series).unwrap();
        assert!(matches!(encoder.feed_dict(&dataset, false), Err(PartError::Config(_))));
    }

    #[test]
    fn test_encode_uses_session_values() {
        let mut graph = Graph::new();
        let mut cfg = config("source");
        cfg.part = cfg.part.with_initializers(vec![
            InitializerSpec::new("embedding_matrix", Initializer::Ones),
            InitializerSpec::new("encoder_weights", Initializer::Ones),
        ]);
        let encoder = SentenceEncoder::new(&mut graph, &cfg, None).unwrap();
        let mut session = Session::<TestBackend>::new(Default::default());
        session.initialize(&graph).unwrap();

        let hidden = encoder.encode(&session, &[1, 4, 9]).unwrap();
        let values = hidden.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|v| (*v - 2.0f32.tanh()).abs() < 1e-5));

        assert!(encoder.encode(&session, &[]).is_err());
        assert!(encoder.encode(&session, &[10]).is_err());
    }
}
