use burn::tensor::{backend::Backend, Tensor};

use crate::config::AttentionConfig;
use crate::error::Result;
use crate::graph::{Graph, Initializer, Variable};
use crate::model::{ModelPart, ModelPartBase, PartRef, Relations};
use crate::session::Session;

pub const ATTENTION: &str = "attention";

/// Bilinear attention over the states of one encoder.
pub struct Attention {
    base: ModelPartBase,
    encoder: PartRef,
    attention_weights: Variable,
}

impl Attention {
    pub fn new(
        graph: &mut Graph,
        config: &AttentionConfig,
        encoder: PartRef,
        reuse: Option<&Attention>,
    ) -> Result<Self> {
        config.validate()?;
        let base = ModelPartBase::new(graph, ATTENTION, config.part.clone(), reuse.map(|r| &r.base))?;

        let attention_weights = base.use_scope(graph).get_variable(
            "attention_weights",
            &[config.hidden_size, config.hidden_size],
            Initializer::XavierUniform,
        )?;

        Ok(Self {
            base,
            encoder,
            attention_weights,
        })
    }

    pub fn encoder(&self) -> &PartRef {
        &self.encoder
    }

    pub fn attention_weights(&self) -> &Variable {
        &self.attention_weights
    }

    /// Score of `query` against each row of `states`: `states W query`.
    pub fn scores<B: Backend>(
        &self,
        session: &Session<B>,
        query: Tensor<B, 1>,
        states: Tensor<B, 2>,
    ) -> Result<Tensor<B, 1>> {
        let weights = session.tensor::<2>(&self.attention_weights)?;
        let projected = weights.matmul(query.unsqueeze_dim::<2>(1));
        let [steps, _] = states.dims();
        Ok(states.matmul(projected).reshape([steps]))
    }
}

impl ModelPart for Attention {
    fn base(&self) -> &ModelPartBase {
        &self.base
    }

    fn relations(&self) -> Relations {
        Relations::new().with_encoder(self.encoder.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EncoderConfig, InitializerSpec, PartConfig};
    use crate::model::get_dependencies;
    use crate::parts::SentenceEncoder;
    use burn_ndarray::NdArray;
    use std::rc::Rc;

    type TestBackend = NdArray<f32>;

    fn encoder(graph: &mut Graph) -> PartRef {
        let mut config = EncoderConfig::new(PartConfig::new("source"));
        config.hidden_size = 2;
        Rc::new(SentenceEncoder::new(graph, &config, None).unwrap())
    }

    #[test]
    fn test_depends_on_its_encoder() {
        let mut graph = Graph::new();
        let enc = encoder(&mut graph);
        let mut config = AttentionConfig::new(PartConfig::new("attention"), "source");
        config.hidden_size = 2;
        let attention: PartRef = Rc::new(Attention::new(&mut graph, &config, Rc::clone(&enc), None).unwrap());

        let deps = get_dependencies(&attention);
        assert_eq!(deps.len(), 2);
        assert!(deps.contains(&enc));
    }

    #[test]
    fn test_scores_follow_bilinear_form() {
        let mut graph = Graph::new();
        let enc = encoder(&mut graph);
        let mut config = AttentionConfig::new(
            PartConfig::new("attention").with_initializers(vec![InitializerSpec::new(
                "attention_weights",
                Initializer::Ones,
            )]),
            "source",
        );
        config.hidden_size = 2;
        let attention = Attention::new(&mut graph, &config, enc, None).unwrap();

        let mut session = Session::<TestBackend>::new(Default::default());
        session.initialize(&graph).unwrap();
        let device = session.device().clone();

        let query = Tensor::<TestBackend, 1>::from_floats([1.0, 2.0], &device);
        let states = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]], &device);
        let scores = attention.scores(&session, query, states).unwrap();
        let values = scores.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![3.0, 3.0, 6.0]);
    }
}
