use burn::tensor::{backend::Backend, Tensor};

use crate::config::DecoderConfig;
use crate::error::{PartError, Result};
use crate::graph::{Graph, Initializer, Variable};
use crate::model::{ModelPart, ModelPartBase, PartRef, Relations};
use crate::session::Session;

pub const DECODER: &str = "decoder";

/// Wiring of a decoder to the parts it reads from.
#[derive(Clone, Default)]
pub struct DecoderInputs {
    pub encoders: Vec<PartRef>,
    pub attentions: Vec<PartRef>,
    pub parent_decoder: Option<PartRef>,
}

/// Projects a hidden state to output vocabulary logits.
pub struct Decoder {
    base: ModelPartBase,
    inputs: DecoderInputs,
    hidden_size: usize,
    output_projection: Variable,
    output_bias: Variable,
}

impl Decoder {
    pub fn new(
        graph: &mut Graph,
        config: &DecoderConfig,
        inputs: DecoderInputs,
        reuse: Option<&Decoder>,
    ) -> Result<Self> {
        config.validate()?;
        let base = ModelPartBase::new(graph, DECODER, config.part.clone(), reuse.map(|r| &r.base))?;

        let mut g = base.use_scope(graph);
        let output_projection = g.get_variable(
            "output_projection",
            &[config.hidden_size, config.vocab_size],
            Initializer::XavierUniform,
        )?;
        let output_bias = g.get_variable("output_bias", &[config.vocab_size], Initializer::Zeros)?;
        drop(g);

        Ok(Self {
            base,
            inputs,
            hidden_size: config.hidden_size,
            output_projection,
            output_bias,
        })
    }

    pub fn inputs(&self) -> &DecoderInputs {
        &self.inputs
    }

    pub fn output_projection(&self) -> &Variable {
        &self.output_projection
    }

    pub fn output_bias(&self) -> &Variable {
        &self.output_bias
    }

    pub fn logits<B: Backend>(&self, session: &Session<B>, state: Tensor<B, 1>) -> Result<Tensor<B, 1>> {
        let [size] = state.dims();
        if size != self.hidden_size {
            return Err(PartError::ShapeMismatch {
                name: format!("{}/state", self.name()),
                expected: vec![self.hidden_size],
                found: vec![size],
            });
        }
        let projection = session.tensor::<2>(&self.output_projection)?;
        let bias = session.tensor::<1>(&self.output_bias)?;
        let [_, vocab_size] = projection.dims();
        let logits = state.unsqueeze::<2>().matmul(projection).reshape([vocab_size]);
        Ok(logits + bias)
    }
}

impl ModelPart for Decoder {
    fn base(&self) -> &ModelPartBase {
        &self.base
    }

    fn relations(&self) -> Relations {
        let relations = Relations::new()
            .with_encoders(self.inputs.encoders.clone())
            .with_attentions(self.inputs.attentions.clone());
        match &self.inputs.parent_decoder {
            Some(parent) => relations.with_parent_decoder(parent.clone()),
            None => relations,
        }
    }
}
