use std::collections::HashMap;
use std::rc::Rc;

use tracing::{info, warn};

use crate::config::ModelConfig;
use crate::error::{PartError, Result};
use crate::graph::Graph;
use crate::model::PartRef;
use crate::parts::{Attention, Decoder, DecoderInputs, SentenceEncoder};

/// Parts built from a [`ModelConfig`], in declaration order.
pub struct BuiltModel {
    parts: Vec<PartRef>,
    by_name: HashMap<String, PartRef>,
    decoders: Vec<PartRef>,
}

impl BuiltModel {
    pub fn parts(&self) -> &[PartRef] {
        &self.parts
    }

    pub fn part(&self, name: &str) -> Option<&PartRef> {
        self.by_name.get(name)
    }

    /// The decoders, which are the roots of the dependency graph.
    pub fn decoders(&self) -> &[PartRef] {
        &self.decoders
    }
}

#[derive(Default)]
struct Registry {
    parts: Vec<PartRef>,
    by_name: HashMap<String, PartRef>,
}

impl Registry {
    fn add(&mut self, part: PartRef) -> Result<()> {
        let name = part.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(PartError::Config(format!("duplicate part name '{}'", name)));
        }
        self.by_name.insert(name, Rc::clone(&part));
        self.parts.push(part);
        Ok(())
    }

    fn lookup(&self, owner: &str, role: &str, name: &str) -> Result<PartRef> {
        self.by_name.get(name).cloned().ok_or_else(|| {
            PartError::Config(format!(
                "{} '{}' of part '{}' is not declared before it",
                role, name, owner
            ))
        })
    }

    /// Resolves a `reuse` reference among parts of the same kind.
    fn reuse<'a, T>(
        &self,
        owner: &str,
        kind: &'static str,
        typed: &'a HashMap<String, Rc<T>>,
        reuse: Option<&str>,
    ) -> Result<Option<&'a T>> {
        let Some(reused) = reuse else {
            return Ok(None);
        };
        if let Some(part) = typed.get(reused) {
            return Ok(Some(part.as_ref()));
        }
        match self.by_name.get(reused) {
            Some(other) => Err(PartError::ReuseKindMismatch {
                name: owner.to_string(),
                kind,
                reused: reused.to_string(),
                reused_kind: other.base().kind(),
            }),
            None => Err(PartError::Config(format!(
                "part '{}' reuses unknown part '{}'",
                owner, reused
            ))),
        }
    }
}

/// Builds every part of `config` into `graph`.
///
/// Encoders come first, then attentions, then decoders; references are
/// resolved by name among parts built earlier.
pub fn build_model(config: &ModelConfig, graph: &mut Graph) -> Result<BuiltModel> {
    config.validate()?;
    let mut registry = Registry::default();

    let mut encoders: HashMap<String, Rc<SentenceEncoder>> = HashMap::new();
    for cfg in &config.encoders {
        let reuse = registry.reuse(
            &cfg.part.name,
            crate::parts::SENTENCE_ENCODER,
            &encoders,
            cfg.reuse.as_deref(),
        )?;
        let encoder = Rc::new(SentenceEncoder::new(graph, cfg, reuse)?);
        registry.add(Rc::clone(&encoder) as PartRef)?;
        encoders.insert(cfg.part.name.clone(), encoder);
    }

    let mut attentions: HashMap<String, Rc<Attention>> = HashMap::new();
    for cfg in &config.attentions {
        let encoder = registry.lookup(&cfg.part.name, "encoder", &cfg.encoder)?;
        let reuse = registry.reuse(
            &cfg.part.name,
            crate::parts::ATTENTION,
            &attentions,
            cfg.reuse.as_deref(),
        )?;
        let attention = Rc::new(Attention::new(graph, cfg, encoder, reuse)?);
        registry.add(Rc::clone(&attention) as PartRef)?;
        attentions.insert(cfg.part.name.clone(), attention);
    }

    let mut decoders: HashMap<String, Rc<Decoder>> = HashMap::new();
    let mut roots = Vec::with_capacity(config.decoders.len());
    for cfg in &config.decoders {
        let owner = cfg.part.name.as_str();
        let inputs = DecoderInputs {
            encoders: cfg
                .encoders
                .iter()
                .map(|name| registry.lookup(owner, "encoder", name))
                .collect::<Result<_>>()?,
            attentions: cfg
                .attentions
                .iter()
                .map(|name| registry.lookup(owner, "attention", name))
                .collect::<Result<_>>()?,
            parent_decoder: cfg
                .parent_decoder
                .as_deref()
                .map(|name| registry.lookup(owner, "parent decoder", name))
                .transpose()?,
        };
        let reuse = registry.reuse(owner, crate::parts::DECODER, &decoders, cfg.reuse.as_deref())?;
        let decoder = Rc::new(Decoder::new(graph, cfg, inputs, reuse)?);
        let part = Rc::clone(&decoder) as PartRef;
        registry.add(Rc::clone(&part))?;
        roots.push(part);
        decoders.insert(cfg.part.name.clone(), decoder);
    }

    let unused = graph.initializers().unused();
    if !unused.is_empty() {
        warn!("Initializers never matched a variable: {:?}", unused);
    }
    info!(
        "Built {} model parts with {} variables",
        registry.parts.len(),
        graph.num_variables()
    );

    Ok(BuiltModel {
        parts: registry.parts,
        by_name: registry.by_name,
        decoders: roots,
    })
}
