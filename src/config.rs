use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use crate::error::{PartError, Result};
use crate::graph::Initializer;

/// Initializer override for one variable of a part, named relative to the
/// part's scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializerSpec {
    pub variable: String,
    pub initializer: Initializer,
}

impl InitializerSpec {
    pub fn new(variable: impl Into<String>, initializer: Initializer) -> Self {
        Self {
            variable: variable.into(),
            initializer,
        }
    }
}

/// Settings shared by every model part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartConfig {
    pub name: String,
    pub save_checkpoint: Option<PathBuf>,
    pub load_checkpoint: Option<PathBuf>,
    pub initializers: Option<Vec<InitializerSpec>>,
}

impl PartConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_save_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_checkpoint = Some(path.into());
        self
    }

    pub fn with_load_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.load_checkpoint = Some(path.into());
        self
    }

    pub fn with_initializers(mut self, initializers: Vec<InitializerSpec>) -> Self {
        self.initializers = Some(initializers);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(PartError::Config("part name must not be empty".to_string()));
        }
        if self.name.contains('/') {
            return Err(PartError::Config(format!(
                "part name '{}' must not contain '/'",
                self.name
            )));
        }
        for spec in self.initializers.iter().flatten() {
            if spec.variable.is_empty() {
                return Err(PartError::Config(format!(
                    "initializer of part '{}' names no variable",
                    self.name
                )));
            }
            if let Err(PartError::Config(reason)) = spec.initializer.validate() {
                return Err(PartError::Config(format!(
                    "initializer for '{}/{}': {}",
                    self.name, spec.variable, reason
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for PartConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    #[serde(flatten)]
    pub part: PartConfig,
    #[serde(default)]
    pub reuse: Option<String>,
    #[serde(default = "default_data_id")]
    pub data_id: String,
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    #[serde(default = "default_embedding_size")]
    pub embedding_size: usize,
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
}

impl EncoderConfig {
    pub fn new(part: PartConfig) -> Self {
        Self {
            part,
            reuse: None,
            data_id: default_data_id(),
            vocab_size: default_vocab_size(),
            embedding_size: default_embedding_size(),
            hidden_size: default_hidden_size(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.part.validate()?;
        positive(&self.part.name, "vocab_size", self.vocab_size)?;
        positive(&self.part.name, "embedding_size", self.embedding_size)?;
        positive(&self.part.name, "hidden_size", self.hidden_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionConfig {
    #[serde(flatten)]
    pub part: PartConfig,
    #[serde(default)]
    pub reuse: Option<String>,
    pub encoder: String,
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
}

impl AttentionConfig {
    pub fn new(part: PartConfig, encoder: impl Into<String>) -> Self {
        Self {
            part,
            reuse: None,
            encoder: encoder.into(),
            hidden_size: default_hidden_size(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.part.validate()?;
        positive(&self.part.name, "hidden_size", self.hidden_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    #[serde(flatten)]
    pub part: PartConfig,
    #[serde(default)]
    pub reuse: Option<String>,
    #[serde(default)]
    pub encoders: Vec<String>,
    #[serde(default)]
    pub attentions: Vec<String>,
    #[serde(default)]
    pub parent_decoder: Option<String>,
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
}

impl DecoderConfig {
    pub fn new(part: PartConfig) -> Self {
        Self {
            part,
            reuse: None,
            encoders: Vec::new(),
            attentions: Vec::new(),
            parent_decoder: None,
            vocab_size: default_vocab_size(),
            hidden_size: default_hidden_size(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.part.validate()?;
        positive(&self.part.name, "vocab_size", self.vocab_size)?;
        positive(&self.part.name, "hidden_size", self.hidden_size)
    }
}

/// A whole model: encoders, attentions over them and decoders on top.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub encoders: Vec<EncoderConfig>,
    pub attentions: Vec<AttentionConfig>,
    pub decoders: Vec<DecoderConfig>,
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        let parts = self
            .encoders
            .iter()
            .map(|e| &e.part)
            .chain(self.attentions.iter().map(|a| &a.part))
            .chain(self.decoders.iter().map(|d| &d.part));
        for part in parts {
            if !names.insert(part.name.as_str()) {
                return Err(PartError::Config(format!("duplicate part name '{}'", part.name)));
            }
        }

        for encoder in &self.encoders {
            encoder.validate()?;
        }
        for attention in &self.attentions {
            attention.validate()?;
        }
        for decoder in &self.decoders {
            decoder.validate()?;
        }
        if self.decoders.is_empty() {
            return Err(PartError::Config("model declares no decoder".to_string()));
        }
        Ok(())
    }
}

fn positive(part: &str, field: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(PartError::Config(format!("{} of part '{}' must be > 0", field, part)));
    }
    Ok(())
}

fn default_data_id() -> String {
    "source".to_string()
}

fn default_vocab_size() -> usize {
    512
}

fn default_embedding_size() -> usize {
    64
}

fn default_hidden_size() -> usize {
    128
}
