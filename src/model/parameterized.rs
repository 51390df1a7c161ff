use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use burn::tensor::backend::Backend;
use tracing::info;

use crate::checkpoint::Saver;
use crate::config::PartConfig;
use crate::error::{PartError, Result};
use crate::graph::{Graph, ScopeGuard, VariableScope};
use crate::session::Session;

/// Owner of a variable scope and of the checkpoint persistence of the
/// variables created in it.
///
/// A part built with `reuse` shares the scope of the reused part: it never
/// creates variables of its own, and every variable it asks for resolves to
/// one the reused part already created.
#[derive(Debug)]
pub struct Parameterized {
    name: String,
    kind: &'static str,
    scope: Rc<VariableScope>,
    reused: bool,
    save_checkpoint: Option<PathBuf>,
    load_checkpoint: Option<PathBuf>,
    saver: OnceCell<Saver>,
}

impl Parameterized {
    /// `kind` tags the concrete part type; reuse is only allowed between
    /// parts with equal tags.
    pub fn new(
        graph: &mut Graph,
        kind: &'static str,
        config: PartConfig,
        reuse: Option<&Parameterized>,
    ) -> Result<Self> {
        config.validate()?;
        let PartConfig {
            name,
            save_checkpoint,
            load_checkpoint,
            initializers,
        } = config;

        let scope = match reuse {
            Some(reused) => {
                if reused.kind != kind {
                    return Err(PartError::ReuseKindMismatch {
                        name,
                        kind,
                        reused: reused.name.clone(),
                        reused_kind: reused.kind,
                    });
                }
                if initializers.is_some() {
                    return Err(PartError::InitializersWithReuse {
                        name,
                        reused: reused.name.clone(),
                    });
                }
                Rc::clone(&reused.scope)
            }
            None => {
                let scope = graph.variable_scope(&name);
                if let Some(initializers) = initializers {
                    graph.update_initializers(initializers.into_iter().map(|spec| {
                        (format!("{}/{}", scope.name(), spec.variable), spec.initializer)
                    }));
                }
                scope
            }
        };

        Ok(Self {
            name,
            kind,
            scope,
            reused: reuse.is_some(),
            save_checkpoint: configured(save_checkpoint),
            load_checkpoint: configured(load_checkpoint),
            saver: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn scope(&self) -> &Rc<VariableScope> {
        &self.scope
    }

    pub fn is_reused(&self) -> bool {
        self.reused
    }

    pub fn shares_scope_with(&self, other: &Parameterized) -> bool {
        Rc::ptr_eq(&self.scope, &other.scope)
    }

    pub fn save_checkpoint(&self) -> Option<&Path> {
        self.save_checkpoint.as_deref()
    }

    pub fn load_checkpoint(&self) -> Option<&Path> {
        self.load_checkpoint.as_deref()
    }

    /// Re-opens the part's variable scope and original name scope.
    ///
    /// Reuse is forced on when the scope was opened reusing or when this
    /// part was built with `reuse`.
    pub fn use_scope<'g>(&self, graph: &'g mut Graph) -> ScopeGuard<'g> {
        let reuse = self.scope.reuse() || self.reused;
        graph.enter(&self.scope, reuse)
    }

    /// The saver over all variables of the scope, built on first use.
    pub fn saver(&self, graph: &Graph) -> &Saver {
        self.saver.get_or_init(|| {
            let variables = graph.global_variables(self.scope.name()).cloned().collect();
            Saver::new(self.scope.name(), variables)
        })
    }

    pub fn has_saver(&self) -> bool {
        self.saver.get().is_some()
    }

    /// Saves the part's variables if a save checkpoint is configured.
    pub fn save<B: Backend>(&self, graph: &Graph, session: &Session<B>) -> Result<Option<PathBuf>> {
        let Some(path) = &self.save_checkpoint else {
            return Ok(None);
        };
        let index = self.saver(graph).save(session, path)?;
        info!("Variables of '{}' saved to {:?}", self.name, path);
        Ok(Some(index))
    }

    /// Loads the part's variables if a load checkpoint is configured.
    pub fn load<B: Backend>(&self, graph: &Graph, session: &mut Session<B>) -> Result<bool> {
        let Some(path) = &self.load_checkpoint else {
            return Ok(false);
        };
        self.saver(graph).restore(session, path)?;
        info!("Variables of '{}' loaded from {:?}", self.name, path);
        Ok(true)
    }
}

// An empty checkpoint path counts as not configured.
fn configured(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}
