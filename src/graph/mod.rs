mod initializer;
mod scope;

pub use initializer::{Initializer, InitializerRegistry};
pub use scope::{ScopeGuard, VariableScope};

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PartError, Result};
use crate::session::{InputKind, Placeholder};
use scope::ScopeFrame;

/// A learnable parameter declared in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    shape: Vec<usize>,
    initializer: Initializer,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn initializer(&self) -> &Initializer {
        &self.initializer
    }
}

/// Declarations of every variable and runtime input of a model.
///
/// Values live in a [`crate::session::Session`]; the graph only records
/// names, shapes and initializers, plus the stack of currently entered
/// scopes.
#[derive(Debug, Default)]
pub struct Graph {
    variables: BTreeMap<String, Variable>,
    placeholders: Vec<Placeholder>,
    pub(crate) frames: Vec<ScopeFrame>,
    used_names: HashMap<String, usize>,
    initializers: InitializerRegistry,
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_scope(&self) -> &str {
        self.frames.last().map(|f| f.var_scope.as_str()).unwrap_or("")
    }

    pub fn current_name_scope(&self) -> &str {
        self.frames.last().map(|f| f.name_scope.as_str()).unwrap_or("")
    }

    pub fn is_reusing(&self) -> bool {
        self.frames.last().map(|f| f.reuse).unwrap_or(false)
    }

    /// Opens a new variable scope below the current one.
    ///
    /// The variable name is not uniquified (opening `encoder` twice yields
    /// the same prefix) but the accompanying name scope is.
    pub fn variable_scope(&mut self, name: &str) -> Rc<VariableScope> {
        let full_name = join(self.current_scope(), name);
        let name_scope = join(self.current_name_scope(), name);
        let name_scope = self.unique_name(&name_scope);
        debug!("Opened variable scope '{}' (name scope '{}')", full_name, name_scope);
        Rc::new(VariableScope::new(full_name, name_scope, self.is_reusing()))
    }

    /// Re-enters `scope` and its original name scope until the guard drops.
    pub fn enter(&mut self, scope: &VariableScope, reuse: bool) -> ScopeGuard<'_> {
        let frame = ScopeFrame {
            var_scope: scope.name().to_string(),
            name_scope: scope.original_name_scope().to_string(),
            reuse: reuse || self.is_reusing(),
        };
        ScopeGuard::new(self, frame)
    }

    /// Creates `name` in the current scope, or binds to it when reusing.
    pub fn get_variable(
        &mut self,
        name: &str,
        shape: &[usize],
        default: Initializer,
    ) -> Result<Variable> {
        let full_name = join(self.current_scope(), name);

        if self.is_reusing() {
            let existing = self
                .variables
                .get(&full_name)
                .ok_or_else(|| PartError::MissingVariable(full_name.clone()))?;
            if existing.shape != shape {
                return Err(PartError::ShapeMismatch {
                    name: full_name,
                    expected: existing.shape.clone(),
                    found: shape.to_vec(),
                });
            }
            return Ok(existing.clone());
        }

        if self.variables.contains_key(&full_name) {
            return Err(PartError::VariableExists(full_name));
        }

        let initializer = self.initializers.resolve(&full_name).unwrap_or(default);
        let variable = Variable {
            name: full_name.clone(),
            shape: shape.to_vec(),
            initializer,
        };
        debug!("Created variable '{}' with shape {:?}", full_name, shape);
        self.variables.insert(full_name, variable.clone());
        Ok(variable)
    }

    /// Declares a runtime input in the current name scope.
    pub fn placeholder(&mut self, name: &str, kind: InputKind) -> Placeholder {
        let op_name = join(self.current_name_scope(), name);
        let op_name = self.unique_name(&op_name);
        let placeholder = Placeholder::new(op_name, kind);
        self.placeholders.push(placeholder.clone());
        placeholder
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// Variables named `scope` or living below `scope/`, in name order.
    pub fn global_variables<'a>(&'a self, scope: &'a str) -> impl Iterator<Item = &'a Variable> + 'a {
        self.variables.values().filter(move |v| {
            scope.is_empty()
                || v.name == scope
                || (v.name.starts_with(scope) && v.name[scope.len()..].starts_with('/'))
        })
    }

    pub fn update_initializers<I>(&mut self, initializers: I)
    where
        I: IntoIterator<Item = (String, Initializer)>,
    {
        self.initializers.update(initializers);
    }

    pub fn initializers(&self) -> &InitializerRegistry {
        &self.initializers
    }

    fn unique_name(&mut self, name: &str) -> String {
        let Some(count) = self.used_names.get(name).copied() else {
            self.used_names.insert(name.to_string(), 1);
            return name.to_string();
        };

        let mut suffix = count;
        let candidate = loop {
            let candidate = format!("{}_{}", name, suffix);
            suffix += 1;
            if !self.used_names.contains_key(&candidate) {
                break candidate;
            }
        };
        self.used_names.insert(name.to_string(), suffix);
        self.used_names.insert(candidate.clone(), 1);
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_scopes_join_names() {
        let mut graph = Graph::new();
        let outer = graph.variable_scope("decoder");
        let inner = {
            let mut g = graph.enter(&outer, false);
            g.variable_scope("attention")
        };
        assert_eq!(inner.name(), "decoder/attention");
        assert_eq!(inner.original_name_scope(), "decoder/attention");
        assert_eq!(graph.current_scope(), "");
    }

    #[test]
    fn test_name_scopes_are_uniquified() {
        let mut graph = Graph::new();
        let first = graph.variable_scope("encoder");
        let second = graph.variable_scope("encoder");
        assert_eq!(first.name(), second.name());
        assert_eq!(first.original_name_scope(), "encoder");
        assert_eq!(second.original_name_scope(), "encoder_1");
    }

    #[test]
    fn test_duplicate_variable_without_reuse_fails() {
        let mut graph = Graph::new();
        let scope = graph.variable_scope("enc");
        let mut g = graph.enter(&scope, false);
        g.get_variable("w", &[2, 2], Initializer::Zeros).unwrap();
        let err = g.get_variable("w", &[2, 2], Initializer::Zeros).unwrap_err();
        assert!(matches!(err, PartError::VariableExists(name) if name == "enc/w"));
    }

    #[test]
    fn test_reuse_binds_existing_variable() {
        let mut graph = Graph::new();
        let scope = graph.variable_scope("enc");
        let created = graph
            .enter(&scope, false)
            .get_variable("w", &[2, 3], Initializer::Ones)
            .unwrap();

        let mut g = graph.enter(&scope, true);
        let reused = g.get_variable("w", &[2, 3], Initializer::Zeros).unwrap();
        assert_eq!(created, reused);
        assert!(matches!(
            g.get_variable("b", &[3], Initializer::Zeros),
            Err(PartError::MissingVariable(name)) if name == "enc/b"
        ));
        assert!(matches!(
            g.get_variable("w", &[3, 2], Initializer::Zeros),
            Err(PartError::ShapeMismatch { .. })
        ));
        drop(g);
        assert_eq!(graph.num_variables(), 1);
    }

    #[test]
    fn test_reuse_is_inherited_by_inner_scopes() {
        let mut graph = Graph::new();
        let outer = graph.variable_scope("outer");
        let mut g = graph.enter(&outer, true);
        let inner = g.variable_scope("inner");
        assert!(inner.reuse());
        let mut gi = g.enter(&inner, false);
        assert!(gi.is_reusing());
        assert!(gi.get_variable("w", &[1], Initializer::Zeros).is_err());
    }

    #[test]
    fn test_guard_restores_scope_on_early_return() {
        fn create_then_fail(graph: &mut Graph, scope: &VariableScope) -> Result<()> {
            let mut g = graph.enter(scope, false);
            g.get_variable("w", &[1], Initializer::Zeros)?;
            g.get_variable("w", &[1], Initializer::Zeros)?;
            Ok(())
        }

        let mut graph = Graph::new();
        let scope = graph.variable_scope("part");
        assert!(create_then_fail(&mut graph, &scope).is_err());
        assert_eq!(graph.current_scope(), "");
        assert!(!graph.is_reusing());
    }

    #[test]
    fn test_registered_initializer_overrides_default() {
        let mut graph = Graph::new();
        graph.update_initializers(vec![("enc/w".to_string(), Initializer::Ones)]);
        let scope = graph.variable_scope("enc");
        let mut g = graph.enter(&scope, false);
        let w = g.get_variable("w", &[2], Initializer::Zeros).unwrap();
        let b = g.get_variable("b", &[2], Initializer::Zeros).unwrap();
        assert_eq!(w.initializer(), &Initializer::Ones);
        assert_eq!(b.initializer(), &Initializer::Zeros);
        drop(g);
        assert!(graph.initializers().unused().is_empty());
    }

    #[test]
    fn test_global_variables_respects_scope_boundary() {
        let mut graph = Graph::new();
        for name in ["encoder", "encoder_2"] {
            let scope = graph.variable_scope(name);
            graph
                .enter(&scope, false)
                .get_variable("w", &[1], Initializer::Zeros)
                .unwrap();
        }
        let names: Vec<_> = graph.global_variables("encoder").map(|v| v.name()).collect();
        assert_eq!(names, vec!["encoder/w"]);
        assert_eq!(graph.global_variables("").count(), 2);
    }

    #[test]
    fn test_placeholders_uniquified_in_reentered_scope() {
        let mut graph = Graph::new();
        let scope = graph.variable_scope("enc");
        let first = graph.enter(&scope, false).placeholder("train_mode", InputKind::Bool);
        let second = graph.enter(&scope, true).placeholder("train_mode", InputKind::Bool);
        assert_eq!(first.name(), "enc/train_mode");
        assert_eq!(second.name(), "enc/train_mode_1");
        assert_eq!(graph.placeholders().len(), 2);
    }
}
