use std::ops::{Deref, DerefMut};

use super::Graph;

/// A variable namespace owned by one model part (or shared through reuse).
#[derive(Debug, PartialEq, Eq)]
pub struct VariableScope {
    name: String,
    original_name_scope: String,
    reuse: bool,
}

impl VariableScope {
    pub(crate) fn new(name: String, original_name_scope: String, reuse: bool) -> Self {
        Self {
            name,
            original_name_scope,
            reuse,
        }
    }

    /// Fully-qualified variable prefix, e.g. `decoder/attention`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name scope created together with this variable scope. Re-entering
    /// the scope always lands here rather than in a fresh `name_N` scope.
    pub fn original_name_scope(&self) -> &str {
        &self.original_name_scope
    }

    /// Whether the scope was opened inside a reusing scope.
    pub fn reuse(&self) -> bool {
        self.reuse
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ScopeFrame {
    pub(crate) var_scope: String,
    pub(crate) name_scope: String,
    pub(crate) reuse: bool,
}

/// Keeps a scope entered on the graph until dropped.
///
/// The guard derefs to the [`Graph`], so variables and inputs created through
/// it land in the entered scope. Nested guards are taken through the outer
/// guard and restore the stack to their own entry depth on drop, including
/// during unwinding.
pub struct ScopeGuard<'g> {
    graph: &'g mut Graph,
    depth: usize,
}

impl<'g> ScopeGuard<'g> {
    pub(crate) fn new(graph: &'g mut Graph, frame: ScopeFrame) -> Self {
        let depth = graph.frames.len();
        graph.frames.push(frame);
        Self { graph, depth }
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        self.graph
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Graph {
        self.graph
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.graph.frames.truncate(self.depth);
    }
}
