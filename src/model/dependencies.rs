use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::rc::Rc;

use super::model_part::PartRef;

/// The parts a model part is wired to.
#[derive(Clone, Default)]
pub struct Relations {
    pub attentions: Vec<PartRef>,
    pub encoders: Vec<PartRef>,
    pub encoder: Option<PartRef>,
    pub input_sequence: Option<PartRef>,
    pub parent_decoder: Option<PartRef>,
}

impl Relations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attentions(mut self, attentions: Vec<PartRef>) -> Self {
        self.attentions = attentions;
        self
    }

    pub fn with_encoders(mut self, encoders: Vec<PartRef>) -> Self {
        self.encoders = encoders;
        self
    }

    pub fn with_encoder(mut self, encoder: PartRef) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn with_input_sequence(mut self, input_sequence: PartRef) -> Self {
        self.input_sequence = Some(input_sequence);
        self
    }

    pub fn with_parent_decoder(mut self, parent_decoder: PartRef) -> Self {
        self.parent_decoder = Some(parent_decoder);
        self
    }

    /// Attentions, encoders, encoder, input sequence, parent decoder.
    pub fn neighbors(&self) -> impl Iterator<Item = &PartRef> {
        self.attentions
            .iter()
            .chain(self.encoders.iter())
            .chain(self.encoder.iter())
            .chain(self.input_sequence.iter())
            .chain(self.parent_decoder.iter())
    }
}

impl fmt::Debug for Relations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |parts: &[PartRef]| parts.iter().map(|p| p.name().to_string()).collect::<Vec<_>>();
        let name = |part: &Option<PartRef>| part.as_ref().map(|p| p.name().to_string());
        f.debug_struct("Relations")
            .field("attentions", &names(self.attentions.as_slice()))
            .field("encoders", &names(self.encoders.as_slice()))
            .field("encoder", &name(&self.encoder))
            .field("input_sequence", &name(&self.input_sequence))
            .field("parent_decoder", &name(&self.parent_decoder))
            .finish()
    }
}

fn part_id(part: &PartRef) -> *const () {
    Rc::as_ptr(part) as *const ()
}

/// The set of parts reachable from one or more roots, roots included,
/// in discovery order.
#[derive(Clone, Default)]
pub struct Dependencies {
    parts: Vec<PartRef>,
    seen: HashSet<*const ()>,
}

impl Dependencies {
    pub fn of(root: &PartRef) -> Self {
        Self::of_all(std::slice::from_ref(root))
    }

    pub fn of_all(roots: &[PartRef]) -> Self {
        let mut deps = Self::default();
        for root in roots {
            deps.visit(root);
        }
        deps
    }

    // Iterative preorder walk; parts already seen are skipped, so cyclic
    // wiring terminates.
    fn visit(&mut self, root: &PartRef) {
        let mut stack = vec![Rc::clone(root)];
        while let Some(part) = stack.pop() {
            if !self.seen.insert(part_id(&part)) {
                continue;
            }
            let relations = part.relations();
            let neighbors: Vec<PartRef> = relations.neighbors().cloned().collect();
            stack.extend(neighbors.into_iter().rev());
            self.parts.push(part);
        }
    }

    pub fn contains(&self, part: &PartRef) -> bool {
        self.seen.contains(&part_id(part))
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartRef> {
        self.parts.iter()
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.parts.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn into_vec(self) -> Vec<PartRef> {
        self.parts
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.parts.iter().map(|p| p.name()))
            .finish()
    }
}

/// Every part reachable from `part`, including `part` itself.
pub fn get_dependencies(part: &PartRef) -> Dependencies {
    Dependencies::of(part)
}
