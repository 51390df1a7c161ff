use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{PartError, Result};

/// Type of a runtime input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputKind {
    Bool,
    Int,
    Float,
    IntVector,
}

/// A named runtime input, supplied anew for every batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
    name: String,
    kind: InputKind,
}

impl Placeholder {
    pub(crate) fn new(name: String, kind: InputKind) -> Self {
        Self { name, kind }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    IntVector(Vec<i64>),
}

impl FeedValue {
    pub fn kind(&self) -> InputKind {
        match self {
            Self::Bool(_) => InputKind::Bool,
            Self::Int(_) => InputKind::Int,
            Self::Float(_) => InputKind::Float,
            Self::IntVector(_) => InputKind::IntVector,
        }
    }
}

impl From<bool> for FeedValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FeedValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for FeedValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<i64>> for FeedValue {
    fn from(value: Vec<i64>) -> Self {
        Self::IntVector(value)
    }
}

/// Values for the runtime inputs of one execution step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedDict {
    entries: HashMap<Placeholder, FeedValue>,
}

impl FeedDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, placeholder: &Placeholder, value: impl Into<FeedValue>) -> Option<FeedValue> {
        self.entries.insert(placeholder.clone(), value.into())
    }

    pub fn get(&self, placeholder: &Placeholder) -> Option<&FeedValue> {
        self.entries.get(placeholder)
    }

    /// Looks an input up by its op name.
    pub fn get_by_name(&self, name: &str) -> Option<&FeedValue> {
        self.entries
            .iter()
            .find(|(placeholder, _)| placeholder.name() == name)
            .map(|(_, value)| value)
    }

    pub fn extend(&mut self, other: FeedDict) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Placeholder, &FeedValue)> {
        self.entries.iter()
    }

    /// Verifies that every value matches the kind of its input.
    pub fn check(&self) -> Result<()> {
        for (placeholder, value) in &self.entries {
            if placeholder.kind() != value.kind() {
                return Err(PartError::FeedKindMismatch {
                    name: placeholder.name().to_string(),
                    expected: placeholder.kind(),
                    found: value.kind(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_reports_kind_mismatch() {
        let flag = Placeholder::new("enc/train_mode".to_string(), InputKind::Bool);
        let size = Placeholder::new("enc/batch_size".to_string(), InputKind::Int);

        let mut fd = FeedDict::new();
        fd.insert(&flag, true);
        fd.insert(&size, 3i64);
        assert!(fd.check().is_ok());

        fd.insert(&size, 2.5f32);
        assert!(matches!(
            fd.check(),
            Err(PartError::FeedKindMismatch { expected: InputKind::Int, found: InputKind::Float, .. })
        ));
    }

    #[test]
    fn test_extend_merges_entries() {
        let a = Placeholder::new("a".to_string(), InputKind::Bool);
        let b = Placeholder::new("b".to_string(), InputKind::IntVector);

        let mut left = FeedDict::new();
        left.insert(&a, false);
        let mut right = FeedDict::new();
        right.insert(&b, vec![1i64, 2]);

        left.extend(right);
        assert_eq!(left.len(), 2);
        assert_eq!(left.get_by_name("b"), Some(&FeedValue::IntVector(vec![1, 2])));
    }
}
