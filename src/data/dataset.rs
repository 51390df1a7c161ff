use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{PartError, Result};

pub type Sentence = Vec<String>;

/// Anything a part can be fed from: at minimum it knows how many examples
/// the current batch holds.
pub trait Dataset {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn name(&self) -> &str {
        "dataset"
    }

    /// Tokenized sentences of the series `id`, if the dataset carries it.
    fn series(&self, _id: &str) -> Option<&[Sentence]> {
        None
    }
}

impl<T> Dataset for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// Parallel named series of tokenized sentences.
#[derive(Debug, Clone, Default)]
pub struct SentenceDataset {
    name: String,
    series: BTreeMap<String, Vec<Sentence>>,
    len: usize,
}

impl SentenceDataset {
    pub fn new(name: impl Into<String>, series: BTreeMap<String, Vec<Sentence>>) -> Result<Self> {
        let name = name.into();
        let mut lengths = series.iter().map(|(id, s)| (id, s.len()));
        let len = match lengths.next() {
            Some((_, len)) => len,
            None => 0,
        };
        if let Some((id, other)) = lengths.find(|(_, l)| *l != len) {
            return Err(PartError::Config(format!(
                "series '{}' of dataset '{}' has {} sentences, expected {}",
                id, name, other, len
            )));
        }
        Ok(Self { name, series, len })
    }

    /// Reads one whitespace-tokenized sentence per line for every series.
    pub fn from_files<P: AsRef<Path>>(name: impl Into<String>, files: &[(&str, P)]) -> Result<Self> {
        let mut series = BTreeMap::new();
        for (id, path) in files {
            let path: &Path = path.as_ref();
            let text = fs::read_to_string(path).map_err(|e| PartError::io(path, e))?;
            let sentences: Vec<Sentence> = text
                .lines()
                .map(|line| line.split_whitespace().map(str::to_string).collect())
                .collect();
            info!("Loaded {} sentences of series '{}' from {:?}", sentences.len(), id, path);
            series.insert(id.to_string(), sentences);
        }
        Self::new(name, series)
    }

    pub fn series_ids(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }
}

impl Dataset for SentenceDataset {
    fn len(&self) -> usize {
        self.len
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn series(&self, id: &str) -> Option<&[Sentence]> {
        self.series.get(id).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sentences(texts: &[&str]) -> Vec<Sentence> {
        texts
            .iter()
            .map(|t| t.split_whitespace().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_series_lengths_must_agree() {
        let mut series = BTreeMap::new();
        series.insert("source".to_string(), sentences(&["a b", "c"]));
        series.insert("target".to_string(), sentences(&["x"]));
        assert!(SentenceDataset::new("train", series).is_err());
    }

    #[test]
    fn test_from_files_tokenizes_lines() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.txt");
        let target = temp_dir.path().join("target.txt");
        fs::write(&source, "ein kleiner test\nhallo\n").unwrap();
        fs::write(&target, "a small test\nhello\n").unwrap();

        let dataset =
            SentenceDataset::from_files("dev", &[("source", &source), ("target", &target)]).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.name(), "dev");
        assert_eq!(dataset.series("source").unwrap()[0].len(), 3);
        assert!(dataset.series("missing").is_none());
    }

    #[test]
    fn test_vec_is_a_length_only_dataset() {
        let batch = vec![(); 7];
        assert_eq!(Dataset::len(&batch), 7);
        assert!(batch.series("source").is_none());
    }
}
