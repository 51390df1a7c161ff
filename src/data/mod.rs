mod dataset;

pub use dataset::{Dataset, Sentence, SentenceDataset};
