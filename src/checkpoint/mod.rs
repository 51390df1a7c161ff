mod saver;

pub use saver::{
    list_checkpoints, read_index, CheckpointEntry, CheckpointIndex, IndexEntry, Saver,
    DATA_EXTENSION, INDEX_EXTENSION,
};
