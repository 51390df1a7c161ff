mod attention;
mod decoder;
mod encoder;

pub use attention::{Attention, ATTENTION};
pub use decoder::{Decoder, DecoderInputs, DECODER};
pub use encoder::{SentenceEncoder, SENTENCE_ENCODER};
