//! Aria TTS - chunked text-to-speech inference pipeline.
//!
//! The speech model accepts at most 510 phoneme token ids per call, so the
//! core job here is packing: phonemized tokens are greedily accumulated and
//! split at natural punctuation boundaries (sentence end, clause end,
//! comma) before each chunk is run through the model. Results come back as
//! an ordered, pull-based stream of (text, phonemes, audio) chunks.
//!
//! The phonemizer and the neural model are collaborators behind traits;
//! espeak-ng and ONNX Runtime provide the production implementations.

pub mod assets;
pub mod model;
pub mod packer;
pub mod phonemizer;
pub mod pipeline;
pub mod runner;
pub mod token;
pub mod vocab;
pub mod voices;
pub mod wav;

// Re-export main types for convenience
pub use assets::{AssetError, AssetPaths, FetchProgress, LogProgress, NoopProgress};
pub use model::{ModelError, OnnxSpeechModel, SpeechModel, SAMPLE_RATE};
pub use packer::{Chunk, ChunkStream, PackError, TokenPacker, MAX_TOKENS};
pub use phonemizer::{EspeakPhonemizer, PhonemeError, Phonemizer};
pub use pipeline::{LangCode, Pipeline, PipelineConfig, PipelineError, SpeechStream};
pub use runner::{AudioOutput, ChunkRunner, SpeechChunk, SynthesisError};
pub use token::{AnnotatedToken, Token};
pub use vocab::{Vocab, VocabError};
pub use voices::{VoiceCache, VoiceEmbeddings, VoiceError, STYLE_DIM, STYLE_ROWS};
