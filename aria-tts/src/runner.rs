// Aria TTS - Chunk runner
// Drives packed chunks through the speech model: exactly one call per
// chunk, synchronous, order preserving. A failed chunk is reported and the
// stream continues.

use std::sync::Arc;

use crate::model::{ModelError, SpeechModel};
use crate::packer::{Chunk, PackError};
use crate::phonemizer::PhonemeError;
use crate::voices::VoiceEmbeddings;

/// Audio produced for one chunk.
#[derive(Debug, Clone)]
pub struct AudioOutput {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// One synthesized chunk: the text it covers, its phonemes, and its audio.
#[derive(Debug, Clone)]
pub struct SpeechChunk {
    pub graphemes: String,
    pub phonemes: String,
    pub audio: AudioOutput,
}

/// Per-chunk failure. The surrounding stream keeps going.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Pack(#[from] PackError),
    #[error("phonemization failed: {0}")]
    Phoneme(#[from] PhonemeError),
    #[error("model inference failed: {0}")]
    Model(#[from] ModelError),
}

/// Runs chunks through the model with a fixed voice and speed.
pub struct ChunkRunner<M> {
    model: M,
    voices: Arc<VoiceEmbeddings>,
    speed: f32,
}

impl<M: SpeechModel> ChunkRunner<M> {
    pub fn new(model: M, voices: Arc<VoiceEmbeddings>, speed: f32) -> Self {
        Self {
            model,
            voices,
            speed,
        }
    }

    /// One model call for one packed chunk. The style row is selected by
    /// the chunk's id count.
    pub fn synthesize(&mut self, chunk: Chunk) -> Result<SpeechChunk, SynthesisError> {
        let style = self.voices.style_for(chunk.input_ids.len());
        let samples = self.model.infer(&chunk.input_ids, &style, self.speed)?;

        log::debug!(
            "Synthesized chunk: {} ids -> {} samples",
            chunk.input_ids.len(),
            samples.len()
        );

        Ok(SpeechChunk {
            graphemes: chunk.graphemes,
            phonemes: chunk.phonemes,
            audio: AudioOutput {
                samples,
                sample_rate: self.model.sample_rate(),
            },
        })
    }

    /// Drive a chunk sequence through the model lazily, preserving order.
    /// Packing errors pass through as per-chunk synthesis errors.
    pub fn run<I>(mut self, chunks: I) -> impl Iterator<Item = Result<SpeechChunk, SynthesisError>>
    where
        I: IntoIterator<Item = Result<Chunk, PackError>>,
    {
        chunks.into_iter().map(move |item| match item {
            Ok(chunk) => self.synthesize(chunk),
            Err(e) => Err(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Deterministic stand-in model: emits one sample per input id, valued
    /// by the first style component, and counts calls.
    struct CountingModel {
        calls: Rc<Cell<usize>>,
    }

    impl SpeechModel for CountingModel {
        fn infer(
            &mut self,
            input_ids: &[i64],
            style: &[f32],
            _speed: f32,
        ) -> Result<Vec<f32>, ModelError> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![style[0]; input_ids.len()])
        }
    }

    fn bucket_voice() -> Arc<VoiceEmbeddings> {
        // Row r holds the constant r, so outputs reveal the selected bucket.
        let mut styles = Array2::zeros((510, crate::voices::STYLE_DIM));
        for (r, mut row) in styles.rows_mut().into_iter().enumerate() {
            row.fill(r as f32);
        }
        Arc::new(VoiceEmbeddings::from_array(styles))
    }

    fn chunk(ps: &str) -> Chunk {
        Chunk {
            graphemes: ps.to_uppercase(),
            phonemes: ps.to_string(),
            input_ids: ps.chars().map(|c| c as i64).collect(),
        }
    }

    #[test]
    fn one_call_per_chunk_in_order() {
        let calls = Rc::new(Cell::new(0));
        let runner = ChunkRunner::new(
            CountingModel {
                calls: calls.clone(),
            },
            bucket_voice(),
            1.0,
        );

        let chunks = vec![Ok(chunk("abc")), Ok(chunk("defgh"))];
        let out: Vec<_> = runner.run(chunks).collect::<Result<_, _>>().unwrap();

        assert_eq!(calls.get(), 2);
        assert_eq!(out[0].graphemes, "ABC");
        assert_eq!(out[1].graphemes, "DEFGH");
        // Style bucket is id count minus one.
        assert_eq!(out[0].audio.samples, vec![2.0; 3]);
        assert_eq!(out[1].audio.samples, vec![4.0; 5]);
    }

    #[test]
    fn run_is_lazy() {
        let calls = Rc::new(Cell::new(0));
        let runner = ChunkRunner::new(
            CountingModel {
                calls: calls.clone(),
            },
            bucket_voice(),
            1.0,
        );

        let chunks = vec![Ok(chunk("a")), Ok(chunk("b")), Ok(chunk("c"))];
        let mut stream = runner.run(chunks);

        assert_eq!(calls.get(), 0);
        let _ = stream.next();
        assert_eq!(calls.get(), 1);
        drop(stream);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn pack_errors_pass_through_without_model_calls() {
        let calls = Rc::new(Cell::new(0));
        let runner = ChunkRunner::new(
            CountingModel {
                calls: calls.clone(),
            },
            bucket_voice(),
            1.0,
        );

        let chunks = vec![
            Err(PackError::OversizedChunk { len: 600 }),
            Ok(chunk("ok")),
        ];
        let out: Vec<_> = runner.run(chunks).collect();

        assert_eq!(calls.get(), 1);
        assert!(matches!(
            out[0],
            Err(SynthesisError::Pack(PackError::OversizedChunk { len: 600 }))
        ));
        assert!(out[1].is_ok());
    }
}
