// Aria TTS - Speech model inference
// One ONNX call per packed chunk: token ids + a style vector + a speed
// scalar in, a 24kHz waveform out.

use std::path::Path;

use ort::session::{builder::GraphOptimizationLevel, Session, SessionInputValue, SessionInputs};
use ort::value::{Tensor, Value};

/// Output sample rate of the speech model.
pub const SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not found: {0}")]
    NotFound(String),
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("Inference failed: {0}")]
    Inference(String),
}

/// The neural model boundary: a pure synchronous function from a bounded
/// id sequence, a style vector, and a speed multiplier to audio samples.
pub trait SpeechModel {
    fn infer(&mut self, input_ids: &[i64], style: &[f32], speed: f32) -> Result<Vec<f32>, ModelError>;

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

impl<M: SpeechModel + ?Sized> SpeechModel for &mut M {
    fn infer(&mut self, input_ids: &[i64], style: &[f32], speed: f32) -> Result<Vec<f32>, ModelError> {
        (**self).infer(input_ids, style, speed)
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }
}

/// ONNX Runtime implementation of the speech model.
#[derive(Debug)]
pub struct OnnxSpeechModel {
    session: Session,
    /// Token input name: "input_ids" (onnx-community exports) or "tokens"
    /// (older f32 exports).
    tokens_input_name: String,
}

impl OnnxSpeechModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ModelError::NotFound(path.display().to_string()));
        }

        let model_bytes = std::fs::read(path).map_err(|e| ModelError::Load(e.to_string()))?;

        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        let session = Session::builder()
            .map_err(|e| ModelError::Load(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ModelError::Load(e.to_string()))?
            .with_intra_threads(num_threads)
            .map_err(|e| ModelError::Load(e.to_string()))?
            .commit_from_memory(&model_bytes)
            .map_err(|e| ModelError::Load(e.to_string()))?;

        let tokens_input_name = session
            .inputs()
            .iter()
            .find(|i| i.name() == "input_ids" || i.name() == "tokens")
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "input_ids".to_string());

        log::info!(
            "Loaded speech model from {} ({num_threads} threads, token input '{tokens_input_name}')",
            path.display()
        );

        Ok(Self {
            session,
            tokens_input_name,
        })
    }
}

impl SpeechModel for OnnxSpeechModel {
    fn infer(&mut self, input_ids: &[i64], style: &[f32], speed: f32) -> Result<Vec<f32>, ModelError> {
        use std::borrow::Cow;

        // The model expects pad ids (0) around the sequence.
        let mut tokens = Vec::with_capacity(input_ids.len() + 2);
        tokens.push(0);
        tokens.extend_from_slice(input_ids);
        tokens.push(0);

        let tokens_shape = [1_usize, tokens.len()];
        let tokens_tensor = Tensor::from_array((tokens_shape, tokens))
            .map_err(|e| ModelError::Inference(format!("tokens tensor: {e}")))?;

        let style_shape = [1_usize, style.len()];
        let style_tensor = Tensor::from_array((style_shape, style.to_vec()))
            .map_err(|e| ModelError::Inference(format!("style tensor: {e}")))?;

        let speed_tensor = Tensor::from_array(([1_usize], vec![speed]))
            .map_err(|e| ModelError::Inference(format!("speed tensor: {e}")))?;

        let token_name = self.tokens_input_name.clone();
        let inputs = SessionInputs::from(vec![
            (
                Cow::Owned(token_name),
                SessionInputValue::Owned(Value::from(tokens_tensor)),
            ),
            (
                Cow::Borrowed("style"),
                SessionInputValue::Owned(Value::from(style_tensor)),
            ),
            (
                Cow::Borrowed("speed"),
                SessionInputValue::Owned(Value::from(speed_tensor)),
            ),
        ]);

        // Contain ort panics so a bad chunk cannot kill the caller's thread.
        let session_ptr = &mut self.session as *mut Session;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let session = unsafe { &mut *session_ptr };
            session.run(inputs)
        }));

        let outputs = match result {
            Ok(Ok(outputs)) => outputs,
            Ok(Err(e)) => return Err(ModelError::Inference(e.to_string())),
            Err(_) => return Err(ModelError::Inference("inference panicked".to_string())),
        };

        // Output names differ across exports; take the first output.
        let first_output = outputs
            .iter()
            .next()
            .ok_or_else(|| ModelError::Inference("no outputs produced".to_string()))?;
        let (_shape, data) = first_output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Inference(format!("audio tensor: {e}")))?;

        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_file_is_typed() {
        let err = OnnxSpeechModel::load("/no/such/model.onnx").unwrap_err();
        assert!(matches!(err, ModelError::NotFound(_)));
    }

    #[test]
    #[ignore]
    fn onnx_inference_produces_audio() {
        let paths = crate::assets::resolve_paths().expect("assets present");
        let mut model = OnnxSpeechModel::load(&paths.model).expect("model loads");
        let ids = vec![50i64; 10];
        let style = vec![0.0f32; 256];
        let audio = model.infer(&ids, &style, 1.0).expect("inference runs");
        assert!(!audio.is_empty());
    }
}
