//! End-to-end speech pipeline: unit splitting, phonemization, token
//! packing, and chunk-by-chunk synthesis, yielded as an ordered lazy
//! stream. Nothing runs until the caller pulls the next chunk.

use std::sync::Arc;

use regex::Regex;

use crate::assets::{AssetError, AssetPaths};
use crate::model::{ModelError, OnnxSpeechModel, SpeechModel};
use crate::packer::{ChunkStream, TokenPacker};
use crate::phonemizer::{EspeakPhonemizer, Phonemizer};
use crate::runner::{ChunkRunner, SpeechChunk, SynthesisError};
use crate::vocab::{Vocab, VocabError};
use crate::voices::{VoiceCache, VoiceError};

/// Supported pipeline languages, keyed by the single-letter voice prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LangCode {
    AmericanEnglish,
    BritishEnglish,
    Spanish,
    French,
    Hindi,
    Italian,
    BrazilianPortuguese,
}

impl LangCode {
    /// Single-letter code used as the voice name prefix.
    pub fn code(self) -> char {
        match self {
            Self::AmericanEnglish => 'a',
            Self::BritishEnglish => 'b',
            Self::Spanish => 'e',
            Self::French => 'f',
            Self::Hindi => 'h',
            Self::Italian => 'i',
            Self::BrazilianPortuguese => 'p',
        }
    }

    pub fn from_code(c: char) -> Option<Self> {
        match c {
            'a' => Some(Self::AmericanEnglish),
            'b' => Some(Self::BritishEnglish),
            'e' => Some(Self::Spanish),
            'f' => Some(Self::French),
            'h' => Some(Self::Hindi),
            'i' => Some(Self::Italian),
            'p' => Some(Self::BrazilianPortuguese),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::AmericanEnglish => "American English",
            Self::BritishEnglish => "British English",
            Self::Spanish => "Spanish",
            Self::French => "French",
            Self::Hindi => "Hindi",
            Self::Italian => "Italian",
            Self::BrazilianPortuguese => "Brazilian Portuguese",
        }
    }

    /// espeak-ng voice identifier for this language.
    pub fn espeak_voice(self) -> &'static str {
        match self {
            Self::AmericanEnglish => "en-us",
            Self::BritishEnglish => "en-gb",
            Self::Spanish => "es",
            Self::French => "fr-fr",
            Self::Hindi => "hi",
            Self::Italian => "it",
            Self::BrazilianPortuguese => "pt-br",
        }
    }

    /// The flap normalization `ɾ` -> `T` only applies to American English.
    fn flap_to_t(self) -> bool {
        matches!(self, Self::AmericanEnglish)
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub lang: LangCode,
    /// Default speech speed multiplier.
    pub speed: f32,
    /// Regex splitting raw input into independently processed units.
    /// `None` treats the whole input as one unit.
    pub split_pattern: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lang: LangCode::AmericanEnglish,
            speed: 1.0,
            split_pattern: Some(r"\n+".to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Vocab(#[from] VocabError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Voice(#[from] VoiceError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// The full text-to-speech pipeline.
///
/// Vocabulary and voice tables are immutable and shared; the model is the
/// only mutable collaborator, exclusively borrowed by the stream while a
/// synthesis call is live.
pub struct Pipeline<P, M> {
    config: PipelineConfig,
    packer: TokenPacker,
    phonemizer: P,
    model: M,
    voices: VoiceCache,
    split: Option<Regex>,
}

impl Pipeline<EspeakPhonemizer, OnnxSpeechModel> {
    /// Build the production pipeline from resolved on-disk assets.
    pub fn from_assets(config: PipelineConfig, paths: &AssetPaths) -> Result<Self, PipelineError> {
        let vocab = Arc::new(Vocab::from_config_file(&paths.config)?);
        let model = OnnxSpeechModel::load(&paths.model)?;
        let phonemizer = EspeakPhonemizer::new(config.lang.espeak_voice());
        let voices = VoiceCache::new(paths.voices_dir.clone());
        Self::new(config, vocab, phonemizer, model, voices)
    }
}

impl<P: Phonemizer, M: SpeechModel> Pipeline<P, M> {
    pub fn new(
        config: PipelineConfig,
        vocab: Arc<Vocab>,
        phonemizer: P,
        model: M,
        voices: VoiceCache,
    ) -> Result<Self, PipelineError> {
        if !(config.speed > 0.0) {
            return Err(PipelineError::Config(format!(
                "speed must be positive, got {}",
                config.speed
            )));
        }
        let split = match &config.split_pattern {
            Some(pattern) => Some(
                Regex::new(pattern)
                    .map_err(|e| PipelineError::Config(format!("bad split pattern: {e}")))?,
            ),
            None => None,
        };
        let packer = TokenPacker::new(vocab, config.lang.flap_to_t());

        Ok(Self {
            config,
            packer,
            phonemizer,
            model,
            voices,
            split,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn voices(&self) -> &VoiceCache {
        &self.voices
    }

    /// Synthesize `text` with the configured speed.
    pub fn synthesize(
        &mut self,
        text: &str,
        voice: &str,
    ) -> Result<SpeechStream<'_, P, M>, PipelineError> {
        let speed = self.config.speed;
        self.synthesize_with_speed(text, voice, speed)
    }

    /// Synthesize `text` as an ordered lazy stream of per-chunk results.
    ///
    /// The voice table is resolved up front (fatal if missing); per-chunk
    /// failures are yielded in-stream and do not stop later chunks.
    pub fn synthesize_with_speed(
        &mut self,
        text: &str,
        voice: &str,
        speed: f32,
    ) -> Result<SpeechStream<'_, P, M>, PipelineError> {
        let embeddings = self.voices.acquire(voice)?;

        if !voice_matches_lang(voice, self.config.lang) {
            log::warn!(
                "Loading voice '{voice}' into a {} pipeline; phonemes may be mismatched",
                self.config.lang.name()
            );
        }

        let units = split_units(text, self.split.as_ref());
        log::debug!("Synthesizing {} unit(s) with voice {voice}", units.len());

        Ok(SpeechStream {
            phonemizer: &self.phonemizer,
            packer: &self.packer,
            runner: ChunkRunner::new(&mut self.model, embeddings, speed),
            units: units.into_iter(),
            current: None,
        })
    }
}

/// A voice is expected to start with its language's single-letter code.
fn voice_matches_lang(voice: &str, lang: LangCode) -> bool {
    voice
        .split('/')
        .next_back()
        .unwrap_or(voice)
        .starts_with(lang.code())
}

/// Split raw input into processing units, dropping blank ones.
fn split_units(text: &str, pattern: Option<&Regex>) -> Vec<String> {
    match pattern {
        Some(re) => re
            .split(text)
            .filter(|unit| !unit.trim().is_empty())
            .map(str::to_string)
            .collect(),
        None => {
            if text.trim().is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            }
        }
    }
}

/// Ordered lazy stream of synthesized chunks for one `synthesize` call.
///
/// Dropping the stream cancels remaining work at the next chunk boundary.
pub struct SpeechStream<'a, P: Phonemizer, M: SpeechModel> {
    phonemizer: &'a P,
    packer: &'a TokenPacker,
    runner: ChunkRunner<&'a mut M>,
    units: std::vec::IntoIter<String>,
    current: Option<ChunkStream<'a>>,
}

impl<P: Phonemizer, M: SpeechModel> Iterator for SpeechStream<'_, P, M> {
    type Item = Result<SpeechChunk, SynthesisError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunks) = &mut self.current {
                match chunks.next() {
                    Some(Ok(chunk)) => return Some(self.runner.synthesize(chunk)),
                    Some(Err(e)) => return Some(Err(e.into())),
                    None => self.current = None,
                }
            }

            let unit = self.units.next()?;
            match self.phonemizer.phonemize(&unit) {
                Ok((_, tokens)) => self.current = Some(self.packer.pack(tokens)),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_american_english() {
        let config = PipelineConfig::default();
        assert_eq!(config.lang, LangCode::AmericanEnglish);
        assert_eq!(config.speed, 1.0);
        assert_eq!(config.split_pattern.as_deref(), Some(r"\n+"));
    }

    #[test]
    fn lang_codes_roundtrip() {
        for lang in [
            LangCode::AmericanEnglish,
            LangCode::BritishEnglish,
            LangCode::Spanish,
            LangCode::French,
            LangCode::Hindi,
            LangCode::Italian,
            LangCode::BrazilianPortuguese,
        ] {
            assert_eq!(LangCode::from_code(lang.code()), Some(lang));
        }
        assert_eq!(LangCode::from_code('z'), None);
    }

    #[test]
    fn voice_prefix_check() {
        assert!(voice_matches_lang("af_heart", LangCode::AmericanEnglish));
        assert!(voice_matches_lang("bm_george", LangCode::BritishEnglish));
        assert!(!voice_matches_lang("if_sara", LangCode::AmericanEnglish));
        assert!(voice_matches_lang("voices/af_heart", LangCode::AmericanEnglish));
    }

    #[test]
    fn split_units_drops_blanks() {
        let re = Regex::new(r"\n+").unwrap();
        let units = split_units("one\n\ntwo\n   \nthree", Some(&re));
        assert_eq!(units, vec!["one", "two", "three"]);

        assert_eq!(split_units("all in one", None), vec!["all in one"]);
        assert!(split_units("   ", None).is_empty());
    }
}
