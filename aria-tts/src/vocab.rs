// Aria TTS - Phoneme vocabulary
// Maps single phoneme characters to the model's token ids. Loaded from the
// model's config.json, or built from the known Kokoro symbol table.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum VocabError {
    #[error("Failed to read vocabulary: {0}")]
    Io(String),
    #[error("Malformed vocabulary: {0}")]
    Malformed(String),
    #[error("Vocabulary is empty")]
    Empty,
}

/// Immutable mapping from phoneme character to token id.
#[derive(Debug, Clone)]
pub struct Vocab {
    map: HashMap<char, i64>,
}

/// The slice of the model config we care about.
#[derive(Debug, Deserialize)]
struct ModelConfig {
    vocab: HashMap<String, i64>,
}

impl Vocab {
    /// Load the vocabulary from a model `config.json` containing a
    /// `{"vocab": {"<char>": <id>, ...}}` mapping.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self, VocabError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| VocabError::Io(e.to_string()))?;
        let config: ModelConfig = serde_json::from_str(&content)
            .map_err(|e| VocabError::Malformed(format!("failed to parse config.json: {e}")))?;

        let mut map = HashMap::with_capacity(config.vocab.len());
        for (key, id) in config.vocab {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => {
                    map.insert(ch, id);
                }
                _ => {
                    return Err(VocabError::Malformed(format!(
                        "vocabulary key {key:?} is not a single character"
                    )))
                }
            }
        }

        log::info!("Loaded vocabulary with {} symbols", map.len());
        Self::from_map(map)
    }

    pub fn from_map(map: HashMap<char, i64>) -> Result<Self, VocabError> {
        if map.is_empty() {
            return Err(VocabError::Empty);
        }
        Ok(Self { map })
    }

    /// Build the Kokoro symbol table: pad, punctuation, Latin letters, IPA.
    pub fn builtin() -> Self {
        let pad = "$";
        let punctuation = r#";:,.!?¡¿—…"«»“” "#;
        let letters = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
        let letters_ipa = "ɑɐɒæɓʙβɔɕçɗɖðʤəɘɚɛɜɝɞɟʄɡɠɢʛɦɧħɥʜɨɪʝɭɬɫɮʟɱɯɰŋɳɲɴøɵɸθœɶʘɹɺɾɻʀʁɽʂʃʈʧʉʊʋⱱʌɣɤʍχʎʏʑʐʒʔʡʕʢǀǁǂǃˈˌːˑʼʴʰʱʲʷˠˤ˞↓↑→↗↘'̩'ᵻ";

        let symbols: String = [pad, punctuation, letters, letters_ipa].concat();
        let map = symbols
            .chars()
            .enumerate()
            .map(|(idx, c)| (c, idx as i64))
            .collect();

        Self { map }
    }

    pub fn contains(&self, ch: char) -> bool {
        self.map.contains_key(&ch)
    }

    pub fn get(&self, ch: char) -> Option<i64> {
        self.map.get(&ch).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
