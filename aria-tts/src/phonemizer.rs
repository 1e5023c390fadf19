// Aria TTS - Phonemizer boundary
// The packer consumes annotated tokens; where they come from is behind one
// trait. The production implementation shells out to espeak-ng, the same
// way the reference multilingual pipeline does.

use std::process::Command;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::token::{AnnotatedToken, Token};

#[derive(Debug, thiserror::Error)]
pub enum PhonemeError {
    #[error("espeak-ng failed: {0}")]
    Espeak(String),
    #[error("phonemizer backend failed: {0}")]
    Backend(String),
}

/// Converts one text unit into its normalized form plus annotated tokens.
pub trait Phonemizer {
    fn phonemize(&self, text: &str) -> Result<(String, Vec<Token>), PhonemeError>;
}

/// Plain functions and closures are phonemizers.
impl<F> Phonemizer for F
where
    F: Fn(&str) -> Result<(String, Vec<Token>), PhonemeError>,
{
    fn phonemize(&self, text: &str) -> Result<(String, Vec<Token>), PhonemeError> {
        self(text)
    }
}

/// Punctuation that becomes its own token so the packer can break after it.
const PUNCT: &str = ";:,.!?¡¿—…\"«»“”()";

/// IPA phonemization via the espeak-ng command-line tool.
///
/// espeak-ng emits one IPA word per spoken word and drops punctuation, so
/// the output is re-aligned against the input's words. Punctuation becomes
/// separate tokens whose phonemes are the punctuation characters themselves.
pub struct EspeakPhonemizer {
    /// espeak-ng voice identifier, e.g. "en-us" or "pt-br".
    voice: &'static str,
}

impl EspeakPhonemizer {
    pub fn new(voice: &'static str) -> Self {
        Self { voice }
    }

    fn run_espeak(&self, text: &str) -> Result<String, PhonemeError> {
        let output = Command::new("espeak-ng")
            .args(["--ipa", "-q", "-v", self.voice, text])
            .output()
            .map_err(|e| {
                PhonemeError::Espeak(format!("{e}. Install: sudo apt install espeak-ng"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PhonemeError::Espeak(format!(
                "voice={}: {}",
                self.voice,
                stderr.trim()
            )));
        }

        // espeak-ng separates clauses with newlines; join them.
        let raw = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(raw.replace('\n', " "))
    }
}

impl Phonemizer for EspeakPhonemizer {
    fn phonemize(&self, text: &str) -> Result<(String, Vec<Token>), PhonemeError> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Ok((normalized, Vec::new()));
        }

        let words = split_words(&normalized);
        let spoken: Vec<&str> = words
            .iter()
            .filter(|w| !w.core.is_empty())
            .map(|w| w.core)
            .collect();

        let ipa = self.run_espeak(&normalized)?;
        let ipa_words: Vec<&str> = ipa.split_whitespace().collect();

        if ipa_words.len() != spoken.len() {
            // Alignment failed (numbers, abbreviations, ...). Fall back to a
            // single whole-unit token; the packer can still budget it.
            log::debug!(
                "espeak word alignment failed ({} spoken vs {} ipa), using whole-unit token",
                spoken.len(),
                ipa_words.len()
            );
            let token = AnnotatedToken::new(&normalized, Some(&ipa_words.join(" ")), "");
            return Ok((normalized.clone(), vec![Token::Single(token)]));
        }

        let mut tokens = Vec::with_capacity(words.len());
        let mut next_ipa = ipa_words.into_iter();
        for word in words {
            let mut parts = Vec::new();
            for p in word.leading.chars() {
                parts.push(AnnotatedToken::new(p.to_string(), Some(&p.to_string()), ""));
            }
            if !word.core.is_empty() {
                let ipa_word = next_ipa.next().unwrap_or_default();
                parts.push(AnnotatedToken::new(word.core, Some(ipa_word), ""));
            }
            for p in word.trailing.chars() {
                parts.push(AnnotatedToken::new(p.to_string(), Some(&p.to_string()), ""));
            }
            if let Some(last) = parts.last_mut() {
                last.whitespace = word.whitespace.to_string();
            }

            match parts.len() {
                0 => {}
                1 => tokens.push(Token::Single(parts.remove(0))),
                _ => tokens.push(Token::Group(parts)),
            }
        }

        Ok((normalized, tokens))
    }
}

/// One whitespace-delimited word, split into punctuation and the spoken core.
struct SplitWord<'a> {
    leading: &'a str,
    core: &'a str,
    trailing: &'a str,
    whitespace: &'a str,
}

fn split_words(text: &str) -> Vec<SplitWord<'_>> {
    // Word run followed by its trailing whitespace.
    let re = Regex::new(r"(\S+)(\s*)").unwrap();
    re.captures_iter(text)
        .map(|cap| {
            let word = cap.get(1).map_or("", |m| m.as_str());
            let whitespace = cap.get(2).map_or("", |m| m.as_str());
            let (leading, rest) = split_leading_punct(word);
            let (core, trailing) = split_trailing_punct(rest);
            SplitWord {
                leading,
                core,
                trailing,
                whitespace,
            }
        })
        .collect()
}

fn split_leading_punct(word: &str) -> (&str, &str) {
    let end = word
        .char_indices()
        .find(|(_, c)| !PUNCT.contains(*c))
        .map_or(word.len(), |(i, _)| i);
    word.split_at(end)
}

fn split_trailing_punct(word: &str) -> (&str, &str) {
    let start = word
        .char_indices()
        .rev()
        .take_while(|(_, c)| PUNCT.contains(*c))
        .last()
        .map_or(word.len(), |(i, _)| i);
    word.split_at(start)
}

/// Light text normalization before phonemization. Quotes and ellipses are
/// folded onto the forms present in the model vocabulary; dashes are left
/// alone because the em-dash is a split boundary.
pub fn normalize_text(text: &str) -> String {
    let text: String = text.nfc().collect();
    text.replace('\u{2018}', "'")
        .replace('\u{2019}', "'")
        .replace('\u{201C}', "\"")
        .replace('\u{201D}', "\"")
        .replace("...", "…")
        .replace('\u{00A0}', " ")
        .replace('\t', " ")
        .trim()
        .to_string()
}
