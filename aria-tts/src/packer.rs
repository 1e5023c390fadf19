// Aria TTS - Token packer
// Packs phonemized tokens into model-sized chunks. The model accepts at most
// 510 phoneme token ids per call, so long inputs are split, preferring
// sentence ends, then clause breaks, then commas, scanning the pending
// buffer backwards for the rightmost usable boundary.

use std::sync::Arc;

use crate::token::{flatten, FlatToken, Token};
use crate::vocab::Vocab;

/// Hard per-call capacity of the speech model, in phoneme token ids.
pub const MAX_TOKENS: usize = 510;

/// Punctuation tiers tried in priority order when a break is needed.
const WATERFALL: [&str; 3] = ["!.?…", ":;", ",—"];

/// Closing marks that must stay attached to the chunk before them.
const BUMPS: [char; 2] = [')', '"'];

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// A chunk's phoneme content exceeds the model capacity and has no
    /// internal boundary left to split at. The chunk is skipped and the
    /// stream continues.
    #[error("unsplittable phoneme chunk of {len} chars exceeds the model capacity")]
    OversizedChunk { len: usize },
}

/// A packed chunk ready for one model call.
///
/// Invariant: `1 <= input_ids.len() <= MAX_TOKENS`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// The original display text covered by this chunk.
    pub graphemes: String,
    /// The phoneme string, stripped of surrounding whitespace.
    pub phonemes: String,
    /// Vocabulary ids of the phoneme characters.
    pub input_ids: Vec<i64>,
}

/// Pending accumulation unit: one token's display text and phoneme fragment,
/// tagged with the group it came from.
#[derive(Debug, Clone)]
struct Pair {
    text: String,
    phonemes: String,
    group: Option<usize>,
}

/// Packs annotated tokens into chunks that fit the model capacity.
pub struct TokenPacker {
    vocab: Arc<Vocab>,
    /// Apply the American-English flap normalization `ɾ` -> `T`.
    flap_to_t: bool,
}

impl TokenPacker {
    pub fn new(vocab: Arc<Vocab>, flap_to_t: bool) -> Self {
        Self { vocab, flap_to_t }
    }

    pub fn vocab(&self) -> &Arc<Vocab> {
        &self.vocab
    }

    /// Pack one text unit's tokens into a lazy sequence of chunks.
    ///
    /// Chunks come out in input order. Tokens without phonemes and chunks
    /// whose phonemes map to no vocabulary ids are skipped silently; a chunk
    /// that cannot be reduced below the capacity yields
    /// `PackError::OversizedChunk` and the sequence continues.
    pub fn pack(&self, tokens: Vec<Token>) -> ChunkStream<'_> {
        ChunkStream {
            packer: self,
            tokens: flatten(tokens).into_iter(),
            pairs: Vec::new(),
            count: 0,
            done: false,
        }
    }

    fn preprocess(&self, graphemes: String, phonemes: String) -> Option<Result<Chunk, PackError>> {
        if phonemes.is_empty() {
            return None;
        }
        let len = phonemes.chars().count();
        if len > MAX_TOKENS {
            let preview: String = phonemes.chars().take(40).collect();
            log::warn!("Skipping unsplittable {len}-char phoneme chunk: '{preview}…'");
            return Some(Err(PackError::OversizedChunk { len }));
        }

        let input_ids: Vec<i64> = phonemes.chars().filter_map(|c| self.vocab.get(c)).collect();
        if input_ids.is_empty() {
            return None;
        }
        debug_assert!(input_ids.len() <= MAX_TOKENS);

        Some(Ok(Chunk {
            graphemes,
            phonemes,
            input_ids,
        }))
    }
}

/// Lazy, non-restartable chunk sequence produced by [`TokenPacker::pack`].
pub struct ChunkStream<'a> {
    packer: &'a TokenPacker,
    tokens: std::vec::IntoIter<FlatToken>,
    pairs: Vec<Pair>,
    count: usize,
    done: bool,
}

impl ChunkStream<'_> {
    /// Consume one token, returning a raw `(graphemes, phonemes)` chunk if
    /// appending the token forced a split.
    fn feed(&mut self, flat: FlatToken) -> Option<(String, String)> {
        let FlatToken { token: t, group } = flat;
        let phonemes = t.phonemes?;

        let mut next_ps = String::new();
        if t.prespace
            && !phonemes.is_empty()
            && self.pairs.last().is_some_and(|p| !p.phonemes.ends_with(' '))
        {
            next_ps.push(' ');
        }
        for ch in phonemes.chars() {
            let ch = if self.packer.flap_to_t && ch == 'ɾ' { 'T' } else { ch };
            if self.packer.vocab.contains(ch) {
                next_ps.push(ch);
            }
        }
        if !t.whitespace.is_empty() {
            next_ps.push(' ');
        }

        let next_count = self.count + next_ps.trim_end().chars().count();
        let mut emitted = None;
        if next_count > MAX_TOKENS && !self.pairs.is_empty() {
            let z = self.waterfall_last(next_count);
            if z == self.pairs.len() {
                if let (Some(last), Some(g)) = (self.pairs.last().and_then(|p| p.group), group) {
                    if last == g {
                        log::warn!("Forced a chunk boundary inside a compound token group");
                    }
                }
            }

            let taken: Vec<Pair> = self.pairs.drain(..z).collect();
            let graphemes: String = taken.iter().map(|p| p.text.as_str()).collect();
            let ps: String = taken.iter().map(|p| p.phonemes.as_str()).collect();
            self.count -= ps.chars().count();
            emitted = Some((graphemes.trim().to_string(), ps.trim().to_string()));

            if self.pairs.is_empty() {
                next_ps = next_ps.trim_start().to_string();
            }
        }

        self.count += next_ps.chars().count();
        self.pairs.push(Pair {
            text: format!("{}{}", t.text, t.whitespace),
            phonemes: next_ps,
            group,
        });
        emitted
    }

    /// Find the split index for the pending buffer: the rightmost pending
    /// pair whose phonemes are exactly one character of the highest-priority
    /// tier that still relieves the overflow. Falls back to the whole buffer.
    fn waterfall_last(&self, next_count: usize) -> usize {
        for tier in WATERFALL {
            let hit = self
                .pairs
                .iter()
                .enumerate()
                .rev()
                .find(|(_, p)| is_single_char_of(p.phonemes.trim(), tier));
            let Some((i, _)) = hit else { continue };

            let mut z = i + 1;
            if z < self.pairs.len() {
                let s = self.pairs[z].phonemes.trim();
                if s.chars().count() == 1 && BUMPS.contains(&s.chars().next().unwrap_or('\0')) {
                    z += 1;
                }
            }

            // A split point must not land inside a compound token group.
            let inside_group = z < self.pairs.len()
                && self.pairs[z - 1].group.is_some()
                && self.pairs[z - 1].group == self.pairs[z].group;

            let taken: usize = self.pairs[..z]
                .iter()
                .map(|p| p.phonemes.chars().count())
                .sum();
            if !inside_group && next_count - taken <= MAX_TOKENS {
                return z;
            }
        }
        self.pairs.len()
    }

    fn flush(&mut self) -> Option<(String, String)> {
        if self.pairs.is_empty() {
            return None;
        }
        let graphemes: String = self.pairs.iter().map(|p| p.text.as_str()).collect();
        let ps: String = self.pairs.iter().map(|p| p.phonemes.as_str()).collect();
        self.pairs.clear();
        self.count = 0;
        Some((graphemes.trim().to_string(), ps.trim().to_string()))
    }

    fn advance(&mut self) -> Option<(String, String)> {
        match self.tokens.next() {
            Some(flat) => self.feed(flat),
            None => {
                self.done = true;
                self.flush()
            }
        }
    }
}

impl Iterator for ChunkStream<'_> {
    type Item = Result<Chunk, PackError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            if let Some((graphemes, phonemes)) = self.advance() {
                if let Some(item) = self.packer.preprocess(graphemes, phonemes) {
                    return Some(item);
                }
            }
        }
        None
    }
}

fn is_single_char_of(s: &str, set: &str) -> bool {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => set.contains(ch),
        _ => false,
    }
}
