// End-to-end packing scenarios against the public API.

use std::collections::HashMap;
use std::sync::Arc;

use aria_tts::{AnnotatedToken, Chunk, Token, TokenPacker, Vocab, MAX_TOKENS};

fn scenario_vocab() -> Arc<Vocab> {
    let symbols = "abcdefghijklmnopqrstuvwxyz !.?,";
    let map: HashMap<char, i64> = symbols
        .chars()
        .enumerate()
        .map(|(i, c)| (c, i as i64))
        .collect();
    Arc::new(Vocab::from_map(map).unwrap())
}

/// Toy word-level phonemization: each word becomes its lowercase form, with
/// trailing sentence punctuation split into its own token.
fn word_tokens(text: &str) -> Vec<Token> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let last = words.len().saturating_sub(1);

    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let ws = if i < last { " " } else { "" };
            match word.strip_suffix(['!', '.', '?', ',']) {
                Some(core) => {
                    let punct = &word[core.len()..];
                    Token::Group(vec![
                        AnnotatedToken::new(core, Some(&core.to_lowercase()), ""),
                        AnnotatedToken::new(punct, Some(punct), ws),
                    ])
                }
                None => Token::Single(AnnotatedToken::new(*word, Some(&word.to_lowercase()), ws)),
            }
        })
        .collect()
}

#[test]
fn hello_world_is_one_chunk() {
    let packer = TokenPacker::new(scenario_vocab(), false);
    let chunks: Vec<Chunk> = packer
        .pack(word_tokens("Hello world"))
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].graphemes, "Hello world");
    assert_eq!(chunks[0].phonemes, "hello world");
    // One id per mapped character: ten letters plus the separating space.
    assert_eq!(chunks[0].input_ids.len(), 11);
}

#[test]
fn repeated_sentences_split_within_budget() {
    let packer = TokenPacker::new(scenario_vocab(), false);
    let text = "Hello world! ".repeat(100);
    let chunks: Vec<Chunk> = packer
        .pack(word_tokens(&text))
        .collect::<Result<_, _>>()
        .unwrap();

    assert!(chunks.len() > 1);

    let vocab = scenario_vocab();
    for chunk in &chunks {
        assert!(!chunk.input_ids.is_empty());
        assert!(chunk.input_ids.len() <= MAX_TOKENS);
        assert!(chunk
            .input_ids
            .iter()
            .all(|&id| id >= 0 && (id as usize) < vocab.len()));
        // Natural boundaries: every chunk ends at a sentence end.
        assert!(chunk.phonemes.ends_with('!'));
    }

    // Order preservation: the emitted graphemes partition the input.
    let rejoined = chunks
        .iter()
        .map(|c| c.graphemes.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    assert_eq!(rejoined, text.trim());

    // Content preservation: phonemes reconstruct the whole stream.
    let phonemes = chunks
        .iter()
        .map(|c| c.phonemes.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    assert_eq!(phonemes, "hello world! ".repeat(100).trim());
}

#[test]
fn rerun_produces_identical_boundaries() {
    let packer = TokenPacker::new(scenario_vocab(), false);
    let text = "Some words here, and more after the comma. ".repeat(40);

    let first: Vec<Chunk> = packer
        .pack(word_tokens(&text))
        .collect::<Result<_, _>>()
        .unwrap();
    let second: Vec<Chunk> = packer
        .pack(word_tokens(&text))
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(first, second);
}

#[test]
fn punctuation_only_input_yields_no_chunks() {
    let packer = TokenPacker::new(scenario_vocab(), false);
    // Phoneme-less and vocabulary-unmapped tokens produce no audio work.
    let tokens = vec![
        Token::Single(AnnotatedToken::new("—", None, " ")),
        Token::Single(AnnotatedToken::new("()", Some("()"), "")),
    ];

    assert_eq!(packer.pack(tokens).count(), 0);
}
