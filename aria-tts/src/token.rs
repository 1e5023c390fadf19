// Aria TTS - Annotated token model
// Tokens are what the phonemizer hands to the packer: the original surface
// text plus its phoneme transcription and spacing metadata.

/// One lexical unit from the phonemizer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedToken {
    /// Original surface text, never rewritten.
    pub text: String,
    /// Phoneme string, or `None` when the token contributes no sound.
    pub phonemes: Option<String>,
    /// Insert a space before this token's phonemes when the accumulated
    /// buffer does not already end in one.
    pub prespace: bool,
    /// Trailing whitespace carried over from the source text.
    pub whitespace: String,
}

impl AnnotatedToken {
    pub fn new(
        text: impl Into<String>,
        phonemes: Option<&str>,
        whitespace: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            phonemes: phonemes.map(str::to_string),
            prespace: false,
            whitespace: whitespace.into(),
        }
    }
}

/// A token, or a compound lexical unit made of several tokens that belong
/// together (e.g. a word and its attached punctuation).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Single(AnnotatedToken),
    Group(Vec<AnnotatedToken>),
}

/// A token after one level of flattening, tagged with the group it came from.
#[derive(Debug, Clone)]
pub(crate) struct FlatToken {
    pub token: AnnotatedToken,
    pub group: Option<usize>,
}

/// Flatten one level of grouping, preserving order. Group members share a
/// group id so the packer can keep them together.
pub(crate) fn flatten(tokens: Vec<Token>) -> Vec<FlatToken> {
    let mut out = Vec::new();
    for (i, tok) in tokens.into_iter().enumerate() {
        match tok {
            Token::Single(t) => out.push(FlatToken {
                token: t,
                group: None,
            }),
            Token::Group(members) => out.extend(members.into_iter().map(|t| FlatToken {
                token: t,
                group: Some(i),
            })),
        }
    }
    out
}
